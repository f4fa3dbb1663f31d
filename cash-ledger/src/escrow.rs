//! Escrow engine for protected payments
//!
//! `send_protected` moves an amount out of the sender's account into an
//! escrow record that also carries its own storage deposit. The escrow is
//! `Holding` until exactly one transition closes it:
//!
//! - revoke: sender only, strictly before `release_time`; funds return to
//!   the sender's account
//! - release: any signer once `release_time` has passed; funds go to the
//!   recipient's account
//!
//! Closing deletes the record, leaves a [`ResolvedEscrow`] tombstone so a
//! second transition fails with `InvalidState`, and refunds the storage
//! deposit to the signer that triggered the transition.
//!
//! [`ResolvedEscrow`]: crate::types::ResolvedEscrow

use crate::auth::require_owner;
use crate::instruction::Outcome;
use crate::processor::{ensure_positive, TxContext};
use crate::types::{EscrowEntry, EscrowStatus, Identity, StorageKey};
use crate::{Error, Result};

/// Hold `amount` from `from`'s account for `to`
pub fn send_protected(
    ctx: &mut TxContext<'_>,
    from: Identity,
    to: Identity,
    amount: u64,
) -> Result<Outcome> {
    ensure_positive(amount, "protected payment")?;
    let signer = ctx.signer();
    require_owner(&signer, &from, "send protected")?;
    if from == to {
        return Err(Error::InvalidInstruction(format!(
            "protected payment from {} to itself",
            from
        )));
    }

    let mut sender = ctx.account(&from)?;
    // Recipient must exist so release can always credit it
    ctx.account(&to)?;

    sender.debit(amount)?;
    let seq = sender.next_escrow_seq;
    sender.next_escrow_seq = seq
        .checked_add(1)
        .ok_or_else(|| Error::Overflow(format!("escrow sequence of {}", from)))?;

    let now = ctx.now();
    let release_time = now
        .checked_add_signed(ctx.config().escrow.hold()?)
        .ok_or_else(|| Error::Overflow("escrow release time".to_string()))?;
    let rent_reserve = ctx.charge_rent(&signer, EscrowEntry::SPACE)?;

    let escrow = EscrowEntry {
        key: StorageKey::escrow(&from, seq),
        seq,
        sender: from,
        recipient: to,
        amount,
        rent_reserve,
        created_at: now,
        release_time,
        status: EscrowStatus::Holding,
    };
    escrow.native_balance()?;

    ctx.put_account(sender);
    ctx.put_escrow(escrow.clone());

    tracing::info!(
        escrow = %escrow.key,
        sender = %from,
        recipient = %to,
        amount,
        release_time = %release_time,
        "Escrow created"
    );

    Ok(Outcome::EscrowCreated { escrow })
}

/// Return held funds to the sender before the window closes
pub fn revoke_escrow(ctx: &mut TxContext<'_>, key: StorageKey) -> Result<Outcome> {
    let escrow = ctx.escrow(&key)?;
    let signer = ctx.signer();
    require_owner(&signer, &escrow.sender, "revoke escrow")?;
    if escrow.is_mature(ctx.now()) {
        return Err(Error::InvalidState(format!(
            "escrow {} hold window ended at {}",
            key, escrow.release_time
        )));
    }

    resolve(ctx, escrow, EscrowStatus::Revoked)
}

/// Forward held funds to the recipient after the window closes
///
/// Permissionless so a crank can sweep matured escrows.
pub fn release_escrow(ctx: &mut TxContext<'_>, key: StorageKey) -> Result<Outcome> {
    let escrow = ctx.escrow(&key)?;
    if !escrow.is_mature(ctx.now()) {
        return Err(Error::InvalidState(format!(
            "escrow {} is held until {}",
            key, escrow.release_time
        )));
    }

    resolve(ctx, escrow, EscrowStatus::Released)
}

fn resolve(ctx: &mut TxContext<'_>, escrow: EscrowEntry, status: EscrowStatus) -> Result<Outcome> {
    let credited = match status {
        EscrowStatus::Released => escrow.recipient,
        _ => escrow.sender,
    };

    let mut account = ctx.account(&credited)?;
    account.credit(escrow.amount)?;
    ctx.put_account(account);

    let signer = ctx.signer();
    ctx.close_escrow(&escrow, status);
    ctx.refund_rent(&signer, escrow.rent_reserve)?;

    tracing::info!(
        escrow = %escrow.key,
        status = ?status,
        amount = escrow.amount,
        credited = %credited,
        resolved_by = %signer,
        "Escrow resolved"
    );

    Ok(Outcome::EscrowResolved {
        escrow: escrow.key,
        status,
        amount: escrow.amount,
        credited,
    })
}
