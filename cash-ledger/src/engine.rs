//! Value-transfer engine
//!
//! Deposits move native value from the signer's wallet into an account,
//! withdrawals move it back out to the owner's wallet, and transfers move
//! balance between two ledger accounts. Every amount goes through checked
//! arithmetic and the debited party is verified to cover it before any
//! record is staged.

use crate::auth::require_owner;
use crate::instruction::Outcome;
use crate::processor::{ensure_positive, TxContext};
use crate::types::{Account, Identity};
use crate::{Error, Result};

/// Credit `owner`'s account from the signer's wallet
///
/// Anyone may fund any initialized account.
pub fn deposit(ctx: &mut TxContext<'_>, owner: Identity, amount: u64) -> Result<Outcome> {
    ensure_positive(amount, "deposit")?;

    let payer = ctx.signer();
    let mut account = ctx.account(&owner)?;
    let mut wallet = ctx.wallet(&payer)?;

    wallet.debit(amount)?;
    account.credit(amount)?;
    account.total_deposited = account
        .total_deposited
        .checked_add(amount)
        .ok_or_else(|| Error::Overflow(format!("deposit total of {}", owner)))?;

    let balance = account.balance;
    ctx.put_wallet(wallet);
    ctx.put_account(account);

    tracing::info!(owner = %owner, payer = %payer, amount, balance, "Deposit applied");

    Ok(Outcome::Deposited { owner, balance })
}

/// Pay out of `owner`'s account into the owner's wallet
pub fn withdraw(ctx: &mut TxContext<'_>, owner: Identity, amount: u64) -> Result<Outcome> {
    ensure_positive(amount, "withdraw")?;
    require_owner(&ctx.signer(), &owner, "withdraw")?;

    let mut account = ctx.account(&owner)?;
    let mut wallet = ctx.wallet(&owner)?;

    account.debit(amount)?;
    account.total_withdrawn = account
        .total_withdrawn
        .checked_add(amount)
        .ok_or_else(|| Error::Overflow(format!("withdrawal total of {}", owner)))?;
    wallet.credit(amount)?;

    let balance = account.balance;
    ctx.put_wallet(wallet);
    ctx.put_account(account);

    tracing::info!(owner = %owner, amount, balance, "Withdrawal applied");

    Ok(Outcome::Withdrawn { owner, balance })
}

/// Move `amount` between two accounts; `from` must sign
pub fn transfer(
    ctx: &mut TxContext<'_>,
    from: Identity,
    to: Identity,
    amount: u64,
) -> Result<Outcome> {
    ensure_positive(amount, "transfer")?;
    require_owner(&ctx.signer(), &from, "transfer")?;
    if from == to {
        return Err(Error::InvalidInstruction(format!(
            "transfer from {} to itself",
            from
        )));
    }

    let mut source = ctx.account(&from)?;
    let mut destination = ctx.account(&to)?;
    move_funds(&mut source, &mut destination, amount)?;

    let from_balance = source.balance;
    let to_balance = destination.balance;
    ctx.put_account(source);
    ctx.put_account(destination);

    tracing::info!(from = %from, to = %to, amount, from_balance, to_balance, "Transfer applied");

    Ok(Outcome::Transferred {
        from,
        to,
        amount,
        from_balance,
        to_balance,
    })
}

/// Debit `source` and credit `destination`
///
/// Both are private copies; on error the caller drops them unstaged.
pub(crate) fn move_funds(
    source: &mut Account,
    destination: &mut Account,
    amount: u64,
) -> Result<()> {
    source.debit(amount)?;
    destination.credit(amount)
}
