//! Payment requests
//!
//! A requester asks a recipient for an amount. The request record lives at
//! a key derived from the requester and a per-requester sequence number and
//! carries its own storage deposit, paid by the requester's wallet. Accepting
//! pays the requester from the recipient's account; declining moves nothing.
//! Either way the record is closed and its deposit refunded to the signer
//! that resolved it.

use crate::auth::{require_owner, require_party};
use crate::engine::move_funds;
use crate::instruction::Outcome;
use crate::processor::{ensure_positive, TxContext};
use crate::types::{Identity, PaymentRequest, StorageKey};
use crate::{Error, Result};

/// Open a request from the signer to `recipient`
pub fn create_request(
    ctx: &mut TxContext<'_>,
    recipient: Identity,
    amount: u64,
) -> Result<Outcome> {
    ensure_positive(amount, "request")?;

    let requester = ctx.signer();
    if requester == recipient {
        return Err(Error::InvalidInstruction(format!(
            "{} cannot request funds from itself",
            requester
        )));
    }

    let mut account = ctx.account(&requester)?;
    let limit = ctx.config().requests.max_open_per_requester;
    if account.open_requests >= limit {
        return Err(Error::AlreadyExists(format!(
            "{} already has {} open request(s)",
            requester, account.open_requests
        )));
    }

    let seq = account.next_request_seq;
    let key = StorageKey::request(&requester, seq);
    if ctx.request_exists(&key)? {
        return Err(Error::AlreadyExists(format!("payment request {}", key)));
    }

    let rent_reserve = ctx.charge_rent(&requester, PaymentRequest::SPACE)?;

    account.open_requests = account
        .open_requests
        .checked_add(1)
        .ok_or_else(|| Error::Overflow(format!("open requests of {}", requester)))?;
    account.next_request_seq = seq
        .checked_add(1)
        .ok_or_else(|| Error::Overflow(format!("request sequence of {}", requester)))?;

    let request = PaymentRequest {
        key,
        seq,
        sender: requester,
        recipient,
        amount,
        rent_reserve,
        created_at: ctx.now(),
    };
    ctx.put_account(account);
    ctx.put_request(request.clone());

    tracing::info!(
        request = %key,
        requester = %requester,
        recipient = %recipient,
        amount,
        "Payment request created"
    );

    Ok(Outcome::RequestCreated { request })
}

/// Pay the request from the recipient's account; recipient only
pub fn accept_request(ctx: &mut TxContext<'_>, key: StorageKey) -> Result<Outcome> {
    let request = ctx.request(&key)?;
    let signer = ctx.signer();
    require_owner(&signer, &request.recipient, "accept request")?;

    let mut payer = ctx.account(&request.recipient)?;
    let mut payee = ctx.account(&request.sender)?;
    move_funds(&mut payer, &mut payee, request.amount)?;
    payee.open_requests = payee
        .open_requests
        .checked_sub(1)
        .ok_or_else(|| Error::Overflow(format!("open requests of {}", request.sender)))?;

    let sender_balance = payee.balance;
    let recipient_balance = payer.balance;
    ctx.put_account(payer);
    ctx.put_account(payee);
    ctx.close_request(key);
    ctx.refund_rent(&signer, request.rent_reserve)?;

    tracing::info!(
        request = %key,
        requester = %request.sender,
        payer = %request.recipient,
        amount = request.amount,
        "Payment request accepted"
    );

    Ok(Outcome::RequestAccepted {
        request: key,
        amount: request.amount,
        sender_balance,
        recipient_balance,
    })
}

/// Close the request without paying; recipient or requester
pub fn decline_request(ctx: &mut TxContext<'_>, key: StorageKey) -> Result<Outcome> {
    let request = ctx.request(&key)?;
    let signer = ctx.signer();
    require_party(
        &signer,
        &[request.recipient, request.sender],
        "decline request",
    )?;

    let mut requester = ctx.account(&request.sender)?;
    requester.open_requests = requester
        .open_requests
        .checked_sub(1)
        .ok_or_else(|| Error::Overflow(format!("open requests of {}", request.sender)))?;

    ctx.put_account(requester);
    ctx.close_request(key);
    ctx.refund_rent(&signer, request.rent_reserve)?;

    tracing::info!(request = %key, declined_by = %signer, "Payment request declined");

    Ok(Outcome::RequestDeclined { request: key })
}
