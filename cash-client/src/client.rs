//! Client façade
//!
//! Resolves handles, builds and signs transactions with the holder's key and
//! submits them through a [`Transport`]. Nothing is signed until the
//! recipient resolved.

use crate::error::{ClientError, Result};
use crate::link::{self, PaymentLink};
use crate::resolver::IdentityResolver;
use crate::transport::Transport;
use cash_ledger::{
    EscrowEntry, Identity, Instruction, KeyPair, Outcome, PaymentRequest, Receipt, StorageKey,
    Transaction,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Signing client for one identity
pub struct CashClient {
    keypair: KeyPair,
    resolver: Arc<dyn IdentityResolver>,
    transport: Arc<dyn Transport>,
    nonce: AtomicU64,
}

impl fmt::Debug for CashClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CashClient")
            .field("identity", &self.keypair.identity())
            .field("nonce", &self.nonce.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl CashClient {
    /// Create a client
    pub fn new(
        keypair: KeyPair,
        resolver: Arc<dyn IdentityResolver>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        // Distinct nonces across restarts keep transaction ids unique
        let nonce = chrono::Utc::now()
            .timestamp_nanos_opt()
            .map(|nanos| nanos.unsigned_abs())
            .unwrap_or_default();

        Self {
            keypair,
            resolver,
            transport,
            nonce: AtomicU64::new(nonce),
        }
    }

    /// Identity of the holder
    pub fn identity(&self) -> Identity {
        self.keypair.identity()
    }

    /// Identity for a handle or a hex identity
    pub async fn resolve(&self, handle: &str) -> Result<Identity> {
        if let Ok(identity) = handle.parse::<Identity>() {
            return Ok(identity);
        }
        self.resolver.resolve(handle).await
    }

    /// Sign and submit `instruction`
    pub async fn submit(&self, instruction: Instruction) -> Result<Receipt> {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let tx = Transaction::new(self.identity(), nonce, instruction).sign(&self.keypair)?;
        let receipt = self.transport.submit(tx).await?;
        tracing::debug!(tx_id = %receipt.tx_id, "Receipt received");
        Ok(receipt)
    }

    // Account

    /// Create the holder's account
    pub async fn open_account(&self) -> Result<Receipt> {
        self.submit(Instruction::InitializeAccount {
            owner: self.identity(),
        })
        .await
    }

    /// Move `amount` from the holder's wallet into the account
    pub async fn deposit(&self, amount: u64) -> Result<Receipt> {
        self.submit(Instruction::Deposit {
            owner: self.identity(),
            amount,
        })
        .await
    }

    /// Move `amount` from the account back to the holder's wallet
    pub async fn withdraw(&self, amount: u64) -> Result<Receipt> {
        self.submit(Instruction::Withdraw {
            owner: self.identity(),
            amount,
        })
        .await
    }

    /// Add a friend by handle
    pub async fn add_friend(&self, handle: &str) -> Result<Vec<Identity>> {
        let friend = self.resolve(handle).await?;
        let receipt = self
            .submit(Instruction::AddFriend {
                owner: self.identity(),
                friend,
            })
            .await?;
        friends_of(receipt)
    }

    /// Remove a friend by handle
    pub async fn remove_friend(&self, handle: &str) -> Result<Vec<Identity>> {
        let friend = self.resolve(handle).await?;
        let receipt = self
            .submit(Instruction::RemoveFriend {
                owner: self.identity(),
                friend,
            })
            .await?;
        friends_of(receipt)
    }

    // Payments

    /// Pay `amount` to a handle
    pub async fn pay(&self, handle: &str, amount: u64) -> Result<Receipt> {
        let to = self.resolve(handle).await?;
        self.pay_identity(to, amount).await
    }

    /// Pay `amount` to an identity
    pub async fn pay_identity(&self, to: Identity, amount: u64) -> Result<Receipt> {
        self.submit(Instruction::Transfer {
            from: self.identity(),
            to,
            amount,
        })
        .await
    }

    /// Pay what an encoded payment link asks for
    pub async fn pay_link(&self, encoded: &str) -> Result<Receipt> {
        let link = link::decode(encoded)?;
        tracing::debug!(recipient = %link.recipient, amount = link.amount, "Paying link");
        self.pay_identity(link.recipient, link.amount).await
    }

    /// Link asking others to pay the holder
    pub fn payment_link(&self, amount: u64, memo: Option<&str>) -> String {
        PaymentLink {
            recipient: self.identity(),
            amount,
            memo: memo.map(str::to_string),
        }
        .encode()
    }

    // Requests

    /// Ask a handle for `amount`
    pub async fn request(&self, handle: &str, amount: u64) -> Result<PaymentRequest> {
        let recipient = self.resolve(handle).await?;
        let receipt = self
            .submit(Instruction::CreateRequest { recipient, amount })
            .await?;
        match receipt.outcome {
            Outcome::RequestCreated { request } => Ok(request),
            other => Err(unexpected(other)),
        }
    }

    /// Pay an open request addressed to the holder
    pub async fn accept_request(&self, request: StorageKey) -> Result<Receipt> {
        self.submit(Instruction::AcceptRequest { request }).await
    }

    /// Decline (as payer) or cancel (as requester) an open request
    pub async fn decline_request(&self, request: StorageKey) -> Result<Receipt> {
        self.submit(Instruction::DeclineRequest { request }).await
    }

    // Protected payments

    /// Hold `amount` in escrow for a handle
    pub async fn send_protected(&self, handle: &str, amount: u64) -> Result<EscrowEntry> {
        let to = self.resolve(handle).await?;
        let receipt = self
            .submit(Instruction::SendProtected {
                from: self.identity(),
                to,
                amount,
            })
            .await?;
        match receipt.outcome {
            Outcome::EscrowCreated { escrow } => Ok(escrow),
            other => Err(unexpected(other)),
        }
    }

    /// Take back a protected payment inside its window
    pub async fn revoke(&self, escrow: StorageKey) -> Result<Receipt> {
        self.submit(Instruction::RevokeEscrow { escrow }).await
    }

    /// Release a matured protected payment
    pub async fn release(&self, escrow: StorageKey) -> Result<Receipt> {
        self.submit(Instruction::ReleaseEscrow { escrow }).await
    }
}

fn friends_of(receipt: Receipt) -> Result<Vec<Identity>> {
    match receipt.outcome {
        Outcome::FriendsUpdated { friends, .. } => Ok(friends),
        other => Err(unexpected(other)),
    }
}

fn unexpected(outcome: Outcome) -> ClientError {
    ClientError::UnexpectedOutcome(format!("{:?}", outcome))
}
