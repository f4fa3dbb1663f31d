//! Transaction submission
//!
//! [`Transport`] is the seam between a client and wherever the ledger runs.
//! [`LocalTransport`] drives an in-process [`Ledger`] and resubmits
//! transactions rejected with `AccountInUse`. Resubmitting the same signed
//! transaction is safe: a committed transaction returns its stored receipt.

use crate::retry::RetryConfig;
use async_trait::async_trait;
use cash_ledger::{ErrorKind, Failure, Ledger, Receipt, SignedTransaction};

/// Submits signed transactions to a ledger
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit `tx` and wait for its receipt
    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, Failure>;
}

/// Transport over an in-process ledger
#[derive(Debug, Clone)]
pub struct LocalTransport {
    ledger: Ledger,
    retry: RetryConfig,
}

impl LocalTransport {
    /// Create with default backoff
    pub fn new(ledger: Ledger) -> Self {
        Self::with_retry(ledger, RetryConfig::default())
    }

    /// Create with explicit backoff
    pub fn with_retry(ledger: Ledger, retry: RetryConfig) -> Self {
        Self { ledger, retry }
    }

    async fn submit_once(&self, tx: &SignedTransaction) -> Result<Receipt, Failure> {
        let ledger = self.ledger.clone();
        let tx = tx.clone();
        tokio::task::spawn_blocking(move || ledger.submit(&tx).map_err(Failure::from))
            .await
            .map_err(|e| Failure {
                kind: ErrorKind::Internal,
                message: format!("submit task failed: {}", e),
            })?
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, Failure> {
        let instruction = tx.transaction.instruction.name();
        let mut attempt = 0;

        loop {
            match self.submit_once(&tx).await {
                Ok(receipt) => {
                    if attempt > 0 {
                        tracing::info!(instruction, attempt, "Submission succeeded on retry");
                    }
                    return Ok(receipt);
                }
                Err(failure) if failure.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        instruction,
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Account in use, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}
