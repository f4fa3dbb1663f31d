//! Escrow release sweeper
//!
//! A single tokio task that wakes on an interval (or on demand), lists the
//! escrows whose hold window has elapsed and submits a `ReleaseEscrow`
//! transaction for each, signed by the node's crank key. Release is
//! permissionless, so the crank key needs no account; it collects the
//! storage deposits of the escrows it closes.
//!
//! ```text
//!   SweeperHandle ──mpsc──▶ EscrowSweeper ──submit──▶ Ledger
//!                              ▲
//!                        interval tick
//! ```

use crate::{
    config::SweeperConfig,
    crypto::KeyPair,
    instruction::{Instruction, Transaction},
    Error, Ledger, Result,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Message sent to the sweeper
#[derive(Debug)]
pub enum SweeperMessage {
    /// Run one sweep now and report how many escrows were released
    SweepNow {
        /// Reply channel
        response: oneshot::Sender<Result<usize>>,
    },

    /// Stop the sweeper
    Shutdown,
}

/// Actor that releases matured escrows
#[derive(Debug)]
pub struct EscrowSweeper {
    ledger: Ledger,
    crank: KeyPair,
    mailbox: mpsc::Receiver<SweeperMessage>,
    period: Duration,
    batch_limit: usize,
    nonce: u64,
}

impl EscrowSweeper {
    /// Create new sweeper
    pub fn new(
        ledger: Ledger,
        crank: KeyPair,
        mailbox: mpsc::Receiver<SweeperMessage>,
        config: &SweeperConfig,
    ) -> Self {
        // Seed from the clock so restarts do not replay earlier transaction ids
        let nonce = ledger
            .now()
            .timestamp_nanos_opt()
            .map(|nanos| nanos.unsigned_abs())
            .unwrap_or_default();

        Self {
            ledger,
            crank,
            mailbox,
            period: Duration::from_millis(config.interval_ms),
            batch_limit: config.batch_limit,
            nonce,
        }
    }

    /// Run the sweeper event loop
    pub async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            crank = %self.crank.identity(),
            period_ms = self.period.as_millis() as u64,
            "Escrow sweeper started"
        );

        loop {
            tokio::select! {
                Some(msg) = self.mailbox.recv() => {
                    match msg {
                        SweeperMessage::SweepNow { response } => {
                            let _ = response.send(self.sweep());
                        }
                        SweeperMessage::Shutdown => break,
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.sweep() {
                        tracing::error!(error = %e, "Escrow sweep failed");
                    }
                }

                else => break,
            }
        }

        tracing::info!("Escrow sweeper stopped");
    }

    /// Release every matured escrow up to the batch limit
    fn sweep(&mut self) -> Result<usize> {
        let now = self.ledger.now();
        let matured = self.ledger.escrows_pending_release(now, self.batch_limit)?;
        if matured.is_empty() {
            return Ok(0);
        }

        let mut released = 0;
        for escrow in matured {
            self.nonce = self.nonce.wrapping_add(1);
            let tx = Transaction::new(
                self.crank.identity(),
                self.nonce,
                Instruction::ReleaseEscrow { escrow: escrow.key },
            )
            .sign(&self.crank)?;

            match self.ledger.submit(&tx) {
                Ok(_) => {
                    released += 1;
                    self.ledger.metrics().record_sweep();
                }
                // Resolved or busy; a later sweep picks it up if still holding
                Err(Error::InvalidState(_) | Error::NotFound(_) | Error::AccountInUse(_)) => {
                    tracing::debug!(escrow = %escrow.key, "Escrow skipped by sweeper");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(released, "Escrow sweep finished");
        Ok(released)
    }
}

/// Handle for sending messages to the sweeper
#[derive(Clone, Debug)]
pub struct SweeperHandle {
    sender: mpsc::Sender<SweeperMessage>,
}

impl SweeperHandle {
    /// Run a sweep immediately
    pub async fn sweep_now(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SweeperMessage::SweepNow { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Sweeper mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Stop the sweeper
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SweeperMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Sweeper mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the sweeper
pub fn spawn_sweeper(ledger: Ledger, crank: KeyPair, config: &SweeperConfig) -> SweeperHandle {
    let (tx, rx) = mpsc::channel(16);
    let sweeper = EscrowSweeper::new(ledger, crank, rx, config);

    tokio::spawn(async move {
        sweeper.run().await;
    });

    SweeperHandle { sender: tx }
}
