//! Client flows against an in-process ledger

use cash_client::{CashClient, ClientError, Directory, LocalTransport, RetryConfig};
use cash_ledger::{Config, ErrorKind, EscrowStatus, KeyPair, Ledger, ManualClock, Outcome};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    ledger: Ledger,
    clock: Arc<ManualClock>,
    directory: Arc<Directory>,
    transport: Arc<LocalTransport>,
    _temp: TempDir,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        config.rent.overhead_bytes = 0;
        config.rent.per_byte = 1;
        config.escrow.hold_secs = 600;

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let ledger = Ledger::open_with_clock(config, clock.clone()).unwrap();
        let retry = RetryConfig {
            max_retries: 50,
            ..RetryConfig::default()
        };
        let transport = Arc::new(LocalTransport::with_retry(ledger.clone(), retry));

        Self {
            ledger,
            clock,
            directory: Arc::new(Directory::new()),
            transport,
            _temp: temp,
        }
    }

    /// Registered, funded client with an open account holding `deposit`
    async fn client(&self, seed: u8, handle: &str, deposit: u64) -> CashClient {
        let keypair = KeyPair::from_seed(&[seed; 32]);
        let identity = keypair.identity();
        self.directory.register(handle, identity).unwrap();
        self.ledger.fund_wallet(identity, 1_000_000).unwrap();

        let client = CashClient::new(keypair, self.directory.clone(), self.transport.clone());
        client.open_account().await.unwrap();
        if deposit > 0 {
            client.deposit(deposit).await.unwrap();
        }
        client
    }

    fn balance(&self, client: &CashClient) -> u64 {
        self.ledger.account(&client.identity()).unwrap().balance
    }
}

#[tokio::test]
async fn test_pay_by_handle() {
    let h = Harness::new();
    let alice = h.client(1, "alice", 500).await;
    let bob = h.client(2, "bob", 0).await;

    let receipt = alice.pay("@Bob", 120).await.unwrap();
    assert!(matches!(receipt.outcome, Outcome::Transferred { amount: 120, .. }));
    assert_eq!(h.balance(&alice), 380);
    assert_eq!(h.balance(&bob), 120);

    // Hex identities bypass the directory
    alice.pay(&bob.identity().to_hex(), 30).await.unwrap();
    assert_eq!(h.balance(&bob), 150);
}

#[tokio::test]
async fn test_unknown_handle_is_never_submitted() {
    let h = Harness::new();
    let alice = h.client(1, "alice", 500).await;
    let before = h.ledger.audit().unwrap();

    let err = alice.pay("mallory", 10).await.unwrap_err();
    assert!(matches!(err, ClientError::NameNotFound(_)));
    assert_eq!(h.ledger.audit().unwrap(), before);
    let rejected = h.ledger.metrics().rejected_total.with_label_values(&["not_found"]);
    assert_eq!(rejected.get(), 0);
    assert_eq!(h.balance(&alice), 500);
}

#[tokio::test]
async fn test_ledger_rejection_surfaces_failure() {
    let h = Harness::new();
    let alice = h.client(1, "alice", 50).await;
    h.client(2, "bob", 0).await;

    let err = alice.pay("bob", 51).await.unwrap_err();
    assert_eq!(
        err.failure().map(|f| f.kind),
        Some(ErrorKind::InsufficientFunds)
    );
    assert_eq!(h.balance(&alice), 50);
}

#[tokio::test]
async fn test_payment_link_round_trip() {
    let h = Harness::new();
    let alice = h.client(1, "alice", 0).await;
    let bob = h.client(2, "bob", 300).await;

    let link = alice.payment_link(75, Some("lunch & coffee"));
    assert!(link.starts_with("cash:"));

    bob.pay_link(&link).await.unwrap();
    assert_eq!(h.balance(&alice), 75);
    assert_eq!(h.balance(&bob), 225);

    let err = bob.pay_link("cash:nothex?amount=1").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidLink(_)));
}

#[tokio::test]
async fn test_request_accept_and_decline() {
    let h = Harness::new();
    let alice = h.client(1, "alice", 0).await;
    let bob = h.client(2, "bob", 200).await;

    let request = alice.request("bob", 80).await.unwrap();
    assert_eq!(request.sender, alice.identity());
    assert_eq!(request.recipient, bob.identity());

    // Only the payer can accept
    let err = alice.accept_request(request.key).await.unwrap_err();
    assert_eq!(err.failure().map(|f| f.kind), Some(ErrorKind::Unauthorized));

    bob.accept_request(request.key).await.unwrap();
    assert_eq!(h.balance(&alice), 80);
    assert_eq!(h.balance(&bob), 120);

    let second = alice.request("bob", 10).await.unwrap();
    bob.decline_request(second.key).await.unwrap();
    let err = h.ledger.request(&second.key).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.balance(&bob), 120);
}

#[tokio::test]
async fn test_protected_payment_revoke_and_release() {
    let h = Harness::new();
    let alice = h.client(1, "alice", 400).await;
    let bob = h.client(2, "bob", 0).await;

    let revoked = alice.send_protected("bob", 100).await.unwrap();
    assert_eq!(revoked.status, EscrowStatus::Holding);
    assert_eq!(h.balance(&alice), 300);

    // Recipient cannot claw back, sender can inside the window
    let err = bob.revoke(revoked.key).await.unwrap_err();
    assert_eq!(err.failure().map(|f| f.kind), Some(ErrorKind::Unauthorized));
    alice.revoke(revoked.key).await.unwrap();
    assert_eq!(h.balance(&alice), 400);

    let released = alice.send_protected("bob", 150).await.unwrap();
    let err = bob.release(released.key).await.unwrap_err();
    assert_eq!(err.failure().map(|f| f.kind), Some(ErrorKind::InvalidState));

    h.clock.advance(Duration::seconds(600));
    let receipt = bob.release(released.key).await.unwrap();
    assert!(matches!(
        receipt.outcome,
        Outcome::EscrowResolved {
            status: EscrowStatus::Released,
            amount: 150,
            ..
        }
    ));
    assert_eq!(h.balance(&bob), 150);
    assert_eq!(h.balance(&alice), 250);

    let err = alice.revoke(released.key).await.unwrap_err();
    assert_eq!(err.failure().map(|f| f.kind), Some(ErrorKind::InvalidState));
    assert!(h.ledger.audit().unwrap().is_balanced());
}

#[tokio::test]
async fn test_friends_by_handle() {
    let h = Harness::new();
    let alice = h.client(1, "alice", 0).await;
    let bob = h.client(2, "bob", 0).await;

    let friends = alice.add_friend("bob").await.unwrap();
    assert_eq!(friends, vec![bob.identity()]);

    let friends = alice.remove_friend("BOB").await.unwrap();
    assert!(friends.is_empty());

    let err = alice.remove_friend("bob").await.unwrap_err();
    assert_eq!(err.failure().map(|f| f.kind), Some(ErrorKind::NotFound));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_settle() {
    let h = Harness::new();
    let alice = Arc::new(h.client(1, "alice", 1_000).await);
    let bob = h.client(2, "bob", 0).await;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let alice = alice.clone();
        tasks.push(tokio::spawn(async move { alice.pay("bob", 10).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.balance(&alice), 900);
    assert_eq!(h.balance(&bob), 100);
    assert!(h.ledger.audit().unwrap().is_balanced());
}
