//! Test helpers for session integration tests.
//!
//! Provides a scriptable in-memory [`Transport`] implementation and
//! helpers for building message-carrying ledger transactions.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use chainbbs::board::PostPayload;
use chainbbs::codec;
use chainbbs::{
    BoardEvent, BroadcastOutcome, Config, FundingPlan, LedgerTx, PublicKey, Result, ScanWindow,
    SignedTx, SpendableInput, Transport, TxId, TxOut,
};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A fast test configuration.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.sync.pass_delay_ms = 10;
    config.sync.retry_delay_ms = 10;
    config
}

/// A deterministic valid compressed key that is not the session's own.
pub fn foreign_owner_key() -> PublicKey {
    let mut bytes = vec![0x02];
    bytes.extend_from_slice(&[0x77; 32]);
    PublicKey::from_bytes(bytes).unwrap()
}

/// The TXT record binding a board to `key`, created at `created_at`.
pub fn record_for(key: &PublicKey, created_at: DateTime<Utc>) -> String {
    format!(
        "bt=v1 {} {}",
        key.to_base58(),
        created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    )
}

/// Build a message-carrying ledger transaction for `owner`'s board.
pub fn message_tx(
    seed: &[u8],
    owner: &PublicKey,
    content: &str,
    reply_to: Option<TxId>,
    timestamp: DateTime<Utc>,
) -> LedgerTx {
    let payload = PostPayload {
        content: content.to_string(),
        reply_to: reply_to.map(|id| id.internal_hex()),
    };
    let json = serde_json::to_vec(&payload).unwrap();
    let body = codec::compress(&json).unwrap();
    let message = codec::encode(&body, owner);

    LedgerTx {
        txid: TxId::compute(seed),
        timestamp,
        outputs: message
            .outputs
            .into_iter()
            .map(|script| TxOut { value: 5460, script })
            .collect(),
        sender: Some("someone-far-away".to_string()),
        spends_owner_funds: false,
        confirmed: true,
    }
}

/// A scriptable in-memory ledger transport.
pub struct MockTransport {
    records: Vec<String>,
    history: Mutex<Vec<LedgerTx>>,
    inputs: Mutex<Vec<SpendableInput>>,
    /// Transactions handed to `broadcast`, in call order.
    pub broadcasts: Mutex<Vec<SignedTx>>,
    reject_broadcasts: AtomicBool,
    failing_scans: AtomicU32,
    scan_delay: Mutex<Duration>,
    updates_tx: Mutex<Option<mpsc::Sender<LedgerTx>>>,
}

impl MockTransport {
    /// A transport with no published records and a generously funded
    /// wallet.
    pub fn new() -> Self {
        let mut transport = Self::empty();
        transport.inputs = Mutex::new(
            (0..4u8)
                .map(|i| SpendableInput {
                    txid: TxId::compute(&[i]),
                    vout: 0,
                    value: 1_000_000,
                })
                .collect(),
        );
        transport
    }

    /// A transport with no records and no funds.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            history: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            reject_broadcasts: AtomicBool::new(false),
            failing_scans: AtomicU32::new(0),
            scan_delay: Mutex::new(Duration::from_millis(0)),
            updates_tx: Mutex::new(None),
        }
    }

    /// Publish TXT records for the board domain.
    pub fn with_records(mut self, records: Vec<String>) -> Self {
        self.records = records;
        self
    }

    /// Seed historical ledger transactions.
    pub async fn add_history(&self, tx: LedgerTx) {
        self.history.lock().await.push(tx);
    }

    /// Make every broadcast come back rejected.
    pub fn reject_broadcasts(&self) {
        self.reject_broadcasts.store(true, Ordering::SeqCst);
    }

    /// Fail the next `n` scan passes.
    pub fn fail_scans(&self, n: u32) {
        self.failing_scans.store(n, Ordering::SeqCst);
    }

    /// Stretch every scan pass by `delay`.
    pub async fn set_scan_delay(&self, delay: Duration) {
        *self.scan_delay.lock().await = delay;
    }

    /// Push a transaction into the live update feed.
    pub async fn push_update(&self, tx: LedgerTx) {
        let guard = self.updates_tx.lock().await;
        let sender = guard.as_ref().expect("session not started");
        sender.send(tx).await.expect("update channel closed");
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn resolve_txt(&self, _host: &str) -> Result<Vec<String>> {
        // Give the test a moment to subscribe before events flow.
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(self.records.clone())
    }

    async fn derive_identity(&self, host: &str, passphrase: &str) -> Result<PublicKey> {
        let digest = Sha256::digest(format!("{host}:{passphrase}").as_bytes());
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(digest.as_slice());
        PublicKey::from_bytes(bytes)
    }

    async fn watch(&self, _key: &PublicKey) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }

    async fn unwatch(&self, _key: &PublicKey) {}

    async fn scan(&self, _key: &PublicKey, window: ScanWindow) -> Result<Vec<LedgerTx>> {
        let delay = *self.scan_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self.failing_scans.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_scans.store(failing - 1, Ordering::SeqCst);
            return Err(chainbbs::BoardError::Transport(
                "scripted scan failure".to_string(),
            ));
        }

        let history = self.history.lock().await;
        Ok(history
            .iter()
            .filter(|tx| tx.timestamp >= window.start && tx.timestamp <= window.end)
            .cloned()
            .collect())
    }

    async fn updates(&self) -> mpsc::Receiver<LedgerTx> {
        let (tx, rx) = mpsc::channel(64);
        *self.updates_tx.lock().await = Some(tx);
        rx
    }

    fn is_synced(&self) -> bool {
        true
    }

    async fn wait_synced(&self) {}

    async fn spendable_inputs(&self) -> Vec<SpendableInput> {
        self.inputs.lock().await.clone()
    }

    async fn sign(&self, plan: &FundingPlan) -> Result<SignedTx> {
        Ok(SignedTx {
            raw: format!("{plan:?}").into_bytes(),
        })
    }

    async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastOutcome> {
        if self.reject_broadcasts.load(Ordering::SeqCst) {
            return Ok(BroadcastOutcome::Rejected("scripted rejection".to_string()));
        }
        self.broadcasts.lock().await.push(tx.clone());
        Ok(BroadcastOutcome::Acked)
    }

    fn address(&self, key: &PublicKey) -> String {
        format!("addr-{}", hex::encode(&key.as_bytes()[..4]))
    }
}

/// Wait for an event matching `pred`, failing the test on timeout.
pub async fn wait_for_event<F>(
    rx: &mut tokio::sync::broadcast::Receiver<BoardEvent>,
    mut pred: F,
) -> BoardEvent
where
    F: FnMut(&BoardEvent) -> bool,
{
    timeout(DEFAULT_TIMEOUT, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
