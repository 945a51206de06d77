//! External ledger transport interface.
//!
//! The peer network, key derivation, transaction signing and ledger
//! validity rules all live behind this boundary; chainbbs only consumes
//! them. Integration tests drive the session through a mock
//! implementation of [`Transport`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::codec::OutputScript;
use crate::fee::FundingPlan;
use crate::identity::PublicKey;
use crate::sync::ScanWindow;
use crate::Result;

/// A transaction identifier.
///
/// Stored in internal byte order; rendered to users in the conventional
/// reversed-hex display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId([u8; 32]);

impl TxId {
    /// Wrap raw internal-order bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute the identifier of a raw serialized transaction
    /// (double SHA-256).
    pub fn compute(raw: &[u8]) -> Self {
        let once = Sha256::digest(raw);
        let twice = Sha256::digest(once);
        Self(twice.into())
    }

    /// Internal-order bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex in internal byte order, as embedded in payloads.
    pub fn internal_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex in display order (byte-reversed), as shown to users.
    pub fn display_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parse internal-order hex.
    pub fn from_internal_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Parse display-order hex.
    pub fn from_display_hex(s: &str) -> Option<Self> {
        let mut id = Self::from_internal_hex(s)?;
        id.0.reverse();
        Some(id)
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_hex())
    }
}

/// A single transaction output as observed on the ledger.
#[derive(Debug, Clone)]
pub struct TxOut {
    /// Output value.
    pub value: u64,
    /// Output script.
    pub script: OutputScript,
}

/// A ledger transaction matched by a scan or a live watch.
#[derive(Debug, Clone)]
pub struct LedgerTx {
    /// Transaction identifier.
    pub txid: TxId,
    /// Best-known transaction time.
    pub timestamp: DateTime<Utc>,
    /// Outputs in transaction order.
    pub outputs: Vec<TxOut>,
    /// Address behind the first input, when the transport can attribute
    /// it; `None` when the surrounding transactions are not known.
    pub sender: Option<String>,
    /// Whether any input spends funds watched for the owner identity.
    pub spends_owner_funds: bool,
    /// Whether the transaction has been confirmed.
    pub confirmed: bool,
}

/// A spendable input candidate offered by the wallet side of the
/// transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendableInput {
    /// Funding transaction.
    pub txid: TxId,
    /// Output index within the funding transaction.
    pub vout: u32,
    /// Output value.
    pub value: u64,
}

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTx {
    /// Raw serialized transaction bytes.
    pub raw: Vec<u8>,
}

impl SignedTx {
    /// Identifier of this transaction.
    pub fn txid(&self) -> TxId {
        TxId::compute(&self.raw)
    }
}

/// Result of handing a transaction to the network.
#[derive(Debug, Clone)]
pub enum BroadcastOutcome {
    /// At least one peer acknowledged the transaction.
    Acked,
    /// The network rejected the transaction.
    Rejected(String),
}

/// The external identity/wallet/network collaborator.
///
/// Implementations wrap a concrete ledger node or SPV client. All
/// methods are expected to be non-blocking in the cooperative sense:
/// long waits suspend, they never spin.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve the TXT records published for a domain.
    async fn resolve_txt(&self, host: &str) -> Result<Vec<String>>;

    /// Derive the session's own identity key from a local passphrase,
    /// scoped to the board host.
    async fn derive_identity(&self, host: &str, passphrase: &str) -> Result<PublicKey>;

    /// Start watching ledger activity for an identity.
    ///
    /// Returns the identity's last-known load timestamp, if the
    /// transport has one on record; the scan start falls back to the
    /// board epoch otherwise.
    async fn watch(&self, key: &PublicKey) -> Result<Option<DateTime<Utc>>>;

    /// Stop watching an identity.
    async fn unwatch(&self, key: &PublicKey);

    /// Scan one window of ledger history for transactions involving the
    /// watched identity. Returning means the pass completed.
    async fn scan(&self, key: &PublicKey, window: ScanWindow) -> Result<Vec<LedgerTx>>;

    /// Live feed of matched transactions observed after the historical
    /// scan. Called once per session.
    async fn updates(&self) -> mpsc::Receiver<LedgerTx>;

    /// Whether the transport considers itself fully synced with the
    /// network.
    fn is_synced(&self) -> bool;

    /// Resolve once the transport becomes fully synced. Completes
    /// immediately when it already is.
    async fn wait_synced(&self);

    /// Snapshot of the inputs the session's own wallet can spend, in the
    /// order the wallet prefers to consume them.
    async fn spendable_inputs(&self) -> Vec<SpendableInput>;

    /// Sign a funding plan into a broadcastable transaction.
    async fn sign(&self, plan: &FundingPlan) -> Result<SignedTx>;

    /// Hand a signed transaction to the network.
    async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastOutcome>;

    /// Render the ledger address for a public key, used to attribute
    /// post authors.
    fn address(&self, key: &PublicKey) -> String;
}
