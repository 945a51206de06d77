//! chainbbs - Chain Bulletin Board System
//!
//! A decentralized forum layer that stores posts as disguised multisig
//! outputs inside transactions of an existing ledger network, discovered
//! through a `bt=v1` DNS TXT record binding a domain to the board
//! owner's key.
//!
//! The ledger itself - peers, keys, signing, broadcast - is an external
//! collaborator consumed through the [`transport::Transport`] trait.
//! This crate owns the message codec, the fee negotiation, the
//! synchronization state machine and the reply tree assembly.

pub mod board;
pub mod codec;
pub mod config;
pub mod error;
pub mod fee;
pub mod identity;
pub mod logging;
pub mod record;
pub mod session;
pub mod sync;
pub mod transport;

pub use board::{Author, Post, PostStore, ThreadBuilder};
pub use config::Config;
pub use error::{BoardError, Result};
pub use fee::{ChangePolicy, FundingPlan};
pub use identity::{Identity, PublicKey};
pub use record::BoardRecord;
pub use session::{BoardEvent, BoardSession, PostDraft, PostReceipt};
pub use sync::{ReadySignal, ScanWindow, SyncState};
pub use transport::{
    BroadcastOutcome, LedgerTx, SignedTx, SpendableInput, Transport, TxId, TxOut,
};
