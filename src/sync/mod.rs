//! Ledger synchronization for chainbbs.
//!
//! The controller resolves the board's owner identity, walks ledger
//! history window by window to recover past posts, and gates posting
//! until that walk has caught up with the present.

mod controller;
mod state;

pub(crate) use controller::{Command, SyncController};
pub use state::{PendingSignals, ReadySignal, ScanWindow, SyncState};
