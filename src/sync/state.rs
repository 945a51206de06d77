//! Synchronization state primitives.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// Lifecycle of a board session's synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Looking up the board's published discovery record.
    Resolving,
    /// Walking ledger history window by window.
    Scanning,
    /// History has caught up with the present; posting is open.
    Ready,
}

impl SyncState {
    /// Whether moving to `next` is a legal transition.
    ///
    /// The machine only ever moves forward: `Resolving → Scanning →
    /// Ready`.
    pub fn can_transition_to(self, next: SyncState) -> bool {
        matches!(
            (self, next),
            (SyncState::Resolving, SyncState::Scanning) | (SyncState::Scanning, SyncState::Ready)
        )
    }
}

/// Prerequisite signals that must all fire before scanning starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadySignal {
    /// The session's own identity is registered with the transport.
    SelfIdentity,
    /// The board owner's identity is registered with the transport.
    OwnerIdentity,
    /// The transport reports itself fully synced with the network.
    TransportSynced,
}

/// The set of readiness signals still outstanding.
///
/// Each signal is consumed exactly once; firing one that already fired
/// is reported and otherwise ignored, so a duplicate "became synced"
/// notification cannot corrupt the gate.
#[derive(Debug)]
pub struct PendingSignals {
    pending: HashSet<ReadySignal>,
}

impl PendingSignals {
    /// All signals outstanding.
    pub fn new() -> Self {
        Self {
            pending: HashSet::from([
                ReadySignal::SelfIdentity,
                ReadySignal::OwnerIdentity,
                ReadySignal::TransportSynced,
            ]),
        }
    }

    /// Consume a signal. Returns `true` when the signal was still
    /// outstanding, `false` for a duplicate.
    pub fn fire(&mut self, signal: ReadySignal) -> bool {
        self.pending.remove(&signal)
    }

    /// Whether every signal has fired at least once.
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for PendingSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// A bounded time range swept for historical messages.
///
/// Owned exclusively by the sync controller; windows only ever move
/// forward in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    /// Inclusive window start.
    pub start: DateTime<Utc>,
    /// Exclusive window end; never earlier than `start`.
    pub end: DateTime<Utc>,
}

impl ScanWindow {
    /// Create a window, clamping `end` to keep `start <= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// The window that continues this one: it begins where this one
    /// ended and extends by `step`, capped at `now`.
    pub fn next(&self, step: chrono::Duration, now: DateTime<Utc>) -> Self {
        Self::new(self.end, (self.end + step).min(now).max(self.end))
    }

    /// Whether the window has reached the given present moment.
    pub fn reached(&self, now: DateTime<Utc>) -> bool {
        self.end >= now
    }
}
