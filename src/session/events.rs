//! Session event stream.
//!
//! Events are fanned out over a broadcast channel; subscribers that lag
//! behind simply miss intermediate progress updates.

use chrono::{DateTime, Utc};

use crate::board::Post;
use crate::identity::PublicKey;

/// Events emitted by a board session.
#[derive(Debug, Clone)]
pub enum BoardEvent {
    /// The board's owner identity has been resolved.
    IdentityResolved {
        /// The owner's public key.
        owner: PublicKey,
        /// Whether this session is the owner.
        is_owner: bool,
    },
    /// No valid discovery record was found; this session became the
    /// owner and the caller should publish the given TXT record.
    RecordNeeded {
        /// The formatted `bt=v1` record to publish.
        record: String,
    },
    /// One historical scan pass finished.
    ScanProgress {
        /// How far history has been swept.
        scanned_through: DateTime<Utc>,
        /// The present moment the sweep is heading for.
        target: DateTime<Utc>,
    },
    /// Historical scanning caught up with the present.
    ScanComplete,
    /// A post was decoded and added to the board.
    NewPost(Post),
    /// The network rejected a broadcast post.
    BroadcastRejected {
        /// Display hash of the rejected transaction.
        txid: String,
        /// Reason given by the transport.
        reason: String,
    },
}
