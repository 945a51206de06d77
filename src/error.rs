//! Error types for chainbbs.

use thiserror::Error;

/// Common error type for chainbbs.
#[derive(Error, Debug)]
pub enum BoardError {
    /// Validation error for a malformed request.
    ///
    /// Covers sub-dust author payments, a missing `reply_to` on a
    /// non-owner post, and a `reply_to` that matches no known
    /// transaction. Never retried automatically.
    #[error("validation error: {0}")]
    Validation(String),

    /// The spendable inputs cannot cover the outputs plus fee.
    ///
    /// Carries the minimum balance that would have been required, so the
    /// caller can decide whether to retry with different parameters.
    #[error("insufficient funds: minimum required balance is {required}")]
    InsufficientFunds {
        /// Minimum total input value required for the rejected plan.
        required: u64,
    },

    /// A scanned transaction carried message-shaped outputs that did not
    /// reassemble into a valid post. Skipped during scanning, never
    /// surfaced as a session-level error.
    #[error("malformed message")]
    MalformedMessage,

    /// Error reported by the external ledger transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport rejected a broadcast transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The session has been closed.
    #[error("session closed")]
    Closed,

    /// Payload serialization error.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for chainbbs operations.
pub type Result<T> = std::result::Result<T, BoardError>;
