//! Error types for the replication engine.

use thiserror::Error;
use vconsync_store::StoreError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can escape the engine's per-key and per-event handling.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Store-level failure outside any single key's unit of work, e.g. a
    /// failed scan-page request.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The change subscription ended or failed; live updates have stopped.
    #[error("change subscription lost: {0}")]
    SubscriptionLost(String),

    /// A notification channel name did not follow `<namespace> ':' <key>`.
    #[error("malformed notification channel {channel:?}: missing key after ':' delimiter")]
    ChannelParse {
        /// The channel name as received.
        channel: String,
    },
}
