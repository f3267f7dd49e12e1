//! Error types used across the crate
//!
//! - [StreamError]: the stream broke while reading, reported once through `on_error`.
//! - [PayloadError]: one frame's payload was malformed, logged and skipped.
//! - `SetupError` (requires `reqwest`): the stream could not be opened, returned before any callback.

#[cfg(feature = "reqwest")]
pub mod reqwest;
#[cfg(feature = "reqwest")]
pub use reqwest::SetupError;

use crate::constants::UNEXPECTED_END_MESSAGE;

/// Runtime failure of an open stream. Always terminal.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum StreamError<E> {
    /// Reading the next chunk from the underlying source failed
    #[error("failed to read stream: {0}")]
    Transport(E),
    /// The source ran out before a `done` or `error` frame arrived
    #[error("{}", UNEXPECTED_END_MESSAGE)]
    UnexpectedEnd,
}

impl<E> StreamError<E> {
    pub fn is_unexpected_end(&self) -> bool {
        matches!(self, Self::UnexpectedEnd)
    }
}

/// A `data:` line that could not be turned into an event
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Not a single well-formed JSON value
    #[error("invalid payload: {0}")]
    Syntax(#[from] serde_json::Error),
    /// `changes` of a `file_changes` frame is not a list of file changes
    #[error("invalid file changes: {0}")]
    Changes(#[from] serde_path_to_error::Error<serde_json::Error>),
}
