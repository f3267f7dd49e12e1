/// The chat stream could not be opened. Returned synchronously, no callback ever fires.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The request never produced a response
    #[error("failed to open chat stream: {0}")]
    Request(#[from] ::reqwest::Error),
    /// The server answered with a non-success status
    #[error("chat stream rejected with status {status}: {body}")]
    Status { status: u16, body: String },
}

impl SetupError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SetupError::Request(e) => e.status().map(|status| status.as_u16()),
            SetupError::Status { status, .. } => Some(*status),
        }
    }
}
