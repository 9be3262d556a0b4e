use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether this error is a transport-level network failure
    /// (timeout or connection refusal) rather than a local fault.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_) | BridgeError::ConnectionFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
