use thiserror::Error;

/// Failures of the bridge's own plumbing.
///
/// Vendor results are never reported through this type: they travel as
/// [`Outcome`](crate::domain::outcome::Outcome) values to the caller's callback.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
