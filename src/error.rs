// ⚠️ Error taxonomy for the registry sync engine
//
// Configuration and Encoding errors come out of signing and are fatal to
// the attempt. Upstream and Persistence errors are domain-scoped: the
// engine logs them and moves on to the next domain.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or unusable configuration (no private key, bad numeric setting).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Key material or signature that is not valid base64.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Key or signature bytes of the wrong length.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Registry answered with a non-200 status, or every retry failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Participant store read or write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Prefix the message with the operation that failed, keeping the variant.
    pub fn context(self, operation: impl std::fmt::Display) -> Self {
        match self {
            SyncError::Configuration(msg) => SyncError::Configuration(format!("{operation}: {msg}")),
            SyncError::Encoding(msg) => SyncError::Encoding(format!("{operation}: {msg}")),
            SyncError::Crypto(msg) => SyncError::Crypto(format!("{operation}: {msg}")),
            SyncError::Upstream(msg) => SyncError::Upstream(format!("{operation}: {msg}")),
            SyncError::Persistence(msg) => SyncError::Persistence(format!("{operation}: {msg}")),
            other => other,
        }
    }

    /// Short machine-friendly name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Configuration(_) => "configuration",
            SyncError::Encoding(_) => "encoding",
            SyncError::Crypto(_) => "crypto",
            SyncError::Upstream(_) => "upstream",
            SyncError::Persistence(_) => "persistence",
            SyncError::Serialization(_) => "serialization",
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Persistence(err.to_string())
    }
}
