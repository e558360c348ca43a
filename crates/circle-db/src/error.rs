use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input. Nothing was written.
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or the caller may not touch the target.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The write would break a uniqueness or pairing rule.
    #[error("{0}")]
    Conflict(String),

    /// A multi-document operation failed after its first write. The state may
    /// be half-applied until the operation is retried.
    #[error("{0}")]
    Consistency(String),

    #[error("stored document is malformed: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Errors a client can act on. Everything else is a server fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Unauthorized(_) | Self::NotFound(_) | Self::Conflict(_)
        )
    }
}
