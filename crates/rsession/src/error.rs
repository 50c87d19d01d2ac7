//! Error types for session operations.

/// Error type for session operations.
///
/// An invalid cookie signature is deliberately absent: verification returns
/// `None` and the request proceeds as if no cookie had been sent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stored record could not be decoded into a session.
    #[error("Malformed session data: {0}")]
    MalformedSessionData(String),

    /// The cache backend failed or timed out.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The middleware was built or wired incorrectly.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An attribute write targeted a key owned by the record envelope.
    #[error("Reserved session key: {0}")]
    ReservedKey(String),

    /// Failed to parse a TOML configuration document.
    #[error("Failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    /// An attribute value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means the backend could not be reached.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Error::BackendUnavailable(_))
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
