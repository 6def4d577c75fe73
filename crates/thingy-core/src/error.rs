/*!
 * Error types for the Thingy driver.
 *
 * A single error enum is shared by the codec layer and the driver so that
 * failures can travel unchanged from a codec, through a feature operation,
 * onto the session event stream.
 */
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for Thingy operations
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// Bad caller input: out-of-range field or malformed object
    #[error("Validation error: {0}")]
    Validation(String),

    /// The attribute lacks the requested capability, or no codec is configured
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Connection drop, platform denial or underlying I/O failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// A bounded wait ran out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Malformed payload length or out-of-range bytes
    #[error("Decode error: {0}")]
    Decode(String),

    /// The session is not connected
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Already exists error
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Runtime error (lock poisoning, subscriber setup)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for Thingy operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new validation error
    pub fn validation<S: AsRef<str>>(msg: S) -> Self {
        Error::Validation(msg.as_ref().to_string())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: AsRef<str>>(msg: S) -> Self {
        Error::Unsupported(msg.as_ref().to_string())
    }

    /// Create a new transport error
    pub fn transport<S: AsRef<str>>(msg: S) -> Self {
        Error::Transport(msg.as_ref().to_string())
    }

    /// Create a new timeout error
    pub fn timeout<S: AsRef<str>>(msg: S) -> Self {
        Error::Timeout(msg.as_ref().to_string())
    }

    /// Create a new decode error
    pub fn decode<S: AsRef<str>>(msg: S) -> Self {
        Error::Decode(msg.as_ref().to_string())
    }

    /// Create a new not connected error
    pub fn not_connected<S: AsRef<str>>(msg: S) -> Self {
        Error::NotConnected(msg.as_ref().to_string())
    }

    /// Create a new configuration error
    pub fn config<S: AsRef<str>>(msg: S) -> Self {
        Error::Config(msg.as_ref().to_string())
    }

    /// Create a new already exists error
    pub fn already_exists<S: AsRef<str>>(msg: S) -> Self {
        Error::AlreadyExists(msg.as_ref().to_string())
    }

    /// Create a new not found error
    pub fn not_found<S: AsRef<str>>(msg: S) -> Self {
        Error::NotFound(msg.as_ref().to_string())
    }

    /// Create a new runtime error
    pub fn runtime<S: AsRef<str>>(msg: S) -> Self {
        Error::Runtime(msg.as_ref().to_string())
    }

    /// Create a new other error
    pub fn other<S: AsRef<str>>(msg: S) -> Self {
        Error::Other(msg.as_ref().to_string())
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Validation, unsupported and decode failures are deterministic and
    /// are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::validation("intensity must be in the range 0 - 100");
        assert_eq!(
            err.to_string(),
            "Validation error: intensity must be in the range 0 - 100"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(Error::transport("link lost").is_retryable());
        assert!(Error::timeout("no attribute").is_retryable());
        assert!(!Error::decode("short payload").is_retryable());
        assert!(!Error::validation("bad").is_retryable());
        assert!(!Error::unsupported("no read").is_retryable());
    }
}
