//! Unified error type for Weft operations
//!
//! A single error enum covers every failure the middleware can surface.
//! Exceptions attached to an invocation travel back to the remote caller,
//! so the type is serializable and carries plain-string messages.

use serde::{Deserialize, Serialize};

/// Result alias used across the workspace
pub type WeftResult<T> = Result<T, WeftError>;

/// Unified error type for all Weft operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum WeftError {
    /// Invocation rejected before any network activity
    #[error("Malformed invocation: {message}")]
    MalformedInvocation {
        /// What was missing or inconsistent
        message: String,
    },

    /// No protocol stack satisfying the mandatory layers could be composed
    #[error("Composition failed: {message}")]
    CompositionFailed {
        /// Which layer or constraint could not be satisfied
        message: String,
    },

    /// Handshake framing violated the wire format
    #[error("Handshake error: {message}")]
    Handshake {
        /// What the decoder or encoder rejected
        message: String,
    },

    /// I/O failure on a connector
    #[error("I/O error: {message}")]
    Io {
        /// Underlying I/O failure, flattened to a message
        message: String,
    },

    /// Inbound call could not be routed to a handler
    #[error("Dispatch failed: {message}")]
    Dispatch {
        /// Why the target could not be served
        message: String,
    },

    /// A plug-in reported a failure
    #[error("Plug-in error: {message}")]
    Plugin {
        /// Failure reported by the plug-in
        message: String,
    },

    /// Payload encoding or decoding failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// What failed to encode or decode
        message: String,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },
}

impl WeftError {
    /// Create a malformed-invocation error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInvocation {
            message: message.into(),
        }
    }

    /// Create a composition-failure error
    pub fn composition(message: impl Into<String>) -> Self {
        Self::CompositionFailed {
            message: message.into(),
        }
    }

    /// Create a handshake error
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a dispatch error
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }

    /// Create a plug-in error
    pub fn plugin(message: impl Into<String>) -> Self {
        Self::Plugin {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for WeftError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let err = WeftError::composition("no transport candidate");
        assert_eq!(err.to_string(), "Composition failed: no transport candidate");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer gone");
        let err: WeftError = io.into();
        assert!(matches!(err, WeftError::Io { .. }));
    }
}
