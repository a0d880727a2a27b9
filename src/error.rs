//! Error types and handling for Octofr
//!
//! This module defines the error types used throughout the crate. The
//! refresh coordinator collapses every failure of a fetch cycle into the
//! single recoverable [`OctoError::Refresh`] kind while keeping the original
//! cause reachable through [`std::error::Error::source`].

use thiserror::Error;

/// Result type alias for Octofr operations
pub type Result<T> = std::result::Result<T, OctoError>;

/// Main error type for Octofr
#[derive(Debug, Error)]
pub enum OctoError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// GraphQL API errors (error payloads, missing data)
    #[error("API error: {message}")]
    Api { message: String },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// A fetch cycle failed; the previous snapshot stays published
    #[error("Refresh failed: {message}")]
    Refresh {
        message: String,
        #[source]
        source: Option<Box<OctoError>>,
    },
}

impl OctoError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        OctoError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        OctoError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        OctoError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        OctoError::Api {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        OctoError::Auth {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        OctoError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        OctoError::Timeout {
            message: message.into(),
        }
    }

    /// Create a refresh failure without an underlying cause
    pub fn refresh<S: Into<String>>(message: S) -> Self {
        OctoError::Refresh {
            message: message.into(),
            source: None,
        }
    }

    /// Rewrap any error as a refresh failure. An existing refresh failure is
    /// returned unchanged so causes are never wrapped twice.
    pub fn into_refresh_failure(self) -> Self {
        match self {
            OctoError::Refresh { .. } => self,
            other => OctoError::Refresh {
                message: format!("Error communicating with API: {}", other),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Whether the host should simply retry on its next tick
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OctoError::Refresh { .. }
                | OctoError::Network { .. }
                | OctoError::Timeout { .. }
                | OctoError::Api { .. }
        )
    }
}

impl From<std::io::Error> for OctoError {
    fn from(err: std::io::Error) -> Self {
        OctoError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for OctoError {
    fn from(err: serde_yaml::Error) -> Self {
        OctoError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for OctoError {
    fn from(err: serde_json::Error) -> Self {
        OctoError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for OctoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OctoError::timeout(err.to_string())
        } else if err.is_decode() {
            OctoError::Serialization {
                message: err.to_string(),
            }
        } else {
            OctoError::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for OctoError {
    fn from(err: chrono::ParseError) -> Self {
        OctoError::validation("datetime", err.to_string().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_creation() {
        let err = OctoError::config("test config error");
        assert!(matches!(err, OctoError::Config { .. }));

        let err = OctoError::api("test api error");
        assert!(matches!(err, OctoError::Api { .. }));

        let err = OctoError::validation("field", "test validation error");
        assert!(matches!(err, OctoError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = OctoError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = OctoError::validation("test_field", "invalid value");
        assert_eq!(
            format!("{}", err),
            "Validation error: test_field - invalid value"
        );
    }

    #[test]
    fn test_refresh_wrapping_keeps_cause() {
        let err = OctoError::network("connection reset").into_refresh_failure();
        assert!(matches!(err, OctoError::Refresh { .. }));
        assert!(err.to_string().contains("connection reset"));
        let cause = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert_eq!(cause, "Network error: connection reset");
    }

    #[test]
    fn test_refresh_not_double_wrapped() {
        let err = OctoError::refresh("Missing account_id in API response").into_refresh_failure();
        assert_eq!(
            err.to_string(),
            "Refresh failed: Missing account_id in API response"
        );
        assert!(err.source().is_none());
    }
}
