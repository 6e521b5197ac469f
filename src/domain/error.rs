//! Domain-level error types for react-native-ide.
//!
//! All errors are typed with `thiserror`. Errors that can end a launch
//! attempt map onto a [`FailureKind`] which is what the webview gets to see.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories reported across the bridge.
///
/// A missing launch entry has no kind: it resolves to the
/// all-absent configuration and is never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The webview bundle could not be produced. Retryable.
    BuildFailure,
    /// The platform launch process could not be started or died early. Retryable.
    LaunchFailure,
    /// The app never signalled that it launched. Retryable.
    LaunchTimeout,
    /// Unknown or malformed bridge frame. Fatal to the session's channel.
    ProtocolViolation,
    /// The bridge was disposed while the attempt still needed it.
    ChannelClosed,
}

impl FailureKind {
    /// Whether a fresh attempt can be started on the same bridge.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        !matches!(self, Self::ProtocolViolation | Self::ChannelClosed)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuildFailure => write!(f, "build failure"),
            Self::LaunchFailure => write!(f, "launch failure"),
            Self::LaunchTimeout => write!(f, "launch timeout"),
            Self::ProtocolViolation => write!(f, "protocol violation"),
            Self::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Invalid input data.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Producing the webview bundle failed.
    #[error("Build failed: {message}")]
    Build { message: String },

    /// Starting or supervising the app process failed.
    #[error("Launch failed: {message}")]
    Launch { message: String },

    /// The app did not report a launch within the allowed window.
    #[error("App did not launch within {secs}s")]
    LaunchTimeout { secs: u64 },

    /// A bridge frame violated the message protocol.
    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    /// The bridge has been disposed.
    #[error("Channel closed")]
    ChannelClosed,
}

impl AppError {
    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a build error.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    /// Create a launch error.
    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch {
            message: message.into(),
        }
    }

    /// Create a protocol violation.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// The failure kind this error is reported as, if it ends an attempt.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Build { .. } => Some(FailureKind::BuildFailure),
            Self::Launch { .. } => Some(FailureKind::LaunchFailure),
            Self::LaunchTimeout { .. } => Some(FailureKind::LaunchTimeout),
            Self::ProtocolViolation { .. } => Some(FailureKind::ProtocolViolation),
            Self::ChannelClosed => Some(FailureKind::ChannelClosed),
            Self::Config { .. } | Self::Io { .. } | Self::JsonParse { .. } | Self::InvalidData { .. } => {
                None
            }
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            AppError::build("boom").failure_kind(),
            Some(FailureKind::BuildFailure)
        );
        assert_eq!(
            AppError::LaunchTimeout { secs: 5 }.failure_kind(),
            Some(FailureKind::LaunchTimeout)
        );
        assert_eq!(
            AppError::ChannelClosed.failure_kind(),
            Some(FailureKind::ChannelClosed)
        );
        assert!(AppError::InvalidData {
            message: "x".into()
        }
        .failure_kind()
        .is_none());
    }

    #[test]
    fn test_protocol_failures_are_not_recoverable() {
        assert!(FailureKind::BuildFailure.is_recoverable());
        assert!(FailureKind::LaunchTimeout.is_recoverable());
        assert!(!FailureKind::ProtocolViolation.is_recoverable());
    }

    #[test]
    fn test_failure_kind_serializes_camel_case() {
        let json = serde_json::to_string(&FailureKind::LaunchTimeout).unwrap();
        assert_eq!(json, "\"launchTimeout\"");
    }
}
