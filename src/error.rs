//! Error types for flowsmith.
//!
//! Validation problems in a workflow are not errors: they are reported as
//! [`Issue`](crate::workflow::Issue)s inside a result so operators see all of
//! them at once. This enum covers everything else, most importantly the four
//! ways a signed request to the execution engine can fail.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for flowsmith operations.
pub type Result<T> = std::result::Result<T, Error>;

/// flowsmith error types.
///
/// Each variant carries a stable code that tooling can match on.
#[derive(Error, Debug)]
pub enum Error {
    /// Engine base URL or API key is missing. Raised before any network I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine could not be reached (DNS, connect, reset, TLS...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within its time budget.
    #[error("Request exceeded time budget of {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The engine answered with a non-2xx status.
    #[error("Engine returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    /// Operation parameters rejected locally before sending.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A workflow document could not be read as JSON/YAML.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error code for programmatic matching.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Timeout { .. } => "TIMEOUT",
            Error::Remote { .. } => "REMOTE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Coarse category, used by callers deciding whether to retry.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport(_) | Error::Timeout { .. } => ErrorCategory::Transient,
            Error::Remote { status, .. } if *status == 429 || *status >= 500 => {
                ErrorCategory::Transient
            }
            Error::Remote { .. } | Error::Validation(_) | Error::Parse(_) => {
                ErrorCategory::ClientError
            }
            Error::Config(_) => ErrorCategory::Configuration,
            Error::Internal(_) | Error::Json(_) | Error::Yaml(_) | Error::Io(_) => {
                ErrorCategory::Permanent
            }
        }
    }

    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// HTTP status returned by the engine, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Convert to a JSON error envelope.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "code": self.code(),
            "category": self.category(),
            "message": self.to_string(),
        });
        if let Some(status) = self.status() {
            error["status"] = serde_json::json!(status);
        }
        serde_json::json!({
            "success": false,
            "error": error,
        })
    }
}

/// Error categories for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Fix the request or the local setup before trying again.
    ClientError,
    /// Credentials or base URL missing.
    Configuration,
    /// May succeed on retry.
    Transient,
    /// Unlikely to succeed on retry.
    Permanent,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::ClientError => write!(f, "client_error"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Transient => write!(f, "transient"),
            ErrorCategory::Permanent => write!(f, "permanent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failures_are_distinguishable() {
        let transport = Error::Transport("connection refused".into());
        let timeout = Error::Timeout { timeout_ms: 10_000 };
        let remote = Error::Remote {
            status: 404,
            message: "Agent not found".into(),
        };

        assert_eq!(transport.code(), "TRANSPORT_ERROR");
        assert_eq!(timeout.code(), "TIMEOUT");
        assert_eq!(remote.code(), "REMOTE_ERROR");
        assert_eq!(remote.status(), Some(404));
        assert_eq!(transport.status(), None);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Transport("reset".into()).is_retryable());
        assert!(Error::Timeout { timeout_ms: 1 }.is_retryable());
        assert!(Error::Remote {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
        assert!(!Error::Remote {
            status: 422,
            message: "bad config".into()
        }
        .is_retryable());
        assert!(!Error::Config("missing key".into()).is_retryable());
    }

    #[test]
    fn test_to_json_includes_status() {
        let json = Error::Remote {
            status: 401,
            message: "Invalid signature".into(),
        }
        .to_json();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "REMOTE_ERROR");
        assert_eq!(json["error"]["status"], 401);
        assert_eq!(json["error"]["category"], "client_error");
    }
}
