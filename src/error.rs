//! Error types for the nOps provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while serving provider operations.
///
/// None of these are retried internally. The host surfaces them to the user
/// and keeps whatever state it had committed before the failed operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The nOps API answered with a non-2xx status.
    #[error("Transport error: status: {status}, body: {body}")]
    Http {
        /// HTTP status code returned by the API.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// An expected remote record is absent.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The AWS account is already fully onboarded by another project.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource configuration or state is missing a value it needs.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The host sent a request the provider cannot act on.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(msg) => msg,
            Self::Http { body, .. } => body,
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::NotFound(msg) => msg,
            Self::AlreadyExists(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Validation(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Sdk(msg) => msg,
        }
    }

    /// Whether the failure happened talking to the nOps API.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Transport(_))
    }

    /// Render the error as an error diagnostic for the host.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            Self::Configuration(_) => "Invalid provider configuration",
            Self::Http { .. } | Self::Transport(_) => "Error communicating with nOps",
            Self::NotFound(_) => "Project not found",
            Self::AlreadyExists(_) => "Project already exists",
            Self::Serialization(_) => "Unexpected nOps payload",
            Self::Validation(_) | Self::InvalidRequest(_) => "Invalid request",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Sdk(_) => "Internal provider error",
        };
        Diagnostic::error(summary).with_detail(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("project 42".to_string());
        assert_eq!(format!("{}", err), "Resource not found: project 42");

        let err = ProviderError::Http {
            status: 403,
            body: "{\"detail\":\"forbidden\"}".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Transport error: status: 403, body: {\"detail\":\"forbidden\"}"
        );

        let err = ProviderError::AlreadyExists("account 580010171808".to_string());
        assert_eq!(
            format!("{}", err),
            "Resource already exists: account 580010171808"
        );
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("missing API key".to_string());
        assert_eq!(err.message(), "missing API key");

        let err = ProviderError::Http {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn test_is_transport() {
        let err = ProviderError::Http {
            status: 502,
            body: String::new(),
        };
        assert!(err.is_transport());
        assert!(!ProviderError::NotFound("x".to_string()).is_transport());
    }

    #[test]
    fn test_to_diagnostic() {
        let diag = ProviderError::AlreadyExists("account 1".to_string()).to_diagnostic();
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Project already exists");
        assert_eq!(
            diag.detail.as_deref(),
            Some("Resource already exists: account 1")
        );
    }
}
