//! Error types for E2E scenarios

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Timed out after {timeout_ms} ms waiting for: {condition}")]
    NavigationTimeout { condition: String, timeout_ms: u64 },

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Token decode error: {0}")]
    DecodeError(String),

    #[error("Unexpected status from {method} {url}: got {got}, want {want}")]
    UnexpectedStatus {
        method: String,
        url: String,
        got: u16,
        want: u16,
    },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Scenario spec parse error: {0}")]
    SpecParse(String),

    #[error("Unknown artifact reference: {0}")]
    MissingArtifact(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl E2eError {
    /// Stable identifier recorded in result reports.
    pub fn kind(&self) -> &'static str {
        match self {
            E2eError::NavigationTimeout { .. } => "navigation_timeout",
            E2eError::NotFound(_) => "not_found",
            E2eError::DecodeError(_) => "decode_error",
            E2eError::UnexpectedStatus { .. } => "unexpected_status",
            E2eError::AssertionFailed(_) => "assertion_failure",
            E2eError::Browser(_) => "browser",
            E2eError::SpecParse(_) => "spec_parse",
            E2eError::MissingArtifact(_) => "missing_artifact",
            E2eError::Config(_) => "config",
            E2eError::Io(_) => "io",
            E2eError::Json(_) => "json",
            E2eError::Yaml(_) => "yaml",
            E2eError::Toml(_) => "toml",
            E2eError::Http(_) => "http",
            E2eError::Url(_) => "url",
        }
    }

    pub(crate) fn assertion(message: impl Into<String>) -> Self {
        E2eError::AssertionFailed(message.into())
    }
}

impl From<chromiumoxide::error::CdpError> for E2eError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        E2eError::Browser(e.to_string())
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_status_message_names_both_codes() {
        let err = E2eError::UnexpectedStatus {
            method: "POST".to_string(),
            url: "https://localhost:8443/cas/actuator/attributeConsent/import".to_string(),
            got: 400,
            want: 201,
        };
        let msg = err.to_string();
        assert!(msg.contains("got 400"));
        assert!(msg.contains("want 201"));
        assert_eq!(err.kind(), "unexpected_status");
    }

    #[test]
    fn test_timeout_is_distinct_from_assertion() {
        let timeout = E2eError::NavigationTimeout {
            condition: "#confirm visible".to_string(),
            timeout_ms: 500,
        };
        let assertion = E2eError::assertion("text mismatch");
        assert_ne!(timeout.kind(), assertion.kind());
    }
}
