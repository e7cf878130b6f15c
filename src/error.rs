//! Error types for moodle-harvest
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Errors fall into two groups. Fatal errors (missing credentials, rejected
//! authentication, report schema violations) end the run. Per-resource errors
//! (fetch and extraction failures) are recorded and skipped by the pipeline.

use thiserror::Error;

/// The main error type for moodle-harvest
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Credential / Authentication Errors
    // ============================================================================
    #[error("No credentials available: {hint}")]
    NoCredential { hint: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ============================================================================
    // Per-resource Errors
    // ============================================================================
    #[error("Failed to fetch {resource}: {message}")]
    Fetch { resource: String, message: String },

    #[error("Failed to extract {kind} page: {message}")]
    Extraction { kind: String, message: String },

    // ============================================================================
    // Report Errors
    // ============================================================================
    #[error(
        "Report schema violation in '{report}' at record {index}: missing {missing:?}, unexpected {unexpected:?}"
    )]
    ReportSchema {
        report: String,
        index: usize,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a no-credential error
    pub fn no_credential(hint: impl Into<String>) -> Self {
        Self::NoCredential { hint: hint.into() }
    }

    /// Create an authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a fetch error for a resource
    pub fn fetch(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error for a page kind
    pub fn extraction(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if this error must stop the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::NoCredential { .. } | Error::Authentication { .. } | Error::ReportSchema { .. }
        )
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for moodle-harvest
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
