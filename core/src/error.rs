//! Error types for the relay core.
//!
//! # Design
//! Validation errors are user-correctable and never reach the network.
//! Transport errors are outcomes, not controller failures: they are persisted
//! and shown on the results view like a successful response would be. A 404
//! keeps the `Http` classification but gets its own user message, because it
//! almost always means the receiving workflow is not active.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hint shown for connection-level failures.
pub const CONNECTION_HINT: &str =
    "Check that the URL is correct and that the webhook host is reachable.";

/// Hint shown when the webhook answers 404.
pub const INACTIVE_WORKFLOW_HINT: &str =
    "Check that the receiving workflow is active; test webhooks only answer while the workflow is listening.";

/// Reasons a form is rejected before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please enter the webhook URL")]
    MissingEndpoint,

    #[error("webhook URL is not a valid http(s) URL: {0}")]
    InvalidEndpoint(String),

    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),

    #[error("please fill in the {0} field")]
    MissingField(&'static str),

    #[error("please enter a valid e-mail address")]
    InvalidEmail,

    #[error("please select a PDF file for analysis")]
    MissingFile,

    #[error("only PDF files are accepted")]
    UnsupportedFileType,

    #[error("file is too large ({size} bytes); the maximum is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },
}

/// Errors raised while building a request.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which side of the wire a submission failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Connection,
    Http,
}

/// Terminal failures of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// DNS failure, refused connection, TLS failure or a body that could not
    /// be read.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },
}

impl TransportError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TransportError::Connection { .. } => FailureKind::Connection,
            TransportError::Http { .. } => FailureKind::Http,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Http { status: 404, .. })
    }

    /// Message persisted for the results view.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Connection { message } => {
                format!("Connection error: {message}. {CONNECTION_HINT}")
            }
            TransportError::Http { status: 404, body, .. } => format!(
                "Webhook not found (404); the remote workflow is probably inactive. Details: {body}"
            ),
            TransportError::Http {
                status,
                status_text,
                body,
            } => format!("HTTP {status}: {status_text}. Details: {body}"),
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            TransportError::Connection { .. } => Some(CONNECTION_HINT),
            TransportError::Http { status: 404, .. } => Some(INACTIVE_WORKFLOW_HINT),
            TransportError::Http { .. } => None,
        }
    }
}

/// Errors from the key-value store backing persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("stored data is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Reasons `SubmissionController` refuses or aborts a submission.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A submission is already in flight on this controller.
    #[error("a submission is already in progress")]
    Busy,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Build(#[from] BuildError),
}
