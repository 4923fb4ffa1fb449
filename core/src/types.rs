//! Domain types for one form submission.
//!
//! # Design
//! `FormInput` owns the selected document, so a submission consumes the file
//! instead of reading it from shared state. The wire-facing structs use
//! camelCase names because that is what the receiving workflow reads.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::http::HttpMethod;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A document chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring `application/pdf` for `.pdf` names.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = if name.to_ascii_lowercase().ends_with(".pdf") {
            PDF_MIME_TYPE
        } else {
            "application/octet-stream"
        };
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size(),
        }
    }
}

/// Raw values read from the form, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pub endpoint_url: String,
    pub method: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Contact fields plus the optional document of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub file: Option<DocumentFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// JSON document sent to the webhook, either as the body or as the `data`
/// part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub analysis_type: String,
    pub origin: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_metadata: Option<FileMetadata>,
}

/// Constant labels the receiving workflow uses to route a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadTags {
    pub analysis_type: String,
    pub origin: String,
}

/// Last-used connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub endpoint_url: String,
    pub http_method: HttpMethod,
}

/// Denormalized copy of who submitted what, read by the results view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub file_name: String,
}

impl UserSnapshot {
    pub const NO_FILE: &'static str = "N/A";

    pub fn from_input(input: &FormInput) -> Self {
        Self {
            name: input.name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            file_name: input
                .file
                .as_ref()
                .map(|f| f.name.clone())
                .unwrap_or_else(|| Self::NO_FILE.to_string()),
        }
    }
}

/// Body of a 2xx response: JSON when it parses, raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    pub fn into_value(self) -> serde_json::Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => serde_json::Value::String(text),
        }
    }
}

/// Terminal result of one request to the webhook.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResult {
    Success(ResponseBody),
    Failure(crate::error::TransportError),
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionResult::Success(_))
    }
}

/// Human-readable size, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
