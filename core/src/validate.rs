//! Presence and format checks run before a submission is built.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::types::{DocumentFile, FormInput, PDF_MIME_TYPE};

/// Upper bound on the attached document, 10 MiB.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Knobs for `validate`, usually taken from the `submission` config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub require_document: bool,
    pub max_file_bytes: u64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            require_document: true,
            max_file_bytes: MAX_FILE_BYTES,
        }
    }
}

/// Check a form before it is sent.
///
/// Fields are checked first, then the e-mail, then the document. The first
/// failing check wins.
pub fn validate(input: &FormInput, rules: &ValidationRules) -> Result<(), ValidationError> {
    for (field, value) in [
        ("name", &input.name),
        ("email", &input.email),
        ("phone", &input.phone),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingField(field));
        }
    }

    if !is_valid_email(&input.email) {
        return Err(ValidationError::InvalidEmail);
    }

    match &input.file {
        Some(file) => validate_file(file, rules),
        None if rules.require_document => Err(ValidationError::MissingFile),
        None => Ok(()),
    }
}

/// Checks applied when a file is chosen: size first, then type.
pub fn validate_file(file: &DocumentFile, rules: &ValidationRules) -> Result<(), ValidationError> {
    if file.size() > rules.max_file_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file.size(),
            limit: rules.max_file_bytes,
        });
    }
    if !is_pdf(file) {
        return Err(ValidationError::UnsupportedFileType);
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    email.is_ascii() && EMAIL_PATTERN.is_match(email)
}

fn is_pdf(file: &DocumentFile) -> bool {
    file.mime_type.eq_ignore_ascii_case(PDF_MIME_TYPE) || file.name.to_ascii_lowercase().ends_with(".pdf")
}

/// Require an absolute http(s) URL.
pub fn validate_endpoint(url: &str) -> Result<(), ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::MissingEndpoint);
    }
    match reqwest::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::InvalidEndpoint(url.to_string())),
    }
}

/// Advisory only: webhook URLs of the usual automation hosts carry
/// `webhook` in their path.
pub fn looks_like_webhook(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|parsed| parsed.path().contains("webhook"))
        .unwrap_or(false)
}
