//! Plain-text rendering of the last persisted outcome.

use std::fmt::Write;

use crate::error::StoreError;
use crate::storage::{KeyValueStore, OutcomeEnvelope, Persistence, StoredResult};

/// Load and render the last outcome, or `None` when nothing was submitted.
pub fn render_last_outcome<S: KeyValueStore>(
    persistence: &Persistence<S>,
) -> Result<Option<String>, StoreError> {
    Ok(persistence.load_outcome()?.map(|envelope| render(&envelope)))
}

pub fn render(envelope: &OutcomeEnvelope) -> String {
    let mut out = String::new();
    let user = &envelope.user;
    let heading = if envelope.result.is_error() {
        "Submission failed"
    } else {
        "Analysis result"
    };
    let _ = writeln!(out, "{heading}");
    if !envelope.timestamp.is_empty() {
        let _ = writeln!(out, "  at:       {}", envelope.timestamp);
    }
    let _ = writeln!(out, "  name:     {}", user.name);
    let _ = writeln!(out, "  email:    {}", user.email);
    let _ = writeln!(out, "  phone:    {}", user.phone);
    let _ = writeln!(out, "  document: {}", user.file_name);
    let _ = writeln!(out);

    match &envelope.result {
        StoredResult::Failure(record) => {
            let _ = writeln!(out, "{}", record.message);
            if let Some(hint) = &record.hint {
                let _ = writeln!(out, "hint: {hint}");
            }
        }
        StoredResult::Success(serde_json::Value::String(text)) => {
            let _ = writeln!(out, "{text}");
        }
        StoredResult::Success(value) => {
            let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            let _ = writeln!(out, "{pretty}");
        }
    }
    out
}
