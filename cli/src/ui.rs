//! Terminal adapter for `FormUi`.

use formrelay_core::{FormUi, FormValues, Settings, Status, StatusLevel};

/// Form values come from command-line flags; status lines go to stdout.
///
/// Saved settings only fill in connection fields the user did not pass
/// explicitly.
#[derive(Debug)]
pub struct TerminalUi {
    values: FormValues,
    url_from_flag: bool,
    method_from_flag: bool,
    navigated_to: Option<String>,
    last_status: Option<Status>,
}

impl TerminalUi {
    pub fn new(values: FormValues, url_from_flag: bool, method_from_flag: bool) -> Self {
        Self {
            values,
            url_from_flag,
            method_from_flag,
            navigated_to: None,
            last_status: None,
        }
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn navigated_to(&self) -> Option<&str> {
        self.navigated_to.as_deref()
    }

    pub fn last_status(&self) -> Option<&Status> {
        self.last_status.as_ref()
    }
}

impl FormUi for TerminalUi {
    fn read_form_values(&self) -> FormValues {
        self.values.clone()
    }

    fn render_status(&mut self, status: &Status) {
        let marker = match status.level {
            StatusLevel::Ready => "·",
            StatusLevel::Sending => "…",
            StatusLevel::Success => "✓",
            StatusLevel::Error => "✗",
        };
        println!("{marker} {}", status.message);
        self.last_status = Some(status.clone());
    }

    fn set_submit_enabled(&mut self, enabled: bool) {
        tracing::trace!(enabled, "submit control");
    }

    fn apply_settings(&mut self, settings: &Settings) {
        if !self.url_from_flag {
            self.values.endpoint_url = settings.endpoint_url.clone();
        }
        if !self.method_from_flag {
            self.values.method = settings.http_method.to_string();
        }
    }

    fn clear_form(&mut self) {
        self.values.name.clear();
        self.values.email.clear();
        self.values.phone.clear();
    }

    fn navigate(&mut self, target: &str) {
        tracing::debug!(target_view = target, "navigating");
        self.navigated_to = Some(target.to_string());
    }
}
