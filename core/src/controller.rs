//! Submission workflow: validate, build, send, persist, navigate.
//!
//! # Design
//! The controller owns the selected document and the workflow phase. It
//! talks to the page only through `FormUi`, to the network only through a
//! `Transport`, and to storage only through `Persistence`. The host wires UI
//! events to the `on_*` methods.
//!
//! While a submission is in flight the phase is not `Idle` and the submit
//! control is disabled; that is the only guard against duplicate requests.
//! It is scoped to one controller instance.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::client::{send, WebhookClient};
use crate::config::{MessagesConfig, RelayConfig};
use crate::error::{ControllerError, TransportError, ValidationError};
use crate::http::HttpMethod;
use crate::storage::{KeyValueStore, Persistence};
use crate::transport::Transport;
use crate::types::{
    format_file_size, DocumentFile, FormInput, FormValues, PayloadTags, Settings, SubmissionResult,
    UserSnapshot,
};
use crate::validate::{validate, validate_endpoint, validate_file, ValidationRules};

/// Where the controller is in the submit workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Sending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Ready,
    Sending,
    Success,
    Error,
}

/// A status line for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub level: StatusLevel,
    pub message: String,
}

impl Status {
    pub fn new(level: StatusLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// The page as seen by the controller.
pub trait FormUi {
    fn read_form_values(&self) -> FormValues;
    fn render_status(&mut self, status: &Status);
    fn set_submit_enabled(&mut self, enabled: bool);
    /// Pre-fill connection fields from saved settings.
    fn apply_settings(&mut self, settings: &Settings);
    fn clear_form(&mut self);
    fn navigate(&mut self, target: &str);
}

/// Behaviour knobs, normally derived from `RelayConfig`.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub rules: ValidationRules,
    pub tags: PayloadTags,
    pub test_origin: String,
    pub default_method: HttpMethod,
    pub success_delay: Duration,
    pub failure_delay: Duration,
    pub results_target: String,
    pub messages: MessagesConfig,
}

impl From<&RelayConfig> for ControllerOptions {
    fn from(config: &RelayConfig) -> Self {
        Self {
            rules: config.submission.validation_rules(),
            tags: config.submission.tags(),
            test_origin: config.submission.test_origin.clone(),
            default_method: config.endpoint.method,
            success_delay: config.ui.success_delay(),
            failure_delay: config.ui.failure_delay(),
            results_target: config.ui.results_target.clone(),
            messages: config.messages.clone(),
        }
    }
}

/// Validated form, ready to be built into a request.
struct Prepared {
    url: String,
    method: HttpMethod,
    input: FormInput,
}

/// Holds the controller in `Sending` with submit disabled. Dropping it,
/// whether the request finished or its future was cancelled, returns the
/// controller to `Idle` and re-enables submit.
struct InFlight<'a, T, S, U: FormUi> {
    controller: &'a mut SubmissionController<T, S, U>,
    finished: bool,
}

impl<'a, T, S, U: FormUi> InFlight<'a, T, S, U> {
    fn begin(controller: &'a mut SubmissionController<T, S, U>) -> Self {
        controller.phase = Phase::Sending;
        controller.ui.set_submit_enabled(false);
        Self {
            controller,
            finished: false,
        }
    }
}

impl<T, S, U: FormUi> Drop for InFlight<'_, T, S, U> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(phase = ?self.controller.phase, "request cancelled before completion");
        }
        self.controller.ui.set_submit_enabled(true);
        self.controller.phase = Phase::Idle;
    }
}

pub struct SubmissionController<T, S, U> {
    transport: T,
    persistence: Persistence<S>,
    ui: U,
    options: ControllerOptions,
    phase: Phase,
    uploaded_file: Option<DocumentFile>,
}

impl<T, S, U> SubmissionController<T, S, U>
where
    T: Transport,
    S: KeyValueStore,
    U: FormUi,
{
    pub fn new(transport: T, store: S, ui: U, options: ControllerOptions) -> Self {
        Self {
            transport,
            persistence: Persistence::new(store),
            ui,
            options,
            phase: Phase::Idle,
            uploaded_file: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub fn uploaded_file(&self) -> Option<&DocumentFile> {
        self.uploaded_file.as_ref()
    }

    /// Restore saved connection settings into the form.
    pub fn start(&mut self) -> Option<Settings> {
        let settings = self.persistence.load_settings();
        if let Some(settings) = &settings {
            debug!(url = %settings.endpoint_url, method = %settings.http_method, "restoring saved settings");
            self.ui.apply_settings(settings);
        }
        self.ui
            .render_status(&Status::new(StatusLevel::Ready, self.options.messages.ready.clone()));
        settings
    }

    /// Accept or reject a newly chosen document. A rejected file also drops
    /// any previously held one.
    pub fn on_file_selected(&mut self, file: DocumentFile) -> Result<(), ValidationError> {
        if let Err(e) = validate_file(&file, &self.options.rules) {
            warn!(file = %file.name, error = %e, "document rejected");
            self.uploaded_file = None;
            self.ui.render_status(&Status::new(StatusLevel::Error, e.to_string()));
            return Err(e);
        }
        info!(file = %file.name, size = file.size(), "document selected");
        self.ui.render_status(&Status::new(
            StatusLevel::Ready,
            format!("Document loaded: {} ({})", file.name, format_file_size(file.size())),
        ));
        self.uploaded_file = Some(file);
        Ok(())
    }

    pub fn on_file_removed(&mut self) {
        self.uploaded_file = None;
        self.ui.render_status(&Status::new(StatusLevel::Ready, "Document removed"));
    }

    /// Clear the contact fields and the held document.
    pub fn on_clear(&mut self) {
        self.ui.clear_form();
        self.uploaded_file = None;
        self.ui
            .render_status(&Status::new(StatusLevel::Ready, self.options.messages.cleared.clone()));
    }

    /// Run one submission to completion.
    ///
    /// Validation failures are rendered and returned without touching
    /// storage or the network. Transport failures are not errors here: they
    /// are persisted, shown, and followed by navigation just like a success,
    /// and returned as `SubmissionResult::Failure`.
    ///
    /// Dropping the returned future mid-flight returns the controller to
    /// `Idle` with submit enabled; the held document is not restored.
    pub async fn on_submit(&mut self) -> Result<SubmissionResult, ControllerError> {
        if self.phase != Phase::Idle {
            return Err(ControllerError::Busy);
        }

        self.phase = Phase::Validating;
        let prepared = match self.prepare() {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!(error = %e, "submission rejected by validation");
                self.ui.render_status(&Status::new(StatusLevel::Error, e.to_string()));
                self.phase = Phase::Idle;
                return Err(e.into());
            }
        };

        let mut in_flight = InFlight::begin(self);
        let outcome = in_flight.controller.deliver(prepared).await;
        in_flight.finished = true;
        outcome
    }

    /// Everything after validation. Runs under an `InFlight` guard.
    async fn deliver(&mut self, prepared: Prepared) -> Result<SubmissionResult, ControllerError> {
        self.ui
            .render_status(&Status::new(StatusLevel::Sending, self.options.messages.sending.clone()));

        let settings = Settings {
            endpoint_url: prepared.url.clone(),
            http_method: prepared.method,
        };
        if let Err(e) = self.persistence.save_settings(&settings) {
            warn!(error = %e, "could not save connection settings");
        }

        let user = UserSnapshot::from_input(&prepared.input);
        let client = WebhookClient::new(&prepared.url, prepared.method, self.options.tags.clone());
        let request = match client.build_submission(prepared.input) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "could not build submission");
                self.ui.render_status(&Status::new(StatusLevel::Error, e.to_string()));
                return Err(e.into());
            }
        };

        info!(url = %prepared.url, method = %prepared.method, multipart = request.is_multipart(), "submitting");
        let result = send(&self.transport, request).await;

        if let Err(e) = self.persistence.save_outcome(&result, &user, Utc::now()) {
            error!(error = %e, "could not persist submission outcome");
        }

        let delay = match &result {
            SubmissionResult::Success(_) => {
                info!("submission delivered");
                self.phase = Phase::Succeeded;
                self.ui
                    .render_status(&Status::new(StatusLevel::Success, self.options.messages.success.clone()));
                self.options.success_delay
            }
            SubmissionResult::Failure(err) => {
                warn!(error = %err, "submission failed");
                self.phase = Phase::Failed;
                let message = match err {
                    TransportError::Connection { .. } => &self.options.messages.connection_error,
                    TransportError::Http { .. } => &self.options.messages.http_error,
                };
                self.ui.render_status(&Status::new(StatusLevel::Error, message.clone()));
                self.options.failure_delay
            }
        };

        tokio::time::sleep(delay).await;
        self.ui.navigate(&self.options.results_target);
        Ok(result)
    }

    /// Post a connectivity probe to the current endpoint. Nothing is
    /// persisted and the view stays where it is.
    pub async fn on_test_connection(&mut self) -> Result<SubmissionResult, ControllerError> {
        if self.phase != Phase::Idle {
            return Err(ControllerError::Busy);
        }
        let values = self.ui.read_form_values();
        if let Err(e) = validate_endpoint(&values.endpoint_url) {
            self.ui.render_status(&Status::new(StatusLevel::Error, e.to_string()));
            return Err(e.into());
        }

        let client = WebhookClient::new(&values.endpoint_url, HttpMethod::Post, self.options.tags.clone());
        let request = client.build_connection_test(&self.options.test_origin)?;

        let mut in_flight = InFlight::begin(self);
        let controller = &mut *in_flight.controller;
        controller
            .ui
            .render_status(&Status::new(StatusLevel::Sending, "Testing webhook..."));
        let result = send(&controller.transport, request).await;

        let status = match &result {
            SubmissionResult::Success(_) => Status::new(StatusLevel::Success, "Webhook is reachable"),
            SubmissionResult::Failure(err) => Status::new(StatusLevel::Error, err.user_message()),
        };
        controller.ui.render_status(&status);
        in_flight.finished = true;
        Ok(result)
    }

    /// Read and check the form. On failure the held document stays put.
    fn prepare(&mut self) -> Result<Prepared, ValidationError> {
        let values = self.ui.read_form_values();
        validate_endpoint(&values.endpoint_url)?;
        let method = if values.method.trim().is_empty() {
            self.options.default_method
        } else {
            values.method.parse()?
        };

        let input = FormInput {
            name: values.name.trim().to_string(),
            email: values.email.trim().to_string(),
            phone: values.phone.trim().to_string(),
            file: self.uploaded_file.take(),
        };
        if let Err(e) = validate(&input, &self.options.rules) {
            self.uploaded_file = input.file;
            return Err(e);
        }

        Ok(Prepared {
            url: values.endpoint_url.trim().to_string(),
            method,
            input,
        })
    }
}
