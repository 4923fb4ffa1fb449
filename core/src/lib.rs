//! Core of the form-to-webhook relay.
//!
//! # Overview
//! Collects a contact record and an optional PDF, validates them, relays
//! them to one configured webhook as JSON or multipart, and persists the
//! last connection settings and the outcome for a results view.
//!
//! # Design
//! - `WebhookClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `classify_response` consumes an `HttpResponse`. The `Transport` in
//!   between is the only code that does I/O on the network.
//! - `SubmissionController` drives the workflow against a `FormUi`, a
//!   `Transport` and a `KeyValueStore`, so hosts and tests swap each one.
//! - Configuration is layered with Figment; see `config`.

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod results;
pub mod storage;
pub mod transport;
pub mod types;
pub mod validate;

pub use client::{classify_response, send, WebhookClient};
pub use config::{load_config, load_config_from_path, load_config_from_str, RelayConfig};
pub use controller::{ControllerOptions, FormUi, Phase, Status, StatusLevel, SubmissionController};
pub use error::{BuildError, ControllerError, FailureKind, StoreError, TransportError, ValidationError};
pub use http::{FormPart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, OutcomeEnvelope, Persistence, StoredResult};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    DocumentFile, FormInput, FormValues, PayloadTags, ResponseBody, Settings, SubmissionPayload,
    SubmissionResult, UserSnapshot,
};
pub use validate::{validate, validate_file, ValidationRules};
