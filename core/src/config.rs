//! Configuration model and Figment-based loader.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/formrelay/formrelay.toml`
//! 3. `~/.config/formrelay/formrelay.toml`
//! 4. `./formrelay.toml`
//! 5. `FORMRELAY_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::http::HttpMethod;
use crate::types::PayloadTags;
use crate::validate::{ValidationRules, MAX_FILE_BYTES};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub messages: MessagesConfig,

    /// Example form contents, selectable by name.
    #[serde(default = "default_templates")]
    pub templates: BTreeMap<String, FormTemplate>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            submission: SubmissionConfig::default(),
            ui: UiConfig::default(),
            storage: StorageConfig::default(),
            messages: MessagesConfig::default(),
            templates: default_templates(),
        }
    }
}

impl RelayConfig {
    /// Look up a template; unknown names fall back to `user`.
    pub fn template(&self, name: &str) -> Option<&FormTemplate> {
        self.templates
            .get(name)
            .or_else(|| self.templates.get(FALLBACK_TEMPLATE))
    }
}

/// Where submissions go.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Webhook URL. Empty means it must come from saved settings or the form.
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub method: HttpMethod,
}

/// Payload tags and validation limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionConfig {
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,

    #[serde(default = "default_origin")]
    pub origin: String,

    /// Origin tag of connectivity probes.
    #[serde(default = "default_test_origin")]
    pub test_origin: String,

    #[serde(default = "default_true")]
    pub require_document: bool,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            analysis_type: default_analysis_type(),
            origin: default_origin(),
            test_origin: default_test_origin(),
            require_document: true,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl SubmissionConfig {
    pub fn tags(&self) -> PayloadTags {
        PayloadTags {
            analysis_type: self.analysis_type.clone(),
            origin: self.origin.clone(),
        }
    }

    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            require_document: self.require_document,
            max_file_bytes: self.max_file_bytes,
        }
    }
}

fn default_analysis_type() -> String {
    "pdf_analysis".to_string()
}

fn default_origin() -> String {
    "formrelay".to_string()
}

fn default_test_origin() -> String {
    "formrelay_test".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_file_bytes() -> u64 {
    MAX_FILE_BYTES
}

/// Post-submission behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UiConfig {
    #[serde(default = "default_success_delay_ms")]
    pub success_delay_ms: u64,

    #[serde(default = "default_failure_delay_ms")]
    pub failure_delay_ms: u64,

    /// Navigation target that renders the persisted outcome.
    #[serde(default = "default_results_target")]
    pub results_target: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            success_delay_ms: default_success_delay_ms(),
            failure_delay_ms: default_failure_delay_ms(),
            results_target: default_results_target(),
        }
    }
}

impl UiConfig {
    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_delay_ms)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }
}

fn default_success_delay_ms() -> u64 {
    2000
}

fn default_failure_delay_ms() -> u64 {
    3000
}

fn default_results_target() -> String {
    "results".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// JSON file holding settings and the last outcome.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("formrelay").join("storage.json"))
        .unwrap_or_else(|| PathBuf::from("formrelay-storage.json"))
}

/// Status lines shown while and after sending.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessagesConfig {
    #[serde(default = "default_ready")]
    pub ready: String,

    #[serde(default = "default_sending")]
    pub sending: String,

    #[serde(default = "default_success")]
    pub success: String,

    #[serde(default = "default_connection_error")]
    pub connection_error: String,

    #[serde(default = "default_http_error")]
    pub http_error: String,

    #[serde(default = "default_cleared")]
    pub cleared: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            ready: default_ready(),
            sending: default_sending(),
            success: default_success(),
            connection_error: default_connection_error(),
            http_error: default_http_error(),
            cleared: default_cleared(),
        }
    }
}

fn default_ready() -> String {
    "Ready".to_string()
}

fn default_sending() -> String {
    "Sending document for analysis...".to_string()
}

fn default_success() -> String {
    "Analysis submitted. Opening results...".to_string()
}

fn default_connection_error() -> String {
    "Connection error. Opening details...".to_string()
}

fn default_http_error() -> String {
    "Analysis failed. Opening details...".to_string()
}

fn default_cleared() -> String {
    "Form cleared".to_string()
}

/// Example contents for the contact fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FormTemplate {
    pub label: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

const FALLBACK_TEMPLATE: &str = "user";

fn default_templates() -> BTreeMap<String, FormTemplate> {
    let entries = [
        ("contact", "Contact", "João Silva", "joao.silva@email.com", "+55 11 99999-9999"),
        ("lead", "Lead", "Maria Santos", "maria.santos@empresa.com", "+55 21 88888-8888"),
        ("support", "Support", "Pedro Costa", "pedro@minhaempresa.com", "+55 11 77777-7777"),
        ("newsletter", "Newsletter", "Usuário Teste", "usuario@email.com", ""),
        ("document", "PDF", "Ana Oliveira", "ana@email.com", "+55 11 66666-6666"),
        (FALLBACK_TEMPLATE, "User", "Ana Oliveira", "ana@email.com", "+55 11 66666-6666"),
    ];
    entries
        .into_iter()
        .map(|(key, label, name, email, phone)| {
            (
                key.to_string(),
                FormTemplate {
                    label: label.to_string(),
                    name: name.to_string(),
                    email: email.to_string(),
                    phone: phone.to_string(),
                },
            )
        })
        .collect()
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<RelayConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string on top of the defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file("/etc/formrelay/formrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("formrelay/formrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("formrelay.toml"))
        .merge(env_provider())
}

/// Maps `FORMRELAY_ENDPOINT_URL` to `endpoint.url` and so on. Only the
/// first underscore after the section name is a separator, so
/// `FORMRELAY_UI_SUCCESS_DELAY_MS` becomes `ui.success_delay_ms`.
fn env_provider() -> Env {
    Env::prefixed("FORMRELAY_").map(|key| {
        let mapped = key
            .as_str()
            .replacen("endpoint_", "endpoint.", 1)
            .replacen("submission_", "submission.", 1)
            .replacen("ui_", "ui.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("messages_", "messages.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.endpoint.method, HttpMethod::Post);
        assert!(config.endpoint.url.is_empty());
        assert_eq!(config.ui.success_delay(), Duration::from_secs(2));
        assert_eq!(config.ui.failure_delay(), Duration::from_secs(3));
        assert_eq!(config.submission.max_file_bytes, 10_485_760);
        assert!(config.submission.require_document);
        assert_eq!(config.ui.results_target, "results");
    }

    #[test]
    fn toml_overrides_sections() {
        let config = load_config_from_str(
            r#"
            [endpoint]
            url = "https://n8n.example.com/webhook/abc"
            method = "put"

            [submission]
            origin = "kiosk"
            require_document = false

            [templates.custom]
            label = "Custom"
            name = "Bea"
            email = "bea@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint.url, "https://n8n.example.com/webhook/abc");
        assert_eq!(config.endpoint.method, HttpMethod::Put);
        assert_eq!(config.submission.tags().origin, "kiosk");
        assert_eq!(config.submission.tags().analysis_type, "pdf_analysis");
        assert!(!config.submission.validation_rules().require_document);
        assert_eq!(config.template("custom").unwrap().name, "Bea");
        assert!(config.template("document").is_some());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(load_config_from_str("[endpoint]\nurll = \"x\"").is_err());
        assert!(load_config_from_str("[endpoint]\nmethod = \"BREW\"").is_err());
    }

    #[test]
    fn unknown_template_falls_back_to_user() {
        let config = RelayConfig::default();
        let template = config.template("does-not-exist").unwrap();
        assert_eq!(template.label, "User");
    }
}
