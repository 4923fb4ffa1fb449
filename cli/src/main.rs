//! formrelay - send a contact record and a PDF to a webhook.
//!
//! Terminal front-end for `formrelay-core`: flags stand in for the form,
//! stdout for the status line, and the `result` view for the results page.

mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use formrelay_core::results::render_last_outcome;
use formrelay_core::validate::{looks_like_webhook, validate_endpoint};
use formrelay_core::{
    ControllerOptions, DocumentFile, FormValues, HttpMethod, JsonFileStore, KeyValueStore, Persistence,
    RelayConfig, ReqwestTransport, Settings, SubmissionController,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::ui::TerminalUi;

/// Send a contact record and a PDF to a webhook.
#[derive(Parser, Debug)]
#[command(name = "formrelay", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the form, send it and show the result.
    Submit(SubmitArgs),
    /// Post a connectivity probe to the webhook.
    TestConnection {
        #[arg(long)]
        url: Option<String>,
    },
    /// Show or change the saved connection settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Show the outcome of the last submission.
    Result,
    /// Forget the outcome of the last submission.
    Clear,
    /// List the example form templates.
    Templates,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// PDF document to attach.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Webhook URL; defaults to the saved settings, then the config.
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    method: Option<String>,
    /// Prefill name, e-mail and phone from a template.
    #[arg(long)]
    template: Option<String>,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the saved URL and method.
    Show,
    /// Save a URL and method for later submissions.
    Set {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "POST")]
        method: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => formrelay_core::load_config_from_path(path),
        None => formrelay_core::load_config(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("formrelay: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Submit(args) => submit(&config, args).await,
        Commands::TestConnection { url } => test_connection(&config, url).await,
        Commands::Settings { action } => settings(&config, action),
        Commands::Result => show_result(&persistence(&config)),
        Commands::Clear => clear(&config),
        Commands::Templates => {
            for (key, template) in &config.templates {
                println!("{key:<12} {:<12} {} <{}>", template.label, template.name, template.email);
            }
            ExitCode::SUCCESS
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("formrelay=info,formrelay_core=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn persistence(config: &RelayConfig) -> Persistence<JsonFileStore> {
    Persistence::new(JsonFileStore::new(&config.storage.path))
}

fn form_values(config: &RelayConfig, args: &SubmitArgs) -> FormValues {
    let template = args.template.as_deref().and_then(|name| config.template(name));
    FormValues {
        endpoint_url: args.url.clone().unwrap_or_else(|| config.endpoint.url.clone()),
        method: args.method.clone().unwrap_or_else(|| config.endpoint.method.to_string()),
        name: pick(&args.name, template.map(|t| &t.name)),
        email: pick(&args.email, template.map(|t| &t.email)),
        phone: pick(&args.phone, template.map(|t| &t.phone)),
    }
}

/// Flag value, else the template's, else empty.
fn pick(flag: &Option<String>, from_template: Option<&String>) -> String {
    flag.clone()
        .or_else(|| from_template.cloned())
        .unwrap_or_default()
}

async fn submit(config: &RelayConfig, args: SubmitArgs) -> ExitCode {
    let ui = TerminalUi::new(form_values(config, &args), args.url.is_some(), args.method.is_some());
    let mut controller = SubmissionController::new(
        ReqwestTransport::new(),
        JsonFileStore::new(&config.storage.path),
        ui,
        ControllerOptions::from(config),
    );
    controller.start();

    let url = controller.ui().values().endpoint_url.clone();
    if !url.is_empty() && !looks_like_webhook(&url) {
        warn!(%url, "URL does not look like a webhook endpoint");
    }

    if let Some(path) = &args.file {
        let file = match DocumentFile::from_path(path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("formrelay: cannot read {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        };
        if controller.on_file_selected(file).is_err() {
            return ExitCode::FAILURE;
        }
    }

    let result = match controller.on_submit().await {
        Ok(result) => result,
        Err(_) => return ExitCode::FAILURE,
    };
    if controller.ui().navigated_to().is_some() {
        show_result(controller.persistence());
    }
    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn test_connection(config: &RelayConfig, url: Option<String>) -> ExitCode {
    let values = FormValues {
        endpoint_url: url.clone().unwrap_or_else(|| config.endpoint.url.clone()),
        ..FormValues::default()
    };
    let mut controller = SubmissionController::new(
        ReqwestTransport::new(),
        JsonFileStore::new(&config.storage.path),
        TerminalUi::new(values, url.is_some(), true),
        ControllerOptions::from(config),
    );
    controller.start();
    match controller.on_test_connection().await {
        Ok(result) if result.is_success() => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn settings(config: &RelayConfig, action: SettingsAction) -> ExitCode {
    let saved_state = persistence(config);
    match action {
        SettingsAction::Show => {
            match saved_state.load_settings() {
                Some(saved) => println!("{} {}", saved.http_method, saved.endpoint_url),
                None => println!("no saved settings"),
            }
            ExitCode::SUCCESS
        }
        SettingsAction::Set { url, method } => {
            let http_method = match method.parse::<HttpMethod>() {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("formrelay: {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = validate_endpoint(&url) {
                eprintln!("formrelay: {e}");
                return ExitCode::FAILURE;
            }
            let saved = Settings {
                endpoint_url: url.trim().to_string(),
                http_method,
            };
            match saved_state.save_settings(&saved) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("formrelay: could not save settings: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn show_result<S: KeyValueStore>(persistence: &Persistence<S>) -> ExitCode {
    match render_last_outcome(persistence) {
        Ok(Some(text)) => {
            println!();
            print!("{text}");
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("no submission recorded yet");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("formrelay: could not read the last outcome: {e}");
            ExitCode::FAILURE
        }
    }
}

fn clear(config: &RelayConfig) -> ExitCode {
    match persistence(config).clear_outcome() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("formrelay: could not clear the last outcome: {e}");
            ExitCode::FAILURE
        }
    }
}
