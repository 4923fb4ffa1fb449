//! End-to-end submissions against the live mock webhook.
//!
//! # Design
//! Starts the mock webhook on a random port in its own thread, then sends
//! real requests through `ReqwestTransport` and the controller. Checks what
//! the receiving side actually parsed, not just what the builder produced.

use std::net::SocketAddr;
use std::time::Duration;

use formrelay_core::{
    send, ControllerOptions, DocumentFile, FormInput, FormUi, FormValues, HttpMethod, JsonFileStore,
    KeyValueStore, PayloadTags, RelayConfig, ReqwestTransport, Settings, Status, StoredResult,
    SubmissionController, SubmissionResult, TransportError, WebhookClient,
};
use mock_webhook::Db;

fn start_mock_webhook() -> (SocketAddr, Db) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let db = Db::default();
    let server_db = db.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_webhook::run_with_db(listener, server_db).await
        })
        .unwrap();
    });

    (addr, db)
}

fn tags() -> PayloadTags {
    PayloadTags {
        analysis_type: "pdf_analysis".to_string(),
        origin: "formrelay".to_string(),
    }
}

fn ana(file: Option<DocumentFile>) -> FormInput {
    FormInput {
        name: "Ana".to_string(),
        email: "ana@x.com".to_string(),
        phone: "+551166666666".to_string(),
        file,
    }
}

fn small_pdf() -> DocumentFile {
    DocumentFile::new("contract.pdf", "application/pdf", b"%PDF-1.4\n%tiny\n".to_vec())
}

#[tokio::test]
async fn multipart_fields_match_data_part_on_the_wire() {
    let (addr, db) = start_mock_webhook();
    let client = WebhookClient::new(&format!("http://{addr}/webhook/abc"), HttpMethod::Post, tags());

    let request = client.build_submission(ana(Some(small_pdf()))).unwrap();
    let result = send(&ReqwestTransport::new(), request).await;
    let SubmissionResult::Success(body) = result else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(body.into_value()["ok"], true);

    let received = db.read().await;
    assert_eq!(received.len(), 1);
    let submission = &received[0];
    assert!(submission
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("multipart/form-data; boundary="));

    let data = submission.data.as_ref().expect("data part parsed");
    for field in ["name", "email", "phone", "analysisType", "origin", "timestamp"] {
        assert_eq!(
            data[field].as_str(),
            submission.fields.get(field).map(String::as_str),
            "{field}"
        );
    }
    assert_eq!(submission.fields["fileName"], "contract.pdf");
    assert_eq!(submission.fields["fileSize"], "15");

    let file = submission.file.as_ref().unwrap();
    assert_eq!(file.file_name.as_deref(), Some("contract.pdf"));
    assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(file.size, 15);
}

#[tokio::test]
async fn document_near_the_size_limit_is_delivered() {
    let (addr, db) = start_mock_webhook();
    let client = WebhookClient::new(&format!("http://{addr}/webhook/big"), HttpMethod::Post, tags());

    let size = (formrelay_core::validate::MAX_FILE_BYTES - 1024) as usize;
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(size, b'0');
    let document = DocumentFile::new("big.pdf", "application/pdf", bytes);
    formrelay_core::validate::validate_file(&document, &Default::default()).unwrap();

    let result = send(&ReqwestTransport::new(), client.build_submission(ana(Some(document))).unwrap()).await;
    assert!(result.is_success(), "{result:?}");

    let received = db.read().await;
    let file = received[0].file.as_ref().unwrap();
    assert_eq!(file.file_name.as_deref(), Some("big.pdf"));
    assert_eq!(file.size, size);
}

#[tokio::test]
async fn json_submission_without_file() {
    let (addr, db) = start_mock_webhook();
    let client = WebhookClient::new(&format!("http://{addr}/webhook/json"), HttpMethod::Put, tags());

    let result = send(&ReqwestTransport::new(), client.build_submission(ana(None)).unwrap()).await;
    assert!(result.is_success());

    let received = db.read().await;
    assert_eq!(received[0].method, "PUT");
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
    let json = received[0].json.as_ref().unwrap();
    assert_eq!(json["analysisType"], "pdf_analysis");
    assert!(json.get("fileMetadata").is_none());
}

#[tokio::test]
async fn plain_text_success_is_kept_as_text() {
    let (addr, _db) = start_mock_webhook();
    let client = WebhookClient::new(&format!("http://{addr}/webhook-text/abc"), HttpMethod::Post, tags());
    let result = send(&ReqwestTransport::new(), client.build_submission(ana(None)).unwrap()).await;
    assert_eq!(
        result,
        SubmissionResult::Success(formrelay_core::ResponseBody::Text("Workflow was started".to_string()))
    );
}

#[tokio::test]
async fn inactive_webhook_is_an_http_error_with_hint() {
    let (addr, db) = start_mock_webhook();
    let client = WebhookClient::new(&format!("http://{addr}/webhook-test/abc"), HttpMethod::Post, tags());

    let result = send(&ReqwestTransport::new(), client.build_submission(ana(Some(small_pdf()))).unwrap()).await;
    let SubmissionResult::Failure(err) = result else {
        panic!("404 must fail");
    };
    assert!(err.is_not_found());
    assert!(matches!(&err, TransportError::Http { status_text, .. } if status_text == "Not Found"));
    assert!(err.user_message().contains("inactive"));
    assert!(err.user_message().contains("not registered"));
    assert!(db.read().await.is_empty());
}

#[tokio::test]
async fn refused_connection_is_classified() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = WebhookClient::new(&format!("http://{addr}/webhook/abc"), HttpMethod::Post, tags());
    let result = send(&ReqwestTransport::new(), client.build_submission(ana(None)).unwrap()).await;
    assert!(matches!(result, SubmissionResult::Failure(TransportError::Connection { .. })));
}

/// Stands in for the page: fixed form values, records navigation.
struct FixedUi {
    values: FormValues,
    navigated: Vec<String>,
}

impl FormUi for FixedUi {
    fn read_form_values(&self) -> FormValues {
        self.values.clone()
    }

    fn render_status(&mut self, _status: &Status) {}

    fn set_submit_enabled(&mut self, _enabled: bool) {}

    fn apply_settings(&mut self, settings: &Settings) {
        self.values.endpoint_url = settings.endpoint_url.clone();
    }

    fn clear_form(&mut self) {}

    fn navigate(&mut self, target: &str) {
        self.navigated.push(target.to_string());
    }
}

fn quick_options() -> ControllerOptions {
    let mut options = ControllerOptions::from(&RelayConfig::default());
    options.success_delay = Duration::from_millis(5);
    options.failure_delay = Duration::from_millis(5);
    options
}

#[tokio::test]
async fn controller_round_trip_persists_to_file_store() {
    let (addr, db) = start_mock_webhook();
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("storage.json");

    let ui = FixedUi {
        values: FormValues {
            endpoint_url: format!("http://{addr}/webhook/abc"),
            method: "post".to_string(),
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            phone: "+551166666666".to_string(),
        },
        navigated: Vec::new(),
    };
    let mut controller = SubmissionController::new(
        ReqwestTransport::new(),
        JsonFileStore::new(&store_path),
        ui,
        quick_options(),
    );
    controller.on_file_selected(small_pdf()).unwrap();
    let result = controller.on_submit().await.unwrap();
    assert!(result.is_success());
    assert_eq!(controller.ui().navigated, vec!["results".to_string()]);
    assert_eq!(db.read().await.len(), 1);

    // A fresh store instance sees what the controller wrote.
    let reopened = formrelay_core::Persistence::new(JsonFileStore::new(&store_path));
    let settings = reopened.load_settings().unwrap();
    assert_eq!(settings.endpoint_url, format!("http://{addr}/webhook/abc"));
    assert_eq!(settings.http_method, HttpMethod::Post);

    let outcome = reopened.load_outcome().unwrap().unwrap();
    assert!(!outcome.result.is_error());
    assert_eq!(outcome.user.file_name, "contract.pdf");
    assert!(reopened.store().get("submission-outcome").unwrap().is_some());
}

#[tokio::test]
async fn controller_records_connection_failure() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("storage.json");

    let ui = FixedUi {
        values: FormValues {
            endpoint_url: format!("http://{addr}/webhook/abc"),
            method: String::new(),
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            phone: "+551166666666".to_string(),
        },
        navigated: Vec::new(),
    };
    let mut controller =
        SubmissionController::new(ReqwestTransport::new(), JsonFileStore::new(&store_path), ui, quick_options());
    controller.on_file_selected(small_pdf()).unwrap();
    controller.on_submit().await.unwrap();
    assert_eq!(controller.ui().navigated, vec!["results".to_string()]);

    let outcome = controller.persistence().load_outcome().unwrap().unwrap();
    let StoredResult::Failure(record) = outcome.result else {
        panic!("expected failure record");
    };
    assert!(record.error);
    assert!(record.message.starts_with("Connection error"));
}
