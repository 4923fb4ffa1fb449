use std::{collections::BTreeMap, sync::Arc};

use axum::{
    body::to_bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// File part of a multipart submission; only its shape is kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

/// One request as seen by the webhook.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceivedSubmission {
    pub id: Uuid,
    pub webhook: String,
    pub method: String,
    pub content_type: Option<String>,
    /// Text parts of a multipart body.
    pub fields: BTreeMap<String, String>,
    /// The multipart `data` part, parsed.
    pub data: Option<serde_json::Value>,
    /// A JSON request body.
    pub json: Option<serde_json::Value>,
    pub file: Option<ReceivedFile>,
}

pub type Db = Arc<RwLock<Vec<ReceivedSubmission>>>;

pub fn app() -> Router {
    app_with_db(Db::default())
}

/// Router sharing `db`, so callers can inspect what was received.
pub fn app_with_db(db: Db) -> Router {
    Router::new()
        .route("/webhook/{id}", any(receive))
        .route("/webhook-test/{id}", any(inactive))
        .route("/webhook-text/{id}", any(plain_text))
        .route("/submissions", get(list_submissions))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_db(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_db(db)).await
}

async fn receive(
    State(db): State<Db>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let method = request.method().clone();
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut submission = ReceivedSubmission {
        id: Uuid::new_v4(),
        webhook: id,
        method: method.to_string(),
        content_type: content_type.clone(),
        fields: BTreeMap::new(),
        data: None,
        json: None,
        file: None,
    };

    let is_multipart = content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        read_multipart(multipart, &mut submission).await?;
    } else if method != Method::GET {
        let bytes = to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        if !bytes.is_empty() {
            let json = serde_json::from_slice(&bytes)
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid JSON: {e}")))?;
            submission.json = Some(json);
        }
    }

    debug!(webhook = %submission.webhook, method = %submission.method, fields = submission.fields.len(), "submission received");
    let id = submission.id;
    db.write().await.push(submission);
    Ok(Json(serde_json::json!({ "ok": true, "id": id })))
}

async fn read_multipart(
    mut multipart: Multipart,
    submission: &mut ReceivedSubmission,
) -> Result<(), (StatusCode, String)> {
    let bad_request = |e: axum::extract::multipart::MultipartError| (StatusCode::BAD_REQUEST, e.to_string());
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad_request)?;
            submission.file = Some(ReceivedFile {
                field: name,
                file_name: Some(file_name),
                content_type,
                size: bytes.len(),
            });
            continue;
        }
        let text = field.text().await.map_err(bad_request)?;
        if name == "data" {
            submission.data = serde_json::from_str(&text).ok();
        }
        submission.fields.insert(name, text);
    }
    Ok(())
}

/// Mimics a test webhook whose workflow is not listening.
async fn inactive(Path(id): Path<String>) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("The requested webhook \"{id}\" is not registered."),
    )
}

async fn plain_text() -> &'static str {
    "Workflow was started"
}

async fn list_submissions(State(db): State<Db>) -> Json<Vec<ReceivedSubmission>> {
    Json(db.read().await.clone())
}
