//! Request builder and response classifier for the webhook.
//!
//! # Design
//! `WebhookClient` holds the endpoint, the method and the payload tags and
//! carries no mutable state between calls. `build_*` methods produce an
//! `HttpRequest`; `classify_response` consumes an `HttpResponse`. The network
//! round-trip happens in a `Transport`, and `send` glues the two together.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::error::{BuildError, TransportError};
use crate::http::{FormPart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::transport::Transport;
use crate::types::{FormInput, PayloadTags, ResponseBody, SubmissionPayload, SubmissionResult};

const JSON_CONTENT_TYPE: (&str, &str) = ("content-type", "application/json");

/// Stateless builder for requests to one webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    url: String,
    method: HttpMethod,
    tags: PayloadTags,
}

impl WebhookClient {
    pub fn new(url: &str, method: HttpMethod, tags: PayloadTags) -> Self {
        Self {
            url: url.trim().to_string(),
            method,
            tags,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the submission request, stamping it with the current time.
    pub fn build_submission(&self, input: FormInput) -> Result<HttpRequest, BuildError> {
        self.build_submission_at(input, Utc::now())
    }

    /// Build the submission request with an explicit timestamp.
    ///
    /// A present file turns the body into a multipart form: the binary
    /// `file` part, the JSON `data` part, and every scalar of the payload
    /// again as its own text part. Without a file the payload is sent as
    /// JSON, or not at all for GET.
    pub fn build_submission_at(
        &self,
        input: FormInput,
        at: DateTime<Utc>,
    ) -> Result<HttpRequest, BuildError> {
        let FormInput {
            name,
            email,
            phone,
            file,
        } = input;

        let payload = SubmissionPayload {
            name,
            email,
            phone,
            analysis_type: self.tags.analysis_type.clone(),
            origin: self.tags.origin.clone(),
            timestamp: iso_timestamp(at),
            file_metadata: file.as_ref().map(|f| f.metadata()),
        };
        let json = serde_json::to_string(&payload)?;

        let Some(file) = file else {
            debug!(method = %self.method, "building JSON submission");
            let (headers, body) = if self.method.carries_body() {
                (vec![header(JSON_CONTENT_TYPE)], RequestBody::Json(json))
            } else {
                (Vec::new(), RequestBody::Empty)
            };
            return Ok(HttpRequest {
                method: self.method,
                url: self.url.clone(),
                headers,
                body,
            });
        };

        debug!(
            method = %self.method,
            file = %file.name,
            size = file.size(),
            "building multipart submission"
        );
        let size = file.size();
        let mut parts = vec![
            FormPart::File {
                name: "file".to_string(),
                file_name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                bytes: file.bytes,
            },
            FormPart::text("data", json),
            FormPart::text("name", payload.name.as_str()),
            FormPart::text("email", payload.email.as_str()),
            FormPart::text("phone", payload.phone.as_str()),
            FormPart::text("analysisType", payload.analysis_type.as_str()),
            FormPart::text("origin", payload.origin.as_str()),
            FormPart::text("timestamp", payload.timestamp.as_str()),
        ];
        parts.push(FormPart::text("fileName", file.name));
        parts.push(FormPart::text("fileType", file.mime_type));
        parts.push(FormPart::text("fileSize", size.to_string()));

        // No content-type header: the multipart encoder owns the boundary.
        Ok(HttpRequest {
            method: self.method,
            url: self.url.clone(),
            headers: Vec::new(),
            body: RequestBody::Multipart(parts),
        })
    }

    /// Build a connectivity probe, always a JSON POST.
    pub fn build_connection_test(&self, origin: &str) -> Result<HttpRequest, BuildError> {
        self.build_connection_test_at(origin, Utc::now())
    }

    pub fn build_connection_test_at(
        &self,
        origin: &str,
        at: DateTime<Utc>,
    ) -> Result<HttpRequest, BuildError> {
        let body = serde_json::json!({
            "test": true,
            "message": "Connectivity test",
            "timestamp": iso_timestamp(at),
            "origin": origin,
        });
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url.clone(),
            headers: vec![header(JSON_CONTENT_TYPE)],
            body: RequestBody::Json(serde_json::to_string(&body)?),
        })
    }
}

/// Map a response to the outcome of a submission.
pub fn classify_response(response: HttpResponse) -> SubmissionResult {
    if !response.is_success() {
        warn!(status = response.status, "webhook answered with an error status");
        return SubmissionResult::Failure(TransportError::Http {
            status: response.status,
            status_text: response.status_text,
            body: response.body,
        });
    }
    match serde_json::from_str(&response.body) {
        Ok(value) => SubmissionResult::Success(ResponseBody::Json(value)),
        Err(_) => SubmissionResult::Success(ResponseBody::Text(response.body)),
    }
}

/// Execute one request and classify the outcome. No retries.
pub async fn send<T: Transport + ?Sized>(transport: &T, request: HttpRequest) -> SubmissionResult {
    debug!(method = %request.method, url = %request.url, multipart = request.is_multipart(), "sending request");
    match transport.execute(request).await {
        Ok(response) => {
            debug!(status = response.status, "response received");
            classify_response(response)
        }
        Err(err) => {
            warn!(error = %err, "request did not reach the webhook");
            SubmissionResult::Failure(err)
        }
    }
}

fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn header((name, value): (&str, &str)) -> (String, String) {
    (name.to_string(), value.to_string())
}
