use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_webhook::{app, app_with_db, Db, ReceivedSubmission};
use tower::ServiceExt;

const BOUNDARY: &str = "X-FORMRELAY-TEST-BOUNDARY";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

/// Hand-encoded multipart body; fine for fixed test fields.
fn multipart_request(uri: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<String> {
    let mut body = String::new();
    if let Some((file_name, bytes)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n{}\r\n",
            String::from_utf8_lossy(bytes)
        ));
    }
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

// --- JSON ---

#[tokio::test]
async fn json_submission_is_recorded() {
    let db = Db::default();
    let resp = app_with_db(db.clone())
        .oneshot(json_request("POST", "/webhook/abc", r#"{"name":"Ana","origin":"formrelay"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let ack: serde_json::Value = body_json(resp).await;
    assert_eq!(ack["ok"], true);

    let received = db.read().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].webhook, "abc");
    assert_eq!(received[0].method, "POST");
    assert_eq!(received[0].json.as_ref().unwrap()["name"], "Ana");
    assert_eq!(ack["id"], received[0].id.to_string());
}

#[tokio::test]
async fn malformed_json_returns_400() {
    let resp = app()
        .oneshot(json_request("POST", "/webhook/abc", "{nope"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_without_body_is_accepted() {
    let db = Db::default();
    let resp = app_with_db(db.clone())
        .oneshot(Request::builder().uri("/webhook/abc").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let received = db.read().await;
    assert_eq!(received[0].method, "GET");
    assert!(received[0].json.is_none());
}

// --- multipart ---

#[tokio::test]
async fn multipart_submission_records_fields_and_file() {
    let db = Db::default();
    let data = r#"{"name":"Ana","email":"ana@x.com"}"#;
    let resp = app_with_db(db.clone())
        .oneshot(multipart_request(
            "/webhook/abc",
            &[("data", data), ("name", "Ana"), ("email", "ana@x.com")],
            Some(("contract.pdf", b"%PDF-1.4 tiny")),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let received = db.read().await;
    let submission = &received[0];
    assert_eq!(submission.fields["name"], "Ana");
    assert_eq!(submission.fields["email"], "ana@x.com");
    assert_eq!(submission.data.as_ref().unwrap()["email"], "ana@x.com");

    let file = submission.file.as_ref().unwrap();
    assert_eq!(file.field, "file");
    assert_eq!(file.file_name.as_deref(), Some("contract.pdf"));
    assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(file.size, 13);
}

#[tokio::test]
async fn multipart_larger_than_axum_default_limit_is_accepted() {
    let db = Db::default();
    let pdf = vec![b'0'; 3 * 1024 * 1024];
    let resp = app_with_db(db.clone())
        .oneshot(multipart_request(
            "/webhook/abc",
            &[("name", "Ana")],
            Some(("big.pdf", pdf.as_slice())),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(db.read().await[0].file.as_ref().unwrap().size, pdf.len());
}

// --- canned endpoints ---

#[tokio::test]
async fn inactive_webhook_returns_404_text() {
    let resp = app()
        .oneshot(json_request("POST", "/webhook-test/abc", "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_bytes(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("not registered"));
}

#[tokio::test]
async fn text_webhook_answers_plain_text() {
    let resp = app()
        .oneshot(json_request("POST", "/webhook-text/abc", "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert_eq!(&body[..], b"Workflow was started");
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let resp = app()
        .oneshot(Request::builder().uri("/nowhere").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- listing ---

#[tokio::test]
async fn submissions_are_listed_in_arrival_order() {
    use tower::Service;

    let mut app = app().into_service();

    for name in ["first", "second"] {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(json_request("POST", "/webhook/abc", &format!(r#"{{"name":"{name}"}}"#)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(Request::builder().uri("/submissions").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: Vec<ReceivedSubmission> = body_json(resp).await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].json.as_ref().unwrap()["name"], "first");
    assert_eq!(listed[1].json.as_ref().unwrap()["name"], "second");
}
