//! Integration tests for document upload, signed downloads and deletion.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};

use common::TestApp;

async fn upload(
    app: &TestApp,
    token: &str,
    uri: &str,
    content_type: Option<&str>,
    bytes: Vec<u8>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let response = app.send(builder.body(Body::from(bytes)).unwrap()).await;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn download(app: &TestApp, url: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let path = url.strip_prefix("http://localhost:3000").unwrap();
    let response = app
        .send(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, bytes.to_vec())
}

#[tokio::test]
async fn test_upload_list_download_delete() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;
    let pid = app.create_project(&owner.token, "Website").await;
    let task = app.create_task(&owner.token, &pid, json!({ "title": "Spec" })).await;
    let tid = task["id"].as_str().unwrap();

    let (status, doc) = upload(
        &app,
        &owner.token,
        &format!("/api/projects/{pid}/documents?name=notes.txt&task_id={tid}"),
        Some("text/plain"),
        b"hello taskflow".to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(doc["name"], "notes.txt");
    assert_eq!(doc["content_type"], "text/plain");
    assert_eq!(doc["size_bytes"], 14);
    assert_eq!(doc["task_id"], tid);
    let doc_id = doc["id"].as_str().unwrap();

    let (status, second) = upload(
        &app,
        &owner.token,
        &format!("/api/projects/{pid}/documents?name=blob.bin"),
        None,
        vec![0u8, 1, 2],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["content_type"], "application/octet-stream");

    let (status, list) = app
        .get(&format!("/api/projects/{pid}/documents"), &owner.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["documents"].as_array().unwrap().len(), 2);

    let (status, signed) = app
        .get(&format!("/api/documents/{doc_id}/url"), &owner.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let url = signed["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("http://localhost:3000/api/storage/documents/{doc_id}?")));
    assert!(signed["expires_at"].is_string());

    let (status, headers, bytes) = download(&app, url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"hello taskflow");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("notes.txt"));

    let tampered = format!("{}0", url);
    let (status, _, _) = download(&app, &tampered).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/api/documents/{doc_id}"), &owner.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = app
        .get(&format!("/api/projects/{pid}/documents"), &owner.token)
        .await;
    assert_eq!(list["documents"].as_array().unwrap().len(), 1);

    // A link signed before deletion no longer resolves.
    let (status, _, _) = download(&app, url).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, activities) = app
        .get(&format!("/api/projects/{pid}/activities?limit=3"), &owner.token)
        .await;
    let actions: Vec<&str> = activities["activities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, ["document_deleted", "document_uploaded", "document_uploaded"]);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;
    let viewer = app.signup("viewer@example.com", "Vic").await;
    let outsider = app.signup("out@example.com", "Otto").await;
    let pid = app.create_project(&owner.token, "Website").await;
    let other = app.create_project(&owner.token, "Other").await;
    let foreign = app.create_task(&owner.token, &other, json!({ "title": "Elsewhere" })).await;
    app.add_member(&owner, &pid, &viewer, "viewer").await;
    let uri = format!("/api/projects/{pid}/documents?name=a.txt");

    let too_big = vec![b'x'; app.config.max_upload_bytes + 1];
    let (status, _) = upload(&app, &owner.token, &uri, Some("text/plain"), too_big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = upload(&app, &viewer.token, &uri, None, b"hi".to_vec()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = upload(&app, &outsider.token, &uri, None, b"hi".to_vec()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = upload(
        &app,
        &owner.token,
        &format!("{uri}&task_id={}", foreign["id"].as_str().unwrap()),
        None,
        b"hi".to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app
        .get(&format!("/api/projects/{pid}/documents"), &viewer.token)
        .await;
    assert!(list["documents"].as_array().unwrap().is_empty());
}
