//! In-process harness: a router over a throwaway data dir with an outbox mailer.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use taskflow_server::{build_router, AppConfig, AppState, Mailer};

pub struct TestApp {
    router: Router,
    pub mailer: Mailer,
    pub config: AppConfig,
    _dir: TempDir,
}

pub struct TestUser {
    pub token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_tests(dir.path());
        adjust(&mut config);
        let mailer = Mailer::outbox();
        let state = AppState::new(config.clone(), mailer.clone(), None).unwrap();
        Self {
            router: build_router(state),
            mailer,
            config,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// JSON request; returns the status and the parsed body (`Null` if empty).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.send(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn signup(&self, email: &str, display_name: &str) -> TestUser {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": "correct-horse-9",
                    "display_name": display_name,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        TestUser {
            token: body["access_token"].as_str().unwrap().to_string(),
            refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
            user_id: body["user_id"].as_str().unwrap().to_string(),
            email: email.to_string(),
        }
    }

    /// Most recent verification code mailed to `email`.
    pub fn last_code(&self, email: &str) -> String {
        let sent = self.mailer.sent();
        let mail = sent
            .iter()
            .rev()
            .find(|m| m.to == email && m.subject.contains("verification code"))
            .expect("no verification email");
        mail.subject.rsplit(' ').next().unwrap().to_string()
    }

    pub async fn create_project(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post("/api/projects", token, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create project failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn create_task(&self, token: &str, project_id: &str, body: Value) -> Value {
        let (status, task) = self
            .post(&format!("/api/projects/{project_id}/tasks"), token, body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {task}");
        task
    }

    /// Invite `member` to the project with `role` and accept on their behalf.
    pub async fn add_member(
        &self,
        owner: &TestUser,
        project_id: &str,
        member: &TestUser,
        role: &str,
    ) {
        let (status, invite) = self
            .post(
                &format!("/api/projects/{project_id}/invites"),
                &owner.token,
                serde_json::json!({ "email": member.email, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "invite failed: {invite}");
        let token = invite["token"].as_str().unwrap();
        let (status, body) = self
            .call(
                Method::POST,
                &format!("/api/invites/{token}/accept"),
                Some(&member.token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "accept failed: {body}");
    }
}
