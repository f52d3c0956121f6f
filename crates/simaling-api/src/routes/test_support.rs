//! Shared fixtures for router tests

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::Duration;
use serde_json::Value;
use simaling_auth::{JwtManager, hash_password};
use simaling_db::{Database, NewUser, Role, User};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::routes::create_router;
use crate::state::AppState;
use crate::uploads::UploadStore;

pub const TEST_SECRET: &str = "router-test-secret";
pub const BASE_URL: &str = "http://simaling.test";
const BOUNDARY: &str = "simaling-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub uploads_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads_dir = tempfile::tempdir().unwrap();
        let db = Database::new("sqlite::memory:").await.unwrap();
        let jwt = Arc::new(JwtManager::new(TEST_SECRET, Duration::hours(24)));
        let uploads = Arc::new(UploadStore::new(uploads_dir.path(), BASE_URL));

        let state = AppState::new(db, jwt, uploads);
        let router = create_router(state.clone(), None);
        Self {
            router,
            state,
            uploads_dir,
        }
    }

    pub async fn create_user(&self, phone_no: &str, password: &str, role: Role) -> User {
        self.insert(phone_no, None, password, role).await
    }

    pub async fn create_user_with_nik(
        &self,
        phone_no: &str,
        nik: &str,
        password: &str,
        role: Role,
    ) -> User {
        self.insert(phone_no, Some(nik), password, role).await
    }

    async fn insert(&self, phone_no: &str, nik: Option<&str>, password: &str, role: Role) -> User {
        self.state
            .db
            .insert_user(
                NewUser {
                    phone_no: phone_no.to_string(),
                    nik: nik.map(str::to_string),
                    email: None,
                    password_hash: hash_password(password).unwrap(),
                    name: format!("Warga {}", phone_no),
                    address: "Blok A No. 1".to_string(),
                    role,
                },
                Vec::new(),
            )
            .await
            .unwrap()
            .0
    }

    /// Token for `user` without going through `/login`
    pub fn token_for(&self, user: &User) -> String {
        self.state.jwt.generate_token(user.id).unwrap()
    }

    pub async fn login(&self, phone_no: &str, password: &str) -> String {
        let (status, body) = self
            .post_json(
                "/login",
                None,
                serde_json::json!({"phone_no": phone_no, "password": password}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, Body::empty(), None).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, token, Body::empty(), None).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            uri,
            token,
            Body::from(body.to_string()),
            Some("application/json".to_string()),
        )
        .await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(
            Method::PUT,
            uri,
            token,
            Body::from(body.to_string()),
            Some("application/json".to_string()),
        )
        .await
    }

    /// POST a multipart form of text fields plus an optional `image` file
    pub async fn post_multipart(
        &self,
        uri: &str,
        token: Option<&str>,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> (StatusCode, Value) {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, data)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        self.send(
            Method::POST,
            uri,
            token,
            Body::from(body),
            Some(format!("multipart/form-data; boundary={}", BOUNDARY)),
        )
        .await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Body,
        content_type: Option<String>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}
