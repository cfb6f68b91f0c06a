#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use stowage::blob::FsBlobStore;
use stowage::config::ServerConfig;
use stowage::server::{AppState, create_router};
use stowage::service::NewAccount;
use stowage::store::{SqliteStore, Store};
use stowage::types::AccountType;

const TEST_SECRET: &str = "integration-test-secret-0123456789";
const BOUNDARY: &str = "stowage-test-boundary";
pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn data(&self) -> Value {
        self.json()["data"].clone()
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A router over a fresh on-disk database and blob directory.
pub struct TestApp {
    pub temp_dir: TempDir,
    pub state: Arc<AppState>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };

        let store = SqliteStore::new(config.db_path()).expect("open database");
        store.initialize().expect("initialize schema");
        let blobs = Arc::new(FsBlobStore::new(&config.data_dir));

        let state = Arc::new(
            AppState::new(Arc::new(store), blobs, config, TEST_SECRET).expect("build state"),
        );
        let router = create_router(state.clone());

        Self {
            temp_dir,
            state,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request("GET", uri, Some(token), None).await
    }

    /// Sends a multipart form with a `file` part plus plain text `fields`.
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        file_name: &str,
        content: &[u8],
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\n\
                     Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("build request");

        self.send(request).await
    }

    pub async fn login(&self, login: &str) -> String {
        let resp = self
            .request(
                "POST",
                "/api/login",
                None,
                Some(json!({"login": login, "password": PASSWORD})),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "login {login}");
        resp.data()["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    /// Registers a user over HTTP and returns `(id, token)`.
    pub async fn register(&self, login: &str) -> (String, String) {
        let resp = self
            .request(
                "POST",
                "/api/register",
                None,
                Some(json!({
                    "login": login,
                    "mail": format!("{login}@example.com"),
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "register {login}");
        let id = resp.data()["id"].as_str().expect("user id").to_string();
        (id, self.login(login).await)
    }

    /// Creates an admin directly through the identity service and logs in.
    pub async fn admin(&self, login: &str) -> (String, String) {
        let user = self
            .state
            .identity
            .create_account(NewAccount {
                login: login.to_string(),
                mail: format!("{login}@example.com"),
                password: PASSWORD.to_string(),
                display_name: String::new(),
                account_type: AccountType::Admin,
                role_id: None,
                group_id: None,
            })
            .expect("create admin");
        assert!(self.state.store.has_admin().expect("query admins"));
        (user.id, self.login(login).await)
    }
}
