//! Shared helpers for router tests: the full application over in-memory
//! repositories and the in-memory storage backend.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use cloudbox_api::AppState;
use cloudbox_auth::{JwtEncoder, REGISTER_SCOPE};
use cloudbox_core::config::AppConfig;
use cloudbox_core::traits::storage::BackendKind;
use cloudbox_database::Repositories;
use cloudbox_database::repositories::UserRepository;
use cloudbox_storage::providers::MemoryStorageBackend;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// In-memory object store behind the router
    pub storage: MemoryStorageBackend,
    /// Repositories behind the router
    pub repos: Repositories,
    /// Mints tokens the router accepts
    pub encoder: JwtEncoder,
    /// Identity service token allowed to register accounts
    pub service_token: String,
}

/// A registered account with a valid bearer token.
pub struct TestUser {
    pub id: Uuid,
    pub root_dir_id: Uuid,
    pub token: String,
}

/// Decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
    pub body: Value,
}

impl TestResponse {
    /// `data` of a success envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// `error` code of a failure envelope.
    pub fn error_code(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    /// Application with a local-kind backend (streaming uploads).
    pub fn local() -> Self {
        Self::new(BackendKind::Local)
    }

    /// Application with a remote-kind backend (presigned uploads).
    pub fn remote() -> Self {
        Self::new(BackendKind::Remote)
    }

    pub fn new(kind: BackendKind) -> Self {
        let mut config = AppConfig::default();
        config.database.provider = "memory".to_string();
        config.auth.jwt_secret = "router-test-secret".to_string();

        let repos = Repositories::memory();
        let storage = MemoryStorageBackend::new(kind);
        let encoder = JwtEncoder::new(&config.auth);
        let state = AppState::new(config, repos.clone(), Arc::new(storage.clone()));
        let (service_token, _) = encoder
            .generate_service_token("identity", &[REGISTER_SCOPE])
            .unwrap();

        Self {
            router: cloudbox_api::build_app(state),
            storage,
            repos,
            encoder,
            service_token,
        }
    }

    /// Register through the API and mint a token for the new account.
    pub async fn register(&self, email: &str) -> TestUser {
        let response = self
            .request(
                "POST",
                "/user/register",
                Some(serde_json::json!({ "name": "Test User", "email": email })),
                Some(&self.service_token),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        let id: Uuid = serde_json::from_value(response.data()["userId"].clone()).unwrap();
        let root_dir_id: Uuid =
            serde_json::from_value(response.data()["rootDirId"].clone()).unwrap();
        let user = self.repos.users.find_by_id(id).await.unwrap().unwrap();
        let (token, _) = self.encoder.generate_access_token(id, user.role).unwrap();

        TestUser {
            id,
            root_dir_id,
            token,
        }
    }

    /// Send a JSON (or empty) request.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut req = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                req = req.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        self.send(req.body(body).unwrap()).await
    }

    /// Stream `data` to an upload route with the given headers.
    pub async fn upload(
        &self,
        path: &str,
        token: &str,
        headers: &[(&str, &str)],
        data: &'static [u8],
    ) -> TestResponse {
        let mut req = Request::builder()
            .method("POST")
            .uri(path)
            .header("Authorization", format!("Bearer {token}"));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        self.send(req.body(Body::from(data)).unwrap()).await
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}
