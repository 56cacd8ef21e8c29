#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tasknest::api::router;
use tasknest::config::Config;
use tasknest::db::MonotonicIds;
use tasknest::services::CredentialHasher;
use tasknest::state::AppState;
use tempfile::TempDir;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

pub struct TestApp {
    pub dir: TempDir,
    pub config: Config,
    pub state: AppState,
    pub router: Router,
}

pub async fn setup_app() -> TestApp {
    setup_app_with(|_| {}).await
}

pub async fn setup_app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = Config {
        data_file: dir.path().join("data").join("users.json"),
        static_dir: dir.path().to_path_buf(),
        upload_dir: dir.path().join("uploads"),
        ..Config::default()
    };
    tweak(&mut config);
    // Minimum Argon2 cost keeps the suite fast.
    let hasher = CredentialHasher::new(8, 1).expect("Failed to build hasher");
    let state = AppState::build(&config, hasher, Arc::new(MonotonicIds::new()))
        .await
        .expect("Failed to build state");
    let router = router(state.clone(), MemoryStore::default());

    TestApp {
        dir,
        config,
        state,
        router,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub cookie: Option<String>,
    pub body: Value,
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to call router");

        let status = resp.status();
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_owned);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            cookie,
            body,
        }
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Value,
    ) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn raw(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        content_type: &str,
        body: &str,
    ) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn empty(&self, method: Method, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    /// Registers `username` and returns the session cookie it was signed in with.
    pub async fn register(&self, username: &str, password: &str) -> String {
        let resp = self
            .json(
                Method::POST,
                "/register",
                None,
                serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": password,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "register failed: {}", resp.body);
        resp.cookie.expect("register did not set a session cookie")
    }
}
