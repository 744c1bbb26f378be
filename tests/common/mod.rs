#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use photoshare::{
    build_app,
    store::{MemoryStore, StoreState},
    AppConfig, AppState, JwtConfig, ListScope,
};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    router: Router,
    pub store: MemoryStore,
}

pub struct Session {
    pub id: i64,
    pub token: String,
}

pub fn test_config(list_scope: ListScope) -> AppConfig {
    AppConfig {
        database_url: "memory://".into(),
        max_connections: 1,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        list_scope,
        host: "127.0.0.1".into(),
        port: 0,
    }
}

/// Builds a router over any store, for tests that need a misbehaving one.
pub fn router_with_store(store: StoreState, list_scope: ListScope) -> Router {
    build_app(AppState::from_parts(store, Arc::new(test_config(list_scope))))
}

pub async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_scope(ListScope::All)
    }

    pub fn with_scope(list_scope: ListScope) -> Self {
        let store = MemoryStore::new();
        let state = AppState::from_parts(
            Arc::new(store.clone()) as StoreState,
            Arc::new(test_config(list_scope)),
        );
        Self {
            router: build_app(state),
            store,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        call(&self.router, req).await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn empty(&self, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> (StatusCode, Value) {
        self.json(
            Method::POST,
            "/users/register",
            None,
            serde_json::json!({ "username": username, "email": email, "password": password }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        let form = format!(
            "email={}&password={}",
            form_encode(email),
            form_encode(password)
        );
        let req = Request::builder()
            .method(Method::POST)
            .uri("/users/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        self.send(req).await
    }

    /// Registers, logs in and looks up the caller's id.
    pub async fn signup(&self, username: &str, email: &str) -> Session {
        let (status, _) = self.register(username, email, "secret1").await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = self.login(email, "secret1").await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap().to_string();
        let (status, me) = self.empty(Method::GET, "/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        Session {
            id: me["id"].as_i64().unwrap(),
            token,
        }
    }

    pub async fn create_photo(&self, session: &Session, title: &str) -> i64 {
        let (status, body) = self
            .json(
                Method::POST,
                "/photos",
                Some(&session.token),
                serde_json::json!({
                    "title": title,
                    "caption": "caption",
                    "photoUrl": "https://img.local/p.jpg",
                    "userId": session.id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_i64().unwrap()
    }

    pub async fn list_photos(&self, token: Option<&str>) -> (StatusCode, Value) {
        self.empty(Method::GET, "/photos", token).await
    }
}

fn form_encode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '*' => c.to_string(),
            ' ' => "+".to_string(),
            other => {
                let mut buf = [0u8; 4];
                other
                    .encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{b:02X}"))
                    .collect()
            }
        })
        .collect()
}
