//! Shared fixtures: in-memory SQLite behind the real router.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use api_adapters::AppState;
use auth_adapters::CookieGuard;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use domains::{Comment, CommentId, CommentRepository, Mode, NewComment, Voters};
use secrecy::SecretString;
use serde_json::Value;
use services::{AuthorHasher, CommentService, EscapingRenderer, ModerationPolicy};
use storage_adapters::SqliteCommentRepo;
use tower::ServiceExt;

pub const HOST: &str = "https://blog.example";
pub const MAX_AGE: i64 = 900;

pub struct TestApp {
    pub repo: Arc<SqliteCommentRepo>,
    pub service: Arc<CommentService>,
    pub router: Router,
}

pub async fn app(policy: ModerationPolicy) -> TestApp {
    let repo = Arc::new(SqliteCommentRepo::in_memory().await.unwrap());
    app_on(repo, policy).await
}

/// A fresh service on an existing database, as after a restart.
pub async fn app_on(repo: Arc<SqliteCommentRepo>, policy: ModerationPolicy) -> TestApp {
    let guard = CookieGuard::from_store(repo.as_ref(), MAX_AGE).await.unwrap();
    let service = Arc::new(CommentService::new(
        repo.clone(),
        Arc::new(guard),
        Arc::new(EscapingRenderer),
        policy,
        AuthorHasher::new(SecretString::from("test-salt".to_string())),
    ));
    let state = AppState::new(service.clone(), vec![HOST.to_string()], MAX_AGE);
    TestApp {
        repo,
        service,
        router: api_adapters::router(state, Duration::from_secs(5)),
    }
}

impl TestApp {
    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        split(response).await
    }

    pub async fn post_comment(&self, uri: &str, body: Value) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/new?uri={uri}"))
                    .header("origin", HOST)
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "198.51.100.23")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        split(response).await
    }

    /// Inserts a comment with a chosen timestamp, creating the thread if needed.
    pub async fn seed(
        &self,
        uri: &str,
        parent: Option<CommentId>,
        created: f64,
        mode: Mode,
    ) -> Comment {
        let thread = self.service.thread_for(uri, None).await.unwrap();
        self.repo
            .insert_comment(
                thread.id,
                NewComment {
                    parent,
                    created,
                    mode,
                    remote_addr: "198.51.100.0".into(),
                    text: format!("comment at {created}"),
                    author: None,
                    email: None,
                    website: None,
                    voters: Voters::seeded("198.51.100.0"),
                    notification: false,
                },
            )
            .await
            .unwrap()
    }
}

pub async fn split(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn ids(replies: &Value) -> Vec<i64> {
    replies
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect()
}
