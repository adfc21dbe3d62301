//! Two first comments racing on a brand-new uri.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use auth_adapters::CookieGuard;
use common::{app, MAX_AGE};
use domains::{
    Comment, CommentId, CommentRepository, NewComment, StorageError, Thread, ThreadId,
};
use secrecy::SecretString;
use serde_json::json;
use services::{
    AuthorHasher, CommentService, CommentSubmission, EscapingRenderer, ModerationPolicy,
};
use storage_adapters::SqliteCommentRepo;

/// SQLite repository whose first thread lookup misses, as when another
/// request inserts the thread between our read and our write.
struct LateWinner {
    inner: Arc<SqliteCommentRepo>,
    missed: AtomicBool,
}

#[async_trait]
impl CommentRepository for LateWinner {
    async fn thread_by_uri(&self, uri: &str) -> Result<Option<Thread>, StorageError> {
        if !self.missed.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.thread_by_uri(uri).await
    }

    async fn create_thread(
        &self,
        uri: &str,
        title: Option<String>,
    ) -> Result<Thread, StorageError> {
        self.inner.create_thread(uri, title).await
    }

    async fn insert_comment(
        &self,
        thread_id: ThreadId,
        comment: NewComment,
    ) -> Result<Comment, StorageError> {
        self.inner.insert_comment(thread_id, comment).await
    }

    async fn comment_by_id(&self, id: CommentId) -> Result<Option<Comment>, StorageError> {
        self.inner.comment_by_id(id).await
    }

    async fn has_approved_comment_since(
        &self,
        email: &str,
        since: f64,
    ) -> Result<bool, StorageError> {
        self.inner.has_approved_comment_since(email, since).await
    }

    async fn count_replies(
        &self,
        uri: &str,
        max_depth: u32,
        after: f64,
    ) -> Result<HashMap<CommentId, i64>, StorageError> {
        self.inner.count_replies(uri, max_depth, after).await
    }

    async fn fetch_grouped(
        &self,
        uri: &str,
        max_depth: u32,
    ) -> Result<HashMap<CommentId, Vec<Comment>>, StorageError> {
        self.inner.fetch_grouped(uri, max_depth).await
    }

    async fn count_comments(&self, uris: &[String]) -> Result<Vec<i64>, StorageError> {
        self.inner.count_comments(uris).await
    }
}

fn submission(text: &str) -> CommentSubmission {
    CommentSubmission {
        text: Some(text.to_string()),
        ..CommentSubmission::default()
    }
}

#[tokio::test]
async fn losing_thread_insert_rereads_the_winner() {
    let sqlite = Arc::new(SqliteCommentRepo::in_memory().await.unwrap());
    let winner = sqlite.create_thread("/late", None).await.unwrap();
    assert!(matches!(
        sqlite.create_thread("/late", None).await,
        Err(StorageError::UniqueViolation(_))
    ));

    let guard = CookieGuard::from_store(sqlite.as_ref(), MAX_AGE).await.unwrap();
    let repo = Arc::new(LateWinner {
        inner: sqlite.clone(),
        missed: AtomicBool::new(false),
    });
    let service = CommentService::new(
        repo.clone(),
        Arc::new(guard),
        Arc::new(EscapingRenderer),
        ModerationPolicy::default(),
        AuthorHasher::new(SecretString::from("test-salt".to_string())),
    );

    let thread = service.thread_for("/late", None).await.unwrap();
    assert!(repo.missed.load(Ordering::SeqCst));
    assert_eq!(thread.id, winner.id);

    let created = service
        .create_comment("/late", submission("after the race"), "203.0.113.4")
        .await
        .unwrap();
    let stored = sqlite.comment_by_id(created.comment.id).await.unwrap().unwrap();
    assert_eq!(stored.thread_id, winner.id);
}

#[tokio::test]
async fn concurrent_first_comments_share_one_thread() {
    let app = app(ModerationPolicy::default()).await;

    let (a, b) = tokio::join!(
        app.service
            .create_comment("/fresh", submission("left hand"), "203.0.113.1"),
        app.service
            .create_comment("/fresh", submission("right hand"), "203.0.113.2"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let thread = app.repo.thread_by_uri("/fresh").await.unwrap().unwrap();
    let first = app.repo.comment_by_id(a.comment.id).await.unwrap().unwrap();
    let second = app.repo.comment_by_id(b.comment.id).await.unwrap().unwrap();
    assert_eq!(first.thread_id, thread.id);
    assert_eq!(second.thread_id, thread.id);

    let (_, listing) = app.get("/?uri=/fresh").await;
    assert_eq!(listing["total_replies"], 2);
}

#[tokio::test]
async fn spawned_requests_share_one_thread() {
    let app = app(ModerationPolicy::default()).await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let service = app.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .create_comment("/burst", submission(&format!("comment {n}")), "203.0.113.9")
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let thread = app.service.thread_for("/burst", None).await.unwrap();
    assert_eq!(
        app.service.thread_for("/burst", None).await.unwrap().id,
        thread.id
    );
    let (_, counts) = app.post_json("/count", json!(["/burst"])).await;
    assert_eq!(counts, json!([8]));
}
