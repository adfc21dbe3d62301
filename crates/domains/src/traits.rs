//! # Core Traits (Ports)
//!
//! Adapters implement these traits; services only ever see the trait objects.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{DomainError, StorageError};
use crate::models::{Comment, CommentId, NewComment, Thread, ThreadId};

/// Persistence contract for threads and comments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    // Thread Operations
    async fn thread_by_uri(&self, uri: &str) -> Result<Option<Thread>, StorageError>;
    /// Fails with [`StorageError::UniqueViolation`] when a thread already exists for `uri`.
    async fn create_thread(&self, uri: &str, title: Option<String>)
        -> Result<Thread, StorageError>;

    // Comment Operations
    async fn insert_comment(
        &self,
        thread_id: ThreadId,
        comment: NewComment,
    ) -> Result<Comment, StorageError>;
    async fn comment_by_id(&self, id: CommentId) -> Result<Option<Comment>, StorageError>;
    /// True when `email` authored an Approved comment created after `since`.
    async fn has_approved_comment_since(&self, email: &str, since: f64)
        -> Result<bool, StorageError>;

    // Aggregation. Both only consider publicly visible comments down to `max_depth`.
    /// Per parent id (0 = top level), the number of comments created after `after`.
    async fn count_replies(
        &self,
        uri: &str,
        max_depth: u32,
        after: f64,
    ) -> Result<HashMap<CommentId, i64>, StorageError>;
    /// Comments grouped by direct parent id (0 = top level), each group ordered by id.
    async fn fetch_grouped(
        &self,
        uri: &str,
        max_depth: u32,
    ) -> Result<HashMap<CommentId, Vec<Comment>>, StorageError>;
    /// Approved comment count per uri, in input order; unknown uris count 0.
    async fn count_comments(&self, uris: &[String]) -> Result<Vec<i64>, StorageError>;
}

/// Durable key/value settings.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_preference(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Stores `value` unless `key` is already set. Returns whether this call wrote it.
    async fn insert_preference_if_absent(&self, key: &str, value: &str)
        -> Result<bool, StorageError>;
}

/// Issues and checks the possession token handed to a comment's author.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CommentGuard: Send + Sync {
    /// Binds `id` to a digest of `text`.
    fn issue(&self, id: CommentId, text: &str) -> Result<String, DomainError>;

    /// Fails with [`DomainError::Unauthorized`] unless `token` was issued for
    /// `id` and `current_text` is still the text it was issued for.
    fn verify(&self, token: &str, id: CommentId, current_text: &str) -> Result<(), DomainError>;
}

/// Turns raw comment text into the markup served to clients.
pub trait TextRenderer: Send + Sync {
    fn render(&self, text: &str) -> String;
}
