//! # CommentService
//!
//! Orchestrates the comment use cases on top of the ports. One instance is
//! built at startup and shared by every request; it holds no per-request state.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    Comment, CommentGuard, CommentId, CommentRepository, CommentView, DomainError, Mode,
    NewComment, ReplyPage, Result, StorageError, TextRenderer, Thread, ValidationErrors, Voters,
    MAX_DEPTH, TOP_LEVEL,
};

use crate::moderation::ModerationPolicy;
use crate::reply_counter::count_replies;
use crate::tree::{build_page, CommentIndex};
use crate::utils::{anonymize, epoch_secs, AuthorHasher};
use crate::validation::{CommentSubmission, FetchQuery};

/// A freshly stored comment plus the token proving its authorship.
#[derive(Debug, Clone)]
pub struct CreatedComment {
    pub comment: CommentView,
    pub token: String,
}

impl CreatedComment {
    pub fn is_pending(&self) -> bool {
        self.comment.mode == Mode::Pending
    }
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    guard: Arc<dyn CommentGuard>,
    renderer: Arc<dyn TextRenderer>,
    policy: ModerationPolicy,
    hasher: AuthorHasher,
}

impl CommentService {
    pub fn new(
        repo: Arc<dyn CommentRepository>,
        guard: Arc<dyn CommentGuard>,
        renderer: Arc<dyn TextRenderer>,
        policy: ModerationPolicy,
        hasher: AuthorHasher,
    ) -> Self {
        Self {
            repo,
            guard,
            renderer,
            policy,
            hasher,
        }
    }

    /// Stores a new comment on the thread for `uri`, creating the thread on
    /// first use, and issues the author's edit token.
    ///
    /// Nothing is written until the submission, including its parent, has
    /// been accepted.
    pub async fn create_comment(
        &self,
        uri: &str,
        submission: CommentSubmission,
        remote_addr: &str,
    ) -> Result<CreatedComment> {
        let submission = submission.validate()?;
        let existing = self.repo.thread_by_uri(uri).await?;
        if let Some(parent) = submission.parent {
            self.check_parent(existing.as_ref(), parent).await?;
        }

        let now = Utc::now();
        let mode = self
            .policy
            .decide(self.repo.as_ref(), submission.email.as_deref(), now)
            .await?;

        let thread = match existing {
            Some(thread) => thread,
            None => self.insert_thread(uri, submission.title.clone()).await?,
        };

        let remote_addr = anonymize(remote_addr);
        let new_comment = NewComment {
            parent: submission.parent,
            created: epoch_secs(now),
            mode,
            voters: Voters::seeded(&remote_addr),
            remote_addr,
            text: submission.text,
            author: submission.author,
            email: submission.email,
            website: submission.website,
            notification: submission.notification,
        };

        let comment = self.repo.insert_comment(thread.id, new_comment).await?;
        tracing::info!(
            comment_id = comment.id,
            thread_id = thread.id,
            mode = ?comment.mode,
            "comment created"
        );

        let token = self.guard.issue(comment.id, &comment.text)?;
        Ok(CreatedComment {
            comment: self.view(&comment, false),
            token,
        })
    }

    /// Looks up the thread for `uri`, creating it if needed.
    pub async fn thread_for(&self, uri: &str, title: Option<String>) -> Result<Thread> {
        match self.repo.thread_by_uri(uri).await? {
            Some(thread) => Ok(thread),
            None => self.insert_thread(uri, title).await,
        }
    }

    /// Two first comments racing on a new uri both end up on the single thread
    /// that won the insert.
    async fn insert_thread(&self, uri: &str, title: Option<String>) -> Result<Thread> {
        match self.repo.create_thread(uri, title).await {
            Ok(thread) => {
                tracing::info!(thread_id = thread.id, uri, "thread created");
                Ok(thread)
            }
            Err(StorageError::UniqueViolation(_)) => {
                tracing::debug!(uri, "thread created concurrently, re-reading");
                self.repo.thread_by_uri(uri).await?.ok_or_else(|| {
                    DomainError::Storage(format!("thread for {uri} vanished after conflict"))
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// A reply must name a comment of the thread it is posted to. A uri with
    /// no thread yet has no valid parent.
    async fn check_parent(&self, thread: Option<&Thread>, parent: CommentId) -> Result<()> {
        let parent_thread = self.repo.comment_by_id(parent).await?.map(|c| c.thread_id);
        match (thread, parent_thread) {
            (Some(thread), Some(tid)) if tid == thread.id => Ok(()),
            _ => Err(ValidationErrors::single(
                "parent",
                "must name a comment of the same thread",
            )
            .into()),
        }
    }

    /// Lists one page of the reply tree of `uri`.
    pub async fn fetch(&self, uri: &str, query: &FetchQuery) -> Result<ReplyPage> {
        if query.parent == Some(TOP_LEVEL) {
            return Ok(ReplyPage::empty(Some(TOP_LEVEL)));
        }
        if self.repo.thread_by_uri(uri).await?.is_none() {
            return Err(DomainError::NotFound("thread", uri.to_string()));
        }

        let mut counts = count_replies(self.repo.as_ref(), uri, query.paging.after).await?;
        let groups = self.repo.fetch_grouped(uri, MAX_DEPTH).await?;
        let index = CommentIndex::from_groups(groups);
        counts.cover(index.parents());
        if let Some(parent) = query.parent {
            counts.cover([parent]);
        }

        Ok(build_page(
            &index,
            &counts,
            query.parent,
            &query.paging,
            |c| self.view(c, query.plain),
        ))
    }

    pub async fn view_comment(&self, id: CommentId, plain: bool) -> Result<CommentView> {
        let comment = self.get_comment(id).await?;
        Ok(self.view(&comment, plain))
    }

    /// Approved comment counts per uri, in request order.
    pub async fn count_comments(&self, uris: &[String]) -> Result<Vec<i64>> {
        if uris.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.repo.count_comments(uris).await?)
    }

    pub fn preview(&self, text: &str) -> String {
        self.renderer.render(text)
    }

    /// Loads comment `id` and checks that `token` proves authorship of its
    /// current text. Every failure after the lookup is a bare `Unauthorized`.
    pub async fn authorize(&self, id: CommentId, token: &str) -> Result<Comment> {
        let comment = self.get_comment(id).await?;
        self.guard.verify(token, comment.id, &comment.text)?;
        Ok(comment)
    }

    async fn get_comment(&self, id: CommentId) -> Result<Comment> {
        self.repo
            .comment_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("comment", id.to_string()))
    }

    fn view(&self, c: &Comment, plain: bool) -> CommentView {
        let author_key = c.email.as_deref().unwrap_or(&c.remote_addr);
        CommentView {
            id: c.id,
            parent: c.parent,
            created: c.created,
            modified: c.modified,
            mode: c.mode,
            text: if plain {
                c.text.clone()
            } else {
                self.renderer.render(&c.text)
            },
            author: c.author.clone(),
            website: c.website.clone(),
            likes: c.likes,
            dislikes: c.dislikes,
            hash: self.hasher.identify(author_key),
            total_replies: None,
            hidden_replies: None,
            replies: None,
        }
    }
}
