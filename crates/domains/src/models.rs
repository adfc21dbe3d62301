//! # Domain Models
//!
//! These structs represent the core entities of rusty-comments.
//! Identifiers are the storage engine's integer surrogate keys; timestamps are
//! fractional UNIX seconds.

use serde::{Deserialize, Serialize};

use crate::voters::Voters;

pub type ThreadId = i64;
pub type CommentId = i64;

/// Synthetic parent identifier of top-level comments. Never a real comment id.
pub const TOP_LEVEL: CommentId = 0;

/// Maximum nesting depth tracked by counting and grouped fetches.
pub const MAX_DEPTH: u32 = 5;

/// Lifecycle/visibility state of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Mode {
    Approved,
    /// Awaiting a moderator.
    Pending,
    /// Soft-deleted; kept so that its replies stay attached.
    Deleted,
}

impl Mode {
    /// Bitmask of the modes that show up in public listings.
    pub const PUBLIC_MASK: i64 = 1 | 4;

    pub fn as_i64(self) -> i64 {
        match self {
            Mode::Approved => 1,
            Mode::Pending => 2,
            Mode::Deleted => 4,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Mode::Approved),
            2 => Some(Mode::Pending),
            4 => Some(Mode::Deleted),
            _ => None,
        }
    }
}

impl From<Mode> for i64 {
    fn from(mode: Mode) -> Self {
        mode.as_i64()
    }
}

impl TryFrom<i64> for Mode {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Mode::from_i64(value).ok_or_else(|| format!("unknown comment mode {value}"))
    }
}

/// A comment-bearing resource, keyed by the client-supplied page uri.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub uri: String,
    pub title: Option<String>,
}

/// A stored comment, exactly as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub thread_id: ThreadId,
    /// `None` for top-level comments.
    pub parent: Option<CommentId>,
    pub created: f64,
    pub modified: Option<f64>,
    pub mode: Mode,
    pub remote_addr: String,
    pub text: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
    pub voters: Voters,
    pub notification: bool,
}

impl Comment {
    /// Parent identifier used to group replies; top-level comments map to [`TOP_LEVEL`].
    pub fn parent_key(&self) -> CommentId {
        self.parent.unwrap_or(TOP_LEVEL)
    }
}

/// Everything the storage layer needs to insert a comment. The id is assigned
/// by storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub parent: Option<CommentId>,
    pub created: f64,
    pub mode: Mode,
    pub remote_addr: String,
    pub text: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub voters: Voters,
    pub notification: bool,
}

/// Public representation of a comment. Never carries `email` or `remote_addr`.
///
/// The reply fields are only present on comments that head a nested block of a
/// whole-thread listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: CommentId,
    pub parent: Option<CommentId>,
    pub created: f64,
    pub modified: Option<f64>,
    pub mode: Mode,
    pub text: String,
    pub author: Option<String>,
    pub website: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
    /// Author-derived identifier.
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_replies: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_replies: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<CommentView>>,
}

/// One page of replies under a scope: the whole thread, or a single parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPage {
    /// The requested parent, echoed back (`null` for the whole thread).
    pub id: Option<CommentId>,
    pub total_replies: i64,
    pub hidden_replies: i64,
    pub replies: Vec<CommentView>,
}

impl ReplyPage {
    pub fn empty(id: Option<CommentId>) -> Self {
        Self {
            id,
            total_replies: 0,
            hidden_replies: 0,
            replies: Vec::new(),
        }
    }
}
