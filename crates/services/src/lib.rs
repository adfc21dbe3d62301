//! # services
//!
//! Comment business logic: reply counting, tree assembly, moderation and the
//! `CommentService` use cases. Depends only on the `domains` ports.

pub mod comment_service;
pub mod moderation;
pub mod render;
pub mod reply_counter;
pub mod tree;
pub mod utils;
pub mod validation;

pub use comment_service::{CommentService, CreatedComment};
pub use moderation::{is_approved_author, ModerationPolicy};
pub use render::EscapingRenderer;
pub use reply_counter::ReplyCounts;
pub use tree::{CommentIndex, Paging};
pub use utils::{anonymize, AuthorHasher};
pub use validation::{CommentSubmission, FetchParams, FetchQuery};
