//! Moderation state assigned to new comments.

use chrono::{DateTime, Months, Utc};
use domains::{CommentRepository, Mode, Result};

use crate::utils::epoch_secs;

/// How far back an Approved comment keeps vouching for its author.
pub const TRUST_WINDOW_MONTHS: u32 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModerationPolicy {
    /// Hold every new comment for review.
    pub enabled: bool,
    /// Skip review for authors with recent Approved comments under the same email.
    pub approve_acquaintance: bool,
}

impl ModerationPolicy {
    /// Decides the mode of a comment submitted at `now` by `email`.
    pub async fn decide(
        &self,
        repo: &dyn CommentRepository,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Mode> {
        if !self.enabled {
            return Ok(Mode::Approved);
        }
        if self.approve_acquaintance {
            if let Some(email) = email {
                if is_approved_author(repo, email, now).await? {
                    tracing::debug!("known author, skipping moderation");
                    return Ok(Mode::Approved);
                }
            }
        }
        Ok(Mode::Pending)
    }
}

/// Start of the trust window ending at `now`, in epoch seconds.
pub fn trust_window_start(now: DateTime<Utc>) -> f64 {
    let start = now
        .checked_sub_months(Months::new(TRUST_WINDOW_MONTHS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    epoch_secs(start)
}

/// True iff `email` has an Approved comment created inside the trust window.
pub async fn is_approved_author(
    repo: &dyn CommentRepository,
    email: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    Ok(repo
        .has_approved_comment_since(email, trust_window_start(now))
        .await?)
}
