//! Per-parent reply counts for one thread.

use std::collections::HashMap;

use domains::{CommentId, CommentRepository, Result, MAX_DEPTH};

/// Number of visible replies under each parent id, after time filtering.
///
/// Lookups never fail: a parent whose children were all filtered out (or that
/// has none) reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyCounts(HashMap<CommentId, i64>);

impl ReplyCounts {
    pub fn new(counts: HashMap<CommentId, i64>) -> Self {
        Self(counts)
    }

    pub fn get(&self, parent: CommentId) -> i64 {
        self.0.get(&parent).copied().unwrap_or(0)
    }

    /// Records an explicit zero for every parent not counted yet.
    pub fn cover(&mut self, parents: impl IntoIterator<Item = CommentId>) {
        for parent in parents {
            self.0.entry(parent).or_insert(0);
        }
    }
}

/// Counts replies created after `after` (0 disables the filter), grouped by
/// parent, down to [`MAX_DEPTH`].
pub async fn count_replies(
    repo: &dyn CommentRepository,
    uri: &str,
    after: f64,
) -> Result<ReplyCounts> {
    let counts = repo.count_replies(uri, MAX_DEPTH, after).await?;
    tracing::debug!(uri, after, parents = counts.len(), "counted replies");
    Ok(ReplyCounts::new(counts))
}
