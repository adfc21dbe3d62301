//! # Reply tree assembly
//!
//! Builds the paginated, two-level reply listing from flat, parent-linked rows.
//! Rows are held in a vector and indexed by parent id, so the tree is rebuilt
//! per request without any linked node structure.

use std::collections::HashMap;

use domains::{Comment, CommentId, CommentView, ReplyPage, TOP_LEVEL};

use crate::reply_counter::ReplyCounts;

/// Page sizes and the creation-time filter of one listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paging {
    /// Top-level page size; `None` is unlimited.
    pub limit: Option<usize>,
    /// Page size of each nested block; `None` is unlimited.
    pub nested_limit: Option<usize>,
    /// Only comments created strictly after this instant are listed.
    pub after: f64,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            limit: None,
            nested_limit: None,
            after: 0.0,
        }
    }
}

/// Comments of one thread, indexed by their direct parent.
#[derive(Debug, Default)]
pub struct CommentIndex {
    comments: Vec<Comment>,
    by_parent: HashMap<CommentId, Vec<usize>>,
}

impl CommentIndex {
    pub fn from_groups(groups: HashMap<CommentId, Vec<Comment>>) -> Self {
        let mut index = Self::default();
        for (parent, group) in groups {
            let start = index.comments.len();
            index.comments.extend(group);
            let mut positions: Vec<usize> = (start..index.comments.len()).collect();
            positions.sort_by_key(|&pos| index.comments[pos].id);
            index.by_parent.insert(parent, positions);
        }
        index
    }

    /// Direct replies to `parent`, ascending by id.
    pub fn replies_to(&self, parent: CommentId) -> impl Iterator<Item = &Comment> {
        self.by_parent
            .get(&parent)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.comments[pos])
    }

    pub fn parents(&self) -> impl Iterator<Item = CommentId> + '_ {
        self.by_parent.keys().copied()
    }
}

/// Assembles the listing for `parent`.
///
/// * `None` lists the whole thread: one page of top-level comments, each
///   carrying one nested page of its direct replies.
/// * `Some(0)` is the top-level sentinel and always lists nothing.
/// * `Some(id)` lists one page of `id`'s direct replies.
///
/// `view` converts stored rows to their public form.
pub fn build_page<F>(
    index: &CommentIndex,
    counts: &ReplyCounts,
    parent: Option<CommentId>,
    paging: &Paging,
    mut view: F,
) -> ReplyPage
where
    F: FnMut(&Comment) -> CommentView,
{
    match parent {
        Some(TOP_LEVEL) => ReplyPage::empty(Some(TOP_LEVEL)),
        Some(id) => {
            let replies = page(index, id, paging.after, paging.limit, &mut view);
            let total_replies = counts.get(id);
            ReplyPage {
                id: Some(id),
                total_replies,
                hidden_replies: hidden(total_replies, replies.len()),
                replies,
            }
        }
        None => {
            let mut replies = page(index, TOP_LEVEL, paging.after, paging.limit, &mut view);
            for reply in &mut replies {
                let nested = page(index, reply.id, paging.after, paging.nested_limit, &mut view);
                let total = counts.get(reply.id);
                reply.total_replies = Some(total);
                reply.hidden_replies = Some(hidden(total, nested.len()));
                reply.replies = Some(nested);
            }
            let total_replies = counts.get(TOP_LEVEL);
            ReplyPage {
                id: None,
                total_replies,
                hidden_replies: hidden(total_replies, replies.len()),
                replies,
            }
        }
    }
}

fn page<F>(
    index: &CommentIndex,
    parent: CommentId,
    after: f64,
    limit: Option<usize>,
    view: &mut F,
) -> Vec<CommentView>
where
    F: FnMut(&Comment) -> CommentView,
{
    index
        .replies_to(parent)
        .filter(|c| c.created > after)
        .take(limit.unwrap_or(usize::MAX))
        .map(|c| view(c))
        .collect()
}

// Count and fetch are separate reads; a comment inserted between them can make
// the page longer than the count.
fn hidden(total: i64, shown: usize) -> i64 {
    (total - shown as i64).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{Mode, Voters};

    fn comment(id: CommentId, parent: Option<CommentId>, created: f64) -> Comment {
        Comment {
            id,
            thread_id: 1,
            parent,
            created,
            modified: None,
            mode: Mode::Approved,
            remote_addr: "127.0.0.0".into(),
            text: format!("comment {id}"),
            author: None,
            email: None,
            website: None,
            likes: 0,
            dislikes: 0,
            voters: Voters::new(),
            notification: false,
        }
    }

    fn view(c: &Comment) -> CommentView {
        CommentView {
            id: c.id,
            parent: c.parent,
            created: c.created,
            modified: c.modified,
            mode: c.mode,
            text: c.text.clone(),
            author: c.author.clone(),
            website: c.website.clone(),
            likes: c.likes,
            dislikes: c.dislikes,
            hash: String::new(),
            total_replies: None,
            hidden_replies: None,
            replies: None,
        }
    }

    fn group(rows: Vec<Comment>) -> HashMap<CommentId, Vec<Comment>> {
        let mut groups: HashMap<CommentId, Vec<Comment>> = HashMap::new();
        for row in rows {
            groups.entry(row.parent_key()).or_default().push(row);
        }
        groups
    }

    fn ids(replies: &[CommentView]) -> Vec<CommentId> {
        replies.iter().map(|r| r.id).collect()
    }

    #[test]
    fn top_level_page_truncates_and_reports_hidden() {
        let rows = (1..=7).map(|id| comment(id, None, id as f64)).collect();
        let index = CommentIndex::from_groups(group(rows));
        let counts = ReplyCounts::new(HashMap::from([(0, 7)]));
        let paging = Paging {
            limit: Some(5),
            ..Paging::default()
        };

        let page = build_page(&index, &counts, None, &paging, view);

        assert_eq!(page.id, None);
        assert_eq!(ids(&page.replies), vec![1, 2, 3, 4, 5]);
        assert_eq!(page.total_replies, 7);
        assert_eq!(page.hidden_replies, 2);
    }

    #[test]
    fn nested_block_uses_nested_limit() {
        let rows = vec![
            comment(1, None, 1.0),
            comment(2, Some(1), 2.0),
            comment(3, Some(1), 3.0),
            comment(4, Some(1), 4.0),
        ];
        let index = CommentIndex::from_groups(group(rows));
        let counts = ReplyCounts::new(HashMap::from([(0, 1), (1, 3)]));
        let paging = Paging {
            nested_limit: Some(2),
            ..Paging::default()
        };

        let page = build_page(&index, &counts, None, &paging, view);

        let top = &page.replies[0];
        assert_eq!(top.total_replies, Some(3));
        assert_eq!(top.hidden_replies, Some(1));
        assert_eq!(ids(top.replies.as_ref().unwrap()), vec![2, 3]);
    }

    #[test]
    fn childless_top_level_reply_gets_explicit_empty_block() {
        let index = CommentIndex::from_groups(group(vec![comment(1, None, 1.0)]));
        let counts = ReplyCounts::new(HashMap::from([(0, 1)]));

        let page = build_page(&index, &counts, None, &Paging::default(), view);

        let top = &page.replies[0];
        assert_eq!(top.total_replies, Some(0));
        assert_eq!(top.hidden_replies, Some(0));
        assert_eq!(top.replies, Some(Vec::new()));
    }

    #[test]
    fn nested_replies_do_not_recurse() {
        let rows = vec![
            comment(1, None, 1.0),
            comment(2, Some(1), 2.0),
            comment(3, Some(2), 3.0),
        ];
        let index = CommentIndex::from_groups(group(rows));
        let counts = ReplyCounts::new(HashMap::from([(0, 1), (1, 1), (2, 1)]));

        let page = build_page(&index, &counts, None, &Paging::default(), view);

        let child = &page.replies[0].replies.as_ref().unwrap()[0];
        assert_eq!(child.id, 2);
        assert_eq!(child.replies, None);
        assert_eq!(child.total_replies, None);
    }

    #[test]
    fn after_filter_applies_before_limit() {
        let rows = (1..=6).map(|id| comment(id, None, id as f64 * 10.0)).collect();
        let index = CommentIndex::from_groups(group(rows));
        // ids 3..=6 are newer than 25
        let counts = ReplyCounts::new(HashMap::from([(0, 4)]));
        let paging = Paging {
            limit: Some(2),
            after: 25.0,
            ..Paging::default()
        };

        let page = build_page(&index, &counts, None, &paging, view);

        assert_eq!(ids(&page.replies), vec![3, 4]);
        assert_eq!(page.hidden_replies, 2);
    }

    #[test]
    fn subtree_scope_lists_direct_children_only() {
        let rows = vec![
            comment(1, None, 1.0),
            comment(2, Some(1), 2.0),
            comment(3, Some(1), 3.0),
            comment(4, Some(2), 4.0),
        ];
        let index = CommentIndex::from_groups(group(rows));
        let counts = ReplyCounts::new(HashMap::from([(0, 1), (1, 2), (2, 1)]));
        let paging = Paging {
            limit: Some(1),
            ..Paging::default()
        };

        let page = build_page(&index, &counts, Some(1), &paging, view);

        assert_eq!(page.id, Some(1));
        assert_eq!(ids(&page.replies), vec![2]);
        assert_eq!(page.total_replies, 2);
        assert_eq!(page.hidden_replies, 1);
        assert_eq!(page.replies[0].replies, None);
    }

    #[test]
    fn zero_parent_is_always_empty() {
        let rows = (1..=3).map(|id| comment(id, None, id as f64)).collect();
        let index = CommentIndex::from_groups(group(rows));
        let counts = ReplyCounts::new(HashMap::from([(0, 3)]));

        let page = build_page(&index, &counts, Some(0), &Paging::default(), view);

        assert_eq!(page, ReplyPage::empty(Some(0)));
    }

    #[test]
    fn groups_are_ordered_by_id_regardless_of_input_order() {
        let rows = vec![
            comment(9, None, 9.0),
            comment(2, None, 2.0),
            comment(5, None, 5.0),
        ];
        let index = CommentIndex::from_groups(group(rows));
        let got: Vec<CommentId> = index.replies_to(TOP_LEVEL).map(|c| c.id).collect();
        assert_eq!(got, vec![2, 5, 9]);
        assert_eq!(index.comments.len(), 3);
    }

    #[test]
    fn count_lagging_behind_fetch_never_goes_negative() {
        let rows = (1..=3).map(|id| comment(id, None, id as f64)).collect();
        let index = CommentIndex::from_groups(group(rows));
        let counts = ReplyCounts::new(HashMap::from([(0, 2)]));

        let page = build_page(&index, &counts, None, &Paging::default(), view);

        assert_eq!(page.replies.len(), 3);
        assert_eq!(page.hidden_replies, 0);
    }
}
