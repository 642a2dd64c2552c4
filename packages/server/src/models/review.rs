use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::review;
use crate::error::AppError;

/// Request body for posting a review.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateReviewRequest {
    #[schema(example = "Nice write-up!")]
    pub comment: String,
    /// Review being replied to; must belong to the same blog.
    pub parent_review_id: Option<i32>,
}

pub fn validate_create_review(payload: &CreateReviewRequest) -> Result<(), AppError> {
    let comment = payload.comment.trim();
    if comment.is_empty() || comment.chars().count() > 4000 {
        return Err(AppError::Validation(
            "Comment must be 1-4000 characters".into(),
        ));
    }
    Ok(())
}

/// A review with its replies materialized.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReviewNode {
    pub id: i32,
    pub comment: String,
    pub date: DateTime<Utc>,
    pub user_id: i32,
    pub blog_id: i32,
    pub parent_review_id: Option<i32>,
    #[schema(no_recursion)]
    pub replies: Vec<ReviewNode>,
}

impl From<review::Model> for ReviewNode {
    fn from(r: review::Model) -> Self {
        Self {
            id: r.id,
            comment: r.comment,
            date: r.date,
            user_id: r.user_id,
            blog_id: r.blog_id,
            parent_review_id: r.parent_review_id,
            replies: Vec::new(),
        }
    }
}

// Long reply chains would otherwise drop one nested Vec per stack frame.
impl Drop for ReviewNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// Build the review forest of one blog from its flat rows.
///
/// Rows are ordered by `(date, id)` at every level. A row whose parent is not
/// among `rows` is promoted to a root; rows caught in a parent cycle are
/// promoted as well, so every row appears exactly once. Runs in constant
/// stack space regardless of reply depth.
pub fn build_forest(mut rows: Vec<review::Model>) -> Vec<ReviewNode> {
    rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

    let index: HashMap<i32, usize> = rows.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    let mut roots = Vec::new();

    for (i, r) in rows.iter().enumerate() {
        match r.parent_review_id.and_then(|p| index.get(&p)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let count = rows.len();
    let mut arena: Vec<Option<review::Model>> = rows.into_iter().map(Some).collect();
    let mut built: Vec<Option<ReviewNode>> = (0..count).map(|_| None).collect();
    let mut visited = vec![false; count];
    let mut forest = Vec::new();

    // Roots first; anything left afterwards is part of a cycle with no root above it.
    for start in roots.into_iter().chain(0..count) {
        if visited[start] {
            continue;
        }

        // Post-order walk: a node is assembled once all of its replies are built.
        let mut stack = vec![(start, false)];
        while let Some((i, expanded)) = stack.pop() {
            if expanded {
                let Some(model) = arena[i].take() else {
                    continue;
                };
                let mut node = ReviewNode::from(model);
                node.replies = children[i].iter().filter_map(|&c| built[c].take()).collect();
                built[i] = Some(node);
                continue;
            }

            if visited[i] {
                continue;
            }
            visited[i] = true;
            stack.push((i, true));
            stack.extend(children[i].iter().rev().filter(|&&c| !visited[c]).map(|&c| (c, false)));
        }

        if let Some(node) = built[start].take() {
            forest.push(node);
        }
    }

    forest
}
