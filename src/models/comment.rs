//! Comment model.
//!
//! Readers comment on published posts. The comment service only accepts
//! comments for posts in the `PUBLISHED` state and only lets a comment's
//! author change or delete it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A comment as returned by the comment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,

    pub post_id: i64,

    pub author: String,

    pub content: String,

    /// Set by the service when the comment is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}

/// Body for adding or editing a comment. The post id travels in the URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDraft {
    pub author: String,
    pub content: String,
}

impl CommentDraft {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }
}
