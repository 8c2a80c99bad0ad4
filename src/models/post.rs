//! Post model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel remarks value stored on a post when the reviewer left none.
pub const NO_REMARKS: &str = "No remarks";

/// Publication status of a post.
///
/// The post service sends the status as a free-form string. Values outside
/// the known set (`UNDER_REVIEW`, for one) are kept verbatim, upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PostStatus {
    Draft,
    Published,
    Rejected,
    Other(String),
}

impl From<&str> for PostStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "DRAFT" => Self::Draft,
            "PUBLISHED" => Self::Published,
            "REJECTED" => Self::Rejected,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for PostStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PostStatus> for String {
    fn from(status: PostStatus) -> Self {
        status.to_string()
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Published => write!(f, "PUBLISHED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// An authored content item with a publication lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Backend identifier, unique per post.
    pub id: i64,

    pub title: String,

    pub content: String,

    pub status: PostStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Reviewer feedback, set when a review decision arrives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<NaiveDate>,
}

impl Post {
    /// Copy the review-owned fields (remarks and status) from `patch` onto `self`.
    ///
    /// Every other field keeps the value already on `self`.
    pub fn merge_review_fields(&mut self, patch: &Post) {
        self.remarks = patch.remarks.clone();
        self.status = patch.status.clone();
    }
}

/// A post the author is about to create. The backend assigns the id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub status: PostStatus,
}

impl NewPost {
    /// Build a draft; posts always start life as drafts.
    pub fn draft(title: impl Into<String>, content: impl Into<String>, author: Option<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author,
            status: PostStatus::Draft,
        }
    }
}

/// Filters accepted by the drafts listing endpoint.
///
/// Empty strings and `None` values are omitted from the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftFilter {
    pub content: Option<String>,
    pub author: Option<String>,
    pub created_date: Option<NaiveDate>,
    pub last_modified_date: Option<NaiveDate>,
}

impl DraftFilter {
    /// Query pairs for the filters that are actually set.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(content) = self.content.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("content", content.to_string()));
        }
        if let Some(author) = self.author.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("author", author.to_string()));
        }
        if let Some(date) = self.created_date {
            pairs.push(("createdDate", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(date) = self.last_modified_date {
            pairs.push(("lastModifiedDate", date.format("%Y-%m-%d").to_string()));
        }

        pairs
    }
}
