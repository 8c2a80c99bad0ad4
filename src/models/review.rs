//! Review model.

use serde::{Deserialize, Serialize};

/// Remarks stored on a review when the decision carried none.
pub const NO_REVIEW_REMARKS: &str = "None";

/// Outcome state of a review.
///
/// Statuses outside the known set are kept verbatim (upper-cased) so that an
/// unexpected decision from the backend is still visible instead of being
/// coerced into `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Other(String),
}

impl ReviewStatus {
    /// Whether no further decision can be made on this review.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl From<&str> for ReviewStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "APPROVED" => Self::Approved,
            "REJECTED" => Self::Rejected,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ReviewStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ReviewStatus> for String {
    fn from(status: ReviewStatus) -> Self {
        status.to_string()
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A decision record tracking a post's review.
///
/// The review listing endpoint names the identifier `reviewId` and inlines
/// the post's title and content; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(alias = "reviewId")]
    pub id: i64,

    pub post_id: i64,

    pub author: String,

    pub status: ReviewStatus,

    /// Assigned once the review is decided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,

    #[serde(default, alias = "postTitle", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, alias = "postContent", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Body of a reject call.
#[derive(Debug, Clone, Serialize)]
pub struct RejectRequest {
    pub reviewer: String,
    pub remarks: String,
}

/// Body of a submit-for-review call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub post_id: i64,
    pub author: String,
}
