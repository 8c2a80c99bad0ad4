//! Review notification payloads.
//!
//! `NotificationMessage` is the raw JSON body of one server-sent event.
//! Consumers turn it into a [`ReviewNotification`] for the path they own,
//! which settles what the overloaded `postId` field refers to.

use serde::{Deserialize, Deserializer, Serialize};

use super::review::ReviewStatus;

/// Raw notification as carried by the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    /// Post id on the draft path, review id on the review path.
    pub post_id: i64,

    /// Free-form decision, compared case-insensitively.
    pub status: String,

    /// Empty when the backend sent no reviewer (absent or `null`).
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reviewer: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl NotificationMessage {
    /// Interpret this message as feedback on a locally held draft.
    pub fn into_post_feedback(self) -> ReviewNotification {
        ReviewNotification::PostFeedback {
            post_id: self.post_id,
            decision: Decision::parse(&self.status),
            reviewer: self.reviewer,
            remarks: non_empty(self.remarks),
        }
    }

    /// Interpret this message as the echo of a review decision.
    ///
    /// The stream reuses `postId` to carry the review id here.
    pub fn into_review_decision(self) -> ReviewNotification {
        ReviewNotification::ReviewDecision {
            review_id: self.post_id,
            decision: Decision::parse(&self.status),
            reviewer: self.reviewer,
            remarks: non_empty(self.remarks),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(remarks: Option<String>) -> Option<String> {
    remarks.filter(|r| !r.is_empty())
}

/// Parsed review decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
    /// Any other status, kept as received.
    Other(String),
}

impl Decision {
    pub fn parse(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Other(status.to_string()),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Review status this decision moves a review into (the status upper-cased).
    pub fn review_status(&self) -> ReviewStatus {
        match self {
            Self::Approved => ReviewStatus::Approved,
            Self::Rejected => ReviewStatus::Rejected,
            Self::Other(raw) => ReviewStatus::from(raw.as_str()),
        }
    }
}

/// A notification resolved against the collection it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewNotification {
    /// Reviewer feedback for a draft post.
    PostFeedback {
        post_id: i64,
        decision: Decision,
        reviewer: String,
        /// `None` when the reviewer left no (or empty) remarks.
        remarks: Option<String>,
    },

    /// Echo of an approve/reject decision on a pending review.
    ReviewDecision {
        review_id: i64,
        decision: Decision,
        reviewer: String,
        remarks: Option<String>,
    },
}

impl ReviewNotification {
    /// Identifier of the targeted record in its own collection.
    pub fn target_id(&self) -> i64 {
        match self {
            Self::PostFeedback { post_id, .. } => *post_id,
            Self::ReviewDecision { review_id, .. } => *review_id,
        }
    }
}
