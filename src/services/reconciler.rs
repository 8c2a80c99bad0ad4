//! Applies review notifications to cached posts and reviews.
//!
//! Two mutually exclusive paths:
//! - draft feedback: patch remarks (and status on rejection) of a cached post,
//!   then write the change through to the post service;
//! - review decision: patch a cached review and evict it when rejected. The
//!   decision itself was already sent by whoever made it, so nothing is
//!   written back.
//!
//! A notification for an id that is not cached is dropped without any backend
//! call. A failed write-through is logged and leaves the local patch in place.

use serde::{Deserialize, Serialize};

use crate::models::{
    Decision, Post, PostStatus, Review, ReviewNotification, ReviewStatus, NO_REMARKS,
    NO_REVIEW_REMARKS,
};
use crate::services::backend_client::PostApi;
use crate::services::local_cache::LocalCache;

/// How a patched post is persisted to the post service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteThroughStrategy {
    /// Fetch the canonical post, copy remarks/status onto it, and PUT the result.
    /// Concurrent content edits on the server survive.
    #[default]
    FetchMerge,

    /// PUT the locally cached post as-is.
    LocalRecord,

    /// Keep the patch local only.
    Disabled,
}

/// Result of a write-through attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum WriteThrough {
    /// Not attempted (review path, or write-through disabled).
    Skipped,
    Saved,
    Failed(String),
}

/// What a reconciliation did to the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReconcileOutcome {
    /// No cached record matched (or the notification targets the other path).
    Ignored { id: i64 },

    /// The record was updated in place.
    Patched { id: i64, write_through: WriteThrough },

    /// The record was removed from the cache.
    Evicted { id: i64 },
}

impl ReconcileOutcome {
    pub fn id(&self) -> i64 {
        match self {
            Self::Ignored { id } | Self::Patched { id, .. } | Self::Evicted { id } => *id,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }
}

/// Apply reviewer feedback to a post.
///
/// Remarks fall back to [`NO_REMARKS`]; only a rejection changes the status.
/// Applying the same feedback twice leaves the post as after the first time.
pub fn apply_feedback(post: &mut Post, decision: &Decision, remarks: Option<&str>) {
    post.remarks = Some(
        remarks
            .filter(|r| !r.is_empty())
            .unwrap_or(NO_REMARKS)
            .to_string(),
    );
    if decision.is_rejected() {
        post.status = PostStatus::Rejected;
    }
}

/// Apply a review-decision notification to a review cache.
///
/// The review takes the upper-cased status, the reviewer, and the remarks
/// (or [`NO_REVIEW_REMARKS`]). A rejected review is evicted.
pub fn apply_review_decision(
    cache: &mut LocalCache<Review>,
    notification: &ReviewNotification,
) -> ReconcileOutcome {
    let ReviewNotification::ReviewDecision {
        review_id,
        decision,
        reviewer,
        remarks,
    } = notification
    else {
        log::debug!(
            "[reconcile] Ignoring non-review notification for {}",
            notification.target_id()
        );
        return ReconcileOutcome::Ignored {
            id: notification.target_id(),
        };
    };
    let id = *review_id;

    let rejected = match cache.patch(id, |review| {
        review.status = decision.review_status();
        review.reviewer = Some(reviewer.clone()).filter(|r| !r.is_empty());
        review.remarks = Some(
            remarks
                .clone()
                .unwrap_or_else(|| NO_REVIEW_REMARKS.to_string()),
        );
    }) {
        Some(review) => review.status == ReviewStatus::Rejected,
        None => {
            log::debug!("[reconcile] Review {} not cached; dropping notification", id);
            return ReconcileOutcome::Ignored { id };
        }
    };

    if rejected {
        cache.evict(id);
        log::info!("[reconcile] Review {} rejected by {}; removed", id, reviewer);
        ReconcileOutcome::Evicted { id }
    } else {
        log::info!("[reconcile] Review {} updated by {}", id, reviewer);
        ReconcileOutcome::Patched {
            id,
            write_through: WriteThrough::Skipped,
        }
    }
}

/// Patch the cached post a draft-feedback notification targets.
///
/// Returns a copy of the patched post, or `None` when the notification is for
/// the review path or names a post that is not cached.
pub fn patch_post_feedback(
    cache: &mut LocalCache<Post>,
    notification: &ReviewNotification,
) -> Option<Post> {
    let ReviewNotification::PostFeedback {
        post_id,
        decision,
        reviewer,
        remarks,
    } = notification
    else {
        log::debug!(
            "[reconcile] Ignoring non-feedback notification for {}",
            notification.target_id()
        );
        return None;
    };
    let id = *post_id;

    let Some(local) = cache
        .patch(id, |post| apply_feedback(post, decision, remarks.as_deref()))
        .cloned()
    else {
        log::debug!("[reconcile] Post {} not cached; dropping notification", id);
        return None;
    };

    log::info!(
        "[reconcile] Post {} now {} with remarks from {}",
        id,
        local.status,
        reviewer
    );
    Some(local)
}

/// Applies draft feedback and writes it through to the post service.
#[derive(Debug, Clone)]
pub struct Reconciler<A> {
    api: A,
    strategy: WriteThroughStrategy,
}

impl<A: PostApi> Reconciler<A> {
    pub fn new(api: A, strategy: WriteThroughStrategy) -> Self {
        Self { api, strategy }
    }

    /// Apply a draft-feedback notification to `cache` and write it through.
    pub async fn apply_post_feedback(
        &self,
        cache: &mut LocalCache<Post>,
        notification: &ReviewNotification,
    ) -> ReconcileOutcome {
        let Some(local) = patch_post_feedback(cache, notification) else {
            return ReconcileOutcome::Ignored {
                id: notification.target_id(),
            };
        };

        ReconcileOutcome::Patched {
            id: local.id,
            write_through: self.write_through(&local).await,
        }
    }

    /// Persist an already patched post using the configured strategy.
    ///
    /// Failures are logged and reported, never retried.
    pub async fn write_through(&self, local: &Post) -> WriteThrough {
        let result = match self.strategy {
            WriteThroughStrategy::Disabled => return WriteThrough::Skipped,
            WriteThroughStrategy::LocalRecord => self.api.update_post(local.id, local).await,
            WriteThroughStrategy::FetchMerge => match self.api.get_post(local.id).await {
                Ok(mut canonical) => {
                    canonical.merge_review_fields(local);
                    self.api.update_post(local.id, &canonical).await
                }
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(saved) => {
                log::debug!("[reconcile] Post {} saved as {}", saved.id, saved.status);
                WriteThrough::Saved
            }
            Err(e) => {
                log::warn!(
                    "[reconcile] Failed to save feedback for post {}: {}",
                    local.id,
                    e
                );
                WriteThrough::Failed(e.to_string())
            }
        }
    }
}
