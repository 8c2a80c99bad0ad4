//! Pending reviews view for editors.
//!
//! Lists reviews, sends approve/reject decisions, and reconciles the echo
//! notifications of those decisions (including ones made by other editors).
//! Rejected reviews drop out of the list; approved ones stay visible.

use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{NotificationMessage, RejectRequest, Review, SessionContext};
use crate::services::backend_client::BackendClient;
use crate::services::local_cache::LocalCache;
use crate::services::notification_stream::{IngressEvent, Subscription};
use crate::services::reconciler::{apply_review_decision, ReconcileOutcome};

pub struct ReviewsView {
    client: BackendClient,
    session: SessionContext,
    reviews: LocalCache<Review>,
    last_error: Option<AppError>,
    cancel: CancellationToken,
}

impl ReviewsView {
    pub fn new(client: BackendClient, session: SessionContext) -> Self {
        Self {
            client,
            session,
            reviews: LocalCache::new(),
            last_error: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn reviews(&self) -> &LocalCache<Review> {
        &self.reviews
    }

    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The signed-in editor's name, required for decisions.
    fn reviewer(&self) -> Result<&str, AppError> {
        if !self.session.is_editor() {
            return Err(AppError::authentication("Only editors can decide reviews"));
        }
        self.session
            .username()
            .ok_or_else(|| AppError::authentication("Not signed in"))
    }

    /// Fetch all reviews and rebuild the cache.
    pub async fn fetch(&mut self) -> Result<usize, AppError> {
        match self.client.list_reviews().await {
            Ok(reviews) => {
                self.reviews.replace_all(reviews);
                self.last_error = None;
                log::info!("[reviews] Loaded {} reviews", self.reviews.len());
                Ok(self.reviews.len())
            }
            Err(e) => {
                log::error!("[reviews] Failed to load reviews: {}", e);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Approve a review.
    ///
    /// The cache is not touched here; it catches up when the decision's
    /// notification arrives.
    pub async fn approve(&self, review_id: i64) -> Result<(), AppError> {
        let reviewer = self.reviewer()?;
        self.client.approve_review(review_id, reviewer).await?;
        log::info!("[reviews] Review {} approved by {}", review_id, reviewer);
        Ok(())
    }

    /// Reject a review. Remarks are mandatory.
    pub async fn reject(&self, review_id: i64, remarks: &str) -> Result<(), AppError> {
        let reviewer = self.reviewer()?;
        if remarks.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                "Remarks are required to reject a review",
                "remarks",
            ));
        }

        let request = RejectRequest {
            reviewer: reviewer.to_string(),
            remarks: remarks.to_string(),
        };
        self.client.reject_review(review_id, &request).await?;
        log::info!("[reviews] Review {} rejected by {}", review_id, reviewer);
        Ok(())
    }

    /// Apply one notification as a review decision.
    pub fn handle_notification(&mut self, message: NotificationMessage) -> ReconcileOutcome {
        apply_review_decision(&mut self.reviews, &message.into_review_decision())
    }

    /// Consume `subscription` until it ends or the view is torn down.
    pub async fn run(&mut self, mut subscription: Subscription) {
        let cancel = self.cancel.clone();

        while let Some(event) = subscription.recv_until(&cancel).await {
            match event {
                IngressEvent::Notification(message) => {
                    self.handle_notification(message);
                }
                IngressEvent::Error(e) => {
                    log::error!("[reviews] Live updates error: {}", e);
                    self.last_error = Some(e);
                }
            }
        }

        log::debug!("[reviews] Live updates stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::models::{default_accounts, ReviewStatus};

    fn review(id: i64, status: ReviewStatus) -> Review {
        Review {
            id,
            post_id: id + 100,
            author: "alice".into(),
            status,
            reviewer: None,
            remarks: None,
            submitted_at: None,
            reviewed_at: None,
            title: None,
            content: None,
        }
    }

    fn view(session: SessionContext) -> ReviewsView {
        let client = BackendClient::new(&SyncConfig::default(), &session).unwrap();
        ReviewsView::new(client, session)
    }

    #[tokio::test]
    async fn test_anonymous_cannot_decide() {
        let view = view(SessionContext::anonymous());
        let err = view.approve(20).await.unwrap_err();
        assert!(matches!(err, AppError::Authentication { .. }));
    }

    #[tokio::test]
    async fn test_reject_requires_remarks() {
        let editor = SessionContext::login("editor", "admin123", &default_accounts()).unwrap();
        let view = view(editor);
        let err = view.reject(20, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }

    #[test]
    fn test_notifications_applied_in_order() {
        let mut view = view(SessionContext::anonymous());
        view.reviews
            .replace_all(vec![review(20, ReviewStatus::Pending), review(21, ReviewStatus::Pending)]);

        let approve = NotificationMessage {
            post_id: 21,
            status: "approved".into(),
            reviewer: "carol".into(),
            remarks: Some("great".into()),
        };
        let reject = NotificationMessage {
            post_id: 20,
            status: "rejected".into(),
            reviewer: "carol".into(),
            remarks: Some("bad".into()),
        };

        assert_eq!(
            view.handle_notification(reject),
            ReconcileOutcome::Evicted { id: 20 }
        );
        view.handle_notification(approve);

        assert_eq!(view.reviews().len(), 1);
        let remaining = view.reviews().find(21).unwrap();
        assert_eq!(remaining.status, ReviewStatus::Approved);
        assert_eq!(remaining.remarks.as_deref(), Some("great"));
    }
}
