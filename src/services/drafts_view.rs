//! Draft posts view.
//!
//! Owns the cache of the author's draft posts. The cache is rebuilt from the
//! post service on every fetch and patched between fetches by reviewer
//! feedback arriving on the notification stream.

use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::models::{DraftFilter, NewPost, NotificationMessage, Post, ReviewRequest};
use crate::services::backend_client::BackendClient;
use crate::services::local_cache::LocalCache;
use crate::services::notification_stream::{IngressEvent, Subscription};
use crate::services::reconciler::{patch_post_feedback, ReconcileOutcome, Reconciler, WriteThrough};

/// Draft list plus its live-update loop.
pub struct DraftsView {
    client: BackendClient,
    reconciler: Reconciler<BackendClient>,
    drafts: LocalCache<Post>,
    filter: DraftFilter,
    last_error: Option<AppError>,
    last_outcome: Option<ReconcileOutcome>,
    cancel: CancellationToken,
}

impl DraftsView {
    pub fn new(client: BackendClient, config: &SyncConfig) -> Self {
        Self {
            reconciler: Reconciler::new(client.clone(), config.write_through),
            client,
            drafts: LocalCache::new(),
            filter: DraftFilter::default(),
            last_error: None,
            last_outcome: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn drafts(&self) -> &LocalCache<Post> {
        &self.drafts
    }

    /// Drafts for display, most recently touched first.
    pub fn sorted_drafts(&self) -> Vec<Post> {
        self.drafts
            .newest_first(|p| p.last_modified_date.or(p.created_date))
    }

    pub fn filter(&self) -> &DraftFilter {
        &self.filter
    }

    /// The last fetch or stream error, for display.
    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&ReconcileOutcome> {
        self.last_outcome.as_ref()
    }

    /// Token that tears the view down; cancelling it stops [`run`](Self::run).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch drafts matching `filter` and rebuild the cache.
    pub async fn fetch(&mut self, filter: DraftFilter) -> Result<usize, AppError> {
        self.filter = filter;
        self.refresh().await
    }

    /// Re-run the last fetch.
    pub async fn refresh(&mut self) -> Result<usize, AppError> {
        match self.client.list_drafts(&self.filter).await {
            Ok(posts) => {
                self.drafts.replace_all(posts);
                self.last_error = None;
                log::info!("[drafts] Loaded {} drafts", self.drafts.len());
                Ok(self.drafts.len())
            }
            Err(e) => {
                log::error!("[drafts] Failed to load draft posts: {}", e);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Drop all filters and fetch again.
    pub async fn clear_filters(&mut self) -> Result<usize, AppError> {
        self.fetch(DraftFilter::default()).await
    }

    /// Add a draft created elsewhere to the list.
    pub fn add_draft(&mut self, post: Post) {
        log::debug!("[drafts] Added draft {}", post.id);
        self.drafts.append(post);
    }

    /// Create a draft on the post service and add it to the list.
    pub async fn create_draft(&mut self, post: &NewPost) -> Result<Post, AppError> {
        let created = self.client.create_post(post).await?;
        self.add_draft(created.clone());
        Ok(created)
    }

    /// Submit a cached draft for review.
    pub async fn submit_for_review(&self, post_id: i64) -> Result<(), AppError> {
        let post = self
            .drafts
            .find(post_id)
            .ok_or_else(|| AppError::not_found_with_id("Post", post_id.to_string()))?;
        let author = post
            .author
            .clone()
            .ok_or_else(|| AppError::invalid_input_field("Draft has no author", "author"))?;

        self.client
            .submit_for_review(&ReviewRequest { post_id, author })
            .await?;
        log::info!("[drafts] Submitted post {} for review", post_id);
        Ok(())
    }

    /// Apply one notification as draft feedback.
    pub async fn handle_notification(&mut self, message: NotificationMessage) -> ReconcileOutcome {
        let notification = message.into_post_feedback();
        let outcome = self
            .reconciler
            .apply_post_feedback(&mut self.drafts, &notification)
            .await;
        self.last_outcome = Some(outcome.clone());
        outcome
    }

    /// Consume `subscription` until it ends or the view is torn down.
    ///
    /// Notifications are applied one at a time in arrival order. The local
    /// patch is applied immediately; its write-through runs on its own task
    /// and is awaited before the next notification. On teardown the
    /// write-through still completes, only its outcome is discarded.
    pub async fn run(&mut self, mut subscription: Subscription) {
        let cancel = self.cancel.clone();

        while let Some(event) = subscription.recv_until(&cancel).await {
            match event {
                IngressEvent::Notification(message) => {
                    let notification = message.into_post_feedback();
                    let Some(local) = patch_post_feedback(&mut self.drafts, &notification) else {
                        self.last_outcome = Some(ReconcileOutcome::Ignored {
                            id: notification.target_id(),
                        });
                        continue;
                    };

                    let id = local.id;
                    let reconciler = self.reconciler.clone();
                    let write = tokio::spawn(async move { reconciler.write_through(&local).await });

                    let write_through = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            log::debug!("[drafts] Torn down while saving post {}", id);
                            break;
                        }
                        result = write => result.unwrap_or_else(|e| {
                            log::error!("[drafts] Write-through task for post {} failed: {}", id, e);
                            WriteThrough::Failed(e.to_string())
                        }),
                    };
                    self.last_outcome = Some(ReconcileOutcome::Patched { id, write_through });
                }
                IngressEvent::Error(e) => {
                    log::error!("[drafts] Live updates error: {}", e);
                    self.last_error = Some(e);
                }
            }
        }

        log::debug!("[drafts] Live updates stopped");
    }
}
