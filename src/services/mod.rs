//! Business logic services.
//!
//! This module contains the notification ingress, the reconciler and the
//! in-memory caches it patches, the HTTP client for the post and review
//! services, and the two views that own a cache each.
//!
//! The reconciler and caches are independent of any HTTP code and can be
//! tested against an in-memory [`PostApi`].

pub mod backend_client;
pub mod drafts_view;
pub mod local_cache;
pub mod notification_stream;
pub mod reconciler;
pub mod reviews_view;

pub use backend_client::{BackendClient, PostApi};
pub use drafts_view::DraftsView;
pub use local_cache::{CacheRecord, LocalCache};
pub use notification_stream::{
    IngressEvent, NotificationStream, ReconnectPolicy, SseDecoder, Subscription,
    SubscriptionHandle,
};
pub use reconciler::{
    apply_feedback, apply_review_decision, patch_post_feedback, ReconcileOutcome, Reconciler,
    WriteThrough, WriteThroughStrategy,
};
pub use reviews_view::ReviewsView;
