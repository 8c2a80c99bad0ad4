//! Data models for the application.
//!
//! These models mirror the JSON representations used by the post, review and
//! comment services and the notification stream. All wire models derive
//! Serialize and Deserialize with the backend's camelCase field names.

pub mod comment;
pub mod notification;
pub mod post;
pub mod review;
pub mod session;

// Re-exports for convenient access
pub use comment::{Comment, CommentDraft};
pub use notification::{Decision, NotificationMessage, ReviewNotification};
pub use post::{DraftFilter, NewPost, Post, PostStatus, NO_REMARKS};
pub use review::{RejectRequest, Review, ReviewRequest, ReviewStatus, NO_REVIEW_REMARKS};
pub use session::{default_accounts, Account, SessionContext};
