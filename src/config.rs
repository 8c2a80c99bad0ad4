//! Sync configuration.
//!
//! Everything the services need to reach the backend lives here: service base
//! URLs, the notification endpoint, HTTP timeouts, and the two policy choices
//! (write-through strategy and stream reconnect policy). Loadable from a JSON
//! file; missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::AppError;
use crate::services::notification_stream::ReconnectPolicy;
use crate::services::reconciler::WriteThroughStrategy;

/// Default post service base URL.
pub const DEFAULT_POST_BASE_URL: &str = "http://localhost:8083/post/posts";

/// Default review service base URL.
pub const DEFAULT_REVIEW_BASE_URL: &str = "http://localhost:8083/review/reviews";

/// Default comment service base URL.
pub const DEFAULT_COMMENT_BASE_URL: &str = "http://localhost:8083/comment/comments";

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default capacity of the ingress channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration shared by the backend client, ingress, and views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the post API (`GET/PUT {base}/{id}`).
    pub post_base_url: String,

    /// Base URL of the review API.
    pub review_base_url: String,

    /// Base URL of the comment API.
    pub comment_base_url: String,

    /// SSE endpoint. Derived from `review_base_url` when unset.
    pub notifications_url: Option<String>,

    /// Request timeout in seconds. Does not apply to the event stream.
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds, for every request including the stream.
    pub connect_timeout_secs: u64,

    /// Number of undelivered notifications buffered between ingress and view.
    pub channel_capacity: usize,

    pub write_through: WriteThroughStrategy,

    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            post_base_url: DEFAULT_POST_BASE_URL.to_string(),
            review_base_url: DEFAULT_REVIEW_BASE_URL.to_string(),
            comment_base_url: DEFAULT_COMMENT_BASE_URL.to_string(),
            notifications_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            write_through: WriteThroughStrategy::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Parse configuration from a JSON string and validate it.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AppError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Reject configurations the services cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.post_base_url.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                "Post base URL cannot be empty",
                "post_base_url",
            ));
        }
        if self.review_base_url.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                "Review base URL cannot be empty",
                "review_base_url",
            ));
        }
        if self.comment_base_url.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                "Comment base URL cannot be empty",
                "comment_base_url",
            ));
        }
        if matches!(self.notifications_url.as_deref(), Some(url) if url.trim().is_empty()) {
            return Err(AppError::invalid_input_field(
                "Notifications URL cannot be empty",
                "notifications_url",
            ));
        }
        if self.channel_capacity == 0 {
            return Err(AppError::invalid_input_field(
                "Channel capacity must be at least 1",
                "channel_capacity",
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(AppError::invalid_input_field(
                "Connect timeout must be at least 1 second",
                "connect_timeout_secs",
            ));
        }
        if let ReconnectPolicy::Backoff {
            initial_delay_ms,
            max_delay_ms,
            ..
        } = self.reconnect
        {
            if initial_delay_ms == 0 {
                return Err(AppError::invalid_input_field(
                    "Reconnect delay must be at least 1ms",
                    "reconnect.initial_delay_ms",
                ));
            }
            if max_delay_ms < initial_delay_ms {
                return Err(AppError::invalid_input_field(
                    "Maximum reconnect delay is below the initial delay",
                    "reconnect.max_delay_ms",
                ));
            }
        }
        Ok(())
    }

    /// The SSE endpoint to subscribe to.
    pub fn notifications_endpoint(&self) -> String {
        match &self.notifications_url {
            Some(url) => url.clone(),
            None => format!(
                "{}/notifications",
                self.review_base_url.trim_end_matches('/')
            ),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
