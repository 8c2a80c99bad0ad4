//! Review notification ingress.
//!
//! Opens the server-sent event stream published by the review service,
//! decodes each event's `data` into a [`NotificationMessage`] and forwards it
//! over a bounded channel, in receipt order. Nothing is buffered or replayed
//! across a disconnect.
//!
//! Whether a dropped stream is reopened is governed by [`ReconnectPolicy`];
//! the default never reconnects.

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::models::NotificationMessage;
use crate::services::backend_client::BackendClient;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What to do after the stream fails or the server closes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Report the error and stop.
    #[default]
    Never,

    /// Reopen after an exponentially growing delay.
    Backoff {
        initial_delay_ms: u64,
        max_delay_ms: u64,
        /// Consecutive failed attempts before giving up; `None` retries forever.
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` to give up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::Backoff {
                initial_delay_ms,
                max_delay_ms,
                max_attempts,
            } => {
                if attempt == 0 || matches!(max_attempts, Some(max) if attempt > *max) {
                    return None;
                }
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                let delay = initial_delay_ms.saturating_mul(factor).min(*max_delay_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

/// One item delivered by the ingress.
#[derive(Debug, Clone)]
pub enum IngressEvent {
    Notification(NotificationMessage),
    /// Transport failure, server close, or an undecodable message.
    Error(AppError),
}

/// Largest event (pending line plus accumulated data) the decoder holds.
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Incremental `text/event-stream` decoder.
///
/// Feed it raw body chunks; it returns the `data` payload of every event
/// completed by that chunk. Only `data` fields are kept.
#[derive(Debug)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data_lines: Vec<String>,
    data_len: usize,
    limit: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            data_lines: Vec::new(),
            data_len: 0,
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether the incomplete event buffered so far is larger than the limit.
    pub fn exceeds_limit(&self) -> bool {
        self.pending.len() + self.data_len > self.limit
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(data) = self.process_line(&line) {
                events.push(data);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            let data = self.data_lines.join("\n");
            self.data_lines.clear();
            self.data_len = 0;
            return (!data.is_empty()).then_some(data);
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            self.data_len += value.len() + 1;
            self.data_lines.push(value.to_string());
        }
        None
    }
}

/// Receiving end of a subscription.
///
/// Dropping it (or calling [`Subscription::close`]) stops the ingress task.
pub struct Subscription {
    rx: mpsc::Receiver<IngressEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Next event, or `None` once the stream has stopped or been closed.
    ///
    /// Events still queued when the subscription is closed are discarded.
    pub async fn recv(&mut self) -> Option<IngressEvent> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    /// Like [`recv`](Self::recv), but also stops when `token` fires.
    pub async fn recv_until(&mut self, token: &CancellationToken) -> Option<IngressEvent> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            event = self.recv() => event,
        }
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle for a callback-driven subscription.
///
/// Dropping it stops the callbacks.
pub struct SubscriptionHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Stop invoking callbacks. Already-queued events are not delivered.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Wait until the subscription has stopped delivering.
    pub async fn finished(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("[ingress] Notification callback task failed: {}", e);
            }
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Subscribes to the review notification stream.
#[derive(Debug, Clone)]
pub struct NotificationStream {
    client: BackendClient,
    url: String,
    policy: ReconnectPolicy,
    capacity: usize,
}

impl NotificationStream {
    pub fn new(client: BackendClient, config: &SyncConfig) -> Self {
        Self {
            client,
            url: config.notifications_endpoint(),
            policy: config.reconnect.clone(),
            capacity: config.channel_capacity.max(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the stream and return the channel it feeds.
    ///
    /// Must be called within a Tokio runtime.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();

        let client = self.client.clone();
        let url = self.url.clone();
        let policy = self.policy.clone();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    log::debug!("[ingress] Subscription to {} closed", url);
                }
                _ = run_ingress(&client, &url, &policy, &tx) => {}
            }
        });

        Subscription { rx, cancel }
    }

    /// Open the stream and invoke `on_notification` / `on_error` for each event.
    ///
    /// Callbacks run sequentially on one task, in receipt order.
    pub fn subscribe_with<N, E>(&self, mut on_notification: N, mut on_error: E) -> SubscriptionHandle
    where
        N: FnMut(NotificationMessage) + Send + 'static,
        E: FnMut(AppError) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let cancel = subscription.cancellation_token();

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                match event {
                    IngressEvent::Notification(message) => on_notification(message),
                    IngressEvent::Error(err) => on_error(err),
                }
            }
        });

        SubscriptionHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// How one connection ended.
enum StreamEnd {
    /// The subscriber went away.
    ReceiverDropped,
    Disconnected { error: AppError, connected: bool },
}

/// Connect, pump events, and reconnect per `policy` until told to stop.
async fn run_ingress(
    client: &BackendClient,
    url: &str,
    policy: &ReconnectPolicy,
    tx: &mpsc::Sender<IngressEvent>,
) {
    let mut attempt = 0u32;

    loop {
        let (error, connected) = match pump(client, url, tx).await {
            StreamEnd::ReceiverDropped => return,
            StreamEnd::Disconnected { error, connected } => (error, connected),
        };

        log::warn!("[ingress] Notification stream error: {}", error);
        if tx.send(IngressEvent::Error(error)).await.is_err() {
            return;
        }

        if connected {
            attempt = 0;
        }
        attempt += 1;

        match policy.delay_for(attempt) {
            Some(delay) => {
                log::info!(
                    "[ingress] Reconnecting to {} in {}ms (attempt {})",
                    url,
                    delay.as_millis(),
                    attempt
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                log::info!("[ingress] Not reconnecting to {}", url);
                return;
            }
        }
    }
}

/// Run a single connection until it ends.
async fn pump(client: &BackendClient, url: &str, tx: &mpsc::Sender<IngressEvent>) -> StreamEnd {
    let response = match client.open_event_stream(url).await {
        Ok(response) => response,
        Err(error) => {
            return StreamEnd::Disconnected {
                error,
                connected: false,
            }
        }
    };
    log::info!("[ingress] Connected to {}", url);

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                return StreamEnd::Disconnected {
                    error: AppError::stream(format!("Connection lost: {}", e)),
                    connected: true,
                }
            }
        };

        for data in decoder.feed(&chunk) {
            let event = match serde_json::from_str::<NotificationMessage>(&data) {
                Ok(message) => {
                    log::debug!(
                        "[ingress] Notification for {}: {}",
                        message.post_id,
                        message.status
                    );
                    IngressEvent::Notification(message)
                }
                Err(e) => {
                    log::warn!("[ingress] Dropping undecodable notification: {}", e);
                    IngressEvent::Error(AppError::decode_payload(e.to_string(), data))
                }
            };
            if tx.send(event).await.is_err() {
                return StreamEnd::ReceiverDropped;
            }
        }

        if decoder.exceeds_limit() {
            return StreamEnd::Disconnected {
                error: AppError::stream(format!(
                    "Event larger than {} bytes; dropping connection",
                    decoder.limit()
                )),
                connected: true,
            };
        }
    }

    StreamEnd::Disconnected {
        error: AppError::stream("Stream closed by server"),
        connected: true,
    }
}
