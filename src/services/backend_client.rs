//! Post, review and comment service client.
//!
//! Provides the HTTP calls the views and the reconciler need: fetching and
//! updating single posts, listing drafts and reviews, issuing review
//! decisions, and managing comments. Every request carries the session role in
//! `X-User-Role`, except the comment author checks, which carry the username
//! in that header instead.

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::models::{
    Comment, CommentDraft, DraftFilter, NewPost, Post, RejectRequest, Review, ReviewRequest,
    SessionContext,
};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// Header the backend authorizes editor endpoints by.
pub const ROLE_HEADER: &str = "X-User-Role";

/// Read/write access to single posts.
///
/// This is the seam the reconciler writes through; [`BackendClient`] is the
/// HTTP implementation.
pub trait PostApi {
    /// Fetch the canonical record for `id`.
    fn get_post(&self, id: i64) -> impl Future<Output = Result<Post, AppError>> + Send;

    /// Replace the record for `id` with `post`, returning what the backend stored.
    fn update_post(
        &self,
        id: i64,
        post: &Post,
    ) -> impl Future<Output = Result<Post, AppError>> + Send;
}

/// HTTP client for the post, review and comment services.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    post_base_url: String,
    review_base_url: String,
    comment_base_url: String,
    role: String,
    username: Option<String>,
    timeout: Duration,
}

impl BackendClient {
    /// Create a client acting for `session`.
    pub fn new(config: &SyncConfig, session: &SessionContext) -> Result<Self, AppError> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        // No client-wide timeout: the event stream body stays open indefinitely,
        // so the timeout is applied per request instead.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            post_base_url: config.post_base_url.trim_end_matches('/').to_string(),
            review_base_url: config.review_base_url.trim_end_matches('/').to_string(),
            comment_base_url: config.comment_base_url.trim_end_matches('/').to_string(),
            role: session.role().to_string(),
            username: session.username().map(String::from),
            timeout: config.timeout(),
        })
    }

    /// Act for a different session (after login or logout).
    pub fn set_session(&mut self, session: &SessionContext) {
        self.role = session.role().to_string();
        self.username = session.username().map(String::from);
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn post_url(&self, path: &str) -> String {
        format!("{}{}", self.post_base_url, path)
    }

    fn review_url(&self, path: &str) -> String {
        format!("{}{}", self.review_base_url, path)
    }

    fn comment_url(&self, path: &str) -> String {
        format!("{}{}", self.comment_base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(ROLE_HEADER, self.role.as_str())
    }

    /// A request the comment service authorizes by author name.
    fn author_request(&self, method: Method, url: &str) -> Result<RequestBuilder, AppError> {
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| AppError::authentication("Sign in to change comments"))?;
        Ok(self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .header(ROLE_HEADER, username))
    }

    /// Turn a non-success response into an `AppError`.
    async fn check_status(response: Response, endpoint: &str) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let body_message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                // Spring returns {"message": "..."} or {"error": "..."}
                v.get("message")
                    .or_else(|| v.get("error"))
                    .map(|m| match m.as_str() {
                        Some(s) => s.to_string(),
                        None => m.to_string(),
                    })
            });

        let message = match (status, &body_message) {
            (StatusCode::FORBIDDEN, _) => "Access denied".to_string(),
            (StatusCode::NOT_FOUND, _) => "Resource not found".to_string(),
            (_, Some(msg)) => msg.clone(),
            _ => format!("Request failed ({}): {}", status_code, body),
        };

        Err(AppError::backend_api_full(message, status_code, endpoint))
    }

    /// Check the status and decode a JSON body.
    async fn handle_response<T: DeserializeOwned>(
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        Self::check_status(response, endpoint)
            .await?
            .json::<T>()
            .await
            .map_err(|e| AppError::Decode {
                message: format!("Failed to parse response from {}: {}", endpoint, e),
                payload: None,
            })
    }

    /// List draft posts, optionally filtered.
    pub async fn list_drafts(&self, filter: &DraftFilter) -> Result<Vec<Post>, AppError> {
        let endpoint = "/drafts";
        let response = self
            .request(Method::GET, &self.post_url(endpoint))
            .query(&filter.query_pairs())
            .send()
            .await?;
        Self::handle_response(response, endpoint).await
    }

    /// List published posts.
    pub async fn list_published(&self) -> Result<Vec<Post>, AppError> {
        let endpoint = "/published";
        let response = self
            .request(Method::GET, &self.post_url(endpoint))
            .send()
            .await?;
        Self::handle_response(response, endpoint).await
    }

    /// Create a post. The backend assigns the id.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, AppError> {
        let response = self
            .request(Method::POST, &self.post_url(""))
            .json(post)
            .send()
            .await?;
        Self::handle_response(response, "/").await
    }

    /// List all reviews with their post details. Editor only.
    pub async fn list_reviews(&self) -> Result<Vec<Review>, AppError> {
        let response = self
            .request(Method::GET, &self.review_url(""))
            .send()
            .await?;
        Self::handle_response(response, "/reviews").await
    }

    /// Submit a post for review.
    pub async fn submit_for_review(&self, request: &ReviewRequest) -> Result<(), AppError> {
        let endpoint = "/submit";
        let response = self
            .request(Method::POST, &self.review_url(endpoint))
            .json(request)
            .send()
            .await?;
        Self::check_status(response, endpoint).await.map(|_| ())
    }

    /// Approve a review. Editor only.
    pub async fn approve_review(&self, review_id: i64, reviewer: &str) -> Result<(), AppError> {
        let endpoint = format!("/{}/approve", review_id);
        let response = self
            .request(Method::PUT, &self.review_url(&endpoint))
            .query(&[("reviewer", reviewer)])
            .send()
            .await?;
        Self::check_status(response, &endpoint).await.map(|_| ())
    }

    /// Reject a review with remarks. Editor only.
    pub async fn reject_review(
        &self,
        review_id: i64,
        request: &RejectRequest,
    ) -> Result<(), AppError> {
        let endpoint = format!("/{}/reject", review_id);
        let response = self
            .request(Method::PUT, &self.review_url(&endpoint))
            .json(request)
            .send()
            .await?;
        Self::check_status(response, &endpoint).await.map(|_| ())
    }

    /// List the comments on a post.
    pub async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let endpoint = format!("/post/{}", post_id);
        let response = self
            .request(Method::GET, &self.comment_url(&endpoint))
            .send()
            .await?;
        Self::handle_response(response, &endpoint).await
    }

    /// Add a comment to a published post.
    pub async fn add_comment(
        &self,
        post_id: i64,
        comment: &CommentDraft,
    ) -> Result<Comment, AppError> {
        let endpoint = format!("/post/{}", post_id);
        let response = self
            .request(Method::POST, &self.comment_url(&endpoint))
            .json(comment)
            .send()
            .await?;
        Self::handle_response(response, &endpoint).await
    }

    /// Replace a comment. The service checks `comment.author` against the
    /// stored author.
    pub async fn update_comment(&self, comment: &Comment) -> Result<Comment, AppError> {
        let endpoint = format!("/{}", comment.id);
        let response = self
            .request(Method::PUT, &self.comment_url(&endpoint))
            .json(comment)
            .send()
            .await?;
        Self::handle_response(response, &endpoint).await
    }

    /// Edit a comment's content as the signed-in user.
    pub async fn edit_comment(
        &self,
        comment_id: i64,
        content: &str,
    ) -> Result<Comment, AppError> {
        let endpoint = format!("/{}/edit", comment_id);
        let request = self.author_request(Method::PUT, &self.comment_url(&endpoint))?;
        let draft = CommentDraft::new(self.username().unwrap_or_default(), content);
        let response = request
            .json(&draft)
            .send()
            .await?;
        Self::handle_response(response, &endpoint).await
    }

    /// Delete a comment as the signed-in user.
    pub async fn delete_comment(&self, comment_id: i64) -> Result<(), AppError> {
        let endpoint = format!("/{}", comment_id);
        let response = self
            .author_request(Method::DELETE, &self.comment_url(&endpoint))?
            .send()
            .await?;
        Self::check_status(response, &endpoint).await.map(|_| ())
    }

    /// Open the notification stream at `url`.
    ///
    /// The request timeout bounds the wait for response headers only; the body
    /// stays open for the life of the subscription.
    pub(crate) async fn open_event_stream(&self, url: &str) -> Result<Response, AppError> {
        let request = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/event-stream")
            .header(ROLE_HEADER, self.role.as_str())
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| AppError::network(format!("Timed out waiting for {}", url)))??;
        Self::check_status(response, url).await
    }
}

impl PostApi for BackendClient {
    async fn get_post(&self, id: i64) -> Result<Post, AppError> {
        let endpoint = format!("/{}", id);
        let response = self
            .request(Method::GET, &self.post_url(&endpoint))
            .send()
            .await?;
        Self::handle_response(response, &endpoint).await
    }

    async fn update_post(&self, id: i64, post: &Post) -> Result<Post, AppError> {
        let endpoint = format!("/{}", id);
        let response = self
            .request(Method::PUT, &self.post_url(&endpoint))
            .json(post)
            .send()
            .await?;
        Self::handle_response(response, &endpoint).await
    }
}
