//! End-to-end live update tests.
//!
//! These tests run a fake post/review backend (axum) on an ephemeral port
//! that serves the post listings, post create and single-post GET/PUT, the
//! review listing, submit and decision endpoints, and an SSE notification
//! stream that emits a scripted batch of events and then closes.
//!
//! Scenarios:
//! 1. Rejection feedback patches a cached draft and is written through
//! 2. Approval feedback keeps the draft's status, defaults remarks
//! 3. Notifications for uncached posts cause no backend calls
//! 4. Rejected reviews are evicted, approved reviews stay
//! 5. Malformed events are reported and skipped
//! 6. Teardown stops the loop before anything is applied
//! 7. Teardown during a write-through lets the write-through finish
//! 8. Drafts are created, filtered, sorted and submitted for review

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use draft_review_sync::models::{
    default_accounts, DraftFilter, NewPost, NotificationMessage, Post, PostStatus, Review,
    ReviewStatus, SessionContext, NO_REMARKS,
};
use draft_review_sync::services::{
    BackendClient, DraftsView, NotificationStream, ReconcileOutcome, ReviewsView, WriteThrough,
};
use draft_review_sync::{AppError, SyncConfig};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Backend {
    posts: Vec<Post>,
    reviews: Vec<Review>,
    /// Raw `data` payloads emitted on each notification connection.
    events: Vec<String>,
    /// "METHOD path role" for every post/review call.
    calls: Vec<String>,
    draft_queries: Vec<HashMap<String, String>>,
    /// JSON bodies of submit and reject calls.
    bodies: Vec<serde_json::Value>,
    /// Delay before answering a single-post GET.
    get_delay: Option<Duration>,
}

type Shared = Arc<Mutex<Backend>>;

fn role(headers: &HeaderMap) -> String {
    headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

async fn list_drafts(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Post>> {
    let mut backend = state.lock().unwrap();
    backend.calls.push(format!("GET /drafts {}", role(&headers)));
    backend.draft_queries.push(query);
    Json(
        backend
            .posts
            .iter()
            .filter(|p| p.status == PostStatus::Draft)
            .cloned()
            .collect(),
    )
}

async fn get_post(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let delay = state.lock().unwrap().get_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut backend = state.lock().unwrap();
    backend.calls.push(format!("GET /{} {}", id, role(&headers)));
    match backend.posts.iter().find(|p| p.id == id) {
        Some(post) => Json(post.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_post(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(post): Json<Post>,
) -> impl IntoResponse {
    let mut backend = state.lock().unwrap();
    backend.calls.push(format!("PUT /{} {}", id, role(&headers)));
    match backend.posts.iter_mut().find(|p| p.id == id) {
        Some(existing) => {
            *existing = post.clone();
            Json(post).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_reviews(State(state): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    let mut backend = state.lock().unwrap();
    let role = role(&headers);
    backend.calls.push(format!("GET /reviews {}", role));
    if role != "editor" {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(backend.reviews.clone()).into_response()
}

async fn approve_review(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> &'static str {
    let mut backend = state.lock().unwrap();
    backend.calls.push(format!(
        "PUT /{}/approve {} by {}",
        id,
        role(&headers),
        query.get("reviewer").cloned().unwrap_or_default()
    ));
    "Review approved"
}

async fn list_published(State(state): State<Shared>, headers: HeaderMap) -> Json<Vec<Post>> {
    let mut backend = state.lock().unwrap();
    backend.calls.push(format!("GET /published {}", role(&headers)));
    Json(
        backend
            .posts
            .iter()
            .filter(|p| p.status == PostStatus::Published)
            .cloned()
            .collect(),
    )
}

async fn create_post(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Json<Post> {
    let mut backend = state.lock().unwrap();
    backend.calls.push(format!("POST / {}", role(&headers)));
    let id = backend.posts.iter().map(|p| p.id).max().unwrap_or(0) + 1;
    let post = Post {
        id,
        title: body["title"].as_str().unwrap_or_default().to_string(),
        content: body["content"].as_str().unwrap_or_default().to_string(),
        status: PostStatus::from(body["status"].as_str().unwrap_or_default()),
        author: body["author"].as_str().map(String::from),
        remarks: None,
        created_date: NaiveDate::from_ymd_opt(2024, 12, 1),
        last_modified_date: None,
    };
    backend.posts.push(post.clone());
    Json(post)
}

async fn submit_review(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> &'static str {
    let mut backend = state.lock().unwrap();
    backend.calls.push(format!("POST /submit {}", role(&headers)));
    backend.bodies.push(body);
    "Post submitted for review"
}

async fn reject_review(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> &'static str {
    let mut backend = state.lock().unwrap();
    backend
        .calls
        .push(format!("PUT /{}/reject {}", id, role(&headers)));
    backend.bodies.push(body);
    "Review rejected"
}

async fn notifications(State(state): State<Shared>) -> impl IntoResponse {
    let events = state.lock().unwrap().events.clone();
    let stream = futures::stream::iter(
        events
            .into_iter()
            .map(|data| Ok::<_, Infallible>(Event::default().data(data))),
    );
    Sse::new(stream)
}

/// Start the fake backend and return a config pointing at it.
async fn start_backend(backend: Backend) -> (SyncConfig, Shared) {
    let state: Shared = Arc::new(Mutex::new(backend));

    let app = Router::new()
        .route("/post/posts", post(create_post))
        .route("/post/posts/drafts", get(list_drafts))
        .route("/post/posts/published", get(list_published))
        .route("/post/posts/{id}", get(get_post).put(update_post))
        .route("/review/reviews", get(list_reviews))
        .route("/review/reviews/submit", post(submit_review))
        .route("/review/reviews/{id}/approve", put(approve_review))
        .route("/review/reviews/{id}/reject", put(reject_review))
        .route("/review/reviews/notifications", get(notifications))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = SyncConfig {
        post_base_url: format!("http://{}/post/posts", addr),
        review_base_url: format!("http://{}/review/reviews", addr),
        timeout_secs: 5,
        ..SyncConfig::default()
    };
    (config, state)
}

fn draft(id: i64, title: &str) -> Post {
    Post {
        id,
        title: title.to_string(),
        content: format!("{} body", title),
        status: PostStatus::Draft,
        author: Some("alice".into()),
        remarks: None,
        created_date: None,
        last_modified_date: None,
    }
}

fn pending_review(id: i64, post_id: i64) -> Review {
    Review {
        id,
        post_id,
        author: "alice".into(),
        status: ReviewStatus::Pending,
        reviewer: None,
        remarks: None,
        submitted_at: Some("2024-11-02T10:15:30".into()),
        reviewed_at: None,
        title: None,
        content: None,
    }
}

fn event(id: i64, status: &str, reviewer: &str, remarks: Option<&str>) -> String {
    serde_json::to_string(&NotificationMessage {
        post_id: id,
        status: status.into(),
        reviewer: reviewer.into(),
        remarks: remarks.map(String::from),
    })
    .unwrap()
}

fn calls(state: &Shared) -> Vec<String> {
    state.lock().unwrap().calls.clone()
}

async fn run_drafts(view: &mut DraftsView, stream: &NotificationStream) {
    tokio::time::timeout(Duration::from_secs(5), view.run(stream.subscribe()))
        .await
        .expect("drafts view did not finish");
}

#[tokio::test]
async fn test_rejection_feedback_written_through() {
    let (config, state) = start_backend(Backend {
        posts: vec![draft(7, "Seven")],
        events: vec![event(7, "rejected", "bob", Some("needs work"))],
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let stream = NotificationStream::new(client.clone(), &config);
    let mut view = DraftsView::new(client, &config);
    assert_eq!(view.refresh().await.unwrap(), 1);

    // The author edits the post on the server after the list was fetched.
    state.lock().unwrap().posts[0].content = "Edited body".into();

    run_drafts(&mut view, &stream).await;

    let local = view.drafts().find(7).unwrap();
    assert_eq!(local.status, PostStatus::Rejected);
    assert_eq!(local.remarks.as_deref(), Some("needs work"));
    assert_eq!(
        view.last_outcome(),
        Some(&ReconcileOutcome::Patched {
            id: 7,
            write_through: WriteThrough::Saved
        })
    );

    let stored = state.lock().unwrap().posts[0].clone();
    assert_eq!(stored.status, PostStatus::Rejected);
    assert_eq!(stored.remarks.as_deref(), Some("needs work"));
    assert_eq!(stored.content, "Edited body");

    assert_eq!(
        calls(&state),
        vec!["GET /drafts user", "GET /7 user", "PUT /7 user"]
    );

    // The server closing the stream is reported as a stream error.
    assert!(matches!(view.last_error(), Some(AppError::Stream { .. })));
}

#[tokio::test]
async fn test_approval_keeps_draft_status() {
    let (config, state) = start_backend(Backend {
        posts: vec![draft(7, "Seven")],
        events: vec![event(7, "approved", "bob", None)],
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let stream = NotificationStream::new(client.clone(), &config);
    let mut view = DraftsView::new(client, &config);
    view.refresh().await.unwrap();

    run_drafts(&mut view, &stream).await;

    let local = view.drafts().find(7).unwrap();
    assert_eq!(local.status, PostStatus::Draft);
    assert_eq!(local.remarks.as_deref(), Some(NO_REMARKS));
    assert_eq!(
        state.lock().unwrap().posts[0].remarks.as_deref(),
        Some(NO_REMARKS)
    );
}

#[tokio::test]
async fn test_unknown_post_makes_no_calls() {
    let (config, state) = start_backend(Backend {
        posts: vec![draft(7, "Seven")],
        events: vec![event(999, "rejected", "bob", Some("x"))],
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let stream = NotificationStream::new(client.clone(), &config);
    let mut view = DraftsView::new(client, &config);
    view.refresh().await.unwrap();
    let before = view.drafts().records().to_vec();

    run_drafts(&mut view, &stream).await;

    assert_eq!(view.drafts().records(), before.as_slice());
    assert_eq!(
        view.last_outcome(),
        Some(&ReconcileOutcome::Ignored { id: 999 })
    );
    assert_eq!(calls(&state), vec!["GET /drafts user"]);
}

#[tokio::test]
async fn test_malformed_event_is_skipped() {
    let (config, _state) = start_backend(Backend {
        posts: vec![draft(7, "Seven"), draft(8, "Eight")],
        events: vec![
            "not json".to_string(),
            event(8, "rejected", "bob", Some("off topic")),
        ],
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let stream = NotificationStream::new(client.clone(), &config);

    let mut subscription = stream.subscribe();
    let first = subscription.recv().await.unwrap();
    assert!(matches!(
        first,
        draft_review_sync::services::IngressEvent::Error(AppError::Decode { .. })
    ));
    match subscription.recv().await.unwrap() {
        draft_review_sync::services::IngressEvent::Notification(message) => {
            assert_eq!(message.post_id, 8);
            assert_eq!(message.remarks.as_deref(), Some("off topic"));
        }
        other => panic!("expected notification, got {:?}", other),
    }
}

#[tokio::test]
async fn test_drafts_filter_sent_as_query() {
    let (config, state) = start_backend(Backend {
        posts: vec![draft(7, "Seven")],
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let mut view = DraftsView::new(client, &config);
    view.fetch(draft_review_sync::models::DraftFilter {
        author: Some("alice".into()),
        content: Some(String::new()),
        ..Default::default()
    })
    .await
    .unwrap();

    let query = state.lock().unwrap().draft_queries[0].clone();
    assert_eq!(query.get("author").map(String::as_str), Some("alice"));
    assert!(!query.contains_key("content"));
}

#[tokio::test]
async fn test_review_decisions_reconciled() {
    let (config, state) = start_backend(Backend {
        reviews: vec![pending_review(20, 7), pending_review(21, 8)],
        events: vec![
            event(20, "rejected", "carol", Some("bad")),
            event(21, "APPROVED", "carol", None),
        ],
        ..Backend::default()
    })
    .await;

    let editor = SessionContext::login("editor", "admin123", &default_accounts()).unwrap();
    let client = BackendClient::new(&config, &editor).unwrap();
    let stream = NotificationStream::new(client.clone(), &config);
    let mut view = ReviewsView::new(client, editor);
    assert_eq!(view.fetch().await.unwrap(), 2);

    view.approve(21).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), view.run(stream.subscribe()))
        .await
        .expect("reviews view did not finish");

    assert!(view.reviews().find(20).is_none());
    let approved = view.reviews().find(21).unwrap();
    assert_eq!(approved.status, ReviewStatus::Approved);
    assert_eq!(approved.reviewer.as_deref(), Some("carol"));
    assert_eq!(approved.remarks.as_deref(), Some("None"));

    // The review path never writes posts back.
    assert_eq!(
        calls(&state),
        vec!["GET /reviews editor", "PUT /21/approve editor by editor"]
    );
}

#[tokio::test]
async fn test_reviews_forbidden_for_non_editor() {
    let (config, _state) = start_backend(Backend::default()).await;

    let session = SessionContext::anonymous();
    let client = BackendClient::new(&config, &session).unwrap();
    let mut view = ReviewsView::new(client, session);

    let err = view.fetch().await.unwrap_err();
    assert_eq!(err.status_code(), Some(403));
    assert!(view.last_error().is_some());
}

#[tokio::test]
async fn test_teardown_stops_before_applying() {
    let (config, state) = start_backend(Backend {
        posts: vec![draft(7, "Seven")],
        events: vec![event(7, "rejected", "bob", Some("late"))],
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let stream = NotificationStream::new(client.clone(), &config);
    let mut view = DraftsView::new(client, &config);
    view.refresh().await.unwrap();

    view.cancellation_token().cancel();
    run_drafts(&mut view, &stream).await;

    assert_eq!(view.drafts().find(7).unwrap().status, PostStatus::Draft);
    assert!(view.last_outcome().is_none());
    assert_eq!(calls(&state), vec!["GET /drafts user"]);
}

#[tokio::test]
async fn test_teardown_lets_write_through_finish() {
    let (config, state) = start_backend(Backend {
        posts: vec![draft(7, "Seven")],
        events: vec![event(7, "rejected", "bob", Some("needs work"))],
        get_delay: Some(Duration::from_millis(300)),
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let stream = NotificationStream::new(client.clone(), &config);
    let mut view = DraftsView::new(client, &config);
    view.refresh().await.unwrap();
    let cancel = view.cancellation_token();

    let subscription = stream.subscribe();
    let running = tokio::spawn(async move {
        view.run(subscription).await;
        view
    });

    // Tear down while the post GET is still being answered.
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let view = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(view.drafts().find(7).unwrap().status, PostStatus::Rejected);
    assert!(view.last_outcome().is_none());

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(
        calls(&state),
        vec!["GET /drafts user", "GET /7 user", "PUT /7 user"]
    );
    let stored = state.lock().unwrap().posts[0].clone();
    assert_eq!(stored.status, PostStatus::Rejected);
    assert_eq!(stored.remarks.as_deref(), Some("needs work"));
}

#[tokio::test]
async fn test_create_and_submit_draft() {
    let (config, state) = start_backend(Backend::default()).await;

    let alice = SessionContext::login("user", "user123", &default_accounts()).unwrap();
    let client = BackendClient::new(&config, &alice).unwrap();
    let mut view = DraftsView::new(client, &config);

    let created = view
        .create_draft(&NewPost::draft("Hello", "World", Some("alice".into())))
        .await
        .unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.status, PostStatus::Draft);
    assert_eq!(view.drafts().find(1), Some(&created));

    view.submit_for_review(1).await.unwrap();

    assert_eq!(calls(&state), vec!["POST / user", "POST /submit user"]);
    assert_eq!(
        state.lock().unwrap().bodies[0],
        serde_json::json!({"postId": 1, "author": "alice"})
    );
}

#[tokio::test]
async fn test_submit_requires_cached_draft_with_author() {
    let (config, state) = start_backend(Backend::default()).await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let mut view = DraftsView::new(client, &config);

    let mut orphan = draft(4, "Orphan");
    orphan.author = None;
    view.add_draft(orphan);

    let err = view.submit_for_review(4).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput { .. }));

    let err = view.submit_for_review(99).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    assert!(calls(&state).is_empty());
}

#[tokio::test]
async fn test_clear_filters_and_sorting() {
    let mut older = draft(1, "Older");
    older.created_date = NaiveDate::from_ymd_opt(2024, 1, 1);
    let mut edited = draft(2, "Edited");
    edited.created_date = NaiveDate::from_ymd_opt(2023, 6, 1);
    edited.last_modified_date = NaiveDate::from_ymd_opt(2024, 5, 1);
    let mut newer = draft(3, "Newer");
    newer.created_date = NaiveDate::from_ymd_opt(2024, 3, 1);

    let (config, state) = start_backend(Backend {
        posts: vec![older, edited, newer],
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let mut view = DraftsView::new(client, &config);
    view.fetch(DraftFilter {
        author: Some("alice".into()),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(view.filter().author.as_deref(), Some("alice"));

    assert_eq!(view.clear_filters().await.unwrap(), 3);
    assert_eq!(view.filter(), &DraftFilter::default());
    assert!(state.lock().unwrap().draft_queries[1].is_empty());

    let order: Vec<i64> = view.sorted_drafts().iter().map(|p| p.id).collect();
    assert_eq!(order, vec![2, 3, 1]);
}

#[tokio::test]
async fn test_list_published_posts() {
    let mut published = draft(5, "Live");
    published.status = PostStatus::Published;
    let (config, state) = start_backend(Backend {
        posts: vec![draft(4, "Draft"), published],
        ..Backend::default()
    })
    .await;

    let client = BackendClient::new(&config, &SessionContext::anonymous()).unwrap();
    let posts = client.list_published().await.unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, 5);
    assert_eq!(calls(&state), vec!["GET /published user"]);
}

#[tokio::test]
async fn test_reject_sends_reviewer_and_remarks() {
    let (config, state) = start_backend(Backend {
        reviews: vec![pending_review(20, 7)],
        ..Backend::default()
    })
    .await;

    let editor = SessionContext::login("editor2", "admin123", &default_accounts()).unwrap();
    let client = BackendClient::new(&config, &editor).unwrap();
    let view = ReviewsView::new(client, editor);

    view.reject(20, "off topic").await.unwrap();

    assert_eq!(calls(&state), vec!["PUT /20/reject editor"]);
    assert_eq!(
        state.lock().unwrap().bodies[0],
        serde_json::json!({"reviewer": "editor2", "remarks": "off topic"})
    );
}
