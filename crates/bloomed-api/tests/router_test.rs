use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tower::ServiceExt;

use bloomed_api::{build_router, config::Config, state::AppState};
use bloomed_gateway::{DreamClassifier, GatewayError, WorkflowGateway};
use bloomed_store::{
    AuthSession, AuthStore, CounterStore, InMemoryAuthStore, InMemoryCounterStore,
    InMemoryJournalStore, StoreError, WindowOutcome,
};
use bloomed_types::{DreamAnalysis, DreamDetails, DreamSubmission, InterpretationResult, Mood};

const TOKEN: &str = "token-alice";

/// Workflow fake answering every call the same way
struct FakeWorkflow {
    reply: Result<String, u16>,
    calls: AtomicUsize,
}

impl FakeWorkflow {
    fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(text.to_string()), calls: AtomicUsize::new(0) })
    }

    fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self { reply: Err(status), calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl WorkflowGateway for FakeWorkflow {
    async fn interpret(&self, _submission: &DreamSubmission) -> Result<InterpretationResult, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(InterpretationResult::new(text.clone())),
            Err(status) => Err(GatewayError::Status {
                status: *status,
                detail: "workflow down".to_string(),
            }),
        }
    }
}

struct FakeClassifier(DreamAnalysis);

#[async_trait]
impl DreamClassifier for FakeClassifier {
    async fn classify(&self, _text: &str) -> DreamAnalysis {
        self.0.clone()
    }
}

fn purple_ocean() -> DreamAnalysis {
    DreamAnalysis::Dream(DreamDetails {
        title: "Flight Over Purple Waters".to_string(),
        mood: Mood::Exciting,
        tags: vec!["flying".into(), "ocean".into(), "freedom".into()],
    })
}

struct Harness {
    app: Router,
    workflow: Arc<FakeWorkflow>,
    journal: Arc<InMemoryJournalStore>,
}

fn harness_with(config: Config, workflow: Arc<FakeWorkflow>, analysis: DreamAnalysis) -> Harness {
    let journal = Arc::new(InMemoryJournalStore::new());
    let auth = InMemoryAuthStore::new().with_session(TOKEN, AuthSession::new("user-alice", TOKEN));

    let state = AppState::new(config)
        .with_counter_store(Arc::new(InMemoryCounterStore::new()))
        .with_workflow(workflow.clone())
        .with_classifier(Arc::new(FakeClassifier(analysis)))
        .with_auth(Arc::new(auth))
        .with_journal(journal.clone());

    Harness {
        app: build_router(Arc::new(state)),
        workflow,
        journal,
    }
}

fn harness(workflow: Arc<FakeWorkflow>, analysis: DreamAnalysis) -> Harness {
    harness_with(Config::default(), workflow, analysis)
}

fn dream_request(body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/dream")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn dream_body(text: &str) -> String {
    json!({
        "dreamText": text,
        "timestamp": "2024-05-01T10:00:00.000Z",
        "sessionId": "3f1c9a52-8d0e-4a53-9a51-2b7f8f3c1d00"
    })
    .to_string()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, value)
}

#[tokio::test]
async fn test_signed_in_dream_is_interpreted_and_saved() {
    let h = harness(FakeWorkflow::ok("You seek freedom..."), purple_ocean());
    let text = "I was flying over a purple ocean";

    let (status, _, body) = send(&h.app, dream_request(&dream_body(text), Some(TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interpretation"], "You seek freedom...");
    assert_eq!(body["savedDream"]["title"], "Flight Over Purple Waters");
    assert_eq!(body["savedDream"]["mood"], "exciting");
    assert_eq!(h.journal.insert_calls(), 1);

    let saved = h.journal.entries();
    assert_eq!(saved[0].content, text);
    assert_eq!(saved[0].user_id, "user-alice");
    assert_eq!(saved[0].interpretation.as_deref(), Some("You seek freedom..."));
}

#[tokio::test]
async fn test_greeting_is_answered_but_not_saved() {
    let h = harness(FakeWorkflow::ok("Hello! Tell me a dream."), DreamAnalysis::NotADream);

    let (status, _, body) = send(&h.app, dream_request(&dream_body("hi"), Some(TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interpretation"], "Hello! Tell me a dream.");
    assert!(body["savedDream"].is_null());
    assert_eq!(h.journal.insert_calls(), 0);
}

#[tokio::test]
async fn test_anonymous_dream_is_not_saved() {
    let h = harness(FakeWorkflow::ok("You seek freedom..."), purple_ocean());

    let (status, _, body) = send(&h.app, dream_request(&dream_body("I was flying"), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["savedDream"].is_null());
    assert_eq!(h.journal.insert_calls(), 0);
}

#[tokio::test]
async fn test_failed_journal_write_still_succeeds() {
    let h = harness(FakeWorkflow::ok("You seek freedom..."), purple_ocean());
    h.journal.set_failing(true);

    let (status, _, body) = send(&h.app, dream_request(&dream_body("I was flying"), Some(TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interpretation"], "You seek freedom...");
    assert!(body["savedDream"].is_null());
    assert_eq!(h.journal.insert_calls(), 1);
}

#[tokio::test]
async fn test_workflow_failure_is_502_without_insert() {
    let h = harness(FakeWorkflow::failing(500), purple_ocean());

    let (status, _, body) = send(&h.app, dream_request(&dream_body("I was flying"), Some(TOKEN))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Failed to get a response from the dream decoder service.");
    assert_eq!(h.journal.insert_calls(), 0);
}

#[tokio::test]
async fn test_validation_bounds() {
    let h = harness(FakeWorkflow::ok("ok"), DreamAnalysis::NotADream);

    let (status, _, body) = send(&h.app, dream_request(&dream_body("   "), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Dream text cannot be empty.");

    let (status, _, body) = send(&h.app, dream_request(r#"{"timestamp":"x"}"#, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Dream text cannot be empty.");

    let (status, _, body) = send(&h.app, dream_request(&dream_body(&"a".repeat(5001)), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Dream text is too long. Please keep it under 5000 characters."
    );

    let (status, _, body) = send(&h.app, dream_request("{oops", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body.");

    let (status, _, _) = send(&h.app, dream_request(&dream_body(&"a".repeat(5000)), None)).await;
    assert_eq!(status, StatusCode::OK);

    // Only the accepted submission reached the workflow
    assert_eq!(h.workflow.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_daily_limit_is_checked_first() {
    let mut config = Config::default();
    config.limits.daily = 2;
    config.limits.hourly = 5;
    let h = harness_with(config, FakeWorkflow::ok("ok"), DreamAnalysis::NotADream);

    for _ in 0..2 {
        let (status, _, _) = send(&h.app, dream_request(&dream_body("I was flying"), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) = send(&h.app, dream_request(&dream_body("I was flying"), None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["scope"], "daily");
    assert!(body["error"].as_str().unwrap().starts_with("Too many requests."));
    assert_eq!(headers["x-ratelimit-limit"], "2");
    assert_eq!(headers["x-ratelimit-remaining"], "0");
    assert!(headers["x-ratelimit-reset"].to_str().unwrap().ends_with('Z'));
    assert_eq!(h.workflow.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_hourly_limit() {
    let mut config = Config::default();
    config.limits.hourly = 1;
    let h = harness_with(config, FakeWorkflow::ok("ok"), DreamAnalysis::NotADream);

    let (status, _, _) = send(&h.app, dream_request(&dream_body("I was flying"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, body) = send(&h.app, dream_request(&dream_body("I was flying"), None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["scope"], "hourly");
    assert_eq!(headers["x-ratelimit-limit"], "1");
    assert_eq!(h.workflow.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_webhook_is_500() {
    let app = build_router(Arc::new(AppState::new(Config::default())));

    let (status, _, body) = send(&app, dream_request(&dream_body("I was flying"), None)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "Internal server configuration error. Please contact support."
    );
}

#[tokio::test]
async fn test_counter_store_outage_fails_open() {
    let store = Arc::new(InMemoryCounterStore::new());
    store.set_unavailable(true);
    let state = AppState::new(Config::default())
        .with_counter_store(store)
        .with_workflow(FakeWorkflow::ok("still here"))
        .with_classifier(Arc::new(FakeClassifier(DreamAnalysis::NotADream)));
    let app = build_router(Arc::new(state));

    let (status, _, body) = send(&app, dream_request(&dream_body("I was flying"), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interpretation"], "still here");
}

#[tokio::test]
async fn test_journal_lists_saved_dreams() {
    let h = harness(FakeWorkflow::ok("You seek freedom..."), purple_ocean());
    send(&h.app, dream_request(&dream_body("I was flying"), Some(TOKEN))).await;

    let req = Request::builder()
        .uri("/journal")
        .header("authorization", format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["content"], "I was flying");

    let anonymous = Request::builder().uri("/journal").body(Body::empty()).unwrap();
    let (status, _, body) = send(&h.app, anonymous).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_health_reports_collaborators() {
    let h = harness(FakeWorkflow::ok("ok"), DreamAnalysis::NotADream);

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(&h.app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["workflow"], "configured");
    assert_eq!(body["services"]["journal"], "configured");
    assert_eq!(body["services"]["counter_store"], "connected");
    assert!(body["metrics"]["totalMessages"].is_number());
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = build_router(Arc::new(AppState::new(Config::default())));

    let req = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/dream"]["post"].is_object());
    assert!(body["paths"]["/journal"]["get"].is_object());

    let mut refs = Vec::new();
    collect_refs(&body, &mut refs);
    assert!(refs.contains(&"#/components/schemas/DreamSubmission".to_string()));
    for reference in refs {
        let name = reference.trim_start_matches("#/components/schemas/");
        assert!(
            body["components"]["schemas"][name].is_object(),
            "unresolved schema reference {}",
            reference
        );
    }
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", Value::String(reference)) => out.push(reference.clone()),
                    _ => collect_refs(child, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, out)),
        _ => {}
    }
}

/// Counter store that answers every window check after `delay`
struct SlowCounterStore {
    inner: InMemoryCounterStore,
    delay: Duration,
}

#[async_trait]
impl CounterStore for SlowCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.incr(key).await
    }

    async fn get(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.get(key).await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.sadd(key, member).await
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        self.inner.scard(key).await
    }

    async fn sliding_window(
        &self,
        key: &str,
        limit: u64,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<WindowOutcome, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.sliding_window(key, limit, window_ms, now_ms).await
    }
}

struct SlowAuthStore {
    inner: InMemoryAuthStore,
    delay: Duration,
}

#[async_trait]
impl AuthStore for SlowAuthStore {
    async fn current_session(&self, headers: &HeaderMap) -> Result<Option<AuthSession>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.current_session(headers).await
    }
}

struct SlowWorkflow(Duration);

#[async_trait]
impl WorkflowGateway for SlowWorkflow {
    async fn interpret(&self, _submission: &DreamSubmission) -> Result<InterpretationResult, GatewayError> {
        tokio::time::sleep(self.0).await;
        Ok(InterpretationResult::new("You seek freedom..."))
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_collaborators_within_their_bounds_still_succeed() {
    let journal = Arc::new(InMemoryJournalStore::new());
    let auth = InMemoryAuthStore::new().with_session(TOKEN, AuthSession::new("user-alice", TOKEN));
    let state = AppState::new(Config::default())
        .with_counter_store(Arc::new(SlowCounterStore {
            inner: InMemoryCounterStore::new(),
            delay: Duration::from_millis(4_900),
        }))
        .with_auth(Arc::new(SlowAuthStore {
            inner: auth,
            delay: Duration::from_millis(4_900),
        }))
        .with_workflow(Arc::new(SlowWorkflow(Duration::from_secs(29))))
        .with_classifier(Arc::new(FakeClassifier(purple_ocean())))
        .with_journal(journal.clone());
    let app = build_router(Arc::new(state));

    let (status, _, body) = send(&app, dream_request(&dream_body("I was flying"), Some(TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interpretation"], "You seek freedom...");
    assert_eq!(body["savedDream"]["title"], "Flight Over Purple Waters");
    assert_eq!(journal.insert_calls(), 1);
}

/// Both fakes wait for each other, so a reply needs the two calls in flight
/// at the same time.
struct RendezvousWorkflow(Arc<Barrier>);

#[async_trait]
impl WorkflowGateway for RendezvousWorkflow {
    async fn interpret(&self, _submission: &DreamSubmission) -> Result<InterpretationResult, GatewayError> {
        match tokio::time::timeout(Duration::from_secs(2), self.0.wait()).await {
            Ok(_) => Ok(InterpretationResult::new("You seek freedom...")),
            Err(_) => Err(GatewayError::Timeout(2)),
        }
    }
}

struct RendezvousClassifier(Arc<Barrier>);

#[async_trait]
impl DreamClassifier for RendezvousClassifier {
    async fn classify(&self, _text: &str) -> DreamAnalysis {
        match tokio::time::timeout(Duration::from_secs(2), self.0.wait()).await {
            Ok(_) => purple_ocean(),
            Err(_) => DreamAnalysis::NotADream,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_workflow_and_classifier_run_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let journal = Arc::new(InMemoryJournalStore::new());
    let auth = InMemoryAuthStore::new().with_session(TOKEN, AuthSession::new("user-alice", TOKEN));
    let state = AppState::new(Config::default())
        .with_counter_store(Arc::new(InMemoryCounterStore::new()))
        .with_workflow(Arc::new(RendezvousWorkflow(barrier.clone())))
        .with_classifier(Arc::new(RendezvousClassifier(barrier)))
        .with_auth(Arc::new(auth))
        .with_journal(journal.clone());
    let app = build_router(Arc::new(state));

    let (status, _, body) = send(&app, dream_request(&dream_body("I was flying"), Some(TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["savedDream"]["title"], "Flight Over Purple Waters");
    assert_eq!(journal.insert_calls(), 1);
}
