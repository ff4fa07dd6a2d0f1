use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use bloomed_types::{DreamResponse, DreamSubmission};
use bloomed_widget::{
    controller::{DAILY_LIMIT_TEXT, WAITLIST_CTA, WELCOME_ID},
    ChatWidget, DreamApi, HttpDreamApi, NoticeLevel, Phase, WidgetError,
};

/// Fake transport. Calls listed in `held` wait until `release` fires.
struct FakeApi {
    calls: AtomicUsize,
    held: Vec<usize>,
    release: Notify,
    throttle_scope: Option<String>,
    seen: Mutex<Vec<DreamSubmission>>,
}

impl FakeApi {
    fn new() -> Arc<Self> {
        Self::build(Vec::new(), None)
    }

    fn holding(held: Vec<usize>) -> Arc<Self> {
        Self::build(held, None)
    }

    fn throttling(scope: &str) -> Arc<Self> {
        Self::build(Vec::new(), Some(scope.to_string()))
    }

    fn build(held: Vec<usize>, throttle_scope: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            held,
            release: Notify::new(),
            throttle_scope,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DreamApi for FakeApi {
    async fn submit(&self, submission: &DreamSubmission) -> bloomed_widget::Result<DreamResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(submission.clone());
        if self.held.contains(&call) {
            self.release.notified().await;
        }
        if let Some(scope) = &self.throttle_scope {
            return Err(WidgetError::Throttled {
                scope: scope.clone(),
                message: "Too many requests.".to_string(),
            });
        }
        Ok(DreamResponse {
            interpretation: format!("Reading of: {}", submission.dream_text),
            saved_dream: None,
        })
    }
}

async fn wait_for_calls(api: &FakeApi, n: usize) {
    for _ in 0..200 {
        if api.calls() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} calls, saw {}", n, api.calls());
}

fn ids(widget: &ChatWidget) -> Vec<String> {
    widget.messages().into_iter().map(|m| m.id).collect()
}

#[tokio::test]
async fn test_open_creates_session_and_welcome() {
    let widget = ChatWidget::new(FakeApi::new());
    assert!(widget.session_id().is_none());

    assert!(widget.open().is_none());
    let session = widget.session_id().expect("session");
    assert_eq!(ids(&widget), vec![WELCOME_ID]);

    widget.close();
    widget.open();
    assert_eq!(widget.session_id(), Some(session));
    assert_eq!(ids(&widget), vec![WELCOME_ID]);
}

#[tokio::test]
async fn test_submit_round_trip() {
    let api = FakeApi::new();
    let widget = ChatWidget::new(api.clone());
    widget.open();

    let handle = widget.try_submit("  I was flying over a purple ocean  ").unwrap();
    assert_eq!(widget.phase(), Phase::Submitting);
    assert!(!widget.can_submit());
    handle.await.unwrap();

    let messages = widget.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages[1].is_user);
    assert_eq!(messages[1].text, "I was flying over a purple ocean");
    assert_eq!(messages[2].id, format!("bot-{}", messages[1].id));
    assert_eq!(messages[2].text, "Reading of: I was flying over a purple ocean");
    assert_eq!(widget.phase(), Phase::Idle);

    let seen = api.seen.lock().unwrap();
    assert_eq!(seen[0].session_id, widget.session_id().unwrap().to_string());
}

#[tokio::test]
async fn test_supersession_appends_one_reply() {
    let api = FakeApi::holding(vec![0]);
    let widget = ChatWidget::new(api.clone());
    widget.open();

    let first = widget.submit("first dream").unwrap();
    wait_for_calls(&api, 1).await;
    let second = widget.submit("second dream").unwrap();

    second.await.unwrap();
    first.await.unwrap();

    let messages = widget.messages();
    let replies: Vec<_> = messages.iter().filter(|m| !m.is_user && m.id != WELCOME_ID).collect();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, "Reading of: second dream");
    assert_eq!(widget.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_try_submit_refused_while_loading() {
    let api = FakeApi::holding(vec![0]);
    let widget = ChatWidget::new(api.clone());
    widget.open();

    let first = widget.try_submit("first dream").unwrap();
    assert!(matches!(widget.try_submit("second"), Err(WidgetError::Busy)));
    assert_eq!(
        widget.notices().last().unwrap().text,
        "Please wait, previous request is processing."
    );

    api.release.notify_one();
    first.await.unwrap();
    assert!(widget.can_submit());
}

#[tokio::test]
async fn test_empty_submission_is_rejected() {
    let api = FakeApi::new();
    let widget = ChatWidget::new(api.clone());
    widget.open();

    assert!(matches!(widget.submit("   "), Err(WidgetError::EmptyDream)));
    let notice = widget.notices().pop().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
    assert_eq!(notice.text, "Please describe your dream first.");
    assert_eq!(api.calls(), 0);
    assert_eq!(ids(&widget), vec![WELCOME_ID]);
}

#[tokio::test]
async fn test_submit_without_session_is_rejected() {
    let widget = ChatWidget::new(FakeApi::new());
    assert!(matches!(widget.submit("a dream"), Err(WidgetError::NoSession)));
    assert!(widget.messages().is_empty());
}

#[tokio::test]
async fn test_close_aborts_and_forces_idle() {
    let api = FakeApi::holding(vec![0]);
    let widget = ChatWidget::new(api.clone());
    widget.open();

    let handle = widget.submit("a dream").unwrap();
    wait_for_calls(&api, 1).await;
    widget.close();

    assert_eq!(widget.phase(), Phase::Idle);
    assert!(!widget.is_open());
    handle.await.unwrap();

    assert!(widget.messages().iter().all(|m| m.is_user || m.id == WELCOME_ID));
    assert!(widget.notices().is_empty());
}

#[tokio::test]
async fn test_initial_dream_is_submitted_once() {
    let api = FakeApi::new();
    let widget = ChatWidget::new(api.clone());
    widget.set_initial_dream("I dreamed of a glass forest");

    let handle = widget.open().expect("initial dream dispatched");
    handle.await.unwrap();

    let messages = widget.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].id.starts_with("user-initial-"));
    assert_eq!(messages[1].id, format!("bot-{}", messages[0].id));

    widget.close();
    assert!(widget.open().is_none());
    assert_eq!(api.calls(), 1);
    assert_eq!(widget.messages().len(), 2);
}

#[tokio::test]
async fn test_rate_limited_reply() {
    let widget = ChatWidget::new(FakeApi::throttling("daily"));
    widget.open();

    widget.submit("a dream").unwrap().await.unwrap();

    let reply = widget.messages().pop().unwrap();
    assert!(reply.id.starts_with("error-rate-limit-user-"));
    assert_eq!(reply.text, format!("{} {}", DAILY_LIMIT_TEXT, WAITLIST_CTA));
    assert!(reply.text.contains("[Click here to join our waitlist!](/waitlist)"));

    let notice = widget.notices().pop().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.text, DAILY_LIMIT_TEXT);
    assert!(widget.can_submit());
}

#[tokio::test]
async fn test_http_api_decodes_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/dream")
        .match_header("authorization", "Bearer tok")
        .with_header("content-type", "application/json")
        .with_body(r#"{"interpretation":"You seek freedom...","savedDream":null}"#)
        .create_async()
        .await;

    let api = HttpDreamApi::new(format!("{}/", server.url()))
        .unwrap()
        .with_access_token("tok");
    let response = api
        .submit(&DreamSubmission::new("I was flying", "2024-05-01T10:00:00.000Z", "s"))
        .await
        .unwrap();

    assert_eq!(response.interpretation, "You seek freedom...");
    assert!(response.saved_dream.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_api_maps_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/dream")
        .with_status(429)
        .with_body(r#"{"error":"Too many requests.","scope":"hourly"}"#)
        .expect(1)
        .create_async()
        .await;

    let api = HttpDreamApi::new(server.url()).unwrap();
    let submission = DreamSubmission::new("I was flying", "2024-05-01T10:00:00.000Z", "s");

    let err = api.submit(&submission).await.unwrap_err();
    assert!(matches!(err, WidgetError::Throttled { ref scope, .. } if scope == "hourly"));

    server.reset();
    server
        .mock("POST", "/dream")
        .with_status(502)
        .with_body(r#"{"error":"Failed to get a response from the dream decoder service."}"#)
        .create_async()
        .await;

    let err = api.submit(&submission).await.unwrap_err();
    assert!(matches!(err, WidgetError::Rejected { status: 502, .. }));
    assert_eq!(
        err.to_string(),
        "Failed to get a response from the dream decoder service."
    );
}
