use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use bloomed_types::{ChatMessage, DreamResponse, DreamSubmission, JournalEntry};

use crate::api::DreamApi;
use crate::error::{Result, WidgetError};
use crate::session::SessionManager;

pub const WELCOME_ID: &str = "welcome";
pub const WELCOME_TEXT: &str =
    "Welcome to the **Dream Decoder**! ✨ Share your dream, and let's explore its hidden depths together.";
pub const SAVED_FALLBACK_TEXT: &str = "Your dream has been saved to your journal.";
pub const FAILURE_TEXT: &str = "Sorry, I couldn't decode the dream right now. Please try again later.";
pub const HOURLY_LIMIT_TEXT: &str =
    "You’ve reached the hourly dream limit (5 per hour). Try again in a few minutes — your credits refill gradually.";
pub const DAILY_LIMIT_TEXT: &str =
    "You’ve reached the daily dream limit (10 per day). Come back tomorrow to continue exploring. ✨";
pub const WAITLIST_CTA: &str = "Want unlimited interpretations, a place to save your dreams, and a guide that’s always by your side? [Click here to join our waitlist!](/waitlist)";

/// Whether a request is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient toast shown next to the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

struct InFlight {
    id: u64,
    token: CancellationToken,
}

struct WidgetState {
    open: bool,
    phase: Phase,
    session: SessionManager,
    messages: Vec<ChatMessage>,
    notices: Vec<Notice>,
    saved_dreams: Vec<JournalEntry>,
    initial_dream: Option<String>,
    in_flight: Option<InFlight>,
}

impl WidgetState {
    fn notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice {
            level,
            text: text.into(),
        });
    }
}

struct Inner {
    api: Arc<dyn DreamApi>,
    state: Mutex<WidgetState>,
    next_request: AtomicU64,
    next_message: AtomicU64,
}

/// The chat widget's request lifecycle.
///
/// At most one request is in flight. Starting a submission cancels the one
/// before it, and a cancelled request never touches the message list or the
/// loading state. Every user message `U` gets at most one reply, `bot-U` or
/// `error-*-U`.
///
/// Submissions spawn onto the current tokio runtime; the returned handle
/// resolves once the reply (if any) has been applied.
#[derive(Clone)]
pub struct ChatWidget {
    inner: Arc<Inner>,
}

impl ChatWidget {
    pub fn new(api: Arc<dyn DreamApi>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                state: Mutex::new(WidgetState {
                    open: false,
                    phase: Phase::Idle,
                    session: SessionManager::new(),
                    messages: Vec::new(),
                    notices: Vec::new(),
                    saved_dreams: Vec::new(),
                    initial_dream: None,
                    in_flight: None,
                }),
                next_request: AtomicU64::new(1),
                next_message: AtomicU64::new(1),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dream handed over by the page that opened the widget; submitted on the
    /// next open
    pub fn set_initial_dream(&self, dream: impl Into<String>) {
        let dream = dream.into();
        let mut state = self.lock();
        state.initial_dream = Some(dream).filter(|d| !d.trim().is_empty());
    }

    /// Open the widget. Returns the handle of the initial dream submission
    /// when one was pending.
    pub fn open(&self) -> Option<JoinHandle<()>> {
        let mut state = self.lock();
        state.open = true;
        let session_id = state.session.ensure();

        let Some(initial) = state.initial_dream.take() else {
            if state.messages.is_empty() {
                state.messages.push(ChatMessage::bot(WELCOME_ID, WELCOME_TEXT));
            }
            return None;
        };

        let user_id = format!("user-initial-{}", Utc::now().timestamp_millis());
        state.messages.retain(|m| m.id != WELCOME_ID);
        state.messages.push(ChatMessage::user(&user_id, &initial));
        tracing::info!(session_id = %session_id, "Submitting initial dream");
        Some(self.dispatch(&mut state, initial, user_id, session_id))
    }

    /// Close the widget, abandoning any in-flight request
    pub fn close(&self) {
        let mut state = self.lock();
        if let Some(in_flight) = state.in_flight.take() {
            tracing::debug!(request = in_flight.id, "Aborting request on close");
            in_flight.token.cancel();
        }
        state.phase = Phase::Idle;
        state.open = false;
    }

    /// Submit from the input box; refused while a request is in flight
    pub fn try_submit(&self, text: &str) -> Result<JoinHandle<()>> {
        let mut state = self.lock();
        if state.phase != Phase::Idle {
            state.notice(NoticeLevel::Info, WidgetError::Busy.to_string());
            return Err(WidgetError::Busy);
        }
        self.submit_locked(&mut state, text)
    }

    /// Submit a dream, superseding any request still in flight
    pub fn submit(&self, text: &str) -> Result<JoinHandle<()>> {
        let mut state = self.lock();
        self.submit_locked(&mut state, text)
    }

    fn submit_locked(&self, state: &mut WidgetState, text: &str) -> Result<JoinHandle<()>> {
        let text = text.trim();
        if text.is_empty() {
            state.notice(NoticeLevel::Info, WidgetError::EmptyDream.to_string());
            return Err(WidgetError::EmptyDream);
        }
        let Some(session_id) = state.session.current() else {
            state.notice(NoticeLevel::Error, WidgetError::NoSession.to_string());
            return Err(WidgetError::NoSession);
        };

        let user_id = format!(
            "user-{}-{}",
            Utc::now().timestamp_millis(),
            self.inner.next_message.fetch_add(1, Ordering::Relaxed)
        );
        state.messages.push(ChatMessage::user(&user_id, text));
        Ok(self.dispatch(state, text.to_string(), user_id, session_id))
    }

    fn dispatch(
        &self,
        state: &mut WidgetState,
        text: String,
        user_id: String,
        session_id: Uuid,
    ) -> JoinHandle<()> {
        if let Some(previous) = state.in_flight.take() {
            tracing::debug!(request = previous.id, "Superseding in-flight request");
            previous.token.cancel();
        }

        let id = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        state.in_flight = Some(InFlight {
            id,
            token: token.clone(),
        });
        state.phase = Phase::Submitting;

        let submission = DreamSubmission::new(
            text,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            session_id.to_string(),
        );
        let widget = self.clone();
        tokio::spawn(async move { widget.run(id, token, user_id, submission).await })
    }

    async fn run(&self, id: u64, token: CancellationToken, user_id: String, submission: DreamSubmission) {
        let api = self.inner.api.clone();
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(request = id, "Request aborted");
                return;
            }
            outcome = api.submit(&submission) => outcome,
        };

        let mut state = self.lock();
        // Cancellation happens under this lock, so a request that is still
        // live here is the current one.
        if token.is_cancelled() {
            tracing::debug!(request = id, "Request aborted after completion");
            return;
        }

        apply_outcome(&mut state, &user_id, outcome);

        if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
            state.in_flight = None;
            state.phase = Phase::Idle;
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase() == Phase::Submitting
    }

    /// The submit control is enabled only when idle
    pub fn can_submit(&self) -> bool {
        self.phase() == Phase::Idle
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.lock().session.current()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.lock().notices.clone()
    }

    /// Journal entries the server reported as saved during this session
    pub fn saved_dreams(&self) -> Vec<JournalEntry> {
        self.lock().saved_dreams.clone()
    }
}

fn apply_outcome(state: &mut WidgetState, user_id: &str, outcome: Result<DreamResponse>) {
    match outcome {
        Ok(response) => {
            if let Some(saved) = response.saved_dream {
                tracing::info!(entry_id = %saved.id, "Dream saved to journal");
                state.saved_dreams.push(saved);
            }
            let text = if response.interpretation.is_empty() {
                SAVED_FALLBACK_TEXT.to_string()
            } else {
                response.interpretation
            };
            state.messages.push(ChatMessage::bot(format!("bot-{}", user_id), text));
        }
        Err(WidgetError::Throttled { scope, message }) => {
            let friendly = match scope.as_str() {
                "hourly" => HOURLY_LIMIT_TEXT.to_string(),
                "daily" => DAILY_LIMIT_TEXT.to_string(),
                _ => message,
            };
            state.messages.push(ChatMessage::bot(
                format!("error-rate-limit-{}", user_id),
                format!("{} {}", friendly, WAITLIST_CTA),
            ));
            state.notice(NoticeLevel::Error, friendly);
        }
        Err(e) => {
            tracing::error!(error = %e, "Dream interpretation failed");
            state.notice(NoticeLevel::Error, format!("Interpretation failed: {}", e));
            state
                .messages
                .push(ChatMessage::bot(format!("error-api-{}", user_id), FAILURE_TEXT));
        }
    }
}
