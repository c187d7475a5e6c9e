//! Conversation history and the chat request lifecycle
//!
//! A send is split in two so the user's message lands synchronously:
//! [`ConversationStore::begin_send`] rate-limits, appends the user message
//! and marks the store as loading; the returned [`PendingRequest`] then
//! performs the network call and appends the reply (or an error) when
//! awaited. [`ConversationStore::send`] does both in one call.
//!
//! ```text
//! begin_send ──▶ loading ──▶ reply appended      (success)
//!                   │   └──▶ error appended      (after 3 failed attempts)
//!                   └── cancel ──▶ placeholder   (no error message)
//! ```

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::api::{ChatBackend, ChatResponse, QueryRequest};
use crate::error::{ChatError, ChatResult};
use crate::observable::{StateCell, Subscription};
use crate::session::SessionStore;
use crate::state::Message;

/// Minimum time between two accepted sends
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);
/// Extra attempts after the first failed one
pub const REQUEST_RETRIES: usize = 2;
/// Content of the neutral message left behind by a cancelled request
pub const STOPPED_PLACEHOLDER: &str = " ";

struct RateLimiter {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    /// Record `now` and return true when enough time has passed
    fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}

struct InFlight {
    id: u64,
    cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct RequestTracker {
    next_id: u64,
    latest: u64,
    in_flight: Vec<InFlight>,
    cancelled: HashSet<u64>,
}

pub struct ConversationStore {
    backend: Arc<dyn ChatBackend>,
    session: Arc<SessionStore>,
    messages: StateCell<Vec<Message>>,
    loading: StateCell<bool>,
    limiter: Mutex<RateLimiter>,
    requests: Mutex<RequestTracker>,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn ChatBackend>, session: Arc<SessionStore>) -> Self {
        Self {
            backend,
            session,
            messages: StateCell::new(Vec::new()),
            loading: StateCell::new(false),
            limiter: Mutex::new(RateLimiter::new(MIN_REQUEST_INTERVAL)),
            requests: Mutex::new(RequestTracker::default()),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.get()
    }

    pub fn message_count(&self) -> usize {
        self.messages.with(|messages| messages.len())
    }

    pub fn subscribe(&self) -> Subscription<Vec<Message>> {
        self.messages.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    pub fn session_id(&self) -> String {
        self.session.current_id()
    }

    pub fn append_message(&self, message: Message) {
        self.messages.update(|messages| messages.push(message));
    }

    pub fn clear(&self) {
        self.messages.update(|messages| messages.clear());
    }

    /// Send and wait for the outcome
    pub async fn send(
        self: &Arc<Self>,
        content: &str,
        use_context: bool,
    ) -> ChatResult<ChatResponse> {
        self.begin_send(content, use_context)?.complete().await
    }

    /// Rate-limit, append the user message, mark loading, and hand back the
    /// request to await. A rate-limited send leaves the store untouched.
    pub fn begin_send(
        self: &Arc<Self>,
        content: &str,
        use_context: bool,
    ) -> ChatResult<PendingRequest> {
        if !self.limiter.lock().try_acquire(Instant::now()) {
            debug!("send rejected by rate limiter");
            return Err(ChatError::RateLimited);
        }

        self.loading.set(true);
        self.append_message(Message::user(content));

        let (cancel, cancel_rx) = oneshot::channel();
        let id = {
            let mut requests = self.requests.lock();
            requests.next_id += 1;
            let id = requests.next_id;
            requests.latest = id;
            requests.in_flight.push(InFlight { id, cancel });
            id
        };

        let session_id = self.session.current_id();
        Ok(PendingRequest {
            store: Arc::clone(self),
            id,
            request: QueryRequest::new(content, &session_id, use_context),
            session_id,
            cancel_rx,
        })
    }

    /// Abandon every in-flight request, leaving a single placeholder.
    /// No-op when nothing is in flight.
    pub fn cancel(&self) {
        let in_flight = {
            let mut requests = self.requests.lock();
            let in_flight = std::mem::take(&mut requests.in_flight);
            requests.cancelled.extend(in_flight.iter().map(|f| f.id));
            in_flight
        };

        if in_flight.is_empty() {
            debug!("cancel with no request in flight");
            return;
        }

        for flight in in_flight {
            info!(request = flight.id, "cancelling chat request");
            let _ = flight.cancel.send(());
        }
        self.loading.set(false);
        self.append_message(Message::assistant(STOPPED_PLACEHOLDER));
    }

    /// `[HH:MM:SS] Role: content`, one blank line between entries
    pub fn export_as_text(&self) -> String {
        self.messages.with(|messages| {
            messages
                .iter()
                .map(|msg| {
                    format!(
                        "[{}] {}: {}",
                        msg.timestamp.format("%H:%M:%S"),
                        msg.role.display_name(),
                        msg.content
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        })
    }

    /// Write the transcript to `chat-export-{epoch_millis}.txt` in `dir`
    pub fn export_to_file(&self, dir: &Path) -> ChatResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("chat-export-{}.txt", Utc::now().timestamp_millis()));
        std::fs::write(&path, self.export_as_text())?;
        info!(path = %path.display(), "exported conversation");
        Ok(path)
    }

    /// Drop the server-side history for this session, then the local one
    pub async fn clear_session(&self) -> ChatResult<()> {
        self.backend.clear_session(&self.session.current_id()).await?;
        self.clear();
        Ok(())
    }

    /// Forget the local history and switch to a fresh session id
    pub fn start_new_session(&self) -> String {
        self.clear();
        let id = self.session.reset();
        info!(session_id = %id, "started new session");
        id
    }

    pub async fn session_context(&self) -> ChatResult<serde_json::Value> {
        self.backend
            .session_context(&self.session.current_id())
            .await
    }

    async fn query_with_retry(
        &self,
        request: &QueryRequest,
        session_id: &str,
    ) -> ChatResult<ChatResponse> {
        let mut attempt = 0;
        loop {
            match self.backend.query(request, session_id).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < REQUEST_RETRIES => {
                    attempt += 1;
                    warn!(error = %e, attempt, "chat query failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn finish(&self, id: u64, outcome: ChatResult<ChatResponse>) -> ChatResult<ChatResponse> {
        let (was_cancelled, is_latest) = {
            let mut requests = self.requests.lock();
            requests.in_flight.retain(|f| f.id != id);
            let was_cancelled = requests.cancelled.remove(&id);
            (was_cancelled, requests.latest == id)
        };

        // cancel() already cleared loading and left the placeholder
        if was_cancelled {
            return Err(ChatError::Cancelled);
        }

        if is_latest {
            self.loading.set(false);
        }

        match outcome {
            Ok(response) if response.success => {
                if let Some(result) = &response.result {
                    let reply =
                        Message::assistant(result.clone()).with_metadata(response.message_metadata());
                    self.append_message(reply);
                } else {
                    warn!("chat response reported success without a result");
                }

                if response.is_unverified() {
                    warn!(
                        session_id = ?response.session_id,
                        "response not verified with database: no tables used"
                    );
                }
                Ok(response)
            }
            Ok(response) => {
                let err = ChatError::Rejected {
                    message: response.error,
                };
                error!(error = %err, "chat query rejected");
                self.append_message(Message::error(err.user_message()));
                Err(err)
            }
            Err(ChatError::Cancelled) => Err(ChatError::Cancelled),
            Err(err) => {
                error!(error = %err, "chat query failed");
                self.append_message(Message::error(err.user_message()));
                Err(err)
            }
        }
    }
}

/// A request whose user message is already in the conversation
pub struct PendingRequest {
    store: Arc<ConversationStore>,
    id: u64,
    request: QueryRequest,
    session_id: String,
    cancel_rx: oneshot::Receiver<()>,
}

impl PendingRequest {
    /// Run the request (with retries) and record its outcome in the store
    pub async fn complete(self) -> ChatResult<ChatResponse> {
        let PendingRequest {
            store,
            id,
            request,
            session_id,
            mut cancel_rx,
        } = self;

        // A dropped sender (request superseded) does not count as a cancel
        let outcome = tokio::select! {
            biased;
            Ok(()) = &mut cancel_rx => Err(ChatError::Cancelled),
            result = store.query_with_retry(&request, &session_id) => result,
        };

        store.finish(id, outcome)
    }
}
