//! Test doubles shared by the unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ChatBackend, ChatResponse, QueryRequest};
use crate::dictation::{RecognitionOptions, RecognizerError, SpeechRecognizer};
use crate::error::ChatResult;

/// Replays queued outcomes, each after its queued delay if any; waits
/// forever once the queue is empty
#[derive(Default)]
pub struct ScriptedBackend {
    pub outcomes: Mutex<VecDeque<ChatResult<ChatResponse>>>,
    pub delays: Mutex<VecDeque<Duration>>,
    pub requests: Mutex<Vec<(QueryRequest, String)>>,
    pub calls: AtomicUsize,
    pub cleared: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn with(outcomes: Vec<ChatResult<ChatResponse>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            ..Default::default()
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn query(&self, request: &QueryRequest, session_id: &str) -> ChatResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .push((request.clone(), session_id.to_string()));
        let next = self.outcomes.lock().pop_front();
        let delay = self.delays.lock().pop_front();
        match next {
            Some(outcome) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => std::future::pending().await,
        }
    }

    async fn clear_session(&self, session_id: &str) -> ChatResult<()> {
        self.cleared.lock().push(session_id.to_string());
        Ok(())
    }

    async fn session_context(&self, session_id: &str) -> ChatResult<serde_json::Value> {
        Ok(serde_json::json!({ "sessionId": session_id, "messages": [] }))
    }
}

pub fn ok(result: &str) -> ChatResult<ChatResponse> {
    Ok(ChatResponse {
        success: true,
        result: Some(result.to_string()),
        ..Default::default()
    })
}

/// Records start/stop calls; optionally fails the first start
#[derive(Default)]
pub struct FakeRecognizer {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_with: Option<fn() -> RecognizerError>,
}

impl SpeechRecognizer for FakeRecognizer {
    fn start(&mut self, options: &RecognitionOptions) -> Result<(), RecognizerError> {
        self.calls.lock().push(format!("start {}", options.language));
        match self.fail_with.take() {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        self.calls.lock().push("stop".to_string());
    }
}
