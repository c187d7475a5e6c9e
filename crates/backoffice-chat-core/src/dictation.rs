//! Voice dictation on top of a continuous speech-recognition capability
//!
//! The recognizer itself is host-provided ([`SpeechRecognizer`]); hosts
//! without one pass `None` and every start attempt reports that dictation is
//! unsupported. Recognizer callbacks come back in through
//! [`DictationAdapter::handle_event`].
//!
//! ```text
//!        start(lang)            stop() / Ended / fatal Error
//! Idle ──────────────▶ Recording ─────────────────────────▶ Idle
//!                        │  ▲
//!                        └──┘ Result: rebuild final, replace interim
//! ```

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::language::FALLBACK_LANGUAGE;
use crate::observable::{StateCell, Subscription};

pub const UNSUPPORTED_MESSAGE: &str = "Speech Recognition not supported. Use Chrome or Edge.";
pub const START_FAILED_MESSAGE: &str = "Failed to start recording";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictationState {
    pub is_recording: bool,
    /// Interim text is pending
    pub is_processing: bool,
    /// Confirmed text, trimmed
    pub transcript: String,
    /// Provisional text, replaced on every result event
    pub interim_transcript: String,
    pub language: String,
    pub error: Option<String>,
}

impl Default for DictationState {
    fn default() -> Self {
        Self {
            is_recording: false,
            is_processing: false,
            transcript: String::new(),
            interim_transcript: String::new(),
            language: FALLBACK_LANGUAGE.to_string(),
            error: None,
        }
    }
}

impl DictationState {
    /// Final and interim text joined for live display
    pub fn display_transcript(&self) -> String {
        if self.interim_transcript.is_empty() {
            self.transcript.clone()
        } else {
            format!("{} {}", self.transcript, self.interim_transcript)
                .trim()
                .to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl RecognitionOptions {
    /// Continuous listening with interim results, best alternative only
    pub fn continuous(language: &str) -> Self {
        Self {
            language: language.to_string(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}

/// One entry of the recognizer's result list (best alternative)
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn final_text(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    NoSpeech,
    Aborted,
    AudioCapture,
    NotAllowed,
    Network,
    Other(String),
}

impl RecognitionErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => RecognitionErrorKind::NoSpeech,
            "aborted" => RecognitionErrorKind::Aborted,
            "audio-capture" => RecognitionErrorKind::AudioCapture,
            "not-allowed" => RecognitionErrorKind::NotAllowed,
            "network" => RecognitionErrorKind::Network,
            other => RecognitionErrorKind::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            RecognitionErrorKind::NoSpeech => "no-speech",
            RecognitionErrorKind::Aborted => "aborted",
            RecognitionErrorKind::AudioCapture => "audio-capture",
            RecognitionErrorKind::NotAllowed => "not-allowed",
            RecognitionErrorKind::Network => "network",
            RecognitionErrorKind::Other(code) => code,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RecognitionErrorKind::Network => "Network error. Check your internet connection.".to_string(),
            RecognitionErrorKind::NoSpeech => "No speech detected. Please try again.".to_string(),
            RecognitionErrorKind::AudioCapture => "No microphone found.".to_string(),
            RecognitionErrorKind::NotAllowed => "Microphone access denied. Please allow access.".to_string(),
            RecognitionErrorKind::Aborted => "Recording stopped.".to_string(),
            RecognitionErrorKind::Other(code) => format!("Error: {}", code),
        }
    }
}

/// Callbacks from the recognizer
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Started,
    /// The full result list so far, not a delta
    Result(Vec<RecognitionResult>),
    Error(RecognitionErrorKind),
    Ended,
}

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognition has already started")]
    AlreadyStarted,
    #[error("{0}")]
    Failed(String),
}

/// Host-provided speech-to-text capability
pub trait SpeechRecognizer: Send {
    fn start(&mut self, options: &RecognitionOptions) -> Result<(), RecognizerError>;
    fn stop(&mut self);
}

pub struct DictationAdapter {
    recognizer: Mutex<Option<Box<dyn SpeechRecognizer>>>,
    state: StateCell<DictationState>,
}

impl DictationAdapter {
    pub fn new(recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        if recognizer.is_none() {
            warn!("speech recognition not available");
        }
        Self {
            recognizer: Mutex::new(recognizer),
            state: StateCell::new(DictationState::default()),
        }
    }

    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.lock().is_some()
    }

    pub fn state(&self) -> DictationState {
        self.state.get()
    }

    pub fn subscribe(&self) -> Subscription<DictationState> {
        self.state.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.state.with(|state| state.is_recording)
    }

    pub fn transcript(&self) -> String {
        self.state.with(|state| state.transcript.clone())
    }

    pub fn display_transcript(&self) -> String {
        self.state.with(DictationState::display_transcript)
    }

    /// Begin a new recording in `language`, discarding any earlier transcript
    pub fn start(&self, language: &str) {
        let mut slot = self.recognizer.lock();
        let Some(recognizer) = slot.as_mut() else {
            self.state
                .update(|state| state.error = Some(UNSUPPORTED_MESSAGE.to_string()));
            return;
        };

        if self.is_recording() {
            debug!("already recording");
            return;
        }

        self.state.update(|state| {
            state.transcript.clear();
            state.interim_transcript.clear();
            state.error = None;
            state.language = language.to_string();
        });

        let options = RecognitionOptions::continuous(language);
        let started = match recognizer.start(&options) {
            Err(RecognizerError::AlreadyStarted) => {
                // A previous session is still winding down
                recognizer.stop();
                recognizer.start(&options)
            }
            other => other,
        };

        match started {
            Ok(()) => {
                debug!(language, "started recording");
                self.state.update(|state| {
                    state.is_recording = true;
                    state.is_processing = false;
                });
            }
            Err(e) => {
                error!(error = %e, "failed to start speech recognition");
                self.state.update(|state| {
                    state.error = Some(START_FAILED_MESSAGE.to_string());
                    state.is_recording = false;
                });
            }
        }
    }

    /// User-initiated stop; the final transcript is kept
    pub fn stop(&self) {
        if self.is_recording() {
            if let Some(recognizer) = self.recognizer.lock().as_mut() {
                recognizer.stop();
            }
        }
        self.set_idle();
    }

    pub fn handle_event(&self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Started => {
                self.state.update(|state| {
                    state.is_recording = true;
                    state.is_processing = false;
                    state.error = None;
                    state.transcript.clear();
                    state.interim_transcript.clear();
                });
            }
            RecognitionEvent::Result(results) => self.apply_results(&results),
            RecognitionEvent::Error(kind) => self.apply_error(kind),
            RecognitionEvent::Ended => {
                debug!("recognition ended");
                self.set_idle();
            }
        }
    }

    /// Zero both transcripts and the error; recording status is unchanged
    pub fn clear_transcript(&self) {
        self.state.update(|state| {
            state.transcript.clear();
            state.interim_transcript.clear();
            state.error = None;
        });
    }

    fn apply_results(&self, results: &[RecognitionResult]) {
        let mut final_text = String::new();
        let mut interim = String::new();
        for result in results {
            if result.is_final {
                final_text.push_str(&result.transcript);
            } else {
                interim.push_str(&result.transcript);
            }
        }

        self.state.update(|state| {
            state.transcript = final_text.trim().to_string();
            // Late results after a stop only settle the final text
            if state.is_recording {
                state.is_processing = !interim.is_empty();
                state.interim_transcript = interim;
            }
        });
    }

    fn apply_error(&self, kind: RecognitionErrorKind) {
        let has_transcript = self.state.with(|state| !state.transcript.is_empty());
        match kind {
            RecognitionErrorKind::NoSpeech if has_transcript => return,
            RecognitionErrorKind::Aborted => return,
            _ => {}
        }

        error!(code = kind.code(), "speech recognition error");
        self.state.update(|state| {
            state.error = Some(kind.message());
            state.is_recording = false;
            state.is_processing = false;
            state.interim_transcript.clear();
        });
    }

    fn set_idle(&self) {
        self.state.update(|state| {
            state.is_recording = false;
            state.is_processing = false;
            state.interim_transcript.clear();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRecognizer;
    use std::sync::Arc;

    fn adapter() -> (DictationAdapter, Arc<Mutex<Vec<String>>>) {
        let recognizer = FakeRecognizer::default();
        let calls = recognizer.calls.clone();
        (DictationAdapter::new(Some(Box::new(recognizer))), calls)
    }

    #[test]
    fn test_interim_then_final_then_stop() {
        let (dictation, _) = adapter();
        dictation.start("en-US");
        assert!(dictation.is_recording());

        dictation.handle_event(RecognitionEvent::Result(vec![RecognitionResult::interim("hel")]));
        let state = dictation.state();
        assert_eq!(state.interim_transcript, "hel");
        assert!(state.is_processing);
        assert_eq!(state.transcript, "");

        dictation.handle_event(RecognitionEvent::Result(vec![RecognitionResult::final_text(
            "hello",
        )]));
        dictation.stop();

        let state = dictation.state();
        assert_eq!(state.transcript, "hello");
        assert_eq!(state.interim_transcript, "");
        assert!(!state.is_recording);
        assert!(!state.is_processing);
    }

    #[test]
    fn test_results_replace_rather_than_append() {
        let (dictation, _) = adapter();
        dictation.start("en-US");

        let first = vec![RecognitionResult::final_text("show ")];
        let second = vec![
            RecognitionResult::final_text("show "),
            RecognitionResult::final_text("orders"),
            RecognitionResult::interim(" from"),
        ];
        dictation.handle_event(RecognitionEvent::Result(first));
        dictation.handle_event(RecognitionEvent::Result(second));

        let state = dictation.state();
        assert_eq!(state.transcript, "show orders");
        assert_eq!(state.interim_transcript, " from");
        assert_eq!(state.display_transcript(), "show orders  from");
    }

    #[test]
    fn test_start_resets_transcripts_and_records_language() {
        let (dictation, calls) = adapter();
        dictation.start("en-US");
        dictation.handle_event(RecognitionEvent::Result(vec![RecognitionResult::final_text(
            "old",
        )]));
        dictation.stop();

        dictation.start("nb-NO");
        let state = dictation.state();
        assert_eq!(state.transcript, "");
        assert_eq!(state.language, "nb-NO");
        assert_eq!(
            calls.lock().as_slice(),
            &["start en-US", "stop", "start nb-NO"]
        );
    }

    #[test]
    fn test_ended_discards_interim_keeps_final() {
        let (dictation, _) = adapter();
        dictation.start("sv-SE");
        dictation.handle_event(RecognitionEvent::Result(vec![
            RecognitionResult::final_text("hej"),
            RecognitionResult::interim(" då"),
        ]));
        dictation.handle_event(RecognitionEvent::Ended);

        let state = dictation.state();
        assert!(!state.is_recording);
        assert_eq!(state.transcript, "hej");
        assert_eq!(state.interim_transcript, "");
    }

    #[test]
    fn test_start_while_recording_is_ignored() {
        let (dictation, calls) = adapter();
        dictation.start("en-US");
        dictation.start("da-DK");
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(dictation.state().language, "en-US");
    }

    #[test]
    fn test_no_speech_suppressed_when_transcript_exists() {
        let (dictation, _) = adapter();
        dictation.start("en-US");
        dictation.handle_event(RecognitionEvent::Result(vec![RecognitionResult::final_text(
            "hello",
        )]));
        dictation.handle_event(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));

        let state = dictation.state();
        assert!(state.is_recording);
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_no_speech_reported_without_transcript() {
        let (dictation, _) = adapter();
        dictation.start("en-US");
        dictation.handle_event(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));

        let state = dictation.state();
        assert!(!state.is_recording);
        assert_eq!(state.error.as_deref(), Some("No speech detected. Please try again."));
    }

    #[test]
    fn test_aborted_always_suppressed() {
        let (dictation, _) = adapter();
        dictation.start("en-US");
        dictation.handle_event(RecognitionEvent::Error(RecognitionErrorKind::from_code(
            "aborted",
        )));
        assert_eq!(dictation.state().error, None);
        assert!(dictation.is_recording());
    }

    #[test]
    fn test_other_errors_force_idle() {
        let (dictation, _) = adapter();
        dictation.start("en-US");
        dictation.handle_event(RecognitionEvent::Result(vec![RecognitionResult::interim("x")]));
        dictation.handle_event(RecognitionEvent::Error(RecognitionErrorKind::from_code(
            "service-not-allowed",
        )));

        let state = dictation.state();
        assert!(!state.is_recording);
        assert_eq!(state.interim_transcript, "");
        assert_eq!(state.error.as_deref(), Some("Error: service-not-allowed"));
    }

    #[test]
    fn test_unsupported_reports_error() {
        let dictation = DictationAdapter::unsupported();
        assert!(!dictation.is_supported());

        dictation.start("en-US");
        let state = dictation.state();
        assert!(!state.is_recording);
        assert_eq!(state.error.as_deref(), Some(UNSUPPORTED_MESSAGE));
    }

    #[test]
    fn test_already_started_is_retried_once() {
        let recognizer = FakeRecognizer {
            fail_with: Some(|| RecognizerError::AlreadyStarted),
            ..Default::default()
        };
        let calls = recognizer.calls.clone();
        let dictation = DictationAdapter::new(Some(Box::new(recognizer)));

        dictation.start("fi-FI");
        assert!(dictation.is_recording());
        assert_eq!(calls.lock().as_slice(), &["start fi-FI", "stop", "start fi-FI"]);
    }

    #[test]
    fn test_start_failure_sets_error() {
        let recognizer = FakeRecognizer {
            fail_with: Some(|| RecognizerError::Failed("device busy".to_string())),
            ..Default::default()
        };
        let dictation = DictationAdapter::new(Some(Box::new(recognizer)));

        dictation.start("en-US");
        let state = dictation.state();
        assert!(!state.is_recording);
        assert_eq!(state.error.as_deref(), Some(START_FAILED_MESSAGE));
    }

    #[test]
    fn test_clear_transcript_keeps_recording() {
        let (dictation, _) = adapter();
        dictation.start("en-US");
        dictation.handle_event(RecognitionEvent::Result(vec![
            RecognitionResult::final_text("a"),
            RecognitionResult::interim("b"),
        ]));
        dictation.clear_transcript();

        let state = dictation.state();
        assert!(state.is_recording);
        assert_eq!(state.transcript, "");
        assert_eq!(state.interim_transcript, "");
    }

    #[test]
    fn test_late_result_after_stop_keeps_interim_empty() {
        let (dictation, _) = adapter();
        dictation.start("en-US");
        dictation.stop();
        dictation.handle_event(RecognitionEvent::Result(vec![
            RecognitionResult::final_text("late"),
            RecognitionResult::interim("tail"),
        ]));

        let state = dictation.state();
        assert_eq!(state.transcript, "late");
        assert_eq!(state.interim_transcript, "");
        assert!(!state.is_processing);
    }
}
