pub mod api;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod dictation;
pub mod error;
pub mod language;
pub mod observable;
pub mod panel;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use api::{ChatApiClient, ChatBackend, ChatResponse, QueryRequest, SessionApiClient};
pub use config::Config;
pub use controller::{PanelController, ResizeDirection, QUICK_ACTIONS};
pub use conversation::{ConversationStore, PendingRequest};
pub use dictation::{DictationAdapter, DictationState, RecognitionEvent, SpeechRecognizer};
pub use error::{ChatError, ChatResult};
pub use observable::{StateCell, Subscription};
pub use panel::{PanelState, PanelStore, Position, SizeMode, Viewport};
pub use session::{FileKeyValueStore, KeyValueStore, SessionStore};
pub use state::{Message, MessageMetadata, Role};
