//! Panel controller: composes the panel, conversation and dictation stores
//! and owns the transient state of the floating panel (input text, pointer
//! gestures, scroll tracking).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ChatResponse;
use crate::conversation::ConversationStore;
use crate::dictation::{DictationAdapter, DictationState};
use crate::error::{ChatError, ChatResult};
use crate::language::FALLBACK_LANGUAGE;
use crate::observable::Subscription;
use crate::panel::{PanelStore, Position, SizeMode};
use crate::state::Message;

pub const MAX_INPUT_CHARS: usize = 2000;

/// Distance from the bottom, in pixels, that still counts as "at the bottom"
pub const SCROLL_BOTTOM_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAction {
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const QUICK_ACTIONS: &[QuickAction] = &[
    QuickAction {
        label: "Show Tables",
        prompt: "Show me all tables in the database",
    },
    QuickAction {
        label: "Customer Info",
        prompt: "Show customer information",
    },
    QuickAction {
        label: "Recent Orders",
        prompt: "Show recent orders from the last 7 days",
    },
    QuickAction {
        label: "Inventory",
        prompt: "Check inventory status for products",
    },
    QuickAction {
        label: "SQL Help",
        prompt: "Help with SQL queries",
    },
];

pub type SendHandle = JoinHandle<ChatResult<ChatResponse>>;

/// Edges grabbed by a resize gesture. Corners set two flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeDirection {
    pub north: bool,
    pub south: bool,
    pub east: bool,
    pub west: bool,
}

impl ResizeDirection {
    /// Parse handle names such as `e`, `sw` or `ne`
    pub fn parse(handle: &str) -> Self {
        Self {
            north: handle.contains('n'),
            south: handle.contains('s'),
            east: handle.contains('e'),
            west: handle.contains('w'),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.north || self.south || self.east || self.west)
    }
}

#[derive(Debug, Clone, Copy)]
struct ResizeSession {
    direction: ResizeDirection,
    pointer: Position,
    width: i32,
    height: i32,
}

#[derive(Debug, Clone, Copy)]
struct DragSession {
    pointer: Position,
    origin: Position,
    current: Position,
}

/// Decides when the message list should jump to the bottom
#[derive(Debug, Clone, Default)]
pub struct ScrollTracker {
    should_auto_scroll: bool,
    is_user_scrolling: bool,
    previous_count: usize,
}

impl ScrollTracker {
    /// Returns true when the count grew while the user was following along
    pub fn on_message_count(&mut self, count: usize) -> bool {
        if count < self.previous_count {
            // cleared history
            self.previous_count = count;
            return false;
        }
        if count == self.previous_count {
            return false;
        }
        self.previous_count = count;
        if self.is_user_scrolling {
            return false;
        }
        self.should_auto_scroll = true;
        true
    }

    pub fn on_scroll(&mut self, scroll_top: f64, scroll_height: f64, client_height: f64) {
        let at_bottom = scroll_height - scroll_top - client_height < SCROLL_BOTTOM_THRESHOLD;
        if at_bottom {
            self.is_user_scrolling = false;
        } else {
            self.is_user_scrolling = true;
            self.should_auto_scroll = false;
        }
    }

    pub fn force(&mut self) {
        self.is_user_scrolling = false;
        self.should_auto_scroll = true;
    }

    pub fn is_user_scrolling(&self) -> bool {
        self.is_user_scrolling
    }

    /// Consume the pending scroll request, if any
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.should_auto_scroll)
    }
}

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Editable single-buffer text input with a character cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    text: String,
    cursor: usize,
}

impl InputField {
    pub fn value(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Replace the contents and move the cursor to the end
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.char_count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) {
        let idx = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(idx, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(idx);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let idx = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(idx);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }
}

pub struct PanelController {
    panel: Arc<PanelStore>,
    conversation: Arc<ConversationStore>,
    dictation: Arc<DictationAdapter>,
    messages_rx: Subscription<Vec<Message>>,
    dictation_rx: Subscription<DictationState>,
    input: InputField,
    use_context: bool,
    show_quick_actions: bool,
    language: String,
    scroll: ScrollTracker,
    resize: Option<ResizeSession>,
    drag: Option<DragSession>,
}

impl PanelController {
    pub fn new(
        panel: Arc<PanelStore>,
        conversation: Arc<ConversationStore>,
        dictation: Arc<DictationAdapter>,
    ) -> Self {
        let messages_rx = conversation.subscribe();
        let dictation_rx = dictation.subscribe();
        Self {
            panel,
            conversation,
            dictation,
            messages_rx,
            dictation_rx,
            input: InputField::default(),
            use_context: true,
            show_quick_actions: false,
            language: FALLBACK_LANGUAGE.to_string(),
            scroll: ScrollTracker::default(),
            resize: None,
            drag: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_use_context(mut self, use_context: bool) -> Self {
        self.use_context = use_context;
        self
    }

    pub fn panel(&self) -> &Arc<PanelStore> {
        &self.panel
    }

    pub fn conversation(&self) -> &Arc<ConversationStore> {
        &self.conversation
    }

    pub fn dictation(&self) -> &Arc<DictationAdapter> {
        &self.dictation
    }

    pub fn input(&self) -> &InputField {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputField {
        &mut self.input
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn use_context(&self) -> bool {
        self.use_context
    }

    pub fn show_quick_actions(&self) -> bool {
        self.show_quick_actions
    }

    pub fn is_loading(&self) -> bool {
        self.conversation.is_loading()
    }

    /// Drain store notifications. Call once per host loop iteration.
    pub fn sync(&mut self) {
        if self.messages_rx.has_changed().unwrap_or(false) {
            let count = self.messages_rx.borrow_and_update().len();
            self.on_messages_changed(count);
        }
        if self.dictation_rx.has_changed().unwrap_or(false) {
            let state = self.dictation_rx.borrow_and_update().clone();
            self.on_dictation_changed(&state);
        }
    }

    pub fn on_messages_changed(&mut self, count: usize) {
        if self.scroll.on_message_count(count) {
            self.dictation.clear_transcript();
        }
    }

    pub fn on_dictation_changed(&mut self, state: &DictationState) {
        if state.is_recording {
            self.input.set(state.display_transcript());
        } else if !state.transcript.is_empty() {
            self.input.set(state.transcript.clone());
        }
    }

    pub fn on_scroll(&mut self, scroll_top: f64, scroll_height: f64, client_height: f64) {
        self.scroll.on_scroll(scroll_top, scroll_height, client_height);
    }

    pub fn take_auto_scroll(&mut self) -> bool {
        self.scroll.take()
    }

    pub fn is_user_scrolling(&self) -> bool {
        self.scroll.is_user_scrolling()
    }

    // ---- sending ----

    pub fn can_send(&self) -> bool {
        !self.input.is_blank() && self.input.char_count() <= MAX_INPUT_CHARS
    }

    /// Enter submits, Shift+Enter inserts a line break
    pub fn handle_enter(&mut self, shift: bool) -> Option<SendHandle> {
        if shift {
            self.input.insert('\n');
            return None;
        }
        if self.is_loading() {
            return None;
        }
        self.send_message()
    }

    /// Submit the input. The reply is awaited on a spawned task whose handle
    /// is returned; the stores publish the outcome.
    pub fn send_message(&mut self) -> Option<SendHandle> {
        if !self.can_send() {
            return None;
        }
        let content = self.input.value().trim().to_string();

        match self.conversation.begin_send(&content, self.use_context) {
            Ok(pending) => {
                self.input.clear();
                self.scroll.force();
                Some(tokio::spawn(pending.complete()))
            }
            Err(ChatError::RateLimited) => {
                debug!("send ignored, too soon after the previous one");
                None
            }
            Err(e) => {
                warn!(error = %e, "send failed before dispatch");
                None
            }
        }
    }

    pub fn toggle_quick_actions(&mut self) {
        self.show_quick_actions = !self.show_quick_actions;
    }

    pub fn execute_quick_action(&mut self, index: usize) -> Option<SendHandle> {
        let action = QUICK_ACTIONS.get(index)?;
        self.input.set(action.prompt);
        self.show_quick_actions = false;
        self.send_message()
    }

    pub fn toggle_context(&mut self) {
        self.use_context = !self.use_context;
        debug!(use_context = self.use_context, "context toggled");
    }

    pub fn stop_request(&self) {
        self.conversation.cancel();
    }

    pub fn clear_chat(&self) {
        self.conversation.clear();
    }

    /// Drop the local history and continue under a fresh session id
    pub fn new_session(&self) -> String {
        self.conversation.start_new_session()
    }

    pub fn export(&self, dir: &Path) -> ChatResult<PathBuf> {
        self.conversation.export_to_file(dir)
    }

    pub fn input_hint(&self) -> &'static str {
        if self.is_loading() {
            "Processing your request... Click Stop to cancel"
        } else {
            "Press Enter to send, Shift+Enter for new line"
        }
    }

    pub fn send_button_tooltip(&self) -> &'static str {
        if self.is_loading() {
            "Please wait..."
        } else if !self.can_send() {
            "Type a message to send"
        } else {
            "Send message (Enter)"
        }
    }

    // ---- voice ----

    pub fn toggle_voice(&mut self) {
        if self.dictation.is_recording() {
            self.dictation.stop();
        } else {
            self.input.clear();
            self.dictation.start(&self.language);
        }
    }

    /// Switch dictation language, restarting an active recording
    pub fn change_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
        if self.dictation.is_recording() {
            self.dictation.stop();
            self.dictation.start(&self.language);
        }
    }

    // ---- panel buttons ----

    pub fn minimize(&self) {
        self.panel.set_size(SizeMode::Minimized);
    }

    pub fn expand(&self) {
        self.panel.set_size(SizeMode::Expanded);
    }

    pub fn maximize(&self) {
        self.panel.set_size(SizeMode::Fullscreen);
    }

    pub fn restore(&self) {
        self.panel.set_size(SizeMode::Normal);
    }

    pub fn close(&mut self) {
        if self.dictation.is_recording() {
            self.dictation.stop();
        }
        self.resize = None;
        self.drag = None;
        self.panel.close();
    }

    // ---- pointer gestures ----

    pub fn begin_resize(&mut self, direction: ResizeDirection, pointer: Position) {
        if direction.is_empty() {
            return;
        }
        let state = self.panel.state();
        self.drag = None;
        self.resize = Some(ResizeSession {
            direction,
            pointer,
            width: state.width,
            height: state.height,
        });
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_some()
    }

    pub fn resize_to(&mut self, pointer: Position) {
        let Some(session) = self.resize else {
            return;
        };
        let dx = f64::from(pointer.x - session.pointer.x);
        let dy = f64::from(pointer.y - session.pointer.y);

        let mut width = f64::from(session.width);
        let mut height = f64::from(session.height);
        if session.direction.east {
            width += dx;
        }
        if session.direction.west {
            width -= dx;
        }
        if session.direction.south {
            height += dy;
        }
        if session.direction.north {
            height -= dy;
        }

        self.panel.update_dimensions(width, height);
    }

    pub fn begin_drag(&mut self, pointer: Position) {
        let origin = self.panel.state().position;
        self.resize = None;
        self.drag = Some(DragSession {
            pointer,
            origin,
            current: origin,
        });
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Live position while dragging; persisted on release
    pub fn drag_to(&mut self, pointer: Position) -> Option<Position> {
        let session = self.drag.as_mut()?;
        session.current = Position::new(
            session.origin.x + pointer.x - session.pointer.x,
            session.origin.y + pointer.y - session.pointer.y,
        );
        Some(session.current)
    }

    pub fn drag_position(&self) -> Option<Position> {
        self.drag.map(|session| session.current)
    }

    pub fn end_pointer(&mut self) {
        self.resize = None;
        if let Some(session) = self.drag.take() {
            self.panel.update_position(session.current.x, session.current.y);
        }
    }
}
