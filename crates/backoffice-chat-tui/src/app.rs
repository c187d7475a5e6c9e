use backoffice_chat_core::controller::{PanelController, SendHandle};
use backoffice_chat_core::language::SUPPORTED_LANGUAGES;
use backoffice_chat_core::{ChatError, Config, PanelState, Position, SizeMode, Viewport};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pixel size of one terminal cell, used to map the panel's pixel geometry
pub const CELL_WIDTH_PX: i32 = 8;
pub const CELL_HEIGHT_PX: i32 = 16;

/// Lines moved per wheel notch or PageUp/PageDown step
pub const SCROLL_STEP: usize = 3;

const STATUS_MAX_CHARS: usize = 120;

pub fn viewport_for(cols: u16, rows: u16) -> Viewport {
    Viewport::new(
        i32::from(cols) * CELL_WIDTH_PX,
        i32::from(rows) * CELL_HEIGHT_PX,
    )
}

pub fn cell_to_px(col: u16, row: u16) -> Position {
    Position::new(
        i32::from(col) * CELL_WIDTH_PX,
        i32::from(row) * CELL_HEIGHT_PX,
    )
}

/// Where the panel lands on screen. Geometry is converted from pixels to
/// cells and the origin is pulled back inside `area` so the panel stays
/// reachable after a drag past the edge.
pub fn panel_rect(state: &PanelState, position: Position, area: Rect) -> Rect {
    if state.size == SizeMode::Fullscreen {
        return area;
    }

    let width = (state.width / CELL_WIDTH_PX).clamp(0, i32::from(area.width)) as u16;
    let height = (state.height / CELL_HEIGHT_PX).clamp(0, i32::from(area.height)) as u16;

    let max_x = i32::from(area.width - width);
    let max_y = i32::from(area.height - height);
    let x = (position.x / CELL_WIDTH_PX).clamp(0, max_x) as u16;
    let y = (position.y / CELL_HEIGHT_PX).clamp(0, max_y) as u16;

    Rect::new(area.x + x, area.y + y, width, height)
}

pub struct App {
    pub should_quit: bool,
    pub controller: PanelController,
    pub config: Config,
    pub export_dir: PathBuf,

    // In-flight sends; drained on tick
    pub pending: Vec<SendHandle>,
    // Background server calls; each resolves to a status line
    pub status_jobs: Vec<JoinHandle<String>>,

    // Status line shown under the input
    pub status: Option<String>,
    voice_error: Option<String>,

    // Chat scroll, in wrapped rows
    pub chat_scroll: usize,
    pub chat_height: u16,
    pub chat_lines: usize,

    pub animation_frame: u8,

    pub show_language_picker: bool,
    pub language_state: ListState,
    pub confirm_clear: bool,

    // Areas for mouse hit-testing (updated during render)
    pub launcher_area: Option<Rect>,
    pub panel_area: Option<Rect>,
    pub chat_area: Option<Rect>,
    pub quick_actions_area: Option<Rect>,
}

impl App {
    pub fn new(controller: PanelController, config: Config, export_dir: PathBuf) -> Self {
        Self {
            should_quit: false,
            controller,
            config,
            export_dir,
            pending: Vec::new(),
            status_jobs: Vec::new(),
            status: None,
            voice_error: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_lines: 0,
            animation_frame: 0,
            show_language_picker: false,
            language_state: ListState::default(),
            confirm_clear: false,
            launcher_area: None,
            panel_area: None,
            chat_area: None,
            quick_actions_area: None,
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let viewport = viewport_for(cols, rows);
        debug!(width = viewport.width, height = viewport.height, "viewport changed");
        self.controller.panel().set_viewport(viewport);
    }

    pub async fn tick(&mut self) {
        if self.controller.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.poll_pending().await;
        self.poll_status_jobs().await;
    }

    /// Reap finished sends. The stores already carry the outcome; this only
    /// logs it.
    pub async fn poll_pending(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|handle| handle.is_finished());
        self.pending = running;

        for handle in finished {
            match handle.await {
                Ok(Ok(response)) => {
                    debug!(execution_time = ?response.execution_time, "reply received");
                }
                Ok(Err(ChatError::Cancelled)) => debug!("request stopped by user"),
                Ok(Err(e)) => warn!(error = %e, "chat request failed"),
                Err(e) => error!(error = %e, "chat request task failed"),
            }
        }
    }

    /// Show the outcome of finished background server calls
    pub async fn poll_status_jobs(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.status_jobs)
            .into_iter()
            .partition(|job| job.is_finished());
        self.status_jobs = running;

        for job in finished {
            match job.await {
                Ok(status) => self.status = Some(status),
                Err(e) => error!(error = %e, "background task failed"),
            }
        }
    }

    pub fn track(&mut self, handle: Option<SendHandle>) {
        if let Some(handle) = handle {
            self.status = None;
            self.pending.push(handle);
        }
    }

    /// Follow new messages when the controller asks for it
    pub fn apply_auto_scroll(&mut self) {
        if self.controller.take_auto_scroll() {
            self.chat_scroll = self.max_chat_scroll();
        }
    }

    pub fn max_chat_scroll(&self) -> usize {
        self.chat_lines.saturating_sub(usize::from(self.chat_height))
    }

    pub fn scroll_chat_up(&mut self, lines: usize) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.report_scroll();
    }

    pub fn scroll_chat_down(&mut self, lines: usize) {
        self.chat_scroll = self
            .chat_scroll
            .saturating_add(lines)
            .min(self.max_chat_scroll());
        self.report_scroll();
    }

    fn report_scroll(&mut self) {
        let px = |lines: usize| lines as f64 * f64::from(CELL_HEIGHT_PX);
        self.controller.on_scroll(
            px(self.chat_scroll),
            px(self.chat_lines),
            px(usize::from(self.chat_height)),
        );
    }

    pub fn open_language_picker(&mut self) {
        let current = self.controller.language();
        let idx = SUPPORTED_LANGUAGES
            .iter()
            .position(|(code, _)| *code == current)
            .unwrap_or(0);
        self.language_state.select(Some(idx));
        self.show_language_picker = true;
    }

    pub fn language_nav(&mut self, down: bool) {
        let len = SUPPORTED_LANGUAGES.len();
        let i = self.language_state.selected().unwrap_or(0);
        let next = if down {
            (i + 1).min(len - 1)
        } else {
            i.saturating_sub(1)
        };
        self.language_state.select(Some(next));
    }

    pub fn confirm_language(&mut self) {
        if let Some((code, name)) = self
            .language_state
            .selected()
            .and_then(|i| SUPPORTED_LANGUAGES.get(i))
        {
            info!(language = code, "dictation language selected");
            self.controller.change_language(*code);
            self.config.language = Some(code.to_string());
            self.status = Some(format!("Dictation language: {}", name));
            self.save_config();
        }
        self.show_language_picker = false;
    }

    pub fn toggle_context(&mut self) {
        self.controller.toggle_context();
        self.config.use_context = self.controller.use_context();
        self.save_config();
    }

    fn save_config(&mut self) {
        if let Err(e) = self.config.save() {
            warn!(error = %e, "could not save config");
            self.status = Some(format!("Settings not saved: {}", e));
        }
    }

    pub fn export_chat(&mut self) {
        self.status = Some(match self.controller.export(&self.export_dir) {
            Ok(path) => format!("Exported to {}", path.display()),
            Err(e) => {
                error!(error = %e, "export failed");
                format!("Export failed: {}", e)
            }
        });
    }

    pub fn clear_chat(&mut self) {
        self.controller.clear_chat();
        self.chat_scroll = 0;
        self.confirm_clear = false;
        self.status = Some("Chat cleared".to_string());
    }

    /// Continue under a fresh session id with an empty history
    pub fn start_new_session(&mut self) {
        let id = self.controller.new_session();
        self.chat_scroll = 0;
        self.status = Some(format!("New session {}", id));
    }

    /// Ask the backend to drop the remembered context for this session
    pub fn forget_server_context(&mut self) {
        let conversation = Arc::clone(self.controller.conversation());
        self.status = Some("Clearing server context...".to_string());
        self.status_jobs.push(tokio::spawn(async move {
            match conversation.clear_session().await {
                Ok(()) => "Server context cleared".to_string(),
                Err(e) => {
                    warn!(error = %e, "could not clear server-side context");
                    format!("Could not clear server context: {}", e.user_message())
                }
            }
        }));
    }

    /// Fetch what the backend remembers for this session into the status line
    pub fn show_server_context(&mut self) {
        let conversation = Arc::clone(self.controller.conversation());
        self.status = Some("Fetching server context...".to_string());
        self.status_jobs.push(tokio::spawn(async move {
            match conversation.session_context().await {
                Ok(context) => {
                    let summary: String =
                        context.to_string().chars().take(STATUS_MAX_CHARS).collect();
                    format!("Server context: {}", summary)
                }
                Err(e) => {
                    warn!(error = %e, "could not fetch server-side context");
                    format!("Context unavailable: {}", e.user_message())
                }
            }
        }));
    }

    /// Surface a new dictation error in the status line
    pub fn sync(&mut self) {
        self.controller.sync();
        let error = self.controller.dictation().state().error;
        if error != self.voice_error {
            if let Some(message) = &error {
                self.status = Some(message.clone());
            }
            self.voice_error = error;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use backoffice_chat_core::api::{ChatBackend, ChatResponse, QueryRequest};
    use backoffice_chat_core::{
        ChatResult, ConversationStore, DictationAdapter, PanelStore, SessionStore,
    };

    /// Context reads hang; clearing fails with a server error
    struct StalledBackend;

    #[async_trait]
    impl ChatBackend for StalledBackend {
        async fn query(&self, _: &QueryRequest, _: &str) -> ChatResult<ChatResponse> {
            std::future::pending().await
        }

        async fn clear_session(&self, _: &str) -> ChatResult<()> {
            Err(ChatError::Server {
                status: 503,
                message: Some("Session store offline".to_string()),
            })
        }

        async fn session_context(&self, _: &str) -> ChatResult<serde_json::Value> {
            std::future::pending().await
        }
    }

    fn app() -> App {
        let conversation = Arc::new(ConversationStore::new(
            Arc::new(StalledBackend),
            Arc::new(SessionStore::in_memory()),
        ));
        let controller = PanelController::new(
            Arc::new(PanelStore::new(viewport_for(160, 50))),
            conversation,
            Arc::new(DictationAdapter::unsupported()),
        );
        App::new(controller, Config::new(), std::env::temp_dir())
    }

    async fn drain_status_jobs(app: &mut App) {
        while !app.status_jobs.is_empty() {
            tokio::task::yield_now().await;
            app.poll_status_jobs().await;
        }
    }

    #[tokio::test]
    async fn test_failed_context_clear_is_reported() {
        let mut app = app();
        app.forget_server_context();
        drain_status_jobs(&mut app).await;

        assert_eq!(
            app.status.as_deref(),
            Some("Could not clear server context: Session store offline")
        );
    }

    #[tokio::test]
    async fn test_context_fetch_does_not_block() {
        let mut app = app();
        app.show_server_context();

        assert_eq!(app.status.as_deref(), Some("Fetching server context..."));
        app.tick().await;
        assert_eq!(app.status_jobs.len(), 1);
        assert_eq!(app.status.as_deref(), Some("Fetching server context..."));
    }

    #[test]
    fn test_scroll_range_beyond_u16_rows() {
        let mut app = app();
        app.chat_height = 40;
        app.chat_lines = 70_000;
        assert_eq!(app.max_chat_scroll(), 69_960);

        app.chat_scroll = app.max_chat_scroll();
        app.scroll_chat_down(SCROLL_STEP);
        assert_eq!(app.chat_scroll, 69_960);
    }

    #[test]
    fn test_new_session_rotates_id() {
        let mut app = app();
        let old = app.controller.conversation().session_id();
        app.start_new_session();
        assert_ne!(app.controller.conversation().session_id(), old);
    }

    fn state(size: SizeMode, width: i32, height: i32) -> PanelState {
        PanelState {
            is_open: true,
            size,
            width,
            height,
            position: Position::new(20, 20),
        }
    }

    #[test]
    fn test_viewport_for_terminal() {
        let viewport = viewport_for(160, 50);
        assert_eq!(viewport.width, 1280);
        assert_eq!(viewport.height, 800);
    }

    #[test]
    fn test_panel_rect_from_pixels() {
        let area = Rect::new(0, 0, 160, 50);
        let rect = panel_rect(&state(SizeMode::Normal, 400, 600), Position::new(20, 20), area);
        assert_eq!(rect, Rect::new(2, 1, 50, 37));
    }

    #[test]
    fn test_panel_rect_pulled_back_on_screen() {
        let area = Rect::new(0, 0, 160, 50);
        let rect = panel_rect(
            &state(SizeMode::Normal, 400, 600),
            Position::new(5000, -300),
            area,
        );
        assert_eq!(rect, Rect::new(110, 0, 50, 37));
    }

    #[test]
    fn test_fullscreen_fills_area() {
        let area = Rect::new(0, 0, 80, 24);
        let rect = panel_rect(&state(SizeMode::Fullscreen, 640, 384), Position::new(20, 20), area);
        assert_eq!(rect, area);
    }
}
