use anyhow::{Context, Result};
use backoffice_chat_core::language::{default_language, system_locale};
use backoffice_chat_core::session::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use backoffice_chat_core::{
    ChatApiClient, Config, ConversationStore, DictationAdapter, PanelController, PanelStore,
    SessionStore,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::{viewport_for, App};
use tui::EventHandler;

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("backoffice-chat")
}

/// Log to a file; the terminal belongs to the UI
fn init_logging() -> Result<()> {
    let dir = data_dir();
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("backoffice-chat.log"))
        .context("opening log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn session_storage() -> Arc<dyn KeyValueStore> {
    let Some(path) = FileKeyValueStore::default_path() else {
        warn!("no data directory, session id will not survive restarts");
        return Arc::new(MemoryKeyValueStore::default());
    };
    match FileKeyValueStore::open(&path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "session file unreadable, using memory");
            Arc::new(MemoryKeyValueStore::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::load().context("loading config")?;
    let language = config
        .language
        .clone()
        .unwrap_or_else(|| default_language(&system_locale().unwrap_or_default()).to_string());
    info!(api_url = %config.api_url, language = %language, "starting back-office chat");

    let backend = Arc::new(ChatApiClient::new(&config.api_url).context("building HTTP client")?);
    let session = Arc::new(SessionStore::load_or_create(session_storage()));
    let conversation = Arc::new(ConversationStore::new(backend, session));
    // Terminals have no speech recognition capability
    let dictation = Arc::new(DictationAdapter::unsupported());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let size = terminal.size()?;
    let panel = Arc::new(PanelStore::new(viewport_for(size.width, size.height)));
    let controller = PanelController::new(panel, conversation, dictation)
        .with_language(language)
        .with_use_context(config.use_context);

    let export_dir = dirs::download_dir().unwrap_or_else(|| data_dir().join("exports"));
    let mut app = App::new(controller, config, export_dir);
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;
    }
    info!("shutting down");
    Ok(())
}
