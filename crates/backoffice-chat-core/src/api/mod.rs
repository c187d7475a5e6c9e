pub mod chat;
pub mod sessions;
pub mod types;

pub use chat::{ChatApiClient, ChatBackend, REQUEST_TIMEOUT, SESSION_HEADER};
pub use sessions::SessionApiClient;
pub use types::{
    ChatResponse, QueryRequest, Session, SessionAnalytics, SessionAnalyticsResponse, SessionList,
    TableUsage, MAX_HISTORY_MESSAGES,
};
