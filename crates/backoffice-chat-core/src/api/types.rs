use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::MessageMetadata;

/// Number of prior messages the backend should fold into its context
pub const MAX_HISTORY_MESSAGES: u32 = 10;

/// Body of `POST /api/chat/query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub max_history_messages: u32,
}

impl QueryRequest {
    /// The session correlator is only sent when context is wanted
    pub fn new(prompt: &str, session_id: &str, use_context: bool) -> Self {
        Self {
            prompt: prompt.to_string(),
            session_id: use_context.then(|| session_id.to_string()),
            max_history_messages: MAX_HISTORY_MESSAGES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time: Option<f64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub has_context: Option<bool>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
    #[serde(default)]
    pub tables_used: Option<Vec<String>>,
}

impl ChatResponse {
    /// The response's own metadata, or one assembled from the top-level fields
    pub fn message_metadata(&self) -> MessageMetadata {
        self.metadata.clone().unwrap_or_else(|| MessageMetadata {
            execution_time: self.execution_time,
            tables_used: self.tables_used.clone(),
            has_context: self.has_context,
            ..Default::default()
        })
    }

    /// Metadata was sent but the answer touched no tables
    pub fn is_unverified(&self) -> bool {
        self.metadata.is_some()
            && self
                .tables_used
                .as_ref()
                .map(|tables| tables.is_empty())
                .unwrap_or(false)
    }
}

/// Body shape of backend error responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub message_count: u64,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionList {
    pub success: bool,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableUsage {
    pub table: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalytics {
    pub total_sessions: u64,
    pub average_message_count: f64,
    pub average_session_duration: f64,
    #[serde(default)]
    pub most_queried_tables: Vec<TableUsage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionAnalyticsResponse {
    pub success: bool,
    pub analytics: SessionAnalytics,
}
