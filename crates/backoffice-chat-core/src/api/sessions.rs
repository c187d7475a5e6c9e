use reqwest::Client;

use super::chat::{ensure_success, http_client, REQUEST_TIMEOUT};
use super::types::{SessionAnalyticsResponse, SessionList};
use crate::error::ChatResult;

/// Administrative reads over stored chat sessions and their analytics.
///
/// Not used by the send path; hosts call it for session browsers and
/// dashboards.
#[derive(Clone)]
pub struct SessionApiClient {
    client: Client,
    base_url: String,
}

impl SessionApiClient {
    pub fn new(base_url: &str) -> ChatResult<Self> {
        Ok(Self {
            client: http_client(REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn list_sessions(&self) -> ChatResult<SessionList> {
        self.get_json(&format!("{}/api/chat/sessions", self.base_url))
            .await
    }

    pub async fn get_session(&self, session_id: &str) -> ChatResult<serde_json::Value> {
        self.get_json(&format!("{}/api/chat/sessions/{}", self.base_url, session_id))
            .await
    }

    pub async fn session_messages(&self, session_id: &str) -> ChatResult<serde_json::Value> {
        self.get_json(&format!(
            "{}/api/chat/sessions/{}/messages",
            self.base_url, session_id
        ))
        .await
    }

    pub async fn delete_session(&self, session_id: &str) -> ChatResult<serde_json::Value> {
        let url = format!("{}/api/chat/sessions/{}", self.base_url, session_id);
        let response = self.client.delete(&url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    pub async fn session_analytics(&self) -> ChatResult<SessionAnalyticsResponse> {
        self.get_json(&format!("{}/api/analytics/sessions", self.base_url))
            .await
    }

    pub async fn context_effectiveness(&self) -> ChatResult<serde_json::Value> {
        self.get_json(&format!(
            "{}/api/analytics/context-effectiveness",
            self.base_url
        ))
        .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ChatResult<T> {
        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}
