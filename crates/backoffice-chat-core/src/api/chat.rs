use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info};

use super::types::{ChatResponse, ErrorBody, QueryRequest};
use crate::error::{ChatError, ChatResult};

/// Header carrying the session correlator on every query
pub const SESSION_HEADER: &str = "X-Session-ID";

/// Upper bound for one backend call, including the body download
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn http_client(timeout: Duration) -> ChatResult<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Remote query-answering backend as seen by the conversation store.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn query(&self, request: &QueryRequest, session_id: &str) -> ChatResult<ChatResponse>;

    async fn clear_session(&self, session_id: &str) -> ChatResult<()>;

    async fn session_context(&self, session_id: &str) -> ChatResult<serde_json::Value>;
}

#[derive(Clone)]
pub struct ChatApiClient {
    client: Client,
    base_url: String,
}

impl ChatApiClient {
    pub fn new(base_url: &str) -> ChatResult<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ChatResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatBackend for ChatApiClient {
    async fn query(&self, request: &QueryRequest, session_id: &str) -> ChatResult<ChatResponse> {
        let url = format!("{}/api/chat/query", self.base_url);
        info!(url = %url, with_context = request.session_id.is_some(), "sending chat query");

        let response = self
            .client
            .post(&url)
            .header(SESSION_HEADER, session_id)
            .json(request)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response)
    }

    async fn clear_session(&self, session_id: &str) -> ChatResult<()> {
        let url = format!("{}/api/chat/sessions/{}/clear", self.base_url, session_id);
        debug!(url = %url, "clearing chat session");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn session_context(&self, session_id: &str) -> ChatResult<serde_json::Value> {
        let url = format!("{}/api/chat/sessions/{}/context", self.base_url, session_id);

        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx response into [`ChatError::Server`], keeping the
/// backend's `error` text when the body carries one.
pub(crate) async fn ensure_success(response: Response) -> ChatResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.error);

    Err(ChatError::Server {
        status: status.as_u16(),
        message,
    })
}
