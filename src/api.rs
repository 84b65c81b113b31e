use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::{Chat, ChatReply, HealthStatus};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_LIST_LIMIT: u32 = 50;

const SEND_FAILED: &str = "Failed to send message";
const HISTORY_FAILED: &str = "Failed to load chat history";
const LIST_FAILED: &str = "Failed to load chats";
const DELETE_FAILED: &str = "Failed to delete chat";

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a str,
    chat_id: Option<i64>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    chat: Chat,
}

#[derive(Deserialize)]
struct ChatListResponse {
    #[serde(default)]
    chats: Vec<Chat>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// The chat service operations the application depends on.
#[async_trait(?Send)]
pub trait ChatBackend {
    async fn send_message(
        &self,
        message: &str,
        chat_id: Option<i64>,
        temperature: f32,
    ) -> ApiResult<ChatReply>;

    /// `None` when the service does not know the chat.
    async fn get_chat_history(&self, chat_id: i64) -> ApiResult<Option<Chat>>;

    async fn list_chats(&self, limit: u32, offset: u32) -> ApiResult<Vec<Chat>>;

    /// `false` when the chat did not exist.
    async fn delete_chat(&self, chat_id: i64) -> ApiResult<bool>;

    async fn health_check(&self) -> ApiResult<HealthStatus>;
}

/// HTTP client for the chat service.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    system_prompt: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            system_prompt: None,
        }
    }

    /// Bound every request by `timeout`. Without it a slow request just keeps
    /// the UI in its loading state.
    pub fn with_timeout(mut self, timeout: Duration) -> ApiResult<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait(?Send)]
impl ChatBackend for ChatClient {
    async fn send_message(
        &self,
        message: &str,
        chat_id: Option<i64>,
        temperature: f32,
    ) -> ApiResult<ChatReply> {
        let request = SendRequest {
            message,
            chat_id,
            temperature,
            system_prompt: self.system_prompt.as_deref(),
        };

        debug!(?chat_id, temperature, "sending message");
        let response = self
            .client
            .post(self.url("/chat"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(server_error(response, SEND_FAILED).await);
        }

        Ok(response.json().await?)
    }

    async fn get_chat_history(&self, chat_id: i64) -> ApiResult<Option<Chat>> {
        let response = self
            .client
            .get(self.url(&format!("/history/{}", chat_id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(chat_id, "chat history not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(server_error(response, HISTORY_FAILED).await);
        }

        let history: HistoryResponse = response.json().await?;
        Ok(Some(history.chat))
    }

    async fn list_chats(&self, limit: u32, offset: u32) -> ApiResult<Vec<Chat>> {
        let response = self
            .client
            .get(self.url("/chats"))
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(server_error(response, LIST_FAILED).await);
        }

        let list: ChatListResponse = response.json().await?;
        Ok(list.chats)
    }

    async fn delete_chat(&self, chat_id: i64) -> ApiResult<bool> {
        let response = self
            .client
            .delete(self.url(&format!("/chat/{}", chat_id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(server_error(response, DELETE_FAILED).await);
        }

        Ok(true)
    }

    async fn health_check(&self) -> ApiResult<HealthStatus> {
        let response = self.client.get(self.url("/health")).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "health check failed");
            return Err(ApiError::Unavailable);
        }

        Ok(response.json().await?)
    }
}

/// Build the error for a non-success response, preferring the server's
/// `detail` text over `fallback`.
async fn server_error(response: Response, fallback: &str) -> ApiError {
    let status = response.status().as_u16();
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .map(detail_text)
        .filter(|detail| !detail.is_empty())
        .unwrap_or_else(|| fallback.to_string());

    ApiError::Server { status, detail }
}

/// FastAPI puts a plain string in `detail` for raised errors and a list of
/// `{loc, msg, type}` objects for validation failures.
fn detail_text(detail: Value) -> String {
    match detail {
        Value::Null => String::new(),
        Value::String(text) => text,
        Value::Array(items) => items
            .iter()
            .map(|item| match item.get("msg").and_then(Value::as_str) {
                Some(msg) => msg.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}
