//! Chat data shared between the API client, the view and the orchestrator.
//!
//! These types mirror what the chat service returns. They carry no UI
//! framework types so they can be built directly from JSON in tests.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Title shown for a chat that has not been named yet.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Number of characters of the first user message used as a provisional title.
pub const PROVISIONAL_TITLE_CHARS: usize = 50;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Avatar label drawn in front of a message.
    pub fn avatar(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AI",
        }
    }
}

/// A single turn in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            id: None,
            chat_id: None,
            timestamp: None,
        }
    }
}

/// A conversation record. List responses leave `messages` empty and fill
/// `message_count` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message_count: Option<u32>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Chat {
    /// Title to show for this chat, falling back to the default title.
    pub fn display_title(&self) -> &str {
        display_title(self.title.as_deref().unwrap_or_default())
    }

    /// Last update time formatted for the sidebar.
    pub fn updated_label(&self) -> String {
        self.updated_at
            .as_deref()
            .map(format_timestamp)
            .unwrap_or_default()
    }
}

/// Reply to a sent message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub chat_id: i64,
    pub message: Message,
}

/// Health report of the chat service. Every field is optional because the
/// client only cares whether the endpoint answered at all.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub deepseek_api: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Non-empty title or the default one.
pub fn display_title(title: &str) -> &str {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_CHAT_TITLE
    } else {
        trimmed
    }
}

/// Title given to a chat created by its first message.
pub fn provisional_title(first_message: &str) -> String {
    first_message.chars().take(PROVISIONAL_TITLE_CHARS).collect()
}

/// Format a server timestamp as `YYYY-MM-DD HH:MM`. Unparseable values are
/// shown as they came.
pub fn format_timestamp(raw: &str) -> String {
    const OUTPUT: &str = "%Y-%m-%d %H:%M";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(OUTPUT).to_string();
    }
    for input in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, input) {
            return dt.format(OUTPUT).to_string();
        }
    }
    raw.to_string()
}
