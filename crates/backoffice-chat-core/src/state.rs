//! UI-agnostic conversation types
//!
//! These are shared by every host (terminal, tests, anything else that drives
//! the panel controller) and serialize with the backend's camelCase names.

use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A message in the assistant conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            role,
            content: content.into(),
            timestamp: Local::now(),
            metadata: None,
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant message flagged as an error
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

/// Details the backend reports about how an answer was produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_optimized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_context: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

/// `msg_{epoch_millis}_{9 random chars}`
pub fn generate_message_id() -> String {
    format!(
        "msg_{}_{}",
        Local::now().timestamp_millis(),
        random_base36(9)
    )
}

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random lowercase base36 string of `len` characters, uniform over all 36
pub(crate) fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())] as char)
        .collect()
}

/// Format a non-negative integer in base36 (digits then lowercase letters)
pub(crate) fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_random_base36_covers_digits_evenly() {
        let sample = random_base36(36_000);
        assert!(sample.bytes().all(|b| BASE36_DIGITS.contains(&b)));

        // 10 of 36 symbols are digits
        let digits = sample.bytes().filter(u8::is_ascii_digit).count();
        let share = digits as f64 / sample.len() as f64;
        assert!((0.24..0.32).contains(&share), "digit share {}", share);
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("a");
        let b = Message::user("a");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("msg_"));
    }

    #[test]
    fn test_error_message_is_assistant() {
        let msg = Message::error("boom");
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.is_error);
    }

    #[test]
    fn test_metadata_uses_camel_case() {
        let metadata = MessageMetadata {
            execution_time: Some(12.5),
            tables_used: Some(vec!["orders".to_string()]),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["executionTime"], 12.5);
        assert_eq!(json["tablesUsed"][0], "orders");
        assert!(json.get("cacheHit").is_none());
    }
}
