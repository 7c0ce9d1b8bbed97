use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseChatRoleError {
    role: String,
}

impl fmt::Display for ParseChatRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid chat role: '{}'", self.role)
    }
}

impl std::error::Error for ParseChatRoleError {}

impl FromStr for ChatRole {
    type Err = ParseChatRoleError;

    /// Exact, case-sensitive match: `"User"` is not a valid role.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ChatRole::System),
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            _ => Err(ParseChatRoleError { role: s.to_string() }),
        }
    }
}

/// One sanitized turn, exactly `role` + `content`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// A validated request, alive only for the duration of one `/api/chat` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    pub model: String,
}

/// Success body of `POST /api/chat`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub model: String,
    pub tokens: u64,
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

/// A turn as the widget keeps it: the relay only ever reads `role` and `content`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub id: String,
}

/// The widget's persisted record, overwritten as a whole on every save.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationHistory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}
