use serde::{Deserialize, Serialize};

use super::citation::Citation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One turn in an agent's conversation, in the shape the backend expects as history
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Vec<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_intermediate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_complete: Option<bool>,
}

impl ChatMessage {
    fn new(role: ChatRole) -> Self {
        ChatMessage {
            role,
            content: Vec::new(),
            intermediate_steps: None,
            citations: None,
            is_intermediate: None,
            is_complete: None,
        }
    }

    pub fn user() -> Self {
        Self::new(ChatRole::User)
    }

    pub fn assistant() -> Self {
        Self::new(ChatRole::Assistant)
    }

    /// The empty assistant message appended when a round starts
    pub fn pending_assistant() -> Self {
        ChatMessage {
            intermediate_steps: Some(String::new()),
            is_intermediate: Some(true),
            ..Self::assistant().with_text("")
        }
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content.push(MessageContent { text: text.into() });
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }

    /// Text of the first content block, empty when there is none
    pub fn text(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }

    /// Replace the whole body with a single text block
    pub fn set_text<S: Into<String>>(&mut self, text: S) {
        self.content = vec![MessageContent { text: text.into() }];
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete.unwrap_or(false)
    }
}
