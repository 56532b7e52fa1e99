use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Message;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Input accepted by `LlmProvider::complete`
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionInput {
    /// A bare prompt, sent as a single user message
    Text(String),
    Messages(Vec<Message>),
}

impl CompletionInput {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Text(text) => vec![Message::user(text)],
            Self::Messages(messages) => messages,
        }
    }
}

impl From<&str> for CompletionInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for CompletionInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Message>> for CompletionInput {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

impl From<Message> for CompletionInput {
    fn from(message: Message) -> Self {
        Self::Messages(vec![message])
    }
}

/// Per-call generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Forwarded as-is; the backend enforces its own range
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Overrides the provider's default request timeout
    #[serde(skip)]
    pub timeout: Option<Duration>,
    /// Backend-specific fields merged into the request body
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MessageRole;

    #[test]
    fn test_text_input_becomes_single_user_message() {
        let messages = CompletionInput::from("Hello").into_messages();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), MessageRole::User);
        assert_eq!(messages[0].content(), "Hello");
    }

    #[test]
    fn test_message_input_keeps_order() {
        let input = CompletionInput::from(vec![
            Message::system("Be brief"),
            Message::user("Hi"),
        ]);
        let messages = input.into_messages();

        assert_eq!(messages[0].role(), MessageRole::System);
        assert_eq!(messages[1].role(), MessageRole::User);
    }

    #[test]
    fn test_options_builder() {
        let options = CompletionOptions::new()
            .temperature(1.5)
            .max_tokens(100)
            .timeout_secs(10)
            .extra("top_p", serde_json::json!(0.9));

        assert_eq!(options.temperature, 1.5);
        assert_eq!(options.max_tokens, Some(100));
        assert_eq!(options.timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.extra["top_p"], 0.9);
    }

    #[test]
    fn test_default_temperature() {
        assert_eq!(CompletionOptions::default().temperature, DEFAULT_TEMPERATURE);
    }
}
