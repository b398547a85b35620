//! Wire types for the template and chat endpoints.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/template`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateRequest {
    pub prompt: String,
}

impl TemplateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Template classification result.
///
/// `prompts` is the context forwarded to the chat endpoint; `ui_prompts[0]`
/// holds the scaffold shown to the user before generation finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateResponse {
    #[serde(default)]
    pub prompts: Vec<String>,
    #[serde(rename = "uiPrompts", default)]
    pub ui_prompts: Vec<String>,
}

impl TemplateResponse {
    pub fn new(prompts: Vec<String>, ui_prompts: Vec<String>) -> Self {
        Self { prompts, ui_prompts }
    }

    /// Text fed to the step parser for the initial batch.
    pub fn scaffold(&self) -> &str {
        self.ui_prompts.first().map(String::as_str).unwrap_or("")
    }
}

/// Message role in a chat request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Assistant,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Build a request where every context prompt and the user prompt are
    /// sent as user messages, in order.
    pub fn from_context<I, S>(context: I, prompt: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut messages: Vec<ChatMessage> = context.into_iter().map(ChatMessage::user).collect();
        messages.push(ChatMessage::user(prompt));
        Self { messages }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatText {
    #[serde(default)]
    pub text: String,
}

/// Chat generation result; `response.text` holds the build response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: ChatText,
}

impl ChatResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            response: ChatText { text: text.into() },
        }
    }

    pub fn text(&self) -> &str {
        &self.response.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_response_wire_names() {
        let resp: TemplateResponse =
            serde_json::from_str(r#"{"prompts":["base","files"],"uiPrompts":["<boltArtifact>"]}"#)
                .unwrap();
        assert_eq!(resp.prompts.len(), 2);
        assert_eq!(resp.scaffold(), "<boltArtifact>");
        assert_eq!(TemplateResponse::default().scaffold(), "");
    }

    #[test]
    fn test_chat_request_from_context() {
        let req = ChatRequest::from_context(vec!["base prompt", "files prompt"], "build a todo app");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][2]["content"], "build a todo app");
    }

    #[test]
    fn test_chat_response_text() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"response":{"type":"text","text":"hello"}}"#).unwrap();
        assert_eq!(resp.text(), "hello");
    }
}
