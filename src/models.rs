//! Conversation entity model
//!
//! This module defines the [`Message`] and [`Thread`] types shared by every
//! storage backend and window algorithm, along with the structured content
//! and tool-call payloads needed for multimodal and tool-augmented
//! conversations.

use crate::error::MemexError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Schema-less metadata attached to threads and messages
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Generate a new unique identifier for a thread or message
///
/// # Examples
///
/// ```
/// use memex::models::new_id;
///
/// let id = new_id();
/// assert_eq!(id.len(), 36);
/// assert_ne!(id, new_id());
/// ```
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// End user
    User,
    /// Model output
    Assistant,
    /// Tool result
    Tool,
    /// Legacy function result
    Function,
    /// Developer instructions
    Developer,
}

impl Role {
    /// All roles, in declaration order
    pub const ALL: [Role; 6] = [
        Role::System,
        Role::User,
        Role::Assistant,
        Role::Tool,
        Role::Function,
        Role::Developer,
    ];

    /// Returns the wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::Function => "function",
            Self::Developer => "developer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MemexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                MemexError::validation(format!(
                    "Invalid role: {}. Must be one of: system, user, assistant, tool, function, developer",
                    s
                ))
            })
    }
}

/// Function call information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function/tool to call
    pub name: String,
    /// Arguments for the function (as JSON string)
    pub arguments: String,
}

/// Tool call structure
///
/// Represents a request from the model to execute a tool with specific arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Function call details
    pub function: FunctionCall,
}

/// One typed segment of structured message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text segment
    Text {
        /// The text
        text: String,
    },
    /// Reference to an image
    ImageUrl {
        /// Image location (URL or data URI)
        url: String,
        /// Optional fidelity hint ("low", "high", "auto")
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Reference to a tool call made elsewhere in the thread
    ToolCall {
        /// Identifier of the referenced tool call
        tool_call_id: String,
    },
}

/// Message content: plain text or a sequence of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text
    Text(String),
    /// Structured multimodal content
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Text view of the content
    ///
    /// Structured content contributes its text segments, joined by newlines;
    /// image and tool-call references have no text form.
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::models::{Content, ContentPart};
    ///
    /// let content = Content::Parts(vec![
    ///     ContentPart::Text { text: "look at".to_string() },
    ///     ContentPart::ImageUrl { url: "https://example.com/cat.png".to_string(), detail: None },
    ///     ContentPart::Text { text: "this".to_string() },
    /// ]);
    /// assert_eq!(content.to_text(), "look at\nthis");
    /// ```
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// One turn in a conversation thread
///
/// Messages are treated as immutable once appended to a thread; the builder
/// methods are meant for construction only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (unique within a thread)
    #[serde(default = "new_id")]
    pub id: String,
    /// Role of the message sender
    pub role: Role,
    /// Content of the message, absent for pure tool-call messages
    #[serde(default)]
    pub content: Option<Content>,
    /// Creation timestamp (UTC)
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Optional token count reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
    /// Optional participant or function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool call ID (for tool result messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Legacy function call payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Message {
    /// Creates a new message with a fresh id and timestamp
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::models::{Message, Role};
    ///
    /// let msg = Message::new(Role::User, "Hello");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.text().as_deref(), Some("Hello"));
    /// ```
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            id: new_id(),
            role,
            content: Some(content.into()),
            created_at: Utc::now(),
            metadata: Metadata::new(),
            token_count: None,
            name: None,
            tool_call_id: None,
            tool_calls: None,
            function_call: None,
        }
    }

    /// Creates a new user message
    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a new system message
    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a new developer message
    pub fn developer(content: impl Into<Content>) -> Self {
        Self::new(Role::Developer, content)
    }

    /// Creates a new tool result message
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::models::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "File contents...");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<Content>) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Creates a legacy function result message
    pub fn function_result(name: impl Into<String>, content: impl Into<Content>) -> Self {
        let mut message = Self::new(Role::Function, content);
        message.name = Some(name.into());
        message
    }

    /// Creates an assistant message carrying tool calls and no content
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::models::{FunctionCall, Message, ToolCall};
    ///
    /// let tool_call = ToolCall {
    ///     id: "call_123".to_string(),
    ///     function: FunctionCall {
    ///         name: "read_file".to_string(),
    ///         arguments: r#"{"path":"test.txt"}"#.to_string(),
    ///     },
    /// };
    /// let msg = Message::assistant_with_tools(vec![tool_call]);
    /// assert!(msg.content.is_none());
    /// assert!(msg.tool_calls.is_some());
    /// ```
    pub fn assistant_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        let mut message = Self::new(Role::Assistant, "");
        message.content = None;
        message.tool_calls = Some(tool_calls);
        message
    }

    /// Sets an explicit id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the metadata map
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the token count
    pub fn with_token_count(mut self, token_count: u32) -> Self {
        self.token_count = Some(token_count);
        self
    }

    /// Sets the participant or function name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Text view of the content, `None` when the message has no content
    pub fn text(&self) -> Option<String> {
        self.content.as_ref().map(Content::to_text)
    }
}

/// An ordered conversation with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Unique identifier
    pub id: String,
    /// Messages in conversation order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// When the thread was created
    pub created_at: DateTime<Utc>,
    /// When a message was last appended
    pub updated_at: DateTime<Utc>,
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

impl Thread {
    /// Creates an empty thread with a fresh id
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            messages: Vec::new(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an empty thread with the given id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new()
        }
    }

    /// Sets the metadata map
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Appends a message and bumps `updated_at`
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::models::{Message, Thread};
    ///
    /// let mut thread = Thread::new();
    /// let before = thread.updated_at;
    /// thread.add_message(Message::user("Hi"));
    /// assert_eq!(thread.message_count(), 1);
    /// assert!(thread.updated_at >= before);
    /// ```
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Messages in conversation order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages currently held
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Drops messages from the front until at most `max` remain
    pub fn retain_last(&mut self, max: usize) {
        let excess = self.messages.len().saturating_sub(max);
        if excess > 0 {
            self.messages.drain(..excess);
        }
    }

    /// Copy of this thread holding only the trailing `limit` messages
    pub fn with_trailing(&self, limit: Option<usize>) -> Thread {
        let messages = match limit {
            Some(max) => trailing_window(&self.messages, max).to_vec(),
            None => self.messages.clone(),
        };
        Thread {
            id: self.id.clone(),
            messages,
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The trailing `max` messages of a slice, in original order
///
/// # Examples
///
/// ```
/// use memex::models::{trailing_window, Message};
///
/// let messages: Vec<Message> = ["a", "b", "c"].iter().map(|t| Message::user(*t)).collect();
/// let window = trailing_window(&messages, 2);
/// assert_eq!(window.len(), 2);
/// assert_eq!(window[0].text().as_deref(), Some("b"));
/// assert_eq!(trailing_window(&messages, 10).len(), 3);
/// ```
pub fn trailing_window(messages: &[Message], max: usize) -> &[Message] {
    let start = messages.len().saturating_sub(max);
    &messages[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn texts(messages: &[Message]) -> Vec<String> {
        messages.iter().filter_map(Message::text).collect()
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_rejects_unknown_name() {
        let err = "robot".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("Invalid role: robot"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let value = serde_json::to_value(Role::Developer).unwrap();
        assert_eq!(value, json!("developer"));
    }

    #[test]
    fn test_message_generates_unique_ids() {
        let a = Message::user("a");
        let b = Message::user("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_message_builders() {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!("test"));
        let msg = Message::assistant("done")
            .with_id("m-1")
            .with_metadata(metadata.clone())
            .with_token_count(42)
            .with_name("bot");

        assert_eq!(msg.id, "m-1");
        assert_eq!(msg.metadata, metadata);
        assert_eq!(msg.token_count, Some(42));
        assert_eq!(msg.name.as_deref(), Some("bot"));
    }

    #[test]
    fn test_function_result_sets_name() {
        let msg = Message::function_result("lookup", "42");
        assert_eq!(msg.role, Role::Function);
        assert_eq!(msg.name.as_deref(), Some("lookup"));
    }

    #[test]
    fn test_message_deserializes_with_defaults() {
        let msg: Message = serde_json::from_value(json!({
            "role": "user",
            "content": "hi"
        }))
        .unwrap();
        assert!(!msg.id.is_empty());
        assert_eq!(msg.content, Some(Content::Text("hi".to_string())));
        assert!(msg.metadata.is_empty());
    }

    #[test]
    fn test_structured_content_deserializes() {
        let msg: Message = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "what is this?"},
                {"type": "image_url", "url": "https://example.com/a.png", "detail": "high"},
                {"type": "tool_call", "tool_call_id": "call_1"}
            ]
        }))
        .unwrap();

        match msg.content {
            Some(Content::Parts(ref parts)) => assert_eq!(parts.len(), 3),
            ref other => panic!("expected parts, got {:?}", other),
        }
        assert_eq!(msg.text().as_deref(), Some("what is this?"));
    }

    #[test]
    fn test_null_content_has_no_text() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": null
        }))
        .unwrap();
        assert!(msg.content.is_none());
        assert!(msg.text().is_none());
    }

    #[test]
    fn test_thread_add_message_preserves_order() {
        let mut thread = Thread::new();
        for i in 0..5 {
            thread.add_message(Message::user(format!("msg{}", i)));
        }
        assert_eq!(
            texts(thread.messages()),
            vec!["msg0", "msg1", "msg2", "msg3", "msg4"]
        );
    }

    #[test]
    fn test_thread_retain_last() {
        let mut thread = Thread::with_id("t");
        for i in 0..5 {
            thread.add_message(Message::user(format!("msg{}", i)));
        }
        thread.retain_last(2);
        assert_eq!(texts(thread.messages()), vec!["msg3", "msg4"]);

        thread.retain_last(10);
        assert_eq!(thread.message_count(), 2);
    }

    #[test]
    fn test_with_trailing_copies_without_mutating() {
        let mut thread = Thread::with_id("t");
        for i in 0..4 {
            thread.add_message(Message::user(format!("msg{}", i)));
        }
        let copy = thread.with_trailing(Some(1));
        assert_eq!(texts(copy.messages()), vec!["msg3"]);
        assert_eq!(thread.message_count(), 4);

        let full = thread.with_trailing(None);
        assert_eq!(full, thread);
    }

    #[test]
    fn test_trailing_window_of_empty_slice() {
        assert!(trailing_window(&[], 3).is_empty());
    }
}
