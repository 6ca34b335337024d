use crate::models::{Metadata, Thread};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Best-effort search criteria for [`Storage::search_threads`]
///
/// Every supplied condition must match (logical AND).
///
/// [`Storage::search_threads`]: crate::storage::Storage::search_threads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Exact-match conditions on thread metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Substring that any message content must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SearchQuery {
    /// Creates an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a metadata equality condition
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::storage::SearchQuery;
    ///
    /// let query = SearchQuery::new()
    ///     .with_metadata("user_id", "123")
    ///     .with_content("refund");
    /// assert_eq!(query.metadata.len(), 1);
    /// assert!(!query.is_empty());
    /// ```
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the content substring condition
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Content condition, ignoring zero-length patterns
    pub fn content_pattern(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }

    /// True when the query carries no condition at all
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.content_pattern().is_none()
    }

    /// Whether a thread satisfies every condition of this query
    ///
    /// Metadata values compare by JSON equality; the content condition is a
    /// case-sensitive substring match against the text of any message.
    pub fn matches(&self, thread: &Thread) -> bool {
        let metadata_matches = self
            .metadata
            .iter()
            .all(|(key, value)| thread.metadata.get(key) == Some(value));
        if !metadata_matches {
            return false;
        }

        match self.content_pattern() {
            Some(pattern) => thread
                .messages
                .iter()
                .filter_map(|m| m.text())
                .any(|text| text.contains(pattern)),
            None => true,
        }
    }
}

/// Summary of a stored thread for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    /// Unique identifier for the thread
    pub id: String,
    /// When the thread was created
    pub created_at: DateTime<Utc>,
    /// When the thread was last updated
    pub updated_at: DateTime<Utc>,
    /// Number of messages returned by the backend
    pub message_count: usize,
    /// Text of the first user message, if any
    pub preview: Option<String>,
    /// Thread metadata
    pub metadata: Metadata,
}

impl From<&Thread> for ThreadSummary {
    fn from(thread: &Thread) -> Self {
        let preview = thread
            .messages
            .iter()
            .find(|m| m.role == crate::models::Role::User)
            .and_then(|m| m.text());
        Self {
            id: thread.id.clone(),
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            message_count: thread.message_count(),
            preview,
            metadata: thread.metadata.clone(),
        }
    }
}
