//! Pluggable thread persistence
//!
//! Every backend implements the five-operation [`Storage`] contract and
//! enforces its own optional per-thread capacity cap (`max_messages`). When a
//! cap is set, only the trailing `max_messages` messages of a thread are
//! retained; older messages are dropped oldest-first.
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryStorage`]: insertion-ordered in-process map, for tests and
//!   short-lived sessions
//! - [`SqliteStorage`]: transactional SQLite store with one row per message

use crate::error::{MemexError, Result};
use crate::models::Thread;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod memory;
pub mod sqlite;
pub mod types;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use types::{SearchQuery, ThreadSummary};

/// Default page size for [`Storage::list_threads`]
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Storage contract shared by all backends
///
/// Reads hand back owned copies: mutating a returned [`Thread`] never
/// affects stored state. Writes take `&mut self`, so a backend without
/// internal synchronization cannot be mutated concurrently without the
/// caller serializing access.
#[cfg_attr(test, mockall::automock)]
pub trait Storage {
    /// Configured capacity cap, `None` when unbounded
    fn max_messages(&self) -> Option<usize>;

    /// Upsert a thread and its messages
    ///
    /// When capped, only the trailing `max_messages` messages are persisted.
    /// The caller's thread is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Validation` if the thread id is empty, and a
    /// backend error if the write fails; previously stored data is retained.
    fn save_thread(&mut self, thread: &Thread) -> Result<()>;

    /// Load a thread with up to `message_limit` most recent messages
    ///
    /// Without an explicit limit the backend's `max_messages` applies, and
    /// without either all stored messages are returned. Returns `Ok(None)`
    /// when no thread with that id exists.
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Validation` for an empty id or a zero limit.
    fn get_thread(&self, thread_id: &str, message_limit: Option<usize>)
        -> Result<Option<Thread>>;

    /// List a page of threads
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Validation` if `limit` is zero.
    fn list_threads(&self, limit: usize, offset: usize) -> Result<Vec<Thread>>;

    /// Delete a thread and all of its messages
    ///
    /// Returns `true` if a thread was found and removed.
    fn delete_thread(&mut self, thread_id: &str) -> Result<bool>;

    /// Find threads matching every condition of `query`
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Validation` if the query carries no condition.
    fn search_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn max_messages(&self) -> Option<usize> {
        (**self).max_messages()
    }

    fn save_thread(&mut self, thread: &Thread) -> Result<()> {
        (**self).save_thread(thread)
    }

    fn get_thread(
        &self,
        thread_id: &str,
        message_limit: Option<usize>,
    ) -> Result<Option<Thread>> {
        (**self).get_thread(thread_id, message_limit)
    }

    fn list_threads(&self, limit: usize, offset: usize) -> Result<Vec<Thread>> {
        (**self).list_threads(limit, offset)
    }

    fn delete_thread(&mut self, thread_id: &str) -> Result<bool> {
        (**self).delete_thread(thread_id)
    }

    fn search_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        (**self).search_threads(query)
    }
}

pub(crate) fn validate_thread_id(thread_id: &str) -> Result<()> {
    if thread_id.is_empty() {
        return Err(MemexError::validation("Thread ID cannot be empty").into());
    }
    Ok(())
}

pub(crate) fn validate_max_messages(max_messages: Option<usize>) -> Result<()> {
    if max_messages == Some(0) {
        return Err(MemexError::validation("max_messages must be a positive integer").into());
    }
    Ok(())
}

pub(crate) fn validate_message_limit(message_limit: Option<usize>) -> Result<()> {
    if message_limit == Some(0) {
        return Err(MemexError::validation("message_limit must be a positive integer").into());
    }
    Ok(())
}

pub(crate) fn validate_page(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(MemexError::validation("Limit must be a positive integer").into());
    }
    Ok(())
}

pub(crate) fn validate_query(query: &SearchQuery) -> Result<()> {
    if query.is_empty() {
        return Err(MemexError::validation("Search query cannot be empty").into());
    }
    Ok(())
}

/// Resolve the number of messages a read should return
///
/// An explicit limit wins over the configured cap; `None` means unbounded.
pub(crate) fn effective_limit(
    message_limit: Option<usize>,
    max_messages: Option<usize>,
) -> Option<usize> {
    message_limit.or(max_messages)
}

/// Encode a value as JSON text for a text column
///
/// # Errors
///
/// Returns `MemexError::Validation` if the value cannot be encoded.
pub fn to_json_text<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize metadata");
        MemexError::validation(format!("Failed to serialize metadata: {}", e)).into()
    })
}

/// Decode JSON text read back from a text column
///
/// # Errors
///
/// Returns `MemexError::Validation` if the text is malformed.
pub fn from_json_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        tracing::error!(error = %e, "failed to deserialize metadata");
        MemexError::validation(format!("Failed to deserialize metadata: {}", e)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{kind_of, ErrorKind};
    use crate::models::Metadata;
    use serde_json::json;

    #[test]
    fn test_effective_limit_precedence() {
        assert_eq!(effective_limit(Some(2), Some(5)), Some(2));
        assert_eq!(effective_limit(Some(10), Some(5)), Some(10));
        assert_eq!(effective_limit(None, Some(5)), Some(5));
        assert_eq!(effective_limit(None, None), None);
    }

    #[test]
    fn test_validation_helpers_reject_bad_input() {
        let cases = [
            validate_thread_id(""),
            validate_max_messages(Some(0)),
            validate_message_limit(Some(0)),
            validate_page(0),
            validate_query(&SearchQuery::new()),
            validate_query(&SearchQuery::new().with_content("")),
        ];
        for result in cases {
            let err = result.unwrap_err();
            assert_eq!(kind_of(&err), Some(ErrorKind::Validation), "{}", err);
        }
    }

    #[test]
    fn test_validation_helpers_accept_good_input() {
        assert!(validate_thread_id("t").is_ok());
        assert!(validate_max_messages(None).is_ok());
        assert!(validate_max_messages(Some(1)).is_ok());
        assert!(validate_message_limit(None).is_ok());
        assert!(validate_page(1).is_ok());
        assert!(validate_query(&SearchQuery::new().with_content("x")).is_ok());
    }

    #[test]
    fn test_metadata_json_round_trip() {
        let value = json!({
            "user": {"id": 7, "tags": ["a", "b"], "vip": true},
            "score": 0.5,
            "missing": null,
            "count": -3,
            "label": "hello"
        });
        let metadata: Metadata = value.as_object().cloned().unwrap();

        let text = to_json_text(&metadata).unwrap();
        let decoded: Metadata = from_json_text(&text).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn test_malformed_metadata_is_validation_error() {
        let err = from_json_text::<Metadata>("{not json").unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Validation));
        assert!(err.to_string().contains("Failed to deserialize metadata"));
    }

    #[test]
    fn test_boxed_storage_delegates() {
        let mut storage: Box<dyn Storage> = Box::new(MemoryStorage::with_max_messages(3).unwrap());
        assert_eq!(storage.max_messages(), Some(3));

        let thread = Thread::with_id("boxed");
        storage.save_thread(&thread).unwrap();
        assert!(storage.get_thread("boxed", None).unwrap().is_some());
        assert!(storage.delete_thread("boxed").unwrap());
    }
}
