//! In-memory storage backend
//!
//! Keeps threads in an insertion-ordered map. Nothing survives the process;
//! intended for tests, development and short-lived sessions.

use super::{
    effective_limit, validate_max_messages, validate_message_limit, validate_page,
    validate_query, validate_thread_id, SearchQuery, Storage,
};
use crate::error::Result;
use crate::models::Thread;
use std::collections::HashMap;

/// In-memory storage for conversation threads
///
/// Listing preserves the order in which threads were first saved, unlike
/// [`SqliteStorage`](super::SqliteStorage) which lists most recently updated
/// first. There is no internal locking: writes take `&mut self`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    threads: HashMap<String, Thread>,
    order: Vec<String>,
    max_messages: Option<usize>,
}

impl MemoryStorage {
    /// Create an unbounded in-memory storage
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::storage::{MemoryStorage, Storage};
    ///
    /// let storage = MemoryStorage::new();
    /// assert_eq!(storage.max_messages(), None);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory storage retaining at most `max_messages` per thread
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Validation` if `max_messages` is zero.
    pub fn with_max_messages(max_messages: usize) -> Result<Self> {
        Self::with_capacity(Some(max_messages))
    }

    /// Create an in-memory storage with an optional capacity cap
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Validation` if the cap is `Some(0)`.
    pub fn with_capacity(max_messages: Option<usize>) -> Result<Self> {
        validate_max_messages(max_messages)?;
        Ok(Self {
            max_messages,
            ..Self::default()
        })
    }

    /// Number of stored threads
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// True when no thread is stored
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    fn ordered(&self) -> impl Iterator<Item = &Thread> {
        self.order.iter().filter_map(|id| self.threads.get(id))
    }
}

impl Storage for MemoryStorage {
    fn max_messages(&self) -> Option<usize> {
        self.max_messages
    }

    fn save_thread(&mut self, thread: &Thread) -> Result<()> {
        validate_thread_id(&thread.id)?;

        let stored = thread.with_trailing(self.max_messages);
        let count = stored.message_count();
        if self.threads.insert(thread.id.clone(), stored).is_none() {
            self.order.push(thread.id.clone());
        }

        tracing::debug!(thread_id = %thread.id, messages = count, "saved thread in memory");
        Ok(())
    }

    fn get_thread(
        &self,
        thread_id: &str,
        message_limit: Option<usize>,
    ) -> Result<Option<Thread>> {
        validate_thread_id(thread_id)?;
        validate_message_limit(message_limit)?;

        let limit = effective_limit(message_limit, self.max_messages);
        Ok(self
            .threads
            .get(thread_id)
            .map(|thread| thread.with_trailing(limit)))
    }

    fn list_threads(&self, limit: usize, offset: usize) -> Result<Vec<Thread>> {
        validate_page(limit)?;

        let threads: Vec<Thread> = self
            .ordered()
            .skip(offset)
            .take(limit)
            .map(|thread| thread.with_trailing(self.max_messages))
            .collect();

        tracing::debug!(count = threads.len(), limit, offset, "listed threads");
        Ok(threads)
    }

    fn delete_thread(&mut self, thread_id: &str) -> Result<bool> {
        validate_thread_id(thread_id)?;

        let deleted = self.threads.remove(thread_id).is_some();
        if deleted {
            self.order.retain(|id| id != thread_id);
            tracing::debug!(thread_id, "deleted thread");
        } else {
            tracing::debug!(thread_id, "thread not found for deletion");
        }
        Ok(deleted)
    }

    fn search_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        validate_query(query)?;

        let threads: Vec<Thread> = self
            .ordered()
            .filter(|thread| query.matches(thread))
            .map(|thread| thread.with_trailing(self.max_messages))
            .collect();

        tracing::debug!(count = threads.len(), "search matched threads");
        Ok(threads)
    }
}
