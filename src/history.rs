//! High-level thread management
//!
//! [`HistoryManager`] composes one storage backend with an optional window
//! algorithm. Storage keeps the durable history (bounded by its own capacity
//! cap); the algorithm only shapes what callers see as context.

use crate::algorithms::HistoryAlgorithm;
use crate::error::{MemexError, Result};
use crate::models::{Message, Metadata, Thread};
use crate::storage::{validate_thread_id, SearchQuery, Storage, DEFAULT_LIST_LIMIT};

/// Facade over a storage backend and an optional window algorithm
pub struct HistoryManager<S> {
    storage: S,
    algorithm: Option<Box<dyn HistoryAlgorithm>>,
}

impl<S: Storage> HistoryManager<S> {
    /// Create a manager without a window algorithm
    ///
    /// Reads return exactly what storage provides.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            algorithm: None,
        }
    }

    /// Create a manager that windows reads through `algorithm`
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::algorithms::FifoAlgorithm;
    /// use memex::history::HistoryManager;
    /// use memex::models::{Message, Metadata};
    /// use memex::storage::MemoryStorage;
    ///
    /// let mut manager =
    ///     HistoryManager::with_algorithm(MemoryStorage::new(), FifoAlgorithm::new(2).unwrap());
    /// let thread = manager.create_thread(Metadata::new()).unwrap();
    /// for text in ["a", "b", "c"] {
    ///     manager.add_message(&thread.id, Message::user(text)).unwrap();
    /// }
    /// assert_eq!(manager.get_messages(&thread.id).unwrap().len(), 2);
    /// ```
    pub fn with_algorithm<A: HistoryAlgorithm + 'static>(storage: S, algorithm: A) -> Self {
        Self {
            storage,
            algorithm: Some(Box::new(algorithm)),
        }
    }

    /// Replace or remove the window algorithm
    pub fn set_algorithm(&mut self, algorithm: Option<Box<dyn HistoryAlgorithm>>) {
        self.algorithm = algorithm;
    }

    /// Underlying storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable access to the underlying storage backend
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Configured window algorithm, if any
    pub fn algorithm(&self) -> Option<&dyn HistoryAlgorithm> {
        self.algorithm.as_deref()
    }

    /// Create and persist an empty thread
    pub fn create_thread(&mut self, metadata: Metadata) -> Result<Thread> {
        let thread = Thread::new().with_metadata(metadata);
        self.storage.save_thread(&thread)?;
        tracing::info!(thread_id = %thread.id, "created thread");
        Ok(thread)
    }

    /// Load a thread, narrowed to the context window when an algorithm is set
    pub fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        validate_thread_id(thread_id)?;
        Ok(self
            .storage
            .get_thread(thread_id, None)?
            .map(|thread| self.windowed(thread)))
    }

    /// Append a message to an existing thread
    ///
    /// The full thread is persisted (subject to the storage capacity cap)
    /// while the algorithm runs on a separate context copy. Returns that
    /// context, which always ends with the new message.
    ///
    /// # Errors
    ///
    /// Returns `MemexError::NotFound` if the thread does not exist, and
    /// propagates storage errors unchanged.
    pub fn add_message(&mut self, thread_id: &str, message: Message) -> Result<Thread> {
        validate_thread_id(thread_id)?;
        let mut stored = self
            .storage
            .get_thread(thread_id, None)?
            .ok_or_else(|| MemexError::NotFound(thread_id.to_string()))?;

        let context = match &self.algorithm {
            Some(algorithm) => {
                let mut context = stored.clone();
                algorithm.process_thread(&mut context, message.clone());
                stored.add_message(message);
                context.updated_at = stored.updated_at;
                context
            }
            None => {
                stored.add_message(message);
                stored.with_trailing(self.storage.max_messages())
            }
        };

        self.storage.save_thread(&stored)?;
        tracing::debug!(
            thread_id,
            context_messages = context.message_count(),
            "appended message"
        );
        Ok(context)
    }

    /// Windowed messages of a thread
    ///
    /// # Errors
    ///
    /// Returns `MemexError::NotFound` if the thread does not exist.
    pub fn get_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.get_thread(thread_id)?
            .map(|thread| thread.messages)
            .ok_or_else(|| MemexError::NotFound(thread_id.to_string()).into())
    }

    /// List a page of threads as stored
    pub fn list_threads(&self, limit: usize, offset: usize) -> Result<Vec<Thread>> {
        self.storage.list_threads(limit, offset)
    }

    /// List the first page of threads with the default page size
    pub fn recent_threads(&self) -> Result<Vec<Thread>> {
        self.list_threads(DEFAULT_LIST_LIMIT, 0)
    }

    /// Delete a thread and its messages
    pub fn delete_thread(&mut self, thread_id: &str) -> Result<bool> {
        let deleted = self.storage.delete_thread(thread_id)?;
        if deleted {
            tracing::info!(thread_id, "deleted thread");
        }
        Ok(deleted)
    }

    /// Search threads by metadata and content
    pub fn search_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        self.storage.search_threads(query)
    }

    fn windowed(&self, mut thread: Thread) -> Thread {
        if let Some(algorithm) = &self.algorithm {
            thread.messages = algorithm.get_message_window(&thread.messages);
        }
        thread
    }
}
