//! First-in-first-out window
//!
//! Keeps the most recent `max_messages` messages and evicts the oldest
//! first. Roles are not special-cased: a leading system prompt is evicted
//! like any other message once the window overflows.

use super::HistoryAlgorithm;
use crate::error::{MemexError, Result};
use crate::models::{trailing_window, Message, Thread};

/// Window size used by [`FifoAlgorithm::default`]
pub const DEFAULT_WINDOW: usize = 100;

/// Fixed-size trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoAlgorithm {
    max_messages: usize,
}

impl FifoAlgorithm {
    /// Create a window of `max_messages` messages
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Validation` if `max_messages` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::algorithms::{FifoAlgorithm, HistoryAlgorithm};
    /// use memex::models::{Message, Thread};
    ///
    /// let fifo = FifoAlgorithm::new(2).unwrap();
    /// let mut thread = Thread::new();
    /// for text in ["First", "Second", "Third"] {
    ///     fifo.process_thread(&mut thread, Message::user(text));
    /// }
    /// let texts: Vec<_> = thread.messages.iter().filter_map(|m| m.text()).collect();
    /// assert_eq!(texts, vec!["Second", "Third"]);
    /// ```
    pub fn new(max_messages: usize) -> Result<Self> {
        if max_messages == 0 {
            return Err(MemexError::validation("max_messages must be greater than 0").into());
        }
        Ok(Self { max_messages })
    }

    /// Configured window size
    pub fn max_messages(&self) -> usize {
        self.max_messages
    }
}

impl Default for FifoAlgorithm {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_WINDOW,
        }
    }
}

impl HistoryAlgorithm for FifoAlgorithm {
    fn process_thread(&self, thread: &mut Thread, new_message: Message) {
        thread.add_message(new_message);
        let before = thread.message_count();
        thread.retain_last(self.max_messages);

        let evicted = before - thread.message_count();
        if evicted > 0 {
            tracing::debug!(thread_id = %thread.id, evicted, window = self.max_messages, "trimmed thread to window");
        }
    }

    fn get_message_window(&self, messages: &[Message]) -> Vec<Message> {
        trailing_window(messages, self.max_messages).to_vec()
    }
}
