//! Context window selection
//!
//! An algorithm decides which part of a thread's history is exposed as model
//! context. It is independent of the storage capacity cap: the window may be
//! larger than what storage retains or smaller than it.

use crate::models::{Message, Thread};

pub mod fifo;

pub use fifo::FifoAlgorithm;

/// Window selection policy applied by the history manager
pub trait HistoryAlgorithm: Send + Sync {
    /// Append `new_message` to `thread` and trim it to the window
    ///
    /// Mutates the thread in place; callers must not rely on the previous
    /// message list surviving.
    fn process_thread(&self, thread: &mut Thread, new_message: Message);

    /// Select the context window from a full ordered message list
    ///
    /// Never mutates its input and never reorders messages.
    fn get_message_window(&self, messages: &[Message]) -> Vec<Message>;
}

impl<A: HistoryAlgorithm + ?Sized> HistoryAlgorithm for Box<A> {
    fn process_thread(&self, thread: &mut Thread, new_message: Message) {
        (**self).process_thread(thread, new_message)
    }

    fn get_message_window(&self, messages: &[Message]) -> Vec<Message> {
        (**self).get_message_window(messages)
    }
}
