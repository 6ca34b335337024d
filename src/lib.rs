//! memex - conversation thread storage and context windowing
//!
//! This library keeps ordered conversation threads for LLM applications and
//! separates two independent concerns: how many messages a storage backend
//! retains per thread, and which of them are exposed as model context.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `models`: Message and thread entities
//! - `storage`: Storage contract with in-memory and SQLite backends
//! - `algorithms`: Context window selection (FIFO)
//! - `history`: Manager composing a backend with an optional window
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface
//!
//! # Example
//!
//! ```
//! use memex::{FifoAlgorithm, HistoryManager, MemoryStorage, Message, Metadata};
//!
//! fn main() -> anyhow::Result<()> {
//!     let storage = MemoryStorage::with_max_messages(10)?;
//!     let mut manager = HistoryManager::with_algorithm(storage, FifoAlgorithm::new(5)?);
//!
//!     let thread = manager.create_thread(Metadata::new())?;
//!     for i in 0..8 {
//!         manager.add_message(&thread.id, Message::user(format!("msg{}", i)))?;
//!     }
//!
//!     assert_eq!(manager.get_messages(&thread.id)?.len(), 5);
//!     Ok(())
//! }
//! ```

pub mod algorithms;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod storage;

// Re-export commonly used types
pub use algorithms::{FifoAlgorithm, HistoryAlgorithm};
pub use config::Config;
pub use error::{ErrorKind, MemexError, Result};
pub use history::HistoryManager;
pub use models::{Content, ContentPart, Message, Metadata, Role, Thread};
pub use storage::{MemoryStorage, SearchQuery, SqliteStorage, Storage};

#[cfg(test)]
pub mod test_utils;
