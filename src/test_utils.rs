//! Test utilities for memex
//!
//! This module provides shared fixtures: temporary databases, pre-filled
//! threads, and assertion helpers for classified errors.

use crate::config::Config;
use crate::error::{kind_of, ErrorKind, Result};
use crate::models::{Message, Thread};
use crate::storage::SqliteStorage;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a SQLite storage in a fresh temporary directory
///
/// The caller must keep the `TempDir` alive for as long as the storage is used.
pub fn temp_sqlite_storage(max_messages: Option<usize>) -> (SqliteStorage, TempDir) {
    let dir = temp_dir();
    let storage = SqliteStorage::with_options(dir.path().join("history.db"), max_messages)
        .expect("Failed to create sqlite storage");
    (storage, dir)
}

/// Build a thread holding user messages `msg0..msg{count-1}`
pub fn thread_with_messages(id: &str, count: usize) -> Thread {
    let mut thread = Thread::with_id(id);
    for i in 0..count {
        thread.add_message(Message::user(format!("msg{}", i)));
    }
    thread
}

/// Text of each message that has content, in order
pub fn message_texts(messages: &[Message]) -> Vec<String> {
    messages.iter().filter_map(Message::text).collect()
}

/// Assert that a result failed with the given error kind
///
/// # Panics
///
/// Panics if the result is Ok or the error has a different kind
pub fn assert_error_kind<T>(result: Result<T>, expected: ErrorKind) {
    match result {
        Ok(_) => panic!("Expected {:?} error but got Ok", expected),
        Err(e) => assert_eq!(
            kind_of(&e),
            Some(expected),
            "Error '{}' is not {:?}",
            e,
            expected
        ),
    }
}

/// Create a test configuration backed by in-memory storage
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.storage.backend = "memory".to_string();
    config
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
storage:
  backend: memory
  max_messages: 10
algorithm:
  window: 5
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemexError;
    use crate::storage::Storage;

    #[test]
    fn test_temp_sqlite_storage_is_usable() {
        let (mut storage, dir) = temp_sqlite_storage(Some(2));
        storage.save_thread(&thread_with_messages("t", 3)).unwrap();
        assert!(dir.path().join("history.db").exists());
        assert_eq!(storage.get_thread("t", None).unwrap().unwrap().message_count(), 2);
    }

    #[test]
    fn test_thread_with_messages() {
        let thread = thread_with_messages("t", 3);
        assert_eq!(message_texts(thread.messages()), vec!["msg0", "msg1", "msg2"]);
    }

    #[test]
    fn test_assert_error_kind_success() {
        let result: Result<()> = Err(MemexError::validation("bad").into());
        assert_error_kind(result, ErrorKind::Validation);
    }

    #[test]
    #[should_panic(expected = "but got Ok")]
    fn test_assert_error_kind_ok() {
        assert_error_kind(Ok(()), ErrorKind::Validation);
    }

    #[test]
    #[should_panic(expected = "is not")]
    fn test_assert_error_kind_wrong_kind() {
        let result: Result<()> = Err(MemexError::NotFound("t".to_string()).into());
        assert_error_kind(result, ErrorKind::Validation);
    }

    #[test]
    fn test_test_config_yaml() {
        let config: Config = serde_yaml::from_str(&test_config_yaml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.algorithm.window, Some(5));
        assert!(test_config().build_manager().is_ok());
    }
}
