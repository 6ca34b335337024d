use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use memex::models::{Message, Thread};
use memex::storage::SqliteStorage;

#[allow(dead_code)]
pub fn create_temp_storage(max_messages: Option<usize>) -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("history.db");
    let storage = SqliteStorage::with_options(db_path, max_messages)
        .expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn thread_with_messages(id: &str, count: usize) -> Thread {
    let mut thread = Thread::with_id(id);
    for i in 0..count {
        thread.add_message(Message::user(format!("msg{}", i)));
    }
    thread
}

#[allow(dead_code)]
pub fn texts(messages: &[Message]) -> Vec<String> {
    messages.iter().filter_map(Message::text).collect()
}

#[allow(dead_code)]
pub fn msgs(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("msg{}", i)).collect()
}
