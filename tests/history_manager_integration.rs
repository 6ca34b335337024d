//! Integration tests for the history manager built from configuration
//!
//! Covers the full path from a YAML file through `Config` to a manager over
//! a persistent backend.

mod common;

use common::{msgs, temp_config_file, texts};
use memex::cli::{Cli, Commands};
use memex::error::{kind_of, ErrorKind};
use memex::models::{ContentPart, FunctionCall, Message, Metadata, Role, ToolCall};
use memex::storage::SearchQuery;
use memex::Config;
use serde_json::json;

fn cli() -> Cli {
    Cli {
        config: None,
        verbose: false,
        db: None,
        max_messages: None,
        window: None,
        command: Commands::List {
            limit: 10,
            offset: 0,
            json: false,
        },
    }
}

fn sqlite_config(window: usize, max_messages: usize) -> (tempfile::TempDir, Config) {
    let (dir, _) = temp_config_file("");
    let yaml = format!(
        "storage:\n  backend: sqlite\n  path: {}\n  max_messages: {}\nalgorithm:\n  window: {}\n",
        dir.path().join("history.db").display(),
        max_messages,
        window
    );
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, yaml).unwrap();

    let config = Config::load(config_path.to_str().unwrap(), &cli()).unwrap();
    config.validate().unwrap();
    (dir, config)
}

#[test]
fn test_manager_from_yaml_windows_sqlite_history() {
    let (dir, config) = sqlite_config(5, 10);
    let mut manager = config.build_manager().unwrap();

    let mut metadata = Metadata::new();
    metadata.insert("user_id".to_string(), json!("123"));
    let thread = manager.create_thread(metadata).unwrap();
    for i in 0..8 {
        manager
            .add_message(&thread.id, Message::user(format!("msg{}", i)))
            .unwrap();
    }

    assert_eq!(texts(&manager.get_messages(&thread.id).unwrap()), msgs(3..8));
    let stored = manager.storage().get_thread(&thread.id, None).unwrap().unwrap();
    assert_eq!(stored.message_count(), 8);
    assert!(dir.path().join("history.db").exists());

    let hits = manager
        .search_threads(&SearchQuery::new().with_metadata("user_id", "123"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, thread.id);
}

#[test]
fn test_manager_persists_tool_conversation() {
    let (_dir, config) = sqlite_config(50, 100);
    let mut manager = config.build_manager().unwrap();
    let thread = manager.create_thread(Metadata::new()).unwrap();

    let call = ToolCall {
        id: "call_1".to_string(),
        function: FunctionCall {
            name: "describe_image".to_string(),
            arguments: r#"{"detail":"low"}"#.to_string(),
        },
    };
    let conversation = vec![
        Message::system("You describe images."),
        Message::user(memex::Content::Parts(vec![
            ContentPart::Text {
                text: "What is in this picture?".to_string(),
            },
            ContentPart::ImageUrl {
                url: "https://example.com/cat.png".to_string(),
                detail: None,
            },
        ])),
        Message::assistant_with_tools(vec![call]),
        Message::tool_result("call_1", "A cat on a sofa"),
        Message::assistant("It is a cat.").with_token_count(5),
    ];
    for message in conversation.clone() {
        manager.add_message(&thread.id, message).unwrap();
    }

    let messages = manager.get_messages(&thread.id).unwrap();
    assert_eq!(messages, conversation);
    assert_eq!(
        messages.iter().map(|m| m.role).collect::<Vec<_>>(),
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
}

#[test]
fn test_manager_errors_are_classified() {
    let (_dir, config) = sqlite_config(5, 10);
    let mut manager = config.build_manager().unwrap();

    let err = manager.add_message("missing", Message::user("x")).unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::NotFound));

    let err = manager.get_messages("").unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::Validation));

    let err = manager.search_threads(&SearchQuery::new()).unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::Validation));

    assert!(!manager.delete_thread("missing").unwrap());
}
