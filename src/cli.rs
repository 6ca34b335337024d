//! Command-line interface definition for memex
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to create, inspect, search and delete threads.

use crate::models::Role;
use crate::storage::DEFAULT_LIST_LIMIT;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "memex.yaml";

/// memex - conversation thread storage
///
/// Inspect and edit stored conversation threads.
#[derive(Parser, Debug, Clone)]
#[command(name = "memex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Override the per-thread storage capacity cap
    #[arg(long, global = true)]
    pub max_messages: Option<usize>,

    /// Override the FIFO context window size
    #[arg(long, global = true)]
    pub window: Option<usize>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for memex
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create an empty thread and print its id
    Create {
        /// Thread metadata as key=value (value parsed as JSON when possible)
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, Value)>,

        /// Print the created thread as JSON
        #[arg(long)]
        json: bool,
    },

    /// Append a message to a thread
    Append {
        /// Thread id
        id: String,

        /// Sender role (system, user, assistant, tool, function, developer)
        #[arg(short, long, default_value = "user")]
        role: Role,

        /// Message text
        #[arg(short = 'm', long)]
        content: String,
    },

    /// Show a thread's messages
    ///
    /// Without `--limit` the configured context window is shown.
    Show {
        /// Thread id
        id: String,

        /// Show this many most recent stored messages instead of the window
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the thread as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored threads
    List {
        /// Maximum number of threads to show
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,

        /// Number of threads to skip
        #[arg(short, long, default_value_t = 0)]
        offset: usize,

        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search threads by metadata and message content
    Search {
        /// Metadata condition as key=value (value parsed as JSON when possible)
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, Value)>,

        /// Text any message must contain
        #[arg(long)]
        content: Option<String>,

        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a thread and its messages
    Delete {
        /// Thread id
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parse a `key=value` pair
///
/// The value is decoded as JSON so numbers, booleans and structures keep
/// their type; anything that is not valid JSON becomes a string.
///
/// # Examples
///
/// ```
/// use memex::cli::parse_key_val;
/// use serde_json::json;
///
/// assert_eq!(parse_key_val("n=3").unwrap(), ("n".to_string(), json!(3)));
/// assert_eq!(parse_key_val("user=alice").unwrap(), ("user".to_string(), json!("alice")));
/// ```
pub fn parse_key_val(s: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid key=value: empty key in `{}`", s));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
