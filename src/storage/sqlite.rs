//! SQLite storage backend
//!
//! Threads and messages live in two tables; messages carry a
//! `message_index` recording their position so a thread's tail can be read
//! without loading its whole history. Every write runs inside a single
//! transaction, so a failed save never leaves a partial message set behind.

use super::{
    effective_limit, from_json_text, to_json_text, validate_max_messages,
    validate_message_limit, validate_page, validate_query, validate_thread_id, SearchQuery,
    Storage,
};
use crate::error::{MemexError, Result};
use crate::models::{
    trailing_window, Content, ContentPart, FunctionCall, Message, Metadata, Role, Thread,
    ToolCall,
};
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default database file name inside the data directory
pub const DEFAULT_DB_FILE: &str = "history.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS threads (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        metadata TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        thread_id TEXT NOT NULL,
        content TEXT,
        content_parts TEXT,
        role TEXT NOT NULL,
        created_at TEXT NOT NULL,
        metadata TEXT NOT NULL,
        token_count INTEGER,
        name TEXT,
        tool_call_id TEXT,
        tool_calls TEXT,
        function_call TEXT,
        message_index INTEGER NOT NULL,
        FOREIGN KEY (thread_id) REFERENCES threads (id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_messages_thread_id
        ON messages (thread_id, message_index);
";

const UPSERT_THREAD: &str = "
    INSERT INTO threads (id, created_at, updated_at, metadata)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(id) DO UPDATE SET
        created_at = excluded.created_at,
        updated_at = excluded.updated_at,
        metadata = excluded.metadata";

const INSERT_MESSAGE: &str = "
    INSERT INTO messages (
        id, thread_id, content, content_parts, role, created_at, metadata,
        token_count, name, tool_call_id, tool_calls, function_call, message_index
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

const DELETE_THREAD_MESSAGES: &str = "DELETE FROM messages WHERE thread_id = ?1";

const DELETE_THREAD: &str = "DELETE FROM threads WHERE id = ?1";

const GET_THREAD: &str =
    "SELECT id, created_at, updated_at, metadata FROM threads WHERE id = ?1";

// Newest first so LIMIT takes the tail; callers reverse the result.
const GET_THREAD_MESSAGES: &str = "
    SELECT id, content, content_parts, role, created_at, metadata,
           token_count, name, tool_call_id, tool_calls, function_call
    FROM messages
    WHERE thread_id = ?1
    ORDER BY message_index DESC
    LIMIT ?2";

const LIST_THREADS: &str = "
    SELECT id FROM threads
    ORDER BY updated_at DESC
    LIMIT ?1 OFFSET ?2";

/// SQLite-backed persistent storage for conversation threads
///
/// A short-lived connection is opened per operation and released on every
/// exit path. Concurrent writers to the same thread race with
/// last-writer-wins semantics at thread granularity.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
    max_messages: Option<usize>,
}

impl SqliteStorage {
    /// Create a storage instance in the user's data directory
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or created,
    /// or if the database cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::with_options(Self::default_path()?, None)
    }

    /// Create an unbounded storage instance at the given database path
    ///
    /// Missing parent directories are created.
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("nested/history.db")).unwrap();
    /// assert!(storage.db_path().exists());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        Self::with_options(db_path, None)
    }

    /// Create a storage instance with an optional per-thread capacity cap
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Validation` for an empty path or a zero cap,
    /// `MemexError::Io` if the parent directory cannot be created and
    /// `MemexError::Connection` if the database cannot be opened or its
    /// schema created.
    pub fn with_options<P: Into<PathBuf>>(db_path: P, max_messages: Option<usize>) -> Result<Self> {
        let db_path = db_path.into();
        if db_path.as_os_str().is_empty() {
            return Err(MemexError::validation("Database path cannot be empty").into());
        }
        validate_max_messages(max_messages)?;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(MemexError::from)?;
            }
        }

        let storage = Self {
            db_path,
            max_messages,
        };
        storage.init()?;
        Ok(storage)
    }

    /// Default database location in the platform data directory
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "memex", "memex").ok_or_else(|| {
            MemexError::Config("Could not determine data directory".to_string())
        })?;
        Ok(proj_dirs.data_dir().join(DEFAULT_DB_FILE))
    }

    /// Path of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create tables and indexes if they do not exist yet
    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA).map_err(|e| {
            tracing::error!(path = %self.db_path.display(), error = %e, "failed to initialize database schema");
            MemexError::connection("initialize database schema", e)
        })?;
        tracing::debug!(path = %self.db_path.display(), "database initialized");
        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        let open = || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&self.db_path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(conn)
        };
        open().map_err(|e| {
            tracing::error!(path = %self.db_path.display(), error = %e, "failed to connect to database");
            MemexError::connection("connect to database", e).into()
        })
    }

    fn write_thread(
        conn: &mut Connection,
        thread: &ThreadRow,
        messages: &[MessageRow],
    ) -> rusqlite::Result<()> {
        // Dropping an uncommitted transaction rolls it back.
        let tx = conn.transaction()?;
        tx.execute(
            UPSERT_THREAD,
            params![thread.id, thread.created_at, thread.updated_at, thread.metadata],
        )?;
        tx.execute(DELETE_THREAD_MESSAGES, params![thread.id])?;
        {
            let mut stmt = tx.prepare(INSERT_MESSAGE)?;
            for row in messages {
                stmt.execute(params![
                    row.id,
                    thread.id,
                    row.content,
                    row.content_parts,
                    row.role,
                    row.created_at,
                    row.metadata,
                    row.token_count,
                    row.name,
                    row.tool_call_id,
                    row.tool_calls,
                    row.function_call,
                    row.message_index,
                ])?;
            }
        }
        tx.commit()
    }

    fn read_thread(
        conn: &mut Connection,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Option<Thread>> {
        let rows = Self::read_thread_rows(conn, thread_id, sql_limit(limit))
            .map_err(|e| MemexError::from_sqlite("retrieving thread", e))?;

        let Some((thread_row, message_rows)) = rows else {
            tracing::debug!(thread_id, "thread not found");
            return Ok(None);
        };

        let mut messages = message_rows
            .into_iter()
            .map(MessageRow::into_message)
            .collect::<Result<Vec<_>>>()?;
        messages.reverse();

        let thread = thread_row.into_thread(messages)?;
        tracing::debug!(thread_id, messages = thread.message_count(), "retrieved thread");
        Ok(Some(thread))
    }

    /// Read the thread row and its messages from one snapshot
    fn read_thread_rows(
        conn: &mut Connection,
        thread_id: &str,
        limit: i64,
    ) -> rusqlite::Result<Option<(ThreadRow, Vec<MessageRow>)>> {
        let tx = conn.transaction()?;
        let thread_row = tx
            .query_row(GET_THREAD, params![thread_id], |row| {
                Ok(ThreadRow {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    updated_at: row.get(2)?,
                    metadata: row.get(3)?,
                })
            })
            .optional()?;

        let rows = match thread_row {
            Some(thread_row) => Some((thread_row, Self::read_message_rows(&tx, thread_id, limit)?)),
            None => None,
        };
        tx.commit()?;
        Ok(rows)
    }

    fn read_message_rows(
        conn: &Connection,
        thread_id: &str,
        limit: i64,
    ) -> rusqlite::Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(GET_THREAD_MESSAGES)?;
        let rows = stmt
            .query_map(params![thread_id, limit], |row| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    content_parts: row.get(2)?,
                    role: row.get(3)?,
                    created_at: row.get(4)?,
                    metadata: row.get(5)?,
                    token_count: row.get(6)?,
                    name: row.get(7)?,
                    tool_call_id: row.get(8)?,
                    tool_calls: row.get(9)?,
                    function_call: row.get(10)?,
                    message_index: 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>();
        rows
    }

    fn query_ids<P: Params>(&self, sql: &str, params: P, action: &str) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let query = || -> rusqlite::Result<Vec<String>> {
            let mut stmt = conn.prepare(sql)?;
            let ids = stmt
                .query_map(params, |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>();
            ids
        };
        query().map_err(|e| {
            tracing::error!(error = %e, "database error while {}", action);
            MemexError::from_sqlite(action, e).into()
        })
    }

    /// Re-fetch each thread by id, skipping any that fail to load
    fn hydrate(&self, ids: Vec<String>, action: &str) -> Vec<Thread> {
        ids.into_iter()
            .filter_map(|id| match self.get_thread(&id, None) {
                Ok(thread) => thread,
                Err(e) => {
                    tracing::error!(thread_id = %id, error = %e, "error retrieving thread while {}", action);
                    None
                }
            })
            .collect()
    }
}

impl Storage for SqliteStorage {
    fn max_messages(&self) -> Option<usize> {
        self.max_messages
    }

    fn save_thread(&mut self, thread: &Thread) -> Result<()> {
        validate_thread_id(&thread.id)?;

        let messages = match self.max_messages {
            Some(max) => trailing_window(&thread.messages, max),
            None => &thread.messages[..],
        };

        // Encode everything up front so bad input fails before any write.
        let thread_row = ThreadRow::from_thread(thread)?;
        let message_rows = messages
            .iter()
            .enumerate()
            .map(|(index, message)| MessageRow::from_message(message, index))
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.connect()?;
        Self::write_thread(&mut conn, &thread_row, &message_rows).map_err(|e| {
            tracing::error!(thread_id = %thread.id, error = %e, "database error while saving thread");
            MemexError::from_sqlite("saving thread", e)
        })?;

        tracing::debug!(thread_id = %thread.id, messages = message_rows.len(), "saved thread");
        Ok(())
    }

    fn get_thread(
        &self,
        thread_id: &str,
        message_limit: Option<usize>,
    ) -> Result<Option<Thread>> {
        validate_thread_id(thread_id)?;
        validate_message_limit(message_limit)?;

        let mut conn = self.connect()?;
        Self::read_thread(
            &mut conn,
            thread_id,
            effective_limit(message_limit, self.max_messages),
        )
        .map_err(|e| {
            tracing::error!(thread_id, error = %e, "error while retrieving thread");
            e
        })
    }

    fn list_threads(&self, limit: usize, offset: usize) -> Result<Vec<Thread>> {
        validate_page(limit)?;

        let ids = self.query_ids(
            LIST_THREADS,
            params![sql_count(limit), sql_count(offset)],
            "listing threads",
        )?;
        let threads = self.hydrate(ids, "listing threads");

        tracing::debug!(count = threads.len(), limit, offset, "listed threads");
        Ok(threads)
    }

    fn delete_thread(&mut self, thread_id: &str) -> Result<bool> {
        validate_thread_id(thread_id)?;

        let conn = self.connect()?;
        let affected = conn.execute(DELETE_THREAD, params![thread_id]).map_err(|e| {
            tracing::error!(thread_id, error = %e, "database error while deleting thread");
            MemexError::from_sqlite("deleting thread", e)
        })?;

        let deleted = affected > 0;
        if deleted {
            tracing::debug!(thread_id, "deleted thread");
        } else {
            tracing::debug!(thread_id, "thread not found for deletion");
        }
        Ok(deleted)
    }

    fn search_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        validate_query(query)?;

        let (sql, values) = build_search(query)?;
        let ids = self.query_ids(&sql, params_from_iter(values.iter()), "searching threads")?;
        let threads = self.hydrate(ids, "searching threads");

        tracing::debug!(count = threads.len(), "search matched threads");
        Ok(threads)
    }
}

/// Build the dynamic search statement and its bound values
fn build_search(query: &SearchQuery) -> Result<(String, Vec<Value>)> {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    for (key, value) in &query.metadata {
        let (predicate, operand) = metadata_predicate(value)?;
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM json_each(threads.metadata) AS m WHERE m.key = ? AND {})",
            predicate
        ));
        values.push(Value::Text(key.clone()));
        values.extend(operand);
    }

    if let Some(pattern) = query.content_pattern() {
        conditions.push(
            "id IN (SELECT DISTINCT thread_id FROM messages WHERE content LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        values.push(Value::Text(format!("%{}%", escape_like(pattern))));
    }

    let sql = format!(
        "SELECT id FROM threads WHERE {} ORDER BY updated_at DESC",
        conditions.join(" AND ")
    );
    Ok((sql, values))
}

/// Condition on a `json_each` row matching `value` with its JSON type
///
/// Integers and reals are distinct types, so `1` never matches `1.0`.
/// Booleans are compared through their type name since `atom` reports
/// them as integers.
fn metadata_predicate(value: &serde_json::Value) -> Result<(&'static str, Option<Value>)> {
    let matched = match value {
        serde_json::Value::Null => ("m.type = 'null'", None),
        serde_json::Value::Bool(true) => ("m.type = 'true'", None),
        serde_json::Value::Bool(false) => ("m.type = 'false'", None),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => ("m.type = 'integer' AND m.atom = ?", Some(Value::Integer(i))),
            None if n.is_u64() => (
                "m.type = 'integer' AND m.atom = ?",
                Some(Value::Real(n.as_f64().unwrap_or(f64::NAN))),
            ),
            None => (
                "m.type = 'real' AND m.atom = ?",
                Some(Value::Real(n.as_f64().unwrap_or(f64::NAN))),
            ),
        },
        serde_json::Value::String(s) => (
            "m.type = 'text' AND m.atom = ?",
            Some(Value::Text(s.clone())),
        ),
        serde_json::Value::Array(_) => (
            "m.type = 'array' AND m.value = json(?)",
            Some(Value::Text(to_json_text(value)?)),
        ),
        serde_json::Value::Object(_) => (
            "m.type = 'object' AND m.value = json(?)",
            Some(Value::Text(to_json_text(value)?)),
        ),
    };
    Ok(matched)
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// SQLite treats a negative LIMIT as "no limit"
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map(sql_count).unwrap_or(-1)
}

fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// Fixed-width timestamps keep lexical order equal to chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemexError::validation(format!("Invalid timestamp '{}': {}", value, e)).into())
}

fn encode_optional<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>> {
    value.map(|v| to_json_text(v)).transpose()
}

fn decode_optional<T: serde::de::DeserializeOwned>(text: Option<String>) -> Result<Option<T>> {
    text.as_deref().map(from_json_text).transpose()
}

struct ThreadRow {
    id: String,
    created_at: String,
    updated_at: String,
    metadata: String,
}

impl ThreadRow {
    fn from_thread(thread: &Thread) -> Result<Self> {
        Ok(Self {
            id: thread.id.clone(),
            created_at: format_timestamp(&thread.created_at),
            updated_at: format_timestamp(&thread.updated_at),
            metadata: to_json_text(&thread.metadata)?,
        })
    }

    fn into_thread(self, messages: Vec<Message>) -> Result<Thread> {
        Ok(Thread {
            id: self.id,
            messages,
            metadata: from_json_text::<Metadata>(&self.metadata)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    content: Option<String>,
    content_parts: Option<String>,
    role: String,
    created_at: String,
    metadata: String,
    token_count: Option<u32>,
    name: Option<String>,
    tool_call_id: Option<String>,
    tool_calls: Option<String>,
    function_call: Option<String>,
    message_index: i64,
}

impl MessageRow {
    fn from_message(message: &Message, index: usize) -> Result<Self> {
        if message.id.is_empty() {
            return Err(MemexError::validation("Message ID cannot be empty").into());
        }

        // Structured content keeps its text segments in `content` so that
        // content search sees them.
        let (content, content_parts) = match &message.content {
            None => (None, None),
            Some(Content::Text(text)) => (Some(text.clone()), None),
            Some(content @ Content::Parts(parts)) => {
                (Some(content.to_text()), Some(to_json_text(parts)?))
            }
        };

        Ok(Self {
            id: message.id.clone(),
            content,
            content_parts,
            role: message.role.as_str().to_string(),
            created_at: format_timestamp(&message.created_at),
            metadata: to_json_text(&message.metadata)?,
            token_count: message.token_count,
            name: message.name.clone(),
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: encode_optional(message.tool_calls.as_ref())?,
            function_call: encode_optional(message.function_call.as_ref())?,
            message_index: sql_count(index),
        })
    }

    fn into_message(self) -> Result<Message> {
        let content = match decode_optional::<Vec<ContentPart>>(self.content_parts)? {
            Some(parts) => Some(Content::Parts(parts)),
            None => self.content.map(Content::Text),
        };

        Ok(Message {
            id: self.id,
            role: self.role.parse::<Role>()?,
            content,
            created_at: parse_timestamp(&self.created_at)?,
            metadata: from_json_text(&self.metadata)?,
            token_count: self.token_count,
            name: self.name,
            tool_call_id: self.tool_call_id,
            tool_calls: decode_optional::<Vec<ToolCall>>(self.tool_calls)?,
            function_call: decode_optional::<FunctionCall>(self.function_call)?,
        })
    }
}
