use crate::cli::Commands;
use crate::config::Config;
use crate::error::{MemexError, Result};
use crate::history::HistoryManager;
use crate::models::{Message, Metadata, Role, Thread};
use crate::storage::{SearchQuery, Storage, ThreadSummary};
use colored::{ColoredString, Colorize};
use prettytable::{format, Table};
use serde_json::Value;

/// Build the configured manager and execute one command
pub fn run(config: Config, command: Commands) -> Result<()> {
    let mut manager = config.build_manager()?;
    execute(&mut manager, command)
}

/// Execute one command against an existing manager
pub fn execute<S: Storage>(manager: &mut HistoryManager<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Create { meta, json } => {
            let thread = manager.create_thread(into_metadata(meta))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&thread)?);
            } else {
                println!("{}", thread.id);
            }
        }
        Commands::Append { id, role, content } => {
            let message = Message::new(role, content);
            let message_id = message.id.clone();
            let context = manager.add_message(&id, message)?;
            println!(
                "{}",
                format!(
                    "Appended message {} to thread {} ({} in context)",
                    message_id,
                    id,
                    context.message_count()
                )
                .green()
            );
        }
        Commands::Show { id, limit, json } => {
            let thread = match limit {
                Some(limit) => manager.storage().get_thread(&id, Some(limit))?,
                None => manager.get_thread(&id)?,
            }
            .ok_or_else(|| MemexError::NotFound(id.clone()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&thread)?);
            } else {
                print_thread(&thread);
            }
        }
        Commands::List {
            limit,
            offset,
            json,
        } => {
            let threads = manager.list_threads(limit, offset)?;
            print_summaries(&threads, json, "No threads found.")?;
        }
        Commands::Search {
            meta,
            content,
            json,
        } => {
            let query = SearchQuery {
                metadata: into_metadata(meta),
                content,
            };
            let threads = manager.search_threads(&query)?;
            print_summaries(&threads, json, "No matching threads found.")?;
        }
        Commands::Delete { id } => {
            if !manager.delete_thread(&id)? {
                return Err(MemexError::NotFound(id).into());
            }
            println!("{}", format!("Deleted thread {}", id).green());
        }
    }

    Ok(())
}

fn into_metadata(pairs: Vec<(String, Value)>) -> Metadata {
    pairs.into_iter().collect()
}

fn print_thread(thread: &Thread) {
    println!("\n{} {}", "Thread".bold(), thread.id.cyan());
    println!(
        "Created {}  Updated {}",
        thread.created_at.format("%Y-%m-%d %H:%M"),
        thread.updated_at.format("%Y-%m-%d %H:%M")
    );
    if !thread.metadata.is_empty() {
        println!("Metadata {}", Value::Object(thread.metadata.clone()));
    }
    println!();

    if thread.messages.is_empty() {
        println!("{}", "No messages.".yellow());
        return;
    }

    for message in &thread.messages {
        let text = message.text().unwrap_or_default();
        println!("[{}] {}", role_label(message.role), text);
        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                println!("    -> {}({})", call.function.name.cyan(), call.function.arguments);
            }
        }
    }
    println!();
}

fn role_label(role: Role) -> ColoredString {
    match role {
        Role::System | Role::Developer => role.as_str().magenta(),
        Role::User => role.as_str().green(),
        Role::Assistant => role.as_str().blue(),
        Role::Tool | Role::Function => role.as_str().yellow(),
    }
}

fn print_summaries(threads: &[Thread], json: bool, empty_message: &str) -> Result<()> {
    let summaries: Vec<ThreadSummary> = threads.iter().map(ThreadSummary::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("{}", empty_message.yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Preview".bold(),
        "Messages".bold(),
        "Last Updated".bold(),
        "Metadata".bold()
    ]);

    for summary in summaries {
        let preview = truncate(summary.preview.as_deref().unwrap_or("-"), 40);
        let metadata = if summary.metadata.is_empty() {
            "-".to_string()
        } else {
            truncate(&Value::Object(summary.metadata).to_string(), 30)
        };
        let updated = summary.updated_at.format("%Y-%m-%d %H:%M").to_string();

        table.add_row(prettytable::row![
            summary.id.cyan(),
            preview,
            summary.message_count,
            updated,
            metadata
        ]);
    }

    println!();
    table.printstd();
    println!();
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() > max_chars {
        let kept: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        single_line
    }
}
