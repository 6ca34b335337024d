/*!
Command handlers for the CLI

Each handler builds nothing itself: it receives a ready
[`HistoryManager`](crate::history::HistoryManager) and renders results to
stdout, as colored tables or as JSON for downstream tooling.
*/

pub mod threads;

pub use threads::run;
