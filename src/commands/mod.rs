//! Command Dispatch Module
//!
//! This module implements the command layer of needbot. It receives chat
//! lines with the bot prefix already stripped, routes them through a tree of
//! dispatchers and runs the selected leaf against the storage collaborator.
//!
//! ## Architecture
//!
//! ```text
//! Chat line ("need item Bob sword 3")
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  root           │  tokens: "", help, need, char
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  need           │  tokens: "", help, item, pts
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  per-caller     │  tokens: "", <character names>
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  leaf handler   │──> storage transaction
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `need item <charname> <item name> [count]`
//! - `need pts <charname> <skill name> [count]`
//! - `char create <name>` / `char delete <name>`
//! - `char show <name>` / `char list`
//! - `help` at every level, or an empty line at any level

pub mod character;
pub mod error;
pub mod handler;
pub mod help;
pub mod need;
pub mod root;

// Re-export the dispatch core
pub use error::{parse_count, CommandError, GENERIC_FAILURE};
pub use handler::{line_handler_fn, CommandHandler, CommandHandlerOptions, LineHandler, LineHandlerFn};
pub use root::root_handler;
