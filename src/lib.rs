//! # needbot - A Chat Bot for Tracking What Characters Still Need
//!
//! needbot reads chat lines, picks out the ones addressed to it by a command
//! prefix, and records which items and skill points each player's characters
//! still need.
//!
//! ## Features
//!
//! - **Command Tree**: nested dispatchers, each with its own whitelist and help
//! - **Per-Caller Routing**: character names are resolved for the caller only
//! - **Transactional Storage**: every mutation commits atomically or not at all
//! - **Cancellation**: a client that goes away never receives stale responses
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              needbot                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│ BotHandler  │                  │
//! │  │ (Listener)  │    │  (lines)    │    │ (prefix)    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │ spawn_blocking          │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Parser    │<───│            CommandHandler tree               │   │
//! │  │ (tokenizer) │    │   root ──> need ──> item/pts ──> charname    │   │
//! │  └─────────────┘    │        └─> char ──> create/delete/show/list  │   │
//! │                     └───────────────────────┬──────────────────────┘   │
//! │                                             │                           │
//! │                                             ▼                           │
//! │                     ┌──────────────────────────────────────────────┐   │
//! │                     │         UserApi (MemoryStore)                │   │
//! │                     │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │                     │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use needbot::commands::root_handler;
//! use needbot::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use needbot::storage::MemoryStore;
//! use needbot::BotHandler;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let root = Arc::new(root_handler(store, "!"));
//!     let bot = Arc::new(BotHandler::new(root, "!"));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:7878").await?;
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         tokio::spawn(handle_connection(
//!             stream,
//!             addr,
//!             Arc::clone(&bot),
//!             Arc::clone(&stats),
//!             ConnectionConfig::default(),
//!         ));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! Every line is `"<author> <content>"`; commands start with the prefix.
//!
//! - `!need item <charname> <item name> [count]`
//! - `!need pts <charname> <skill name> [count]`
//! - `!char create <name>` / `!char delete <name>`
//! - `!char show <name>` / `!char list`
//! - `!help`, or just `!`, at any level
//!
//! ## Module Overview
//!
//! - [`parser`]: command tokenizer and count suffix extraction
//! - [`commands`]: dispatcher tree and leaf handlers
//! - [`storage`]: user/character model, transaction API, in-memory backend
//! - [`transport`]: message handler capability and cancellation
//! - [`connection`]: line-oriented TCP transport
//! - [`bot`]: glue between transport and command tree

pub mod bot;
pub mod commands;
pub mod connection;
pub mod parser;
pub mod storage;
pub mod transport;

// Re-export commonly used types for convenience
pub use bot::BotHandler;
pub use commands::{root_handler, CommandError, CommandHandler};
pub use connection::{handle_connection, ConnectionConfig, ConnectionStats};
pub use storage::{MemoryStore, UserApi};
pub use transport::{MessageHandler, WsMessage};

/// The default port needbot listens on
pub const DEFAULT_PORT: u16 = 7878;

/// The default host needbot binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default command prefix
pub const DEFAULT_PREFIX: &str = "!";

/// Version of needbot
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
