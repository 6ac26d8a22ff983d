//! Connection Module
//!
//! This module is the line transport of needbot. Each accepted TCP client is
//! served by its own [`ConnectionHandler`]; every line the client sends
//! becomes a [`WsMessage`](crate::transport::WsMessage) handed to a
//! [`MessageHandler`](crate::transport::MessageHandler) on its own task.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read lines  │───>│ Spawn task  │───>│ Write pump  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                            │                                │
//! │                      done (Canceller)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Non-blocking pumps**: a slow request never stalls reading or writing
//! - **Backpressure**: the response channel is bounded
//! - **No leaks**: disconnects cancel in-flight requests
//! - **Statistics**: tracks connection and message metrics

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionConfig, ConnectionError, ConnectionHandler, ConnectionStats,
    MAX_LINE_LENGTH,
};
