//! Message Adaptation Layer
//!
//! This module decouples a transport's read/write pumps from the code that
//! handles a message. The transport hands every request to a
//! [`MessageHandler`] together with:
//!
//! - a response sender the handler may write zero or more messages to
//! - a [`Done`] signal that fires when the transport gives up on the request
//!
//! ## Architecture
//!
//! ```text
//!            ┌────────────── transport loop ──────────────┐
//!            │                                             │
//!  read ───> │ WsMessage ──> spawn(handle_request) ─┐      │
//!            │                                      │      │
//!            │   Canceller ─── done ────────────────┤      │
//!            │                                      ▼      │
//!  write <── │ <── mpsc::Receiver <── send_or_done(...)    │
//!            └─────────────────────────────────────────────┘
//! ```
//!
//! The adapter itself never spawns. Whether a request runs inline or on its
//! own task is the transport's decision.
//!
//! ## Cancellation Rules
//!
//! 1. `done` is one-shot: once signaled it stays signaled
//! 2. Every potentially blocking step races `done`
//! 3. Sends go through [`send_or_done`], which checks `done` first, so a
//!    handler whose `done` fired before its first send sends nothing
//!
//! ## Example
//!
//! ```
//! use needbot::transport::{done_channel, message_handler_fn, send_or_done, MessageHandler, WsMessage};
//! use tokio::sync::mpsc;
//!
//! # tokio_test::block_on(async {
//! let echo = message_handler_fn(|req: WsMessage, resp: mpsc::Sender<WsMessage>, done| async move {
//!     let _ = send_or_done(&resp, &done, req).await;
//! });
//!
//! let (tx, mut rx) = mpsc::channel(1);
//! let (_canceller, done) = done_channel();
//! echo.handle_request(WsMessage::text("ping"), tx, done).await;
//! assert_eq!(rx.recv().await.unwrap().as_text(), Some("ping"));
//! # });
//! ```

pub mod done;
pub mod handler;
pub mod message;

// Re-export commonly used types
pub use done::{done_channel, Canceller, Done};
pub use handler::{
    message_handler_fn, send_or_done, until_done, MessageHandler, MessageHandlerFn, SendAborted,
};
pub use message::{MessageKind, WsMessage};
