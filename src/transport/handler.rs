//! The MessageHandler Capability
//!
//! A [`MessageHandler`] turns one request into zero or more responses. It
//! returns nothing: the transport learns about progress only through the
//! response channel, and stops caring once it signals `done`.

use crate::transport::done::Done;
use crate::transport::message::WsMessage;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

/// Why a response was not delivered.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendAborted {
    /// `done` fired before the send completed
    #[error("request cancelled")]
    Cancelled,

    /// The transport dropped the receiving end
    #[error("response channel closed")]
    Closed,
}

/// Handles one transport request.
///
/// Implementations must race every potentially blocking step against
/// `done` and must stop sending once it fires. [`send_or_done`] and
/// [`until_done`] do the racing.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle_request(
        &self,
        request: WsMessage,
        response: mpsc::Sender<WsMessage>,
        done: Done,
    ) -> impl Future<Output = ()> + Send;
}

/// Adapts an async function into a [`MessageHandler`].
#[derive(Debug, Clone)]
pub struct MessageHandlerFn<F> {
    f: F,
}

impl<F, Fut> MessageHandler for MessageHandlerFn<F>
where
    F: Fn(WsMessage, mpsc::Sender<WsMessage>, Done) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    fn handle_request(
        &self,
        request: WsMessage,
        response: mpsc::Sender<WsMessage>,
        done: Done,
    ) -> impl Future<Output = ()> + Send {
        (self.f)(request, response, done)
    }
}

/// Wraps `f` as a [`MessageHandler`]. The wrapper adds no concurrency.
pub fn message_handler_fn<F, Fut>(f: F) -> MessageHandlerFn<F>
where
    F: Fn(WsMessage, mpsc::Sender<WsMessage>, Done) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    MessageHandlerFn { f }
}

/// Sends `message` unless `done` fires first.
///
/// `done` is checked before anything else, so a request cancelled before
/// its first send never writes to `response`.
pub async fn send_or_done(
    response: &mpsc::Sender<WsMessage>,
    done: &Done,
    message: WsMessage,
) -> Result<(), SendAborted> {
    if done.is_done() {
        return Err(SendAborted::Cancelled);
    }

    tokio::select! {
        biased;
        _ = done.cancelled() => Err(SendAborted::Cancelled),
        result = response.send(message) => result.map_err(|_| SendAborted::Closed),
    }
}

/// Runs `fut` to completion unless `done` fires first.
pub async fn until_done<F>(done: &Done, fut: F) -> Option<F::Output>
where
    F: Future,
{
    if done.is_done() {
        return None;
    }

    tokio::select! {
        biased;
        _ = done.cancelled() => None,
        output = fut => Some(output),
    }
}
