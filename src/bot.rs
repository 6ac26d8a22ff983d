//! Chat bot glue.
//!
//! [`BotHandler`] is the [`MessageHandler`] that connects the transport to
//! the command tree. Each request is one chat line, `"<author> <content>"`.
//! Lines whose content does not start with the bot prefix are chatter and get
//! no response; everything else is dispatched and answered exactly once.
//!
//! Cancellation is honored up to the moment a command starts executing. A
//! command that is already running finishes (and may commit) even if its
//! request is cancelled meanwhile; only its response is dropped.

use crate::commands::{CommandError, CommandHandler, GENERIC_FAILURE};
use crate::transport::{send_or_done, until_done, Done, MessageHandler, WsMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// Routes prefixed chat lines into a command tree.
#[derive(Debug, Clone)]
pub struct BotHandler {
    root: Arc<CommandHandler<'static>>,
    prefix: String,
}

impl BotHandler {
    pub fn new(root: Arc<CommandHandler<'static>>, prefix: impl Into<String>) -> Self {
        Self {
            root,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Runs one command line and renders the outcome as chat text.
    ///
    /// Returns `None` if `done` fired first.
    async fn run_command(&self, author: &str, line: &str, done: &Done) -> Option<String> {
        let root = Arc::clone(&self.root);
        let caller = author.to_string();
        let args = line.to_string();

        // The dispatch chain blocks inside storage calls
        let job_done = done.clone();
        let job = tokio::task::spawn_blocking(move || {
            dispatch_unless_done(&root, &job_done, &caller, &args)
        });

        let reply = match until_done(done, job).await? {
            Ok(None) => return None,
            Ok(Some(Ok(text))) => text,
            Ok(Some(Err(e))) if e.is_internal() => {
                error!(author, line, error = %e, "Command failed");
                e.user_message()
            }
            Ok(Some(Err(e))) => {
                debug!(author, line, error = %e, "Command rejected");
                e.user_message()
            }
            Err(e) => {
                error!(author, line, error = %e, "Command task failed");
                GENERIC_FAILURE.to_string()
            }
        };

        Some(reply)
    }
}

/// Runs `args` through `root` unless the request was cancelled while the
/// job waited for a blocking thread.
fn dispatch_unless_done(
    root: &CommandHandler<'_>,
    done: &Done,
    caller: &str,
    args: &str,
) -> Option<Result<String, CommandError>> {
    if done.is_done() {
        trace!(caller, "Skipping cancelled command");
        return None;
    }
    Some(root.handle_line(caller, args))
}

/// Splits a request into author and content.
fn decode(request: &WsMessage) -> Option<(&str, &str)> {
    let (author, content) = request.as_text()?.trim().split_once(char::is_whitespace)?;
    Some((author, content.trim_start()))
}

impl MessageHandler for BotHandler {
    async fn handle_request(
        &self,
        request: WsMessage,
        response: mpsc::Sender<WsMessage>,
        done: Done,
    ) {
        let Some((author, content)) = decode(&request) else {
            debug!(kind = ?request.kind, len = request.len(), "Ignoring malformed request");
            return;
        };

        let Some(line) = content.strip_prefix(self.prefix.as_str()) else {
            trace!(author, "Ignoring chatter");
            return;
        };

        if done.is_done() {
            return;
        }

        let Some(reply) = self.run_command(author, line, &done).await else {
            debug!(author, line, "Request cancelled before completion");
            return;
        };

        if let Err(e) = send_or_done(&response, &done, WsMessage::text(reply)).await {
            debug!(author, reason = %e, "Response dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::root_handler;
    use crate::storage::{MemoryStore, StorageError, Transaction, UserApi};
    use crate::transport::done_channel;
    use tokio::sync::mpsc::error::TryRecvError;

    struct OfflineApi;

    impl UserApi for OfflineApi {
        fn new_transaction(
            &self,
            _writable: bool,
        ) -> Result<Box<dyn Transaction + '_>, StorageError> {
            Err(StorageError::Unavailable("database offline".to_string()))
        }
    }

    fn bot(api: Arc<dyn UserApi>) -> BotHandler {
        BotHandler::new(Arc::new(root_handler(api, "!")), "!")
    }

    /// Runs one request and collects every response.
    async fn ask(bot: &BotHandler, line: WsMessage) -> Vec<String> {
        let (tx, mut rx) = mpsc::channel(4);
        let (_canceller, done) = done_channel();

        bot.handle_request(line, tx, done).await;

        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg.as_text().unwrap().to_string());
        }
        out
    }

    #[tokio::test]
    async fn test_prefixed_command_is_answered() {
        let store = Arc::new(MemoryStore::new());
        let bot = bot(store.clone());

        assert_eq!(
            ask(&bot, WsMessage::text("alice !char create Bob")).await,
            vec!["created character Bob".to_string()]
        );
        assert_eq!(
            ask(&bot, WsMessage::text("alice   !need item Bob sword 3")).await,
            vec!["marked Bob as needing +3 of sword".to_string()]
        );

        let user = store.user("alice").unwrap().unwrap();
        assert_eq!(user.character("Bob").unwrap().needed_items().get("sword"), Some(&3));
    }

    #[tokio::test]
    async fn test_chatter_and_malformed_requests_are_ignored() {
        let bot = bot(Arc::new(MemoryStore::new()));

        assert!(ask(&bot, WsMessage::text("alice hello everyone")).await.is_empty());
        assert!(ask(&bot, WsMessage::text("alice")).await.is_empty());
        assert!(ask(&bot, WsMessage::text("")).await.is_empty());
        assert!(ask(&bot, WsMessage::binary(&b"alice !help"[..])).await.is_empty());
    }

    #[tokio::test]
    async fn test_user_errors_are_explained() {
        let bot = bot(Arc::new(MemoryStore::new()));

        assert_eq!(
            ask(&bot, WsMessage::text("alice !dance")).await,
            vec!["unknown command 'dance' (usage: ![command])".to_string()]
        );
        assert_eq!(
            ask(&bot, WsMessage::text("alice !char create")).await,
            vec!["character name required".to_string()]
        );
    }

    #[tokio::test]
    async fn test_internal_errors_are_generic() {
        let bot = bot(Arc::new(OfflineApi));

        assert_eq!(
            ask(&bot, WsMessage::text("alice !char create Bob")).await,
            vec![GENERIC_FAILURE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_cancelled_request_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let bot = bot(store.clone());
        let (tx, mut rx) = mpsc::channel(4);
        let (canceller, done) = done_channel();

        canceller.cancel();
        bot.handle_request(WsMessage::text("alice !char create Bob"), tx, done)
            .await;

        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Disconnected);
        assert!(store.user("alice").unwrap().is_none());
    }

    #[test]
    fn test_cancelled_command_never_starts() {
        let store = Arc::new(MemoryStore::new());
        let root = root_handler(store.clone(), "!");
        let (canceller, done) = done_channel();

        canceller.cancel();

        assert_eq!(dispatch_unless_done(&root, &done, "alice", "char create Bob"), None);
        assert!(store.user("alice").unwrap().is_none());
        assert_eq!(store.stats().transactions, 0);
    }

    #[tokio::test]
    async fn test_running_command_completes_after_cancel() {
        use crate::commands::{line_handler_fn, CommandHandlerOptions};
        use crate::parser::{Parser, ParserOptions};
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Barrier;
        use std::time::Duration;

        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let applied = Arc::new(AtomicU64::new(0));

        let mut root = CommandHandler::new(
            Parser::new(ParserOptions::new(' ', ["slow"])),
            CommandHandlerOptions::new("!", "command"),
        );
        {
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            let applied = Arc::clone(&applied);
            root.set_handler(
                "slow",
                line_handler_fn(move |_: &str, _: &str| {
                    started.wait();
                    release.wait();
                    applied.fetch_add(1, Ordering::SeqCst);
                    Ok("finished".to_string())
                }),
            );
        }

        let bot = Arc::new(BotHandler::new(Arc::new(root), "!"));
        let (tx, mut rx) = mpsc::channel(4);
        let (canceller, done) = done_channel();

        let request = {
            let bot = Arc::clone(&bot);
            tokio::spawn(async move {
                bot.handle_request(WsMessage::text("alice !slow"), tx, done)
                    .await;
            })
        };

        let barrier = Arc::clone(&started);
        tokio::task::spawn_blocking(move || barrier.wait()).await.unwrap();

        canceller.cancel();
        request.await.unwrap();

        let barrier = Arc::clone(&release);
        tokio::task::spawn_blocking(move || barrier.wait()).await.unwrap();

        for _ in 0..100 {
            if applied.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(applied.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Disconnected);
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let store: Arc<dyn UserApi> = Arc::new(MemoryStore::new());
        let bot = BotHandler::new(Arc::new(root_handler(store, "?")), "?");

        assert_eq!(bot.prefix(), "?");
        assert!(ask(&bot, WsMessage::text("alice !help")).await.is_empty());
        assert_eq!(
            ask(&bot, WsMessage::text("alice ?help")).await,
            vec!["Usage: ?[command] [args...]\n\nAvailable commands:\n  char\n  need\n".to_string()]
        );
    }

    #[tokio::test]
    async fn test_over_tcp() {
        use crate::connection::{handle_connection, ConnectionConfig, ConnectionStats};
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::{TcpListener, TcpStream};

        let store = Arc::new(MemoryStore::new());
        let handler = Arc::new(bot(store.clone()));
        let stats = Arc::new(ConnectionStats::new());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_connection(stream, peer, handler, stats, ConnectionConfig::default()).await;
        });

        let client = TcpStream::connect(addr).await.unwrap();
        let (read, mut write) = client.into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"alice !char create Bob\n").await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("created character Bob")
        );

        write
            .write_all(b"bob just chatting\nalice !need item Bob sword 3\n")
            .await
            .unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("marked Bob as needing +3 of sword")
        );
    }
}
