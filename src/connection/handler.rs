//! Connection Handler Module
//!
//! This module handles individual client connections. Each connection runs a
//! read pump, a write pump and one task per in-flight request.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler created, write pump spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Read Pump               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split complete lines    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │      ┌─────────────────┐
//!    │  │ Spawn handle_request    │─┼─────>│ Write Pump      │
//!    │  └───────────┬─────────────┘ │ mpsc │ (response chan) │
//!    │              │               │      └─────────────────┘
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error
//!        │
//!        ▼
//! 5. In-flight requests get `shutdown_grace` to finish, then `done` fires
//!    and stragglers are aborted. The write pump drains and exits.
//! ```
//!
//! ## Buffer Management
//!
//! Incoming bytes accumulate in a `BytesMut` until a `\n` arrives. A client
//! that sends more than `max_line_length` bytes without a newline is
//! disconnected.

use crate::transport::{done_channel, Canceller, MessageHandler, MessageKind, WsMessage};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Default limit for a single request line (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Per-connection tuning.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Capacity of the response channel between handlers and the write pump
    pub response_buffer: usize,

    /// How long in-flight requests may run after the client goes away
    pub shutdown_grace: Duration,

    /// Longest accepted request line in bytes
    pub max_line_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            response_buffer: 32,
            shutdown_grace: Duration::from_secs(2),
            max_line_length: MAX_LINE_LENGTH,
        }
    }
}

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total request lines received
    pub messages_received: AtomicU64,
    /// Total responses written
    pub responses_sent: AtomicU64,
    /// Requests still running when their connection shut down
    pub requests_cancelled: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_sent(&self, bytes: usize) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn requests_cancelled(&self, count: usize) {
        self.requests_cancelled
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler<H> {
    /// Read half of the TCP stream
    reader: OwnedReadHalf,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Request handler (shared across connections)
    handler: Arc<H>,

    /// Sender side of the response channel, cloned into every request
    response_tx: mpsc::Sender<WsMessage>,

    /// Fires `done` for every request of this connection
    canceller: Canceller,

    /// In-flight requests
    tasks: JoinSet<()>,

    /// The write pump
    writer: JoinHandle<std::io::Result<()>>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    config: ConnectionConfig,
}

enum Event {
    Read(usize),
    Finished(Result<(), JoinError>),
}

impl<H: MessageHandler> ConnectionHandler<H> {
    /// Creates a new connection handler and starts its write pump.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `handler` - The handler invoked for every request line
    /// * `stats` - Shared connection statistics
    /// * `config` - Buffer sizes and shutdown timing
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<H>,
        stats: Arc<ConnectionStats>,
        config: ConnectionConfig,
    ) -> Self {
        stats.connection_opened();

        let (reader, writer) = stream.into_split();
        let (response_tx, response_rx) = mpsc::channel(config.response_buffer.max(1));
        let (canceller, _) = done_channel();

        let writer = tokio::spawn(write_pump(
            BufWriter::new(writer),
            response_rx,
            Arc::clone(&stats),
            addr,
        ));

        Self {
            reader,
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            handler,
            response_tx,
            canceller,
            tasks: JoinSet::new(),
            writer,
            stats,
            config,
        }
    }

    /// Runs the connection until the client disconnects or an error occurs,
    /// then shuts down its requests and write pump.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        let graceful = matches!(result, Ok(()) | Err(ConnectionError::ClientDisconnected));
        self.shutdown(graceful).await;
        self.stats.connection_closed();
        result
    }

    /// The read-dispatch loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(line) = self.try_parse_line()? {
                self.dispatch(line);
            }

            self.read_more_data().await?;
        }
    }

    /// Takes one complete line out of the buffer.
    fn try_parse_line(&mut self) -> Result<Option<WsMessage>, ConnectionError> {
        loop {
            let newline = self.buffer.iter().position(|&b| b == b'\n');

            // Terminated or not, a line may not outgrow the limit
            let size = newline.unwrap_or(self.buffer.len());
            if size > self.config.max_line_length {
                error!(client = %self.addr, size, "Line length limit exceeded");
                return Err(ConnectionError::LineTooLong {
                    size,
                    max: self.config.max_line_length,
                });
            }

            let Some(pos) = newline else {
                return Ok(None);
            };

            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }

            trace!(client = %self.addr, len = line.len(), remaining = self.buffer.len(), "Parsed line");

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Ok(Some(WsMessage::new(MessageKind::Text, line.freeze())));
        }
    }

    /// Starts a task for one request.
    fn dispatch(&mut self, request: WsMessage) {
        self.stats.message_received();

        let handler = Arc::clone(&self.handler);
        let response = self.response_tx.clone();
        let done = self.canceller.subscribe();

        self.tasks.spawn(async move {
            handler.handle_request(request, response, done).await;
        });
    }

    /// Reads more data from the socket, reaping finished requests meanwhile.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let event = tokio::select! {
            n = self.reader.read_buf(&mut self.buffer) => Event::Read(n?),
            Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => Event::Finished(joined),
        };

        match event {
            Event::Finished(joined) => {
                self.reap(joined);
                Ok(())
            }
            Event::Read(0) => {
                if !self.buffer.is_empty() {
                    // Final line without a trailing newline
                    let rest = self.buffer.split().freeze();
                    if !rest.iter().all(u8::is_ascii_whitespace) {
                        self.dispatch(WsMessage::new(MessageKind::Text, rest));
                    }
                }
                Err(ConnectionError::ClientDisconnected)
            }
            Event::Read(n) => {
                self.stats.bytes_read(n);
                trace!(client = %self.addr, bytes = n, "Read data");
                Ok(())
            }
        }
    }

    fn reap(&self, joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            if e.is_panic() {
                error!(client = %self.addr, "Request task panicked");
            }
        }
    }

    /// Winds down requests and the write pump.
    async fn shutdown(&mut self, graceful: bool) {
        let grace = self.config.shutdown_grace;

        if graceful {
            self.drain(grace).await;
        }

        let abandoned = self.tasks.len();
        if abandoned > 0 {
            debug!(client = %self.addr, abandoned, "Cancelling in-flight requests");
            self.stats.requests_cancelled(abandoned);
        }

        self.canceller.cancel();
        self.drain(grace).await;
        self.tasks.shutdown().await;

        // Closing the last sender lets the write pump finish its queue
        let (closed_tx, _) = mpsc::channel(1);
        drop(std::mem::replace(&mut self.response_tx, closed_tx));

        match tokio::time::timeout(grace, &mut self.writer).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => debug!(client = %self.addr, error = %e, "Write pump failed"),
            Ok(Err(e)) => error!(client = %self.addr, error = %e, "Write pump task failed"),
            Err(_) => {
                warn!(client = %self.addr, "Write pump did not drain in time");
                self.writer.abort();
            }
        }
    }

    /// Waits up to `grace` for in-flight requests to finish.
    async fn drain(&mut self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        while !self.tasks.is_empty() {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(joined)) => self.reap(joined),
                Ok(None) | Err(_) => break,
            }
        }
    }
}

/// Writes responses to the socket until every sender is gone.
async fn write_pump(
    mut writer: BufWriter<OwnedWriteHalf>,
    mut responses: mpsc::Receiver<WsMessage>,
    stats: Arc<ConnectionStats>,
    addr: SocketAddr,
) -> std::io::Result<()> {
    while let Some(response) = responses.recv().await {
        if response.kind == MessageKind::Close {
            debug!(client = %addr, "Close requested by handler");
            break;
        }

        let mut written = response.len();
        writer.write_all(&response.contents).await?;
        if !response.contents.ends_with(b"\n") {
            writer.write_all(b"\n").await?;
            written += 1;
        }
        writer.flush().await?;

        stats.response_sent(written);
        trace!(client = %addr, bytes = written, "Sent response");
    }

    writer.shutdown().await
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// A request line exceeded the configured limit
    #[error("Line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<H: MessageHandler>(
    stream: TcpStream,
    addr: SocketAddr,
    handler: Arc<H>,
    stats: Arc<ConnectionStats>,
    config: ConnectionConfig,
) {
    let connection = ConnectionHandler::new(stream, addr, handler, stats, config);
    if let Err(e) = connection.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
