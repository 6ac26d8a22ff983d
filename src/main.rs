//! needbot - A Chat Bot for Tracking What Characters Still Need
//!
//! This is the main entry point for the needbot server.
//! It sets up the TCP listener, the command tree and the storage backend.

use clap::Parser;
use needbot::commands::root_handler;
use needbot::connection::{handle_connection, ConnectionConfig, ConnectionStats};
use needbot::storage::MemoryStore;
use needbot::BotHandler;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Server configuration
#[derive(Parser, Debug)]
#[command(name = "needbot", version, about, long_about = None)]
struct Config {
    /// Host to bind to
    #[arg(long, default_value = needbot::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = needbot::DEFAULT_PORT)]
    port: u16,

    /// Prefix that marks a chat line as a command
    #[arg(long, default_value = needbot::DEFAULT_PREFIX)]
    prefix: String,

    /// Responses buffered per connection before handlers wait
    #[arg(long, default_value_t = 32)]
    response_buffer: usize,

    /// Time in-flight requests get after a client disconnects
    #[arg(long, default_value_t = 2000)]
    shutdown_grace_ms: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            response_buffer: self.response_buffer,
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            ..Default::default()
        }
    }
}

fn print_banner(config: &Config) {
    println!(
        r#"
needbot v{} - tracking what your characters still need
──────────────────────────────────────────────────────────────
Listening on {}
Commands start with '{}', e.g. "alice {}need item Bob sword 3"

Use Ctrl+C to shutdown gracefully.
"#,
        needbot::VERSION,
        config.bind_address(),
        config.prefix,
        config.prefix,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::parse();

    // Set up logging; RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    // Storage and command tree (shared across all connections)
    let store = Arc::new(MemoryStore::new());
    let root = Arc::new(root_handler(store.clone(), &config.prefix));
    let bot = Arc::new(BotHandler::new(root, config.prefix.clone()));
    info!(prefix = %config.prefix, "Command tree initialized");

    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, bot, Arc::clone(&stats), config.connection_config()) => {}
        result = signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, stopping server...");
        }
    }

    let store_stats = store.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        messages = stats.messages_received.load(Ordering::Relaxed),
        responses = stats.responses_sent.load(Ordering::Relaxed),
        users = store_stats.users,
        commits = store_stats.commits,
        conflicts = store_stats.conflicts,
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    bot: Arc<BotHandler>,
    stats: Arc<ConnectionStats>,
    config: ConnectionConfig,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let bot = Arc::clone(&bot);
                let stats = Arc::clone(&stats);
                let config = config.clone();

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, bot, stats, config).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
