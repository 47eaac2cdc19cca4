//! Tidings CLI entry point.
//!
//! # Usage
//!
//! ```bash
//! # Local development server
//! tidings --user alice
//!
//! # Remote server with a token from the environment
//! TIDINGS_TOKEN=... tidings --endpoint wss://chat.example.com/ws --user alice
//! ```

use clap::Parser;
use tidings_app::{Runtime, SystemEnv, websocket::WebSocketTransport};
use tidings_cli::{Args, Output, Shell};
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout belongs to the chat
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = args.config();
    config.validate()?;

    tracing::info!(user_id = %config.user_id, "tidings starting");

    let (runtime, handle) = Runtime::new(&config, SystemEnv::new(), WebSocketTransport::new())?;
    let session = tokio::spawn(runtime.run());

    handle.start().await?;

    let output = Output::new(std::io::stdout(), config.user_id.clone());
    let result = Shell::new(handle.clone(), output).run(BufReader::new(tokio::io::stdin())).await;

    // Runtime may already be gone if the shell stopped because of it
    let _ = handle.shutdown().await;
    session.await?;

    result?;
    Ok(())
}
