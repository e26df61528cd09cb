//! Terminal client for Tayori.
//!
//! Signs in against the REST API, keeps one WebSocket connection to the event
//! stream, and shows conversations, messages, typing indicators and presence.
//! The session token is kept in `<data-dir>/tayori.json` between runs.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tayori-client
//! cargo run --bin tayori-client -- --api-url http://127.0.0.1:3000/api --server-url ws://127.0.0.1:3000/ws
//! ```

use std::path::PathBuf;

use clap::Parser;

use tayori_client::{
    config::{ClientConfig, DEFAULT_API_URL, DEFAULT_SERVER_URL},
    ui::repl,
    usecase::Session,
};
use tayori_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "tayori-client")]
#[command(about = "Terminal client for the Tayori real-time messaging service", long_about = None)]
struct Args {
    /// WebSocket event stream URL
    #[arg(short = 's', long, default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// REST API base URL
    #[arg(short = 'a', long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Directory for the local state file
    #[arg(short = 'd', long, default_value = ".")]
    data_dir: PathBuf,

    /// Messages fetched per page when opening a conversation
    #[arg(long, default_value_t = 50)]
    page_size: u32,

    /// Maximum transport reconnect attempts
    #[arg(long, default_value_t = 5)]
    max_reconnect_attempts: u32,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        let mut config = ClientConfig {
            server_url: args.server_url,
            api_url: args.api_url,
            data_dir: args.data_dir,
            page_size: args.page_size,
            ..ClientConfig::default()
        };
        config.reconnect.max_attempts = args.max_reconnect_attempts;
        config
    }
}

async fn run(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Using API {} and event stream {}",
        config.api_url,
        config.server_url
    );
    let session = Session::open(&config)?;
    repl::run(session).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = ClientConfig::from(Args::parse());

    if let Err(e) = run(config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
