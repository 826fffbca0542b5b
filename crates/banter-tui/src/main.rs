use clap::Parser;
use tracing_subscriber::EnvFilter;

mod client;
mod tui;

#[derive(Parser)]
#[command(name = "banter")]
#[command(about = "Terminal client for banter chat rooms", long_about = None)]
struct Cli {
    /// WebSocket server URL
    #[arg(
        short,
        long,
        env = "CHAT_SERVER_URL",
        default_value = "ws://127.0.0.1:8080"
    )]
    server: String,

    /// Discard any cached session instead of resuming it
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Only log when asked to: stderr output would bleed into the
    // alternate screen.
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = client::start_client(&cli.server, cli.fresh).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
