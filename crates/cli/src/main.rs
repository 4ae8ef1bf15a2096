//! StreamBot CLI — the main entry point.
//!
//! Commands:
//! - `chat`     — Single-message or interactive streaming chat
//! - `history`  — Show a user's stored conversation turns
//! - `init`     — Write the default config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "streambot",
    about = "StreamBot — streaming LLM chat with tool use",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the model
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// User id the conversation is stored under
        #[arg(short, long, default_value = "local_user", env = "STREAMBOT_USER")]
        user: String,

        /// Print usage metrics (Prometheus text format) when done
        #[arg(long)]
        metrics: bool,
    },

    /// Show stored conversation history
    History {
        #[arg(short, long, default_value = "local_user", env = "STREAMBOT_USER")]
        user: String,

        /// Number of most recent turns to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Write the default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with streamed answers
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { message, user, metrics } => commands::chat::run(message, user, metrics).await?,
        Commands::History { user, limit } => commands::history::run(&user, limit).await?,
        Commands::Init => commands::init::run().await?,
    }

    Ok(())
}
