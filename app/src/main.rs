#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;

use command::{
    ChatInput, ChatStrategy, CommandStrategy, InfoStrategy, InitStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "botline")]
#[command(about = "Chat with a remote bot over a REST conversation transport", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a conversation and chat interactively
    Chat {
        /// User id to present to the bot (defaults to config, then a fresh UUID)
        #[arg(short = 'u', long)]
        user_id: Option<String>,

        /// Display name for the local user
        #[arg(short = 'n', long)]
        user_name: Option<String>,

        /// Transport secret (overrides config)
        #[arg(short = 's', long)]
        secret: Option<String>,

        /// Transport base URL (overrides config)
        #[arg(short = 'b', long)]
        base_url: Option<String>,

        /// Send a single message, print replies for a while, then exit
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// Seconds to wait for replies in single-message mode
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            user_id,
            user_name,
            secret,
            base_url,
            message,
            wait,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    user_id,
                    user_name,
                    secret,
                    base_url,
                    message,
                    reply_wait_secs: wait,
                })
                .await?;
        }
        Commands::Init => InitStrategy.execute(()).await?,
        Commands::Info => InfoStrategy.execute(()).await?,
        Commands::Version => VersionStrategy.execute(()).await?,
    }

    Ok(())
}
