//! Interactive conversation with a remote bot.
//!
//! Opens one conversation, prints every bot message as it is polled and
//! sends each line typed on stdin.

use std::io::Write;
use std::time::Duration;

use botline_config::{Config, UserConfig};
use botline_conversation::ConversationSession;
use botline_core::Activity;
use botline_directline::DirectLineClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};
use uuid::Uuid;

/// How long to wait for the handshake before giving up on the run.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// User id override
    pub user_id: Option<String>,
    /// User display name override
    pub user_name: Option<String>,
    /// Transport secret override
    pub secret: Option<String>,
    /// Transport base URL override
    pub base_url: Option<String>,
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Seconds to keep polling for replies in single-message mode
    pub reply_wait_secs: u64,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = resolve_config(&input)?;

        let user = UserConfig {
            id: input.user_id.or_else(|| config.user.id.clone()),
            name: input.user_name.unwrap_or_else(|| config.user.name.clone()),
        };
        let identity = user.identity(|| Uuid::now_v7().to_string());
        info!(
            "Chatting as '{}' (id: {})",
            identity.user_name, identity.user_id
        );

        let transport = DirectLineClient::new(config.transport.secret.clone())
            .with_base_url(config.transport.base_url.clone());
        let session = ConversationSession::new(transport, identity, config.session.clone());

        session.on_message(print_message);

        let (connected_tx, connected_rx) = oneshot::channel();
        session.when_connected(
            move || {
                let _ = connected_tx.send(());
            },
            None,
        );

        session.create();
        if !matches!(timeout(CONNECT_TIMEOUT, connected_rx).await, Ok(Ok(()))) {
            anyhow::bail!(
                "Could not open a conversation within {}s. Check the logs, the secret and the base URL.",
                CONNECT_TIMEOUT.as_secs()
            );
        }
        info!(
            "Conversation {} ready",
            session.conversation_id().unwrap_or_default()
        );

        if let Some(msg) = input.message {
            // Single message mode
            session.send_message(msg).await?;
            sleep(Duration::from_secs(input.reply_wait_secs)).await;
        } else {
            run_interactive(&session).await?;
        }

        session.stop_polling();
        Ok(())
    }
}

fn resolve_config(input: &ChatInput) -> anyhow::Result<Config> {
    let mut config = match &input.secret {
        Some(secret) => Config::load_with_secret(&Config::config_path()?, secret)?,
        None => Config::load()?,
    };

    if let Some(base_url) = &input.base_url {
        config.transport.base_url.clone_from(base_url);
    }
    Ok(config)
}

async fn run_interactive(session: &ConversationSession<DirectLineClient>) -> anyhow::Result<()> {
    println!("botline chat started. Type 'exit' to quit.\n");
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();

        if input == "exit" {
            break;
        }

        if !input.is_empty() {
            session.send_message(input);
        }
        prompt()?;
    }

    Ok(())
}

fn print_message(text: &str, activity: &Activity) {
    let sender = activity.from.name.as_deref().unwrap_or(&activity.from.id);
    println!("\n{sender}: {text}");
    if !activity.attachments.is_empty() {
        println!("  ({} attachment(s) not shown)", activity.attachments.len());
    }
    reprompt(&mut std::io::stdout());
}

fn prompt() -> std::io::Result<()> {
    write_prompt(&mut std::io::stdout())
}

/// Redraw the prompt from a callback, where there is no caller to report to.
fn reprompt(out: &mut impl Write) -> bool {
    match write_prompt(out) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to redraw prompt: {e}");
            false
        }
    }
}

fn write_prompt(out: &mut impl Write) -> std::io::Result<()> {
    write!(out, "> ")?;
    out.flush()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn prompt_is_written_and_flushed() {
        let mut out = Vec::new();
        assert!(reprompt(&mut out));
        assert_eq!(out, b"> ");
    }

    #[test]
    fn failed_prompt_is_reported_not_raised() {
        assert!(!reprompt(&mut ClosedPipe));
        assert!(write_prompt(&mut ClosedPipe).is_err());
    }
}
