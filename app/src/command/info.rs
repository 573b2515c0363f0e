use botline_config::Config;

/// Strategy for displaying configuration information.
///
/// Prints the transport endpoint, the masked secret, the user identity and
/// the session timing settings.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== botline Configuration ===\n");

        println!("Transport:");
        println!("  Base URL: {}", config.transport.base_url);
        println!("  Secret: {}", mask_secret(&config.transport.secret));
        println!();

        println!("User:");
        match &config.user.id {
            Some(id) => println!("  Id: {id}"),
            None => println!("  Id: (not set - a new id is generated per run)"),
        }
        println!("  Name: {}", config.user.name);
        println!();

        let session = &config.session;
        println!("Session:");
        println!("  Poll Interval: {}ms", session.poll_interval().as_millis());
        println!("  Create Attempts: {}", session.create_attempts);
        println!("  Create Retry Delay: {}ms", session.create_retry_delay_ms);
        println!("  Max Retry Delay: {}ms", session.max_retry_delay_ms);
        println!("  Send Attempts: {}", session.send_attempts);
        println!("  Poll Attempts: {}", session.poll_attempts);
        println!(
            "  Restart Polling On Send: {}",
            session.restart_polling_on_send
        );

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}
