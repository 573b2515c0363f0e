use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

// Session knobs live in botline_core so the session never depends on this crate
use botline_core::{Identity, SessionConfig};

pub const CONFIG_DIR_NAME: &str = "botline";

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub transport: TransportConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "TransportConfig::default_base_url")]
    pub base_url: String,
    pub secret: String,
}

impl TransportConfig {
    fn default_base_url() -> String {
        "https://directline.botframework.com/v3/directline".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UserConfig {
    /// Fixed user id; when absent the caller picks one per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "UserConfig::default_name")]
    pub name: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: Self::default_name(),
        }
    }
}

impl UserConfig {
    fn default_name() -> String {
        "user".to_string()
    }

    /// Identity for a session, using `fallback_id` when no id is configured.
    #[must_use]
    pub fn identity(&self, fallback_id: impl FnOnce() -> String) -> Identity {
        Identity::new(
            self.id.clone().unwrap_or_else(fallback_id),
            self.name.clone(),
        )
    }
}

impl Config {
    /// Config with every default and just a secret, for runs without a file.
    #[must_use]
    pub fn with_secret(secret: String) -> Self {
        Self {
            transport: TransportConfig {
                base_url: TransportConfig::default_base_url(),
                secret,
            },
            user: UserConfig::default(),
            session: SessionConfig::default(),
        }
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR_NAME))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'botline init' to create config.",
                config_path.display()
            );
        }

        let config = Self::read(config_path)?;
        if config.transport.secret.trim().is_empty() {
            anyhow::bail!(
                "No transport secret configured in {}. Set \"transport.secret\".",
                config_path.display()
            );
        }
        Ok(config)
    }

    /// Load the config with `secret` taking precedence over the stored one.
    ///
    /// A missing file falls back to defaults. A file that exists but cannot
    /// be read or parsed is still an error.
    pub fn load_with_secret(config_path: &Path, secret: &str) -> anyhow::Result<Self> {
        if !config_path.exists() {
            info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::with_secret(secret.to_string()));
        }

        let mut config = Self::read(config_path)?;
        secret.clone_into(&mut config.transport.secret);
        Ok(config)
    }

    fn read(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Invalid config file {}: {e}", config_path.display())
        })?;

        info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        Self::write_template(&config_path)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the config file and add your Direct Line secret");
        println!("   2. Optionally pin \"user.id\" so the bot recognises you across runs");
        println!("   3. Run 'botline chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - transport.base_url: Direct Line endpoint");
        println!("   - session.poll_interval_ms: How often to fetch new activities");
        println!("   - session.create_attempts: Handshake attempts before giving up");
        println!();
        Ok(())
    }

    /// Write the starter config, refusing to overwrite an existing file.
    pub fn write_template(config_path: &Path) -> anyhow::Result<()> {
        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        let config_template = r#"{
  "transport": {
    "base_url": "https://directline.botframework.com/v3/directline",
    "secret": "your-direct-line-secret-here"
  },
  "user": {
    "name": "user"
  },
  "session": {
    "poll_interval_ms": 1000,
    "create_attempts": 3,
    "create_retry_delay_ms": 0,
    "max_retry_delay_ms": 2000,
    "send_attempts": 1,
    "poll_attempts": 1,
    "restart_polling_on_send": false
  }
}"#;

        std::fs::write(config_path, config_template)?;
        Ok(())
    }
}
