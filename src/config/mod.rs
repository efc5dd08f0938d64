use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GitHubAppConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Parent directory for per-delivery clones and captured payloads.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            work_dir: default_work_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// GitHub App credentials. All fields are required; a config file that
/// omits any of them fails to load.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAppConfig {
    /// The numeric GitHub App ID.
    pub app_id: i64,
    /// Path to the app's private key in PEM format.
    pub private_key_path: PathBuf,
    /// Shared secret for verifying webhook signatures (HMAC-SHA256).
    pub webhook_secret: String,
    /// GitHub API base URL. Override for GitHub Enterprise Server.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Pull request actions that trigger a remediation.
    #[serde(default = "default_actions")]
    pub actions: Vec<String>,
    /// Capture mode: persist raw payloads to disk and echo them back
    /// instead of running the remediation.
    #[serde(default)]
    pub capture_payloads: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            actions: default_actions(),
            capture_payloads: false,
        }
    }
}

fn default_actions() -> Vec<String> {
    vec!["opened".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?;
        Ok(config)
    }

    /// Read the app's private key from disk.
    pub fn read_private_key(&self) -> Result<String> {
        std::fs::read_to_string(&self.github.private_key_path).with_context(|| {
            format!(
                "Failed to read private key: {}",
                self.github.private_key_path.display()
            )
        })
    }
}
