pub mod api;
pub mod config;
pub mod github;
pub mod remediate;

use config::Config;

/// Shared application state.
///
/// Built once at startup and passed explicitly into handlers; the
/// configuration and private key are immutable for the process lifetime.
pub struct AppState {
    pub config: Config,
    /// GitHub App private key, PEM-encoded. Read from disk at startup so a
    /// missing or unreadable key fails the process, not the first delivery.
    pub private_key: String,
}

impl AppState {
    pub fn new(config: Config, private_key: String) -> Self {
        Self {
            config,
            private_key,
        }
    }
}
