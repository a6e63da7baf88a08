//! Startup configuration for the proxy.
//!
//! Only what the core receives at startup lives here; all live
//! configuration flows through the settings store.

use std::path::PathBuf;

/// Startup parameters handed to the engine.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Base directory for persisted state.
    pub base_dir: PathBuf,
    /// Upstream mud host.
    pub mud_host: String,
    /// Upstream mud port.
    pub mud_port: u16,
    /// Listen address for clients.
    pub listen_host: String,
    /// Listen port for clients.
    pub listen_port: u16,
    /// Preshared client password.
    pub password: String,
    /// Optional password admitting view-only clients.
    pub view_password: Option<String>,
    /// Directory for log output.
    pub log_dir: PathBuf,
}

impl ProxyConfig {
    /// Configuration with localhost defaults, suitable for tests.
    #[must_use]
    pub fn for_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let log_dir = base_dir.join("logs");
        Self {
            base_dir,
            mud_host: "127.0.0.1".to_string(),
            mud_port: 4000,
            listen_host: "127.0.0.1".to_string(),
            listen_port: 9999,
            password: "mudmux".to_string(),
            view_password: None,
            log_dir,
        }
    }

    /// Where per-plugin settings files live.
    #[must_use]
    pub fn settings_dir(&self) -> PathBuf {
        self.base_dir.join("data").join("settings")
    }

    /// The upstream address in `host:port` form.
    #[must_use]
    pub fn mud_addr(&self) -> String {
        format!("{}:{}", self.mud_host, self.mud_port)
    }

    /// The listen address in `host:port` form.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}
