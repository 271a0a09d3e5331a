//! Service configuration: TOML file, then environment, then CLI flags.

use derive_getters::Getters;
use derive_more::{Display, Error};
use housie_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Environment variable overriding [`ServerConfig::host`].
pub const HOST_ENV: &str = "HOUSIE_HOST";
/// Environment variable overriding [`ServerConfig::port`].
pub const PORT_ENV: &str = "HOUSIE_PORT";
/// Environment variable overriding [`ServerConfig::host_token`].
pub const HOST_TOKEN_ENV: &str = "HOUSIE_HOST_TOKEN";

/// Configuration for the housie service.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,

    /// Shared secret that marks a request as coming from the host.
    ///
    /// Without one, host-only operations are refused for everybody.
    #[serde(default)]
    host_token: Option<String>,

    /// Game engine settings.
    #[serde(default)]
    engine: EngineConfig,
}

#[instrument]
fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[instrument]
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            host_token: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))
    }

    /// Applies `HOUSIE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `HOUSIE_*` overrides from `lookup`.
    #[instrument(skip(self, lookup))]
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup(HOST_ENV) {
            debug!(%host, "Host overridden from environment");
            self.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid {}: {} ({})", PORT_ENV, port, e)))?;
            debug!(port = self.port, "Port overridden from environment");
        }
        if let Some(token) = lookup(HOST_TOKEN_ENV) {
            debug!("Host token overridden from environment");
            self.host_token = Some(token);
        }
        Ok(self)
    }

    /// Applies command-line overrides.
    pub fn with_cli_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// Drops an empty host token and warns when none is left.
    pub fn validated(mut self) -> Self {
        if self.host_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.host_token = None;
        }
        if self.host_token.is_none() {
            warn!("No host token configured; host operations are disabled");
        }
        self
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
