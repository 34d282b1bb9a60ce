//! Client configuration for Skiff
//!
//! A [`ClientConfig`] is handed to the builder and frozen once the
//! [`WebSocket`](crate::WebSocket) exists.

use skiff_core::error::ConfigError;
use skiff_core::handshake::is_valid_header_name;
use skiff_core::protocol::constants::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_RECEIVE_INTERVAL};
use skiff_core::{ChunkingMode, Error};
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Run the opening handshake while building
    pub auto_connect: bool,
    /// Spawn a background task that pumps incoming data while the
    /// connection is open or closing
    pub use_receive_task: bool,
    /// How outgoing messages are split into fragments
    pub chunking_mode: ChunkingMode,
    /// Sleep between background pumps
    pub receive_interval: Duration,
    /// How long to wait for the server's handshake response
    pub handshake_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auto_connect: true,
            use_receive_task: true,
            chunking_mode: ChunkingMode::default(),
            receive_interval: DEFAULT_RECEIVE_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            user_agent: format!("skiff/{}", env!("CARGO_PKG_VERSION")),
            headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Validate the configuration
    pub fn validate(&self) -> skiff_core::Result<()> {
        if self.receive_interval.is_zero() {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "receive_interval",
                value: format!("{:?}", self.receive_interval),
            }));
        }

        if self.handshake_timeout.is_zero() {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "handshake_timeout",
                value: format!("{:?}", self.handshake_timeout),
            }));
        }

        if let Some((name, _)) = self
            .headers
            .iter()
            .find(|(name, _)| !is_valid_header_name(name))
        {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "headers",
                value: name.clone(),
            }));
        }

        Ok(())
    }

    /// Connect while building
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    /// Pump incoming data from a background task
    pub fn use_receive_task(mut self, enabled: bool) -> Self {
        self.use_receive_task = enabled;
        self
    }

    /// Set the chunking mode
    pub fn chunking_mode(mut self, mode: ChunkingMode) -> Self {
        self.chunking_mode = mode;
        self
    }

    /// Set the background pump interval
    pub fn receive_interval(mut self, interval: Duration) -> Self {
        self.receive_interval = interval;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Add a custom header
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
