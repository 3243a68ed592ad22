use std::time::Duration;

use url::Url;

use crate::config::Config;

/// Configuration for the room WebSocket
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Full room url, `ws(s)://host/<room>/`
    pub url: Url,
    pub connect_timeout: Duration,
}

impl WebSocketConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, url::ParseError> {
        Ok(Self::new(config.websocket_url()?))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn use_tls(&self) -> bool {
        self.url.scheme() == "wss"
    }
}
