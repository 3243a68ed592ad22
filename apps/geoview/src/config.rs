use std::env;
use std::time::Duration;
#[cfg(test)]
use std::sync::Mutex;

use url::Url;

const DEFAULT_SERVER: &str = "127.0.0.1:8080";
const DEFAULT_ROOM: &str = "default";
const DEFAULT_LOG_FILTER: &str = "info,geoview=debug,geoview_client_core=debug";

/// Geoview client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Room server address, `host:port` or a full `http(s)://` origin
    pub server: String,
    /// Collaborative room to join
    pub room: String,
    /// Use `wss`/`https`; auto-detected from the address when unset
    pub use_tls: Option<bool>,
    /// Interval between sync loop ticks
    pub frame_interval: Duration,
    /// How long to wait for `initializeSession` after connecting
    pub session_timeout: Duration,
    pub log_filter: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let server = normalize_server(
            &env::var("GEOVIEW_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string()),
        );
        let room = env::var("GEOVIEW_ROOM").unwrap_or_else(|_| DEFAULT_ROOM.to_string());
        let use_tls = env::var("GEOVIEW_TLS")
            .ok()
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
        let frame_interval = env_millis("GEOVIEW_FRAME_INTERVAL_MS").unwrap_or(Duration::from_millis(16));
        let session_timeout =
            env_millis("GEOVIEW_SESSION_TIMEOUT_MS").unwrap_or(Duration::from_millis(5_000));
        let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        Self {
            server,
            room,
            use_tls,
            frame_interval,
            session_timeout,
            log_filter,
        }
    }

    pub fn with_server(mut self, server: &str) -> Self {
        self.server = normalize_server(server);
        self
    }

    fn tls(&self) -> bool {
        if let Some(explicit) = self.use_tls {
            return explicit;
        }
        if self.server.starts_with("https://") || self.server.starts_with("wss://") {
            return true;
        }
        strip_scheme(&self.server).ends_with(":443")
    }

    /// Origin used for request/response calls, e.g. `http://127.0.0.1:8080/`
    pub fn http_base(&self) -> Result<Url, url::ParseError> {
        let scheme = if self.tls() { "https" } else { "http" };
        Url::parse(&format!("{}://{}/", scheme, strip_scheme(&self.server)))
    }

    /// Room channel url, `ws(s)://host/<room>/`
    pub fn websocket_url(&self) -> Result<Url, url::ParseError> {
        let scheme = if self.tls() { "wss" } else { "ws" };
        Url::parse(&format!(
            "{}://{}/{}/",
            scheme,
            strip_scheme(&self.server),
            self.room
        ))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            room: DEFAULT_ROOM.to_string(),
            use_tls: None,
            frame_interval: Duration::from_millis(16),
            session_timeout: Duration::from_millis(5_000),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn env_millis(var: &str) -> Option<Duration> {
    env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn strip_scheme(server: &str) -> &str {
    let rest = server
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(server);
    rest.trim_end_matches('/')
}

// Normalize localhost to IPv4 to avoid IPv6 (::1) preference on macOS
fn normalize_server(server: &str) -> String {
    match server.split_once("://") {
        Some((scheme, rest)) if rest.starts_with("localhost") => {
            format!("{}://{}", scheme, rest.replacen("localhost", "127.0.0.1", 1))
        }
        None if server.starts_with("localhost") => server.replacen("localhost", "127.0.0.1", 1),
        _ => server.to_string(),
    }
}
