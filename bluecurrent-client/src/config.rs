//! Client configuration
//!
//! Endpoints, the pre-shared key used by the credential transform and the
//! timeouts applied to correlated waits.

use std::time::Duration;

/// REST base path
pub const DEFAULT_API_URL: &str = "https://bo.bluecurrent.nl/app/bc_api/api/v2.0";

/// Socket endpoint
pub const DEFAULT_SOCKET_URL: &str = "wss://motown.bluecurrent.nl/appserver/2.0";

/// Pre-shared key handed to the credential encryptor
pub const DEFAULT_PSK: &str = "d9ab2352a935be4ade182ce4921044f8";

/// Default wait for a correlated reply
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for the terminal status of a physical action (unlock, reset, ...)
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the close handshake during teardown
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub socket_url: String,
    pub psk: String,
    pub receive_timeout: Duration,
    pub action_timeout: Duration,
    pub close_timeout: Duration,
    user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            psk: DEFAULT_PSK.to_string(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client identifier sent on the socket handshake and every REST call
    pub fn user_agent(&self) -> String {
        match self.user_agent {
            Some(ref agent) => agent.clone(),
            None => default_user_agent(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = url.into();
        self
    }

    pub fn with_psk(mut self, psk: impl Into<String>) -> Self {
        self.psk = psk.into();
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

/// `bluecurrent-client x.y.z`, build metadata stripped
fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let version = version.split('+').next().unwrap_or(version);
    format!("bluecurrent-client {}", version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.socket_url, DEFAULT_SOCKET_URL);
        assert_eq!(config.receive_timeout, Duration::from_secs(10));
        assert_eq!(config.action_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_user_agent() {
        let agent = ClientConfig::default().user_agent();

        assert!(agent.starts_with("bluecurrent-client "));
        assert!(!agent.contains('+'));
        let version = agent.trim_start_matches("bluecurrent-client ");
        assert!(matches!(version.split('.').count(), 3 | 4));
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new()
            .with_api_url("http://127.0.0.1:8080/api/")
            .with_socket_url("ws://127.0.0.1:9000")
            .with_psk("secret")
            .with_receive_timeout(Duration::from_millis(250))
            .with_action_timeout(Duration::from_secs(1))
            .with_user_agent("tests");

        assert_eq!(config.api_url, "http://127.0.0.1:8080/api");
        assert_eq!(config.socket_url, "ws://127.0.0.1:9000");
        assert_eq!(config.psk, "secret");
        assert_eq!(config.receive_timeout, Duration::from_millis(250));
        assert_eq!(config.action_timeout, Duration::from_secs(1));
        assert_eq!(config.user_agent(), "tests");
    }
}
