//! Session configuration.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Server endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:3001/ws";

/// Delay between a connection loss and the next connection attempt.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

/// Reconnect attempts made after a connection loss before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Messages per page when an external collaborator pages history.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Configuration for one chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint (`ws://` or `wss://`)
    pub endpoint: String,
    /// Identity announced in the `init` command
    pub user_id: String,
    /// Credential appended to the endpoint as the `token` query parameter
    pub auth_token: Option<String>,
    /// Reconnect automatically after the connection drops
    pub auto_reconnect: bool,
    /// Fixed delay between reconnect attempts
    pub reconnect_interval: Duration,
    /// Upper bound on consecutive reconnect attempts
    pub max_reconnect_attempts: u32,
    /// History page size, carried for the REST collaborator
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_id: String::new(),
            auth_token: None,
            auto_reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Configuration with default reconnect policy.
    pub fn new(endpoint: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), user_id: user_id.into(), ..Self::default() }
    }

    /// Set the `token` query credential.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Enable or disable automatic reconnects.
    #[must_use]
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the delay between reconnect attempts.
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the maximum number of consecutive reconnect attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the history page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Check the configuration can drive a session.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingUserId` if `user_id` is empty
    /// - `ConfigError::ZeroInterval` if reconnects are enabled with a zero delay
    /// - `ConfigError::InvalidEndpoint` / `UnsupportedScheme` from
    ///   [`ClientConfig::connect_url`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::MissingUserId);
        }

        if self.auto_reconnect && self.reconnect_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        self.connect_url().map(|_| ())
    }

    /// Endpoint with the auth token attached as a URL-encoded `token` query
    /// parameter. Existing query parameters are preserved.
    pub fn connect_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }

        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("token", token);
        }

        Ok(url)
    }
}
