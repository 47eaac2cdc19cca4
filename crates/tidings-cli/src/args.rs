//! Command-line arguments.

use std::time::Duration;

use clap::Parser;
use tidings_core::{
    ClientConfig,
    config::{
        DEFAULT_ENDPOINT, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_PAGE_SIZE,
        DEFAULT_RECONNECT_INTERVAL,
    },
};

/// Tidings terminal chat client
#[derive(Parser, Debug)]
#[command(name = "tidings")]
#[command(about = "Terminal chat client for a Tidings server")]
#[command(version)]
pub struct Args {
    /// WebSocket endpoint (ws:// or wss://)
    #[arg(short, long, env = "TIDINGS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// User to sign in as
    #[arg(short, long, env = "TIDINGS_USER_ID")]
    pub user: String,

    /// Auth token, sent as the `token` query parameter
    #[arg(long, env = "TIDINGS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Do not reconnect after the connection drops
    #[arg(long)]
    pub no_auto_reconnect: bool,

    /// Delay between reconnect attempts, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RECONNECT_INTERVAL.as_millis() as u64)]
    pub reconnect_interval_ms: u64,

    /// Reconnect attempts before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_reconnect_attempts: u32,

    /// Messages per history page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Session configuration described by the arguments.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.endpoint.clone(), self.user.clone())
            .with_auto_reconnect(!self.no_auto_reconnect)
            .with_reconnect_interval(Duration::from_millis(self.reconnect_interval_ms))
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
            .with_page_size(self.page_size);

        if let Some(token) = &self.token {
            config = config.with_auth_token(token.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_config() {
        let args = Args::try_parse_from([
            "tidings",
            "--endpoint",
            "wss://chat.example/ws",
            "--user",
            "alice",
            "--token",
            "t0k",
            "--no-auto-reconnect",
            "--reconnect-interval-ms",
            "500",
            "--max-reconnect-attempts",
            "2",
            "--page-size",
            "20",
        ])
        .unwrap();

        let config = args.config();
        assert_eq!(config.endpoint, "wss://chat.example/ws");
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.auth_token.as_deref(), Some("t0k"));
        assert!(!config.auto_reconnect);
        assert_eq!(config.reconnect_interval, Duration::from_millis(500));
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn defaults_match_client_defaults() {
        let args =
            Args::try_parse_from(["tidings", "--user", "bob", "--endpoint", DEFAULT_ENDPOINT])
                .unwrap();
        let config = args.config();
        let expected = ClientConfig::new(DEFAULT_ENDPOINT, "bob");

        assert_eq!(config.reconnect_interval, expected.reconnect_interval);
        assert_eq!(config.max_reconnect_attempts, expected.max_reconnect_attempts);
        assert_eq!(config.page_size, expected.page_size);
        assert!(config.auto_reconnect);
    }
}
