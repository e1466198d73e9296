//! Server configuration from the command line and environment.

use crate::error::ServerError;
use clap::Parser;
use std::net::SocketAddr;

/// Draw events kept per room on top of its snapshot.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;
/// Per-room broadcast buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_BIND: &str = "0.0.0.0:3030";

/// WebSocket relay for shared Dabble drawings.
#[derive(Parser, Debug, Clone)]
#[command(name = "dabble-server", version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "DABBLE_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Draw events kept for late joiners before a fresh snapshot is requested.
    #[arg(long, env = "DABBLE_HISTORY_LIMIT", default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,

    /// Messages buffered per room before slow peers start skipping.
    #[arg(long, env = "DABBLE_CHANNEL_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3030)),
            history_limit: DEFAULT_HISTORY_LIMIT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.history_limit == 0 {
            return Err(ServerError::Config("history limit must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ServerError::Config(
                "channel capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["dabble-server"]);
        assert_eq!(config.bind.port(), 3030);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags() {
        let config = ServerConfig::parse_from([
            "dabble-server",
            "--bind",
            "127.0.0.1:9000",
            "--history-limit",
            "10",
        ]);
        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.history_limit, 10);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let config = ServerConfig {
            history_limit: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        let config = ServerConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
