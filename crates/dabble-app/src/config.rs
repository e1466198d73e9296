//! Command line and environment configuration.

use crate::error::AppError;
use clap::Parser;
use dabble_core::session::SessionId;
use peniko::Color;
use url::Url;

/// Relay used when neither `--server` nor `DABBLE_SERVER` is given.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3030/ws";

/// A shared drawing pad.
#[derive(Parser, Debug)]
#[command(name = "dabble", author, version, about, long_about = None)]
pub struct Args {
    /// Session to join at start-up: an id, a `/id` path or a share URL
    /// (e.g. http://host:3030/3f2a...).
    pub session: Option<String>,

    /// WebSocket URL of the relay.
    #[arg(long, env = "DABBLE_SERVER", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Initial window width in logical pixels.
    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    /// Initial window height in logical pixels.
    #[arg(long, default_value_t = 768)]
    pub height: u32,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub background_color: Color,
    /// WebSocket URL of the relay.
    pub server_url: String,
    /// Session joined at start-up.
    pub session: Option<SessionId>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Dabble".to_string(),
            width: 1024,
            height: 768,
            background_color: Color::WHITE,
            server_url: DEFAULT_SERVER_URL.to_string(),
            session: None,
        }
    }
}

impl AppConfig {
    /// Build the configuration from parsed arguments.
    ///
    /// A full share URL names both the session and the relay, and wins over
    /// `--server`.
    pub fn from_args(args: Args) -> Result<Self, AppError> {
        let mut config = Self {
            width: args.width.max(1),
            height: args.height.max(1),
            server_url: args.server,
            ..Self::default()
        };

        if let Some(target) = args.session.as_deref() {
            let (session, server) = parse_session_target(target)?;
            if let Some(server) = server {
                config.server_url = server;
            }
            config.session = Some(session);
        }

        Ok(config)
    }
}

/// Split a session argument into the session id and, for full URLs, the
/// relay URL serving it.
pub fn parse_session_target(target: &str) -> Result<(SessionId, Option<String>), AppError> {
    let target = target.trim();
    if !target.contains("://") {
        let session = SessionId::from_path(target)?
            .ok_or_else(|| AppError::MissingSession(target.to_string()))?;
        return Ok((session, None));
    }

    let url = Url::parse(target)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(AppError::Scheme(other.to_string())),
    };

    let last = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .ok_or_else(|| AppError::MissingSession(target.to_string()))?;
    let session = SessionId::parse(last)?;

    let host = url
        .host_str()
        .ok_or_else(|| AppError::MissingSession(target.to_string()))?;
    let server = match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}/ws"),
        None => format!("{scheme}://{host}/ws"),
    };

    Ok((session, Some(server)))
}
