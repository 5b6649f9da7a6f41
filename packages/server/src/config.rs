//! Command line / environment configuration.
//!
//! `CliArgs` is what clap parses (flags with environment fallbacks); [`AppConfig`] is the
//! validated form the rest of the server is built from.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Parser, Debug, Clone)]
#[command(name = "hanashi-server")]
#[command(about = "Gateway for the Hanashi language-learning chat application", long_about = None)]
pub struct CliArgs {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Host of the AI inference service. Without it the server runs degraded
    #[arg(long, env = "AI_SERVICE_HOST")]
    pub ai_service_host: Option<String>,

    /// Port of the AI inference service
    #[arg(long, env = "AI_SERVICE_PORT", default_value = "8001")]
    pub ai_service_port: u16,

    /// WebSocket URL of the inference audio stream (default: derived from host and port)
    #[arg(long, env = "AI_STREAM_URL")]
    pub ai_stream_url: Option<String>,

    /// HS256 secret for bearer tokens. Without it only `X-User-ID` is accepted
    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Run without the AI inference service (canned replies, no audio bridge)
    #[arg(long)]
    pub degraded: bool,

    /// Close connections with no client traffic for this many seconds (0 = never)
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value = "0")]
    pub idle_timeout_secs: u64,

    /// Evict empty rooms idle for this many seconds
    #[arg(long, env = "ROOM_IDLE_SECS", default_value = "600")]
    pub room_idle_secs: u64,

    /// Interval of the idle room sweep
    #[arg(long, env = "ROOM_SWEEP_INTERVAL_SECS", default_value = "60")]
    pub room_sweep_interval_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "debug")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid log level '{0}' (expected one of trace, debug, info, warn, error)")]
    InvalidLogLevel(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid AI stream URL '{0}' (expected ws:// or wss://)")]
    InvalidStreamUrl(String),
}

/// Where unary and streaming inference calls go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceBackend {
    Remote { base_url: String, stream_url: String },
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: InferenceBackend,
    pub jwt_secret: Option<String>,
    pub idle_timeout: Option<Duration>,
    pub room_idle: Duration,
    pub room_sweep_interval: Duration,
    pub log_level: String,
}

impl AppConfig {
    pub fn is_degraded(&self) -> bool {
        self.backend == InferenceBackend::Fallback
    }
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let log_level = args.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(args.log_level));
        }
        if args.host.is_empty() {
            return Err(ConfigError::Empty("host"));
        }
        if args.room_sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration("room sweep interval"));
        }
        if args.room_idle_secs == 0 {
            return Err(ConfigError::ZeroDuration("room idle threshold"));
        }

        let ai_host = args.ai_service_host.filter(|host| !host.is_empty());
        let backend = match ai_host {
            Some(host) if !args.degraded => {
                let stream_url = match args.ai_stream_url.filter(|url| !url.is_empty()) {
                    Some(url) if url.starts_with("ws://") || url.starts_with("wss://") => url,
                    Some(url) => return Err(ConfigError::InvalidStreamUrl(url)),
                    None => format!(
                        "ws://{}:{}/api/v1/conversation/stream",
                        host, args.ai_service_port
                    ),
                };
                InferenceBackend::Remote {
                    base_url: format!("http://{}:{}", host, args.ai_service_port),
                    stream_url,
                }
            }
            _ => InferenceBackend::Fallback,
        };

        Ok(Self {
            host: args.host,
            port: args.port,
            backend,
            jwt_secret: args.jwt_secret.filter(|secret| !secret.is_empty()),
            idle_timeout: (args.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(args.idle_timeout_secs)),
            room_idle: Duration::from_secs(args.room_idle_secs),
            room_sweep_interval: Duration::from_secs(args.room_sweep_interval_secs),
            log_level,
        })
    }
}
