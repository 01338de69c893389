//! Process configuration.
//!
//! Built once at startup from (in increasing precedence) a `.env` file,
//! environment variables and command-line flags, then passed by reference to
//! whatever needs it. Nothing mutates it afterwards.

use std::fmt;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::upstream::DEFAULT_API_URL;

/// Which transport the server speaks to its host over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[default]
    Stdio,
    /// HTTP with Server-Sent Events
    Sse,
}

#[derive(Clone, Parser)]
#[command(name = "tushare-mcp", author, version, about, long_about = None)]
pub struct Config {
    /// Tushare Pro API token
    #[arg(long, env = "TUSHARE_TOKEN", hide_env_values = true)]
    pub tushare_token: Option<String>,

    /// Address the SSE transport binds to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the SSE transport listens on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Seconds between keep-alive pings on SSE streams
    #[arg(long, env = "SSE_PING_INTERVAL", default_value_t = 15)]
    pub sse_ping_interval: u64,

    /// Enable debug logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Tushare Pro endpoint
    #[arg(long, env = "TUSHARE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: Url,

    /// Transport to serve on
    #[arg(long, value_enum, default_value_t = TransportKind::Stdio)]
    pub transport: TransportKind,
}

impl Config {
    /// Loads `.env` if present, then reads environment and arguments.
    pub fn load() -> Self {
        // A missing .env file is not an error.
        let _ = dotenv::dotenv();
        Config::parse()
    }

    /// Configuration with defaults and the given token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            tushare_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Whether a non-empty token is configured.
    pub fn has_token(&self) -> bool {
        self.tushare_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tushare_token: None,
            host: "0.0.0.0".to_string(),
            port: 8000,
            sse_ping_interval: 15,
            debug: false,
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            transport: TransportKind::Stdio,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "tushare_token",
                &self.tushare_token.as_ref().map(|_| "<redacted>"),
            )
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sse_ping_interval", &self.sse_ping_interval)
            .field("debug", &self.debug)
            .field("api_url", &self.api_url.as_str())
            .field("transport", &self.transport)
            .finish()
    }
}
