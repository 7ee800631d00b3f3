//! Logging setup shared by the crosspost binaries
//!
//! All diagnostics go to stderr so that stdout stays machine-readable (detection JSON,
//! publish reports). A bare level such as `debug` applies to the crosspost crates only;
//! dependencies (HTTP stack, megalodon) stay at `warn` unless an explicit filter
//! directive is given.
//!
//! # Examples
//!
//! ```no_run
//! use libcrosspost::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "info".to_string(), false).init();
//!
//! // Or honour CROSSPOST_LOG_FORMAT / CROSSPOST_LOG_LEVEL
//! LoggingConfig::from_env(false).init();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_ENV: &str = "CROSSPOST_LOG_FORMAT";
pub const LOG_LEVEL_ENV: &str = "CROSSPOST_LOG_LEVEL";

const OWN_TARGETS: [&str; 3] = ["libcrosspost", "cross_detect", "cross_publish"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// * `level` - a bare level (error, warn, info, debug, trace) or a full filter directive
    /// * `verbose` - forces debug for the crosspost crates
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Reads `CROSSPOST_LOG_FORMAT` and `CROSSPOST_LOG_LEVEL`, defaulting to text at info
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);

        let level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());

        Self::new(format, level, verbose)
    }

    /// Filter directive built from the level and verbose flag
    pub fn directive(&self) -> String {
        let level = if self.verbose { "debug" } else { self.level.trim() };

        if is_bare_level(level) {
            let own: Vec<String> = OWN_TARGETS
                .iter()
                .map(|target| format!("{}={}", target, level))
                .collect();
            format!("warn,{}", own.join(","))
        } else {
            level.to_string()
        }
    }

    /// Installs the global subscriber
    ///
    /// A second call (e.g. from tests sharing a process) is a no-op.
    pub fn init(&self) {
        let filter = EnvFilter::try_new(self.directive()).unwrap_or_else(|_| EnvFilter::new("info"));

        let result = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(false)
                .with_level(true)
                .try_init(),
        };

        if let Err(e) = result {
            tracing::debug!("Logging already initialised: {}", e);
        }
    }
}

fn is_bare_level(level: &str) -> bool {
    matches!(
        level.to_lowercase().as_str(),
        "error" | "warn" | "info" | "debug" | "trace" | "off"
    )
}
