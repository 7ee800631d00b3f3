//! Channel abstraction and implementations
//!
//! Every distribution platform is a [`Channel`]: it formats a [`PublishRequest`] into a
//! message that respects the platform's limits, and publishes that message with a single
//! network call whose response it classifies. Channels are selected by platform
//! identifier through [`ChannelKind`], never by branching at call sites.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//! use libcrosspost::platforms::{Channel, telegram::TelegramChannel};
//!
//! # async fn example(request: libcrosspost::PublishRequest) {
//! let channel = TelegramChannel::new(None, None, Duration::from_secs(10)).unwrap();
//! match channel.format(&request) {
//!     Ok(message) => println!("{}", message),
//!     Err(e) => eprintln!("cannot format: {}", e),
//! }
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::config::Config;
use crate::error::{ConfigError, FormatError, PlatformError, Result};
use crate::types::{Message, PublishRequest, Receipt};

pub mod devto;
pub mod mastodon;
pub mod oauth1;
pub mod telegram;
pub mod twitter;

// Compiled outside cfg(test) so the integration tests can reach it
pub mod mock;

/// Unified interface of a distribution platform
#[async_trait]
pub trait Channel: Send + Sync {
    /// Platform identifier as used in `platforms`/`posted_to` (e.g. "twitter")
    fn name(&self) -> &str;

    /// Builds the channel-legal message for a request
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] when the parts that must never be shortened (title and
    /// link) do not fit, or when required input is missing.
    fn format(&self, request: &PublishRequest) -> std::result::Result<Message, FormatError>;

    /// Publishes a formatted message with one network call
    ///
    /// # Errors
    ///
    /// Returns the classified [`PlatformError`] for any non-success response, timeout or
    /// connection failure.
    async fn publish(&self, message: &Message) -> std::result::Result<Receipt, PlatformError>;

    /// Whether `format` needs [`PublishRequest::body`] to be loaded
    fn needs_body(&self) -> bool {
        false
    }
}

/// The platforms this crate can publish to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Twitter,
    Mastodon,
    Telegram,
    DevTo,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Twitter,
        ChannelKind::Mastodon,
        ChannelKind::Telegram,
        ChannelKind::DevTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Twitter => twitter::TwitterChannel::NAME,
            ChannelKind::Mastodon => mastodon::MastodonChannel::NAME,
            ChannelKind::Telegram => telegram::TelegramChannel::NAME,
            ChannelKind::DevTo => devto::DevToChannel::NAME,
        }
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(ChannelKind::Twitter),
            "mastodon" => Ok(ChannelKind::Mastodon),
            "telegram" => Ok(ChannelKind::Telegram),
            "devto" | "dev.to" => Ok(ChannelKind::DevTo),
            other => Err(format!(
                "Unknown platform: '{}'. Valid options: twitter, mastodon, telegram, devto",
                other
            )),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Channel credentials, supplied by flag or environment and kept in memory only
#[derive(Default)]
pub struct Credentials {
    pub twitter_api_key: Option<SecretString>,
    pub twitter_api_secret: Option<SecretString>,
    pub twitter_access_token: Option<SecretString>,
    pub twitter_access_token_secret: Option<SecretString>,
    pub mastodon_instance_url: Option<String>,
    pub mastodon_access_token: Option<SecretString>,
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_channel_id: Option<String>,
    pub devto_api_key: Option<SecretString>,
}

impl Credentials {
    /// Names of the settings a channel is missing before it can publish
    pub fn missing_for(&self, kind: ChannelKind) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match kind {
            ChannelKind::Twitter => {
                if self.twitter_api_key.is_none() {
                    missing.push("TWITTER_API_KEY");
                }
                if self.twitter_api_secret.is_none() {
                    missing.push("TWITTER_API_SECRET");
                }
                if self.twitter_access_token.is_none() {
                    missing.push("TWITTER_ACCESS_TOKEN");
                }
                if self.twitter_access_token_secret.is_none() {
                    missing.push("TWITTER_ACCESS_TOKEN_SECRET");
                }
            }
            ChannelKind::Mastodon => {
                if self.mastodon_instance_url.is_none() {
                    missing.push("MASTODON_INSTANCE_URL");
                }
                if self.mastodon_access_token.is_none() {
                    missing.push("MASTODON_ACCESS_TOKEN");
                }
            }
            ChannelKind::Telegram => {
                if self.telegram_bot_token.is_none() {
                    missing.push("TELEGRAM_BOT_TOKEN");
                }
                if self.telegram_channel_id.is_none() {
                    missing.push("TELEGRAM_CHANNEL_ID");
                }
            }
            ChannelKind::DevTo => {
                if self.devto_api_key.is_none() {
                    missing.push("DEVTO_API_KEY");
                }
            }
        }
        missing
    }
}

/// Create channel instances for the selected platforms
///
/// With `require_credentials`, a platform missing any credential is a configuration
/// error; dry runs pass `false` since they only format.
///
/// # Errors
///
/// Returns an error if credentials are required but missing, or if an HTTP client cannot
/// be built.
pub fn create_channels(
    config: &Config,
    credentials: Credentials,
    kinds: &[ChannelKind],
    require_credentials: bool,
) -> Result<Vec<Box<dyn Channel>>> {
    if require_credentials {
        let missing: Vec<&str> = kinds
            .iter()
            .flat_map(|kind| credentials.missing_for(*kind))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingField(missing.join(", ")).into());
        }
    }

    let timeout = Duration::from_secs(config.publish.timeout_secs);
    let Credentials {
        twitter_api_key,
        twitter_api_secret,
        twitter_access_token,
        twitter_access_token_secret,
        mastodon_instance_url,
        mut mastodon_access_token,
        mut telegram_bot_token,
        telegram_channel_id,
        mut devto_api_key,
    } = credentials;

    let mut twitter_signer = match (
        twitter_api_key,
        twitter_api_secret,
        twitter_access_token,
        twitter_access_token_secret,
    ) {
        (Some(key), Some(secret), Some(token), Some(token_secret)) => {
            Some(oauth1::OAuth1Signer::new(key, secret, token, token_secret))
        }
        _ => None,
    };

    let mut channels: Vec<Box<dyn Channel>> = Vec::new();
    for kind in kinds {
        let channel: Box<dyn Channel> = match kind {
            ChannelKind::Twitter => Box::new(twitter::TwitterChannel::new(
                twitter_signer.take(),
                timeout,
            )?),
            ChannelKind::Mastodon => Box::new(mastodon::MastodonChannel::new(
                mastodon_instance_url.clone(),
                mastodon_access_token.take(),
                config.mastodon.max_characters,
                timeout,
            )?),
            ChannelKind::Telegram => Box::new(telegram::TelegramChannel::new(
                telegram_bot_token.take(),
                telegram_channel_id.clone(),
                timeout,
            )?),
            ChannelKind::DevTo => Box::new(devto::DevToChannel::new(
                devto_api_key.take(),
                config.devto.mode,
                Duration::from_secs(config.devto.timeout_secs),
            )?),
        };
        channels.push(channel);
    }

    Ok(channels)
}

/// Builds the reqwest client every HTTP channel uses
pub(crate) fn http_client(timeout: Duration) -> std::result::Result<reqwest::Client, PlatformError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("crosspost/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PlatformError::Other(format!("Failed to build HTTP client: {}", e)))
}

/// Classification shared by all channels for non-success HTTP statuses
///
/// - 401/403 → authentication
/// - 400/413/422 → validation
/// - 408/429/5xx → transient
/// - anything else → other
pub(crate) fn classify_status(status: u16, diagnostic: String) -> PlatformError {
    match status {
        401 | 403 => PlatformError::Authentication(diagnostic),
        400 | 413 | 422 => PlatformError::Validation(diagnostic),
        408 | 429 | 500..=599 => PlatformError::Transient(diagnostic),
        _ => PlatformError::Other(diagnostic),
    }
}

/// Diagnostic text for a response: selected JSON fields when present, else the raw body
pub(crate) fn diagnostic(status: u16, body: &str, fields: &[&str]) -> String {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or(serde_json::Value::Null);
    let parts: Vec<String> = fields
        .iter()
        .filter_map(|field| parsed.get(*field))
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect();

    if parts.is_empty() {
        let body = body.trim();
        if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        }
    } else {
        format!("HTTP {}: {}", status, parts.join(" - "))
    }
}
