//! Core types for Crosspost

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::frontmatter::Metadata;

/// Platforms an item targets when its metadata does not declare any
pub const DEFAULT_PLATFORMS: [&str; 3] = ["twitter", "linkedin", "telegram"];

pub fn default_platforms() -> Vec<String> {
    DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect()
}

/// Everything a channel needs to announce one content item
///
/// Built fresh by the planner on every run and never persisted. The serialized form is
/// the per-item value of the detection output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishRequest {
    pub slug: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub summary: String,
    #[serde(rename = "url")]
    pub canonical_url: String,
    /// Platforms still pending at planning time, in declaration order
    #[serde(rename = "platforms")]
    pub pending_platforms: Vec<String>,
    pub metadata: Metadata,
    /// Markdown body of the item, only loaded for channels that republish it in full
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl PublishRequest {
    /// Tags for a platform: `tags_<platform>` when present, otherwise `tags`
    pub fn tags_for(&self, platform: &str) -> Vec<String> {
        self.metadata.tags_for(platform)
    }
}

/// A channel-legal message produced by a formatter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    /// Plain status text (tweets, toots, channel posts)
    Text(String),
    /// Long-form article payload
    Article(Article),
}

impl Message {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            Message::Article(_) => None,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Text(text) => write!(f, "{}", text),
            Message::Article(article) => match serde_json::to_string_pretty(article) {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "{}", article.title),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub published: bool,
    pub body_markdown: String,
    pub tags: Vec<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
}

/// What the platform handed back for a successful publish
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub remote_id: Option<String>,
    pub remote_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The platform was not selected for this run
    NotTargeted,
    /// No channel implementation exists for the platform identifier
    Unsupported,
    /// The item already records the platform in `posted_to`
    AlreadyPosted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotTargeted => "not-targeted",
            SkipReason::Unsupported => "unsupported",
            SkipReason::AlreadyPosted => "already-posted",
        }
    }
}

/// Result for one (content item, platform) pair
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Succeeded(Receipt),
    Failed(PlatformError),
    Skipped(SkipReason),
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Succeeded(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PublishOutcome::Failed(_))
    }

    /// Stable label: `succeeded`, `skipped`, or the failure kind
    pub fn label(&self) -> &'static str {
        match self {
            PublishOutcome::Succeeded(_) => "succeeded",
            PublishOutcome::Failed(error) => error.kind(),
            PublishOutcome::Skipped(_) => "skipped",
        }
    }
}
