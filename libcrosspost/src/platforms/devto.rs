//! Dev.to channel
//!
//! Publishes an article through `POST /api/articles`. In [`DevToMode::Link`] the article
//! is a short teaser pointing back to the blog; in [`DevToMode::Full`] the whole markdown
//! body is republished with `canonical_url` set so search engines credit the blog.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info};

use super::{classify_status, diagnostic, http_client, Channel};
use crate::config::DevToMode;
use crate::error::{FormatError, PlatformError};
use crate::format::limit_tags;
use crate::types::{Article, Message, PublishRequest, Receipt};

const ARTICLES_ENDPOINT: &str = "https://dev.to/api/articles";
const MAX_TAGS: usize = 4;
const MAX_TITLE_LENGTH: usize = 128;

pub struct DevToChannel {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    mode: DevToMode,
}

impl DevToChannel {
    pub const NAME: &'static str = "devto";

    pub fn new(
        api_key: Option<SecretString>,
        mode: DevToMode,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            mode,
        })
    }
}

#[async_trait]
impl Channel for DevToChannel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn format(&self, request: &PublishRequest) -> Result<Message, FormatError> {
        let title_length = request.title.chars().count();
        if title_length > MAX_TITLE_LENGTH {
            return Err(FormatError::TitleTooLong {
                platform: Self::NAME.to_string(),
                length: title_length,
                limit: MAX_TITLE_LENGTH,
            });
        }

        let tags = limit_tags(request.tags_for(Self::NAME), Some(MAX_TAGS));

        let (body_markdown, canonical_url) = match self.mode {
            DevToMode::Link => (
                format!(
                    "{}\n\n[Read the full article on my blog]({})",
                    request.summary, request.canonical_url
                ),
                None,
            ),
            DevToMode::Full => {
                let body = request.body.as_deref().ok_or_else(|| FormatError::MissingBody {
                    platform: Self::NAME.to_string(),
                    item: request.slug.clone(),
                })?;
                (body.to_string(), Some(request.canonical_url.clone()))
            }
        };

        Ok(Message::Article(Article {
            title: request.title.clone(),
            published: true,
            body_markdown,
            tags,
            description: request.summary.clone(),
            canonical_url,
        }))
    }

    async fn publish(&self, message: &Message) -> Result<Receipt, PlatformError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| PlatformError::Authentication("DEVTO_API_KEY is not set".to_string()))?;
        let article = match message {
            Message::Article(article) => article,
            Message::Text(_) => {
                return Err(PlatformError::Validation(
                    "Dev.to only accepts article payloads".to_string(),
                ))
            }
        };

        debug!(title = %article.title, tags = ?article.tags, "Creating Dev.to article");

        let response = self
            .client
            .post(ARTICLES_ENDPOINT)
            .header("api-key", api_key.expose_secret())
            .json(&json!({ "article": article }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let receipt = classify_response(status, &body)?;

        info!(article_url = ?receipt.remote_url, "Posted to Dev.to");
        Ok(receipt)
    }

    fn needs_body(&self) -> bool {
        self.mode == DevToMode::Full
    }
}

/// Maps a `POST /api/articles` response to a receipt or a classified failure
pub fn classify_response(status: u16, body: &str) -> Result<Receipt, PlatformError> {
    if status == 201 {
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        return Ok(Receipt {
            remote_id: parsed["id"].as_i64().map(|id| id.to_string()),
            remote_url: parsed["url"].as_str().map(str::to_string),
        });
    }

    Err(classify_status(
        status,
        diagnostic(status, body, &["error", "message"]),
    ))
}
