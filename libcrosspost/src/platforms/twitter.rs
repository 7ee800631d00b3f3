//! Twitter/X channel
//!
//! Posts through the v2 `POST /2/tweets` endpoint, signing each request with OAuth 1.0a
//! user-context credentials. Tweets are measured with Twitter's weighted counting: emoji
//! and CJK weigh 2 and every link counts as 23.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::json;
use tracing::{debug, info};

use super::oauth1::OAuth1Signer;
use super::{classify_status, diagnostic, http_client, Channel};
use crate::error::{FormatError, PlatformError};
use crate::format::{Frame, LengthRule, Limits};
use crate::types::{Message, PublishRequest, Receipt};

const TWEETS_ENDPOINT: &str = "https://api.twitter.com/2/tweets";
const MAX_TWEET_LENGTH: usize = 280;

pub struct TwitterChannel {
    client: reqwest::Client,
    signer: Option<OAuth1Signer>,
    limits: Limits,
}

impl TwitterChannel {
    pub const NAME: &'static str = "twitter";

    pub fn new(signer: Option<OAuth1Signer>, timeout: Duration) -> Result<Self, PlatformError> {
        Ok(Self {
            client: http_client(timeout)?,
            signer,
            limits: Limits::new(MAX_TWEET_LENGTH, LengthRule::Twitter),
        })
    }
}

#[async_trait]
impl Channel for TwitterChannel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn format(&self, request: &PublishRequest) -> Result<Message, FormatError> {
        let frame = Frame::new(format!("📝 {}", request.title), &request.canonical_url);
        let text = self.limits.fit(Self::NAME, &frame, &request.summary)?;
        Ok(Message::Text(text))
    }

    async fn publish(&self, message: &Message) -> Result<Receipt, PlatformError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            PlatformError::Authentication(
                "TWITTER_API_KEY, TWITTER_API_SECRET, TWITTER_ACCESS_TOKEN and TWITTER_ACCESS_TOKEN_SECRET must all be set"
                    .to_string(),
            )
        })?;
        let text = message.as_text().ok_or_else(|| {
            PlatformError::Validation("Twitter only accepts text messages".to_string())
        })?;

        debug!(length = text.chars().count(), "Posting tweet");

        let response = self
            .client
            .post(TWEETS_ENDPOINT)
            .header(AUTHORIZATION, signer.authorization("POST", TWEETS_ENDPOINT)?)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let receipt = classify_response(status, &body)?;

        info!(tweet_id = ?receipt.remote_id, "Posted to Twitter");
        Ok(receipt)
    }
}

/// Maps a `POST /2/tweets` response to a receipt or a classified failure
///
/// 201 is the only success status. A 403 caused by duplicate content is a content
/// problem, not a credential problem.
pub fn classify_response(status: u16, body: &str) -> Result<Receipt, PlatformError> {
    if status == 201 {
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        let remote_id = parsed["data"]["id"].as_str().map(str::to_string);
        let remote_url = remote_id
            .as_ref()
            .map(|id| format!("https://x.com/i/web/status/{}", id));
        return Ok(Receipt {
            remote_id,
            remote_url,
        });
    }

    let detail = diagnostic(status, body, &["title", "detail"]);
    if status == 403 && detail.to_lowercase().contains("duplicate") {
        return Err(PlatformError::Validation(detail));
    }

    Err(classify_status(status, detail))
}
