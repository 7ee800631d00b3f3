//! Telegram channel posting through the Bot API
//!
//! Messages use HTML parse mode, so the title, abstract and link are escaped before being
//! embedded in markup. The length ceiling is applied to the escaped text, counted in
//! UTF-16 code units as the Bot API does.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info};

use super::{classify_status, diagnostic, http_client, Channel};
use crate::error::{FormatError, PlatformError};
use crate::format::{Frame, LengthRule, Limits};
use crate::types::{Message, PublishRequest, Receipt};

const API_BASE: &str = "https://api.telegram.org";
const MAX_MESSAGE_LENGTH: usize = 4096;

pub struct TelegramChannel {
    client: reqwest::Client,
    bot_token: Option<SecretString>,
    channel_id: Option<String>,
    limits: Limits,
}

impl TelegramChannel {
    pub const NAME: &'static str = "telegram";

    pub fn new(
        bot_token: Option<SecretString>,
        channel_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        Ok(Self {
            client: http_client(timeout)?,
            bot_token,
            channel_id,
            limits: Limits::new(MAX_MESSAGE_LENGTH, LengthRule::Utf16),
        })
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn format(&self, request: &PublishRequest) -> Result<Message, FormatError> {
        let frame = Frame {
            head: format!("<b>{}</b>", escape_html(&request.title)),
            separator: "\n\n".to_string(),
            link_prefix: "<a href=\"".to_string(),
            url: escape_html(&request.canonical_url),
            link_suffix: "\">Read full article →</a>".to_string(),
            escape: Some(escape_html),
        };

        let text = self.limits.fit(Self::NAME, &frame, &request.summary)?;
        Ok(Message::Text(text))
    }

    async fn publish(&self, message: &Message) -> Result<Receipt, PlatformError> {
        let (token, channel_id) = match (&self.bot_token, &self.channel_id) {
            (Some(token), Some(channel_id)) => (token, channel_id),
            _ => {
                return Err(PlatformError::Authentication(
                    "TELEGRAM_BOT_TOKEN and TELEGRAM_CHANNEL_ID must both be set".to_string(),
                ))
            }
        };
        let text = message.as_text().ok_or_else(|| {
            PlatformError::Validation("Telegram only accepts text messages".to_string())
        })?;

        debug!(chat_id = %channel_id, length = text.chars().count(), "Sending Telegram message");

        let url = format!("{}/bot{}/sendMessage", API_BASE, token.expose_secret());
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": channel_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": false,
            }))
            .send()
            .await
            // reqwest errors carry the URL, which contains the bot token
            .map_err(|e| PlatformError::from(e.without_url()))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let receipt = classify_response(status, &body, channel_id)?;

        info!(message_id = ?receipt.remote_id, "Posted to Telegram");
        Ok(receipt)
    }
}

/// Maps a `sendMessage` response to a receipt or a classified failure
///
/// Success requires both HTTP 200 and `"ok": true`. The Bot API answers 404 for an
/// unknown bot token.
pub fn classify_response(status: u16, body: &str, channel_id: &str) -> Result<Receipt, PlatformError> {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();

    if status == 200 && parsed["ok"].as_bool() == Some(true) {
        let remote_id = parsed["result"]["message_id"].as_i64().map(|id| id.to_string());
        let remote_url = match (&remote_id, channel_id.strip_prefix('@')) {
            (Some(id), Some(handle)) => Some(format!("https://t.me/{}/{}", handle, id)),
            _ => None,
        };
        return Ok(Receipt {
            remote_id,
            remote_url,
        });
    }

    let detail = diagnostic(status, body, &["description"]);
    match status {
        200 => Err(PlatformError::Other(detail)),
        404 => Err(PlatformError::Authentication(detail)),
        _ => Err(classify_status(status, detail)),
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
