//! Mastodon channel
//!
//! Statuses are posted with the megalodon client, so any instance implementing the
//! Mastodon API works. Mastodon counts every link as 23 characters regardless of its
//! length; the status ceiling is instance-specific (500 by default).

use std::time::Duration;

use async_trait::async_trait;
use megalodon::megalodon::PostStatusOutput;
use megalodon::{Megalodon, SNS};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{classify_status, Channel};
use crate::error::{FormatError, PlatformError};
use crate::format::{Frame, LengthRule, Limits};
use crate::types::{Message, PublishRequest, Receipt};

const HASHTAGS: &str = "#TechBlog #Programming #WebDev";

pub struct MastodonChannel {
    instance_url: Option<String>,
    access_token: Option<SecretString>,
    limits: Limits,
    timeout: Duration,
}

impl MastodonChannel {
    pub const NAME: &'static str = "mastodon";

    pub fn new(
        instance_url: Option<String>,
        access_token: Option<SecretString>,
        max_characters: usize,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let instance_url = instance_url
            .map(|url| normalize_instance_url(&url))
            .filter(|url| !url.is_empty());

        Ok(Self {
            instance_url,
            access_token,
            limits: Limits::new(max_characters, LengthRule::Mastodon),
            timeout,
        })
    }
}

#[async_trait]
impl Channel for MastodonChannel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn format(&self, request: &PublishRequest) -> Result<Message, FormatError> {
        let mut frame = Frame::new(format!("📝 {}", request.title), &request.canonical_url);
        frame.link_suffix = format!("\n\n{}", HASHTAGS);

        let text = self.limits.fit(Self::NAME, &frame, &request.summary)?;
        Ok(Message::Text(text))
    }

    async fn publish(&self, message: &Message) -> Result<Receipt, PlatformError> {
        let (instance_url, token) = match (&self.instance_url, &self.access_token) {
            (Some(url), Some(token)) => (url, token),
            _ => {
                return Err(PlatformError::Authentication(
                    "MASTODON_INSTANCE_URL and MASTODON_ACCESS_TOKEN must both be set".to_string(),
                ))
            }
        };
        let text = message.as_text().ok_or_else(|| {
            PlatformError::Validation("Mastodon only accepts text messages".to_string())
        })?;

        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(token.expose_secret().to_string()),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!(
                "Invalid Mastodon instance {}: {}",
                instance_url, e
            ))
        })?;

        debug!(instance = %instance_url, length = text.chars().count(), "Posting status");

        let response = tokio::time::timeout(self.timeout, client.post_status(text.to_string(), None))
            .await
            .map_err(|_| {
                PlatformError::Transient(format!(
                    "Mastodon did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let receipt = match response.json {
            PostStatusOutput::Status(status) => Receipt {
                remote_id: Some(status.id),
                remote_url: status.url,
            },
            PostStatusOutput::ScheduledStatus(scheduled) => Receipt {
                remote_id: Some(scheduled.id),
                remote_url: None,
            },
        };

        info!(status_id = ?receipt.remote_id, "Posted to Mastodon");
        Ok(receipt)
    }
}

/// Adds a scheme to bare hostnames and drops trailing slashes
fn normalize_instance_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Map megalodon errors to PlatformError
///
/// megalodon reports HTTP failures as text, so the status is parsed out of the message
/// and run through the shared classification. Without a status, the message itself is
/// inspected:
///
/// - unauthorized/forbidden/token → authentication
/// - validation/unprocessable → validation
/// - timeout/connection/rate limit → transient
/// - anything else → other
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    classify_error_message(&error.to_string(), context)
}

fn classify_error_message(error_str: &str, context: &str) -> PlatformError {
    let detail = format!("Mastodon {} failed: {}", context, error_str);

    if let Some(status) = extract_http_status(error_str) {
        return classify_status(status, detail);
    }

    let error_lower = error_str.to_lowercase();
    if error_lower.contains("unauthorized")
        || error_lower.contains("forbidden")
        || error_lower.contains("token")
    {
        PlatformError::Authentication(detail)
    } else if error_lower.contains("validation") || error_lower.contains("unprocessable") {
        PlatformError::Validation(detail)
    } else if error_lower.contains("timed out")
        || error_lower.contains("timeout")
        || error_lower.contains("connect")
        || error_lower.contains("rate limit")
        || error_lower.contains("too many requests")
    {
        PlatformError::Transient(detail)
    } else {
        PlatformError::Other(detail)
    }
}

/// Extract an HTTP status code from an error message
///
/// Looks for patterns like "HTTP 401", "status 403" or a standalone "401:".
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code_str) = after_prefix.get(0..3) {
                if let Ok(code) = code_str.parse::<u16>() {
                    if (100..=599).contains(&code) {
                        return Some(code);
                    }
                }
            }
        }
    }

    let bytes = error_str.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        let is_code = window[..3].iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ')
            && (i == 0 || !bytes[i - 1].is_ascii_digit());
        if !is_code {
            continue;
        }
        if let Some(code) = std::str::from_utf8(&window[..3])
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        {
            if (100..=599).contains(&code) {
                return Some(code);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Metadata;
    use crate::format::WRAPPED_LINK_LENGTH;

    fn request(title: &str, summary: &str) -> PublishRequest {
        PublishRequest {
            slug: "post".to_string(),
            title: title.to_string(),
            summary: summary.to_string(),
            canonical_url: "https://mlship.dev/blog/a-rather-long-slug-for-a-post".to_string(),
            pending_platforms: vec!["mastodon".to_string()],
            metadata: Metadata::new(title, "post"),
            body: None,
        }
    }

    fn channel(max_characters: usize) -> MastodonChannel {
        MastodonChannel::new(
            Some("https://mastodon.social".to_string()),
            None,
            max_characters,
            Duration::from_secs(10),
        )
        .unwrap()
    }

    #[test]
    fn test_format_with_hashtags() {
        let message = channel(500).format(&request("Hello", "Abstract.")).unwrap();
        assert_eq!(
            message.as_text().unwrap(),
            "📝 Hello\n\nAbstract.\n\nhttps://mlship.dev/blog/a-rather-long-slug-for-a-post\n\n#TechBlog #Programming #WebDev"
        );
    }

    #[test]
    fn test_format_truncates_with_link_counted_as_23() {
        let req = request("Title", &"lorem ipsum ".repeat(100));
        let message = channel(500).format(&req).unwrap();
        let text = message.as_text().unwrap();

        assert!(text.contains("...\n\nhttps://"));
        assert!(text.ends_with(HASHTAGS));

        let counted = text.chars().count() - req.canonical_url.chars().count() + WRAPPED_LINK_LENGTH;
        assert!(counted <= 500, "counted {}", counted);
        assert!(counted >= 490, "budget should be used, counted {}", counted);
    }

    #[test]
    fn test_format_counts_short_links_in_abstract_as_23() {
        let req = request("Title", &"see https://a.io ".repeat(60));
        let text = channel(500).format(&req).unwrap().to_string();

        let counted = LengthRule::Mastodon.text_len(&text);
        assert!(counted <= 500, "counted {}", counted);
        assert!(text.contains("https://a.io"));
        assert!(!text.contains("https://a.i..."));
    }

    #[test]
    fn test_instance_limit_is_configurable() {
        let req = request("Title", &"a".repeat(600));
        let text = channel(1000).format(&req).unwrap().to_string();
        assert!(!text.contains("..."));
    }

    #[test]
    fn test_normalize_instance_url() {
        assert_eq!(normalize_instance_url("mastodon.social"), "https://mastodon.social");
        assert_eq!(normalize_instance_url("https://fosstodon.org/"), "https://fosstodon.org");
        assert_eq!(normalize_instance_url("  "), "");
    }

    #[tokio::test]
    async fn test_publish_without_token_is_auth_failure() {
        let err = channel(500)
            .publish(&Message::Text("hi".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Authentication(_)));
    }

    #[test]
    fn test_classify_error_message_with_status() {
        assert_eq!(
            classify_error_message("HTTP 401 Unauthorized", "post status").kind(),
            "failed-auth"
        );
        assert_eq!(
            classify_error_message("Failed with 422: Validation failed: Text character limit of 500 exceeded", "post status").kind(),
            "failed-validation"
        );
        assert_eq!(classify_error_message("status 429", "post status").kind(), "failed-transient");
        assert_eq!(classify_error_message("HTTP 503", "post status").kind(), "failed-transient");
        assert_eq!(classify_error_message("HTTP 404", "post status").kind(), "failed-other");
    }

    #[test]
    fn test_classify_error_message_without_status() {
        assert_eq!(
            classify_error_message("The access token is invalid", "post status").kind(),
            "failed-auth"
        );
        assert_eq!(
            classify_error_message("error trying to connect: dns error", "post status").kind(),
            "failed-transient"
        );
        assert_eq!(
            classify_error_message("unexpected end of JSON input", "post status").kind(),
            "failed-other"
        );

        let err = classify_error_message("Something went wrong", "post status");
        assert_eq!(err.detail(), "Mastodon post status failed: Something went wrong");
    }

    #[test]
    fn test_extract_http_status_with_prefixes() {
        assert_eq!(extract_http_status("HTTP 401 Unauthorized"), Some(401));
        assert_eq!(extract_http_status("status 404 not found"), Some(404));
        assert_eq!(extract_http_status("code: 401"), Some(401));
        assert_eq!(extract_http_status("status_code: 429"), Some(429));
    }

    #[test]
    fn test_extract_http_status_standalone() {
        assert_eq!(extract_http_status("Error: 401: Unauthorized"), Some(401));
        assert_eq!(
            extract_http_status("Received status 429 from server"),
            Some(429)
        );
    }

    #[test]
    fn test_extract_http_status_rejects_non_codes() {
        assert_eq!(extract_http_status("Network error"), None);
        assert_eq!(extract_http_status("HTTP 999"), None);
        assert_eq!(extract_http_status("HTTP 99"), None);
        assert_eq!(extract_http_status("1234"), None);
        assert_eq!(extract_http_status("id 12345 rejected"), None);
    }
}
