//! Mock channel for testing
//!
//! A configurable [`Channel`] that formats like a plain text channel and records every
//! publish call instead of touching the network. Used by the orchestration tests to
//! drive success and failure paths without credentials.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{FormatError, PlatformError};
use crate::format::{Frame, LengthRule, Limits};
use crate::platforms::Channel;
use crate::types::{Message, PublishRequest, Receipt};

/// Configuration for mock channel behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform identifier the channel answers to (e.g. "telegram")
    pub name: String,

    /// Error returned by every publish call, `None` for success
    pub publish_error: Option<PlatformError>,

    /// Delay before completing a publish (simulates network latency)
    pub delay: Duration,

    /// Message ceiling used by `format`
    pub max_length: usize,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Messages that have been published (for verification)
    pub published: Arc<Mutex<Vec<Message>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            publish_error: None,
            delay: Duration::from_millis(0),
            max_length: 500,
            publish_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock channel for testing
///
/// Clones share their counters, so a test can keep a handle while the dispatcher owns
/// the boxed channel.
#[derive(Debug, Clone)]
pub struct MockChannel {
    config: MockConfig,
}

impl MockChannel {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock channel that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock channel whose publish calls fail with `error`
    pub fn failure(name: &str, error: PlatformError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            publish_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock channel with a message ceiling
    pub fn with_limit(name: &str, max_length: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            max_length,
            ..Default::default()
        })
    }

    /// Create a mock channel that waits before answering
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    /// Get the number of times publish was called
    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    /// Get all messages passed to publish
    pub fn published(&self) -> Vec<Message> {
        self.config.published.lock().unwrap().clone()
    }

    /// Boxed clone sharing this channel's counters
    pub fn boxed(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn format(&self, request: &PublishRequest) -> Result<Message, FormatError> {
        let limits = Limits::new(self.config.max_length, LengthRule::Chars);
        let frame = Frame::new(request.title.as_str(), request.canonical_url.as_str());
        let text = limits.fit(&self.config.name, &frame, &request.summary)?;
        Ok(Message::Text(text))
    }

    async fn publish(&self, message: &Message) -> Result<Receipt, PlatformError> {
        let call = {
            let mut count = self.config.publish_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.publish_error {
            return Err(error.clone());
        }

        self.config.published.lock().unwrap().push(message.clone());

        Ok(Receipt {
            remote_id: Some(format!("{}-{}", self.config.name, call)),
            remote_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Metadata;

    fn request() -> PublishRequest {
        PublishRequest {
            slug: "hello".to_string(),
            title: "Hello".to_string(),
            summary: "World".to_string(),
            canonical_url: "https://mlship.dev/blog/hello".to_string(),
            pending_platforms: vec!["mock".to_string()],
            metadata: Metadata::new("Hello", "hello"),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_mock_success_records_messages() {
        let channel = MockChannel::success("telegram");
        let handle = channel.clone();

        let message = channel.format(&request()).unwrap();
        let receipt = channel.publish(&message).await.unwrap();

        assert_eq!(receipt.remote_id.as_deref(), Some("telegram-1"));
        assert_eq!(handle.publish_call_count(), 1);
        assert_eq!(handle.published(), vec![message]);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let channel = MockChannel::failure("twitter", PlatformError::Validation("too long".into()));
        let message = channel.format(&request()).unwrap();

        let err = channel.publish(&message).await.unwrap_err();
        assert_eq!(err, PlatformError::Validation("too long".into()));
        assert_eq!(channel.publish_call_count(), 1);
        assert!(channel.published().is_empty());
    }

    #[test]
    fn test_mock_limit_overflow() {
        let channel = MockChannel::with_limit("tiny", 10);
        let err = channel.format(&request()).unwrap_err();
        assert!(matches!(err, FormatError::Overflow { .. }));
    }

    #[tokio::test]
    async fn test_mock_delay() {
        let channel = MockChannel::with_delay("slow", Duration::from_millis(20));
        let start = std::time::Instant::now();
        channel.publish(&Message::Text("x".into())).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
