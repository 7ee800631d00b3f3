//! Publish orchestration
//!
//! Walks a [`PublishPlan`] sequentially (items in plan order, platforms in declaration
//! order), formats and publishes each pending (item, platform) pair through its channel,
//! and hands every confirmed success to the [`StateCommitter`]. Failures are isolated to
//! their pair; nothing here aborts the run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::committer::StateCommitter;
use crate::config::SiteConfig;
use crate::detect::{ChangeDetector, RevisionSource};
use crate::error::{PlatformError, Result};
use crate::frontmatter::FrontmatterStore;
use crate::planner::{DetectionReport, Planner, PublishPlan};
use crate::platforms::{Channel, ChannelKind};
use crate::types::{Message, PublishOutcome, PublishRequest, Receipt, SkipReason};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Format only; every formatted pair counts as succeeded without a network call
    pub dry_run: bool,
    /// Record successes in the items' metadata
    pub mark_posted: bool,
    /// Allow `mark_posted` to take effect during a dry run
    pub mark_dry_run: bool,
}

impl DispatchOptions {
    pub fn records(&self) -> bool {
        self.mark_posted && (!self.dry_run || self.mark_dry_run)
    }
}

/// Outcome of one (item, platform) pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairReport {
    pub item: String,
    pub platform: String,
    pub outcome: PublishOutcome,
    /// The formatted message, when formatting succeeded
    pub message: Option<Message>,
    /// Whether the success was written to the item's metadata
    pub recorded: bool,
    /// Why recording a success failed
    pub record_error: Option<String>,
}

impl PairReport {
    fn new(item: &str, platform: &str, outcome: PublishOutcome) -> Self {
        Self {
            item: item.to_string(),
            platform: platform.to_string(),
            outcome,
            message: None,
            recorded: false,
            record_error: None,
        }
    }
}

impl Serialize for PairReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Entry<'a> {
            item: &'a str,
            platform: &'a str,
            outcome: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            skip_reason: Option<SkipReason>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            receipt: Option<&'a Receipt>,
            #[serde(skip_serializing_if = "Option::is_none")]
            message: Option<&'a Message>,
            recorded: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            record_error: Option<&'a str>,
        }

        let (skip_reason, error, receipt) = match &self.outcome {
            PublishOutcome::Succeeded(receipt) => (None, None, Some(receipt)),
            PublishOutcome::Failed(error) => (None, Some(error.detail()), None),
            PublishOutcome::Skipped(reason) => (Some(*reason), None, None),
        };

        Entry {
            item: &self.item,
            platform: &self.platform,
            outcome: self.outcome.label(),
            skip_reason,
            error,
            receipt,
            message: self.message.as_ref(),
            recorded: self.recorded,
            record_error: self.record_error.as_deref(),
        }
        .serialize(serializer)
    }
}

/// Per-platform results artifact: `{successful_posts, platform}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformResults {
    pub successful_posts: Vec<String>,
    pub platform: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub pairs: Vec<PairReport>,
}

impl RunReport {
    /// Items that succeeded on `platform`, in run order
    pub fn successful_posts(&self, platform: &str) -> Vec<String> {
        let mut items: Vec<String> = Vec::new();
        for pair in &self.pairs {
            if pair.platform == platform && pair.outcome.is_success() && !items.contains(&pair.item) {
                items.push(pair.item.clone());
            }
        }
        items
    }

    pub fn results_for(&self, platform: &str) -> PlatformResults {
        PlatformResults {
            successful_posts: self.successful_posts(platform),
            platform: platform.to_string(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs.iter().filter(|pair| pair.outcome.is_failure())
    }

    /// Successes whose state could not be written
    pub fn unrecorded(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs.iter().filter(|pair| pair.record_error.is_some())
    }

    pub fn count(&self, label: &str) -> usize {
        self.pairs.iter().filter(|pair| pair.outcome.label() == label).count()
    }

    /// Items whose metadata was rewritten during the run, in run order
    pub fn rewritten_items(&self) -> Vec<PathBuf> {
        let mut items: Vec<PathBuf> = Vec::new();
        for pair in self.pairs.iter().filter(|pair| pair.recorded) {
            let item = PathBuf::from(&pair.item);
            if !items.contains(&item) {
                items.push(item);
            }
        }
        items
    }

    /// True when every attempted pair succeeded and was recorded as requested
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none() && self.unrecorded().next().is_none()
    }

    /// 0 when nothing failed, 1 when publish work was left undone
    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            0
        } else {
            1
        }
    }
}

pub struct Dispatcher {
    channels: Vec<Box<dyn Channel>>,
    committer: StateCommitter,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Channel>>, store: FrontmatterStore, options: DispatchOptions) -> Self {
        Self {
            channels,
            committer: StateCommitter::new(store),
            options,
        }
    }

    /// Whether any channel needs item bodies loaded into the requests
    pub fn needs_body(&self) -> bool {
        self.channels.iter().any(|channel| channel.needs_body())
    }

    pub fn platforms(&self) -> Vec<&str> {
        self.channels.iter().map(|channel| channel.name()).collect()
    }

    fn channel(&self, platform: &str) -> Option<&dyn Channel> {
        self.channels
            .iter()
            .find(|channel| channel.name() == platform)
            .map(|channel| channel.as_ref())
    }

    pub async fn dispatch(&self, plan: &PublishPlan) -> RunReport {
        let mut report = RunReport {
            dry_run: self.options.dry_run,
            pairs: Vec::new(),
        };

        for (item, request) in plan.iter() {
            info!(item, title = %request.title, url = %request.canonical_url, "Processing item");
            let mut request = request.clone();

            for platform in request.pending_platforms.clone() {
                let pair = self.dispatch_pair(item, &mut request, &platform).await;
                report.pairs.push(pair);
            }
        }

        info!(
            succeeded = report.count("succeeded"),
            failed = report.failures().count(),
            skipped = report.count("skipped"),
            dry_run = self.options.dry_run,
            "Run finished"
        );

        report
    }

    async fn dispatch_pair(&self, item: &str, request: &mut PublishRequest, platform: &str) -> PairReport {
        let Some(channel) = self.channel(platform) else {
            let reason = if platform.parse::<ChannelKind>().is_ok() {
                SkipReason::NotTargeted
            } else {
                SkipReason::Unsupported
            };
            debug!(item, platform, ?reason, "Skipping platform");
            return PairReport::new(item, platform, PublishOutcome::Skipped(reason));
        };

        let item_path = Path::new(item);

        if self.options.records() && self.already_posted(item_path, platform) {
            info!(item, platform, "Already recorded as posted, skipping");
            return PairReport::new(item, platform, PublishOutcome::Skipped(SkipReason::AlreadyPosted));
        }

        if channel.needs_body() && request.body.is_none() {
            match self.committer.store().read(item_path) {
                Ok(document) => request.body = Some(document.body().to_string()),
                Err(e) => warn!(item, "Cannot load body: {}", e),
            }
        }

        let message = match channel.format(request) {
            Ok(message) => message,
            Err(e) => {
                warn!(item, platform, "Cannot format message: {}", e);
                return PairReport::new(
                    item,
                    platform,
                    PublishOutcome::Failed(PlatformError::Validation(e.to_string())),
                );
            }
        };

        let outcome = if self.options.dry_run {
            info!(item, platform, "Dry run, would post:\n{}", message);
            PublishOutcome::Succeeded(Receipt::default())
        } else {
            match channel.publish(&message).await {
                Ok(receipt) => {
                    info!(item, platform, remote_id = ?receipt.remote_id, "Published");
                    PublishOutcome::Succeeded(receipt)
                }
                Err(e) => {
                    warn!(item, platform, kind = e.kind(), "Publish failed: {}", e.detail());
                    PublishOutcome::Failed(e)
                }
            }
        };

        let mut pair = PairReport::new(item, platform, outcome);
        pair.message = Some(message);

        if pair.outcome.is_success() && self.options.records() {
            match self.committer.commit(item_path, platform) {
                Ok(_) => pair.recorded = true,
                Err(e) => {
                    warn!(item, platform, "Published but could not record state: {}", e);
                    pair.record_error = Some(e.to_string());
                }
            }
        }

        pair
    }

    fn already_posted(&self, item: &Path, platform: &str) -> bool {
        self.committer
            .store()
            .read(item)
            .map(|document| document.metadata.is_posted(platform))
            .unwrap_or(false)
    }
}

/// One detection + dispatch cycle over the working set
pub async fn run_cycle<S: RevisionSource>(
    detector: &ChangeDetector<S>,
    store: &FrontmatterStore,
    site: &SiteConfig,
    dispatcher: &Dispatcher,
) -> Result<(DetectionReport, RunReport)> {
    let working_set = detector.detect()?;
    let detection = Planner::new(store, site)
        .with_body(dispatcher.needs_body())
        .plan(&working_set.items);
    let run = dispatcher.dispatch(&detection.plan).await;
    Ok((detection, run))
}
