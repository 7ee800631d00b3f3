//! Crosspost - announce blog posts on social and content platforms exactly once
//!
//! Each content item is a markdown file whose frontmatter declares the platforms it
//! targets and records the ones it has been posted to. This library detects pending
//! (item, platform) pairs, formats a message that fits each platform, publishes it, and
//! records every confirmed success back into the item.

pub mod committer;
pub mod config;
pub mod detect;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod frontmatter;
pub mod git;
pub mod logging;
pub mod planner;
pub mod platforms;
pub mod types;

// Re-export commonly used types
pub use committer::StateCommitter;
pub use config::Config;
pub use detect::{ChangeDetector, DetectionMode, RevisionSource};
pub use dispatcher::{DispatchOptions, Dispatcher, RunReport};
pub use error::{CrosspostError, Result};
pub use frontmatter::{Document, FrontmatterStore, Metadata};
pub use planner::{DetectionReport, Planner, PublishPlan};
pub use types::{Message, PublishOutcome, PublishRequest, Receipt, SkipReason};
