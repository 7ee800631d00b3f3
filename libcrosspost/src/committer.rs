//! State committer
//!
//! The only writer of `posted_to` and the `posted_<platform>_at` stamps. Every commit
//! re-reads the item from disk so that changes made since planning (another platform
//! recorded earlier in the same run, a manual edit) are never lost.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::frontmatter::FrontmatterStore;
use crate::git::{self, Git};

/// What a commit changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub item: PathBuf,
    pub platform: String,
    /// `false` when the platform was already in `posted_to` (only the stamp moved)
    pub newly_posted: bool,
    /// Whether a git commit was created for this change
    pub committed: bool,
}

pub struct StateCommitter {
    store: FrontmatterStore,
    git: Option<Git>,
}

impl StateCommitter {
    pub fn new(store: FrontmatterStore) -> Self {
        Self { store, git: None }
    }

    /// Also commit every rewritten item to git, one commit per (item, platform)
    pub fn with_git(mut self, git: Git) -> Self {
        self.git = Some(git);
        self
    }

    pub fn store(&self) -> &FrontmatterStore {
        &self.store
    }

    /// Records a confirmed publish of `item` to `platform`, stamped now
    pub fn commit(&self, item: &Path, platform: &str) -> Result<CommitRecord> {
        self.commit_at(item, platform, Utc::now())
    }

    /// Records a confirmed publish with an explicit timestamp
    ///
    /// # Errors
    ///
    /// Fails when the item cannot be re-read or rewritten, or when the requested git
    /// commit fails. In the last case the metadata is already written.
    pub fn commit_at(&self, item: &Path, platform: &str, at: DateTime<Utc>) -> Result<CommitRecord> {
        let mut document = self.store.read(item)?;
        let newly_posted = document.metadata.mark_posted(platform, at);
        self.store.write(item, &document)?;

        info!(item = %item.display(), platform, "Recorded as posted");

        let committed = match &self.git {
            Some(git) => {
                let committed = git.commit_paths(
                    &[item.to_path_buf()],
                    &git::mark_message(item, platform),
                )?;
                if !committed {
                    warn!(item = %item.display(), "Nothing to commit for state change");
                }
                committed
            }
            None => false,
        };

        Ok(CommitRecord {
            item: item.to_path_buf(),
            platform: platform.to_string(),
            newly_posted,
            committed,
        })
    }
}
