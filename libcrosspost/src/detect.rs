//! Change detection
//!
//! Determines which content items a run examines. The primary source is the revision
//! history (files touched by the latest revision). When that is unavailable the detector
//! falls back to every markdown file in the content directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CrosspostError, GitError, Result};
use crate::git::Git;

/// Where the list of recently changed files comes from
pub trait RevisionSource {
    /// Paths relative to the repository root touched by the latest revision
    fn changed_paths(&self) -> std::result::Result<Vec<PathBuf>, GitError>;
}

impl RevisionSource for Git {
    fn changed_paths(&self) -> std::result::Result<Vec<PathBuf>, GitError> {
        Git::changed_paths(self)
    }
}

/// How the working set was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    Revision,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSet {
    pub mode: DetectionMode,
    /// Item identifiers relative to the repository root, in detection order
    pub items: Vec<PathBuf>,
}

pub struct ChangeDetector<S> {
    repo_root: PathBuf,
    content_dir: PathBuf,
    source: S,
}

impl ChangeDetector<Git> {
    /// Detector backed by the `git` command line in `repo_root`
    pub fn with_git(repo_root: impl Into<PathBuf>, content_dir: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let source = Git::new(repo_root.clone());
        Self::new(repo_root, content_dir, source)
    }
}

impl<S: RevisionSource> ChangeDetector<S> {
    pub fn new(repo_root: impl Into<PathBuf>, content_dir: impl Into<PathBuf>, source: S) -> Self {
        // git reports plain relative paths, so `./blog_posts` must compare as `blog_posts`
        let content_dir: PathBuf = content_dir
            .into()
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();

        Self {
            repo_root: repo_root.into(),
            content_dir,
            source,
        }
    }

    /// Produces the ordered working set
    ///
    /// # Errors
    ///
    /// Only when the fallback cannot list the content directory.
    pub fn detect(&self) -> Result<WorkingSet> {
        match self.source.changed_paths() {
            Ok(paths) => {
                let items = self.filter_revision_paths(paths);
                debug!(count = items.len(), "Items changed in the latest revision");
                Ok(WorkingSet {
                    mode: DetectionMode::Revision,
                    items,
                })
            }
            Err(e) => {
                warn!(
                    "Revision history unavailable ({}), examining every item in {}",
                    e,
                    self.content_dir.display()
                );
                Ok(WorkingSet {
                    mode: DetectionMode::Fallback,
                    items: self.all_items()?,
                })
            }
        }
    }

    fn filter_revision_paths(&self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut items = Vec::new();
        for path in paths {
            if !self.is_content_item(&path) {
                continue;
            }
            if !self.repo_root.join(&path).is_file() {
                debug!(item = %path.display(), "Changed item no longer exists, skipping");
                continue;
            }
            if !items.contains(&path) {
                items.push(path);
            }
        }
        items
    }

    /// Direct children of the content directory with a `.md` extension
    fn is_content_item(&self, path: &Path) -> bool {
        path.parent() == Some(self.content_dir.as_path()) && is_markdown(path)
    }

    /// Every markdown file in the content directory, sorted by path
    pub fn all_items(&self) -> Result<Vec<PathBuf>> {
        let dir = self.repo_root.join(&self.content_dir);
        let entries = fs::read_dir(&dir).map_err(|e| {
            CrosspostError::Detection(format!("{}: {}", dir.display(), e))
        })?;

        let mut items = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| CrosspostError::Detection(format!("{}: {}", dir.display(), e)))?;
            let path = entry.path();
            if path.is_file() && is_markdown(&path) {
                items.push(self.content_dir.join(entry.file_name()));
            }
        }

        items.sort();
        Ok(items)
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}
