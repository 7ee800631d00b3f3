//! Thin wrapper around the `git` command line
//!
//! Used for two things: listing the files touched by the latest revision (change
//! detection) and committing rewritten metadata. All commands run in the repository root.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::GitError;

/// Suffix that keeps CI from re-triggering on state commits
pub const SKIP_CI: &str = "[skip ci]";

#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
}

impl Git {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        debug!(args = ?args, "Running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Err(GitError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: if stderr.is_empty() { stdout } else { stderr },
            })
        }
    }

    /// Paths (relative to the root) touched between `HEAD~1` and `HEAD`
    ///
    /// Fails when the directory is not a repository or `HEAD` has no parent.
    /// Paths are read NUL-separated so git never quotes non-ASCII names.
    pub fn changed_paths(&self) -> Result<Vec<PathBuf>, GitError> {
        let output = self.run(&["diff", "--name-only", "-z", "HEAD~1", "HEAD"])?;
        Ok(output
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Stages and commits the given paths
    ///
    /// Returns `false` when there was nothing to commit.
    pub fn commit_paths(&self, paths: &[PathBuf], message: &str) -> Result<bool, GitError> {
        if paths.is_empty() {
            return Ok(false);
        }

        let path_args: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let mut add = vec!["add", "--"];
        add.extend(path_args.iter().map(String::as_str));
        self.run(&add)?;

        let mut commit = vec!["commit", "-m", message, "--"];
        commit.extend(path_args.iter().map(String::as_str));
        match self.run(&commit) {
            Ok(_) => Ok(true),
            Err(GitError::Command { stderr, .. }) if is_noop_commit(&stderr) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn is_noop_commit(output: &str) -> bool {
    ["nothing to commit", "nothing added to commit", "no changes added to commit"]
        .iter()
        .any(|phrase| output.contains(phrase))
}

/// Commit message for a single (item, platform) state change
pub fn mark_message(item: &Path, platform: &str) -> String {
    format!(
        "Mark {} as posted to {} {}",
        item.display(),
        platform,
        SKIP_CI
    )
}

/// Commit message for the files rewritten by a publish run
pub fn batch_message(count: usize) -> String {
    format!("Update posting status for {} blog post(s) {}", count, SKIP_CI)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::process::Command;

    pub fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub fn git(root: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(root)
            .output()
            .unwrap();
        assert!(
            status.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&status.stderr)
        );
    }

    pub fn init_repo(root: &Path) {
        git(root, &["init", "-q"]);
        git(root, &["config", "user.email", "test@example.com"]);
        git(root, &["config", "user.name", "Test"]);
        git(root, &["config", "commit.gpgsign", "false"]);
    }

    pub fn commit_all(root: &Path, message: &str) {
        git(root, &["add", "-A"]);
        git(root, &["commit", "-q", "-m", message]);
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_messages() {
        assert_eq!(
            mark_message(Path::new("blog_posts/a.md"), "telegram"),
            "Mark blog_posts/a.md as posted to telegram [skip ci]"
        );
        assert_eq!(
            batch_message(2),
            "Update posting status for 2 blog post(s) [skip ci]"
        );
    }

    #[test]
    fn test_changed_paths_outside_repository_fails() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let result = Git::new(dir.path()).changed_paths();
        assert!(matches!(result, Err(GitError::Command { .. })));
    }

    #[test]
    fn test_changed_paths_first_commit_fails() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("a.md"), "a").unwrap();
        commit_all(dir.path(), "first");

        assert!(Git::new(dir.path()).changed_paths().is_err());
    }

    #[test]
    fn test_changed_paths_lists_latest_revision() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        init_repo(root);
        fs::create_dir(root.join("blog_posts")).unwrap();
        fs::write(root.join("blog_posts/old.md"), "old").unwrap();
        commit_all(root, "first");

        fs::write(root.join("blog_posts/new.md"), "new").unwrap();
        fs::write(root.join("README"), "readme").unwrap();
        commit_all(root, "second");

        let mut changed = Git::new(root).changed_paths().unwrap();
        changed.sort();
        assert_eq!(
            changed,
            vec![PathBuf::from("README"), PathBuf::from("blog_posts/new.md")]
        );
    }

    #[test]
    fn test_changed_paths_keeps_non_ascii_names() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        init_repo(root);
        fs::create_dir(root.join("blog_posts")).unwrap();
        fs::write(root.join("blog_posts/old.md"), "old").unwrap();
        commit_all(root, "first");

        fs::write(root.join("blog_posts/café.md"), "new").unwrap();
        fs::write(root.join("blog_posts/with space.md"), "new").unwrap();
        commit_all(root, "second");

        let mut changed = Git::new(root).changed_paths().unwrap();
        changed.sort();
        assert_eq!(
            changed,
            vec![
                PathBuf::from("blog_posts/café.md"),
                PathBuf::from("blog_posts/with space.md"),
            ]
        );
    }

    #[test]
    fn test_commit_paths() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        init_repo(root);
        fs::write(root.join("a.md"), "a").unwrap();
        commit_all(root, "first");

        let git = Git::new(root);
        fs::write(root.join("a.md"), "changed").unwrap();
        assert!(git
            .commit_paths(&[PathBuf::from("a.md")], &batch_message(1))
            .unwrap());

        let log = git.run(&["log", "-1", "--format=%s"]).unwrap();
        assert_eq!(log.trim(), "Update posting status for 1 blog post(s) [skip ci]");

        assert!(!git
            .commit_paths(&[PathBuf::from("a.md")], &batch_message(1))
            .unwrap());
        assert!(!git.commit_paths(&[], "unused").unwrap());
    }
}
