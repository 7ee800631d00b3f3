//! cross-detect - find blog posts with platforms still to announce on

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use libcrosspost::git::Git;
use libcrosspost::logging::LoggingConfig;
use libcrosspost::{ChangeDetector, Config, CrosspostError, FrontmatterStore, Planner, StateCommitter};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cross-detect")]
#[command(version, about = "Detect blog posts that still need to be announced")]
#[command(long_about = r#"Detect blog posts that still need to be announced on their platforms.

Examines the markdown files touched by the latest git revision (or every post when the
history is unavailable) and prints a JSON object mapping each post with pending
platforms to its publish request. The same tool records a confirmed publish with
--update.

EXAMPLES:
    # Posts changed in the last commit with pending platforms
    cross-detect

    # Every post, regardless of history
    cross-detect --all

    # Pipe into the publisher
    cross-detect | cross-publish --platform telegram

    # Record a publish and commit the change
    cross-detect --update blog_posts/hello.md:twitter --commit

EXIT CODES:
    0 - Pending work found (or update recorded)
    1 - Nothing pending
    2 - Error (unreadable content directory, failed update, git failure)
    3 - Invalid input (malformed FILE:PLATFORM)
"#)]
struct Cli {
    /// Record FILE as posted to PLATFORM instead of detecting
    #[arg(long, value_name = "FILE:PLATFORM")]
    update: Option<String>,

    /// Commit the updated file to git (with --update)
    #[arg(long, requires = "update")]
    commit: bool,

    /// Examine every post instead of the latest revision
    #[arg(long, conflicts_with = "update")]
    all: bool,

    /// Configuration file (default: ~/.config/crosspost/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Repository root, overriding the configuration
    #[arg(long, value_name = "DIR")]
    repo_root: Option<PathBuf>,

    /// Content directory relative to the repository root, overriding the configuration
    #[arg(long, value_name = "DIR")]
    content_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<CrosspostError>()
                .map(CrosspostError::exit_code)
                .unwrap_or(2);
            std::process::exit(code);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.repo_root {
        config.content.repo_root = root;
    }
    if let Some(dir) = cli.content_dir {
        config.content.content_dir = dir;
    }

    match &cli.update {
        Some(spec) => update(&config, spec, cli.commit),
        None => detect(&config, cli.all),
    }
}

fn detect(config: &Config, all: bool) -> Result<i32> {
    let root = &config.content.repo_root;
    let detector = ChangeDetector::with_git(root, &config.content.content_dir);
    let items = if all {
        detector.all_items()?
    } else {
        detector.detect()?.items
    };
    info!(count = items.len(), "Examining content items");

    let store = FrontmatterStore::new(root);
    let report = Planner::new(&store, &config.site).plan(&items);

    println!("{}", serde_json::to_string_pretty(&report.plan)?);

    Ok(if report.has_work() { 0 } else { 1 })
}

fn update(config: &Config, spec: &str, commit: bool) -> Result<i32> {
    let (item, platform) = parse_update(spec)?;
    let root = &config.content.repo_root;

    let mut committer = StateCommitter::new(FrontmatterStore::new(root));
    if commit {
        committer = committer.with_git(Git::new(root));
    }

    let record = committer.commit(Path::new(item), platform)?;
    println!("Marked {} as posted to {}", record.item.display(), record.platform);
    Ok(0)
}

fn parse_update(spec: &str) -> std::result::Result<(&str, &str), CrosspostError> {
    match spec.rsplit_once(':') {
        Some((file, platform)) if !file.trim().is_empty() && !platform.trim().is_empty() => {
            Ok((file.trim(), platform.trim()))
        }
        _ => Err(CrosspostError::InvalidInput(format!(
            "--update expects FILE:PLATFORM, got '{}'",
            spec
        ))),
    }
}
