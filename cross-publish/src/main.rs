//! cross-publish - announce pending blog posts on their platforms

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use libcrosspost::config::DevToMode;
use libcrosspost::dispatcher::PairReport;
use libcrosspost::git::{self, Git};
use libcrosspost::logging::LoggingConfig;
use libcrosspost::platforms::{create_channels, ChannelKind, Credentials};
use libcrosspost::{
    ChangeDetector, Config, CrosspostError, DispatchOptions, Dispatcher, FrontmatterStore,
    Planner, PublishOutcome, PublishPlan, RunReport,
};
use secrecy::SecretString;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "cross-publish")]
#[command(version, about = "Announce pending blog posts on their platforms")]
#[command(long_about = r#"Announce pending blog posts on their platforms.

Reads the JSON printed by cross-detect (from stdin or --posts-json), or runs detection
itself with --detect, then formats and publishes one message per pending (post,
platform) pair. Platforms are handled one after the other; a failure on one pair never
stops the others.

For each selected platform a <platform>_results.json file listing the successfully
posted files is written to --results-dir.

EXAMPLES:
    # Preview every message without posting
    cross-detect | cross-publish --platform twitter,telegram --dry-run

    # Post and record the results in the posts' frontmatter
    cross-publish --detect --platform telegram --mark-posted

    # Record and commit, as a CI job would
    cross-publish --detect --mark-posted --git-commit

    # Machine-readable report
    cross-publish --posts-json posts.json --platform devto --format json

CREDENTIALS (flag or environment):
    twitter   TWITTER_API_KEY, TWITTER_API_SECRET,
              TWITTER_ACCESS_TOKEN, TWITTER_ACCESS_TOKEN_SECRET (OAuth 1.0a)
    mastodon  MASTODON_INSTANCE_URL, MASTODON_ACCESS_TOKEN
    telegram  TELEGRAM_BOT_TOKEN, TELEGRAM_CHANNEL_ID
    devto     DEVTO_API_KEY

EXIT CODES:
    0 - Every attempted pair succeeded (including nothing to do)
    1 - At least one pair failed or could not be recorded
    2 - Error (missing credentials, unreadable content, git failure, results not
        written; the report is still printed when publishing already happened)
    3 - Invalid input (unknown platform, malformed posts JSON)
"#)]
struct Cli {
    /// Platforms to publish to (comma-separated: twitter, mastodon, telegram, devto; default: all)
    #[arg(short, long, value_delimiter = ',')]
    platform: Option<Vec<String>>,

    /// Detection JSON to read instead of stdin
    #[arg(long, value_name = "FILE", conflicts_with = "detect")]
    posts_json: Option<PathBuf>,

    /// Run detection instead of reading detection JSON
    #[arg(long)]
    detect: bool,

    /// Examine every post during --detect, not only the latest revision
    #[arg(long, requires = "detect")]
    all: bool,

    /// Format messages without posting
    #[arg(long)]
    dry_run: bool,

    /// Record successes in the posts' frontmatter
    #[arg(long)]
    mark_posted: bool,

    /// Let --mark-posted record dry-run successes too
    #[arg(long, requires = "mark_posted")]
    mark_dry_run: bool,

    /// Commit the rewritten posts to git after the run
    #[arg(long, requires = "mark_posted")]
    git_commit: bool,

    /// Report format on stdout
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Directory receiving the <platform>_results.json files
    #[arg(long, value_name = "DIR", default_value = ".")]
    results_dir: PathBuf,

    /// Configuration file (default: ~/.config/crosspost/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Repository root, overriding the configuration
    #[arg(long, value_name = "DIR")]
    repo_root: Option<PathBuf>,

    /// Content directory relative to the repository root, overriding the configuration
    #[arg(long, value_name = "DIR")]
    content_dir: Option<PathBuf>,

    /// Dev.to mode (link or full), overriding the configuration
    #[arg(long, value_name = "MODE")]
    devto_mode: Option<DevToMode>,

    #[arg(long, env = "TWITTER_API_KEY", hide_env_values = true)]
    twitter_api_key: Option<String>,

    #[arg(long, env = "TWITTER_API_SECRET", hide_env_values = true)]
    twitter_api_secret: Option<String>,

    #[arg(long, env = "TWITTER_ACCESS_TOKEN", hide_env_values = true)]
    twitter_access_token: Option<String>,

    #[arg(long, env = "TWITTER_ACCESS_TOKEN_SECRET", hide_env_values = true)]
    twitter_access_token_secret: Option<String>,

    #[arg(long, env = "MASTODON_INSTANCE_URL")]
    mastodon_instance_url: Option<String>,

    #[arg(long, env = "MASTODON_ACCESS_TOKEN", hide_env_values = true)]
    mastodon_access_token: Option<String>,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_bot_token: Option<String>,

    #[arg(long, env = "TELEGRAM_CHANNEL_ID")]
    telegram_channel_id: Option<String>,

    #[arg(long, env = "DEVTO_API_KEY", hide_env_values = true)]
    devto_api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn credentials(&mut self) -> Credentials {
        let secret = |value: Option<String>| {
            value
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };

        Credentials {
            twitter_api_key: secret(self.twitter_api_key.take()),
            twitter_api_secret: secret(self.twitter_api_secret.take()),
            twitter_access_token: secret(self.twitter_access_token.take()),
            twitter_access_token_secret: secret(self.twitter_access_token_secret.take()),
            mastodon_instance_url: self.mastodon_instance_url.take().filter(|v| !v.trim().is_empty()),
            mastodon_access_token: secret(self.mastodon_access_token.take()),
            telegram_bot_token: secret(self.telegram_bot_token.take()),
            telegram_channel_id: self.telegram_channel_id.take().filter(|v| !v.trim().is_empty()),
            devto_api_key: secret(self.devto_api_key.take()),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
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

async fn run(mut cli: Cli) -> Result<i32> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.repo_root.take() {
        config.content.repo_root = root;
    }
    if let Some(dir) = cli.content_dir.take() {
        config.content.content_dir = dir;
    }
    if let Some(mode) = cli.devto_mode {
        config.devto.mode = mode;
    }

    let kinds = match &cli.platform {
        Some(names) => parse_platforms(names)?,
        None => ChannelKind::ALL.to_vec(),
    };
    let channels = create_channels(&config, cli.credentials(), &kinds, !cli.dry_run)?;

    let options = DispatchOptions {
        dry_run: cli.dry_run,
        mark_posted: cli.mark_posted,
        mark_dry_run: cli.mark_dry_run,
    };
    let root = config.content.repo_root.clone();
    let store = FrontmatterStore::new(&root);
    let dispatcher = Dispatcher::new(channels, store.clone(), options);
    info!(platforms = ?dispatcher.platforms(), dry_run = options.dry_run, "Channels ready");

    let plan = if cli.detect {
        let detector = ChangeDetector::with_git(&root, &config.content.content_dir);
        let items = if cli.all {
            detector.all_items()?
        } else {
            detector.detect()?.items
        };
        Planner::new(&store, &config.site)
            .with_body(dispatcher.needs_body())
            .plan(&items)
            .plan
    } else {
        read_plan(cli.posts_json.as_deref())?
    };

    if plan.is_empty() {
        info!("No posts to publish");
    }

    let report = dispatcher.dispatch(&plan).await;

    // The report is printed before any step that can still fail
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }

    let mut exit_code = report.exit_code();
    for kind in &kinds {
        if let Err(e) = write_results(&cli.results_dir, &report, kind.as_str()) {
            report_error(&e);
            exit_code = 2;
        }
    }

    if cli.git_commit {
        if let Err(e) = commit_rewritten(&root, &report) {
            report_error(&e);
            exit_code = 2;
        }
    }

    Ok(exit_code)
}

fn report_error(e: &anyhow::Error) {
    error!("{:#}", e);
    eprintln!("Error: {:#}", e);
}

fn parse_platforms(names: &[String]) -> std::result::Result<Vec<ChannelKind>, CrosspostError> {
    let mut kinds = Vec::new();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let kind = name.parse::<ChannelKind>().map_err(CrosspostError::InvalidInput)?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(CrosspostError::InvalidInput("no platform selected".to_string()));
    }
    Ok(kinds)
}

/// Detection JSON from a file or stdin; empty input means nothing to publish
fn read_plan(path: Option<&Path>) -> Result<PublishPlan> {
    let input = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read detection JSON from stdin")?;
            buffer
        }
    };

    if input.trim().is_empty() {
        return Ok(PublishPlan::new());
    }

    let plan = serde_json::from_str(&input)
        .map_err(|e| CrosspostError::InvalidInput(format!("malformed detection JSON: {}", e)))?;
    Ok(plan)
}

fn write_results(dir: &Path, report: &RunReport, platform: &str) -> Result<()> {
    let results = report.results_for(platform);
    let path = dir.join(format!("{}_results.json", platform));
    fs::write(&path, serde_json::to_string_pretty(&results)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(
        platform,
        count = results.successful_posts.len(),
        path = %path.display(),
        "Wrote results"
    );
    Ok(())
}

fn commit_rewritten(root: &Path, report: &RunReport) -> Result<()> {
    let items = report.rewritten_items();
    if items.is_empty() {
        return Ok(());
    }

    let committed = Git::new(root)
        .commit_paths(&items, &git::batch_message(items.len()))
        .map_err(CrosspostError::from)?;
    if committed {
        info!(count = items.len(), "Committed posting status");
    } else {
        warn!("No posting status changes to commit");
    }
    Ok(())
}

fn print_text(report: &RunReport) {
    for pair in &report.pairs {
        println!("{}", describe(pair));
        if report.dry_run {
            if let Some(message) = &pair.message {
                println!("--- {} ---\n{}\n--- end ---", pair.platform, message);
            }
        }
    }

    println!(
        "{} succeeded, {} failed, {} skipped{}",
        report.count("succeeded"),
        report.failures().count(),
        report.count("skipped"),
        if report.dry_run { " (dry run)" } else { "" }
    );
}

fn describe(pair: &PairReport) -> String {
    let mut line = match &pair.outcome {
        PublishOutcome::Succeeded(receipt) => {
            let mut line = format!("✓ {} → {}", pair.item, pair.platform);
            if let Some(url) = &receipt.remote_url {
                line.push_str(&format!(" ({})", url));
            }
            line
        }
        PublishOutcome::Failed(error) => format!(
            "✗ {} → {} [{}] {}",
            pair.item,
            pair.platform,
            error.kind(),
            error.detail()
        ),
        PublishOutcome::Skipped(reason) => format!(
            "○ {} → {} skipped ({})",
            pair.item,
            pair.platform,
            reason.as_str()
        ),
    };

    if let Some(error) = &pair.record_error {
        line.push_str(&format!(" [not recorded: {}]", error));
    }
    line
}
