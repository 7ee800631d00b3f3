//! CLI integration tests for cross-publish
//!
//! Only dry runs and argument errors are exercised here; nothing reaches a network.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const POST: &str = "---
title: Hello World
slug: hello-world
excerpt: A first post.
platforms: [telegram, twitter]
---

Body text.
";

const PLAN: &str = r#"{
  "blog_posts/hello.md": {
    "slug": "hello-world",
    "title": "Hello World",
    "abstract": "A first post.",
    "url": "https://blog.example/posts/hello-world",
    "platforms": ["telegram", "twitter"],
    "metadata": {
      "title": "Hello World",
      "slug": "hello-world",
      "excerpt": "A first post.",
      "platforms": ["telegram", "twitter"],
      "posted_to": []
    }
  }
}"#;

const CREDENTIAL_VARS: [&str; 9] = [
    "TWITTER_API_KEY",
    "TWITTER_API_SECRET",
    "TWITTER_ACCESS_TOKEN",
    "TWITTER_ACCESS_TOKEN_SECRET",
    "MASTODON_INSTANCE_URL",
    "MASTODON_ACCESS_TOKEN",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHANNEL_ID",
    "DEVTO_API_KEY",
];

fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    let content = dir.path().join("blog_posts");
    fs::create_dir_all(&content).unwrap();
    fs::write(content.join("hello.md"), POST).unwrap();
    fs::write(dir.path().join("posts.json"), PLAN).unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[site]\norigin = \"https://blog.example\"\npost_path = \"/posts\"\n",
    )
    .unwrap();
    dir
}

fn cross_publish(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cross-publish").unwrap();
    cmd.env_remove("CROSSPOST_CONFIG")
        .env("CROSSPOST_LOG_LEVEL", "warn")
        .arg("--config")
        .arg(root.join("config.toml"))
        .arg("--repo-root")
        .arg(root)
        .arg("--results-dir")
        .arg(root);
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn read_results(root: &Path, platform: &str) -> serde_json::Value {
    let text = fs::read_to_string(root.join(format!("{}_results.json", platform))).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_help_flag_output() {
    Command::cargo_bin("cross-publish")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXIT CODES"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--mark-posted"));
}

#[test]
fn test_dry_run_from_posts_json() {
    let dir = setup();

    cross_publish(dir.path())
        .arg("--posts-json")
        .arg(dir.path().join("posts.json"))
        .arg("--platform")
        .arg("telegram")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("--- telegram ---"))
        .stdout(predicate::str::contains("<b>Hello World</b>"))
        .stdout(predicate::str::contains("skipped (not-targeted)"))
        .stdout(predicate::str::contains("(dry run)"));

    let results = read_results(dir.path(), "telegram");
    assert_eq!(results["platform"], "telegram");
    assert_eq!(
        results["successful_posts"],
        serde_json::json!(["blog_posts/hello.md"])
    );

    // Dry runs leave the post untouched
    let content = fs::read_to_string(dir.path().join("blog_posts/hello.md")).unwrap();
    assert_eq!(content, POST);
}

#[test]
fn test_dry_run_mark_posted_needs_opt_in() {
    let dir = setup();

    cross_publish(dir.path())
        .arg("--posts-json")
        .arg(dir.path().join("posts.json"))
        .args(["--platform", "telegram", "--dry-run", "--mark-posted"])
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(dir.path().join("blog_posts/hello.md")).unwrap(),
        POST
    );

    cross_publish(dir.path())
        .arg("--posts-json")
        .arg(dir.path().join("posts.json"))
        .args(["--platform", "telegram", "--dry-run", "--mark-posted", "--mark-dry-run"])
        .assert()
        .success();

    let content = fs::read_to_string(dir.path().join("blog_posts/hello.md")).unwrap();
    assert!(content.contains("posted_to:\n- telegram"));
    assert!(content.contains("posted_telegram_at:"));
    assert!(content.ends_with("\n\nBody text.\n"));
}

#[test]
fn test_already_posted_is_skipped_when_recording() {
    let dir = setup();
    let args = ["--platform", "telegram", "--dry-run", "--mark-posted", "--mark-dry-run"];

    cross_publish(dir.path())
        .arg("--posts-json")
        .arg(dir.path().join("posts.json"))
        .args(args)
        .assert()
        .success();

    // Replaying the same detection output must not post again
    cross_publish(dir.path())
        .arg("--posts-json")
        .arg(dir.path().join("posts.json"))
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped (already-posted)"));

    let results = read_results(dir.path(), "telegram");
    assert_eq!(results["successful_posts"], serde_json::json!([]));
}

#[test]
fn test_detect_inline_json_report() {
    let dir = setup();

    let output = cross_publish(dir.path())
        .args(["--detect", "--platform", "telegram,twitter", "--dry-run", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["dry_run"], true);

    let pairs = report["pairs"].as_array().unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0]["platform"], "telegram");
    assert_eq!(pairs[1]["platform"], "twitter");
    assert!(pairs
        .iter()
        .all(|pair| pair["outcome"] == "succeeded" && pair["item"] == "blog_posts/hello.md"));
    assert!(pairs[1]["message"]
        .as_str()
        .unwrap()
        .starts_with("📝 Hello World"));

    assert_eq!(
        read_results(dir.path(), "twitter")["successful_posts"],
        serde_json::json!(["blog_posts/hello.md"])
    );
}

#[test]
fn test_empty_stdin_is_nothing_to_do() {
    let dir = setup();

    cross_publish(dir.path())
        .args(["--platform", "telegram", "--dry-run"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 succeeded, 0 failed, 0 skipped"));

    assert_eq!(
        read_results(dir.path(), "telegram")["successful_posts"],
        serde_json::json!([])
    );
}

#[test]
fn test_malformed_posts_json() {
    let dir = setup();

    cross_publish(dir.path())
        .args(["--platform", "telegram", "--dry-run"])
        .write_stdin("not json")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("malformed detection JSON"));
}

#[test]
fn test_unknown_platform() {
    let dir = setup();

    cross_publish(dir.path())
        .args(["--platform", "linkedin", "--dry-run"])
        .write_stdin("")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unknown platform"));
}

#[test]
fn test_missing_credentials_for_real_run() {
    let dir = setup();

    cross_publish(dir.path())
        .arg("--posts-json")
        .arg(dir.path().join("posts.json"))
        .args(["--platform", "telegram"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("TELEGRAM_BOT_TOKEN"));

    assert_eq!(
        fs::read_to_string(dir.path().join("blog_posts/hello.md")).unwrap(),
        POST
    );
}

#[test]
fn test_missing_twitter_credentials_are_listed() {
    let dir = setup();

    cross_publish(dir.path())
        .arg("--posts-json")
        .arg(dir.path().join("posts.json"))
        .args(["--platform", "twitter", "--twitter-access-token", "token"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "TWITTER_API_KEY, TWITTER_API_SECRET, TWITTER_ACCESS_TOKEN_SECRET",
        ));
}

#[test]
fn test_report_printed_when_results_cannot_be_written() {
    let dir = setup();
    let blocked = dir.path().join("blocked");
    fs::write(&blocked, "not a directory").unwrap();

    let mut cmd = Command::cargo_bin("cross-publish").unwrap();
    cmd.env_remove("CROSSPOST_CONFIG").env("CROSSPOST_LOG_LEVEL", "warn");
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }

    cmd.arg("--config")
        .arg(dir.path().join("config.toml"))
        .arg("--repo-root")
        .arg(dir.path())
        .arg("--results-dir")
        .arg(&blocked)
        .arg("--posts-json")
        .arg(dir.path().join("posts.json"))
        .args(["--platform", "telegram", "--dry-run"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("--- telegram ---"))
        .stdout(predicate::str::contains("1 succeeded, 0 failed, 1 skipped (dry run)"))
        .stderr(predicate::str::contains("Failed to write"));
}

#[test]
fn test_git_commit_requires_mark_posted() {
    let dir = setup();

    cross_publish(dir.path())
        .args(["--git-commit", "--dry-run"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--mark-posted"));
}
