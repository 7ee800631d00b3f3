//! CLI integration tests for cross-detect

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PENDING: &str = "---
title: Hello World
slug: hello-world
excerpt: A first post.
platforms: [twitter, telegram]
posted_to: [twitter]
---

Body text.
";

const DONE: &str = "---
title: Done
slug: done
platforms: [telegram]
posted_to: [telegram]
---
Done.
";

/// Content tree outside any git repository, so detection falls back to every post
fn setup(posts: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let content = dir.path().join("blog_posts");
    fs::create_dir_all(&content).unwrap();
    for (name, text) in posts {
        fs::write(content.join(name), text).unwrap();
    }
    fs::write(
        dir.path().join("config.toml"),
        "[site]\norigin = \"https://blog.example\"\npost_path = \"/posts\"\n",
    )
    .unwrap();
    dir
}

fn cross_detect(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cross-detect").unwrap();
    cmd.env_remove("CROSSPOST_CONFIG")
        .env("CROSSPOST_LOG_LEVEL", "warn")
        .arg("--config")
        .arg(root.join("config.toml"))
        .arg("--repo-root")
        .arg(root);
    cmd
}

#[test]
fn test_help_flag_output() {
    Command::cargo_bin("cross-detect")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXIT CODES"))
        .stdout(predicate::str::contains("--update"))
        .stdout(predicate::str::contains("--commit"));
}

#[test]
fn test_detect_outputs_pending_posts() {
    let dir = setup(&[("hello.md", PENDING), ("done.md", DONE)]);

    let output = cross_detect(dir.path()).assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();

    let posts = json.as_object().unwrap();
    assert_eq!(posts.len(), 1);

    let entry = &json["blog_posts/hello.md"];
    assert_eq!(entry["platforms"], serde_json::json!(["telegram"]));
    assert_eq!(entry["url"], "https://blog.example/posts/hello-world");
    assert_eq!(entry["title"], "Hello World");
    assert_eq!(entry["abstract"], "A first post.");
    assert_eq!(entry["slug"], "hello-world");
    assert_eq!(entry["metadata"]["posted_to"], serde_json::json!(["twitter"]));
}

#[test]
fn test_nothing_pending_exits_one() {
    let dir = setup(&[("done.md", DONE)]);

    cross_detect(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("{}"));
}

#[test]
fn test_malformed_post_is_skipped_with_warning() {
    let dir = setup(&[("hello.md", PENDING), ("broken.md", "no metadata\n")]);

    cross_detect(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("blog_posts/hello.md"))
        .stdout(predicate::str::contains("broken").not())
        .stderr(predicate::str::contains("blog_posts/broken.md"));
}

#[test]
fn test_missing_content_dir_is_fatal() {
    let dir = setup(&[]);
    fs::remove_dir(dir.path().join("blog_posts")).unwrap();

    cross_detect(dir.path()).assert().code(2);
}

#[test]
fn test_update_marks_post() {
    let dir = setup(&[("hello.md", PENDING)]);

    cross_detect(dir.path())
        .arg("--update")
        .arg("blog_posts/hello.md:telegram")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Marked blog_posts/hello.md as posted to telegram",
        ));

    let content = fs::read_to_string(dir.path().join("blog_posts/hello.md")).unwrap();
    assert!(content.contains("- telegram"));
    assert!(content.contains("posted_telegram_at:"));
    assert!(content.ends_with("\n\nBody text.\n"));

    // everything posted now
    cross_detect(dir.path()).assert().code(1);
}

#[test]
fn test_update_malformed_spec() {
    let dir = setup(&[("hello.md", PENDING)]);

    cross_detect(dir.path())
        .arg("--update")
        .arg("blog_posts/hello.md")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("FILE:PLATFORM"));
}

#[test]
fn test_update_missing_file() {
    let dir = setup(&[]);

    cross_detect(dir.path())
        .arg("--update")
        .arg("blog_posts/nope.md:twitter")
        .assert()
        .code(2);
}

#[test]
fn test_commit_requires_update() {
    let dir = setup(&[("hello.md", PENDING)]);

    cross_detect(dir.path())
        .arg("--commit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--update"));
}
