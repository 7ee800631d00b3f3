//! Frontmatter storage for content items
//!
//! Each content item is a markdown file that opens with a YAML metadata block enclosed in
//! `---` delimiter lines, followed by the body:
//!
//! ```text
//! ---
//! title: Shipping models
//! slug: shipping-models
//! excerpt: What we learned.
//! platforms: [twitter, telegram]
//! posted_to: [telegram]
//! posted_telegram_at: 2025-01-04T10:00:00Z
//! ---
//! Body text, preserved byte-for-byte.
//! ```
//!
//! [`Document`] owns the exact round trip between file text and [`Metadata`]; the
//! [`FrontmatterStore`] resolves item identifiers to files and reads/rewrites them.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::FrontmatterError;
use crate::types::default_platforms;

const DELIMITER: &str = "---";

/// Typed view of the metadata block
///
/// Known keys are fields; every other key (dates, tag lists, `posted_<platform>_at`
/// stamps, ...) lives in `extra` and is written back unchanged and in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub posted_to: Vec<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Metadata {
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            excerpt: None,
            summary: None,
            platforms: default_platforms(),
            posted_to: Vec::new(),
            extra: Mapping::new(),
        }
    }

    /// `abstract` if present, otherwise `excerpt`, otherwise empty
    pub fn abstract_text(&self) -> &str {
        self.summary
            .as_deref()
            .or(self.excerpt.as_deref())
            .unwrap_or("")
    }

    pub fn is_posted(&self, platform: &str) -> bool {
        self.posted_to.iter().any(|p| p == platform)
    }

    /// Declared platforms not yet posted to, in declaration order without duplicates
    pub fn pending_platforms(&self) -> Vec<String> {
        let mut pending: Vec<String> = Vec::new();
        for platform in &self.platforms {
            if !self.is_posted(platform) && !pending.contains(platform) {
                pending.push(platform.clone());
            }
        }
        pending
    }

    pub fn timestamp_key(platform: &str) -> String {
        format!("posted_{}_at", platform)
    }

    pub fn posted_at(&self, platform: &str) -> Option<&str> {
        self.extra
            .get(Self::timestamp_key(platform).as_str())
            .and_then(Value::as_str)
    }

    /// Record a confirmed publish
    ///
    /// Adds the platform to `posted_to` (set semantics) and stamps
    /// `posted_<platform>_at`. Returns `false` when the platform was already recorded.
    pub fn mark_posted(&mut self, platform: &str, at: DateTime<Utc>) -> bool {
        let added = !self.is_posted(platform);
        if added {
            self.posted_to.push(platform.to_string());
        }
        self.extra.insert(
            Value::String(Self::timestamp_key(platform)),
            Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        added
    }

    /// Tags for a platform: `tags_<platform>` when present, otherwise `tags`
    pub fn tags_for(&self, platform: &str) -> Vec<String> {
        let specific = format!("tags_{}", platform);
        self.extra
            .get(specific.as_str())
            .or_else(|| self.extra.get("tags"))
            .map(tag_list)
            .unwrap_or_default()
    }
}

fn tag_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A parsed content item: metadata plus the untouched body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub metadata: Metadata,
    body: String,
}

impl Document {
    pub fn new(metadata: Metadata, body: impl Into<String>) -> Self {
        Self {
            metadata,
            body: body.into(),
        }
    }

    /// Everything after the closing delimiter, exactly as read
    pub fn raw_body(&self) -> &str {
        &self.body
    }

    /// The markdown body without the line break that follows the closing delimiter
    pub fn body(&self) -> &str {
        self.body.trim()
    }

    /// Parses file text into a document
    ///
    /// `path` is only used for error reporting.
    pub fn parse(path: &Path, content: &str) -> Result<Self, FrontmatterError> {
        let parse_error = |reason: String| FrontmatterError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let first_line_end = content.find('\n').unwrap_or(content.len());
        if content[..first_line_end].trim_end() != DELIMITER {
            return Err(parse_error(
                "missing opening '---' delimiter on the first line".to_string(),
            ));
        }

        let block_start = (first_line_end + 1).min(content.len());
        let mut offset = block_start;
        let mut closing = None;
        for line in content[block_start..].split_inclusive('\n') {
            if line.trim_end() == DELIMITER {
                closing = Some(offset);
                break;
            }
            offset += line.len();
        }

        let closing =
            closing.ok_or_else(|| parse_error("missing closing '---' delimiter".to_string()))?;

        let yaml = &content[block_start..closing];
        let metadata: Metadata =
            serde_yaml::from_str(yaml).map_err(|e| parse_error(e.to_string()))?;

        let body = &content[closing + DELIMITER.len()..];

        Ok(Self {
            metadata,
            body: body.to_string(),
        })
    }

    /// Serializes the document back into file text
    ///
    /// The rendered text is parsed again before being returned; a block that would not
    /// read back as the same metadata and body is refused.
    pub fn render(&self, path: &Path) -> Result<String, FrontmatterError> {
        let write_error = |reason: String| FrontmatterError::Write {
            path: path.to_path_buf(),
            reason,
        };

        let yaml = serde_yaml::to_string(&self.metadata).map_err(|e| write_error(e.to_string()))?;
        let rendered = format!("{DELIMITER}\n{yaml}{DELIMITER}{}", self.body);

        let reparsed = Document::parse(path, &rendered).map_err(|e| {
            write_error(format!("metadata would not read back: {}", e))
        })?;
        if reparsed != *self {
            return Err(write_error(
                "metadata changed while round-tripping through YAML".to_string(),
            ));
        }

        Ok(rendered)
    }
}

/// Reads and rewrites content items relative to a repository root
#[derive(Debug, Clone)]
pub struct FrontmatterStore {
    root: PathBuf,
}

impl FrontmatterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute (or root-relative) path of an item identifier
    pub fn resolve(&self, item: &Path) -> PathBuf {
        if item.is_absolute() {
            item.to_path_buf()
        } else {
            self.root.join(item)
        }
    }

    pub fn read(&self, item: &Path) -> Result<Document, FrontmatterError> {
        let path = self.resolve(item);
        let content = fs::read_to_string(&path).map_err(|source| FrontmatterError::Read {
            path: item.to_path_buf(),
            source,
        })?;

        Document::parse(item, &content)
    }

    /// Rewrites an item atomically (temp file + rename)
    pub fn write(&self, item: &Path, document: &Document) -> Result<(), FrontmatterError> {
        let path = self.resolve(item);
        let content = document.render(item)?;

        let write_error = |reason: String| FrontmatterError::Write {
            path: item.to_path_buf(),
            reason,
        };

        let temp_path = path.with_extension("md.tmp");
        fs::write(&temp_path, &content)
            .map_err(|e| write_error(format!("temp file {}: {}", temp_path.display(), e)))?;

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_error(e.to_string()));
        }

        Ok(())
    }
}
