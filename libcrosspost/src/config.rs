//! Configuration management for Crosspost
//!
//! Every setting has a built-in default, so a config file is optional. Credentials never
//! live here; the binaries take them by flag or environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub content: ContentConfig,
    pub publish: PublishConfig,
    pub mastodon: MastodonConfig,
    pub devto: DevToConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheme and host of the blog, e.g. `https://mlship.dev`
    pub origin: String,
    /// Path under which posts are served
    pub post_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "https://mlship.dev".to_string(),
            post_path: "/blog".to_string(),
        }
    }
}

impl SiteConfig {
    /// Canonical URL of a post: `<origin><post_path>/<slug>`
    pub fn canonical_url(&self, slug: &str) -> String {
        let origin = self.origin.trim_end_matches('/');
        let path = self.post_path.trim_matches('/');
        if path.is_empty() {
            format!("{}/{}", origin, slug)
        } else {
            format!("{}/{}/{}", origin, path, slug)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Repository root; item identifiers are relative to it
    pub repo_root: PathBuf,
    /// Directory holding the content items, relative to `repo_root`
    pub content_dir: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            content_dir: PathBuf::from("blog_posts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Per-call network timeout
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MastodonConfig {
    /// Status length ceiling of the instance
    pub max_characters: usize,
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            max_characters: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevToConfig {
    pub mode: DevToMode,
    pub timeout_secs: u64,
}

impl Default for DevToConfig {
    fn default() -> Self {
        Self {
            mode: DevToMode::Link,
            timeout_secs: 30,
        }
    }
}

/// How items are announced on Dev.to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevToMode {
    /// A short article with the abstract and a link back
    #[default]
    Link,
    /// The whole markdown body, with the canonical URL pointing back
    Full,
}

impl FromStr for DevToMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "link" => Ok(DevToMode::Link),
            "full" => Ok(DevToMode::Full),
            _ => Err(format!(
                "Invalid Dev.to mode: '{}'. Valid options: link, full",
                s
            )),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path, or `CROSSPOST_CONFIG`, must exist. Without either, the default
    /// location is used when present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        if let Some(path) = env_config_path() {
            return Self::load_from_path(&path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

fn env_config_path() -> Option<PathBuf> {
    std::env::var("CROSSPOST_CONFIG")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(|p| PathBuf::from(shellexpand::tilde(&p).to_string()))
}

/// Default configuration path following the XDG Base Directory spec
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("crosspost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.site.origin, "https://mlship.dev");
        assert_eq!(config.content.content_dir, PathBuf::from("blog_posts"));
        assert_eq!(config.publish.timeout_secs, 10);
        assert_eq!(config.mastodon.max_characters, 500);
        assert_eq!(config.devto.mode, DevToMode::Link);
        assert_eq!(config.devto.timeout_secs, 30);
    }

    #[test]
    fn test_canonical_url() {
        let site = SiteConfig::default();
        assert_eq!(site.canonical_url("hello"), "https://mlship.dev/blog/hello");

        let site = SiteConfig {
            origin: "https://example.org/".to_string(),
            post_path: "posts/".to_string(),
        };
        assert_eq!(site.canonical_url("a-b"), "https://example.org/posts/a-b");

        let site = SiteConfig {
            origin: "https://example.org".to_string(),
            post_path: String::new(),
        };
        assert_eq!(site.canonical_url("x"), "https://example.org/x");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[site]
origin = "https://blog.example"

[devto]
mode = "full"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.site.origin, "https://blog.example");
        assert_eq!(config.site.post_path, "/blog");
        assert_eq!(config.devto.mode, DevToMode::Full);
        assert_eq!(config.devto.timeout_secs, 30);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(
            result,
            Err(crate::error::CrosspostError::Config(ConfigError::NotFound(_)))
        ));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[site\norigin = ").unwrap();

        let result = Config::load_from_path(&path);
        assert!(matches!(
            result,
            Err(crate::error::CrosspostError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.toml");
        std::fs::write(&path, "[publish]\ntimeout_secs = 3\n").unwrap();

        std::env::set_var("CROSSPOST_CONFIG", &path);
        let config = Config::load(None);
        std::env::remove_var("CROSSPOST_CONFIG");

        assert_eq!(config.unwrap().publish.timeout_secs, 3);
    }

    #[test]
    fn test_devto_mode_from_str() {
        assert_eq!("LINK".parse::<DevToMode>().unwrap(), DevToMode::Link);
        assert_eq!("full".parse::<DevToMode>().unwrap(), DevToMode::Full);
        assert!("summary".parse::<DevToMode>().is_err());
    }
}
