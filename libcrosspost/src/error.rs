//! Error types for Crosspost

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosspostError>;

#[derive(Error, Debug)]
pub enum CrosspostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Revision history error: {0}")]
    Git(#[from] GitError),

    #[error("Cannot enumerate content items: {0}")]
    Detection(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosspostError {
    /// Returns the process exit code for this error
    ///
    /// Codes 0 and 1 are reserved for run outcomes ("work found"/"nothing pending" for
    /// detection, "all done"/"work left undone" for publishing), so fatal errors start at 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosspostError::InvalidInput(_) => 3,
            _ => 2,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Failures of the frontmatter store
///
/// `Parse` covers everything that makes an item unreadable (skip and warn), `Write`
/// covers a failed rewrite (the platform must not be considered recorded).
#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed metadata block in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("{platform} message needs {required} characters for title and link alone, limit is {limit}")]
    Overflow {
        platform: String,
        required: usize,
        limit: usize,
    },

    #[error("{platform} title is {length} characters, limit is {limit}")]
    TitleTooLong {
        platform: String,
        length: usize,
        limit: usize,
    },

    #[error("{platform} needs the article body of {item}, which was not loaded")]
    MissingBody { platform: String, item: String },
}

/// Classified failure of one publish attempt
///
/// Each variant carries the platform's own diagnostic payload when one was returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Posting failed: {0}")]
    Other(String),
}

impl PlatformError {
    /// Stable outcome label used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformError::Authentication(_) => "failed-auth",
            PlatformError::Validation(_) => "failed-validation",
            PlatformError::Transient(_) => "failed-transient",
            PlatformError::Other(_) => "failed-other",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            PlatformError::Authentication(d)
            | PlatformError::Validation(d)
            | PlatformError::Transient(d)
            | PlatformError::Other(d) => d,
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            PlatformError::Transient(err.to_string())
        } else {
            PlatformError::Other(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },
}
