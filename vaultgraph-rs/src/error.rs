//! Error types and exit codes for vaultgraph.

use std::path::PathBuf;
use thiserror::Error;

/// Process exit codes used by the `vaultgraph` binary.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOTE_NOT_FOUND: i32 = 2;
    pub const INVALID_QUERY: i32 = 3;
    pub const CONFIG_ERROR: i32 = 5;
    pub const BUILD_FAILURES: i32 = 10;
}

/// Failure to turn one file's bytes into a note.
///
/// Recorded per file by the scanner; never aborts a scan.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed front matter: {message}")]
    FrontMatter { message: String },

    #[error("undecodable text: {detail}")]
    Encoding { detail: String },

    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single query. The index is never touched.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("invalid expression '{expression}' near '{fragment}': {message}")]
    InvalidExpression {
        expression: String,
        fragment: String,
        message: String,
    },

    #[error("invalid glob '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("note not in index: {0}")]
    UnknownNote(String),

    #[error("query cancelled")]
    Cancelled,
}

impl QueryError {
    pub(crate) fn expression(
        expression: &str,
        fragment: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        QueryError::InvalidExpression {
            expression: expression.to_string(),
            fragment: fragment.into(),
            message: message.into(),
        }
    }
}

/// Main error type for vaultgraph operations.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault not found at: {0}")]
    VaultNotFound(PathBuf),

    #[error("Path escapes the vault root: {0}")]
    PathEscapesVault(PathBuf),

    #[error("Note not found: {0}")]
    NoteNotFound(PathBuf),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("{path} collides with {existing}: both map to note {id}")]
    PathCollision {
        id: String,
        path: String,
        existing: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Change feed closed")]
    ChannelClosed,

    #[error("Signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl VaultError {
    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            VaultError::NoteNotFound(_) => exit_code::NOTE_NOT_FOUND,
            VaultError::Query(QueryError::UnknownNote(_)) => exit_code::NOTE_NOT_FOUND,
            VaultError::Query(_) => exit_code::INVALID_QUERY,
            VaultError::Config(_) | VaultError::TomlParse(_) => exit_code::CONFIG_ERROR,
            _ => exit_code::GENERAL_ERROR,
        }
    }
}

/// Result type alias for vaultgraph operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            VaultError::NoteNotFound(PathBuf::from("a.md")).exit_code(),
            exit_code::NOTE_NOT_FOUND
        );
        assert_eq!(
            VaultError::from(QueryError::Cancelled).exit_code(),
            exit_code::INVALID_QUERY
        );
        assert_eq!(
            VaultError::Config("bad".into()).exit_code(),
            exit_code::CONFIG_ERROR
        );
        assert_eq!(
            VaultError::ChannelClosed.exit_code(),
            exit_code::GENERAL_ERROR
        );
    }

    #[test]
    fn test_expression_error_message() {
        let err = QueryError::expression("$.a[", "[", "unclosed bracket");
        assert_eq!(
            err.to_string(),
            "invalid expression '$.a[' near '[': unclosed bracket"
        );
    }
}
