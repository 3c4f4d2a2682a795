//! Index configuration.
//!
//! The configuration is a plain data object supplied by the caller. It can be
//! read from a per-vault `.vaultgraph.toml` / `.vaultgraph.yaml`, from the
//! user's global config directory, or constructed in code. Nothing here ever
//! writes configuration back to disk.

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-vault configuration file names, checked in order.
pub const VAULT_CONFIG_FILES: &[&str] = &[".vaultgraph.toml", ".vaultgraph.yaml", ".vaultgraph.yml"];

/// How note identities and link lookups treat letter case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseRule {
    /// `Notes/Foo.md` and `notes/foo.md` are the same note.
    #[default]
    Insensitive,
    /// Paths and link targets must match exactly.
    Sensitive,
}

impl CaseRule {
    /// Fold a key according to this rule.
    pub fn fold(self, s: &str) -> String {
        match self {
            CaseRule::Insensitive => s.to_lowercase(),
            CaseRule::Sensitive => s.to_string(),
        }
    }
}

/// Options controlling how a vault is scanned, parsed and indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Case rule for note ids and link resolution.
    pub case_rule: CaseRule,

    /// Separator between tag hierarchy levels.
    pub tag_separator: char,

    /// Keep tag case instead of lowercasing.
    pub case_sensitive_tags: bool,

    /// Glob patterns (vault-relative) of files and folders to skip.
    pub exclude: Vec<String>,

    /// Index dot-files and dot-folders.
    pub include_hidden: bool,

    /// File extensions treated as notes.
    pub extensions: Vec<String>,

    /// Files larger than this many bytes fail to parse.
    pub max_file_size: u64,

    /// Scan worker count. `None` uses the available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Capacity of the bounded change-event channel.
    pub watch_capacity: usize,

    /// Number of dispatcher workers applying change events.
    pub watch_shards: usize,

    /// Notes carrying any of these tags are never reported as orphans.
    pub entry_point_tags: Vec<String>,

    /// Front matter keys every note is expected to have.
    pub required_fields: Vec<String>,

    /// Date fields that fall back to the file's creation time.
    pub created_fields: Vec<String>,

    /// Date fields that fall back to the file's modification time.
    pub modified_fields: Vec<String>,

    /// Failed incremental updates tolerated before a full rebuild.
    pub drift_threshold: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            case_rule: CaseRule::default(),
            tag_separator: '/',
            case_sensitive_tags: false,
            exclude: Vec::new(),
            include_hidden: false,
            extensions: vec!["md".to_string()],
            max_file_size: 10 * 1024 * 1024,
            workers: None,
            watch_capacity: 1024,
            watch_shards: 4,
            entry_point_tags: Vec::new(),
            required_fields: Vec::new(),
            created_fields: vec!["created".into(), "date".into(), "created_at".into()],
            modified_fields: vec!["modified".into(), "updated".into(), "modified_at".into()],
            drift_threshold: 16,
        }
    }
}

impl IndexConfig {
    /// Load a configuration file. The format follows the extension:
    /// `.toml`, or `.yaml`/`.yml`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            VaultError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let config: IndexConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
            _ => {
                return Err(VaultError::Config(format!(
                    "unsupported config format: {}",
                    path.display()
                )));
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Find the configuration for a vault: a config file in the vault root,
    /// then the global config file, then defaults.
    pub fn discover(vault_root: &Path) -> Result<Self> {
        for name in VAULT_CONFIG_FILES {
            let candidate = vault_root.join(name);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "loading vault config");
                return Self::load(&candidate);
            }
        }

        if let Some(global) = global_config_path().filter(|p| p.is_file()) {
            tracing::debug!(path = %global.display(), "loading global config");
            return Self::load(&global);
        }

        Ok(Self::default())
    }

    /// Check the values for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(VaultError::Config("workers must be at least 1".into()));
        }
        if self.watch_capacity == 0 || self.watch_shards == 0 {
            return Err(VaultError::Config(
                "watch_capacity and watch_shards must be at least 1".into(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(VaultError::Config("extensions must not be empty".into()));
        }
        if self.tag_separator.is_alphanumeric()
            || self.tag_separator.is_whitespace()
            || self.tag_separator == '#'
        {
            return Err(VaultError::Config(format!(
                "invalid tag separator '{}'",
                self.tag_separator
            )));
        }
        for pattern in &self.exclude {
            glob::Pattern::new(pattern)?;
        }
        Ok(())
    }

    /// Worker count for the scan pool.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Whether a file name carries one of the indexable extensions.
    pub fn is_note_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

/// Location of the global configuration file.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vaultgraph").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tag_separator, '/');
        assert_eq!(config.case_rule, CaseRule::Insensitive);
    }

    #[test]
    fn test_load_toml_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".vaultgraph.toml");
        fs::write(
            &path,
            "case_rule = \"sensitive\"\nexclude = [\"templates/**\"]\nentry_point_tags = [\"moc\"]\n",
        )
        .unwrap();

        let config = IndexConfig::load(&path).unwrap();
        assert_eq!(config.case_rule, CaseRule::Sensitive);
        assert_eq!(config.exclude, vec!["templates/**"]);
        assert_eq!(config.entry_point_tags, vec!["moc"]);
        // Unset keys keep their defaults
        assert_eq!(config.extensions, vec!["md"]);
    }

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "tag_separator: '.'\nrequired_fields: [title, status]\n").unwrap();

        let config = IndexConfig::load(&path).unwrap();
        assert_eq!(config.tag_separator, '.');
        assert_eq!(config.required_fields, vec!["title", "status"]);
    }

    #[test]
    fn test_discover_prefers_vault_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".vaultgraph.yaml"), "include_hidden: true\n").unwrap();

        let config = IndexConfig::discover(dir.path()).unwrap();
        assert!(config.include_hidden);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = IndexConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IndexConfig {
            tag_separator: 'x',
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IndexConfig {
            exclude: vec!["[".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "x=1").unwrap();
        assert!(matches!(IndexConfig::load(&path), Err(VaultError::Config(_))));
    }

    #[test]
    fn test_is_note_file() {
        let config = IndexConfig::default();
        assert!(config.is_note_file(Path::new("a/b.md")));
        assert!(config.is_note_file(Path::new("a/b.MD")));
        assert!(!config.is_note_file(Path::new("a/b.png")));
        assert!(!config.is_note_file(Path::new("a/b")));
    }

    #[test]
    fn test_case_rule_fold() {
        assert_eq!(CaseRule::Insensitive.fold("Foo/Bar"), "foo/bar");
        assert_eq!(CaseRule::Sensitive.fold("Foo/Bar"), "Foo/Bar");
    }
}
