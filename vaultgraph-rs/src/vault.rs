//! Vault root and file access.

use crate::error::{Result, VaultError};
use crate::note::FileMeta;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// A vault: one root directory of Markdown notes.
#[derive(Debug, Clone)]
pub struct Vault {
    /// Canonical root path of the vault.
    pub root: PathBuf,
}

impl Vault {
    /// Open a vault rooted at `root`, which must be an existing directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|_| VaultError::VaultNotFound(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(VaultError::VaultNotFound(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a vault-relative path onto the root, refusing anything that
    /// would land outside the vault.
    ///
    /// A leading `/` is treated as the vault root. `..` may not climb above
    /// the root, and an existing path may not escape through a symlink.
    pub fn resolve_path(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let mut joined = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => joined.push(part),
                Component::ParentDir => {
                    if !joined.pop() {
                        return Err(VaultError::PathEscapesVault(relative.to_path_buf()));
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        let full = self.root.join(&joined);
        if full.exists() {
            let real = full.canonicalize()?;
            if !real.starts_with(&self.root) {
                return Err(VaultError::PathEscapesVault(relative.to_path_buf()));
            }
        }
        Ok(full)
    }

    /// Path relative to the vault root, `None` if `path` is outside it.
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }

    /// Read a note file's bytes and filesystem metadata.
    pub fn read(&self, relative: &Path) -> std::io::Result<(Vec<u8>, FileMeta)> {
        let full = self.root.join(relative);
        let meta = fs::metadata(&full)?;
        let bytes = fs::read(&full)?;
        Ok((bytes, FileMeta::from(&meta)))
    }
}

/// Human readable size, e.g. `1.5 MB`.
pub fn format_file_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if size_bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut size = size_bytes as f64;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let rounded = (size * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{:.1} {}", rounded, UNITS[unit])
    } else {
        format!("{} {}", rounded, UNITS[unit])
    }
}

/// Shorten `text` to at most `max_chars` characters, ending with `suffix`
/// when cut.
pub fn truncate_text(text: &str, max_chars: usize, suffix: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let suffix_len = suffix.chars().count();
    if max_chars <= suffix_len {
        return suffix.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - suffix_len).collect();
    out.push_str(suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_vault() {
        let err = Vault::open("/definitely/not/a/vault").unwrap_err();
        assert!(matches!(err, VaultError::VaultNotFound(_)));
    }

    #[test]
    fn test_resolve_path() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::open(dir.path()).unwrap();

        assert_eq!(vault.resolve_path("a/b.md").unwrap(), vault.root.join("a/b.md"));
        assert_eq!(vault.resolve_path("/a/./b.md").unwrap(), vault.root.join("a/b.md"));
        assert_eq!(vault.resolve_path("a/../c.md").unwrap(), vault.root.join("c.md"));
        assert!(matches!(
            vault.resolve_path("../outside.md"),
            Err(VaultError::PathEscapesVault(_))
        ));
        assert!(matches!(
            vault.resolve_path("a/../../x"),
            Err(VaultError::PathEscapesVault(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_path_refuses_symlink_escape() {
        let outside = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let vault = Vault::open(dir.path()).unwrap();

        assert!(matches!(
            vault.resolve_path("link"),
            Err(VaultError::PathEscapesVault(_))
        ));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_file_size(1_288_490_189), "1.2 GB");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10, "..."), "short");
        assert_eq!(truncate_text("a longer sentence", 8, "..."), "a lon...");
        assert_eq!(truncate_text("abcdef", 2, "..."), "..");
    }
}
