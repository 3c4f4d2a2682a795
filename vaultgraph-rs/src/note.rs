//! Parsed note representation.

use crate::parser::frontmatter::FrontMatter;
use crate::types::{Heading, LinkReference, NoteId};
use crate::value::FieldValue;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Filesystem facts about a note file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileMeta {
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl From<&Metadata> for FileMeta {
    fn from(meta: &Metadata) -> Self {
        Self {
            created: meta.created().ok().map(DateTime::<Utc>::from),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

/// One parsed note file.
///
/// Notes are immutable: re-parsing a file yields a fresh `Note` that replaces
/// the previous one in the index as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Normalized identity.
    pub id: NoteId,
    /// Vault-relative path as found on disk.
    pub path: PathBuf,
    /// Front matter `title`, or the file stem.
    pub title: String,
    pub front_matter: FrontMatter,
    /// Raw text after the front matter.
    pub body: String,
    /// Byte offset of the body in the file.
    pub body_offset: usize,
    /// Line number the body starts on (1-indexed).
    pub body_line: usize,
    /// Canonical tags from front matter and inline `#tags`.
    pub tags: BTreeSet<String>,
    /// Front matter `aliases`.
    pub aliases: Vec<String>,
    pub headings: Vec<Heading>,
    /// Outgoing links in document order.
    pub links: Vec<LinkReference>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Hex SHA-256 of the raw file bytes.
    pub content_hash: String,
    pub size_bytes: u64,
    /// Encoding the file was decoded with.
    pub encoding: &'static str,
}

impl Note {
    /// File name without extension.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    /// Vault-relative path with `/` separators.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }

    /// Look up a front matter field.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.front_matter.get(key)
    }

    /// The full file text: front matter block followed by the body.
    pub fn content(&self) -> String {
        format!("{}{}", self.front_matter.render(), self.body)
    }
}

/// Hex SHA-256 of some bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("dir/My Note.md")), "My Note");
        assert_eq!(file_stem(Path::new("v1.2.md")), "v1.2");
    }
}
