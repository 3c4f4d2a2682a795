//! Core types shared by the parser, index and query engine.

use crate::config::CaseRule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Stable identity of a note: its vault-relative path, normalized.
///
/// Normalization applies NFC, uses `/` separators, collapses `.` and `..`
/// segments and folds case when the case rule is insensitive. Ordering of
/// ids is the primary ordering of every multi-result query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Build an id from a vault-relative path.
    pub fn from_path(path: &Path, case: CaseRule) -> Self {
        Self::from_str_path(&path.to_string_lossy(), case)
    }

    /// Build an id from a vault-relative path string.
    pub fn from_str_path(path: &str, case: CaseRule) -> Self {
        NoteId(case.fold(&normalize_path(path)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Folder part of the id, empty for notes at the vault root.
    pub fn folder(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// Id without its file extension (the exact-path lookup key).
    pub fn without_extension(&self) -> &str {
        let name_start = self.0.rfind('/').map(|i| i + 1).unwrap_or(0);
        match self.0[name_start..].rfind('.') {
            Some(dot) if dot > 0 => &self.0[..name_start + dot],
            _ => &self.0,
        }
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Case-preserving normal form of a vault-relative path. Distinct files
/// that share a [`NoteId`] under a case-insensitive rule differ here.
pub fn path_text(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Normalize a vault-relative path: NFC, `/` separators, no empty, `.` or
/// `..` segments. A `..` above the root is dropped.
pub fn normalize_path(path: &str) -> String {
    let nfc: String = path.nfc().collect();
    let mut parts: Vec<&str> = Vec::new();
    for segment in nfc.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Syntax a link was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// `[[target]]`
    Wikilink,
    /// `![[target]]`
    Embed,
    /// `[text](path.md)`
    Markdown,
}

/// Sub-note location a link points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Anchor {
    /// `#Heading text`
    Heading(String),
    /// `#^block-id`
    Block(String),
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Heading(h) => write!(f, "#{}", h),
            Anchor::Block(b) => write!(f, "#^{}", b),
        }
    }
}

/// Position of a piece of text inside the raw file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    /// Line number (1-indexed).
    pub line: usize,
    /// Byte column within the line (0-indexed).
    pub column: usize,
}

/// Start offsets of every line in a text, for turning byte offsets into
/// [`SourceSpan`]s in O(log lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    /// Span of `start..end`.
    pub fn span(&self, start: usize, end: usize) -> SourceSpan {
        // starts[0] is 0, so at least one line begins at or before `start`
        let idx = self.starts.partition_point(|&s| s <= start).saturating_sub(1);
        let line_start = self.starts.get(idx).copied().unwrap_or(0);
        SourceSpan {
            start,
            end,
            line: idx + 1,
            column: start - line_start,
        }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

/// A link mention found in a note, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkReference {
    /// How the link was written.
    pub kind: LinkKind,

    /// Raw target text with the anchor removed.
    pub target: String,

    /// Display text (`[[target|alias]]` or the markdown link text).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Heading or block anchor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,

    /// Where the whole link sits in the file.
    pub span: SourceSpan,

    /// The link was written inside a front matter value.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub in_front_matter: bool,
}

impl LinkReference {
    /// A bare `[[target]]` not tied to any position in a file.
    pub fn wikilink(target: &str) -> Self {
        Self {
            kind: LinkKind::Wikilink,
            target: target.to_string(),
            alias: None,
            anchor: None,
            span: SourceSpan {
                start: 0,
                end: 0,
                line: 1,
                column: 0,
            },
            in_front_matter: false,
        }
    }
}

/// Outcome of resolving a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "target", rename_all = "snake_case")]
pub enum Resolution {
    Resolved(NoteId),
    Unresolved,
}

impl Resolution {
    pub fn target(&self) -> Option<&NoteId> {
        match self {
            Resolution::Resolved(id) => Some(id),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// A link reference paired with its resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub reference: LinkReference,
    pub resolution: Resolution,
}

/// A heading in a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading text (without the # prefix).
    pub text: String,
    /// Heading level (1-6).
    pub level: u8,
    /// Line number (1-indexed).
    pub line: usize,
    /// URL-safe slug, unique within the note.
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/b.md"), "a/b.md");
        assert_eq!(normalize_path("a\\b.md"), "a/b.md");
        assert_eq!(normalize_path("./a//b/../c.md"), "a/c.md");
        assert_eq!(normalize_path("../../x.md"), "x.md");
    }

    #[test]
    fn test_note_id_case_rules() {
        let a = NoteId::from_str_path("Projects/Alpha.md", CaseRule::Insensitive);
        let b = NoteId::from_str_path("projects/ALPHA.md", CaseRule::Insensitive);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "projects/alpha.md");

        let c = NoteId::from_str_path("Projects/Alpha.md", CaseRule::Sensitive);
        assert_eq!(c.as_str(), "Projects/Alpha.md");
    }

    #[test]
    fn test_note_id_nfc() {
        // "e" + combining acute vs precomposed
        let decomposed = NoteId::from_str_path("Caf\u{0065}\u{0301}.md", CaseRule::Sensitive);
        let composed = NoteId::from_str_path("Caf\u{00e9}.md", CaseRule::Sensitive);
        assert_eq!(decomposed, composed);
    }

    #[test]
    fn test_note_id_parts() {
        let id = NoteId::from_str_path("a/b/note.md", CaseRule::Sensitive);
        assert_eq!(id.folder(), "a/b");
        assert_eq!(id.without_extension(), "a/b/note");

        let root = NoteId::from_str_path("note.md", CaseRule::Sensitive);
        assert_eq!(root.folder(), "");
        assert_eq!(root.without_extension(), "note");

        let dotted = NoteId::from_str_path("v1.2/.hidden", CaseRule::Sensitive);
        assert_eq!(dotted.without_extension(), "v1.2/.hidden");
    }

    #[test]
    fn test_line_index_span() {
        let content = "line one\nsee [[x]] here\n\nlast";
        let lines = LineIndex::new(content);
        assert_eq!(lines.line_count(), 4);

        let start = content.find("[[").unwrap();
        let span = lines.span(start, start + 5);
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 4);

        assert_eq!(lines.span(0, 1).line, 1);
        let newline = content.find('\n').unwrap();
        assert_eq!(lines.span(newline, newline + 1).line, 1);
        let last = content.find("last").unwrap();
        assert_eq!(lines.span(last, last + 4).line, 4);
        assert_eq!(lines.span(last, last + 4).column, 0);
    }

    #[test]
    fn test_resolution_serialization() {
        let resolved = Resolution::Resolved(NoteId::from_str_path("b.md", CaseRule::Sensitive));
        let json = serde_json::to_string(&resolved).unwrap();
        assert_eq!(json, r#"{"status":"resolved","target":"b.md"}"#);

        let json = serde_json::to_string(&Resolution::Unresolved).unwrap();
        assert_eq!(json, r#"{"status":"unresolved"}"#);
    }
}
