//! Plain records returned by the query engine.

use crate::graph::Suggestion;
use crate::types::{LinkKind, LinkReference, NoteId};
use crate::value::FieldValue;
use serde::Serialize;

/// One match of a full-text search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineMatch {
    /// Line number in the file (1-indexed).
    pub line: usize,
    /// Byte offset of the match in the file.
    pub offset: usize,
    /// Byte column of the match within its line (0-indexed).
    pub column: usize,
    /// The whole matching line.
    pub text: String,
}

/// Full-text matches within one note, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteTextMatches {
    pub id: NoteId,
    pub path: String,
    pub matches: Vec<LineMatch>,
}

/// A front matter value selected by a metadata query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataMatch {
    pub id: NoteId,
    pub path: String,
    pub value: FieldValue,
}

/// A dangling link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    pub source: NoteId,
    pub link: LinkReference,
}

/// One edge of the exported link graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Source note path.
    pub source: String,
    /// Target note path, or `"unresolved"`.
    pub target: String,
    pub resolved: bool,
    /// Link target as written.
    pub raw_target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    pub kind: LinkKind,
}

/// Repair candidates for one broken link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSuggestions {
    pub source: NoteId,
    pub target: String,
    pub suggestions: Vec<Suggestion>,
}

/// A note lacking configured required front matter fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFields {
    pub id: NoteId,
    pub path: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub notes: usize,
}

/// Vault-wide summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    pub notes: usize,
    pub folders: usize,
    pub total_bytes: u64,
    /// `total_bytes` in human readable form.
    pub total_size: String,
    pub tags: usize,
    pub resolved_links: usize,
    pub unresolved_links: usize,
    pub failures: usize,
}
