//! Read-only queries over a [`VaultIndex`].
//!
//! Every call takes one snapshot of the index and answers from it, so a
//! result never mixes states from before and after a concurrent update.
//! Multi-result queries are ordered by [`NoteId`] unless noted otherwise.

pub mod cancel;
pub mod dates;
pub mod fulltext;
pub mod metadata;
pub mod records;
pub mod tags;

pub use cancel::CancellationToken;
pub use dates::DateRange;
pub use fulltext::TextSearchOptions;
pub use metadata::MetadataQuery;
pub use records::*;
pub use tags::{TagExpr, TagQueryOptions};

use crate::config::IndexConfig;
use crate::error::QueryError;
use crate::graph::{FuzzyResolver, Suggestion};
use crate::index::{IndexState, VaultIndex};
use crate::note::Note;
use crate::parser::tag::TagParser;
use crate::types::{normalize_path, LinkReference, NoteId, ResolvedLink};
use crate::vault::format_file_size;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Options for [`QueryEngine::orphans`].
#[derive(Debug, Clone, Default)]
pub struct OrphanOptions {
    /// Notes carrying any of these tags are never orphans.
    pub entry_point_tags: Vec<String>,
}

impl OrphanOptions {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            entry_point_tags: config.entry_point_tags.clone(),
        }
    }
}

/// Answers queries against a shared index handle.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    index: VaultIndex,
}

impl QueryEngine {
    pub fn new(index: VaultIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &VaultIndex {
        &self.index
    }

    /// Note for an id, path, or link text.
    pub fn find(&self, name: &str) -> Result<Arc<Note>, QueryError> {
        self.index
            .snapshot()
            .find(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownNote(name.to_string()))
    }

    // ========================================================================
    // Content and metadata
    // ========================================================================

    /// Body lines matching `pattern`, grouped per note.
    pub fn full_text(
        &self,
        pattern: &str,
        options: &TextSearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<NoteTextMatches>, QueryError> {
        let state = self.index.snapshot();
        fulltext::search(&state, pattern, options, cancel)
    }

    /// Notes satisfying a tag expression such as `proj/* AND NOT draft`.
    pub fn tags(&self, expr: &str, options: &TagQueryOptions) -> Result<Vec<NoteId>, QueryError> {
        let state = self.index.snapshot();
        let parser = tag_parser(&state);
        let parsed = tags::parse_tag_expr(expr, &parser)?;
        Ok(tags::evaluate(&state, &parsed, options).into_iter().collect())
    }

    /// Front matter values selected by a metadata expression.
    pub fn metadata(&self, expr: &str) -> Result<Vec<MetadataMatch>, QueryError> {
        let query = MetadataQuery::parse(expr)?;
        let state = self.index.snapshot();
        Ok(state
            .iter()
            .flat_map(|note| {
                query.select(note).into_iter().map(|value| MetadataMatch {
                    id: note.id.clone(),
                    path: note.path_str(),
                    value,
                })
            })
            .collect())
    }

    /// Notes whose `field` date falls within `range`.
    pub fn date_range(&self, field: &str, range: &DateRange) -> Vec<NoteId> {
        let state = self.index.snapshot();
        state
            .iter()
            .filter(|note| {
                dates::field_datetime(note, field, state.config())
                    .is_some_and(|at| range.contains(&at))
            })
            .map(|note| note.id.clone())
            .collect()
    }

    /// Notes lacking any configured required front matter field.
    pub fn missing_required_fields(&self) -> Vec<MissingFields> {
        let state = self.index.snapshot();
        let required = &state.config().required_fields;
        if required.is_empty() {
            return Vec::new();
        }
        state
            .iter()
            .filter_map(|note| {
                let missing: Vec<String> = required
                    .iter()
                    .filter(|field| note.field(field).is_none())
                    .cloned()
                    .collect();
                (!missing.is_empty()).then(|| MissingFields {
                    id: note.id.clone(),
                    path: note.path_str(),
                    missing,
                })
            })
            .collect()
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Notes inside `folder`, at any depth. An empty folder means the whole
    /// vault.
    pub fn folder(&self, folder: &str) -> Vec<NoteId> {
        let state = self.index.snapshot();
        state.paths().with_prefix(&folder_prefix(&state, folder))
    }

    /// Notes whose path matches a glob. `*` stays within one folder, `**`
    /// crosses folders.
    pub fn glob(&self, pattern: &str) -> Result<Vec<NoteId>, QueryError> {
        let state = self.index.snapshot();
        let folded = state.rules().fold(pattern.trim_start_matches('/'));
        let compiled = Pattern::new(&folded).map_err(|e| QueryError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        // descend only into the folder named by the literal prefix
        let literal_end = folded.find(['*', '?', '[']).unwrap_or(folded.len());
        let prefix = match folded[..literal_end].rfind('/') {
            Some(slash) => &folded[..=slash],
            None => "",
        };

        Ok(state
            .paths()
            .with_prefix(prefix)
            .into_iter()
            .filter(|id| compiled.matches_with(id.as_str(), options))
            .collect())
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Outgoing links of a note in document order, resolved or not.
    pub fn forward_links(&self, id: &NoteId) -> Result<Vec<ResolvedLink>, QueryError> {
        let state = self.index.snapshot();
        known(&state, id)?;
        Ok(state.forward_links(id).to_vec())
    }

    /// Notes with at least one link resolving to `id`.
    pub fn backward_links(&self, id: &NoteId) -> Result<Vec<NoteId>, QueryError> {
        let state = self.index.snapshot();
        known(&state, id)?;
        Ok(state.backward_links(id))
    }

    /// Notes with no backlinks and no forward links. Links a note makes to
    /// itself are ignored; dangling links count as forward links.
    pub fn orphans(&self, options: &OrphanOptions) -> Vec<NoteId> {
        let state = self.index.snapshot();
        let parser = tag_parser(&state);
        let exempt: BTreeSet<String> = options
            .entry_point_tags
            .iter()
            .filter_map(|t| parser.canonicalize(t))
            .collect();

        state
            .iter()
            .filter(|note| note.tags.is_disjoint(&exempt))
            .filter(|note| {
                let id = &note.id;
                // dangling links count, self-links do not
                let linked_out = state
                    .forward_links(id)
                    .iter()
                    .any(|l| l.resolution.target() != Some(id));
                let linked_in = state
                    .graph()
                    .backward(id)
                    .is_some_and(|sources| sources.iter().any(|s| s != id));
                !linked_out && !linked_in
            })
            .map(|note| note.id.clone())
            .collect()
    }

    /// Every dangling link, ordered by source then position.
    pub fn broken_links(&self) -> Vec<BrokenLink> {
        let state = self.index.snapshot();
        broken(&state)
            .map(|(source, link)| BrokenLink {
                source: source.clone(),
                link: link.clone(),
            })
            .collect()
    }

    /// The whole link graph as an edge list for external renderers.
    pub fn export_edges(&self) -> Vec<Edge> {
        let state = self.index.snapshot();
        let mut edges = Vec::new();
        for note in state.iter() {
            let source = note.path_str();
            for link in state.forward_links(&note.id) {
                let target = match link.resolution.target().and_then(|t| state.get(t)) {
                    Some(target) => target.path_str(),
                    None => "unresolved".to_string(),
                };
                edges.push(Edge {
                    source: source.clone(),
                    target,
                    resolved: link.resolution.is_resolved(),
                    raw_target: link.reference.target.clone(),
                    anchor: link.reference.anchor.as_ref().map(|a| a.to_string()),
                    kind: link.reference.kind,
                });
            }
        }
        edges
    }

    /// Repair candidates for a link to `target` written in `source`, best
    /// first. Never changes how links resolve.
    pub fn suggest_targets(
        &self,
        source: &NoteId,
        target: &str,
        limit: usize,
    ) -> Result<Vec<Suggestion>, QueryError> {
        let state = self.index.snapshot();
        known(&state, source)?;
        Ok(FuzzyResolver::new(state.tables(), state.rules(), limit)
            .suggest(&LinkReference::wikilink(target), source))
    }

    /// Repair candidates for every broken link.
    pub fn suggest_all(&self, limit: usize) -> Vec<LinkSuggestions> {
        let state = self.index.snapshot();
        let fuzzy = FuzzyResolver::new(state.tables(), state.rules(), limit);
        broken(&state)
            .map(|(source, link)| LinkSuggestions {
                source: source.clone(),
                target: link.target.clone(),
                suggestions: fuzzy.suggest(link, source),
            })
            .collect()
    }

    // ========================================================================
    // Summaries
    // ========================================================================

    /// Tags with their note counts, sorted by tag.
    pub fn tag_counts(&self) -> Vec<TagCount> {
        let state = self.index.snapshot();
        state
            .tags()
            .counts()
            .map(|(tag, notes)| TagCount {
                tag: tag.to_string(),
                notes,
            })
            .collect()
    }

    pub fn stats(&self) -> VaultStats {
        let state = self.index.snapshot();
        let total_bytes: u64 = state.iter().map(|n| n.size_bytes).sum();
        let (resolved_links, unresolved_links) = state.graph().link_counts();
        VaultStats {
            notes: state.len(),
            folders: state.paths().folders().len(),
            total_bytes,
            total_size: format_file_size(total_bytes),
            tags: state.tags().len(),
            resolved_links,
            unresolved_links,
            failures: state.failures().len(),
        }
    }
}

/// Trie prefix of every note under `folder`; empty for the vault root.
pub(crate) fn folder_prefix(state: &IndexState, folder: &str) -> String {
    let mut prefix = state.rules().fold(&normalize_path(folder));
    if !prefix.is_empty() {
        prefix.push('/');
    }
    prefix
}

fn known(state: &IndexState, id: &NoteId) -> Result<(), QueryError> {
    if state.contains(id) {
        Ok(())
    } else {
        Err(QueryError::UnknownNote(id.to_string()))
    }
}

fn tag_parser(state: &IndexState) -> TagParser {
    let config = state.config();
    TagParser::new(config.tag_separator, config.case_sensitive_tags)
}

/// Unresolved links of every note, by source id then file offset.
fn broken(state: &IndexState) -> impl Iterator<Item = (&NoteId, &LinkReference)> {
    state.iter().flat_map(move |note| {
        let mut links: Vec<&LinkReference> = state
            .forward_links(&note.id)
            .iter()
            .filter(|l| !l.resolution.is_resolved())
            .map(|l| &l.reference)
            .collect();
        links.sort_by_key(|l| l.span.start);
        links.into_iter().map(move |link| (&note.id, link))
    })
}
