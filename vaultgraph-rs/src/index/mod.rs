//! The in-memory vault index.
//!
//! [`VaultIndex`] is a cheap, cloneable handle to one shared [`IndexState`].
//! Readers take a [`Snapshot`] and never observe a half-applied mutation:
//! every upsert or remove is planned under an upgradable read lock, which
//! keeps readers running, and applied in one step under the write lock.

pub mod mutation;
pub mod tags;
pub mod trie;

pub use mutation::UpsertOutcome;
pub use tags::TagIndex;
pub use trie::PathTrie;

use crate::config::IndexConfig;
use crate::error::{Result, VaultError};
use crate::graph::{ExactResolver, LinkGraph, LookupKey, ResolveRules, ResolverTables};
use crate::note::Note;
use crate::types::{path_text, LinkReference, NoteId, ResolvedLink};
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

/// Everything the index knows, guarded as one unit.
#[derive(Debug)]
pub struct IndexState {
    pub(crate) config: Arc<IndexConfig>,
    pub(crate) rules: ResolveRules,
    pub(crate) notes: BTreeMap<NoteId, Arc<Note>>,
    /// Lookup keys each note is filed under.
    pub(crate) keys: HashMap<NoteId, BTreeSet<LookupKey>>,
    pub(crate) tables: ResolverTables,
    pub(crate) graph: LinkGraph,
    pub(crate) tags: TagIndex,
    pub(crate) paths: PathTrie,
    /// Files that failed to parse, by vault-relative path.
    pub(crate) failures: BTreeMap<String, String>,
    pub(crate) generation: u64,
}

impl IndexState {
    fn new(config: Arc<IndexConfig>) -> Self {
        Self {
            rules: ResolveRules::from_config(&config),
            tags: TagIndex::new(config.tag_separator),
            config,
            notes: BTreeMap::new(),
            keys: HashMap::new(),
            tables: ResolverTables::default(),
            graph: LinkGraph::default(),
            paths: PathTrie::default(),
            failures: BTreeMap::new(),
            generation: 0,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn rules(&self) -> &ResolveRules {
        &self.rules
    }

    pub fn get(&self, id: &NoteId) -> Option<&Arc<Note>> {
        self.notes.get(id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.notes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Notes in id order. Calling again restarts from the first note.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Note>> {
        self.notes.values()
    }

    /// Id a vault-relative path maps to.
    pub fn id_for(&self, path: &Path) -> NoteId {
        NoteId::from_path(path, self.rules.case)
    }

    /// Find a note by id, vault-relative path, or link text.
    pub fn find(&self, name: &str) -> Option<&Arc<Note>> {
        let id = NoteId::from_str_path(name, self.rules.case);
        if let Some(note) = self.notes.get(&id) {
            return Some(note);
        }
        let root = NoteId::from_str_path("", self.rules.case);
        ExactResolver::new(&self.tables, &self.rules)
            .resolve(&LinkReference::wikilink(name), &root)
            .target()
            .and_then(|target| self.notes.get(target))
    }

    /// Outgoing links of a note in document order.
    pub fn forward_links(&self, id: &NoteId) -> &[ResolvedLink] {
        self.graph.forward(id)
    }

    /// Notes linking to `id`, sorted.
    pub fn backward_links(&self, id: &NoteId) -> Vec<NoteId> {
        self.graph
            .backward(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    pub fn tables(&self) -> &ResolverTables {
        &self.tables
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    pub fn paths(&self) -> &PathTrie {
        &self.paths
    }

    /// Files that failed to parse, with the reason.
    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    /// Incremented by every applied mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check the whole index against its invariants, including that every
    /// stored resolution matches what a fresh resolution would produce.
    pub fn verify(&self) -> Result<()> {
        let violation = |msg: String| Err(VaultError::ConsistencyViolation(msg));

        if self.keys.len() != self.notes.len() || self.paths.len() != self.notes.len() {
            return violation(format!(
                "{} notes but {} key sets and {} paths",
                self.notes.len(),
                self.keys.len(),
                self.paths.len()
            ));
        }

        let resolver = ExactResolver::new(&self.tables, &self.rules);
        for (id, note) in &self.notes {
            if *id != self.id_for(&note.path) {
                return violation(format!("note {} stored under id {}", note.path.display(), id));
            }
            if self.keys.get(id) != Some(&self.rules.note_keys(note)) {
                return violation(format!("stale lookup keys for {}", id));
            }
            for tag in &note.tags {
                if !self.tags.exact(tag).contains(id) {
                    return violation(format!("{} missing from tag index under {}", id, tag));
                }
            }

            let stored = self.graph.forward(id);
            if stored.len() != note.links.len() {
                return violation(format!(
                    "{} has {} links but {} stored edges",
                    id,
                    note.links.len(),
                    stored.len()
                ));
            }
            for (link, edge) in note.links.iter().zip(stored) {
                if edge.reference != *link || edge.resolution != resolver.resolve(link, id) {
                    return violation(format!("stale resolution of [[{}]] in {}", link.target, id));
                }
            }
        }

        for (key, ids) in self.tables.iter() {
            for id in ids {
                if !self.keys.get(id).is_some_and(|k| k.contains(key)) {
                    return violation(format!("{} filed under stale key {:?}", id, key));
                }
            }
        }

        let tagged: usize = self.tags.counts().map(|(_, n)| n).sum();
        let expected: usize = self.notes.values().map(|n| n.tags.len()).sum();
        if tagged != expected {
            return violation(format!("tag index holds {} entries, notes carry {}", tagged, expected));
        }

        self.graph
            .verify(|id| self.notes.contains_key(id))
            .map_err(VaultError::ConsistencyViolation)
    }
}

/// A consistent read view of the index.
///
/// Holds the read lock, so writers wait until it is dropped.
pub struct Snapshot<'a> {
    guard: RwLockReadGuard<'a, IndexState>,
}

impl Deref for Snapshot<'_> {
    type Target = IndexState;

    fn deref(&self) -> &IndexState {
        &self.guard
    }
}

/// Shared handle to the vault index.
#[derive(Debug, Clone)]
pub struct VaultIndex {
    state: Arc<RwLock<IndexState>>,
}

impl VaultIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(IndexState::new(Arc::new(config)))),
        }
    }

    pub fn config(&self) -> Arc<IndexConfig> {
        Arc::clone(&self.state.read().config)
    }

    /// Take a consistent read view.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            guard: self.state.read(),
        }
    }

    /// Insert or replace a note and re-resolve every link its arrival
    /// could affect.
    pub fn upsert(&self, note: Note) -> Result<UpsertOutcome> {
        let guard = self.state.upgradable_read();
        let Some(plan) = mutation::plan_upsert(&guard, Arc::new(note))? else {
            return Ok(UpsertOutcome::Unchanged);
        };
        let outcome = plan.outcome;

        let mut state = RwLockUpgradableReadGuard::upgrade(guard);
        mutation::apply(&mut state, plan);
        tracing::trace!(generation = state.generation, ?outcome, "upsert applied");
        Ok(outcome)
    }

    /// Remove a note. Links that pointed at it re-resolve or become
    /// unresolved. Returns the removed note, `None` if it was not indexed.
    pub fn remove(&self, id: &NoteId) -> Result<Option<Arc<Note>>> {
        let guard = self.state.upgradable_read();
        let Some(plan) = mutation::plan_remove(&guard, id)? else {
            return Ok(None);
        };

        let mut state = RwLockUpgradableReadGuard::upgrade(guard);
        let removed = mutation::apply(&mut state, plan);
        tracing::trace!(generation = state.generation, note = %id, "remove applied");
        Ok(removed)
    }

    /// Remove the note read from a vault-relative path. A note filed under
    /// the same id from a differently cased path stays.
    pub fn remove_path(&self, path: &Path) -> Result<Option<Arc<Note>>> {
        let guard = self.state.upgradable_read();
        let id = guard.id_for(path);
        let stored_here = guard
            .notes
            .get(&id)
            .is_some_and(|note| path_text(&note.path) == path_text(path));
        if !stored_here {
            return Ok(None);
        }
        let Some(plan) = mutation::plan_remove(&guard, &id)? else {
            return Ok(None);
        };

        let mut state = RwLockUpgradableReadGuard::upgrade(guard);
        let removed = mutation::apply(&mut state, plan);
        tracing::trace!(generation = state.generation, note = %id, "remove applied");
        Ok(removed)
    }

    pub fn get(&self, id: &NoteId) -> Option<Arc<Note>> {
        self.state.read().notes.get(id).cloned()
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.state.read().notes.contains_key(id)
    }

    /// Every note in id order.
    pub fn notes(&self) -> Vec<Arc<Note>> {
        self.state.read().notes.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().notes.is_empty()
    }

    pub fn verify(&self) -> Result<()> {
        self.state.read().verify()
    }

    pub fn record_failure(&self, path: &str, reason: impl Into<String>) {
        self.state.write().failures.insert(path.to_string(), reason.into());
    }

    pub fn clear_failure(&self, path: &str) {
        self.state.write().failures.remove(path);
    }

    /// Drop every note and failure record.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let config = Arc::clone(&state.config);
        let generation = state.generation + 1;
        *state = IndexState::new(config);
        state.generation = generation;
    }
}
