//! Planning and applying index mutations.
//!
//! A mutation is planned against the current state without touching it, so
//! a plan that fails validation leaves the index exactly as it was. Only the
//! links that consult a lookup key whose note set changes are re-resolved.

use super::IndexState;
use crate::error::{Result, VaultError};
use crate::graph::{CandidateSource, ExactResolver, LookupKey, Overlay, ResolveRules};
use crate::note::Note;
use crate::types::{path_text, NoteId, ResolvedLink};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of inserting or replacing a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The note was new.
    Inserted,
    /// The note replaced an older version.
    Updated,
    /// Same content; only file metadata changed.
    MetadataOnly,
    /// Identical to the indexed note.
    Unchanged,
}

/// Re-resolved outgoing links of one note.
struct Relink {
    source: NoteId,
    links: Vec<ResolvedLink>,
    consults: BTreeSet<LookupKey>,
}

pub(crate) struct Plan {
    pub(crate) outcome: UpsertOutcome,
    removed: Option<NoteId>,
    inserted: Option<(Arc<Note>, BTreeSet<LookupKey>)>,
    relinks: Vec<Relink>,
}

fn relink<C: CandidateSource>(resolver: &ExactResolver<'_, C>, rules: &ResolveRules, note: &Note) -> Relink {
    Relink {
        source: note.id.clone(),
        links: note
            .links
            .iter()
            .map(|reference| ResolvedLink {
                resolution: resolver.resolve(reference, &note.id),
                reference: reference.clone(),
            })
            .collect(),
        consults: rules.consulted_keys(&note.links, &note.id),
    }
}

/// Notes whose links consult any of `keys`.
fn watchers_of<'a>(state: &IndexState, keys: impl Iterator<Item = &'a LookupKey>) -> BTreeSet<NoteId> {
    let mut affected = BTreeSet::new();
    for key in keys {
        if let Some(sources) = state.graph.watchers(key) {
            affected.extend(sources.iter().cloned());
        }
    }
    affected
}

fn validate(relinks: &[Relink], exists: impl Fn(&NoteId) -> bool) -> Result<()> {
    for relink in relinks {
        for link in &relink.links {
            if let Some(target) = link.resolution.target() {
                if !exists(target) {
                    return Err(VaultError::ConsistencyViolation(format!(
                        "{} would link to missing note {}",
                        relink.source, target
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Plan inserting or replacing `note`. `None` when nothing would change.
///
/// Two files whose paths fold to the same id cannot both be indexed. The
/// lexicographically smaller path keeps the id, whichever arrives first.
pub(crate) fn plan_upsert(state: &IndexState, note: Arc<Note>) -> Result<Option<Plan>> {
    let id = note.id.clone();
    let expected = NoteId::from_path(&note.path, state.rules.case);
    if expected != id {
        return Err(VaultError::ConsistencyViolation(format!(
            "note id {} does not match its path {}",
            id,
            note.path.display()
        )));
    }

    let previous = state.notes.get(&id);
    if let Some(old) = previous {
        let (path, existing) = (path_text(&note.path), path_text(&old.path));
        if path > existing {
            return Err(VaultError::PathCollision {
                id: id.to_string(),
                path,
                existing,
            });
        }
        if old.content_hash == note.content_hash && old.path == note.path {
            if **old == *note {
                return Ok(None);
            }
            let keys = state.keys.get(&id).cloned().unwrap_or_default();
            return Ok(Some(Plan {
                outcome: UpsertOutcome::MetadataOnly,
                removed: None,
                inserted: Some((note, keys)),
                relinks: Vec::new(),
            }));
        }
    }

    let new_keys = state.rules.note_keys(&note);
    let old_keys = state.keys.get(&id);

    let relinks = {
        // keys present before and after keep the same notes
        let mut affected = match old_keys {
            Some(old) => watchers_of(state, old.symmetric_difference(&new_keys)),
            None => watchers_of(state, new_keys.iter()),
        };
        affected.remove(&id);

        let overlay = Overlay {
            base: &state.tables,
            removed: old_keys.map(|keys| (&id, keys)),
            added: Some((&id, &new_keys)),
        };
        let resolver = ExactResolver::new(&overlay, &state.rules);

        let mut relinks = vec![relink(&resolver, &state.rules, &note)];
        for source in &affected {
            if let Some(other) = state.notes.get(source) {
                relinks.push(relink(&resolver, &state.rules, other));
            }
        }
        relinks
    };

    validate(&relinks, |t| *t == id || state.notes.contains_key(t))?;

    Ok(Some(Plan {
        outcome: if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        },
        removed: None,
        inserted: Some((note, new_keys)),
        relinks,
    }))
}

/// Plan removing `id`. `None` when the note is not indexed.
pub(crate) fn plan_remove(state: &IndexState, id: &NoteId) -> Result<Option<Plan>> {
    let Some(old_keys) = state.keys.get(id) else {
        return Ok(None);
    };

    let mut affected = watchers_of(state, old_keys.iter());
    if let Some(sources) = state.graph.backward(id) {
        affected.extend(sources.iter().cloned());
    }
    affected.remove(id);

    let overlay = Overlay {
        base: &state.tables,
        removed: Some((id, old_keys)),
        added: None,
    };
    let resolver = ExactResolver::new(&overlay, &state.rules);
    let relinks: Vec<Relink> = affected
        .iter()
        .filter_map(|source| state.notes.get(source))
        .map(|note| relink(&resolver, &state.rules, note))
        .collect();

    validate(&relinks, |t| t != id && state.notes.contains_key(t))?;

    Ok(Some(Plan {
        outcome: UpsertOutcome::Updated,
        removed: Some(id.clone()),
        inserted: None,
        relinks,
    }))
}

/// Apply a validated plan. Infallible, so the state is never left half
/// updated.
pub(crate) fn apply(state: &mut IndexState, plan: Plan) -> Option<Arc<Note>> {
    let mut removed_note = None;

    if let Some(id) = &plan.removed {
        if let Some(old) = state.notes.remove(id) {
            state.tags.remove(id, &old.tags);
            removed_note = Some(old);
        }
        if let Some(keys) = state.keys.remove(id) {
            state.tables.remove(id, &keys);
        }
        state.paths.remove(id);
        state.graph.retract(id);
    }

    if let Some((note, keys)) = plan.inserted {
        let id = note.id.clone();
        match state.notes.get(&id) {
            Some(old) => state.tags.remove(&id, &old.tags),
            None => state.paths.insert(&id),
        }
        if let Some(old_keys) = state.keys.get(&id) {
            state.tables.remove(&id, old_keys);
        }
        state.tables.insert(&id, &keys);
        state.tags.insert(&id, &note.tags);
        state.keys.insert(id.clone(), keys);
        state.notes.insert(id, note);
    }

    for relink in plan.relinks {
        state.graph.set_links(&relink.source, relink.links, relink.consults);
    }

    state.generation += 1;
    removed_note
}
