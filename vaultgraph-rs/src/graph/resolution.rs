//! Link target resolution.
//!
//! Links are resolved in tiers; the first tier with any candidate wins:
//! 1. Exact vault-relative path (markdown links relative to the linking
//!    note's folder first, then the vault root)
//! 2. Front matter alias
//! 3. File stem or title (wikilinks without a `/` only)
//!
//! Aliases outrank titles because they are declared by the user. Ties inside
//! a tier go to the candidate with the shortest folder distance from the
//! linking note, then to the smallest note id.

use crate::config::{CaseRule, IndexConfig};
use crate::note::Note;
use crate::types::{normalize_path, LinkKind, LinkReference, NoteId, Resolution};
use std::collections::{BTreeSet, HashMap};
use unicode_normalization::UnicodeNormalization;

/// A key notes are looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupKey {
    /// Vault-relative path without extension.
    Path(String),
    /// Front matter alias.
    Alias(String),
    /// File stem or title.
    Name(String),
}

impl LookupKey {
    /// The folded text of the key.
    pub fn text(&self) -> &str {
        match self {
            LookupKey::Path(s) | LookupKey::Alias(s) | LookupKey::Name(s) => s,
        }
    }
}

/// Case rule and note extensions used to build lookup keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRules {
    pub case: CaseRule,
    pub extensions: Vec<String>,
}

impl ResolveRules {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            case: config.case_rule,
            extensions: config.extensions.clone(),
        }
    }

    /// NFC, trim, and fold per the case rule.
    pub fn fold(&self, s: &str) -> String {
        let nfc: String = s.trim().nfc().collect();
        self.case.fold(&nfc)
    }

    /// Strip a trailing note extension (`.md`) from a link target.
    fn strip_extension<'a>(&self, target: &'a str) -> &'a str {
        if let Some((stem, ext)) = target.rsplit_once('.') {
            if !stem.is_empty()
                && !stem.ends_with('/')
                && self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
            {
                return stem;
            }
        }
        target
    }

    /// Every key `note` can be found under.
    pub fn note_keys(&self, note: &Note) -> BTreeSet<LookupKey> {
        let mut keys = BTreeSet::new();
        keys.insert(LookupKey::Path(note.id.without_extension().to_string()));
        keys.insert(LookupKey::Name(self.fold(&note.stem())));
        if !note.title.trim().is_empty() {
            keys.insert(LookupKey::Name(self.fold(&note.title)));
        }
        for alias in &note.aliases {
            let folded = self.fold(alias);
            if !folded.is_empty() {
                keys.insert(LookupKey::Alias(folded));
            }
        }
        keys
    }

    /// Lookup tiers for a link written in note `from`, most specific first.
    /// Empty for self links (`[[#heading]]`).
    pub fn tiers(&self, link: &LinkReference, from: &NoteId) -> Vec<Vec<LookupKey>> {
        let target = link.target.trim();
        if target.is_empty() {
            return Vec::new();
        }
        let bare = self.strip_extension(target);

        let relative = |t: &str| {
            let joined = if from.folder().is_empty() {
                t.to_string()
            } else {
                format!("{}/{}", from.folder(), t)
            };
            LookupKey::Path(self.fold(&normalize_path(&joined)))
        };
        let absolute = |t: &str| LookupKey::Path(self.fold(&normalize_path(t)));

        match link.kind {
            LinkKind::Markdown => {
                if bare.starts_with('/') {
                    return vec![vec![absolute(bare)]];
                }
                let rel = relative(bare);
                let abs = absolute(bare);
                if rel == abs {
                    vec![vec![rel]]
                } else {
                    vec![vec![rel], vec![abs]]
                }
            }
            LinkKind::Wikilink | LinkKind::Embed => {
                if bare.starts_with("./") || bare.starts_with("../") {
                    return vec![vec![relative(bare)]];
                }
                let mut tiers = vec![
                    vec![absolute(bare)],
                    vec![LookupKey::Alias(self.fold(target))],
                ];
                if !bare.contains('/') {
                    let mut names = vec![LookupKey::Name(self.fold(bare))];
                    if bare != target {
                        names.push(LookupKey::Name(self.fold(target)));
                    }
                    tiers.push(names);
                }
                tiers
            }
        }
    }

    /// Every key any of `links` could resolve through.
    pub fn consulted_keys(&self, links: &[LinkReference], from: &NoteId) -> BTreeSet<LookupKey> {
        links
            .iter()
            .flat_map(|link| self.tiers(link, from))
            .flatten()
            .collect()
    }
}

/// Something that can list the notes filed under a lookup key.
pub trait CandidateSource {
    fn candidates(&self, key: &LookupKey) -> BTreeSet<NoteId>;
}

/// Lookup tables from keys to notes.
#[derive(Debug, Clone, Default)]
pub struct ResolverTables {
    by_key: HashMap<LookupKey, BTreeSet<NoteId>>,
}

impl ResolverTables {
    pub fn insert(&mut self, id: &NoteId, keys: &BTreeSet<LookupKey>) {
        for key in keys {
            self.by_key.entry(key.clone()).or_default().insert(id.clone());
        }
    }

    pub fn remove(&mut self, id: &NoteId, keys: &BTreeSet<LookupKey>) {
        for key in keys {
            if let Some(ids) = self.by_key.get_mut(key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_key.remove(key);
                }
            }
        }
    }

    /// All keys with their notes, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&LookupKey, &BTreeSet<NoteId>)> {
        self.by_key.iter()
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
    }
}

impl CandidateSource for ResolverTables {
    fn candidates(&self, key: &LookupKey) -> BTreeSet<NoteId> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }
}

/// The tables as they will be after one note is replaced or removed.
///
/// Lets a mutation be planned against the current state without touching it.
pub struct Overlay<'a> {
    pub base: &'a ResolverTables,
    /// Note leaving the tables, with the keys it was filed under.
    pub removed: Option<(&'a NoteId, &'a BTreeSet<LookupKey>)>,
    /// Note entering the tables, with its keys.
    pub added: Option<(&'a NoteId, &'a BTreeSet<LookupKey>)>,
}

impl CandidateSource for Overlay<'_> {
    fn candidates(&self, key: &LookupKey) -> BTreeSet<NoteId> {
        let mut ids = self.base.candidates(key);
        if let Some((id, keys)) = self.removed {
            if keys.contains(key) {
                ids.remove(id);
            }
        }
        if let Some((id, keys)) = self.added {
            if keys.contains(key) {
                ids.insert(id.clone());
            }
        }
        ids
    }
}

/// A way of mapping a link to target notes.
pub trait ResolveStrategy {
    /// Candidate targets for `link` written in `from`, best first.
    fn candidates(&self, link: &LinkReference, from: &NoteId) -> Vec<NoteId>;
}

/// The deterministic resolver used to build the link graph.
pub struct ExactResolver<'a, C: CandidateSource> {
    source: &'a C,
    rules: &'a ResolveRules,
}

impl<'a, C: CandidateSource> ExactResolver<'a, C> {
    pub fn new(source: &'a C, rules: &'a ResolveRules) -> Self {
        Self { source, rules }
    }

    /// Resolve one link.
    pub fn resolve(&self, link: &LinkReference, from: &NoteId) -> Resolution {
        if link.target.trim().is_empty() {
            // [[#heading]] points into the linking note itself
            return Resolution::Resolved(from.clone());
        }

        for tier in self.rules.tiers(link, from) {
            let mut found = BTreeSet::new();
            for key in &tier {
                found.extend(self.source.candidates(key));
            }
            if let Some(best) = closest(from, found) {
                tracing::trace!(from = %from, target = %link.target, to = %best, "resolved link");
                return Resolution::Resolved(best);
            }
        }

        Resolution::Unresolved
    }
}

impl<C: CandidateSource> ResolveStrategy for ExactResolver<'_, C> {
    fn candidates(&self, link: &LinkReference, from: &NoteId) -> Vec<NoteId> {
        self.resolve(link, from).target().cloned().into_iter().collect()
    }
}

/// Pick the candidate nearest to `from`, ties broken by id.
fn closest(from: &NoteId, candidates: BTreeSet<NoteId>) -> Option<NoteId> {
    candidates
        .into_iter()
        .min_by(|a, b| {
            folder_distance(from.folder(), a.folder())
                .cmp(&folder_distance(from.folder(), b.folder()))
                .then_with(|| a.cmp(b))
        })
}

/// Number of folder steps between two folders.
pub fn folder_distance(a: &str, b: &str) -> usize {
    let split = |s: &str| -> Vec<String> {
        s.split('/').filter(|p| !p.is_empty()).map(str::to_string).collect()
    };
    let (a, b) = (split(a), split(b));
    let common = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    (a.len() - common) + (b.len() - common)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::FileMeta;
    use crate::parser::NoteParser;
    use std::path::Path;

    fn note(path: &str, content: &str) -> Note {
        NoteParser::default()
            .parse(content.as_bytes(), Path::new(path), FileMeta::default())
            .unwrap()
    }

    fn tables(notes: &[Note]) -> (ResolverTables, ResolveRules) {
        let rules = ResolveRules::from_config(&IndexConfig::default());
        let mut tables = ResolverTables::default();
        for n in notes {
            tables.insert(&n.id, &rules.note_keys(n));
        }
        (tables, rules)
    }

    fn resolve(notes: &[Note], from: &Note, idx: usize) -> Resolution {
        let (tables, rules) = tables(notes);
        ExactResolver::new(&tables, &rules).resolve(&from.links[idx], &from.id)
    }

    fn id(path: &str) -> NoteId {
        NoteId::from_str_path(path, CaseRule::Insensitive)
    }

    #[test]
    fn test_resolve_by_stem_case_insensitive() {
        let b = note("folder/Target Note.md", "");
        let a = note("a.md", "[[target note]]");
        assert_eq!(resolve(&[a.clone(), b], &a, 0), Resolution::Resolved(id("folder/target note.md")));
    }

    #[test]
    fn test_resolve_by_path() {
        let b1 = note("x/b.md", "");
        let b2 = note("y/b.md", "");
        let a = note("a.md", "[[y/b]]");
        assert_eq!(resolve(&[a.clone(), b1, b2], &a, 0), Resolution::Resolved(id("y/b.md")));
    }

    #[test]
    fn test_alias_outranks_title() {
        let titled = note("t.md", "---\ntitle: Shared\n---\n");
        let aliased = note("z.md", "---\naliases: [Shared]\n---\n");
        let a = note("a.md", "[[Shared]]");
        assert_eq!(resolve(&[a.clone(), titled, aliased], &a, 0), Resolution::Resolved(id("z.md")));
    }

    #[test]
    fn test_tie_breaks_on_folder_distance_then_id() {
        let near = note("proj/sub/n.md", "");
        let far = note("other/n.md", "");
        let a = note("proj/a.md", "[[n]]");
        assert_eq!(
            resolve(&[a.clone(), near.clone(), far.clone()], &a, 0),
            Resolution::Resolved(id("proj/sub/n.md"))
        );

        let root = note("r.md", "[[n]]");
        assert_eq!(resolve(&[root.clone(), near, far], &root, 0), Resolution::Resolved(id("other/n.md")));

        let x = note("x/n.md", "");
        let y = note("y/n.md", "");
        assert_eq!(resolve(&[root.clone(), y, x], &root, 0), Resolution::Resolved(id("x/n.md")));
    }

    #[test]
    fn test_markdown_relative_then_root() {
        let sibling = note("docs/b.md", "");
        let rooted = note("c.md", "");
        let a = note("docs/a.md", "[b](b.md) [c](c.md) [up](../c.md)");
        let notes = [a.clone(), sibling, rooted];
        assert_eq!(resolve(&notes, &a, 0), Resolution::Resolved(id("docs/b.md")));
        assert_eq!(resolve(&notes, &a, 1), Resolution::Resolved(id("c.md")));
        assert_eq!(resolve(&notes, &a, 2), Resolution::Resolved(id("c.md")));
    }

    #[test]
    fn test_self_link() {
        let a = note("a.md", "[[#Heading]]");
        assert_eq!(resolve(&[a.clone()], &a, 0), Resolution::Resolved(a.id.clone()));
    }

    #[test]
    fn test_unresolved() {
        let a = note("a.md", "[[missing]]");
        assert_eq!(resolve(&[a.clone()], &a, 0), Resolution::Unresolved);
    }

    #[test]
    fn test_explicit_extension() {
        let b = note("b.md", "");
        let a = note("a.md", "[[b.md]]");
        assert_eq!(resolve(&[a.clone(), b], &a, 0), Resolution::Resolved(id("b.md")));
    }

    #[test]
    fn test_overlay() {
        let b = note("b.md", "");
        let a = note("a.md", "[[b]]");
        let (tables, rules) = tables(&[a.clone()]);
        let keys = rules.note_keys(&b);
        let overlay = Overlay {
            base: &tables,
            removed: None,
            added: Some((&b.id, &keys)),
        };
        assert_eq!(
            ExactResolver::new(&overlay, &rules).resolve(&a.links[0], &a.id),
            Resolution::Resolved(b.id.clone())
        );
    }

    #[test]
    fn test_folder_distance() {
        assert_eq!(folder_distance("", ""), 0);
        assert_eq!(folder_distance("a/b", "a"), 1);
        assert_eq!(folder_distance("a/b", "a/c"), 2);
        assert_eq!(folder_distance("", "x/y"), 2);
    }
}
