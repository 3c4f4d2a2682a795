//! Forward and backward link edges.

use crate::graph::resolution::LookupKey;
use crate::types::{NoteId, ResolvedLink};
use std::collections::{BTreeSet, HashMap};

/// The resolved link graph.
///
/// `backward` is kept as the exact inverse of the resolved targets in
/// `forward`. `watchers` maps each lookup key to the notes whose links
/// consult it, so a note appearing under a key finds every link it could
/// now satisfy without a full scan.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    forward: HashMap<NoteId, Vec<ResolvedLink>>,
    backward: HashMap<NoteId, BTreeSet<NoteId>>,
    consults: HashMap<NoteId, BTreeSet<LookupKey>>,
    watchers: HashMap<LookupKey, BTreeSet<NoteId>>,
}

impl LinkGraph {
    /// Outgoing links of a note, in document order.
    pub fn forward(&self, id: &NoteId) -> &[ResolvedLink] {
        self.forward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Notes with at least one resolved link to `id`.
    pub fn backward(&self, id: &NoteId) -> Option<&BTreeSet<NoteId>> {
        self.backward.get(id)
    }

    /// Notes whose links consult `key`.
    pub fn watchers(&self, key: &LookupKey) -> Option<&BTreeSet<NoteId>> {
        self.watchers.get(key)
    }

    /// Notes that have outgoing links.
    pub fn sources(&self) -> impl Iterator<Item = (&NoteId, &Vec<ResolvedLink>)> {
        self.forward.iter()
    }

    /// Replace the outgoing links of `source`.
    pub fn set_links(&mut self, source: &NoteId, links: Vec<ResolvedLink>, consults: BTreeSet<LookupKey>) {
        self.retract(source);

        for target in resolved_targets(&links) {
            self.backward
                .entry(target.clone())
                .or_default()
                .insert(source.clone());
        }
        for key in &consults {
            self.watchers
                .entry(key.clone())
                .or_default()
                .insert(source.clone());
        }

        if !links.is_empty() {
            self.forward.insert(source.clone(), links);
        }
        if !consults.is_empty() {
            self.consults.insert(source.clone(), consults);
        }
    }

    /// Remove every outgoing edge of `source`.
    pub fn retract(&mut self, source: &NoteId) {
        if let Some(old) = self.forward.remove(source) {
            for target in resolved_targets(&old) {
                if let Some(set) = self.backward.get_mut(target) {
                    set.remove(source);
                    if set.is_empty() {
                        self.backward.remove(target);
                    }
                }
            }
        }
        if let Some(keys) = self.consults.remove(source) {
            for key in keys {
                if let Some(set) = self.watchers.get_mut(&key) {
                    set.remove(source);
                    if set.is_empty() {
                        self.watchers.remove(&key);
                    }
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.backward.clear();
        self.consults.clear();
        self.watchers.clear();
    }

    /// Count of (resolved, unresolved) links.
    pub fn link_counts(&self) -> (usize, usize) {
        self.forward
            .values()
            .flatten()
            .fold((0, 0), |(r, u), link| {
                if link.resolution.is_resolved() {
                    (r + 1, u)
                } else {
                    (r, u + 1)
                }
            })
    }

    /// Check every graph invariant. `exists` tells whether a note is in the
    /// index. Returns a description of the first violation found.
    pub fn verify(&self, exists: impl Fn(&NoteId) -> bool) -> Result<(), String> {
        let mut expected: HashMap<&NoteId, BTreeSet<&NoteId>> = HashMap::new();

        for (source, links) in &self.forward {
            if !exists(source) {
                return Err(format!("forward edges from missing note {}", source));
            }
            for target in resolved_targets(links) {
                if !exists(target) {
                    return Err(format!("{} links to missing note {}", source, target));
                }
                expected.entry(target).or_default().insert(source);
            }
        }

        if expected.len() != self.backward.len() {
            return Err(format!(
                "backward index has {} targets, forward edges imply {}",
                self.backward.len(),
                expected.len()
            ));
        }
        for (target, sources) in &self.backward {
            let Some(implied) = expected.get(target) else {
                return Err(format!("backward entry for {} has no forward edge", target));
            };
            if sources.iter().collect::<BTreeSet<_>>() != *implied {
                return Err(format!("backward entry for {} does not match forward edges", target));
            }
        }

        for (key, sources) in &self.watchers {
            for source in sources {
                if !self.consults.get(source).is_some_and(|keys| keys.contains(key)) {
                    return Err(format!("{} watches {:?} without consulting it", source, key));
                }
            }
        }
        for (source, keys) in &self.consults {
            if !exists(source) {
                return Err(format!("lookup keys recorded for missing note {}", source));
            }
            for key in keys {
                if !self.watchers.get(key).is_some_and(|s| s.contains(source)) {
                    return Err(format!("{} consults {:?} but is not watching it", source, key));
                }
            }
        }

        Ok(())
    }
}

fn resolved_targets(links: &[ResolvedLink]) -> impl Iterator<Item = &NoteId> {
    links.iter().filter_map(|l| l.resolution.target())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaseRule;
    use crate::types::{LinkKind, LinkReference, Resolution, SourceSpan};

    fn id(s: &str) -> NoteId {
        NoteId::from_str_path(s, CaseRule::Sensitive)
    }

    fn link(target: Option<&str>) -> ResolvedLink {
        ResolvedLink {
            reference: LinkReference {
                kind: LinkKind::Wikilink,
                target: target.unwrap_or("missing").to_string(),
                alias: None,
                anchor: None,
                span: SourceSpan { start: 0, end: 0, line: 1, column: 0 },
                in_front_matter: false,
            },
            resolution: match target {
                Some(t) => Resolution::Resolved(id(t)),
                None => Resolution::Unresolved,
            },
        }
    }

    fn keys(names: &[&str]) -> BTreeSet<LookupKey> {
        names.iter().map(|n| LookupKey::Name(n.to_string())).collect()
    }

    #[test]
    fn test_set_links_maintains_inverse() {
        let mut graph = LinkGraph::default();
        graph.set_links(&id("a.md"), vec![link(Some("b.md")), link(None)], keys(&["b", "missing"]));

        assert_eq!(graph.forward(&id("a.md")).len(), 2);
        assert!(graph.backward(&id("b.md")).unwrap().contains(&id("a.md")));
        assert!(graph.watchers(&LookupKey::Name("missing".into())).unwrap().contains(&id("a.md")));
        assert_eq!(graph.link_counts(), (1, 1));

        let all = |_: &NoteId| true;
        assert!(graph.verify(all).is_ok());
    }

    #[test]
    fn test_relink_drops_stale_backward() {
        let mut graph = LinkGraph::default();
        graph.set_links(&id("a.md"), vec![link(Some("b.md"))], keys(&["b"]));
        graph.set_links(&id("a.md"), vec![link(Some("c.md"))], keys(&["c"]));

        assert!(graph.backward(&id("b.md")).is_none());
        assert!(graph.watchers(&LookupKey::Name("b".into())).is_none());
        assert!(graph.backward(&id("c.md")).unwrap().contains(&id("a.md")));
        assert!(graph.verify(|_| true).is_ok());
    }

    #[test]
    fn test_duplicate_links_single_backward_entry() {
        let mut graph = LinkGraph::default();
        graph.set_links(&id("a.md"), vec![link(Some("b.md")), link(Some("b.md"))], keys(&["b"]));
        assert_eq!(graph.backward(&id("b.md")).unwrap().len(), 1);

        graph.retract(&id("a.md"));
        assert!(graph.backward(&id("b.md")).is_none());
        assert!(graph.forward(&id("a.md")).is_empty());
    }

    #[test]
    fn test_verify_detects_missing_target() {
        let mut graph = LinkGraph::default();
        graph.set_links(&id("a.md"), vec![link(Some("b.md"))], keys(&["b"]));
        let only_a = |n: &NoteId| n.as_str() == "a.md";
        assert!(graph.verify(only_a).unwrap_err().contains("missing note b.md"));
    }
}
