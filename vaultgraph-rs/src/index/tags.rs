//! Tag to note index.

use crate::types::NoteId;
use std::collections::{BTreeMap, BTreeSet};

/// Notes grouped by canonical tag.
///
/// Keyed by the full tag path in a `BTreeMap`, so all descendants of a tag
/// (`proj/...`) form one contiguous range.
#[derive(Debug, Clone)]
pub struct TagIndex {
    by_tag: BTreeMap<String, BTreeSet<NoteId>>,
    separator: char,
}

impl TagIndex {
    pub fn new(separator: char) -> Self {
        Self {
            by_tag: BTreeMap::new(),
            separator,
        }
    }

    pub fn insert(&mut self, id: &NoteId, tags: &BTreeSet<String>) {
        for tag in tags {
            self.by_tag.entry(tag.clone()).or_default().insert(id.clone());
        }
    }

    pub fn remove(&mut self, id: &NoteId, tags: &BTreeSet<String>) {
        for tag in tags {
            if let Some(ids) = self.by_tag.get_mut(tag) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
    }

    /// Notes carrying exactly `tag`.
    pub fn exact(&self, tag: &str) -> BTreeSet<NoteId> {
        self.by_tag.get(tag).cloned().unwrap_or_default()
    }

    /// Notes carrying a strict descendant of `tag`.
    pub fn descendants(&self, tag: &str) -> BTreeSet<NoteId> {
        let prefix = format!("{}{}", tag, self.separator);
        self.by_tag
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    /// Notes carrying `tag` or any descendant of it.
    pub fn hierarchical(&self, tag: &str) -> BTreeSet<NoteId> {
        let mut ids = self.exact(tag);
        ids.extend(self.descendants(tag));
        ids
    }

    /// Every tag with its note count, sorted by tag.
    pub fn counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.by_tag.iter().map(|(tag, ids)| (tag.as_str(), ids.len()))
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_tag.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaseRule;

    fn id(s: &str) -> NoteId {
        NoteId::from_str_path(s, CaseRule::Sensitive)
    }

    fn tags(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hierarchy_range() {
        let mut index = TagIndex::new('/');
        index.insert(&id("a.md"), &tags(&["proj"]));
        index.insert(&id("b.md"), &tags(&["proj/x"]));
        index.insert(&id("c.md"), &tags(&["proj/x/deep"]));
        index.insert(&id("d.md"), &tags(&["project"]));

        assert_eq!(index.exact("proj").len(), 1);
        let desc: Vec<String> = index.descendants("proj").iter().map(|i| i.to_string()).collect();
        assert_eq!(desc, vec!["b.md", "c.md"]);
        assert_eq!(index.hierarchical("proj").len(), 3);
    }

    #[test]
    fn test_remove_drops_empty_tags() {
        let mut index = TagIndex::new('/');
        index.insert(&id("a.md"), &tags(&["x", "y"]));
        index.insert(&id("b.md"), &tags(&["x"]));
        index.remove(&id("a.md"), &tags(&["x", "y"]));

        let counts: Vec<(&str, usize)> = index.counts().collect();
        assert_eq!(counts, vec![("x", 1)]);
    }
}
