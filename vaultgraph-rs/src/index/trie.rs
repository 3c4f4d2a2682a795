//! Folder trie over note ids.

use crate::types::NoteId;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
struct Folder {
    children: BTreeMap<String, Folder>,
    notes: BTreeSet<NoteId>,
}

impl Folder {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.notes.is_empty()
    }

    fn collect(&self, out: &mut Vec<NoteId>) {
        out.extend(self.notes.iter().cloned());
        for child in self.children.values() {
            child.collect(out);
        }
    }

    /// Remove `id` below this folder, pruning folders left empty.
    fn remove(&mut self, segments: &[&str], id: &NoteId) -> bool {
        match segments.split_first() {
            None => self.notes.remove(id),
            Some((head, rest)) => {
                let Some(child) = self.children.get_mut(*head) else {
                    return false;
                };
                let removed = child.remove(rest, id);
                if child.is_empty() {
                    self.children.remove(*head);
                }
                removed
            }
        }
    }
}

/// Note ids filed by folder, so prefix and folder queries only touch the
/// matching subtree.
#[derive(Debug, Clone, Default)]
pub struct PathTrie {
    root: Folder,
    len: usize,
}

fn segments(folder: &str) -> Vec<&str> {
    folder.split('/').filter(|s| !s.is_empty()).collect()
}

impl PathTrie {
    pub fn insert(&mut self, id: &NoteId) {
        let mut node = &mut self.root;
        for segment in segments(id.folder()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        if node.notes.insert(id.clone()) {
            self.len += 1;
        }
    }

    pub fn remove(&mut self, id: &NoteId) {
        let folder = id.folder().to_string();
        if self.root.remove(&segments(&folder), id) {
            self.len -= 1;
        }
    }

    /// Ids that start with `prefix`, sorted. `prefix` must already be
    /// normalized and case folded like the ids.
    pub fn with_prefix(&self, prefix: &str) -> Vec<NoteId> {
        let (folders, partial) = match prefix.rsplit_once('/') {
            Some((dirs, last)) => (segments(dirs), last),
            None => (Vec::new(), prefix),
        };

        let mut node = &self.root;
        for segment in folders {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }

        let mut out = Vec::new();
        out.extend(
            node.notes
                .iter()
                .filter(|id| id.as_str().starts_with(prefix))
                .cloned(),
        );
        for (name, child) in node.children.range(partial.to_string()..) {
            if !name.starts_with(partial) {
                break;
            }
            child.collect(&mut out);
        }
        out.sort();
        out
    }

    /// Every id in the trie, sorted.
    pub fn all(&self) -> Vec<NoteId> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out.sort();
        out
    }

    /// Folders with their direct note counts, sorted by path.
    pub fn folders(&self) -> Vec<(String, usize)> {
        fn walk(node: &Folder, path: &str, out: &mut Vec<(String, usize)>) {
            for (name, child) in &node.children {
                let child_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", path, name)
                };
                out.push((child_path.clone(), child.notes.len()));
                walk(child, &child_path, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.root, "", &mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = Folder::default();
        self.len = 0;
    }
}
