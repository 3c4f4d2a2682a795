//! Edit-distance suggestions for broken links.
//!
//! Only ever called explicitly when repairing links. The index never uses
//! this to resolve a link.

use crate::graph::resolution::{folder_distance, LookupKey, ResolveRules, ResolveStrategy, ResolverTables};
use crate::types::{LinkReference, NoteId};
use serde::Serialize;
use std::collections::BTreeMap;

/// A candidate target for a broken link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub id: NoteId,
    /// The name or alias that matched.
    pub matched: String,
    /// Edit distance between the link target and `matched`.
    pub distance: usize,
}

/// Ranks notes by how closely their names and aliases match a link target.
pub struct FuzzyResolver<'a> {
    tables: &'a ResolverTables,
    rules: &'a ResolveRules,
    limit: usize,
}

impl<'a> FuzzyResolver<'a> {
    pub fn new(tables: &'a ResolverTables, rules: &'a ResolveRules, limit: usize) -> Self {
        Self { tables, rules, limit }
    }

    /// Suggestions for `link` written in `from`, best first.
    ///
    /// Ordered by edit distance, then folder distance, then id.
    pub fn suggest(&self, link: &LinkReference, from: &NoteId) -> Vec<Suggestion> {
        let target = self.rules.fold(link.target.rsplit('/').next().unwrap_or(&link.target));
        let target = target.strip_suffix(".md").unwrap_or(&target);
        if target.is_empty() {
            return Vec::new();
        }

        let needle: Vec<char> = target.chars().collect();
        let max_dist = (needle.len() / 3).max(2);

        // best match per note
        let mut best: BTreeMap<NoteId, (usize, String)> = BTreeMap::new();
        for (key, ids) in self.tables.iter() {
            let name = match key {
                LookupKey::Name(n) | LookupKey::Alias(n) => n.as_str(),
                LookupKey::Path(_) => continue,
            };
            let distance = levenshtein_with_max(name, &needle, max_dist);
            if distance > max_dist {
                continue;
            }
            for id in ids {
                let entry = best.entry(id.clone()).or_insert((usize::MAX, String::new()));
                if (distance, name) < (entry.0, entry.1.as_str()) {
                    *entry = (distance, name.to_string());
                }
            }
        }

        let mut suggestions: Vec<Suggestion> = best
            .into_iter()
            .map(|(id, (distance, matched))| Suggestion { id, matched, distance })
            .collect();
        suggestions.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| {
                    folder_distance(from.folder(), a.id.folder())
                        .cmp(&folder_distance(from.folder(), b.id.folder()))
                })
                .then_with(|| a.id.cmp(&b.id))
        });
        suggestions.truncate(self.limit);
        suggestions
    }
}

impl ResolveStrategy for FuzzyResolver<'_> {
    fn candidates(&self, link: &LinkReference, from: &NoteId) -> Vec<NoteId> {
        self.suggest(link, from).into_iter().map(|s| s.id).collect()
    }
}

/// Levenshtein distance between `value` and `needle`, giving up with
/// `max_dist + 1` once every alignment exceeds `max_dist`.
fn levenshtein_with_max(value: &str, needle: &[char], max_dist: usize) -> usize {
    let n = needle.len();
    if n == 0 {
        return value.chars().count().min(max_dist + 1);
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for (i, c) in value.chars().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];

        for j in 1..=n {
            let cost = usize::from(c != needle[j - 1]);
            let d = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            curr[j] = d;
            row_min = row_min.min(d);
        }

        if row_min > max_dist {
            return max_dist + 1;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n].min(max_dist + 1)
}
