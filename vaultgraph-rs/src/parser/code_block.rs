//! Detection of fenced code blocks and inline code spans.
//!
//! Tags and links inside code are not real references, so every other parser
//! consults [`CodeSpans`] before accepting a match.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

// ``` or ~~~ at the start of a line, possibly indented up to three spaces
static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})").unwrap());

// Inline code: a run of backticks closed by a run of the same length
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``(?:[^`]|`[^`])+?``|`[^`\n]+`").unwrap());

/// Byte ranges of `content` that are code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSpans {
    /// Fenced blocks, sorted, covering the fence lines themselves.
    fenced: Vec<Range<usize>>,
    /// Inline spans outside fenced blocks, sorted.
    inline: Vec<Range<usize>>,
}

impl CodeSpans {
    /// Scan `content` for code.
    pub fn find(content: &str) -> Self {
        let fenced = find_fenced(content);

        let inline = INLINE_CODE
            .find_iter(content)
            .map(|m| m.range())
            .filter(|r| !in_ranges(&fenced, r.start))
            .collect();

        Self { fenced, inline }
    }

    /// Whether a byte offset lies inside any code.
    pub fn contains(&self, offset: usize) -> bool {
        in_ranges(&self.fenced, offset) || in_ranges(&self.inline, offset)
    }

    /// Whether a byte offset lies inside a fenced block.
    pub fn in_fence(&self, offset: usize) -> bool {
        in_ranges(&self.fenced, offset)
    }

    pub fn is_empty(&self) -> bool {
        self.fenced.is_empty() && self.inline.is_empty()
    }
}

/// Whether `offset` lies in one of `ranges`, which must be sorted and disjoint.
pub(crate) fn in_ranges(ranges: &[Range<usize>], offset: usize) -> bool {
    let idx = ranges.partition_point(|r| r.end <= offset);
    ranges.get(idx).is_some_and(|r| r.start <= offset)
}

fn find_fenced(content: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    // (start offset, fence char, fence length) of the currently open block
    let mut open: Option<(usize, char, usize)> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let Some(cap) = FENCE.captures(line) else {
            continue;
        };
        let Some(fence) = cap.get(1) else {
            continue;
        };
        let fence_char = if fence.as_str().starts_with('`') { '`' } else { '~' };
        let fence_len = fence.as_str().len();

        match open {
            None => open = Some((line_start, fence_char, fence_len)),
            Some((start, ch, len)) => {
                let rest = line[fence.end()..].trim();
                if ch == fence_char && fence_len >= len && rest.is_empty() {
                    ranges.push(start..offset);
                    open = None;
                }
            }
        }
    }

    // An unclosed fence runs to the end of the document
    if let Some((start, _, _)) = open {
        ranges.push(start..content.len());
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block() {
        let content = "before\n```rust\nlet x = #tag;\n```\nafter #real";
        let spans = CodeSpans::find(content);
        let inside = content.find("#tag").unwrap();
        let outside = content.find("#real").unwrap();
        assert!(spans.contains(inside));
        assert!(spans.in_fence(inside));
        assert!(!spans.contains(outside));
    }

    #[test]
    fn test_tilde_fence_requires_matching_char() {
        let content = "~~~\ncode\n```\nstill code\n~~~\nout";
        let spans = CodeSpans::find(content);
        assert!(spans.contains(content.find("still").unwrap()));
        assert!(!spans.contains(content.find("out").unwrap()));
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let content = "text\n```\nno close #x";
        let spans = CodeSpans::find(content);
        assert!(spans.contains(content.find("#x").unwrap()));
        assert!(!spans.contains(0));
    }

    #[test]
    fn test_inline_code() {
        let content = "use `#not-a-tag` and ``a ` b`` then #tag";
        let spans = CodeSpans::find(content);
        assert!(spans.contains(content.find("#not").unwrap()));
        assert!(spans.contains(content.find("a ` b").unwrap()));
        assert!(!spans.contains(content.find("#tag").unwrap()));
        assert!(!spans.in_fence(content.find("#not").unwrap()));
    }

    #[test]
    fn test_no_code() {
        assert!(CodeSpans::find("plain text").is_empty());
    }
}
