//! Heading parsing and slug generation.

use crate::parser::code_block::CodeSpans;
use crate::types::Heading;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

// ATX-style heading, optional trailing block id
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,6})\s+(.+?)(?:\s+\^[a-zA-Z0-9_-]+)?\s*$").unwrap()
});

/// Parse the headings of `content[from..]` outside fenced code.
///
/// `first_line` is the line number of `content[from]`.
pub fn parse_headings(content: &str, from: usize, first_line: usize, code: &CodeSpans) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut slug_counts: HashMap<String, usize> = HashMap::new();
    let mut offset = from;

    for (idx, line) in content[from..].split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += line.len();

        if code.in_fence(line_start) {
            continue;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        let Some(cap) = HEADING.captures(line) else {
            continue;
        };
        let (Some(hashes), Some(text)) = (cap.get(1), cap.get(2)) else {
            continue;
        };

        let text = text.as_str().trim().to_string();
        let slug = unique_slug(slugify(&text), &mut slug_counts);
        headings.push(Heading {
            text,
            level: hashes.as_str().len() as u8,
            line: first_line + idx,
            slug,
        });
    }

    headings
}

/// Generate a URL-safe slug from heading text.
///
/// NFC-normalized, lowercased, whitespace runs become `-`, characters other
/// than alphanumerics, `-` and `_` are dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_hyphen = false;

    for c in text.nfc() {
        if c.is_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else if c == '-' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    slug
}

fn unique_slug(base: String, counts: &mut HashMap<String, usize>) -> String {
    let count = counts.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{}-{}", base, *count - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headings(content: &str) -> Vec<Heading> {
        parse_headings(content, 0, 1, &CodeSpans::find(content))
    }

    #[test]
    fn test_levels_and_lines() {
        let found = headings("# One\ntext\n### Three ^blk\n");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].level, 1);
        assert_eq!(found[0].line, 1);
        assert_eq!(found[1].text, "Three");
        assert_eq!(found[1].level, 3);
        assert_eq!(found[1].line, 3);
    }

    #[test]
    fn test_offset_start() {
        let content = "---\na: 1\n---\n## Body Heading\n";
        let from = content.find("##").unwrap();
        let found = parse_headings(content, from, 4, &CodeSpans::find(content));
        assert_eq!(found[0].line, 4);
    }

    #[test]
    fn test_fenced_code_skipped() {
        let found = headings("```\n# not a heading\n```\n# Real");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "Real");
    }

    #[test]
    fn test_not_headings() {
        assert!(headings("#tag line").is_empty());
        assert!(headings("####### seven").is_empty());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Trim -- me  "), "trim-me");
        assert_eq!(slugify("What's new?"), "whats-new");
        assert_eq!(slugify("Café Über"), "café-über");
    }

    #[test]
    fn test_unique_slugs() {
        let found = headings("# Same\n# Same\n# Same");
        let slugs: Vec<&str> = found.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["same", "same-1", "same-2"]);
    }
}
