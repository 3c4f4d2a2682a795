//! Tag parsing (`#tag`, `#tag/subtag`) and canonicalization.

use crate::parser::code_block::{in_ranges, CodeSpans};
use crate::types::{LineIndex, SourceSpan};
use regex::Regex;
use std::ops::Range;

/// An inline tag occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTag {
    /// Tag text as written, without the `#`.
    pub raw: String,
    /// Position of the tag including the `#`.
    pub span: SourceSpan,
}

/// Finds inline tags and canonicalizes tag names for one separator setting.
#[derive(Debug, Clone)]
pub struct TagParser {
    pattern: Regex,
    separator: char,
    case_sensitive: bool,
}

impl TagParser {
    pub fn new(separator: char, case_sensitive: bool) -> Self {
        // `#` preceded by start or a non-word, non-& char. Rust regex has no
        // lookbehind, so the preceding char is part of the match.
        let sep = regex::escape(&separator.to_string());
        let pattern = Regex::new(&format!(r"(?:^|[^\w&#])#([\w/\-{}]+)", sep))
            .unwrap_or_else(|_| Regex::new(r"(?:^|[^\w&#])#([\w/\-]+)").unwrap());
        Self {
            pattern,
            separator,
            case_sensitive,
        }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Find inline tags in `content[from..]`, skipping code and `excluded`
    /// ranges (wikilinks, markdown link targets). `excluded` must be sorted
    /// and disjoint, as [`ParsedLinks::covered`](crate::parser::links::ParsedLinks) is.
    pub fn find_inline(
        &self,
        content: &str,
        from: usize,
        code: &CodeSpans,
        excluded: &[Range<usize>],
    ) -> Vec<InlineTag> {
        let mut tags = Vec::new();
        let region = &content[from..];
        let lines = LineIndex::new(content);

        for cap in self.pattern.captures_iter(region) {
            let Some(name) = cap.get(1) else {
                continue;
            };
            let hash = from + name.start() - 1;
            let end = from + name.end();

            if code.contains(hash) || in_ranges(excluded, hash) {
                continue;
            }

            let raw = name.as_str().trim_end_matches(['/', '-', self.separator]);
            if raw.starts_with(['/', self.separator]) || !is_valid_tag_body(raw) {
                continue;
            }

            tags.push(InlineTag {
                raw: raw.to_string(),
                span: lines.span(hash, end.min(hash + 1 + raw.len())),
            });
        }

        tags
    }

    /// Canonical form of a tag: no `#`, hierarchy joined by the configured
    /// separator (either `/` or the separator is accepted on input), empty
    /// segments dropped, lowercased unless tags are case sensitive.
    pub fn canonicalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim().trim_start_matches('#');
        let segments: Vec<String> = trimmed
            .split(['/', self.separator])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                if self.case_sensitive {
                    s.to_string()
                } else {
                    s.to_lowercase()
                }
            })
            .collect();

        if segments.is_empty() {
            return None;
        }
        Some(segments.join(&self.separator.to_string()))
    }

    /// Canonical tags from a front matter `tags` value item. Items may hold
    /// several space separated tags.
    pub fn canonicalize_items(&self, items: &[String]) -> Vec<String> {
        items
            .iter()
            .flat_map(|item| item.split_whitespace())
            .filter_map(|t| self.canonicalize(t))
            .collect()
    }

    /// Whether `tag` equals `ancestor` or sits below it in the hierarchy.
    pub fn is_within(&self, tag: &str, ancestor: &str) -> bool {
        tag == ancestor
            || (tag.len() > ancestor.len()
                && tag.starts_with(ancestor)
                && tag[ancestor.len()..].starts_with(self.separator))
    }
}

impl Default for TagParser {
    fn default() -> Self {
        Self::new('/', false)
    }
}

/// A tag needs at least one character that is not a digit.
fn is_valid_tag_body(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().any(|c| !c.is_ascii_digit() && c != '/' && c != '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(content: &str) -> Vec<String> {
        let parser = TagParser::default();
        let code = CodeSpans::find(content);
        parser
            .find_inline(content, 0, &code, &[])
            .into_iter()
            .map(|t| t.raw)
            .collect()
    }

    #[test]
    fn test_simple_tags() {
        assert_eq!(inline("Some #tag and #other"), vec!["tag", "other"]);
        assert_eq!(inline("#start of line"), vec!["start"]);
    }

    #[test]
    fn test_nested_tags() {
        assert_eq!(inline("#proj/y and #a/b/c"), vec!["proj/y", "a/b/c"]);
    }

    #[test]
    fn test_not_tags() {
        assert!(inline("issue #123").is_empty());
        assert!(inline("email@x#frag").is_empty());
        assert!(inline("&#39; entity").is_empty());
        assert!(inline("# Heading").is_empty());
        assert!(inline("word#notag").is_empty());
    }

    #[test]
    fn test_numeric_prefix_allowed_with_letters() {
        assert_eq!(inline("#2024review"), vec!["2024review"]);
    }

    #[test]
    fn test_trailing_separator_trimmed() {
        assert_eq!(inline("#proj/ done"), vec!["proj"]);
    }

    #[test]
    fn test_code_excluded() {
        assert_eq!(inline("`#code` and #real\n```\n#fenced\n```"), vec!["real"]);
    }

    #[test]
    fn test_excluded_ranges() {
        let content = "[[note#heading]] #tag";
        let parser = TagParser::default();
        let code = CodeSpans::find(content);
        let tags = parser.find_inline(content, 0, &code, &[0..16]);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].raw, "tag");
        assert_eq!(tags[0].span.start, 17);
        assert_eq!(tags[0].span.end, 21);
    }

    #[test]
    fn test_unicode_tags() {
        assert_eq!(inline("#café #日本"), vec!["café", "日本"]);
    }

    #[test]
    fn test_canonicalize() {
        let parser = TagParser::default();
        assert_eq!(parser.canonicalize("#Proj/X"), Some("proj/x".into()));
        assert_eq!(parser.canonicalize("proj//x/"), Some("proj/x".into()));
        assert_eq!(parser.canonicalize("#"), None);

        let dotted = TagParser::new('.', true);
        assert_eq!(dotted.canonicalize("Area/Sub.Leaf"), Some("Area.Sub.Leaf".into()));
    }

    #[test]
    fn test_custom_separator_inline() {
        let parser = TagParser::new('.', false);
        let content = "see #area.sub here";
        let code = CodeSpans::find(content);
        let tags = parser.find_inline(content, 0, &code, &[]);
        assert_eq!(tags[0].raw, "area.sub");
    }

    #[test]
    fn test_canonicalize_items() {
        let parser = TagParser::default();
        let items = vec!["a b".to_string(), "#C/d".to_string()];
        assert_eq!(parser.canonicalize_items(&items), vec!["a", "b", "c/d"]);
    }

    #[test]
    fn test_is_within() {
        let parser = TagParser::default();
        assert!(parser.is_within("proj/x", "proj"));
        assert!(parser.is_within("proj", "proj"));
        assert!(!parser.is_within("project", "proj"));
    }
}
