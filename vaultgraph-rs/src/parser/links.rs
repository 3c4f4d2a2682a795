//! Wikilink, embed and markdown link parsing.

use crate::parser::code_block::{in_ranges, CodeSpans};
use crate::types::{Anchor, LinkKind, LinkReference, LineIndex};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

// (!)?                       - embed marker (group 1)
// \[\[                       - opening [[
// ([^\]\|#\n]*)              - target, may be empty for [[#heading]] (group 2)
// (?:#\^([a-zA-Z0-9_-]+))?   - block reference (group 3)
// (?:#([^\]\|\n]+))?         - heading reference (group 4)
// (?:\|([^\]\n]+))?          - alias (group 5)
// \]\]                       - closing ]]
static WIKILINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!?)\[\[([^\]\|#\n]*)(?:#\^([a-zA-Z0-9_-]+))?(?:#([^\]\|\n]+))?(?:\|([^\]\n]+))?\]\]")
        .unwrap()
});

// [text](target "optional title"), target optionally in <angle brackets>
static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[([^\]\n]*)\]\(\s*(<[^>\n]+>|[^)\s]+)(?:\s+"[^"\n]*")?\s*\)"#).unwrap()
});

const MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "mp3", "wav", "ogg", "m4a", "flac", "mp4",
    "webm", "mov", "avi", "pdf",
];

/// Links found in a note, plus the byte ranges they cover.
#[derive(Debug, Clone, Default)]
pub struct ParsedLinks {
    /// Note references in document order.
    pub links: Vec<LinkReference>,
    /// Ranges of every wikilink and markdown link, including skipped ones.
    /// Tags inside these ranges are not tags.
    pub covered: Vec<Range<usize>>,
}

/// Find note links in `content`. Links before `body_offset` are marked as
/// front matter links. Media and external links are skipped.
pub fn parse_links(content: &str, body_offset: usize, code: &CodeSpans) -> ParsedLinks {
    let mut parsed = ParsedLinks::default();
    let lines = LineIndex::new(content);

    for cap in WIKILINK.captures_iter(content) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        if code.contains(whole.start()) {
            continue;
        }
        parsed.covered.push(whole.range());

        let target = cap.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        let anchor = match (cap.get(3), cap.get(4)) {
            (Some(block), _) => Some(Anchor::Block(block.as_str().to_string())),
            (None, Some(heading)) => Some(Anchor::Heading(heading.as_str().trim().to_string())),
            (None, None) => None,
        };
        if (target.is_empty() && anchor.is_none()) || is_media_target(target) {
            continue;
        }

        let kind = if cap.get(1).is_some_and(|m| !m.as_str().is_empty()) {
            LinkKind::Embed
        } else {
            LinkKind::Wikilink
        };

        parsed.links.push(LinkReference {
            kind,
            target: target.to_string(),
            alias: cap.get(5).map(|m| m.as_str().trim().to_string()),
            anchor,
            span: lines.span(whole.start(), whole.end()),
            in_front_matter: whole.start() < body_offset,
        });
    }

    // wikilink ranges come out of the regex sorted and disjoint
    let wikilinks = std::mem::take(&mut parsed.covered);
    let mut markdown = Vec::new();
    for cap in MARKDOWN_LINK.captures_iter(content) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        if whole.start() < body_offset
            || code.contains(whole.start())
            || in_ranges(&wikilinks, whole.start())
        {
            continue;
        }
        markdown.push(whole.range());

        let raw = cap.get(3).map(|m| m.as_str()).unwrap_or("");
        let Some((target, anchor)) = split_markdown_target(raw) else {
            continue;
        };
        if is_media_target(&target) {
            continue;
        }

        let text = cap.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        parsed.links.push(LinkReference {
            kind: LinkKind::Markdown,
            target,
            alias: (!text.is_empty()).then(|| text.to_string()),
            anchor,
            span: lines.span(whole.start(), whole.end()),
            in_front_matter: false,
        });
    }

    parsed.links.sort_by_key(|l| l.span.start);
    parsed.covered = merge_ranges(wikilinks, markdown);
    parsed
}

/// Sorted union of two sorted range lists, with overlaps merged.
fn merge_ranges(a: Vec<Range<usize>>, b: Vec<Range<usize>>) -> Vec<Range<usize>> {
    let mut all = a;
    all.extend(b);
    all.sort_by_key(|r| r.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(all.len());
    for range in all {
        match merged.last_mut() {
            Some(last) if range.start < last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Split a markdown link destination into a decoded note path and anchor.
/// Returns `None` for external URLs and same-note fragments.
fn split_markdown_target(raw: &str) -> Option<(String, Option<Anchor>)> {
    let raw = raw.trim_start_matches('<').trim_end_matches('>');
    if raw.is_empty() || raw.starts_with('#') || is_external(raw) {
        return None;
    }

    let (path, fragment) = match raw.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (raw, None),
    };
    let path = decode(path);
    if path.is_empty() {
        return None;
    }

    let anchor = fragment
        .filter(|f| !f.is_empty())
        .map(|f| match f.strip_prefix('^') {
            Some(block) => Anchor::Block(decode(block)),
            None => Anchor::Heading(decode(f)),
        });

    Some((path, anchor))
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

fn is_external(target: &str) -> bool {
    let scheme_end = target.find(':');
    match scheme_end {
        Some(i) => {
            let scheme = &target[..i];
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
                && scheme.len() > 1
        }
        None => false,
    }
}

/// Check if a target looks like a media file (image, audio, video, PDF).
pub fn is_media_target(target: &str) -> bool {
    target
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
}

/// Render a link in its original syntax with a new target.
pub fn render_link(link: &LinkReference, target: &str) -> String {
    match link.kind {
        LinkKind::Wikilink | LinkKind::Embed => {
            let mut out = String::new();
            if link.kind == LinkKind::Embed {
                out.push('!');
            }
            out.push_str("[[");
            out.push_str(target);
            if let Some(anchor) = &link.anchor {
                out.push_str(&anchor.to_string());
            }
            if let Some(alias) = &link.alias {
                out.push('|');
                out.push_str(alias);
            }
            out.push_str("]]");
            out
        }
        LinkKind::Markdown => {
            let encoded: Vec<String> = target
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect();
            let mut dest = encoded.join("/");
            if let Some(anchor) = &link.anchor {
                let (prefix, text) = match anchor {
                    Anchor::Heading(h) => ("#", h),
                    Anchor::Block(b) => ("#^", b),
                };
                dest.push_str(prefix);
                dest.push_str(&urlencoding::encode(text));
            }
            format!("[{}]({})", link.alias.as_deref().unwrap_or(""), dest)
        }
    }
}

/// Replace one link in `content` with a copy pointing at `new_target`.
///
/// Returns `None` when the text at the link's span no longer looks like
/// that link (the file changed since it was parsed).
pub fn rewrite_link_target(content: &str, link: &LinkReference, new_target: &str) -> Option<String> {
    let current = content.get(link.span.start..link.span.end)?;
    let expected_prefix = match link.kind {
        LinkKind::Wikilink => "[[",
        LinkKind::Embed => "![[",
        LinkKind::Markdown => "[",
    };
    if !current.starts_with(expected_prefix) {
        return None;
    }

    let mut out = String::with_capacity(content.len() + new_target.len());
    out.push_str(&content[..link.span.start]);
    out.push_str(&render_link(link, new_target));
    out.push_str(&content[link.span.end..]);
    Some(out)
}
