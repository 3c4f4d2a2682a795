//! Parsers for Obsidian-flavored markdown.
//!
//! [`NoteParser::parse`] is a pure function of the file bytes, the path and
//! the file metadata, so any number of files can be parsed concurrently.

pub mod code_block;
pub mod encoding;
pub mod frontmatter;
pub mod heading;
pub mod links;
pub mod tag;

pub use code_block::CodeSpans;
pub use frontmatter::{split_frontmatter, FrontMatter, FrontmatterSplit};
pub use heading::{parse_headings, slugify};
pub use links::{is_media_target, parse_links, rewrite_link_target};
pub use tag::TagParser;

use crate::config::{CaseRule, IndexConfig};
use crate::error::ParseError;
use crate::note::{content_hash, file_stem, FileMeta, Note};
use crate::types::NoteId;
use std::collections::BTreeSet;
use std::path::Path;

/// Front matter keys holding tags.
const TAG_KEYS: &[&str] = &["tags", "tag"];
/// Front matter keys holding aliases.
const ALIAS_KEYS: &[&str] = &["aliases", "alias"];

/// Parse one file with a throwaway [`NoteParser`] for `config`.
pub fn parse_note(bytes: &[u8], path: &Path, meta: FileMeta, config: &IndexConfig) -> Result<Note, ParseError> {
    NoteParser::new(config).parse(bytes, path, meta)
}

/// Turns raw file bytes into [`Note`]s for one configuration.
#[derive(Debug, Clone)]
pub struct NoteParser {
    tags: TagParser,
    case_rule: CaseRule,
    max_file_size: u64,
}

impl NoteParser {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            tags: TagParser::new(config.tag_separator, config.case_sensitive_tags),
            case_rule: config.case_rule,
            max_file_size: config.max_file_size,
        }
    }

    pub fn tag_parser(&self) -> &TagParser {
        &self.tags
    }

    /// Parse one file. `path` is relative to the vault root.
    pub fn parse(&self, bytes: &[u8], path: &Path, meta: FileMeta) -> Result<Note, ParseError> {
        let size = bytes.len() as u64;
        if size > self.max_file_size {
            return Err(ParseError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }

        let decoded = encoding::decode(bytes)?;
        let content = decoded.text.as_str();

        let (front_matter, body_offset, body_line) = match split_frontmatter(content) {
            Some(split) => (FrontMatter::parse(&split)?, split.body_offset, split.body_line),
            None => (FrontMatter::empty(), 0, 1),
        };

        let code = CodeSpans::find(content);
        let parsed_links = parse_links(content, body_offset, &code);
        let headings = parse_headings(content, body_offset, body_line, &code);

        let mut tags = BTreeSet::new();
        for key in TAG_KEYS {
            if let Some(value) = front_matter.get_ignore_case(key) {
                tags.extend(self.tags.canonicalize_items(&value.string_items()));
            }
        }
        for tag in self
            .tags
            .find_inline(content, body_offset, &code, &parsed_links.covered)
        {
            if let Some(name) = self.tags.canonicalize(&tag.raw) {
                tags.insert(name);
            }
        }

        let mut aliases: Vec<String> = Vec::new();
        for key in ALIAS_KEYS {
            if let Some(value) = front_matter.get_ignore_case(key) {
                for alias in value.string_items() {
                    if !aliases.contains(&alias) {
                        aliases.push(alias);
                    }
                }
            }
        }

        let title = front_matter
            .get_ignore_case("title")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(path));

        Ok(Note {
            id: NoteId::from_path(path, self.case_rule),
            path: path.to_path_buf(),
            title,
            body: content[body_offset..].to_string(),
            front_matter,
            body_offset,
            body_line,
            tags,
            aliases,
            headings,
            links: parsed_links.links,
            created: meta.created,
            modified: meta.modified,
            content_hash: content_hash(bytes),
            size_bytes: size,
            encoding: decoded.encoding,
        })
    }
}

impl Default for NoteParser {
    fn default() -> Self {
        Self::new(&IndexConfig::default())
    }
}
