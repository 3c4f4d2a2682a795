//! YAML front matter parsing and editing.
//!
//! The original block text is kept alongside the parsed fields. Rendering an
//! unmodified [`FrontMatter`] reproduces the source bytes exactly, and
//! [`FrontMatter::set`] / [`FrontMatter::remove`] only rewrite the lines of
//! the key being changed.

use crate::error::ParseError;
use crate::value::FieldValue;
use regex::Regex;
use serde_yaml::Value;
use std::ops::Range;
use std::sync::LazyLock;

// A top-level `key:` line. Quoted keys are supported.
static TOP_LEVEL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:"([^"]*)"|'([^']*)'|([^\s:#'"-][^:]*?)|(-[^\s:][^:]*?))\s*:(?:\s|$)"#).unwrap()
});

/// Front matter extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontmatterSplit<'a> {
    /// The whole block, delimiters and trailing newline included.
    pub block: &'a str,
    /// The YAML text between the delimiters.
    pub yaml: &'a str,
    /// Everything after the block.
    pub body: &'a str,
    /// Byte offset of the body in the content.
    pub body_offset: usize,
    /// Line number the body starts on (1-indexed).
    pub body_line: usize,
}

/// Split content into front matter and body.
///
/// Front matter must open with `---` on the first line and close with a
/// `---` line. Returns `None` when there is no complete block.
pub fn split_frontmatter(content: &str) -> Option<FrontmatterSplit<'_>> {
    let yaml_start = if content.starts_with("---\n") {
        4
    } else if content.starts_with("---\r\n") {
        5
    } else {
        return None;
    };

    let mut offset = yaml_start;
    let mut lines_seen = 1;
    for line in content[yaml_start..].split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        lines_seen += 1;

        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some(FrontmatterSplit {
                block: &content[..offset],
                yaml: &content[yaml_start..line_start],
                body: &content[offset..],
                body_offset: offset,
                body_line: lines_seen + 1,
            });
        }
    }

    None
}

/// Parsed front matter with its original text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    /// Exact source block, empty when the note has none.
    block: String,
    /// Range of the YAML text inside `block`.
    yaml: Range<usize>,
    /// Top-level fields in document order.
    fields: Vec<(String, FieldValue)>,
}

impl FrontMatter {
    /// Front matter of a note that has none.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the block found by [`split_frontmatter`].
    pub fn parse(split: &FrontmatterSplit<'_>) -> Result<Self, ParseError> {
        let yaml_start = opening_len(split.block);
        let fields = parse_fields(split.yaml)?;
        Ok(Self {
            block: split.block.to_string(),
            yaml: yaml_start..yaml_start + split.yaml.len(),
            fields,
        })
    }

    /// Parse the front matter at the start of `content`, if any.
    pub fn from_content(content: &str) -> Result<Self, ParseError> {
        match split_frontmatter(content) {
            Some(split) => Self::parse(&split),
            None => Ok(Self::empty()),
        }
    }

    /// Whether the note has a front matter block at all.
    pub fn is_present(&self) -> bool {
        !self.block.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// The block text, byte-identical to the source unless edited.
    pub fn render(&self) -> &str {
        &self.block
    }

    /// The YAML text between the delimiters.
    pub fn yaml(&self) -> &str {
        &self.block[self.yaml.clone()]
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a top-level field ignoring ASCII case.
    pub fn get_ignore_case(&self, key: &str) -> Option<&FieldValue> {
        self.get(key).or_else(|| {
            self.fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// The whole front matter as one mapping value.
    pub fn as_value(&self) -> FieldValue {
        FieldValue::Mapping(self.fields.clone())
    }

    /// Return a copy with `key` set to `value`.
    ///
    /// Only the lines of `key` are rewritten; a missing key is appended. A
    /// note without front matter gets a new block.
    pub fn set(&self, key: &str, value: &FieldValue) -> Result<Self, ParseError> {
        let newline = self.newline();
        let rendered = render_field(key, value, newline)?;

        if !self.is_present() {
            let block = format!("---{nl}{}---{nl}", rendered, nl = newline);
            return Self::from_block(block);
        }

        let yaml = self.yaml();
        let new_yaml = match find_key_lines(yaml, key) {
            Some(range) => format!("{}{}{}", &yaml[..range.start], rendered, &yaml[range.end..]),
            None if yaml.is_empty() || yaml.ends_with('\n') => format!("{}{}", yaml, rendered),
            None => format!("{}{}{}", yaml, newline, rendered),
        };
        self.with_yaml(&new_yaml)
    }

    /// Return a copy without `key`.
    pub fn remove(&self, key: &str) -> Result<Self, ParseError> {
        let yaml = self.yaml();
        match find_key_lines(yaml, key) {
            Some(range) => {
                let new_yaml = format!("{}{}", &yaml[..range.start], &yaml[range.end..]);
                self.with_yaml(&new_yaml)
            }
            None => Ok(self.clone()),
        }
    }

    fn with_yaml(&self, yaml: &str) -> Result<Self, ParseError> {
        let block = format!(
            "{}{}{}",
            &self.block[..self.yaml.start],
            yaml,
            &self.block[self.yaml.end..]
        );
        Self::from_block(block)
    }

    fn from_block(block: String) -> Result<Self, ParseError> {
        let split = split_frontmatter(&block).ok_or_else(|| ParseError::FrontMatter {
            message: "edited block is no longer delimited".to_string(),
        })?;
        let parsed = Self::parse(&split)?;
        Ok(parsed)
    }

    fn newline(&self) -> &'static str {
        if self.block.starts_with("---\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }
}

/// Length of the opening `---` line including its line ending.
fn opening_len(block: &str) -> usize {
    if block.starts_with("---\r\n") { 5 } else { 4 }
}

fn parse_fields(yaml: &str) -> Result<Vec<(String, FieldValue)>, ParseError> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_yaml::from_str(yaml).map_err(|e| ParseError::FrontMatter {
        message: e.to_string(),
    })?;

    match FieldValue::from_yaml(&value) {
        FieldValue::Mapping(entries) => Ok(entries),
        FieldValue::Null => Ok(Vec::new()),
        other => Err(ParseError::FrontMatter {
            message: format!("expected a mapping, found {}", other.type_name()),
        }),
    }
}

/// Render `key: value` as YAML lines ending in `newline`.
fn render_field(key: &str, value: &FieldValue, newline: &str) -> Result<String, ParseError> {
    let mut mapping = serde_yaml::Mapping::new();
    mapping.insert(Value::String(key.to_string()), value.to_yaml());
    let text = serde_yaml::to_string(&Value::Mapping(mapping)).map_err(|e| {
        ParseError::FrontMatter {
            message: e.to_string(),
        }
    })?;
    let text = text.strip_prefix("---\n").unwrap_or(&text);
    Ok(if newline == "\n" {
        text.to_string()
    } else {
        text.replace('\n', newline)
    })
}

/// Byte range of the lines belonging to top-level `key` in `yaml`:
/// the key line plus its indented or list continuation lines.
fn find_key_lines(yaml: &str, key: &str) -> Option<Range<usize>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for line in yaml.split_inclusive('\n') {
        lines.push((offset, line));
        offset += line.len();
    }

    let start_idx = lines.iter().position(|(_, line)| top_level_key(line) == Some(key))?;

    let mut end_idx = start_idx + 1;
    let mut idx = start_idx + 1;
    while idx < lines.len() {
        let line = lines[idx].1;
        if is_continuation(line) {
            idx += 1;
            end_idx = idx;
        } else if line.trim().is_empty() {
            idx += 1;
        } else {
            break;
        }
    }

    let start = lines[start_idx].0;
    let end = lines.get(end_idx).map(|(o, _)| *o).unwrap_or(yaml.len());
    Some(start..end)
}

fn top_level_key(line: &str) -> Option<&str> {
    let cap = TOP_LEVEL_KEY.captures(line)?;
    (1..=4).find_map(|i| cap.get(i)).map(|m| m.as_str().trim())
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ')
        || line.starts_with('\t')
        || line.starts_with("- ")
        || line.trim_end_matches(['\r', '\n']) == "-"
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NOTE: &str = "---\n# comment kept\ntitle: \"Quoted Title\"\ntags:\n  - a\n  - b\ncount: 7\n---\nBody text\n";

    #[test]
    fn test_split() {
        let split = split_frontmatter(NOTE).unwrap();
        assert!(split.yaml.starts_with("# comment kept\n"));
        assert!(split.yaml.ends_with("count: 7\n"));
        assert_eq!(split.body, "Body text\n");
        assert_eq!(split.body_line, 9);
        assert_eq!(&NOTE[split.body_offset..], "Body text\n");
    }

    #[test]
    fn test_split_crlf_and_eof() {
        let content = "---\r\ntitle: x\r\n---\r\nbody";
        let split = split_frontmatter(content).unwrap();
        assert_eq!(split.yaml, "title: x\r\n");
        assert_eq!(split.body, "body");

        let content = "---\ntitle: x\n---";
        let split = split_frontmatter(content).unwrap();
        assert_eq!(split.body, "");
        assert_eq!(split.block, content);
    }

    #[test]
    fn test_no_frontmatter() {
        assert!(split_frontmatter("# Title\n").is_none());
        assert!(split_frontmatter("---\nunterminated: yes\n").is_none());
        assert!(split_frontmatter("----\n").is_none());
    }

    #[test]
    fn test_empty_block() {
        let fm = FrontMatter::from_content("---\n---\nbody").unwrap();
        assert!(fm.is_present());
        assert!(fm.is_empty());
        assert_eq!(fm.render(), "---\n---\n");
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let fm = FrontMatter::from_content(NOTE).unwrap();
        let split = split_frontmatter(NOTE).unwrap();
        assert_eq!(format!("{}{}", fm.render(), split.body), NOTE);
        assert_eq!(fm.get("count"), Some(&FieldValue::Integer(7)));
        assert_eq!(fm.get("title"), Some(&FieldValue::String("Quoted Title".into())));
    }

    #[test]
    fn test_set_existing_keeps_other_lines() {
        let fm = FrontMatter::from_content(NOTE).unwrap();
        let edited = fm.set("tags", &FieldValue::Sequence(vec![FieldValue::String("c".into())])).unwrap();

        assert_eq!(
            edited.render(),
            "---\n# comment kept\ntitle: \"Quoted Title\"\ntags:\n- c\ncount: 7\n---\n"
        );
        let keys: Vec<&str> = edited.keys().collect();
        assert_eq!(keys, vec!["title", "tags", "count"]);
    }

    #[test]
    fn test_set_new_key_appends() {
        let fm = FrontMatter::from_content("---\ntitle: x\n---\nbody").unwrap();
        let edited = fm.set("status", &FieldValue::String("done".into())).unwrap();
        assert_eq!(edited.render(), "---\ntitle: x\nstatus: done\n---\n");
    }

    #[test]
    fn test_set_without_block_creates_one() {
        let fm = FrontMatter::empty();
        let edited = fm.set("priority", &FieldValue::Integer(2)).unwrap();
        assert_eq!(edited.render(), "---\npriority: 2\n---\n");
        assert_eq!(edited.get("priority"), Some(&FieldValue::Integer(2)));
    }

    #[test]
    fn test_set_preserves_crlf() {
        let fm = FrontMatter::from_content("---\r\na: 1\r\nb: 2\r\n---\r\n").unwrap();
        let edited = fm.set("a", &FieldValue::Integer(5)).unwrap();
        assert_eq!(edited.render(), "---\r\na: 5\r\nb: 2\r\n---\r\n");
    }

    #[test]
    fn test_remove() {
        let fm = FrontMatter::from_content(NOTE).unwrap();
        let edited = fm.remove("tags").unwrap();
        assert_eq!(
            edited.render(),
            "---\n# comment kept\ntitle: \"Quoted Title\"\ncount: 7\n---\n"
        );
        assert_eq!(fm.remove("missing").unwrap(), fm);
    }

    #[test]
    fn test_malformed_yaml() {
        let err = FrontMatter::from_content("---\ntitle: [unclosed\n---\n").unwrap_err();
        assert!(matches!(err, ParseError::FrontMatter { .. }));
    }

    #[test]
    fn test_non_mapping_is_error() {
        let err = FrontMatter::from_content("---\n- a\n- b\n---\n").unwrap_err();
        assert!(err.to_string().contains("expected a mapping"));
    }

    #[test]
    fn test_quoted_key_lookup() {
        assert_eq!(top_level_key("\"my key\": 1\n"), Some("my key"));
        assert_eq!(top_level_key("plain: 1\n"), Some("plain"));
        assert_eq!(top_level_key("  nested: 1\n"), None);
        assert_eq!(top_level_key("- item\n"), None);
        assert_eq!(top_level_key("# comment: x\n"), None);
    }
}
