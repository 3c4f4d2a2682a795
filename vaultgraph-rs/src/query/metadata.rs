//! JSONPath-like queries over front matter.
//!
//! ```text
//! expr       = path (op literal)?
//! path       = "$" step* | KEY step*
//! step       = "." KEY | ".*" | ".." KEY | "[" (INT | "*" | QUOTED) "]"
//! op         = "==" | "!=" | "<" | "<=" | ">" | ">=" | "=~"
//! literal    = QUOTED | NUMBER | "true" | "false" | "null" | DATE | WORD
//! ```
//!
//! A path selects values; an optional comparison keeps the selected values
//! that satisfy it. `=~` takes a regex and matches the value's text form.

use crate::error::QueryError;
use crate::note::Note;
use crate::value::{parse_date, parse_datetime, FieldValue};
use regex::Regex;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Key(String),
    /// Sequence index; negative counts from the end.
    Index(i64),
    Wildcard,
    /// `..key`: `key` at any depth.
    Recursive(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Compare(CompareOp, FieldValue),
    Matches(Regex),
}

/// A compiled metadata expression.
#[derive(Debug, Clone)]
pub struct MetadataQuery {
    pub steps: Vec<Step>,
    pub predicate: Option<Predicate>,
}

impl MetadataQuery {
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        Scanner::new(input).parse()
    }

    /// Values of `note` this expression selects, in document order.
    pub fn select(&self, note: &Note) -> Vec<FieldValue> {
        let mut nodes = vec![Node::Root(note.front_matter.fields())];
        for step in &self.steps {
            nodes = apply_step(&nodes, step);
            if nodes.is_empty() {
                return Vec::new();
            }
        }

        nodes
            .into_iter()
            .map(|node| match node {
                Node::Root(fields) => FieldValue::Mapping(fields.to_vec()),
                Node::Value(v) => v.clone(),
            })
            .filter(|v| self.keeps(v))
            .collect()
    }

    fn keeps(&self, value: &FieldValue) -> bool {
        match &self.predicate {
            None => true,
            Some(Predicate::Matches(re)) => match value {
                FieldValue::Sequence(_) | FieldValue::Mapping(_) | FieldValue::Null => false,
                scalar => re.is_match(&scalar.to_string()),
            },
            Some(Predicate::Compare(op, literal)) => match (op, value.compare(literal)) {
                (CompareOp::Eq, _) => value.loose_eq(literal),
                (CompareOp::Ne, _) => !value.loose_eq(literal),
                (_, None) => false,
                (CompareOp::Lt, Some(ordering)) => ordering == Ordering::Less,
                (CompareOp::Le, Some(ordering)) => ordering != Ordering::Greater,
                (CompareOp::Gt, Some(ordering)) => ordering == Ordering::Greater,
                (CompareOp::Ge, Some(ordering)) => ordering != Ordering::Less,
            },
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Node<'v> {
    /// The whole front matter.
    Root(&'v [(String, FieldValue)]),
    Value(&'v FieldValue),
}

impl<'v> Node<'v> {
    fn entries(self) -> Option<&'v [(String, FieldValue)]> {
        match self {
            Node::Root(fields) => Some(fields),
            Node::Value(FieldValue::Mapping(entries)) => Some(entries.as_slice()),
            Node::Value(_) => None,
        }
    }

    fn items(self) -> Option<&'v [FieldValue]> {
        match self {
            Node::Value(FieldValue::Sequence(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    fn children(self) -> Vec<&'v FieldValue> {
        match (self.entries(), self.items()) {
            (Some(entries), _) => entries.iter().map(|(_, v)| v).collect(),
            (_, Some(items)) => items.iter().collect(),
            _ => Vec::new(),
        }
    }
}

fn apply_step<'v>(nodes: &[Node<'v>], step: &Step) -> Vec<Node<'v>> {
    let mut out = Vec::new();
    for &node in nodes {
        match step {
            Step::Key(key) => {
                if let Some(entries) = node.entries() {
                    out.extend(entries.iter().filter(|(k, _)| k == key).map(|(_, v)| Node::Value(v)));
                }
            }
            Step::Index(i) => {
                if let Some(items) = node.items() {
                    let idx = if *i < 0 { items.len() as i64 + i } else { *i };
                    if let Some(v) = usize::try_from(idx).ok().and_then(|idx| items.get(idx)) {
                        out.push(Node::Value(v));
                    }
                }
            }
            Step::Wildcard => out.extend(node.children().into_iter().map(Node::Value)),
            Step::Recursive(key) => collect_recursive(node, key, &mut out),
        }
    }
    out
}

fn collect_recursive<'v>(node: Node<'v>, key: &str, out: &mut Vec<Node<'v>>) {
    if let Some(entries) = node.entries() {
        out.extend(entries.iter().filter(|(k, _)| k == key).map(|(_, v)| Node::Value(v)));
    }
    for child in node.children() {
        collect_recursive(Node::Value(child), key, out);
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn error_at(&self, pos: usize, message: &str) -> QueryError {
        QueryError::expression(self.input, &self.input[pos..], message)
    }

    fn parse(mut self) -> Result<MetadataQuery, QueryError> {
        self.skip_ws();
        if self.rest().is_empty() {
            return Err(self.error_at(0, "empty expression"));
        }

        let mut steps = Vec::new();
        if !self.eat("$") {
            let start = self.pos;
            let key = self.key();
            if key.is_empty() {
                return Err(self.error_at(start, "expected '$' or a field name"));
            }
            steps.push(Step::Key(key));
        }

        loop {
            match self.peek() {
                Some('.') | Some('[') => steps.push(self.step()?),
                _ => break,
            }
        }

        self.skip_ws();
        let predicate = if self.rest().is_empty() {
            None
        } else {
            Some(self.predicate()?)
        };

        Ok(MetadataQuery { steps, predicate })
    }

    fn key(&mut self) -> String {
        let len = self
            .rest()
            .find(|c: char| c.is_whitespace() || matches!(c, '.' | '[' | ']' | '=' | '!' | '<' | '>' | '~'))
            .unwrap_or(self.rest().len());
        let key = self.rest()[..len].to_string();
        self.pos += len;
        key
    }

    fn step(&mut self) -> Result<Step, QueryError> {
        let start = self.pos;
        if self.eat("..") {
            let key = self.key();
            if key.is_empty() {
                return Err(self.error_at(start, "expected a field name after '..'"));
            }
            return Ok(Step::Recursive(key));
        }
        if self.eat(".") {
            if self.eat("*") {
                return Ok(Step::Wildcard);
            }
            let key = self.key();
            if key.is_empty() {
                return Err(self.error_at(start, "expected a field name after '.'"));
            }
            return Ok(Step::Key(key));
        }

        // bracket step
        self.eat("[");
        self.skip_ws();
        let step = if self.eat("*") {
            Step::Wildcard
        } else if matches!(self.peek(), Some('\'' | '"')) {
            Step::Key(self.quoted(start)?)
        } else {
            let len = self
                .rest()
                .find(|c: char| !(c.is_ascii_digit() || c == '-'))
                .unwrap_or(self.rest().len());
            let digits = &self.rest()[..len];
            let index = digits
                .parse::<i64>()
                .map_err(|_| self.error_at(start, "expected an index, '*' or a quoted key"))?;
            self.pos += len;
            Step::Index(index)
        };
        self.skip_ws();
        if !self.eat("]") {
            return Err(self.error_at(start, "unclosed bracket"));
        }
        Ok(step)
    }

    /// A single or double quoted string; `\` escapes the next character.
    fn quoted(&mut self, start: usize) -> Result<String, QueryError> {
        let Some(quote) = self.peek() else {
            return Err(self.error_at(start, "expected a quoted string"));
        };
        self.pos += quote.len_utf8();

        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                }
                c if c == quote => {
                    self.pos += i + c.len_utf8();
                    return Ok(out);
                }
                c => out.push(c),
            }
        }
        Err(self.error_at(start, "unterminated string"))
    }

    fn predicate(&mut self) -> Result<Predicate, QueryError> {
        let start = self.pos;
        let ops = [
            ("==", Some(CompareOp::Eq)),
            ("!=", Some(CompareOp::Ne)),
            ("<=", Some(CompareOp::Le)),
            (">=", Some(CompareOp::Ge)),
            ("=~", None),
            ("<", Some(CompareOp::Lt)),
            (">", Some(CompareOp::Gt)),
        ];
        let Some((_, op)) = ops.iter().find(|(sym, _)| self.eat(sym)) else {
            return Err(self.error_at(start, "expected a comparison operator"));
        };

        self.skip_ws();
        let literal_start = self.pos;
        if self.rest().is_empty() {
            return Err(self.error_at(start, "missing value after operator"));
        }

        let (text, quoted) = if matches!(self.peek(), Some('\'' | '"')) {
            (self.quoted(literal_start)?, true)
        } else {
            let text = self.rest().trim_end().to_string();
            self.pos = self.input.len();
            (text, false)
        };
        self.skip_ws();
        if !self.rest().is_empty() {
            return Err(self.error_at(self.pos, "unexpected text after value"));
        }

        match op {
            None => Regex::new(&text)
                .map(Predicate::Matches)
                .map_err(|e| QueryError::InvalidRegex {
                    pattern: text.clone(),
                    message: e.to_string(),
                }),
            Some(op) => Ok(Predicate::Compare(*op, literal(&text, quoted))),
        }
    }
}

fn literal(text: &str, quoted: bool) -> FieldValue {
    if quoted {
        return FieldValue::String(text.to_string());
    }
    match text {
        "true" => return FieldValue::Bool(true),
        "false" => return FieldValue::Bool(false),
        "null" | "~" => return FieldValue::Null,
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return FieldValue::Integer(i);
    }
    if let Ok(x) = text.parse::<f64>() {
        return FieldValue::Float(x);
    }
    if let Some(date) = parse_date(text) {
        return FieldValue::Date(date);
    }
    if let Some(dt) = parse_datetime(text) {
        return FieldValue::DateTime(dt);
    }
    FieldValue::String(text.to_string())
}
