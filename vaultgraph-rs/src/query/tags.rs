//! Tokenizer, parser and evaluator for tag expressions.
//!
//! Grammar:
//! ```text
//! query      = or_expr
//! or_expr    = and_expr (("OR" | "|") and_expr)*
//! and_expr   = unary_expr (("AND" | "&")? unary_expr)*
//! unary_expr = ("NOT" | "-" | "!") unary_expr | atom
//! atom       = "(" query ")" | TAG
//! TAG        = "#"? name ("/*")?
//! ```
//!
//! `name/*` matches notes carrying a tag strictly below `name`.

use crate::error::QueryError;
use crate::index::IndexState;
use crate::parser::tag::TagParser;
use crate::types::NoteId;
use std::collections::BTreeSet;

/// Options for [`QueryEngine::tags`](crate::query::QueryEngine::tags).
#[derive(Debug, Clone, Copy, Default)]
pub struct TagQueryOptions {
    /// Bare tags also match their descendants (`proj` matches `proj/x`).
    pub hierarchical: bool,
}

/// Parsed tag expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagExpr {
    /// A canonical tag, optionally standing for its descendants only.
    Tag { name: String, descendants: bool },
    And(Vec<TagExpr>),
    Or(Vec<TagExpr>),
    Not(Box<TagExpr>),
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Tag text as written, `#` included if present.
    Word(String),
    OpenParen,
    CloseParen,
    And,
    Or,
    Not,
}

// ============================================================================
// Tokenizer
// ============================================================================

/// Tokens with the byte offset each starts at.
fn tokenize(input: &str) -> Vec<(Token, usize)> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        let single = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => Some(Token::OpenParen),
            ')' => Some(Token::CloseParen),
            '&' => Some(Token::And),
            '|' => Some(Token::Or),
            '!' | '-' => Some(Token::Not),
            _ => None,
        };
        if let Some(token) = single {
            chars.next();
            tokens.push((token, start));
            continue;
        }

        let mut word = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if !is_word_char(c) {
                break;
            }
            word.push(c);
            chars.next();
        }
        let token = match word.as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Word(word),
        };
        tokens.push((token, start));
    }

    tokens
}

fn is_word_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '(' | ')' | '&' | '|' | '!')
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
    tags: &'a TagParser,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, tags: &'a TagParser) -> Self {
        Self {
            input,
            tokens: tokenize(input),
            pos: 0,
            tags,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Error pointing at the token at `pos` (or the end of input).
    fn error(&self, pos: usize, message: &str) -> QueryError {
        let fragment = match self.tokens.get(pos) {
            Some((_, offset)) => &self.input[*offset..],
            None => "",
        };
        QueryError::expression(self.input, fragment, message)
    }

    fn parse_query(&mut self) -> Result<TagExpr, QueryError> {
        if self.tokens.is_empty() {
            return Err(self.error(0, "empty expression"));
        }
        let expr = self.parse_or_expr()?;
        if self.pos < self.tokens.len() {
            return Err(self.error(self.pos, "unexpected token"));
        }
        Ok(expr)
    }

    fn parse_or_expr(&mut self) -> Result<TagExpr, QueryError> {
        let mut children = vec![self.parse_and_expr()?];

        while self.peek() == Some(&Token::Or) {
            self.advance();
            children.push(self.parse_and_expr()?);
        }

        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            TagExpr::Or(children)
        })
    }

    fn parse_and_expr(&mut self) -> Result<TagExpr, QueryError> {
        let mut children = vec![self.parse_unary_expr()?];

        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                }
                // juxtaposition
                Some(Token::Word(_) | Token::Not | Token::OpenParen) => {}
                _ => break,
            }
            children.push(self.parse_unary_expr()?);
        }

        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            TagExpr::And(children)
        })
    }

    fn parse_unary_expr(&mut self) -> Result<TagExpr, QueryError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            return Ok(TagExpr::Not(Box::new(self.parse_unary_expr()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<TagExpr, QueryError> {
        let start = self.pos;
        match self.advance() {
            Some(Token::OpenParen) => {
                let expr = self.parse_or_expr()?;
                match self.advance() {
                    Some(Token::CloseParen) => Ok(expr),
                    _ => Err(self.error(start, "unclosed parenthesis")),
                }
            }
            Some(Token::Word(word)) => self.parse_tag(&word, start),
            Some(_) => Err(self.error(start, "expected a tag or '('")),
            None => Err(self.error(start, "unexpected end of expression")),
        }
    }

    fn parse_tag(&self, word: &str, pos: usize) -> Result<TagExpr, QueryError> {
        let body = word.strip_prefix('#').unwrap_or(word);
        let sep = self.tags.separator();
        let (body, descendants) = match body.strip_suffix('*') {
            Some(rest) if rest.ends_with(['/', sep]) => (rest, true),
            Some(_) => return Err(self.error(pos, "'*' is only allowed as '/*' after a tag")),
            None => (body, false),
        };
        if body.contains('*') {
            return Err(self.error(pos, "'*' is only allowed as '/*' after a tag"));
        }

        match self.tags.canonicalize(body) {
            Some(name) => Ok(TagExpr::Tag { name, descendants }),
            None => Err(self.error(pos, "empty tag")),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse a tag expression, canonicalizing tag names with `tags`.
pub fn parse_tag_expr(input: &str, tags: &TagParser) -> Result<TagExpr, QueryError> {
    Parser::new(input, tags).parse_query()
}

pub(crate) fn evaluate(
    state: &IndexState,
    expr: &TagExpr,
    options: &TagQueryOptions,
) -> BTreeSet<NoteId> {
    match expr {
        TagExpr::Tag { name, descendants: true } => state.tags().descendants(name),
        TagExpr::Tag { name, .. } if options.hierarchical => state.tags().hierarchical(name),
        TagExpr::Tag { name, .. } => state.tags().exact(name),
        TagExpr::And(children) => {
            let mut iter = children.iter();
            let Some(first) = iter.next() else {
                return BTreeSet::new();
            };
            let mut acc = evaluate(state, first, options);
            for child in iter {
                if acc.is_empty() {
                    break;
                }
                let next = evaluate(state, child, options);
                acc.retain(|id| next.contains(id));
            }
            acc
        }
        TagExpr::Or(children) => children
            .iter()
            .flat_map(|child| evaluate(state, child, options))
            .collect(),
        TagExpr::Not(child) => {
            let excluded = evaluate(state, child, options);
            state
                .iter()
                .map(|note| &note.id)
                .filter(|id| !excluded.contains(*id))
                .cloned()
                .collect()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tag(name: &str) -> TagExpr {
        TagExpr::Tag {
            name: name.to_string(),
            descendants: false,
        }
    }

    fn parse(input: &str) -> Result<TagExpr, QueryError> {
        parse_tag_expr(input, &TagParser::default())
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens: Vec<Token> = tokenize("a & (b|!c) OR NOT -d")
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Word("a".into()),
                Token::And,
                Token::OpenParen,
                Token::Word("b".into()),
                Token::Or,
                Token::Not,
                Token::Word("c".into()),
                Token::CloseParen,
                Token::Or,
                Token::Not,
                Token::Not,
                Token::Word("d".into()),
            ]
        );
    }

    #[test]
    fn test_tag_words_keep_inner_dashes() {
        assert_eq!(parse("#to-do").unwrap(), tag("to-do"));
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a b | c").unwrap();
        assert_eq!(
            expr,
            TagExpr::Or(vec![TagExpr::And(vec![tag("a"), tag("b")]), tag("c")])
        );

        let expr = parse("a AND (b OR c)").unwrap();
        assert_eq!(
            expr,
            TagExpr::And(vec![tag("a"), TagExpr::Or(vec![tag("b"), tag("c")])])
        );
    }

    #[test]
    fn test_not_binds_tightest() {
        let expr = parse("-a b").unwrap();
        assert_eq!(
            expr,
            TagExpr::And(vec![TagExpr::Not(Box::new(tag("a"))), tag("b")])
        );
    }

    #[test]
    fn test_descendant_pattern() {
        assert_eq!(
            parse("#Proj/*").unwrap(),
            TagExpr::Tag {
                name: "proj".into(),
                descendants: true
            }
        );
    }

    #[test]
    fn test_errors_carry_fragment() {
        match parse("a & (b | c").unwrap_err() {
            QueryError::InvalidExpression { fragment, .. } => assert_eq!(fragment, "(b | c"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(parse("").is_err());
        assert!(parse("a )").is_err());
        assert!(parse("pro*j").is_err());
        assert!(parse("a &").is_err());
    }
}
