//! Full-text search over note bodies.

use crate::error::QueryError;
use crate::index::IndexState;
use crate::note::Note;
use crate::query::cancel::CancellationToken;
use crate::query::folder_prefix;
use crate::query::records::{LineMatch, NoteTextMatches};
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// Options for [`QueryEngine::full_text`](crate::query::QueryEngine::full_text).
#[derive(Debug, Clone, Default)]
pub struct TextSearchOptions {
    /// Treat the pattern as a regular expression instead of literal text.
    pub regex: bool,
    pub case_sensitive: bool,
    /// Only search notes under this vault-relative folder.
    pub scope: Option<String>,
}

pub(crate) fn compile(pattern: &str, options: &TextSearchOptions) -> Result<Regex, QueryError> {
    let source = if options.regex {
        pattern.to_string()
    } else {
        regex::escape(pattern)
    };
    RegexBuilder::new(&source)
        .case_insensitive(!options.case_sensitive)
        .build()
        .map_err(|e| QueryError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

pub(crate) fn search(
    state: &IndexState,
    pattern: &str,
    options: &TextSearchOptions,
    cancel: &CancellationToken,
) -> Result<Vec<NoteTextMatches>, QueryError> {
    let re = compile(pattern, options)?;

    let candidates: Vec<&Arc<Note>> = match &options.scope {
        Some(scope) => {
            state
                .paths()
                .with_prefix(&folder_prefix(state, scope))
                .iter()
                .filter_map(|id| state.get(id))
                .collect()
        }
        None => state.iter().collect(),
    };

    let results: Vec<Option<NoteTextMatches>> = candidates
        .par_iter()
        .map(|note| {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            Ok(match_note(note, &re))
        })
        .collect::<Result<_, _>>()?;

    // candidates are in id order and par_iter().collect() keeps it
    Ok(results.into_iter().flatten().collect())
}

fn match_note(note: &Note, re: &Regex) -> Option<NoteTextMatches> {
    let mut matches = Vec::new();
    let mut line_start = 0;

    for (i, line) in note.body.split('\n').enumerate() {
        let text = line.strip_suffix('\r').unwrap_or(line);
        if let Some(m) = re.find(text) {
            matches.push(LineMatch {
                line: note.body_line + i,
                offset: note.body_offset + line_start + m.start(),
                column: m.start(),
                text: text.to_string(),
            });
        }
        line_start += line.len() + 1;
    }

    if matches.is_empty() {
        return None;
    }
    Some(NoteTextMatches {
        id: note.id.clone(),
        path: note.path_str(),
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern_is_escaped() {
        let re = compile("a.b", &TextSearchOptions::default()).unwrap();
        assert!(re.is_match("xa.by"));
        assert!(!re.is_match("axb"));
    }

    #[test]
    fn test_case_folding() {
        let insensitive = compile("Rust", &TextSearchOptions::default()).unwrap();
        assert!(insensitive.is_match("rust"));

        let sensitive = compile(
            "Rust",
            &TextSearchOptions {
                case_sensitive: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!sensitive.is_match("rust"));
    }

    #[test]
    fn test_invalid_regex() {
        let err = compile(
            "(unclosed",
            &TextSearchOptions {
                regex: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        match err {
            QueryError::InvalidRegex { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
