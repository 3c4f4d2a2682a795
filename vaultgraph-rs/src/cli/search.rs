//! Search commands: full text, tags, front matter, dates and paths.

use crate::cli::args::{DatesArgs, MetaArgs, PathsArgs, SearchArgs, TagsArgs};
use crate::cli::output::Output;
use crate::error::{exit_code, Result};
use crate::query::{CancellationToken, DateRange, QueryEngine, TagQueryOptions, TextSearchOptions};
use crate::types::NoteId;
use serde::Serialize;

/// Output for queries returning a set of notes.
#[derive(Debug, Serialize)]
pub struct NotesOutput {
    pub count: usize,
    pub notes: Vec<NoteId>,
}

impl From<Vec<NoteId>> for NotesOutput {
    fn from(notes: Vec<NoteId>) -> Self {
        Self {
            count: notes.len(),
            notes,
        }
    }
}

pub fn search(query: &QueryEngine, args: &SearchArgs, output: &Output) -> Result<i32> {
    let options = TextSearchOptions {
        regex: args.regex,
        case_sensitive: args.case_sensitive,
        scope: args.scope.clone(),
    };
    let mut results = query.full_text(&args.pattern, &options, &CancellationToken::new())?;
    if let Some(limit) = args.limit {
        results.truncate(limit);
    }
    output.print(&results)?;
    Ok(exit_code::SUCCESS)
}

pub fn tags(query: &QueryEngine, args: &TagsArgs, output: &Output) -> Result<i32> {
    match &args.expr {
        Some(expr) => {
            let options = TagQueryOptions {
                hierarchical: args.hierarchical,
            };
            output.print(&NotesOutput::from(query.tags(expr, &options)?))?;
        }
        None => output.print(&query.tag_counts())?,
    }
    Ok(exit_code::SUCCESS)
}

pub fn meta(query: &QueryEngine, args: &MetaArgs, output: &Output) -> Result<i32> {
    output.print(&query.metadata(&args.expr)?)?;
    Ok(exit_code::SUCCESS)
}

pub fn dates(query: &QueryEngine, args: &DatesArgs, output: &Output) -> Result<i32> {
    let range = DateRange::days(args.from, args.to);
    output.print(&NotesOutput::from(query.date_range(&args.field, &range)))?;
    Ok(exit_code::SUCCESS)
}

pub fn paths(query: &QueryEngine, args: &PathsArgs, output: &Output) -> Result<i32> {
    let notes = match (&args.folder, &args.glob) {
        (_, Some(pattern)) => query.glob(pattern)?,
        (Some(folder), None) => query.folder(folder),
        (None, None) => query.folder(""),
    };
    output.print(&NotesOutput::from(notes))?;
    Ok(exit_code::SUCCESS)
}
