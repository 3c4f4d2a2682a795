//! Link-related CLI commands.

use crate::cli::args::{NoteArgs, OrphansArgs, SuggestArgs};
use crate::cli::output::Output;
use crate::cli::search::NotesOutput;
use crate::error::{exit_code, Result};
use crate::graph::Suggestion;
use crate::query::{OrphanOptions, QueryEngine};
use crate::types::{NoteId, ResolvedLink};
use serde::Serialize;

/// Output for the links command.
#[derive(Debug, Serialize)]
pub struct LinksOutput {
    pub note: NoteId,
    pub links: Vec<ResolvedLink>,
}

/// Output for the backlinks command.
#[derive(Debug, Serialize)]
pub struct BacklinksOutput {
    pub note: NoteId,
    pub backlinks: Vec<NoteId>,
}

/// Output for a single-link suggest command.
#[derive(Debug, Serialize)]
pub struct SuggestOutput {
    pub source: NoteId,
    pub target: String,
    pub suggestions: Vec<Suggestion>,
}

pub fn links(query: &QueryEngine, args: &NoteArgs, output: &Output) -> Result<i32> {
    let note = query.find(&args.note)?;
    output.print(&LinksOutput {
        links: query.forward_links(&note.id)?,
        note: note.id.clone(),
    })?;
    Ok(exit_code::SUCCESS)
}

pub fn backlinks(query: &QueryEngine, args: &NoteArgs, output: &Output) -> Result<i32> {
    let note = query.find(&args.note)?;
    output.print(&BacklinksOutput {
        backlinks: query.backward_links(&note.id)?,
        note: note.id.clone(),
    })?;
    Ok(exit_code::SUCCESS)
}

pub fn orphans(query: &QueryEngine, args: &OrphansArgs, output: &Output) -> Result<i32> {
    let mut options = OrphanOptions::from_config(&query.index().config());
    options.entry_point_tags.extend(args.exempt_tags.iter().cloned());
    output.print(&NotesOutput::from(query.orphans(&options)))?;
    Ok(exit_code::SUCCESS)
}

pub fn broken(query: &QueryEngine, output: &Output) -> Result<i32> {
    output.print(&query.broken_links())?;
    Ok(exit_code::SUCCESS)
}

pub fn suggest(query: &QueryEngine, args: &SuggestArgs, output: &Output) -> Result<i32> {
    match (&args.note, &args.target) {
        (Some(note), Some(target)) => {
            let source = query.find(note)?;
            output.print(&SuggestOutput {
                suggestions: query.suggest_targets(&source.id, target, args.limit)?,
                source: source.id.clone(),
                target: target.clone(),
            })?;
        }
        _ => output.print(&query.suggest_all(args.limit))?,
    }
    Ok(exit_code::SUCCESS)
}

pub fn export(query: &QueryEngine, output: &Output) -> Result<i32> {
    output.print(&query.export_edges())?;
    Ok(exit_code::SUCCESS)
}
