//! Build and watch commands.

use crate::cli::args::BuildArgs;
use crate::cli::output::Output;
use crate::error::{exit_code, Result};
use crate::query::CancellationToken;
use crate::scanner::{BuildReport, Indexer};
use crate::watch::{Applied, WatchSession};
use flume::{Receiver, RecvTimeoutError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How often the watch loop checks for Ctrl-C while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Output for the build command.
#[derive(Debug, Serialize)]
pub struct BuildOutput {
    pub vault: PathBuf,
    #[serde(flatten)]
    pub report: BuildReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

pub fn build(indexer: &Indexer, report: BuildReport, args: &BuildArgs, output: &Output) -> Result<i32> {
    let verified = if args.verify {
        Some(match indexer.index().verify() {
            Ok(()) => true,
            Err(e) => {
                output.error(&e.to_string());
                false
            }
        })
    } else {
        None
    };

    let code = if !report.failures.is_empty() {
        exit_code::BUILD_FAILURES
    } else if verified == Some(false) {
        exit_code::GENERAL_ERROR
    } else {
        exit_code::SUCCESS
    };

    output.print(&BuildOutput {
        vault: indexer.vault().root().to_path_buf(),
        report,
        verified,
    })?;
    Ok(code)
}

/// Watch the vault until Ctrl-C, printing one record per applied change.
pub fn watch(indexer: Indexer, output: &Output) -> Result<i32> {
    let indexer = Arc::new(indexer);
    let (sender, receiver) = flume::unbounded();
    let session = WatchSession::start(Arc::clone(&indexer), Some(sender))?;

    let interrupted = CancellationToken::new();
    let handler_token = interrupted.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    output.info(&format!(
        "Watching {} ({} notes)",
        session.root().display(),
        indexer.index().len()
    ));
    stream(&receiver, &interrupted, output)?;

    output.info("Shutting down...");
    session.stop()?;
    // changes applied while the session drained
    for applied in receiver.drain() {
        output.print_record(&applied)?;
    }
    Ok(exit_code::SUCCESS)
}

/// Print applied changes until `stop` is cancelled or every sender is gone.
fn stream(receiver: &Receiver<Applied>, stop: &CancellationToken, output: &Output) -> Result<()> {
    while !stop.is_cancelled() {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(applied) => output.print_record(&applied)?,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::OutputFormat;
    use crate::scanner::{ChangeEvent, ChangeOutcome};
    use std::time::Instant;

    fn quiet() -> Output {
        Output::new(OutputFormat::Json, true)
    }

    #[test]
    fn test_stream_stops_when_interrupted() {
        let (_sender, receiver) = flume::unbounded::<Applied>();
        let stop = CancellationToken::new();
        let handle = stop.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            handle.cancel();
        });

        let started = Instant::now();
        stream(&receiver, &stop, &quiet()).unwrap();
        canceller.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stream_ends_when_feed_closes() {
        let (sender, receiver) = flume::unbounded();
        sender
            .send(Applied {
                event: ChangeEvent::deleted("a.md"),
                outcome: ChangeOutcome::Skipped,
            })
            .unwrap();
        drop(sender);

        stream(&receiver, &CancellationToken::new(), &quiet()).unwrap();
        assert!(receiver.is_empty());
    }
}
