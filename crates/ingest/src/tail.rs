use crate::correlate::LogMemory;
use crate::pipeline::{parse_file, ParseOptions};
use crate::{Cancel, Error};
use std::path::Path;
use std::time::Duration;
use store::DB;

#[derive(Debug, Clone)]
pub struct TailOptions {
    pub interval: Duration,
    /// Log quiet ticks too, not just ticks that ingested something.
    pub verbose: bool,
}

impl Default for TailOptions {
    fn default() -> Self {
        TailOptions {
            interval: Duration::from_secs(2),
            verbose: false,
        }
    }
}

/// Poll |path| until cancelled, running a resume parse every tick. A failed
/// tick (the file may be mid-rotation, or not exist yet) is logged and
/// retried on the next tick; the committed boundary is untouched by failures.
pub fn tail(c: &DB, path: &Path, options: &TailOptions, cancel: &Cancel) -> Result<(), Error> {
    let mut memory = LogMemory::default();
    let parse_options = ParseOptions { resume: true };

    tracing::info!(path = %path.display(), interval = ?options.interval, "tailing log");
    while !cancel.is_cancelled() {
        match parse_file(c, &mut memory, path, &parse_options, cancel) {
            Ok(outcome) if outcome.lines > 0 => {
                tracing::info!(
                    lines = outcome.lines,
                    events = outcome.events,
                    offset = outcome.end_offset,
                    rotated = outcome.rotated,
                    "ingested log activity"
                );
            }
            Ok(outcome) => {
                if options.verbose {
                    tracing::info!(offset = outcome.end_offset, "no new log activity");
                }
            }
            Err(err) => {
                tracing::warn!(error = ?err, "parse pass failed; retrying next tick");
            }
        }
        cancel.sleep(options.interval);
    }
    Ok(())
}
