use crate::classify::{classify, LineClass};
use crate::correlate::LogMemory;
use crate::extract::{extract_outgoing, parse_gre_state, parse_room_state, Extraction};
use crate::reader::{LogLine, LogReader};
use crate::{Cancel, Error};
use std::path::Path;
use store::{
    clear_ingest_state, insert_raw_event, load_ingest_state, save_ingest_state, RawEvent, DB,
};

/// Work is committed in transactions of at most this many lines, together
/// with the ingest-state row covering them.
const LINES_PER_TRANSACTION: u64 = 500;

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Resume from the committed boundary. When false, the boundary and the
    /// per-log memory are discarded and the file re-parses from the top.
    pub resume: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { resume: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Complete lines consumed this pass, noise included.
    pub lines: u64,
    /// Lines classified into a stored shape.
    pub events: u64,
    pub start_offset: u64,
    pub end_offset: u64,
    /// The saved boundary exceeded the file length, so the file was
    /// re-consumed from the top.
    pub rotated: bool,
    pub cancelled: bool,
}

/// Run one full pass over |path|, applying everything the log proves into
/// storage. The committed boundary only ever advances together with the
/// writes it covers; an error mid-pass leaves the boundary at the last
/// successful commit and the re-run re-applies idempotent work.
pub fn parse_file(
    c: &DB,
    memory: &mut LogMemory,
    path: &Path,
    options: &ParseOptions,
    cancel: &Cancel,
) -> Result<ParseOutcome, Error> {
    let path = std::fs::canonicalize(path)?;
    let key = path.to_string_lossy().into_owned();

    if !options.resume {
        clear_ingest_state(c, &key)?;
        memory.reset();
    }

    let (mut offset, mut line_no) = match load_ingest_state(c, &key)? {
        Some(state) => (state.offset, state.line_no),
        None => (0, 0),
    };

    let file_len = std::fs::metadata(&path)?.len();
    let rotated = offset > file_len;
    if rotated {
        // The file is observably shorter than the committed boundary: it was
        // rotated or truncated. Everything derived from the old bytes is
        // stale for this path.
        tracing::warn!(path = %key, offset, file_len, "log rotated or truncated; restarting");
        offset = 0;
        line_no = 0;
        memory.reset();
    }

    let mut reader = LogReader::open(&path, offset, line_no)?;
    let mut outcome = ParseOutcome {
        start_offset: offset,
        end_offset: offset,
        rotated,
        ..Default::default()
    };

    c.execute_batch("BEGIN;").map_err(store::Error::from)?;
    let result = consume_lines(c, memory, &mut reader, &key, &mut outcome, cancel);
    match result {
        Ok(()) => {
            save_ingest_state(c, &key, outcome.end_offset, line_no + outcome.lines)?;
            c.execute_batch("COMMIT;").map_err(store::Error::from)?;
            Ok(outcome)
        }
        Err(err) => {
            let _ = c.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}

fn consume_lines(
    c: &DB,
    memory: &mut LogMemory,
    reader: &mut LogReader,
    key: &str,
    outcome: &mut ParseOutcome,
    cancel: &Cancel,
) -> Result<(), Error> {
    let mut in_transaction = 0u64;
    while let Some(line) = reader.next_line()? {
        outcome.lines += 1;
        outcome.end_offset = line.end_offset();

        memory.scan_identity(&line.text);
        apply_line(c, memory, key, &line, outcome)?;

        in_transaction += 1;
        if in_transaction >= LINES_PER_TRANSACTION {
            save_ingest_state(c, key, outcome.end_offset, line.line_no + 1)?;
            c.execute_batch("COMMIT; BEGIN;").map_err(store::Error::from)?;
            in_transaction = 0;
        }

        if cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }
    }
    Ok(())
}

fn apply_line(
    c: &DB,
    memory: &mut LogMemory,
    key: &str,
    line: &LogLine,
    outcome: &mut ParseOutcome,
) -> Result<(), Error> {
    fn raw<'a>(
        kind: &'a str,
        method: Option<&'a str>,
        request_id: Option<&'a str>,
        payload: Option<&'a str>,
        key: &'a str,
        line: &LogLine,
    ) -> RawEvent<'a> {
        RawEvent {
            kind,
            method,
            request_id,
            payload,
            log_path: key,
            line_no: line.line_no,
            offset: line.offset,
        }
    }

    match classify(&line.text) {
        LineClass::Outgoing { method, envelope } => {
            let decoded = extract_outgoing(method, envelope);
            let request_id = decoded.request_id.as_deref();
            match decoded.extraction {
                Extraction::Intents(intents) => {
                    insert_raw_event(c, &raw("outgoing", Some(method), request_id, Some(envelope), key, line))?;
                    for intent in intents {
                        memory.apply_intent(c, intent)?;
                    }
                }
                Extraction::UnknownMethod => {
                    insert_raw_event(c, &raw("outgoing", Some(method), request_id, Some(envelope), key, line))?;
                }
                Extraction::Unparsed => {
                    tracing::debug!(method, line_no = line.line_no, "undecodable outgoing envelope");
                    insert_raw_event(c, &raw("outgoing_unparsed", Some(method), request_id, None, key, line))?;
                }
            }
            outcome.events += 1;
        }
        LineClass::MethodComplete { method, request_id } => {
            insert_raw_event(c, &raw("method_complete", Some(method), Some(request_id), None, key, line))?;
            outcome.events += 1;
        }
        LineClass::RoomState => {
            insert_raw_event(c, &raw("room_state", None, None, Some(&line.text), key, line))?;
            if let Some(room) = parse_room_state(&line.text) {
                memory.apply_room(c, &room)?;
            } else {
                tracing::debug!(line_no = line.line_no, "undecodable room-state envelope");
            }
            outcome.events += 1;
        }
        LineClass::GreState => {
            insert_raw_event(c, &raw("gre_state", None, None, Some(&line.text), key, line))?;
            if let Some(gre) = parse_gre_state(&line.text) {
                memory.apply_gre(c, &gre)?;
            } else {
                tracing::debug!(line_no = line.line_no, "undecodable game-engine envelope");
            }
            outcome.events += 1;
        }
        LineClass::Noise => {}
    }
    Ok(())
}
