use crate::{now, sql_params, Result, DB};

/// One classified log line, kept verbatim for audit. Rows are append-only.
#[derive(Debug, Clone)]
pub struct RawEvent<'a> {
    pub kind: &'a str,
    pub method: Option<&'a str>,
    pub request_id: Option<&'a str>,
    pub payload: Option<&'a str>,
    pub log_path: &'a str,
    pub line_no: u64,
    pub offset: u64,
}

pub fn insert_raw_event(c: &DB, event: &RawEvent) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO raw_events (kind, method, request_id, payload, log_path, line_no, offset, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    stmt.execute(sql_params![
        event.kind,
        event.method,
        event.request_id,
        event.payload,
        event.log_path,
        event.line_no as i64,
        event.offset as i64,
        now(),
    ])?;
    Ok(())
}
