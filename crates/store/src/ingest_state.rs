use crate::{now, sql_params, Result, DB};

/// Committed resume boundary for one log path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestState {
    pub log_path: String,
    pub offset: u64,
    pub line_no: u64,
    pub updated_at: String,
}

pub fn load_ingest_state(c: &DB, log_path: &str) -> Result<Option<IngestState>> {
    let mut stmt = c.prepare_cached(
        "SELECT offset, line_no, updated_at FROM ingest_state WHERE log_path = ?",
    )?;
    let state = stmt
        .query_row(sql_params![log_path], |row| {
            Ok(IngestState {
                log_path: log_path.to_string(),
                offset: row.get::<_, i64>(0)? as u64,
                line_no: row.get::<_, i64>(1)? as u64,
                updated_at: row.get(2)?,
            })
        })
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            err => Err(err),
        })?;
    Ok(state)
}

/// Persist the committed boundary. Callers invoke this inside the same
/// transaction as the writes the boundary covers.
pub fn save_ingest_state(c: &DB, log_path: &str, offset: u64, line_no: u64) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO ingest_state (log_path, offset, line_no, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (log_path) DO UPDATE SET
            offset = excluded.offset,
            line_no = excluded.line_no,
            updated_at = excluded.updated_at",
    )?;
    stmt.execute(sql_params![log_path, offset as i64, line_no as i64, now()])?;
    Ok(())
}

/// Forget the boundary for a path, e.g. when resume is disabled.
pub fn clear_ingest_state(c: &DB, log_path: &str) -> Result<()> {
    c.prepare_cached("DELETE FROM ingest_state WHERE log_path = ?")?
        .execute(sql_params![log_path])?;
    Ok(())
}
