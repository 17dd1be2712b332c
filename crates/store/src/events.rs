use crate::{now, sql_params, MatchResult, Result, DB};

/// Fields learned from an `EventJoin`. Absent fields never clobber values
/// recorded by an earlier join for the same event.
#[derive(Debug, Clone, Default)]
pub struct EventRunUpsert<'a> {
    pub event_name: &'a str,
    pub entry_currency: Option<&'a str>,
    pub entry_paid: Option<i64>,
    pub started_at: Option<String>,
}

pub fn upsert_event_run(c: &DB, upsert: &EventRunUpsert) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO event_runs
            (event_name, event_type, entry_currency, entry_paid, status, started_at, updated_at)
         VALUES (?, ?, ?, ?, 'active', ?, ?)
         ON CONFLICT (event_name) DO UPDATE SET
            entry_currency = COALESCE(excluded.entry_currency, entry_currency),
            entry_paid = COALESCE(excluded.entry_paid, entry_paid),
            started_at = COALESCE(started_at, excluded.started_at),
            updated_at = excluded.updated_at",
    )?;
    stmt.execute(sql_params![
        upsert.event_name,
        derive_event_type(upsert.event_name),
        upsert.entry_currency,
        upsert.entry_paid,
        upsert.started_at.as_deref().unwrap_or(&now()),
        now(),
    ])?;
    Ok(())
}

/// Mark an event run claimed. The run is created on the spot if the join was
/// never observed (e.g. the log rotated between join and claim).
pub fn claim_event_run(c: &DB, event_name: &str, at: Option<String>) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO event_runs (event_name, event_type, status, ended_at, updated_at)
         VALUES (?, ?, 'claimed', ?, ?)
         ON CONFLICT (event_name) DO UPDATE SET
            status = 'claimed',
            ended_at = COALESCE(ended_at, excluded.ended_at),
            updated_at = excluded.updated_at",
    )?;
    let at = at.unwrap_or_else(now);
    stmt.execute(sql_params![event_name, derive_event_type(event_name), at, now()])?;
    Ok(())
}

/// Increment the win or loss counter of an event run. Counters only ever go
/// up; callers gate this on a result transition so a re-reported match end
/// cannot double-count.
pub fn bump_event_run_record(c: &DB, event_name: &str, result: MatchResult) -> Result<()> {
    let column = match result {
        MatchResult::Win => "wins",
        MatchResult::Loss => "losses",
        MatchResult::Unknown => return Ok(()),
    };
    c.execute(
        &format!(
            "UPDATE event_runs SET {col} = {col} + 1, updated_at = ? WHERE event_name = ?",
            col = column
        ),
        sql_params![now(), event_name],
    )?;
    Ok(())
}

/// Resolve an event-name alias against the known event runs.
///
/// Match starts sometimes report the compact `SET_Quick_Draft` form while the
/// join recorded the expanded, date-suffixed form. Resolution is
/// case-insensitive; the returned name is whatever form is stored.
pub fn resolve_event_alias(c: &DB, name: &str) -> Result<String> {
    let mut exact = c.prepare_cached(
        "SELECT event_name FROM event_runs WHERE event_name = ? COLLATE NOCASE LIMIT 1",
    )?;
    if let Some(stored) = exact
        .query_row(sql_params![name], |row| row.get::<_, String>(0))
        .map(Some)
        .or_else(no_rows_as_none)?
    {
        return Ok(stored);
    }

    let pattern = match compact_alias_pattern(name) {
        Some(pattern) => pattern,
        None => return Ok(name.to_string()),
    };

    let mut newest = c.prepare_cached(
        "SELECT event_name FROM event_runs
         WHERE LOWER(event_name) LIKE ?
         ORDER BY started_at DESC, updated_at DESC
         LIMIT 1",
    )?;
    let resolved = newest
        .query_row(sql_params![pattern], |row| row.get::<_, String>(0))
        .map(Some)
        .or_else(no_rows_as_none)?;

    Ok(resolved.unwrap_or_else(|| name.to_string()))
}

fn no_rows_as_none<T>(err: rusqlite::Error) -> std::result::Result<Option<T>, rusqlite::Error> {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        err => Err(err),
    }
}

/// `FIN_Quick_Draft` -> `quickdraft_fin_%`, matching the expanded
/// `QuickDraft_FIN_20250619` form by prefix.
fn compact_alias_pattern(name: &str) -> Option<String> {
    let (set_code, kind) = name.split_once('_')?;
    if set_code.is_empty() || !set_code.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return None;
    }
    let prefix = match kind {
        "Quick_Draft" => "quickdraft",
        "Premier_Draft" => "premierdraft",
        "Sealed" => "sealed",
        _ => return None,
    };
    Some(format!("{}_{}_%", prefix, set_code.to_lowercase()))
}

/// Coarse event classification derived from the event name.
pub fn derive_event_type(event_name: &str) -> &'static str {
    let name = event_name.to_lowercase();
    if name.starts_with("premierdraft") {
        "premier_draft"
    } else if name.starts_with("quickdraft") || name.starts_with("botdraft") {
        "quick_draft"
    } else if name.starts_with("traddraft") {
        "trad_draft"
    } else if name.starts_with("tradsealed") {
        "trad_sealed"
    } else if name.starts_with("sealed") {
        "sealed"
    } else if name.starts_with("constructed") || name.starts_with("play") || name.starts_with("ladder")
    {
        "constructed"
    } else {
        "other"
    }
}
