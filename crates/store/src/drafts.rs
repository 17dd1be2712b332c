use crate::{now, sql_params, Result, DB};

/// Find or create the draft session a pick belongs to.
///
/// Human drafts carry a stable draft id and key on `(draft_id, is_bot)`.
/// Machine-opponent drafts have no id; they reuse the most recent session for
/// the event that has not completed yet, creating one when none is open.
pub fn ensure_draft_session(
    c: &DB,
    draft_id: Option<&str>,
    event_name: Option<&str>,
    is_bot: bool,
    at: Option<String>,
) -> Result<i64> {
    let started_at = at.unwrap_or_else(now);

    if let Some(draft_id) = draft_id {
        let mut stmt = c.prepare_cached(
            "INSERT INTO draft_sessions (draft_id, event_name, is_bot_draft, started_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (draft_id, is_bot_draft) WHERE draft_id IS NOT NULL DO UPDATE SET
                event_name = COALESCE(excluded.event_name, event_name),
                updated_at = excluded.updated_at
             RETURNING id",
        )?;
        let id = stmt.query_row(
            sql_params![draft_id, event_name, is_bot, started_at, now()],
            |row| row.get(0),
        )?;
        return Ok(id);
    }

    let mut open = c.prepare_cached(
        "SELECT id FROM draft_sessions
         WHERE event_name = ? AND is_bot_draft = ? AND completed_at IS NULL
         ORDER BY id DESC
         LIMIT 1",
    )?;
    let existing = open
        .query_row(sql_params![event_name, is_bot], |row| row.get::<_, i64>(0))
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            err => Err(err),
        })?;
    if let Some(id) = existing {
        c.prepare_cached("UPDATE draft_sessions SET updated_at = ? WHERE id = ?")?
            .execute(sql_params![now(), id])?;
        return Ok(id);
    }

    let mut insert = c.prepare_cached(
        "INSERT INTO draft_sessions (event_name, is_bot_draft, started_at, updated_at)
         VALUES (?, ?, ?, ?)",
    )?;
    insert.execute(sql_params![event_name, is_bot, started_at, now()])?;
    Ok(c.last_insert_rowid())
}

#[derive(Debug, Clone)]
pub struct DraftPickUpsert<'a> {
    pub session_id: i64,
    pub pack_number: i64,
    pub pick_number: i64,
    pub picked_cards: &'a [i64],
    pub pack_cards: Option<&'a [i64]>,
}

/// Upsert one pick decision. Card-id lists are stored as canonical JSON
/// arrays; a replayed pick replaces the picked list and coalesces the pack
/// contents.
pub fn upsert_draft_pick(c: &DB, pick: &DraftPickUpsert) -> Result<()> {
    let picked = serde_json::to_string(pick.picked_cards)?;
    let pack = pick.pack_cards.map(serde_json::to_string).transpose()?;

    let mut stmt = c.prepare_cached(
        "INSERT INTO draft_picks
            (session_id, pack_number, pick_number, picked_cards, pack_cards, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (session_id, pack_number, pick_number) DO UPDATE SET
            picked_cards = excluded.picked_cards,
            pack_cards = COALESCE(excluded.pack_cards, pack_cards)",
    )?;
    stmt.execute(sql_params![
        pick.session_id,
        pick.pack_number,
        pick.pick_number,
        picked,
        pack,
        now(),
    ])?;
    Ok(())
}

/// Mark a draft session completed. Identified by draft id when present, else
/// the most recent open session for the event. `completed_at`, once set, is
/// never cleared or replaced.
pub fn complete_draft_session(
    c: &DB,
    draft_id: Option<&str>,
    event_name: Option<&str>,
    at: Option<String>,
) -> Result<()> {
    let at = at.unwrap_or_else(now);

    if let Some(draft_id) = draft_id {
        c.prepare_cached(
            "UPDATE draft_sessions SET
                completed_at = COALESCE(completed_at, ?),
                updated_at = ?
             WHERE draft_id = ?",
        )?
        .execute(sql_params![at, now(), draft_id])?;
        return Ok(());
    }

    if let Some(event_name) = event_name {
        c.prepare_cached(
            "UPDATE draft_sessions SET
                completed_at = COALESCE(completed_at, ?),
                updated_at = ?
             WHERE id = (
                SELECT id FROM draft_sessions
                 WHERE event_name = ? AND completed_at IS NULL
                 ORDER BY id DESC
                 LIMIT 1)",
        )?
        .execute(sql_params![at, now(), event_name])?;
    }
    Ok(())
}
