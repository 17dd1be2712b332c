use crate::{now, sql_params, DeckSection, Result, SnapshotReason, DB};

#[derive(Debug, Clone, Default)]
pub struct DeckUpsert<'a> {
    pub arena_deck_id: &'a str,
    pub name: Option<&'a str>,
    pub format: Option<&'a str>,
    pub event_name: Option<&'a str>,
    pub deck_tile_id: Option<i64>,
}

/// Upsert a deck by its client-assigned id, returning the row id. Metadata
/// uses non-null coalescing: a re-submission that omits a field keeps the
/// previously recorded value.
pub fn upsert_deck(c: &DB, upsert: &DeckUpsert) -> Result<i64> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO decks
            (arena_deck_id, name, format, event_name, deck_tile_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (arena_deck_id) DO UPDATE SET
            name = COALESCE(excluded.name, name),
            format = COALESCE(excluded.format, format),
            event_name = COALESCE(excluded.event_name, event_name),
            deck_tile_id = COALESCE(excluded.deck_tile_id, deck_tile_id),
            updated_at = excluded.updated_at
         RETURNING id",
    )?;
    let id = stmt.query_row(
        sql_params![
            upsert.arena_deck_id,
            upsert.name,
            upsert.format,
            upsert.event_name,
            upsert.deck_tile_id,
            now(),
            now(),
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Replace the card list of a deck wholesale. A re-submitted deck never
/// retains stale lines from its previous submission.
pub fn replace_deck_cards(
    c: &DB,
    deck_id: i64,
    cards: &[(DeckSection, i64, i64)],
) -> Result<()> {
    c.prepare_cached("DELETE FROM deck_cards WHERE deck_id = ?")?
        .execute(sql_params![deck_id])?;

    let mut insert = c.prepare_cached(
        "INSERT INTO deck_cards (deck_id, section, card_id, quantity)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (deck_id, section, card_id) DO UPDATE SET
            quantity = quantity + excluded.quantity",
    )?;
    for (section, card_id, quantity) in cards {
        insert.execute(sql_params![deck_id, section.as_str(), card_id, quantity])?;
    }
    Ok(())
}

/// The most recently touched deck submitted for an event, if any.
pub fn latest_deck_for_event(c: &DB, event_name: &str) -> Result<Option<i64>> {
    let mut stmt = c.prepare_cached(
        "SELECT id FROM decks
         WHERE event_name = ? COLLATE NOCASE
         ORDER BY updated_at DESC, id DESC
         LIMIT 1",
    )?;
    let id = stmt
        .query_row(sql_params![event_name], |row| row.get(0))
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            err => Err(err),
        })?;
    Ok(id)
}

/// Link a match to a deck snapshot. Links are additive; the first link per
/// snapshot reason wins, and a (match, deck) pair is never duplicated.
pub fn link_match_to_deck(
    c: &DB,
    arena_match_id: &str,
    deck_id: i64,
    reason: SnapshotReason,
) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO match_decks (match_id, deck_id, snapshot_reason, created_at)
         SELECT m.id, ?, ?, ?
           FROM matches m
          WHERE m.arena_match_id = ?
            AND NOT EXISTS (
                SELECT 1 FROM match_decks md
                 WHERE md.match_id = m.id AND md.snapshot_reason = ?)
         ON CONFLICT (match_id, deck_id) DO NOTHING",
    )?;
    stmt.execute(sql_params![
        deck_id,
        reason.as_str(),
        now(),
        arena_match_id,
        reason.as_str(),
    ])?;
    Ok(())
}
