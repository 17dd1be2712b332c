mod cards;
mod decks;
mod drafts;
mod error;
mod events;
mod ingest_state;
mod matches;
mod plays;
pub mod queries;
mod raw_events;
mod schema;
mod types;

use std::path::Path;

pub use cards::{card_names, save_card_name};
pub use decks::{latest_deck_for_event, link_match_to_deck, replace_deck_cards, upsert_deck, DeckUpsert};
pub use drafts::{
    complete_draft_session, ensure_draft_session, upsert_draft_pick, DraftPickUpsert,
};
pub use error::Error;
pub use events::{
    bump_event_run_record, claim_event_run, resolve_event_alias, upsert_event_run, EventRunUpsert,
};
pub use ingest_state::{clear_ingest_state, load_ingest_state, save_ingest_state, IngestState};
pub use matches::{
    update_match_end, update_match_opponent, upsert_match_start, MatchEnd, MatchStart,
};
pub use plays::{insert_card_play, insert_opponent_card_instance, CardPlay, OpponentCardInstance};
pub use raw_events::{insert_raw_event, RawEvent};
pub use rusqlite::{params as sql_params, Connection as DB};
pub use types::{DeckSection, EventStatus, MatchResult, PublicZone, SnapshotReason};

pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current instant in the canonical textual form used by every
/// persisted timestamp: RFC 3339, UTC, seconds precision.
pub fn now() -> String {
    format_instant(chrono::Utc::now())
}

pub fn format_instant(t: chrono::DateTime<chrono::Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Open (creating if necessary) the tracker database at |path|, returning a
/// write connection with the schema applied and migrations run.
pub fn open(path: impl AsRef<Path>) -> Result<DB> {
    let c = DB::open(path)?;
    configure(&c)?;
    schema::init(&c)?;
    Ok(c)
}

/// Open an in-memory database. Used by tests and by enrichment probes.
pub fn open_memory() -> Result<DB> {
    let c = DB::open_in_memory()?;
    configure(&c)?;
    schema::init(&c)?;
    Ok(c)
}

/// Open an existing database for reading only. API handlers use one of these
/// per request; the single write connection belongs to the ingest pipeline.
pub fn open_read_only(path: impl AsRef<Path>) -> Result<DB> {
    let c = DB::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    c.pragma_update(None, "foreign_keys", "ON")?;
    c.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(c)
}

fn configure(c: &DB) -> Result<()> {
    // WAL lets API read connections proceed while an ingest transaction is
    // open. journal_mode returns a row, so it cannot go through execute().
    let _mode: String = c.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    c.pragma_update(None, "foreign_keys", "ON")?;
    c.pragma_update(None, "synchronous", "NORMAL")?;
    c.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Render the full contents of |tables| as a JSON object, mapping each table
/// name to an array of row-arrays in rowid order. Tests compare the result
/// against a `json!` fixture rather than asserting row-by-row.
pub fn dump_tables(db: &DB, tables: &[&str]) -> Result<serde_json::Value> {
    let mut out = serde_json::Map::new();

    for table in tables {
        let mut stmt = db.prepare(&format!("SELECT * FROM {}", table))?;
        let n_cols = stmt.column_count();

        let rows = stmt.query_map([], |row| {
            let mut values = Vec::with_capacity(n_cols);
            for i in 0..n_cols {
                use rusqlite::types::ValueRef;
                let v = match row.get_ref(i)? {
                    ValueRef::Null => serde_json::Value::Null,
                    ValueRef::Integer(i) => serde_json::Value::from(i),
                    ValueRef::Real(f) => serde_json::Value::from(f),
                    ValueRef::Text(t) => {
                        serde_json::Value::from(String::from_utf8_lossy(t).into_owned())
                    }
                    ValueRef::Blob(b) => serde_json::Value::from(
                        b.iter().map(|b| serde_json::Value::from(*b)).collect::<Vec<_>>(),
                    ),
                };
                values.push(v);
            }
            Ok(serde_json::Value::Array(values))
        })?;

        let rows: std::result::Result<Vec<_>, _> = rows.collect();
        out.insert(table.to_string(), serde_json::Value::Array(rows?));
    }
    Ok(serde_json::Value::Object(out))
}
