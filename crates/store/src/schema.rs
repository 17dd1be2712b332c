use crate::{Result, DB};

const SCHEMA: &str = include_str!("schema.sql");

/// Apply the idempotent schema, then run structural migrations that
/// CREATE TABLE IF NOT EXISTS cannot express. Everything happens inside a
/// single transaction: a database is either fully migrated or untouched.
pub fn init(c: &DB) -> Result<()> {
    c.execute_batch("BEGIN;")?;
    match try_init(c) {
        Ok(()) => {
            c.execute_batch("COMMIT;")?;
            Ok(())
        }
        Err(err) => {
            let _ = c.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}

fn try_init(c: &DB) -> Result<()> {
    c.execute_batch(SCHEMA)?;

    // Databases written before per-game tracking keyed plays and opponent
    // instances by (match, instance) alone. Rebuild those tables with the
    // game_number column and the extended primary key, backfilling game 1.
    if !table_has_column(c, "match_card_plays", "game_number")? {
        rebuild_with_game_number(
            c,
            "match_card_plays",
            "match_id, instance_id, grp_id, owner_seat, turn_number, phase, \
             first_public_zone, played_at, source",
        )?;
    }
    if !table_has_column(c, "match_opponent_card_instances", "game_number")? {
        rebuild_with_game_number(
            c,
            "match_opponent_card_instances",
            "match_id, instance_id, grp_id, first_seen_at, source",
        )?;
    }
    Ok(())
}

fn table_has_column(c: &DB, table: &str, column: &str) -> Result<bool> {
    let mut stmt = c.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn rebuild_with_game_number(c: &DB, table: &str, columns: &str) -> Result<()> {
    tracing::info!(table, "migrating table to carry game_number");

    c.execute_batch(&format!("ALTER TABLE {t} RENAME TO {t}_old;", t = table))?;
    // Re-applying the schema recreates the table under its original name.
    // Its indexes are still attached to the renamed table at this point.
    c.execute_batch(SCHEMA)?;
    c.execute_batch(&format!(
        "INSERT INTO {t} ({cols}, game_number) SELECT {cols}, 1 FROM {t}_old;",
        t = table,
        cols = columns,
    ))?;
    // Dropping the old table takes the stale indexes with it; the final
    // schema pass restores them against the rebuilt table.
    c.execute_batch(&format!("DROP TABLE {t}_old;", t = table))?;
    c.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sql_params;

    #[test]
    fn test_game_number_migration_backfills_game_one() {
        let c = DB::open_in_memory().unwrap();

        // A legacy database: plays keyed by (match, instance) only.
        c.execute_batch(
            "CREATE TABLE match_card_plays (
                match_id          INTEGER NOT NULL,
                instance_id       INTEGER NOT NULL,
                grp_id            INTEGER NOT NULL,
                owner_seat        INTEGER NOT NULL,
                turn_number       INTEGER,
                phase             TEXT,
                first_public_zone TEXT NOT NULL,
                played_at         TEXT NOT NULL,
                source            TEXT NOT NULL,
                PRIMARY KEY (match_id, instance_id)
            );
            CREATE INDEX idx_match_card_plays_grp
                ON match_card_plays (match_id, grp_id);",
        )
        .unwrap();
        c.execute(
            "INSERT INTO match_card_plays VALUES
                (1, 101, 5001, 1, 3, 'main1', 'stack', '2025-06-19T10:00:00Z', 'gre')",
            [],
        )
        .unwrap();

        init(&c).unwrap();

        let (game, instance): (i64, i64) = c
            .query_row(
                "SELECT game_number, instance_id FROM match_card_plays",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((game, instance), (1, 101));

        // The extended key now admits the same instance in a later game.
        c.execute(
            "INSERT INTO match_card_plays
                (match_id, game_number, instance_id, grp_id, owner_seat, first_public_zone, played_at, source)
             VALUES (1, 2, 101, 5001, 1, 'battlefield', ?, 'gre')",
            sql_params![crate::now()],
        )
        .unwrap();

        // And a second init is a no-op.
        init(&c).unwrap();
        let count: i64 = c
            .query_row("SELECT COUNT(*) FROM match_card_plays", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_migration_rebuilds_opponent_instances() {
        let c = DB::open_in_memory().unwrap();
        c.execute_batch(
            "CREATE TABLE match_opponent_card_instances (
                match_id      INTEGER NOT NULL,
                instance_id   INTEGER NOT NULL,
                grp_id        INTEGER NOT NULL,
                first_seen_at TEXT NOT NULL,
                source        TEXT NOT NULL,
                PRIMARY KEY (match_id, instance_id)
            );",
        )
        .unwrap();
        c.execute(
            "INSERT INTO match_opponent_card_instances VALUES
                (7, 300, 9001, '2025-06-19T10:00:00Z', 'gre')",
            [],
        )
        .unwrap();

        init(&c).unwrap();

        let game: i64 = c
            .query_row(
                "SELECT game_number FROM match_opponent_card_instances WHERE instance_id = 300",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(game, 1);
    }
}
