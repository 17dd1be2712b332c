//! Probe of the game client's raw card database: a SQLite file shipped with
//! the install, holding card definitions and localized titles.

use std::path::PathBuf;

/// Environment override for the raw card database path.
pub const RAW_CARD_DB_ENV: &str = "MTGA_RAW_CARD_DB";

/// Locate the raw card database: the env override when set, else the newest
/// `Raw_CardDatabase_*.mtga` under the platform install locations.
pub fn locate_raw_card_db() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(RAW_CARD_DB_ENV) {
        let path = PathBuf::from(path);
        return path.is_file().then_some(path);
    }

    let mut patterns = vec![
        r"C:\Program Files\Wizards of the Coast\MTGA\MTGA_Data\Downloads\Raw\Raw_CardDatabase_*.mtga".to_string(),
    ];
    if let Some(home) = dirs::home_dir() {
        patterns.push(
            home.join("Library/Application Support/com.wizards.mtga/Downloads/Raw/Raw_CardDatabase_*.mtga")
                .to_string_lossy()
                .into_owned(),
        );
    }

    let mut candidates: Vec<PathBuf> = patterns
        .iter()
        .flat_map(|pattern| glob::glob(pattern).into_iter().flatten().flatten())
        .filter(|p| p.is_file())
        .collect();
    // Database files are versioned by content hash; newest modification wins.
    candidates.sort_by_key(|p| p.metadata().and_then(|m| m.modified()).ok());
    candidates.pop()
}

/// A read-only handle onto the raw card database.
pub struct LocalCardDb {
    conn: rusqlite::Connection,
}

impl LocalCardDb {
    pub fn open(path: &std::path::Path) -> rusqlite::Result<LocalCardDb> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        Ok(LocalCardDb { conn })
    }

    /// English title and expansion code for a card definition, if present.
    pub fn card_name(&self, grp_id: i64) -> Option<(String, Option<String>)> {
        self.conn
            .query_row(
                "SELECT l.Loc, c.ExpansionCode
                   FROM Cards c
                   JOIN Localizations_enUS l ON l.LocId = c.TitleId
                  WHERE c.GrpId = ?
                  ORDER BY l.Formatted
                  LIMIT 1",
                [grp_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write as _;

    fn fake_raw_db(path: &std::path::Path) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Cards (GrpId INTEGER, TitleId INTEGER, ExpansionCode TEXT);
             CREATE TABLE Localizations_enUS (LocId INTEGER, Loc TEXT, Formatted INTEGER);
             INSERT INTO Cards VALUES (5001, 700, 'FIN');
             INSERT INTO Localizations_enUS VALUES (700, 'Lightning Helix', 0);",
        )
        .unwrap();
    }

    #[test]
    fn test_lookup_against_fixture_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Raw_CardDatabase_test.mtga");
        fake_raw_db(&path);

        let db = LocalCardDb::open(&path).unwrap();
        let (name, set) = db.card_name(5001).unwrap();
        assert_eq!(name, "Lightning Helix");
        assert_eq!(set.as_deref(), Some("FIN"));
        assert_eq!(db.card_name(999), None);
    }

    #[test]
    fn test_env_override_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.mtga");

        std::env::set_var(RAW_CARD_DB_ENV, &path);
        assert_eq!(locate_raw_card_db(), None);

        std::fs::File::create(&path).unwrap().write_all(b"").unwrap();
        assert_eq!(locate_raw_card_db(), Some(path));
        std::env::remove_var(RAW_CARD_DB_ENV);
    }
}
