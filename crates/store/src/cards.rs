use crate::{now, sql_params, Result, DB};
use std::collections::HashMap;

/// Record a resolved display name. Enrichment is the only writer.
pub fn save_card_name(c: &DB, card_id: i64, name: &str, set_code: Option<&str>) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO card_catalog (card_id, name, set_code, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (card_id) DO UPDATE SET
            name = excluded.name,
            set_code = COALESCE(excluded.set_code, set_code),
            updated_at = excluded.updated_at",
    )?;
    stmt.execute(sql_params![card_id, name, set_code, now()])?;
    Ok(())
}

/// Best-effort bulk read of display names. Missing ids are simply absent
/// from the returned map.
pub fn card_names(c: &DB, card_ids: &[i64]) -> Result<HashMap<i64, String>> {
    let mut names = HashMap::with_capacity(card_ids.len());
    let mut stmt = c.prepare_cached("SELECT name FROM card_catalog WHERE card_id = ?")?;
    for id in card_ids {
        match stmt.query_row(sql_params![id], |row| row.get::<_, String>(0)) {
            Ok(name) => {
                names.insert(*id, name);
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(names)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::open_memory;

    #[test]
    fn test_name_round_trip() {
        let c = open_memory().unwrap();
        save_card_name(&c, 5001, "Lightning Helix", Some("fin")).unwrap();
        save_card_name(&c, 5001, "Lightning Helix", None).unwrap();

        let names = card_names(&c, &[5001, 5002]).unwrap();
        assert_eq!(names.get(&5001).map(String::as_str), Some("Lightning Helix"));
        assert!(!names.contains_key(&5002));

        let set: Option<String> = c
            .query_row("SELECT set_code FROM card_catalog WHERE card_id = 5001", [], |r| r.get(0))
            .unwrap();
        assert_eq!(set.as_deref(), Some("fin"));
    }
}
