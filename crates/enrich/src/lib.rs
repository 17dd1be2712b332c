//! Card-name enrichment: resolves card definition ids to display names.
//!
//! Resolution order: the `card_catalog` cache table, then the game client's
//! local raw card database, then a web lookup. Every successful resolution
//! is written back to the cache; every failure degrades to the numeric id on
//! the read side.

mod local;
mod scryfall;

use std::collections::HashMap;
use std::sync::Mutex;

pub use local::{locate_raw_card_db, LocalCardDb, RAW_CARD_DB_ENV};
pub use scryfall::Scryfall;

pub struct Enricher {
    /// Write connection for the cache table. Enrichment is the only writer
    /// of `card_catalog`, so this never contends with the ingest pipeline.
    cache: Mutex<store::DB>,
    local: Option<Mutex<LocalCardDb>>,
    web: Scryfall,
}

impl Enricher {
    pub fn new(cache: store::DB) -> Enricher {
        let local = match locate_raw_card_db() {
            Some(path) => match LocalCardDb::open(&path) {
                Ok(db) => {
                    tracing::info!(path = %path.display(), "using local raw card database");
                    Some(Mutex::new(db))
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "raw card database unusable");
                    None
                }
            },
            None => None,
        };
        Enricher {
            cache: Mutex::new(cache),
            local,
            web: Scryfall::new(),
        }
    }

    #[cfg(test)]
    fn with_web(cache: store::DB, web: Scryfall) -> Enricher {
        Enricher {
            cache: Mutex::new(cache),
            local: None,
            web,
        }
    }

    /// Resolve display names for |grp_ids|, best-effort. Ids that cannot be
    /// resolved anywhere are absent from the result.
    pub async fn resolve(&self, grp_ids: &[i64]) -> HashMap<i64, String> {
        let mut names = {
            let cache = self.cache.lock().unwrap();
            store::card_names(&cache, grp_ids).unwrap_or_default()
        };

        let missing: Vec<i64> = grp_ids
            .iter()
            .copied()
            .filter(|id| !names.contains_key(id))
            .collect();

        for grp_id in missing {
            let resolved = match self.lookup_local(grp_id) {
                hit @ Some(_) => hit,
                None => self.web.card_name(grp_id).await,
            };
            if let Some((name, set)) = resolved {
                let cache = self.cache.lock().unwrap();
                if let Err(err) = store::save_card_name(&cache, grp_id, &name, set.as_deref()) {
                    tracing::warn!(grp_id, error = %err, "failed to cache card name");
                }
                names.insert(grp_id, name);
            }
        }
        names
    }

    fn lookup_local(&self, grp_id: i64) -> Option<(String, Option<String>)> {
        let local = self.local.as_ref()?;
        local.lock().unwrap().card_name(grp_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_cache_hit_skips_lookups() {
        let cache = store::open_memory().unwrap();
        store::save_card_name(&cache, 5001, "Lightning Helix", None).unwrap();

        // An unroutable web endpoint: any lookup attempt would fail loudly.
        let enricher =
            Enricher::with_web(cache, Scryfall::with_base_url("http://127.0.0.1:1".to_string()));

        let names = enricher.resolve(&[5001]).await;
        assert_eq!(names.get(&5001).map(String::as_str), Some("Lightning Helix"));
    }

    #[tokio::test]
    async fn test_unresolvable_ids_are_absent() {
        let cache = store::open_memory().unwrap();
        let enricher =
            Enricher::with_web(cache, Scryfall::with_base_url("http://127.0.0.1:1".to_string()));

        let names = enricher.resolve(&[12345]).await;
        assert!(names.is_empty());
    }
}
