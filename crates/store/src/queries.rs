//! Read-side queries consumed by the HTTP surface. These run on read-only
//! connections and never mutate.

use crate::{events::derive_event_type, sql_params, Result, DB};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Overview {
    pub matches: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: Option<f64>,
    pub recent: Vec<MatchSummary>,
}

#[derive(Debug, Serialize)]
pub struct MatchSummary {
    pub id: i64,
    pub arena_match_id: String,
    pub event_name: Option<String>,
    pub opponent_name: Option<String>,
    pub result: String,
    pub win_reason: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub deck_id: Option<i64>,
    pub deck_name: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct MatchFilter<'a> {
    pub limit: Option<i64>,
    pub event: Option<&'a str>,
    pub result: Option<&'a str>,
}

const MATCH_SUMMARY_SELECT: &str = "
    SELECT m.id, m.arena_match_id, m.event_name, m.opponent_name, m.result,
           m.win_reason, m.started_at, m.ended_at, d.id, d.name
      FROM matches m
      LEFT JOIN decks d ON d.id = (
           SELECT deck_id FROM match_decks
            WHERE match_id = m.id
            ORDER BY created_at, rowid
            LIMIT 1)";

fn match_summary_row(row: &rusqlite::Row) -> rusqlite::Result<MatchSummary> {
    Ok(MatchSummary {
        id: row.get(0)?,
        arena_match_id: row.get(1)?,
        event_name: row.get(2)?,
        opponent_name: row.get(3)?,
        result: row.get(4)?,
        win_reason: row.get(5)?,
        started_at: row.get(6)?,
        ended_at: row.get(7)?,
        deck_id: row.get(8)?,
        deck_name: row.get(9)?,
    })
}

pub fn overview(c: &DB, recent: i64) -> Result<Overview> {
    let (matches, wins, losses): (i64, i64, i64) = c.query_row(
        "SELECT COUNT(*),
                COUNT(*) FILTER (WHERE result = 'win'),
                COUNT(*) FILTER (WHERE result = 'loss')
           FROM matches",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    let decided = wins + losses;
    let win_rate = (decided > 0).then(|| wins as f64 / decided as f64);

    let recent = list_matches(
        c,
        &MatchFilter {
            limit: Some(recent),
            ..Default::default()
        },
    )?;

    Ok(Overview {
        matches,
        wins,
        losses,
        win_rate,
        recent,
    })
}

pub fn list_matches(c: &DB, filter: &MatchFilter) -> Result<Vec<MatchSummary>> {
    let mut sql = String::from(MATCH_SUMMARY_SELECT);
    let mut clauses = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(event) = filter.event {
        clauses.push("m.event_name = ? COLLATE NOCASE");
        params.push(Box::new(event.to_string()));
    }
    if let Some(result) = filter.result {
        clauses.push("m.result = ?");
        params.push(Box::new(result.to_string()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY m.started_at DESC, m.id DESC LIMIT ?");
    params.push(Box::new(filter.limit.unwrap_or(50)));

    let mut stmt = c.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
        match_summary_row,
    )?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

#[derive(Debug, Serialize)]
pub struct CardPlayRow {
    pub game_number: i64,
    pub instance_id: i64,
    pub grp_id: i64,
    pub card_name: Option<String>,
    pub owner_seat: i64,
    pub turn_number: Option<i64>,
    pub phase: Option<String>,
    pub first_public_zone: String,
    pub played_at: String,
}

#[derive(Debug, Serialize)]
pub struct OpponentCardRow {
    pub grp_id: i64,
    pub card_name: Option<String>,
    /// Max simultaneous sightings of this card across the games of a match:
    /// the publicly proven copy count.
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct MatchDetail {
    #[serde(flatten)]
    pub summary: MatchSummary,
    pub self_seat: Option<i64>,
    pub opponent_cards: Vec<OpponentCardRow>,
    pub plays: Vec<CardPlayRow>,
}

pub fn match_detail(c: &DB, id: i64) -> Result<Option<MatchDetail>> {
    let mut stmt = c.prepare(&format!("{} WHERE m.id = ?", MATCH_SUMMARY_SELECT))?;
    let summary = match stmt
        .query_row(sql_params![id], match_summary_row)
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            err => Err(err),
        })? {
        Some(summary) => summary,
        None => return Ok(None),
    };

    let self_seat: Option<i64> =
        c.query_row("SELECT self_seat FROM matches WHERE id = ?", [id], |r| r.get(0))?;

    Ok(Some(MatchDetail {
        summary,
        self_seat,
        opponent_cards: opponent_observed_cards(c, id)?,
        plays: match_timeline(c, id)?,
    }))
}

/// Plays of a match in observation order: by game, then first sighting.
pub fn match_timeline(c: &DB, match_id: i64) -> Result<Vec<CardPlayRow>> {
    let mut stmt = c.prepare(
        "SELECT p.game_number, p.instance_id, p.grp_id, cc.name, p.owner_seat,
                p.turn_number, p.phase, p.first_public_zone, p.played_at
           FROM match_card_plays p
           LEFT JOIN card_catalog cc ON cc.card_id = p.grp_id
          WHERE p.match_id = ?
          ORDER BY p.game_number, p.played_at, p.instance_id",
    )?;
    let rows = stmt.query_map([match_id], |row| {
        Ok(CardPlayRow {
            game_number: row.get(0)?,
            instance_id: row.get(1)?,
            grp_id: row.get(2)?,
            card_name: row.get(3)?,
            owner_seat: row.get(4)?,
            turn_number: row.get(5)?,
            phase: row.get(6)?,
            first_public_zone: row.get(7)?,
            played_at: row.get(8)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

/// Aggregate opponent sightings per card definition. Within one game every
/// instance is a distinct physical copy, so the per-card quantity is the
/// maximum per-game instance count across the games of the match.
pub fn opponent_observed_cards(c: &DB, match_id: i64) -> Result<Vec<OpponentCardRow>> {
    let mut stmt = c.prepare(
        "SELECT grp_id, cc.name, MAX(n) FROM (
            SELECT grp_id, game_number, COUNT(*) AS n
              FROM match_opponent_card_instances
             WHERE match_id = ?
             GROUP BY grp_id, game_number)
          LEFT JOIN card_catalog cc ON cc.card_id = grp_id
          GROUP BY grp_id
          ORDER BY grp_id",
    )?;
    let rows = stmt.query_map([match_id], |row| {
        Ok(OpponentCardRow {
            grp_id: row.get(0)?,
            card_name: row.get(1)?,
            quantity: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

#[derive(Debug, Serialize)]
pub struct DeckSummary {
    pub id: i64,
    pub arena_deck_id: String,
    pub name: Option<String>,
    pub format: Option<String>,
    pub event_name: Option<String>,
    pub main_count: i64,
    pub sideboard_count: i64,
    pub matches: i64,
    pub wins: i64,
    pub losses: i64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeckScope {
    Constructed,
    Draft,
    All,
}

impl DeckScope {
    pub fn parse(s: &str) -> Option<DeckScope> {
        match s {
            "constructed" => Some(DeckScope::Constructed),
            "draft" => Some(DeckScope::Draft),
            "all" => Some(DeckScope::All),
            _ => None,
        }
    }

    fn admits(&self, event_name: Option<&str>) -> bool {
        let is_draft = matches!(
            event_name.map(derive_event_type),
            Some("premier_draft" | "quick_draft" | "trad_draft")
        );
        match self {
            DeckScope::All => true,
            DeckScope::Draft => is_draft,
            DeckScope::Constructed => !is_draft,
        }
    }
}

pub fn list_decks(c: &DB, scope: DeckScope) -> Result<Vec<DeckSummary>> {
    let mut stmt = c.prepare(
        "SELECT d.id, d.arena_deck_id, d.name, d.format, d.event_name,
                COALESCE((SELECT SUM(quantity) FROM deck_cards
                          WHERE deck_id = d.id AND section = 'main'), 0),
                COALESCE((SELECT SUM(quantity) FROM deck_cards
                          WHERE deck_id = d.id AND section = 'sideboard'), 0),
                (SELECT COUNT(*) FROM match_decks WHERE deck_id = d.id),
                (SELECT COUNT(*) FROM match_decks md JOIN matches m ON m.id = md.match_id
                  WHERE md.deck_id = d.id AND m.result = 'win'),
                (SELECT COUNT(*) FROM match_decks md JOIN matches m ON m.id = md.match_id
                  WHERE md.deck_id = d.id AND m.result = 'loss')
           FROM decks d
          ORDER BY d.updated_at DESC, d.id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DeckSummary {
            id: row.get(0)?,
            arena_deck_id: row.get(1)?,
            name: row.get(2)?,
            format: row.get(3)?,
            event_name: row.get(4)?,
            main_count: row.get(5)?,
            sideboard_count: row.get(6)?,
            matches: row.get(7)?,
            wins: row.get(8)?,
            losses: row.get(9)?,
        })
    })?;
    let decks: Vec<DeckSummary> = rows.collect::<std::result::Result<_, _>>()?;
    Ok(decks
        .into_iter()
        .filter(|d| scope.admits(d.event_name.as_deref()))
        .collect())
}

#[derive(Debug, Serialize)]
pub struct DeckCardRow {
    pub section: String,
    pub card_id: i64,
    pub card_name: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct DeckDetail {
    #[serde(flatten)]
    pub summary: DeckSummary,
    pub cards: Vec<DeckCardRow>,
    pub match_history: Vec<MatchSummary>,
}

pub fn deck_detail(c: &DB, id: i64) -> Result<Option<DeckDetail>> {
    let summary = match list_decks(c, DeckScope::All)?
        .into_iter()
        .find(|d| d.id == id)
    {
        Some(summary) => summary,
        None => return Ok(None),
    };

    let mut stmt = c.prepare(
        "SELECT dc.section, dc.card_id, cc.name, dc.quantity
           FROM deck_cards dc
           LEFT JOIN card_catalog cc ON cc.card_id = dc.card_id
          WHERE dc.deck_id = ?
          ORDER BY dc.section, dc.card_id",
    )?;
    let cards = stmt
        .query_map([id], |row| {
            Ok(DeckCardRow {
                section: row.get(0)?,
                card_id: row.get(1)?,
                card_name: row.get(2)?,
                quantity: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = c.prepare(&format!(
        "{} WHERE m.id IN (SELECT match_id FROM match_decks WHERE deck_id = ?)
         ORDER BY m.started_at DESC, m.id DESC",
        MATCH_SUMMARY_SELECT
    ))?;
    let match_history = stmt
        .query_map([id], match_summary_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(DeckDetail {
        summary,
        cards,
        match_history,
    }))
}

#[derive(Debug, Serialize)]
pub struct DraftSessionSummary {
    pub id: i64,
    pub draft_id: Option<String>,
    pub event_name: Option<String>,
    pub is_bot_draft: bool,
    pub pick_count: i64,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

pub fn list_drafts(c: &DB) -> Result<Vec<DraftSessionSummary>> {
    let mut stmt = c.prepare(
        "SELECT s.id, s.draft_id, s.event_name, s.is_bot_draft,
                (SELECT COUNT(*) FROM draft_picks WHERE session_id = s.id),
                s.started_at, s.completed_at
           FROM draft_sessions s
          ORDER BY s.id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DraftSessionSummary {
            id: row.get(0)?,
            draft_id: row.get(1)?,
            event_name: row.get(2)?,
            is_bot_draft: row.get(3)?,
            pick_count: row.get(4)?,
            started_at: row.get(5)?,
            completed_at: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

#[derive(Debug, Serialize)]
pub struct DraftPickRow {
    pub pack_number: i64,
    pub pick_number: i64,
    pub picked_cards: serde_json::Value,
    pub pack_cards: Option<serde_json::Value>,
}

pub fn draft_picks(c: &DB, session_id: i64) -> Result<Vec<DraftPickRow>> {
    let mut stmt = c.prepare(
        "SELECT pack_number, pick_number, picked_cards, pack_cards
           FROM draft_picks
          WHERE session_id = ?
          ORDER BY pack_number, pick_number",
    )?;
    let rows = stmt.query_map([session_id], |row| {
        let picked: String = row.get(2)?;
        let pack: Option<String> = row.get(3)?;
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, picked, pack))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (pack_number, pick_number, picked, pack) = row?;
        out.push(DraftPickRow {
            pack_number,
            pick_number,
            picked_cards: serde_json::from_str(&picked)?,
            pack_cards: pack.as_deref().map(serde_json::from_str).transpose()?,
        });
    }
    Ok(out)
}
