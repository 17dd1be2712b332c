use crate::{sql_params, PublicZone, Result, DB};

/// First public appearance of a card instance in a playable zone, per game.
#[derive(Debug, Clone)]
pub struct CardPlay<'a> {
    pub arena_match_id: &'a str,
    pub game_number: i64,
    pub instance_id: i64,
    pub grp_id: i64,
    pub owner_seat: i64,
    pub turn_number: Option<i64>,
    pub phase: Option<&'a str>,
    pub zone: PublicZone,
    pub played_at: String,
    pub source: &'a str,
}

/// Insert a play, keyed by `(match, game, instance)`. Re-emissions of the
/// same instance in the same game are ignored: the first sighting, including
/// its timestamp and zone, is the record.
pub fn insert_card_play(c: &DB, play: &CardPlay) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO match_card_plays
            (match_id, game_number, instance_id, grp_id, owner_seat,
             turn_number, phase, first_public_zone, played_at, source)
         SELECT m.id, ?, ?, ?, ?, ?, ?, ?, ?, ?
           FROM matches m
          WHERE m.arena_match_id = ?
         ON CONFLICT (match_id, game_number, instance_id) DO NOTHING",
    )?;
    stmt.execute(sql_params![
        play.game_number,
        play.instance_id,
        play.grp_id,
        play.owner_seat,
        play.turn_number,
        play.phase,
        play.zone.as_str(),
        play.played_at,
        play.source,
        play.arena_match_id,
    ])?;
    Ok(())
}

/// A publicly observed opponent-owned card instance, per game.
#[derive(Debug, Clone)]
pub struct OpponentCardInstance<'a> {
    pub arena_match_id: &'a str,
    pub game_number: i64,
    pub instance_id: i64,
    pub grp_id: i64,
    pub first_seen_at: String,
    pub source: &'a str,
}

/// Insert an opponent sighting. `first_seen_at` is written exactly once per
/// `(match, game, instance)`; later sightings are ignored.
pub fn insert_opponent_card_instance(c: &DB, seen: &OpponentCardInstance) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO match_opponent_card_instances
            (match_id, game_number, instance_id, grp_id, first_seen_at, source)
         SELECT m.id, ?, ?, ?, ?, ?
           FROM matches m
          WHERE m.arena_match_id = ?
         ON CONFLICT (match_id, game_number, instance_id) DO NOTHING",
    )?;
    stmt.execute(sql_params![
        seen.game_number,
        seen.instance_id,
        seen.grp_id,
        seen.first_seen_at,
        seen.source,
        seen.arena_match_id,
    ])?;
    Ok(())
}
