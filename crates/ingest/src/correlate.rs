//! Per-log in-memory state and the application of extracted evidence
//! against storage. Four kinds of evidence describe the same real-world
//! match: outgoing RPCs, business telemetry, room-state envelopes, and the
//! game-engine stream. This module stitches them together.

use crate::extract::{
    normalize_win_reason, GreSnapshot, Intent, RoomPlayer, RoomSnapshot,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use store::{
    claim_event_run, complete_draft_session, ensure_draft_session, insert_card_play,
    insert_opponent_card_instance, latest_deck_for_event, link_match_to_deck,
    replace_deck_cards, resolve_event_alias, update_match_end, update_match_opponent,
    upsert_deck, upsert_draft_pick, upsert_event_run, upsert_match_start, CardPlay, DeckUpsert,
    DraftPickUpsert, EventRunUpsert, MatchEnd, MatchResult, MatchStart, OpponentCardInstance,
    PublicZone, SnapshotReason, DB,
};

lazy_static! {
    static ref PERSONA_PLAIN: Regex = Regex::new(r#""PersonaId":"([^"]+)""#).unwrap();
    static ref PERSONA_ESCAPED: Regex = Regex::new(r#"\\"PersonaId\\":\\"([^"\\]+)"#).unwrap();
    static ref MATCH_TO: Regex = Regex::new(r"Match to ([A-Za-z0-9-]{8,}):").unwrap();
    static ref CLIENT_ID: Regex = Regex::new(r#""clientId":"([^"]+)""#).unwrap();
    static ref SCREEN_NAME: Regex = Regex::new(r#""screenName":"([^"]+)""#).unwrap();
}

/// Mutable per-log state. Owned by the driver for the lifetime of one
/// invocation series over a path; reset on rotation and on non-resume runs.
/// Never persisted: replaying the log rebuilds it.
#[derive(Debug, Default)]
pub struct LogMemory {
    pub persona_id: Option<String>,
    pub player_name: Option<String>,
    pub active_match_id: Option<String>,
    self_seat_by_match: HashMap<String, i64>,
    turn_by_match: HashMap<String, i64>,
    phase_by_match: HashMap<String, String>,
    zone_type_by_match: HashMap<String, HashMap<i64, String>>,
}

impl LogMemory {
    pub fn reset(&mut self) {
        *self = LogMemory::default();
    }

    pub fn self_seat(&self, match_id: &str) -> Option<i64> {
        self.self_seat_by_match.get(match_id).copied()
    }

    /// Learn the player's identity from any line that leaks it. Both fields
    /// are sticky: the first sighting wins for the rest of the run.
    pub fn scan_identity(&mut self, text: &str) {
        if self.persona_id.is_none() {
            let found = PERSONA_PLAIN
                .captures(text)
                .or_else(|| PERSONA_ESCAPED.captures(text))
                .or_else(|| MATCH_TO.captures(text))
                .or_else(|| CLIENT_ID.captures(text))
                .map(|caps| caps[1].to_string());
            // Pre-login placeholder identities are not the player.
            if let Some(id) = found.filter(|id| !id.starts_with("NoInstallID")) {
                tracing::debug!(persona_id = %id, "learned persona id");
                self.persona_id = Some(id);
            }
        }
        if self.player_name.is_none() {
            if let Some(caps) = SCREEN_NAME.captures(text) {
                self.player_name = Some(caps[1].to_string());
            }
        }
    }

    /// Apply one extracted RPC intent.
    pub fn apply_intent(&mut self, c: &DB, intent: Intent) -> store::Result<()> {
        match intent {
            Intent::EventJoin {
                event_name,
                entry_currency,
                entry_paid,
            } => upsert_event_run(
                c,
                &EventRunUpsert {
                    event_name: &event_name,
                    entry_currency: entry_currency.as_deref(),
                    entry_paid,
                    started_at: None,
                },
            ),
            Intent::EventClaim { event_name } => claim_event_run(c, &event_name, None),
            Intent::DeckSubmit(deck) => {
                let deck_id = upsert_deck(
                    c,
                    &DeckUpsert {
                        arena_deck_id: &deck.arena_deck_id,
                        name: deck.name.as_deref(),
                        format: deck.format.as_deref(),
                        event_name: deck.event_name.as_deref(),
                        deck_tile_id: deck.deck_tile_id,
                    },
                )?;
                if let Some(cards) = &deck.cards {
                    replace_deck_cards(c, deck_id, cards)?;
                }
                Ok(())
            }
            Intent::HumanDraftPick {
                draft_id,
                pack_number,
                pick_number,
                picked,
                pack_cards,
            } => {
                let session = ensure_draft_session(c, Some(&draft_id), None, false, None)?;
                upsert_draft_pick(
                    c,
                    &DraftPickUpsert {
                        session_id: session,
                        pack_number,
                        pick_number,
                        picked_cards: &picked,
                        pack_cards: pack_cards.as_deref(),
                    },
                )
            }
            Intent::BotDraftPick {
                event_name,
                pack_number,
                pick_number,
                picked,
            } => {
                let session = ensure_draft_session(c, None, Some(&event_name), true, None)?;
                upsert_draft_pick(
                    c,
                    &DraftPickUpsert {
                        session_id: session,
                        pack_number,
                        pick_number,
                        picked_cards: &picked,
                        pack_cards: None,
                    },
                )
            }
            Intent::DraftComplete {
                draft_id,
                event_name,
            } => complete_draft_session(c, draft_id.as_deref(), event_name.as_deref(), None),
            Intent::MatchStarted {
                match_id,
                event_name,
                seat_id,
                team_id,
                at,
            } => {
                let event_name = event_name
                    .map(|name| resolve_event_alias(c, &name))
                    .transpose()?;
                upsert_match_start(
                    c,
                    &MatchStart {
                        arena_match_id: &match_id,
                        event_name: event_name.as_deref(),
                        self_seat: seat_id.filter(|s| *s > 0),
                        self_team: team_id.filter(|t| *t > 0),
                        started_at: at,
                    },
                )?;
                if let Some(seat) = seat_id.filter(|s| *s > 0) {
                    self.self_seat_by_match.entry(match_id.clone()).or_insert(seat);
                }
                if let Some(event_name) = event_name.as_deref() {
                    self.link_latest_deck(c, &match_id, event_name, SnapshotReason::PreMatch)?;
                }
                self.active_match_id = Some(match_id);
                Ok(())
            }
            Intent::MatchEnded {
                match_id,
                team_id,
                winning_team_id,
                win_reason,
                at,
            } => {
                let result = match (team_id, winning_team_id) {
                    (Some(team), Some(winner)) => MatchResult::derive(team, winner),
                    _ => MatchResult::Unknown,
                };
                update_match_end(
                    c,
                    &MatchEnd {
                        arena_match_id: &match_id,
                        result,
                        win_reason: win_reason.as_deref(),
                        ended_at: at,
                    },
                )?;
                Ok(())
            }
        }
    }

    /// Apply a room-state snapshot: seating, opponent, and completion.
    pub fn apply_room(&mut self, c: &DB, room: &RoomSnapshot) -> store::Result<()> {
        let event_name = room
            .event_name()
            .map(|name| resolve_event_alias(c, name))
            .transpose()?;

        let myself = self.identify_self(&room.players);
        let self_seat = myself.and_then(|p| p.system_seat_id).filter(|s| *s > 0);
        let self_team = myself.and_then(|p| p.team_id).filter(|t| *t > 0);

        upsert_match_start(
            c,
            &MatchStart {
                arena_match_id: &room.match_id,
                event_name: event_name.as_deref(),
                self_seat,
                self_team,
                started_at: room.at.clone(),
            },
        )?;
        if let Some(seat) = self_seat {
            self.self_seat_by_match
                .entry(room.match_id.clone())
                .or_insert(seat);
        }
        self.active_match_id = Some(room.match_id.clone());

        if let Some(event_name) = event_name.as_deref() {
            self.link_latest_deck(c, &room.match_id, event_name, SnapshotReason::RoomState)?;
        }

        if myself.is_some() {
            if let Some(opponent) = self.identify_opponent(&room.players) {
                update_match_opponent(
                    c,
                    &room.match_id,
                    opponent.player_name.as_deref(),
                    opponent.user_id.as_deref(),
                )?;
            }
        }

        if room.is_completed() {
            if let (Some(self_team), Some(result)) = (self_team, room.final_result()) {
                let derived =
                    MatchResult::derive(self_team, result.winning_team_id.unwrap_or(0));
                let reason = result.reason.as_deref().map(normalize_win_reason);
                update_match_end(
                    c,
                    &MatchEnd {
                        arena_match_id: &room.match_id,
                        result: derived,
                        win_reason: reason.as_deref(),
                        ended_at: room.at.clone(),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Apply a game-engine snapshot: seat adoption, turn and zone memory,
    /// and public card sightings.
    pub fn apply_gre(&mut self, c: &DB, gre: &GreSnapshot) -> store::Result<()> {
        let observed_at = gre.at.clone().unwrap_or_else(store::now);

        for state in &gre.states {
            if let Some(match_id) = &state.match_id {
                if self.active_match_id.as_deref() != Some(match_id) {
                    self.active_match_id = Some(match_id.clone());
                    // First evidence of this match may well be the stream
                    // itself; make sure the row exists before sightings
                    // reference it.
                    upsert_match_start(
                        c,
                        &MatchStart {
                            arena_match_id: match_id,
                            started_at: Some(observed_at.clone()),
                            ..Default::default()
                        },
                    )?;
                }
            }
            let match_id = match self.active_match_id.clone() {
                Some(match_id) => match_id,
                // A stream fragment before any match identity: nothing to
                // correlate against.
                None => continue,
            };

            if !self.self_seat_by_match.contains_key(&match_id) {
                if let [seat] = state.system_seat_ids[..] {
                    if seat > 0 {
                        self.self_seat_by_match.insert(match_id.clone(), seat);
                        upsert_match_start(
                            c,
                            &MatchStart {
                                arena_match_id: &match_id,
                                self_seat: Some(seat),
                                started_at: Some(observed_at.clone()),
                                ..Default::default()
                            },
                        )?;
                    }
                }
            }

            if let Some(turn) = state.turn_number {
                self.turn_by_match.insert(match_id.clone(), turn);
            }
            if let Some(phase) = &state.phase {
                self.phase_by_match.insert(match_id.clone(), phase.clone());
            }
            let zone_types = self.zone_type_by_match.entry(match_id.clone()).or_default();
            for zone in &state.zones {
                zone_types.insert(zone.zone_id, zone.zone_type.clone());
            }

            let game_number = state.game_number.unwrap_or(1);
            let self_seat = self.self_seat_by_match.get(&match_id).copied();
            let turn = self.turn_by_match.get(&match_id).copied();
            let phase = self.phase_by_match.get(&match_id).cloned();
            let zone_types = &self.zone_type_by_match[&match_id];

            for obj in &state.objects {
                let zone = obj
                    .zone_id
                    .and_then(|id| match zone_types.get(&id).map(String::as_str) {
                        Some(zone_type) => PublicZone::from_zone_type(zone_type),
                        // The canonical stack/battlefield ids, for streams
                        // that reference zones before declaring them.
                        None if id == 27 => Some(PublicZone::Stack),
                        None if id == 28 => Some(PublicZone::Battlefield),
                        None => None,
                    });

                if let Some(zone) = zone {
                    insert_card_play(
                        c,
                        &CardPlay {
                            arena_match_id: &match_id,
                            game_number,
                            instance_id: obj.instance_id,
                            grp_id: obj.grp_id,
                            owner_seat: obj.owner_seat_id,
                            turn_number: turn,
                            phase: phase.as_deref(),
                            zone,
                            played_at: observed_at.clone(),
                            source: "gre",
                        },
                    )?;
                }

                if let Some(self_seat) = self_seat {
                    if obj.owner_seat_id != self_seat {
                        insert_opponent_card_instance(
                            c,
                            &OpponentCardInstance {
                                arena_match_id: &match_id,
                                game_number,
                                instance_id: obj.instance_id,
                                grp_id: obj.grp_id,
                                first_seen_at: observed_at.clone(),
                                source: "gre",
                            },
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn identify_self<'p>(&self, players: &'p [RoomPlayer]) -> Option<&'p RoomPlayer> {
        let persona = self.persona_id.as_deref()?;
        players
            .iter()
            .find(|p| p.user_id.as_deref() == Some(persona))
    }

    fn identify_opponent<'p>(&self, players: &'p [RoomPlayer]) -> Option<&'p RoomPlayer> {
        players.iter().find(|p| {
            let self_by_id =
                self.persona_id.is_some() && p.user_id == self.persona_id;
            let self_by_name =
                self.player_name.is_some() && p.player_name == self.player_name;
            !self_by_id && !self_by_name
        })
    }

    fn link_latest_deck(
        &self,
        c: &DB,
        match_id: &str,
        event_name: &str,
        reason: SnapshotReason,
    ) -> store::Result<()> {
        if let Some(deck_id) = latest_deck_for_event(c, event_name)? {
            link_match_to_deck(c, match_id, deck_id, reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extract::{parse_gre_state, parse_room_state};
    use store::open_memory;

    #[test]
    fn test_identity_is_sticky_and_rejects_placeholders() {
        let mut mem = LogMemory::default();
        mem.scan_identity(r#"{"PersonaId":"NoInstallID-bootstrap"}"#);
        assert_eq!(mem.persona_id, None);

        mem.scan_identity(r#"{"PersonaId":"ABCD-1234"}"#);
        assert_eq!(mem.persona_id.as_deref(), Some("ABCD-1234"));

        // Later identities do not displace the first.
        mem.scan_identity(r#"{"clientId":"ZZZZ-9999"}"#);
        assert_eq!(mem.persona_id.as_deref(), Some("ABCD-1234"));

        mem.scan_identity(r#"stuff {"screenName":"Planeswalker#12345"} stuff"#);
        assert_eq!(mem.player_name.as_deref(), Some("Planeswalker#12345"));
    }

    #[test]
    fn test_escaped_and_framing_identities() {
        let mut mem = LogMemory::default();
        mem.scan_identity(r#"payload {\"PersonaId\":\"WXYZ-5678\"} tail"#);
        assert_eq!(mem.persona_id.as_deref(), Some("WXYZ-5678"));

        let mut mem = LogMemory::default();
        mem.scan_identity("Match to ABCDEF123456: GreToClientEvent");
        assert_eq!(mem.persona_id.as_deref(), Some("ABCDEF123456"));
    }

    fn gre_line(match_id: &str, game: i64, instance: i64, owner: i64) -> String {
        serde_json::json!({
            "greToClientEvent": {
                "greToClientMessages": [{
                    "systemSeatIds": [2],
                    "gameStateMessage": {
                        "gameInfo": {"matchID": match_id, "gameNumber": game},
                        "zones": [{"zoneId": 28, "type": "ZoneType_Battlefield"}],
                        "gameObjects": [
                            {"instanceId": instance, "grpId": 5001, "ownerSeatId": owner,
                             "type": "GameObjectType_Card",
                             "visibility": "Visibility_Public", "zoneId": 28},
                        ],
                    },
                }],
            },
            "timestamp": "1772330782273",
        })
        .to_string()
    }

    #[test]
    fn test_gre_adopts_seat_and_records_sightings() {
        let c = open_memory().unwrap();
        let mut mem = LogMemory::default();

        let gre = parse_gre_state(&gre_line("M1", 1, 101, 1)).unwrap();
        mem.apply_gre(&c, &gre).unwrap();

        assert_eq!(mem.active_match_id.as_deref(), Some("M1"));
        assert_eq!(mem.self_seat("M1"), Some(2));

        // The opponent-owned public object produced a play and a sighting.
        let plays: i64 = c
            .query_row("SELECT COUNT(*) FROM match_card_plays", [], |r| r.get(0))
            .unwrap();
        let seen: i64 = c
            .query_row("SELECT COUNT(*) FROM match_opponent_card_instances", [], |r| r.get(0))
            .unwrap();
        assert_eq!((plays, seen), (1, 1));

        // Replay changes nothing.
        mem.apply_gre(&c, &gre).unwrap();
        let plays: i64 = c
            .query_row("SELECT COUNT(*) FROM match_card_plays", [], |r| r.get(0))
            .unwrap();
        assert_eq!(plays, 1);

        // The same instance in game 2 is a fresh observation.
        let gre = parse_gre_state(&gre_line("M1", 2, 101, 1)).unwrap();
        mem.apply_gre(&c, &gre).unwrap();
        let plays: i64 = c
            .query_row("SELECT COUNT(*) FROM match_card_plays", [], |r| r.get(0))
            .unwrap();
        assert_eq!(plays, 2);
    }

    #[test]
    fn test_self_owned_objects_are_not_opponent_sightings() {
        let c = open_memory().unwrap();
        let mut mem = LogMemory::default();
        let gre = parse_gre_state(&gre_line("M1", 1, 200, 2)).unwrap();
        mem.apply_gre(&c, &gre).unwrap();

        let seen: i64 = c
            .query_row("SELECT COUNT(*) FROM match_opponent_card_instances", [], |r| r.get(0))
            .unwrap();
        assert_eq!(seen, 0);
    }

    fn room_line(state_type: &str) -> String {
        serde_json::json!({
            "matchGameRoomStateChangedEvent": {
                "gameRoomInfo": {
                    "gameRoomConfig": {
                        "matchId": "M1",
                        "reservedPlayers": [
                            {"userId": "self-id", "playerName": "Me#11111", "systemSeatId": 1,
                             "teamId": 1, "eventId": "FIN_Quick_Draft"},
                            {"userId": "opp-id", "playerName": "Them#22222", "systemSeatId": 2,
                             "teamId": 2},
                        ],
                    },
                    "stateType": state_type,
                    "finalMatchResult": {
                        "resultList": [
                            {"scope": "MatchScope_Match", "winningTeamId": 1,
                             "reason": "ResultReason_Game"},
                        ],
                    },
                },
            },
            "timestamp": "1750327200",
        })
        .to_string()
    }

    #[test]
    fn test_room_resolves_alias_and_records_opponent() {
        let c = open_memory().unwrap();
        upsert_event_run(
            &c,
            &EventRunUpsert {
                event_name: "QuickDraft_FIN_20250619",
                started_at: Some("2025-06-19T00:00:00Z".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let mut mem = LogMemory::default();
        mem.scan_identity(r#"{"PersonaId":"self-id"}"#);

        let room = parse_room_state(&room_line("MatchGameRoomStateType_Playing")).unwrap();
        mem.apply_room(&c, &room).unwrap();

        let (event, opponent, seat): (String, String, i64) = c
            .query_row(
                "SELECT event_name, opponent_name, self_seat FROM matches
                 WHERE arena_match_id = 'M1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        // The compact alias resolved to the stored expanded run name.
        assert_eq!(event, "QuickDraft_FIN_20250619");
        assert_eq!(opponent, "Them#22222");
        assert_eq!(seat, 1);
        assert_eq!(mem.self_seat("M1"), Some(1));
    }

    #[test]
    fn test_completed_room_ends_match_and_bumps_once() {
        let c = open_memory().unwrap();
        upsert_event_run(
            &c,
            &EventRunUpsert {
                event_name: "QuickDraft_FIN_20250619",
                ..Default::default()
            },
        )
        .unwrap();

        let mut mem = LogMemory::default();
        mem.scan_identity(r#"{"PersonaId":"self-id"}"#);

        let room = parse_room_state(&room_line("MatchGameRoomStateType_MatchCompleted")).unwrap();
        mem.apply_room(&c, &room).unwrap();
        // A replayed completion cannot double-count.
        mem.apply_room(&c, &room).unwrap();

        let (result, reason): (String, String) = c
            .query_row(
                "SELECT result, win_reason FROM matches WHERE arena_match_id = 'M1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(result, "win");
        assert_eq!(reason, "Game");

        let (wins, losses): (i64, i64) = c
            .query_row(
                "SELECT wins, losses FROM event_runs WHERE event_name = 'QuickDraft_FIN_20250619'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((wins, losses), (1, 0));
    }

    #[test]
    fn test_unrecognized_self_withholds_opponent() {
        let c = open_memory().unwrap();
        let mut mem = LogMemory::default();
        // No persona learned: seating and opponent stay unknown.
        let room = parse_room_state(&room_line("MatchGameRoomStateType_Playing")).unwrap();
        mem.apply_room(&c, &room).unwrap();

        let (opponent, seat): (Option<String>, Option<i64>) = c
            .query_row(
                "SELECT opponent_name, self_seat FROM matches WHERE arena_match_id = 'M1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(opponent, None);
        assert_eq!(seat, None);
    }
}
