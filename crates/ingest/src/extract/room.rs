use super::parse_epoch_instant;
use serde::Deserialize;

/// Scope token carried by the authoritative whole-match result entry.
pub const MATCH_SCOPE: &str = "MatchScope_Match";
/// State type announcing that the room's match has finished.
pub const STATE_MATCH_COMPLETED: &str = "MatchGameRoomStateType_MatchCompleted";

/// The matchmaking layer's view of a room, reduced to what the correlator
/// consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub match_id: String,
    pub state_type: Option<String>,
    pub players: Vec<RoomPlayer>,
    pub results: Vec<ResultEntry>,
    /// Envelope timestamp, normalized; absent when out of recognized range.
    pub at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayer {
    pub user_id: Option<String>,
    pub player_name: Option<String>,
    pub system_seat_id: Option<i64>,
    pub team_id: Option<i64>,
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub scope: Option<String>,
    pub winning_team_id: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    match_game_room_state_changed_event: ChangedEvent,
    timestamp: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangedEvent {
    game_room_info: RoomInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomInfo {
    game_room_config: RoomConfig,
    state_type: Option<String>,
    players: Option<Vec<RoomPlayer>>,
    final_match_result: Option<FinalMatchResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomConfig {
    match_id: Option<String>,
    reserved_players: Option<Vec<RoomPlayer>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinalMatchResult {
    result_list: Option<Vec<ResultEntry>>,
}

/// Decode a room-state line. None when the envelope does not decode or
/// carries no match id; such lines stay recorded as raw events only.
pub fn parse_room_state(text: &str) -> Option<RoomSnapshot> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    let info = envelope.match_game_room_state_changed_event.game_room_info;
    let match_id = info.game_room_config.match_id?;

    // Reserved players carry the pre-game seating; the live list is the
    // fallback once the room is underway.
    let players = info
        .game_room_config
        .reserved_players
        .or(info.players)
        .unwrap_or_default();

    let results = info
        .final_match_result
        .and_then(|r| r.result_list)
        .unwrap_or_default();

    Some(RoomSnapshot {
        match_id,
        state_type: info.state_type,
        players,
        results,
        at: envelope.timestamp.as_deref().and_then(parse_epoch_instant),
    })
}

impl RoomSnapshot {
    pub fn is_completed(&self) -> bool {
        self.state_type.as_deref() == Some(STATE_MATCH_COMPLETED)
    }

    /// Pick the authoritative result entry: the whole-match scope when
    /// present, else the first entry that names a winner.
    pub fn final_result(&self) -> Option<&ResultEntry> {
        self.results
            .iter()
            .find(|entry| entry.scope.as_deref() == Some(MATCH_SCOPE))
            .or_else(|| {
                self.results
                    .iter()
                    .find(|entry| entry.winning_team_id.unwrap_or(0) > 0)
            })
    }

    /// First non-empty event id across the seated players.
    pub fn event_name(&self) -> Option<&str> {
        self.players
            .iter()
            .filter_map(|p| p.event_id.as_deref())
            .find(|id| !id.is_empty())
    }
}
