use super::parse_epoch_instant;
use serde::Deserialize;

const OBJECT_TYPE_CARD: &str = "GameObjectType_Card";
const VISIBILITY_PUBLIC: &str = "Visibility_Public";

/// One decoded game-engine envelope: the game-state messages it carries plus
/// its normalized timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct GreSnapshot {
    pub states: Vec<GameStateSnapshot>,
    pub at: Option<String>,
}

/// One game-state message, trimmed to the fields the correlator tracks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameStateSnapshot {
    pub match_id: Option<String>,
    pub game_number: Option<i64>,
    /// Seats this client is told it occupies. A singleton identifies self.
    pub system_seat_ids: Vec<i64>,
    pub turn_number: Option<i64>,
    /// Normalized phase: `Phase_`/`Step_` prefix stripped, lowercased.
    pub phase: Option<String>,
    pub zones: Vec<ZoneInfo>,
    pub objects: Vec<GameObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneInfo {
    pub zone_id: i64,
    /// Normalized type: `ZoneType_` prefix stripped, lowercased.
    pub zone_type: String,
}

/// A public, non-token card object. Filtering happens during decode; the
/// correlator only ever sees objects worth persisting.
#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    pub instance_id: i64,
    pub grp_id: i64,
    pub owner_seat_id: i64,
    pub zone_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    gre_to_client_event: GreToClientEvent,
    timestamp: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GreToClientEvent {
    gre_to_client_messages: Option<Vec<GreMessage>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GreMessage {
    system_seat_ids: Option<Vec<i64>>,
    game_state_message: Option<GameStateMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameStateMessage {
    game_info: Option<GameInfo>,
    turn_info: Option<TurnInfo>,
    zones: Option<Vec<RawZone>>,
    game_objects: Option<Vec<RawObject>>,
}

#[derive(Deserialize)]
struct GameInfo {
    #[serde(rename = "matchID")]
    match_id: Option<String>,
    #[serde(rename = "gameNumber")]
    game_number: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnInfo {
    turn_number: Option<i64>,
    phase: Option<String>,
    step: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawZone {
    zone_id: Option<i64>,
    #[serde(rename = "type")]
    zone_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    instance_id: Option<i64>,
    grp_id: Option<i64>,
    owner_seat_id: Option<i64>,
    #[serde(rename = "type")]
    object_type: Option<String>,
    visibility: Option<String>,
    #[serde(default)]
    is_token: bool,
    zone_id: Option<i64>,
}

pub fn normalize_phase(raw: &str) -> String {
    raw.strip_prefix("Phase_")
        .or_else(|| raw.strip_prefix("Step_"))
        .unwrap_or(raw)
        .to_lowercase()
}

pub fn normalize_zone_type(raw: &str) -> String {
    raw.strip_prefix("ZoneType_").unwrap_or(raw).to_lowercase()
}

/// Decode a game-engine line. None when the envelope does not decode; an
/// envelope with no game-state messages yields an empty snapshot.
pub fn parse_gre_state(text: &str) -> Option<GreSnapshot> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    let at = envelope.timestamp.as_deref().and_then(parse_epoch_instant);

    let mut states = Vec::new();
    for message in envelope
        .gre_to_client_event
        .gre_to_client_messages
        .unwrap_or_default()
    {
        let state = match message.game_state_message {
            Some(state) => state,
            None => continue,
        };

        let (match_id, game_number) = state
            .game_info
            .map(|info| (info.match_id, info.game_number))
            .unwrap_or((None, None));

        let (turn_number, phase) = state
            .turn_info
            .map(|turn| {
                let phase = turn.phase.or(turn.step).as_deref().map(normalize_phase);
                (turn.turn_number, phase)
            })
            .unwrap_or((None, None));

        let zones = state
            .zones
            .unwrap_or_default()
            .into_iter()
            .filter_map(|zone| {
                Some(ZoneInfo {
                    zone_id: zone.zone_id?,
                    zone_type: normalize_zone_type(zone.zone_type.as_deref()?),
                })
            })
            .collect();

        let objects = state
            .game_objects
            .unwrap_or_default()
            .into_iter()
            .filter_map(|obj| {
                // Only public, non-token card objects with fully positive
                // identity are observable evidence.
                if obj.object_type.as_deref() != Some(OBJECT_TYPE_CARD)
                    || obj.visibility.as_deref() != Some(VISIBILITY_PUBLIC)
                    || obj.is_token
                {
                    return None;
                }
                let (instance_id, grp_id, owner_seat_id) =
                    (obj.instance_id?, obj.grp_id?, obj.owner_seat_id?);
                if instance_id <= 0 || grp_id <= 0 || owner_seat_id <= 0 {
                    return None;
                }
                Some(GameObject {
                    instance_id,
                    grp_id,
                    owner_seat_id,
                    zone_id: obj.zone_id,
                })
            })
            .collect();

        states.push(GameStateSnapshot {
            match_id,
            game_number,
            system_seat_ids: message.system_seat_ids.unwrap_or_default(),
            turn_number,
            phase,
            zones,
            objects,
        });
    }

    Some(GreSnapshot { states, at })
}

#[cfg(test)]
mod test {
    use super::*;

    fn envelope(objects: serde_json::Value) -> String {
        serde_json::json!({
            "greToClientEvent": {
                "greToClientMessages": [{
                    "type": "GREMessageType_GameStateMessage",
                    "systemSeatIds": [2],
                    "gameStateMessage": {
                        "gameInfo": {"matchID": "M1", "gameNumber": 1},
                        "turnInfo": {"turnNumber": 3, "phase": "Phase_Main1"},
                        "zones": [
                            {"zoneId": 27, "type": "ZoneType_Stack"},
                            {"zoneId": 28, "type": "ZoneType_Battlefield"},
                            {"zoneId": 31, "type": "ZoneType_Hand"},
                        ],
                        "gameObjects": objects,
                    },
                }],
            },
            "timestamp": "1772330782273",
        })
        .to_string()
    }

    #[test]
    fn test_state_and_normalization() {
        let snapshot = parse_gre_state(&envelope(serde_json::json!([]))).unwrap();
        assert_eq!(snapshot.at.as_deref(), Some("2026-03-01T02:06:22Z"));

        let state = &snapshot.states[0];
        assert_eq!(state.match_id.as_deref(), Some("M1"));
        assert_eq!(state.system_seat_ids, vec![2]);
        assert_eq!(state.turn_number, Some(3));
        assert_eq!(state.phase.as_deref(), Some("main1"));
        assert_eq!(
            state.zones,
            vec![
                ZoneInfo { zone_id: 27, zone_type: "stack".to_string() },
                ZoneInfo { zone_id: 28, zone_type: "battlefield".to_string() },
                ZoneInfo { zone_id: 31, zone_type: "hand".to_string() },
            ],
        );
    }

    #[test]
    fn test_object_filters() {
        let snapshot = parse_gre_state(&envelope(serde_json::json!([
            // Kept: public card.
            {"instanceId": 101, "grpId": 5001, "ownerSeatId": 1,
             "type": "GameObjectType_Card", "visibility": "Visibility_Public",
             "isToken": false, "zoneId": 27},
            // Dropped: token.
            {"instanceId": 102, "grpId": 5002, "ownerSeatId": 1,
             "type": "GameObjectType_Card", "visibility": "Visibility_Public",
             "isToken": true, "zoneId": 28},
            // Dropped: hidden.
            {"instanceId": 103, "grpId": 5003, "ownerSeatId": 1,
             "type": "GameObjectType_Card", "visibility": "Visibility_Private",
             "zoneId": 28},
            // Dropped: not a card.
            {"instanceId": 104, "grpId": 5004, "ownerSeatId": 1,
             "type": "GameObjectType_Ability", "visibility": "Visibility_Public"},
            // Dropped: non-positive identity.
            {"instanceId": 0, "grpId": 5005, "ownerSeatId": 1,
             "type": "GameObjectType_Card", "visibility": "Visibility_Public"},
        ])))
        .unwrap();

        let objects = &snapshot.states[0].objects;
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].instance_id, 101);
        assert_eq!(objects[0].zone_id, Some(27));
    }

    #[test]
    fn test_step_prefix_and_missing_fields() {
        let raw = serde_json::json!({
            "greToClientEvent": {
                "greToClientMessages": [{
                    "gameStateMessage": {
                        "turnInfo": {"step": "Step_Combat_Damage"},
                    },
                }],
            },
        })
        .to_string();
        let snapshot = parse_gre_state(&raw).unwrap();
        let state = &snapshot.states[0];
        assert_eq!(state.phase.as_deref(), Some("combat_damage"));
        assert_eq!(state.match_id, None);
        assert_eq!(snapshot.at, None);
    }
}
