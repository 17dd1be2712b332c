use super::{normalize_win_reason, parse_epoch_instant};
use serde::Deserialize;
use serde_json::Value;
use store::DeckSection;

/// A decoded `==>` line: the envelope's request id plus what, if anything,
/// the request meant.
#[derive(Debug)]
pub struct OutgoingLine {
    pub request_id: Option<String>,
    pub extraction: Extraction,
}

#[derive(Debug)]
pub enum Extraction {
    /// A recognized method with a well-formed request.
    Intents(Vec<Intent>),
    /// A method this pipeline does not correlate. Recorded, then skipped.
    UnknownMethod,
    /// The envelope or its request failed to decode.
    Unparsed,
}

/// What an outgoing RPC asks the service to do, reduced to the facts the
/// correlator persists.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    EventJoin {
        event_name: String,
        entry_currency: Option<String>,
        entry_paid: Option<i64>,
    },
    EventClaim {
        event_name: String,
    },
    DeckSubmit(DeckSubmission),
    HumanDraftPick {
        draft_id: String,
        pack_number: i64,
        pick_number: i64,
        picked: Vec<i64>,
        pack_cards: Option<Vec<i64>>,
    },
    BotDraftPick {
        event_name: String,
        pack_number: i64,
        pick_number: i64,
        picked: Vec<i64>,
    },
    DraftComplete {
        draft_id: Option<String>,
        event_name: Option<String>,
    },
    MatchStarted {
        match_id: String,
        event_name: Option<String>,
        seat_id: Option<i64>,
        team_id: Option<i64>,
        at: Option<String>,
    },
    MatchEnded {
        match_id: String,
        team_id: Option<i64>,
        winning_team_id: Option<i64>,
        win_reason: Option<String>,
        at: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeckSubmission {
    pub arena_deck_id: String,
    pub name: Option<String>,
    pub format: Option<String>,
    pub event_name: Option<String>,
    pub deck_tile_id: Option<i64>,
    /// Present when the submission carried a card list; a metadata-only
    /// resubmission leaves the stored list alone.
    pub cards: Option<Vec<(DeckSection, i64, i64)>>,
}

#[derive(Deserialize)]
struct Envelope {
    id: Option<String>,
    request: Option<Value>,
}

/// Decode an outgoing envelope for |method|.
///
/// The `request` field is either an inline JSON document or a JSON string
/// whose content is a JSON document; unwrapping is bounded to one level.
pub fn extract_outgoing(method: &str, envelope: &str) -> OutgoingLine {
    let envelope: Envelope = match serde_json::from_str(envelope) {
        Ok(envelope) => envelope,
        Err(_) => {
            return OutgoingLine {
                request_id: None,
                extraction: Extraction::Unparsed,
            }
        }
    };
    let request = match envelope.request.map(unwrap_request) {
        Some(Some(request)) => Some(request),
        // A request that claimed to be string-wrapped JSON but was not.
        Some(None) => {
            return OutgoingLine {
                request_id: envelope.id,
                extraction: Extraction::Unparsed,
            }
        }
        None => None,
    };

    let extraction = match extract_intents(method, request) {
        Some(Ok(intents)) => Extraction::Intents(intents),
        Some(Err(())) => Extraction::Unparsed,
        None => Extraction::UnknownMethod,
    };
    OutgoingLine {
        request_id: envelope.id,
        extraction,
    }
}

fn unwrap_request(request: Value) -> Option<Value> {
    match request {
        Value::String(inner) => serde_json::from_str(&inner).ok(),
        inline => Some(inline),
    }
}

/// None: unrecognized method. Some(Err): recognized but undecodable.
fn extract_intents(method: &str, request: Option<Value>) -> Option<Result<Vec<Intent>, ()>> {
    let decoded = match method {
        "EventJoin" => decode::<EventJoinReq>(request).map(|req| {
            vec![Intent::EventJoin {
                event_name: req.event_name,
                entry_currency: req.entry_currency_type,
                entry_paid: req.entry_currency_paid,
            }]
        }),
        "EventClaimPrize" => decode::<EventClaimReq>(request).map(|req| {
            vec![Intent::EventClaim {
                event_name: req.event_name,
            }]
        }),
        "EventSetDeckV2" => decode::<SetDeckReq>(request).map(|req| vec![req.into_intent()]),
        "EventPlayerDraftMakePick" => {
            decode::<HumanPickReq>(request).and_then(|req| req.into_intent().ok_or(()))
        }
        "BotDraftDraftPick" => decode::<BotPickReq>(request).map(|req| req.into_intent()),
        "DraftCompleteDraft" => decode::<DraftCompleteReq>(request).and_then(|req| {
            if req.draft_id.is_none() && req.event_name.is_none() {
                return Err(());
            }
            Ok(vec![Intent::DraftComplete {
                draft_id: req.draft_id,
                event_name: req.event_name,
            }])
        }),
        "LogBusinessEvents" => business_intents(request),
        _ => return None,
    };
    Some(decoded)
}

fn decode<T: serde::de::DeserializeOwned>(request: Option<Value>) -> Result<T, ()> {
    let request = request.ok_or(())?;
    serde_json::from_value(request).map_err(|_| ())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventJoinReq {
    event_name: String,
    entry_currency_type: Option<String>,
    entry_currency_paid: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventClaimReq {
    event_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetDeckReq {
    event_name: Option<String>,
    summary: DeckSummaryReq,
    deck: Option<DeckListReq>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeckSummaryReq {
    deck_id: String,
    name: Option<String>,
    attributes: Option<Vec<DeckAttribute>>,
    deck_tile_id: Option<i64>,
}

#[derive(Deserialize)]
struct DeckAttribute {
    name: String,
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeckListReq {
    #[serde(default)]
    main_deck: Vec<CardEntry>,
    sideboard: Option<Vec<CardEntry>>,
    command_zone: Option<Vec<CardEntry>>,
    companions: Option<Vec<CardEntry>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardEntry {
    card_id: i64,
    quantity: i64,
}

impl SetDeckReq {
    fn into_intent(self) -> Intent {
        // The display format rides along as a summary attribute.
        let format = self.summary.attributes.as_ref().and_then(|attrs| {
            attrs
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case("format"))
                .map(|a| a.value.clone())
        });

        let cards = self.deck.map(|deck| {
            let sections = [
                (DeckSection::Main, Some(deck.main_deck)),
                (DeckSection::Sideboard, deck.sideboard),
                (DeckSection::Command, deck.command_zone),
                (DeckSection::Companion, deck.companions),
            ];
            let mut cards = Vec::new();
            for (section, entries) in sections {
                for entry in entries.unwrap_or_default() {
                    if entry.quantity >= 1 {
                        cards.push((section, entry.card_id, entry.quantity));
                    }
                }
            }
            cards
        });

        Intent::DeckSubmit(DeckSubmission {
            arena_deck_id: self.summary.deck_id,
            name: self.summary.name,
            format,
            event_name: self.event_name,
            deck_tile_id: self.summary.deck_tile_id,
            cards,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HumanPickReq {
    draft_id: String,
    pack_number: i64,
    pick_number: i64,
    card_ids: Option<Vec<i64>>,
    card_id: Option<i64>,
    pack_cards: Option<Vec<i64>>,
}

impl HumanPickReq {
    fn into_intent(self) -> Option<Vec<Intent>> {
        let picked = match (self.card_ids, self.card_id) {
            (Some(ids), _) if !ids.is_empty() => ids,
            (_, Some(id)) => vec![id],
            _ => return None,
        };
        Some(vec![Intent::HumanDraftPick {
            draft_id: self.draft_id,
            pack_number: self.pack_number,
            pick_number: self.pick_number,
            picked,
            pack_cards: self.pack_cards,
        }])
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BotPickReq {
    event_name: String,
    pick_info: BotPickInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BotPickInfo {
    card_ids: Vec<String>,
    pack_number: i64,
    pick_number: i64,
}

impl BotPickReq {
    fn into_intent(self) -> Vec<Intent> {
        // Card ids arrive as decimal strings; drop anything non-numeric and
        // keep the rest in order.
        let picked = self
            .pick_info
            .card_ids
            .iter()
            .filter_map(|id| id.parse::<i64>().ok())
            .collect();
        vec![Intent::BotDraftPick {
            event_name: self.event_name,
            pack_number: self.pick_info.pack_number,
            pick_number: self.pick_info.pick_number,
            picked,
        }]
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftCompleteReq {
    draft_id: Option<String>,
    event_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BusinessEvent {
    event_type: Option<i64>,
    match_id: Option<String>,
    event_id: Option<String>,
    seat_id: Option<i64>,
    team_id: Option<i64>,
    winning_team_id: Option<i64>,
    winning_reason: Option<String>,
    event_time: Option<String>,
}

fn business_intents(request: Option<Value>) -> Result<Vec<Intent>, ()> {
    let request = request.ok_or(())?;
    let entries: Vec<Value> = match request {
        Value::Array(entries) => entries,
        object @ Value::Object(_) => vec![object],
        _ => return Err(()),
    };

    let mut intents = Vec::new();
    for entry in entries {
        // Entries that fail to decode, or report other telemetry types, are
        // skipped without poisoning their neighbors.
        let event: BusinessEvent = match serde_json::from_value(entry) {
            Ok(event) => event,
            Err(_) => continue,
        };
        let match_id = match event.match_id {
            Some(match_id) => match_id,
            None => continue,
        };
        let at = event.event_time.as_deref().and_then(parse_epoch_instant);

        match event.event_type {
            Some(3) => intents.push(Intent::MatchStarted {
                match_id,
                event_name: event.event_id,
                seat_id: event.seat_id,
                team_id: event.team_id,
                at,
            }),
            Some(4) => intents.push(Intent::MatchEnded {
                match_id,
                team_id: event.team_id,
                winning_team_id: event.winning_team_id,
                win_reason: event.winning_reason.as_deref().map(normalize_win_reason),
                at,
            }),
            _ => {}
        }
    }
    Ok(intents)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_string_wrapped_request_unwraps_once() {
        let line = extract_outgoing(
            "EventJoin",
            r#"{"id":"r1","request":"{\"eventName\":\"QuickDraft_FIN_20250619\",\"entryCurrencyType\":\"gems\",\"entryCurrencyPaid\":750}"}"#,
        );
        assert_eq!(line.request_id.as_deref(), Some("r1"));
        match line.extraction {
            Extraction::Intents(intents) => assert_eq!(
                intents,
                vec![Intent::EventJoin {
                    event_name: "QuickDraft_FIN_20250619".to_string(),
                    entry_currency: Some("gems".to_string()),
                    entry_paid: Some(750),
                }],
            ),
            other => panic!("expected intents, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_request_also_accepted() {
        let line = extract_outgoing(
            "EventClaimPrize",
            r#"{"id":"r2","request":{"eventName":"QuickDraft_FIN_20250619"}}"#,
        );
        assert!(matches!(line.extraction, Extraction::Intents(_)));
    }

    #[test]
    fn test_unknown_method_is_recorded_not_parsed() {
        let line = extract_outgoing("FrontDoorConnectionClose", r#"{"id":"r3","request":"{}"}"#);
        assert!(matches!(line.extraction, Extraction::UnknownMethod));
    }

    #[test]
    fn test_garbage_envelope_is_unparsed() {
        let line = extract_outgoing("EventJoin", "{not json");
        assert!(matches!(line.extraction, Extraction::Unparsed));
        // Recognized method, but the request is missing its required fields.
        let line = extract_outgoing("EventJoin", r#"{"id":"r4","request":"{\"foo\":1}"}"#);
        assert!(matches!(line.extraction, Extraction::Unparsed));
    }

    #[test]
    fn test_deck_submission_sections_and_format() {
        let request = serde_json::json!({
            "eventName": "QuickDraft_FIN_20250619",
            "summary": {
                "deckId": "D1",
                "name": "Draft Deck",
                "deckTileId": 5001,
                "attributes": [
                    {"name": "Format", "value": "Limited"},
                    {"name": "other", "value": "x"},
                ],
            },
            "deck": {
                "mainDeck": [
                    {"cardId": 1, "quantity": 4},
                    {"cardId": 2, "quantity": 0},
                ],
                "sideboard": [{"cardId": 9, "quantity": 2}],
                "companions": [{"cardId": 7, "quantity": 1}],
            },
        });
        let envelope = serde_json::json!({"id": "r5", "request": request.to_string()}).to_string();

        let line = extract_outgoing("EventSetDeckV2", &envelope);
        let intents = match line.extraction {
            Extraction::Intents(intents) => intents,
            other => panic!("expected intents, got {:?}", other),
        };
        let deck = match &intents[0] {
            Intent::DeckSubmit(deck) => deck,
            other => panic!("expected deck submit, got {:?}", other),
        };
        assert_eq!(deck.arena_deck_id, "D1");
        assert_eq!(deck.format.as_deref(), Some("Limited"));
        assert_eq!(deck.event_name.as_deref(), Some("QuickDraft_FIN_20250619"));
        // The zero-quantity line was dropped.
        assert_eq!(
            deck.cards,
            Some(vec![
                (DeckSection::Main, 1, 4),
                (DeckSection::Sideboard, 9, 2),
                (DeckSection::Companion, 7, 1),
            ]),
        );
    }

    #[test]
    fn test_bot_pick_drops_non_numeric_ids() {
        let request = serde_json::json!({
            "eventName": "QuickDraft_FIN_20250619",
            "pickInfo": {
                "cardIds": ["90001", "bogus", "90003"],
                "packNumber": 1,
                "pickNumber": 3,
            },
        });
        let envelope = serde_json::json!({"id": "r6", "request": request.to_string()}).to_string();

        let line = extract_outgoing("BotDraftDraftPick", &envelope);
        match line.extraction {
            Extraction::Intents(intents) => assert_eq!(
                intents,
                vec![Intent::BotDraftPick {
                    event_name: "QuickDraft_FIN_20250619".to_string(),
                    pack_number: 1,
                    pick_number: 3,
                    picked: vec![90001, 90003],
                }],
            ),
            other => panic!("expected intents, got {:?}", other),
        }
    }

    #[test]
    fn test_business_events_accept_object_or_array() {
        let request = serde_json::json!([
            {"EventType": 3, "MatchId": "M1", "EventId": "FIN_Quick_Draft",
             "SeatId": 1, "TeamId": 1, "EventTime": "1772330782273"},
            {"EventType": 7, "MatchId": "M1"},
            {"EventType": 4, "MatchId": "M1", "TeamId": 1, "WinningTeamId": 2,
             "WinningReason": "ResultReason_Game"},
        ]);
        let envelope = serde_json::json!({"id": "r7", "request": request.to_string()}).to_string();

        let line = extract_outgoing("LogBusinessEvents", &envelope);
        let intents = match line.extraction {
            Extraction::Intents(intents) => intents,
            other => panic!("expected intents, got {:?}", other),
        };
        assert_eq!(intents.len(), 2);
        assert_eq!(
            intents[0],
            Intent::MatchStarted {
                match_id: "M1".to_string(),
                event_name: Some("FIN_Quick_Draft".to_string()),
                seat_id: Some(1),
                team_id: Some(1),
                at: Some("2026-03-01T02:06:22Z".to_string()),
            },
        );
        assert_eq!(
            intents[1],
            Intent::MatchEnded {
                match_id: "M1".to_string(),
                team_id: Some(1),
                winning_team_id: Some(2),
                win_reason: Some("Game".to_string()),
                at: None,
            },
        );
    }
}
