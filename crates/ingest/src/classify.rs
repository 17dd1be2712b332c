use lazy_static::lazy_static;
use regex::Regex;

// Fixed semantic tokens identifying the two structured envelope shapes. The
// client emits each envelope on a single line; anything spanning lines is
// noise by construction.
const ROOM_STATE_TOKEN: &str = "\"matchGameRoomStateChangedEvent\"";
const GRE_STATE_TOKEN: &str = "\"greToClientEvent\"";

lazy_static! {
    static ref OUTGOING: Regex = Regex::new(r"^==> ([A-Za-z0-9_]+)\s+(\{.*)$").unwrap();
    static ref COMPLETE: Regex = Regex::new(r"^<== ([A-Za-z0-9_]+)\(([^)]*)\)").unwrap();
}

/// The shape a trimmed log line was classified into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass<'a> {
    /// `==> Method {envelope}` — an RPC leaving the client.
    Outgoing { method: &'a str, envelope: &'a str },
    /// `<== Method(id)` — acknowledgement of a completed RPC.
    MethodComplete { method: &'a str, request_id: &'a str },
    /// Matchmaking room-state envelope.
    RoomState,
    /// Game-engine-to-client state envelope.
    GreState,
    /// Everything else. Not stored, but still scanned for identity.
    Noise,
}

impl LineClass<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            LineClass::Outgoing { .. } => "outgoing",
            LineClass::MethodComplete { .. } => "method_complete",
            LineClass::RoomState => "room_state",
            LineClass::GreState => "gre_state",
            LineClass::Noise => "noise",
        }
    }
}

pub fn classify(text: &str) -> LineClass<'_> {
    if let Some(caps) = OUTGOING.captures(text) {
        let (method, envelope) = (caps.get(1).unwrap(), caps.get(2).unwrap());
        return LineClass::Outgoing {
            method: &text[method.range()],
            envelope: &text[envelope.range()],
        };
    }
    if let Some(caps) = COMPLETE.captures(text) {
        let (method, request_id) = (caps.get(1).unwrap(), caps.get(2).unwrap());
        return LineClass::MethodComplete {
            method: &text[method.range()],
            request_id: &text[request_id.range()],
        };
    }
    if text.starts_with('{') {
        if text.contains(ROOM_STATE_TOKEN) {
            return LineClass::RoomState;
        }
        if text.contains(GRE_STATE_TOKEN) {
            return LineClass::GreState;
        }
    }
    LineClass::Noise
}
