use std::fmt;

/// Outcome of a match from the tracked player's perspective.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Win,
    Loss,
    Unknown,
}

impl MatchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchResult::Win => "win",
            MatchResult::Loss => "loss",
            MatchResult::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> MatchResult {
        match s {
            "win" => MatchResult::Win,
            "loss" => MatchResult::Loss,
            _ => MatchResult::Unknown,
        }
    }

    /// Derive a result from the self team and the winning team reported by an
    /// end-of-match event. Both must be positive to be meaningful.
    pub fn derive(self_team: i64, winning_team: i64) -> MatchResult {
        if winning_team > 0 && self_team == winning_team {
            MatchResult::Win
        } else if winning_team > 0 && self_team > 0 {
            MatchResult::Loss
        } else {
            MatchResult::Unknown
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, MatchResult::Unknown)
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an event run: entered, then prize claimed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventStatus {
    Active,
    Claimed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Claimed => "claimed",
        }
    }
}

/// A deck list section.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeckSection {
    Main,
    Sideboard,
    Command,
    Companion,
}

impl DeckSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeckSection::Main => "main",
            DeckSection::Sideboard => "sideboard",
            DeckSection::Command => "command",
            DeckSection::Companion => "companion",
        }
    }
}

/// The two zones in which a card object is considered publicly played.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PublicZone {
    Stack,
    Battlefield,
}

impl PublicZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicZone::Stack => "stack",
            PublicZone::Battlefield => "battlefield",
        }
    }

    /// Normalized zone type string to a public zone, if it is one.
    pub fn from_zone_type(zone: &str) -> Option<PublicZone> {
        match zone {
            "stack" => Some(PublicZone::Stack),
            "battlefield" => Some(PublicZone::Battlefield),
            _ => None,
        }
    }
}

/// Why a deck snapshot was linked to a match. The first link per reason wins.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SnapshotReason {
    PreMatch,
    RoomState,
}

impl SnapshotReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotReason::PreMatch => "pre_match",
            SnapshotReason::RoomState => "room_state",
        }
    }
}
