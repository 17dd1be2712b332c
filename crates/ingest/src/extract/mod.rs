//! Typed decoders for the classified line shapes. Decode failures are
//! non-fatal: the pipeline records the raw line and moves on.

mod gre;
mod outgoing;
mod room;

pub use gre::{parse_gre_state, GameObject, GameStateSnapshot, GreSnapshot, ZoneInfo};
pub use outgoing::{extract_outgoing, DeckSubmission, Extraction, Intent, OutgoingLine};
pub use room::{parse_room_state, ResultEntry, RoomPlayer, RoomSnapshot};

/// Normalize an epoch timestamp carried as a decimal string.
///
/// Magnitude decides the unit: `[1e12, 1e13)` is milliseconds, `[1e9, 1e10)`
/// is seconds. Anything else (including non-numeric text) is treated as
/// absent rather than guessed at.
pub fn parse_epoch_instant(raw: &str) -> Option<String> {
    let value: i64 = raw.trim().parse().ok()?;
    let seconds = if (1_000_000_000_000..10_000_000_000_000).contains(&value) {
        value / 1000
    } else if (1_000_000_000..10_000_000_000).contains(&value) {
        value
    } else {
        return None;
    };
    let t = chrono::DateTime::from_timestamp(seconds, 0)?;
    Some(store::format_instant(t))
}

/// Win reasons arrive prefixed by their reporting subsystem; store the bare
/// reason.
pub fn normalize_win_reason(raw: &str) -> String {
    raw.strip_prefix("ResultReason_")
        .or_else(|| raw.strip_prefix("WinningReason_"))
        .unwrap_or(raw)
        .to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_epoch_unit_detection() {
        // Milliseconds and seconds forms of the same wall-clock second.
        let from_ms = parse_epoch_instant("1772330782273").unwrap();
        let from_s = parse_epoch_instant("1772330782").unwrap();
        assert_eq!(from_ms, from_s);

        // Out-of-range magnitudes and junk are absent.
        assert_eq!(parse_epoch_instant("12345"), None);
        assert_eq!(parse_epoch_instant("100000000000000"), None);
        assert_eq!(parse_epoch_instant("not-a-number"), None);
        assert_eq!(parse_epoch_instant(""), None);
    }

    #[test]
    fn test_win_reason_prefixes() {
        assert_eq!(normalize_win_reason("ResultReason_Game"), "Game");
        assert_eq!(normalize_win_reason("WinningReason_Concede"), "Concede");
        assert_eq!(normalize_win_reason("Draw"), "Draw");
    }
}
