use crate::{bump_event_run_record, now, sql_params, MatchResult, Result, DB};

#[derive(Debug, Clone, Default)]
pub struct MatchStart<'a> {
    pub arena_match_id: &'a str,
    pub event_name: Option<&'a str>,
    pub self_seat: Option<i64>,
    pub self_team: Option<i64>,
    pub started_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MatchEnd<'a> {
    pub arena_match_id: &'a str,
    pub result: MatchResult,
    pub win_reason: Option<&'a str>,
    pub ended_at: Option<String>,
}

/// Upsert a match by its client-assigned id. Identity fields coalesce;
/// `started_at` keeps the first observed value.
pub fn upsert_match_start(c: &DB, start: &MatchStart) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "INSERT INTO matches
            (arena_match_id, event_name, self_seat, self_team, started_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (arena_match_id) DO UPDATE SET
            event_name = COALESCE(excluded.event_name, event_name),
            self_seat = COALESCE(excluded.self_seat, self_seat),
            self_team = COALESCE(excluded.self_team, self_team),
            started_at = COALESCE(started_at, excluded.started_at),
            updated_at = excluded.updated_at",
    )?;
    stmt.execute(sql_params![
        start.arena_match_id,
        start.event_name,
        start.self_seat,
        start.self_team,
        start.started_at.as_deref().unwrap_or(&now()),
        now(),
    ])?;
    Ok(())
}

/// Record the opponent once recognized. No-op for an unknown match.
pub fn update_match_opponent(
    c: &DB,
    arena_match_id: &str,
    opponent_name: Option<&str>,
    opponent_user_id: Option<&str>,
) -> Result<()> {
    let mut stmt = c.prepare_cached(
        "UPDATE matches SET
            opponent_name = COALESCE(?, opponent_name),
            opponent_user_id = COALESCE(?, opponent_user_id),
            updated_at = ?
         WHERE arena_match_id = ?",
    )?;
    stmt.execute(sql_params![opponent_name, opponent_user_id, now(), arena_match_id])?;
    Ok(())
}

/// Apply a match-end event.
///
/// Both the business telemetry and the final room state report ends, and a
/// match may see either or both. The event run's win/loss record is bumped
/// only when the stored result transitions out of `unknown`, so a second
/// report can refine the result but can never double-count. Returns the
/// bumped result when a transition happened.
pub fn update_match_end(c: &DB, end: &MatchEnd) -> Result<Option<MatchResult>> {
    // The end may be the first evidence of this match (e.g. the log rotated
    // mid-match); make sure the row exists before inspecting it.
    upsert_match_start(
        c,
        &MatchStart {
            arena_match_id: end.arena_match_id,
            started_at: end.ended_at.clone(),
            ..Default::default()
        },
    )?;

    let (prior, event_name): (MatchResult, Option<String>) = c
        .prepare_cached("SELECT result, event_name FROM matches WHERE arena_match_id = ?")?
        .query_row(sql_params![end.arena_match_id], |row| {
            let result: String = row.get(0)?;
            Ok((MatchResult::parse(&result), row.get(1)?))
        })?;

    // A decided result is only replaced by another decided result; an
    // unknown end never clears a win/loss already recorded.
    let next = if end.result.is_decided() { end.result } else { prior };

    c.prepare_cached(
        "UPDATE matches SET
            result = ?,
            win_reason = COALESCE(?, win_reason),
            ended_at = COALESCE(ended_at, ?),
            updated_at = ?
         WHERE arena_match_id = ?",
    )?
    .execute(sql_params![
        next.as_str(),
        end.win_reason,
        end.ended_at.as_deref().unwrap_or(&now()),
        now(),
        end.arena_match_id,
    ])?;

    if prior == MatchResult::Unknown && next.is_decided() {
        if let Some(event_name) = event_name.as_deref() {
            bump_event_run_record(c, event_name, next)?;
        }
        return Ok(Some(next));
    }
    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{open_memory, upsert_event_run, EventRunUpsert};

    fn record(c: &DB, event: &str) -> (i64, i64) {
        c.query_row(
            "SELECT wins, losses FROM event_runs WHERE event_name = ?",
            [event],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap()
    }

    #[test]
    fn test_end_bumps_event_record_exactly_once() {
        let c = open_memory().unwrap();
        upsert_event_run(
            &c,
            &EventRunUpsert {
                event_name: "QuickDraft_FIN_20250619",
                ..Default::default()
            },
        )
        .unwrap();
        upsert_match_start(
            &c,
            &MatchStart {
                arena_match_id: "M1",
                event_name: Some("QuickDraft_FIN_20250619"),
                self_seat: Some(1),
                self_team: Some(1),
                ..Default::default()
            },
        )
        .unwrap();

        // Business end first.
        let bumped = update_match_end(
            &c,
            &MatchEnd {
                arena_match_id: "M1",
                result: MatchResult::Win,
                win_reason: Some("Game_DefeatedAll"),
                ended_at: None,
            },
        )
        .unwrap();
        assert_eq!(bumped, Some(MatchResult::Win));
        assert_eq!(record(&c, "QuickDraft_FIN_20250619"), (1, 0));

        // Room-state completion for the same match refines but cannot
        // double-count, even when it disagrees.
        let bumped = update_match_end(
            &c,
            &MatchEnd {
                arena_match_id: "M1",
                result: MatchResult::Loss,
                win_reason: None,
                ended_at: None,
            },
        )
        .unwrap();
        assert_eq!(bumped, None);
        assert_eq!(record(&c, "QuickDraft_FIN_20250619"), (1, 0));

        let result: String = c
            .query_row("SELECT result FROM matches WHERE arena_match_id = 'M1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(result, "loss");
    }

    #[test]
    fn test_unknown_end_never_clears_decided_result() {
        let c = open_memory().unwrap();
        update_match_end(
            &c,
            &MatchEnd {
                arena_match_id: "M2",
                result: MatchResult::Win,
                win_reason: None,
                ended_at: Some("2025-06-19T11:00:00Z".to_string()),
            },
        )
        .unwrap();
        update_match_end(
            &c,
            &MatchEnd {
                arena_match_id: "M2",
                result: MatchResult::Unknown,
                win_reason: None,
                ended_at: Some("2025-06-19T12:00:00Z".to_string()),
            },
        )
        .unwrap();

        let (result, ended_at): (String, String) = c
            .query_row(
                "SELECT result, ended_at FROM matches WHERE arena_match_id = 'M2'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(result, "win");
        // ended_at keeps its first-set value.
        assert_eq!(ended_at, "2025-06-19T11:00:00Z");
    }

    #[test]
    fn test_started_at_never_regresses() {
        let c = open_memory().unwrap();
        upsert_match_start(
            &c,
            &MatchStart {
                arena_match_id: "M3",
                started_at: Some("2025-06-19T10:00:00Z".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        upsert_match_start(
            &c,
            &MatchStart {
                arena_match_id: "M3",
                event_name: Some("Ladder"),
                started_at: Some("2025-06-19T10:05:00Z".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let (started, event): (String, String) = c
            .query_row(
                "SELECT started_at, event_name FROM matches WHERE arena_match_id = 'M3'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(started, "2025-06-19T10:00:00Z");
        assert_eq!(event, "Ladder");
    }
}
