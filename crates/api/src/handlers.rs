use crate::{ApiError, App};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use store::queries::{
    self, DeckDetail, DeckScope, DeckSummary, DraftPickRow, DraftSessionSummary, MatchDetail,
    MatchFilter, MatchSummary, Overview,
};

/// Run a read-only query off the async runtime's worker threads.
async fn query<T, F>(app: &Arc<App>, run: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&store::DB) -> store::Result<T> + Send + 'static,
{
    let app = app.clone();
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<T> {
        let db = app.read_db()?;
        Ok(run(&db)?)
    })
    .await
    .map_err(anyhow::Error::from)??;
    Ok(result)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Deserialize)]
pub struct OverviewParams {
    recent: Option<i64>,
}

pub async fn overview(
    State(app): State<Arc<App>>,
    Query(params): Query<OverviewParams>,
) -> Result<Json<Overview>, ApiError> {
    let recent = params.recent.unwrap_or(10).clamp(0, 100);
    let overview = query(&app, move |db| queries::overview(db, recent)).await?;
    Ok(Json(overview))
}

#[derive(Deserialize)]
pub struct MatchesParams {
    limit: Option<i64>,
    event: Option<String>,
    result: Option<String>,
}

pub async fn matches(
    State(app): State<Arc<App>>,
    Query(params): Query<MatchesParams>,
) -> Result<Json<Vec<MatchSummary>>, ApiError> {
    let rows = query(&app, move |db| {
        queries::list_matches(
            db,
            &MatchFilter {
                limit: params.limit.map(|l| l.clamp(1, 500)),
                event: params.event.as_deref(),
                result: params.result.as_deref(),
            },
        )
    })
    .await?;
    Ok(Json(rows))
}

pub async fn match_detail(
    State(app): State<Arc<App>>,
    Path(id): Path<i64>,
) -> Result<Json<MatchDetail>, ApiError> {
    let mut detail = query(&app, move |db| queries::match_detail(db, id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("match {}", id)))?;

    let mut wanted: Vec<i64> = detail
        .plays
        .iter()
        .filter(|p| p.card_name.is_none())
        .map(|p| p.grp_id)
        .chain(
            detail
                .opponent_cards
                .iter()
                .filter(|c| c.card_name.is_none())
                .map(|c| c.grp_id),
        )
        .collect();
    wanted.sort_unstable();
    wanted.dedup();
    let names = app.enricher.resolve(&wanted).await;

    fill_play_names(&mut detail.plays, &names);
    for card in &mut detail.opponent_cards {
        if card.card_name.is_none() {
            card.card_name = names.get(&card.grp_id).cloned();
        }
    }
    Ok(Json(detail))
}

pub async fn match_timeline(
    State(app): State<Arc<App>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<queries::CardPlayRow>>, ApiError> {
    let mut plays = query(&app, move |db| queries::match_timeline(db, id)).await?;

    let wanted: Vec<i64> = plays
        .iter()
        .filter(|p| p.card_name.is_none())
        .map(|p| p.grp_id)
        .collect();
    let names = app.enricher.resolve(&wanted).await;
    fill_play_names(&mut plays, &names);
    Ok(Json(plays))
}

fn fill_play_names(plays: &mut [queries::CardPlayRow], names: &HashMap<i64, String>) {
    for play in plays {
        if play.card_name.is_none() {
            play.card_name = names.get(&play.grp_id).cloned();
        }
    }
}

#[derive(Deserialize)]
pub struct DecksParams {
    scope: Option<String>,
}

pub async fn decks(
    State(app): State<Arc<App>>,
    Query(params): Query<DecksParams>,
) -> Result<Json<Vec<DeckSummary>>, ApiError> {
    let scope = match params.scope.as_deref() {
        None => DeckScope::All,
        Some(raw) => DeckScope::parse(raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown deck scope: {:?}", raw)))?,
    };
    let rows = query(&app, move |db| queries::list_decks(db, scope)).await?;
    Ok(Json(rows))
}

pub async fn deck_detail(
    State(app): State<Arc<App>>,
    Path(id): Path<i64>,
) -> Result<Json<DeckDetail>, ApiError> {
    let mut detail = query(&app, move |db| queries::deck_detail(db, id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("deck {}", id)))?;

    let wanted: Vec<i64> = detail
        .cards
        .iter()
        .filter(|c| c.card_name.is_none())
        .map(|c| c.card_id)
        .collect();
    let names = app.enricher.resolve(&wanted).await;
    for card in &mut detail.cards {
        if card.card_name.is_none() {
            card.card_name = names.get(&card.card_id).cloned();
        }
    }
    Ok(Json(detail))
}

pub async fn drafts(
    State(app): State<Arc<App>>,
) -> Result<Json<Vec<DraftSessionSummary>>, ApiError> {
    let rows = query(&app, |db| queries::list_drafts(db)).await?;
    Ok(Json(rows))
}

pub async fn draft_picks(
    State(app): State<Arc<App>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<DraftPickRow>>, ApiError> {
    let rows = query(&app, move |db| queries::draft_picks(db, id)).await?;
    Ok(Json(rows))
}
