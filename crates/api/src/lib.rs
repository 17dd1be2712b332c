//! The read surface: a small axum app over the tracker database, plus
//! optional static serving of a built frontend.

mod error;
mod handlers;

use anyhow::Context;
use axum::routing::get;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

pub struct App {
    db_path: PathBuf,
    enricher: enrich::Enricher,
}

impl App {
    /// Handlers read through short-lived read-only connections; the single
    /// write connection stays with whoever is ingesting.
    fn read_db(&self) -> anyhow::Result<store::DB> {
        store::open_read_only(&self.db_path)
            .with_context(|| format!("opening {} read-only", self.db_path.display()))
    }
}

pub fn build_router(db_path: PathBuf, web_dist: Option<PathBuf>) -> anyhow::Result<axum::Router> {
    // The enrichment cache writes through its own connection; opening it
    // also runs migrations so `serve` works against a fresh database.
    let cache = store::open(&db_path)
        .with_context(|| format!("opening tracker database {}", db_path.display()))?;
    let app = Arc::new(App {
        db_path,
        enricher: enrich::Enricher::new(cache),
    });

    let mut router = axum::Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/overview", get(handlers::overview))
        .route("/api/matches", get(handlers::matches))
        .route("/api/matches/:id", get(handlers::match_detail))
        .route("/api/matches/:id/timeline", get(handlers::match_timeline))
        .route("/api/decks", get(handlers::decks))
        .route("/api/decks/:id", get(handlers::deck_detail))
        .route("/api/drafts", get(handlers::drafts))
        .route("/api/drafts/:id/picks", get(handlers::draft_picks))
        .with_state(app);

    if let Some(web_dist) = web_dist {
        router = router.fallback_service(ServeDir::new(web_dist));
    }

    Ok(router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()))
}

pub async fn serve(
    addr: SocketAddr,
    db_path: PathBuf,
    web_dist: Option<PathBuf>,
) -> anyhow::Result<()> {
    let router = build_router(db_path, web_dist)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, "serving read API");
    axum::serve(listener, router).await.context("serving API")
}
