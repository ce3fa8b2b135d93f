use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ai_client::{build_provider, AiConfig, AiProvider};
use woonrapport_common::Config;
use woonrapport_engine::{
    enrichment::{GeocodeSource, TravelTimeSource},
    CancelFlag, ChapterGenerator, EnrichmentSource, HttpScraper, PipelineDeps, PipelineRunner,
    ProgressBus, RunStore,
};

mod db;
mod rest;

use db::SqliteRunStore;

pub struct AppState {
    pub store: Arc<dyn RunStore>,
    pub runner: Arc<PipelineRunner>,
    pub progress: ProgressBus,
    pub provider: Arc<dyn AiProvider>,
    /// Cancel flags for runs currently executing, keyed by run id.
    pub cancels: Mutex<HashMap<Uuid, CancelFlag>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("woonrapport=info".parse()?),
        )
        .init();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.data_dir)?;

    // Provider misconfiguration (unknown key, missing credentials) is
    // fatal at startup; operational outages degrade per chapter later.
    let provider = build_provider(&AiConfig {
        provider: config.ai_provider.clone(),
        model: config.ai_model.clone(),
        base_url: config.ai_base_url.clone(),
        api_key: config.openai_api_key.clone(),
        timeout: config.ai_timeout,
    })?;

    let store = Arc::new(SqliteRunStore::connect(&config.database_url).await?);
    let progress = ProgressBus::new();

    let enrichment: Vec<Arc<dyn EnrichmentSource>> = vec![
        Arc::new(GeocodeSource::new(&config.geocode_base_url)),
        Arc::new(TravelTimeSource::new(&config.routing_base_url)),
    ];
    let runner = Arc::new(PipelineRunner::new(Arc::new(PipelineDeps {
        store: store.clone() as Arc<dyn RunStore>,
        scraper: Arc::new(HttpScraper::new(config.scrape_timeout)),
        enrichment,
        generator: ChapterGenerator::new(provider.clone(), config.ai_fallback_enabled),
        progress: progress.clone(),
        config: config.clone(),
    })));

    let state = Arc::new(AppState {
        store: store as Arc<dyn RunStore>,
        runner,
        progress,
        provider,
        cancels: Mutex::new(HashMap::new()),
    });

    let app = Router::new()
        .route("/api/health", get(rest::admin::health))
        .route("/api/runs", post(rest::runs::create_run))
        .route("/api/runs/{id}/start", post(rest::runs::start_run))
        .route("/api/runs/{id}/input", post(rest::runs::provide_input))
        .route("/api/runs/{id}/cancel", post(rest::runs::cancel_run))
        .route("/api/runs/{id}/status", get(rest::runs::run_status))
        .route("/api/runs/{id}/events", get(rest::events::run_events))
        .route("/api/runs/{id}/report", get(rest::report::run_report))
        .route("/api/admin/purge", post(rest::admin::purge_runs))
        .with_state(state)
        // Local single-user app; the browser UI may live on another port.
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("woonrapport API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
