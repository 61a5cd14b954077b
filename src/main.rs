use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

use prediction_engine::config::EngineConfig;
use prediction_engine::engine::PredictionEngine;
use prediction_engine::sources::alphavantage::AlphaVantageClient;
use prediction_engine::sources::openai::OpenAiClient;
use prediction_engine::sources::reddit::RedditClient;
use prediction_engine::sources::twitter::TwitterClient;

/// Application state shared across handlers
pub struct AppState {
    pub engine: PredictionEngine,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting Prediction Engine...");

    let config = EngineConfig::from_env();

    let alpha_vantage_key = require_env("ALPHA_VANTAGE_API_KEY");
    let twitter_token = require_env("TWITTER_BEARER_TOKEN");
    let openai_key = require_env("OPENAI_API_KEY");

    let influencers = std::env::var("TWITTER_INFLUENCERS")
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let historical = Arc::new(AlphaVantageClient::new(alpha_vantage_key));
    info!("✓ Alpha Vantage client initialized");

    let twitter = Arc::new(TwitterClient::new(twitter_token, influencers));
    info!("✓ Twitter client initialized");

    let reddit = Arc::new(RedditClient::new());
    info!("✓ Reddit client initialized");

    let sentiment = Arc::new(OpenAiClient::new(openai_key));
    info!("✓ OpenAI client initialized");

    let engine = PredictionEngine::new(historical, twitter, reddit, sentiment, config);
    let state = Arc::new(AppState { engine });

    // Build router
    let app = Router::new()
        .route("/predict", post(handlers::predict))
        .route("/health", get(handlers::health_check))
        .route("/reset", post(handlers::reset_breakers))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🚀 Prediction Engine listening on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Read a required credential, warning loudly when absent so the service
/// still starts for local work against mocks.
fn require_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        warn!("⚠ {} not set, requests to that source will fail", key);
        String::new()
    })
}

mod handlers;
