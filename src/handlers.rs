use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::info;

use crate::AppState;
use prediction_engine::engine::PredictOptions;
use prediction_engine::types::{CircuitState, PredictionResult, Timeframe};

/// Request body for the predict endpoint
#[derive(Debug, serde::Deserialize)]
pub struct PredictRequest {
    pub ticker: String,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default = "default_true")]
    pub include_reddit: bool,
    #[serde(default = "default_true")]
    pub include_posts: bool,
}

fn default_true() -> bool {
    true
}

/// POST /predict - Run a full multi-source prediction
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictionResult>, (StatusCode, String)> {
    let ticker = req.ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "ticker must not be empty".to_string()));
    }

    let options = PredictOptions {
        timeframe: req.timeframe,
        include_reddit: req.include_reddit,
        include_posts: req.include_posts,
    };

    let result = state.engine.predict(&ticker, options).await;
    Ok(Json(result))
}

/// GET /health - Service health and circuit breaker state
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let circuits = state.engine.circuit_snapshot();
    let degraded = circuits.iter().any(|c| c.tripped);

    Json(HealthResponse {
        status: if degraded {
            "degraded".to_string()
        } else {
            "operational".to_string()
        },
        circuits,
    })
}

/// POST /reset - Clear all tripped circuit breakers
pub async fn reset_breakers(State(state): State<Arc<AppState>>) -> Json<ResetResponse> {
    state.engine.reset_breakers();
    info!("Breaker reset requested via API");

    Json(ResetResponse {
        status: "reset".to_string(),
        circuits: state.engine.circuit_snapshot(),
    })
}

// Response types
#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub circuits: Vec<CircuitState>,
}

#[derive(Debug, serde::Serialize)]
pub struct ResetResponse {
    pub status: String,
    pub circuits: Vec<CircuitState>,
}
