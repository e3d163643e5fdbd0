//! Endpoint handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use precis_core::{GenerationParams, HealthResponse, SummaryResponse, SummaryStats};
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::SummarizeInput;

/// `POST /summarize/`
pub async fn summarize_article(
    State(state): State<AppState>,
    input: SummarizeInput,
) -> Result<Json<SummaryResponse>, ApiError> {
    let text = input.text()?;
    let params = GenerationParams::resolve(&input.params, &state.generation)?;

    info!(
        chars = text.chars().count(),
        max_length = params.max_length,
        min_length = params.min_length,
        num_beams = params.num_beams,
        "summarize request"
    );

    let summary = state.backend.summarize(text.to_owned(), params).await?;
    let stats = SummaryStats::compute(text, &summary);

    info!(
        original_length = stats.original_length,
        summary_length = stats.summary_length,
        compression_ratio = stats.compression_ratio,
        "summary generated"
    );
    Ok(Json(SummaryResponse::new(summary, stats, params)))
}

/// `GET /health/`
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.backend.ensure_loaded().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::healthy())),
        Err(e) => {
            warn!(error = %e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse::unhealthy(e.to_string())),
            )
        }
    }
}
