//! JSON bodies exchanged between the summarization server and its clients.

use serde::{Deserialize, Serialize};

use crate::params::GenerationParams;
use crate::stats::SummaryStats;

/// `POST /summarize/` body as sent by `precis-client` and the CLI.
///
/// The server accepts looser input than this (string numbers, form data);
/// this struct is the canonical client-side shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_beams: Option<i64>,
}

/// `POST /summarize/` success body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub original_length: usize,
    pub summary_length: usize,
    pub compression_ratio: f64,
    pub parameters: GenerationParams,
}

impl SummaryResponse {
    pub fn new(summary: String, stats: SummaryStats, parameters: GenerationParams) -> Self {
        Self {
            summary,
            original_length: stats.original_length,
            summary_length: stats.summary_length,
            compression_ratio: stats.compression_ratio,
            parameters,
        }
    }
}

/// `GET /health/` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            model_loaded: true,
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            model_loaded: false,
            error: Some(error.into()),
        }
    }
}

/// Body of every non-health error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
