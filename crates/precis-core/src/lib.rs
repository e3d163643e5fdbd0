pub mod config;
pub mod params;
pub mod stats;
pub mod text;
pub mod wire;

pub use config::{Config, ConfigError, GenerationSettings, ModelSettings, ServerSettings};
pub use params::{GenerationParams, ParamError, RawParams};
pub use stats::SummaryStats;
pub use text::{preprocess_text, with_task_prefix, word_count};
pub use wire::{ErrorBody, HealthResponse, SummarizeRequest, SummaryResponse};
