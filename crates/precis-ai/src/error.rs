use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model checkpoint not found at {0}")]
    CheckpointNotFound(PathBuf),

    #[error("{file} not found in checkpoint {dir}")]
    MissingFile { file: &'static str, dir: PathBuf },

    #[error("invalid model config {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl ModelError {
    /// True when the checkpoint directory or one of its files is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CheckpointNotFound(_) | Self::MissingFile { .. })
    }
}
