//! Checkpoint directory layout for an ONNX-exported T5 summarization model.
//!
//! The directory is the output of a Hugging Face Optimum export:
//!
//! ```text
//! checkpoint/
//!   encoder_model.onnx
//!   decoder_model.onnx
//!   tokenizer.json
//!   config.json
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ModelError;
use crate::generation::SpecialTokens;

pub const ENCODER_FILE: &str = "encoder_model.onnx";
pub const DECODER_FILE: &str = "decoder_model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CONFIG_FILE: &str = "config.json";

/// Resolved paths of every file the summarizer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointLayout {
    pub dir: PathBuf,
    pub encoder: PathBuf,
    pub decoder: PathBuf,
    pub tokenizer: PathBuf,
    pub config: PathBuf,
}

impl CheckpointLayout {
    /// Check that `dir` exists and holds all required files.
    pub fn resolve(dir: &Path) -> Result<Self, ModelError> {
        if !dir.is_dir() {
            return Err(ModelError::CheckpointNotFound(dir.to_path_buf()));
        }
        let require = |file: &'static str| -> Result<PathBuf, ModelError> {
            let path = dir.join(file);
            if path.is_file() {
                Ok(path)
            } else {
                Err(ModelError::MissingFile {
                    file,
                    dir: dir.to_path_buf(),
                })
            }
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            encoder: require(ENCODER_FILE)?,
            decoder: require(DECODER_FILE)?,
            tokenizer: require(TOKENIZER_FILE)?,
            config: require(CONFIG_FILE)?,
        })
    }
}

/// The subset of `config.json` the decoder loop needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub model_type: Option<String>,

    pub vocab_size: usize,

    #[serde(default)]
    pub decoder_start_token_id: Option<u32>,

    #[serde(default = "default_eos_token_id")]
    pub eos_token_id: u32,

    #[serde(default)]
    pub pad_token_id: u32,
}

fn default_eos_token_id() -> u32 {
    1
}

impl ModelConfig {
    /// Parse `config.json`.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ModelError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Token ids that drive decoding. T5 starts decoding from the pad token
    /// when no explicit start id is configured.
    pub fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            decoder_start: self.decoder_start_token_id.unwrap_or(self.pad_token_id),
            eos: self.eos_token_id,
            pad: self.pad_token_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T5_CONFIG: &str = r#"{
        "architectures": ["T5ForConditionalGeneration"],
        "d_model": 512,
        "decoder_start_token_id": 0,
        "eos_token_id": 1,
        "model_type": "t5",
        "pad_token_id": 0,
        "vocab_size": 32128
    }"#;

    fn write_checkpoint(dir: &Path, skip: Option<&str>) {
        for file in [ENCODER_FILE, DECODER_FILE, TOKENIZER_FILE] {
            if Some(file) != skip {
                std::fs::write(dir.join(file), b"stub").unwrap();
            }
        }
        if Some(CONFIG_FILE) != skip {
            std::fs::write(dir.join(CONFIG_FILE), T5_CONFIG).unwrap();
        }
    }

    #[test]
    fn resolves_complete_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        write_checkpoint(tmp.path(), None);

        let layout = CheckpointLayout::resolve(tmp.path()).unwrap();
        assert_eq!(layout.encoder, tmp.path().join(ENCODER_FILE));
        assert_eq!(layout.config, tmp.path().join(CONFIG_FILE));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CheckpointLayout::resolve(&tmp.path().join("checkpoint-1878")).unwrap_err();
        assert!(matches!(err, ModelError::CheckpointNotFound(_)));
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("Model checkpoint not found at"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        write_checkpoint(tmp.path(), Some(DECODER_FILE));

        let err = CheckpointLayout::resolve(tmp.path()).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains(DECODER_FILE));
    }

    #[test]
    fn parses_t5_config() {
        let tmp = tempfile::tempdir().unwrap();
        write_checkpoint(tmp.path(), None);

        let config = ModelConfig::from_file(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.vocab_size, 32128);
        assert_eq!(config.model_type.as_deref(), Some("t5"));

        let special = config.special_tokens();
        assert_eq!(special.decoder_start, 0);
        assert_eq!(special.eos, 1);
        assert_eq!(special.pad, 0);
    }

    #[test]
    fn start_token_falls_back_to_pad() {
        let config: ModelConfig =
            serde_json::from_str(r#"{"vocab_size": 100, "pad_token_id": 3}"#).unwrap();
        assert_eq!(config.special_tokens().decoder_start, 3);
        assert_eq!(config.special_tokens().eos, 1);
    }

    #[test]
    fn malformed_config_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = ModelConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ModelError::Config { .. }));
        assert!(!err.is_not_found());
    }
}
