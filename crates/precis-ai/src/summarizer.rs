//! Text-in, summary-out pipeline over the ONNX T5 model.

use std::path::Path;
use std::time::Instant;

use precis_core::{ModelSettings, preprocess_text, with_task_prefix};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::checkpoint::{CheckpointLayout, ModelConfig};
use crate::error::ModelError;
use crate::generation::{DecodingConfig, SpecialTokens, generate};
use crate::seq2seq::T5Onnx;

/// Input shaping applied before the encoder.
#[derive(Debug, Clone)]
pub struct SummarizerOptions {
    pub max_input_tokens: usize,
    pub task_prefix: String,
}

impl From<&ModelSettings> for SummarizerOptions {
    fn from(settings: &ModelSettings) -> Self {
        Self {
            max_input_tokens: settings.max_input_tokens,
            task_prefix: settings.task_prefix.clone(),
        }
    }
}

/// A loaded checkpoint: tokenizer, encoder/decoder sessions and special ids.
pub struct Summarizer {
    model: T5Onnx,
    tokenizer: Tokenizer,
    special: SpecialTokens,
    options: SummarizerOptions,
}

impl Summarizer {
    /// Load a summarization checkpoint directory.
    pub fn load(dir: &Path, options: SummarizerOptions) -> Result<Self, ModelError> {
        let started = Instant::now();
        let layout = CheckpointLayout::resolve(dir)?;
        let config = ModelConfig::from_file(&layout.config)?;

        let model = T5Onnx::load(&layout)?;

        let mut tokenizer = Tokenizer::from_file(&layout.tokenizer)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        // Encoder inputs beyond the model's context are cut, keeping the trailing EOS.
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: options.max_input_tokens,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
        tokenizer.with_padding(None);

        info!(
            checkpoint = %dir.display(),
            model_type = config.model_type.as_deref().unwrap_or("unknown"),
            vocab_size = config.vocab_size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded summarization model"
        );
        Ok(Self {
            model,
            tokenizer,
            special: config.special_tokens(),
            options,
        })
    }

    /// Summarize `text` with the given decoding settings.
    pub fn summarize(&mut self, text: &str, decoding: &DecodingConfig) -> anyhow::Result<String> {
        let started = Instant::now();
        let processed = preprocess_text(text, self.options.max_input_tokens);
        let input = with_task_prefix(&self.options.task_prefix, processed);

        let encoding = self
            .tokenizer
            .encode(input, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let input_ids = encoding.get_ids();

        let output_ids = generate(&mut self.model, input_ids, decoding, &self.special)?;

        let summary = self
            .tokenizer
            .decode(&output_ids, true)
            .map_err(|e| anyhow::anyhow!("decode: {e}"))?;

        debug!(
            input_tokens = input_ids.len(),
            output_tokens = output_ids.len(),
            num_beams = decoding.num_beams,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated summary"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precis_core::{GenerationParams, GenerationSettings};
    use std::path::PathBuf;

    fn model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("checkpoint")
    }

    fn require_model() -> PathBuf {
        let dir = model_dir();
        if !dir.join("encoder_model.onnx").exists() {
            panic!(
                "Model not found. Export a T5 summarization checkpoint with Optimum:\n  \
                 optimum-cli export onnx --model t5-small \
                 --task text2text-generation models/checkpoint"
            );
        }
        dir
    }

    fn options() -> SummarizerOptions {
        SummarizerOptions::from(&ModelSettings::default())
    }

    fn decoding(max_length: usize, min_length: usize, num_beams: usize) -> DecodingConfig {
        DecodingConfig::new(
            &GenerationParams {
                max_length,
                min_length,
                num_beams,
            },
            &GenerationSettings::default(),
        )
    }

    const ARTICLE: &str = "The city council voted on Tuesday to expand the bus network \
        into the northern suburbs. The plan adds four new routes and extends evening \
        service until midnight. Officials said the expansion would be funded by a \
        regional transport grant and would begin in the spring. Residents had \
        petitioned for better connections for more than two years.";

    #[test]
    fn missing_checkpoint_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Summarizer::load(&tmp.path().join("absent"), options())
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    #[ignore = "requires an exported checkpoint under models/checkpoint"]
    fn summarizes_article() {
        let dir = require_model();
        let mut summarizer = Summarizer::load(&dir, options()).unwrap();
        let summary = summarizer.summarize(ARTICLE, &decoding(60, 5, 4)).unwrap();
        assert!(!summary.is_empty());
        assert!(summary.split_whitespace().count() < ARTICLE.split_whitespace().count());
    }

    #[test]
    #[ignore = "requires an exported checkpoint under models/checkpoint"]
    fn greedy_and_beam_both_work() {
        let dir = require_model();
        let mut summarizer = Summarizer::load(&dir, options()).unwrap();
        let greedy = summarizer.summarize(ARTICLE, &decoding(40, 5, 1)).unwrap();
        let beam = summarizer.summarize(ARTICLE, &decoding(40, 5, 3)).unwrap();
        assert!(!greedy.is_empty());
        assert!(!beam.is_empty());
    }

    #[test]
    #[ignore = "requires an exported checkpoint under models/checkpoint"]
    fn whitespace_only_input_still_generates() {
        let dir = require_model();
        let mut summarizer = Summarizer::load(&dir, options()).unwrap();
        assert!(summarizer.summarize("   ", &decoding(20, 0, 2)).is_ok());
    }
}
