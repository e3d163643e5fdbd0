//! AI inference layer: checkpoint discovery, beam-search decoding, and the
//! ONNX Runtime T5 summarizer.

pub mod checkpoint;
mod error;
pub mod generation;

pub use checkpoint::{CheckpointLayout, ModelConfig};
pub use error::ModelError;
pub use generation::{DecodingConfig, Seq2Seq, SpecialTokens, generate};

#[cfg(feature = "onnx")]
mod seq2seq;
#[cfg(feature = "onnx")]
mod summarizer;
#[cfg(feature = "onnx")]
pub use seq2seq::{EncoderOutput, T5Onnx};
#[cfg(feature = "onnx")]
pub use summarizer::{Summarizer, SummarizerOptions};
