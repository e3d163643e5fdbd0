//! ONNX Runtime T5 encoder/decoder pair.
//!
//! Uses the `encoder_model.onnx` / `decoder_model.onnx` split produced by an
//! Optimum export. The decoder is re-run over the whole prefix each step.

use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use crate::checkpoint::CheckpointLayout;
use crate::generation::Seq2Seq;

/// Encoder hidden states for a single input: `[1, seq_len, hidden_dim]`.
pub struct EncoderOutput {
    hidden: Vec<f32>,
    seq_len: usize,
    hidden_dim: usize,
}

impl EncoderOutput {
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }
}

/// T5 conditional-generation model split across two ONNX sessions.
pub struct T5Onnx {
    encoder: Session,
    decoder: Session,
}

impl T5Onnx {
    /// Load both sessions from a resolved checkpoint.
    pub fn load(layout: &CheckpointLayout) -> anyhow::Result<Self> {
        let encoder = Session::builder()?.commit_from_file(&layout.encoder)?;
        let decoder = Session::builder()?.commit_from_file(&layout.decoder)?;

        info!(
            encoder = %layout.encoder.display(),
            decoder = %layout.decoder.display(),
            "loaded T5 ONNX sessions"
        );
        Ok(Self { encoder, decoder })
    }
}

impl Seq2Seq for T5Onnx {
    type Encoded = EncoderOutput;

    fn encode(&mut self, input_ids: &[u32]) -> anyhow::Result<EncoderOutput> {
        anyhow::ensure!(!input_ids.is_empty(), "empty encoder input");
        let seq_len = input_ids.len();

        let ids: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let mask = vec![1i64; seq_len];
        let shape = [1i64, seq_len as i64];

        let ids_tensor = Tensor::from_array((shape, ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, mask.into_boxed_slice()))?;

        let outputs = self.encoder.run(ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
        ])?;

        // last_hidden_state: [1, seq_len, hidden_dim].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] == 1 && dims[1] as usize == seq_len,
            "unexpected encoder output shape: {dims:?}, expected [1, {seq_len}, _]"
        );

        Ok(EncoderOutput {
            hidden: output_data.to_vec(),
            seq_len,
            hidden_dim: dims[2] as usize,
        })
    }

    // TODO: switch to decoder_with_past_model.onnx and carry the KV cache
    // between steps instead of re-running the full prefix.
    fn decode_step(
        &mut self,
        encoded: &EncoderOutput,
        decoder_ids: &[Vec<u32>],
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        let batch_size = decoder_ids.len();
        let dec_len = decoder_ids.first().map(Vec::len).unwrap_or(0);
        anyhow::ensure!(batch_size > 0 && dec_len > 0, "empty decoder input");
        anyhow::ensure!(
            decoder_ids.iter().all(|seq| seq.len() == dec_len),
            "decoder sequences must share one length"
        );

        let mut input_ids = Vec::with_capacity(batch_size * dec_len);
        for seq in decoder_ids {
            input_ids.extend(seq.iter().map(|&id| id as i64));
        }

        // Every beam attends to the same encoder states.
        let enc_len = encoded.seq_len;
        let encoder_mask = vec![1i64; batch_size * enc_len];
        let mut hidden = Vec::with_capacity(batch_size * encoded.hidden.len());
        for _ in 0..batch_size {
            hidden.extend_from_slice(&encoded.hidden);
        }

        let ids_tensor = Tensor::from_array((
            [batch_size as i64, dec_len as i64],
            input_ids.into_boxed_slice(),
        ))?;
        let mask_tensor = Tensor::from_array((
            [batch_size as i64, enc_len as i64],
            encoder_mask.into_boxed_slice(),
        ))?;
        let hidden_tensor = Tensor::from_array((
            [batch_size as i64, enc_len as i64, encoded.hidden_dim as i64],
            hidden.into_boxed_slice(),
        ))?;

        let outputs = self.decoder.run(ort::inputs![
            "input_ids" => ids_tensor,
            "encoder_attention_mask" => mask_tensor,
            "encoder_hidden_states" => hidden_tensor,
        ])?;

        // logits: [batch_size, dec_len, vocab_size].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size && dims[1] as usize == dec_len,
            "unexpected decoder output shape: {dims:?}, expected [{batch_size}, {dec_len}, _]"
        );
        let vocab_size = dims[2] as usize;

        let rows = (0..batch_size)
            .map(|b| {
                let offset = (b * dec_len + dec_len - 1) * vocab_size;
                output_data[offset..offset + vocab_size].to_vec()
            })
            .collect();
        Ok(rows)
    }
}
