//! Autoregressive decoding for encoder-decoder models.
//!
//! Implements greedy search and beam search with the usual seq2seq controls:
//! minimum length (EOS is masked until reached), n-gram blocking, a length
//! penalty on finished hypotheses, and early stopping. The model is reached
//! only through [`Seq2Seq`], so the search runs unchanged against ONNX
//! Runtime or a test double.
//!
//! Lengths count the decoder start token, so `max_length = 200` yields at most
//! 199 generated tokens.

use precis_core::{GenerationParams, GenerationSettings};

/// Score given to the initially-duplicated beams so only beam 0 expands first.
const INACTIVE_BEAM_SCORE: f32 = -1e9;

/// An encoder-decoder model reduced to the two calls decoding needs.
pub trait Seq2Seq {
    /// Encoder output, computed once per input and reused every step.
    type Encoded;

    /// Run the encoder over one tokenized input.
    fn encode(&mut self, input_ids: &[u32]) -> anyhow::Result<Self::Encoded>;

    /// Next-token logits for each decoder sequence.
    ///
    /// All sequences have the same length. Returns one vocabulary-sized row
    /// per sequence, taken at the last position.
    fn decode_step(
        &mut self,
        encoded: &Self::Encoded,
        decoder_ids: &[Vec<u32>],
    ) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Token ids with special meaning during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub decoder_start: u32,
    pub eos: u32,
    pub pad: u32,
}

/// Search settings for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingConfig {
    pub max_length: usize,
    pub min_length: usize,
    pub num_beams: usize,
    /// Block any n-gram of this size from appearing twice; `0` disables.
    pub no_repeat_ngram_size: usize,
    pub length_penalty: f32,
    pub early_stopping: bool,
}

impl DecodingConfig {
    /// Combine validated request parameters with the service-wide settings.
    pub fn new(params: &GenerationParams, settings: &GenerationSettings) -> Self {
        Self {
            max_length: params.max_length,
            min_length: params.min_length,
            num_beams: params.num_beams,
            no_repeat_ngram_size: settings.no_repeat_ngram_size,
            length_penalty: settings.length_penalty,
            early_stopping: settings.early_stopping,
        }
    }
}

/// Generate output token ids for `input_ids`.
///
/// The returned ids exclude the decoder start token and the final EOS.
pub fn generate<M: Seq2Seq>(
    model: &mut M,
    input_ids: &[u32],
    config: &DecodingConfig,
    special: &SpecialTokens,
) -> anyhow::Result<Vec<u32>> {
    anyhow::ensure!(config.num_beams >= 1, "num_beams must be at least 1");
    let encoded = model.encode(input_ids)?;
    let sequence = if config.num_beams == 1 {
        greedy_search(model, &encoded, config, special)?
    } else {
        beam_search(model, &encoded, config, special)?
    };
    Ok(sequence.into_iter().skip(1).collect())
}

fn greedy_search<M: Seq2Seq>(
    model: &mut M,
    encoded: &M::Encoded,
    config: &DecodingConfig,
    special: &SpecialTokens,
) -> anyhow::Result<Vec<u32>> {
    let mut tokens = vec![special.decoder_start];

    while tokens.len() < config.max_length {
        let mut logits = single_row(model.decode_step(encoded, std::slice::from_ref(&tokens))?)?;
        apply_constraints(&mut logits, &tokens, config, special);

        let Some(next) = argmax(&logits) else {
            break;
        };
        if next == special.eos {
            break;
        }
        tokens.push(next);
    }

    Ok(tokens)
}

#[derive(Debug, Clone)]
struct Beam {
    tokens: Vec<u32>,
    score: f32,
}

fn beam_search<M: Seq2Seq>(
    model: &mut M,
    encoded: &M::Encoded,
    config: &DecodingConfig,
    special: &SpecialTokens,
) -> anyhow::Result<Vec<u32>> {
    let num_beams = config.num_beams;
    let mut beams: Vec<Beam> = (0..num_beams)
        .map(|i| Beam {
            tokens: vec![special.decoder_start],
            score: if i == 0 { 0.0 } else { INACTIVE_BEAM_SCORE },
        })
        .collect();
    let mut hypotheses = Hypotheses::new(num_beams, config.length_penalty, config.early_stopping);
    let mut cur_len = 1;
    let mut done = false;

    while cur_len < config.max_length {
        let sequences: Vec<Vec<u32>> = beams.iter().map(|b| b.tokens.clone()).collect();
        let rows = model.decode_step(encoded, &sequences)?;
        anyhow::ensure!(
            rows.len() == beams.len(),
            "decoder returned {} rows for {} beams",
            rows.len(),
            beams.len()
        );

        // (cumulative score, beam index, token)
        let mut candidates: Vec<(f32, usize, u32)> = Vec::new();
        for (b, (beam, logits)) in beams.iter().zip(rows).enumerate() {
            let mut scores = log_softmax(&logits);
            apply_constraints(&mut scores, &beam.tokens, config, special);
            candidates.extend(
                scores
                    .iter()
                    .enumerate()
                    .map(|(tok, &s)| (beam.score + s, b, tok as u32)),
            );
        }
        let top = top_k(candidates, 2 * num_beams);
        let Some(&(best_score, _, _)) = top.first() else {
            break;
        };

        let mut next_beams = Vec::with_capacity(num_beams);
        for (rank, &(score, b, tok)) in top.iter().enumerate() {
            if tok == special.eos {
                // An EOS outside the best `num_beams` candidates is not worth keeping.
                if rank >= num_beams {
                    continue;
                }
                hypotheses.add(beams[b].tokens.clone(), score);
            } else {
                let mut tokens = beams[b].tokens.clone();
                tokens.push(tok);
                next_beams.push(Beam { tokens, score });
            }
            if next_beams.len() == num_beams {
                break;
            }
        }

        cur_len += 1;
        if hypotheses.is_done(best_score, cur_len) {
            done = true;
            break;
        }
        if next_beams.is_empty() {
            break;
        }
        beams = next_beams;
    }

    if !done {
        for beam in beams {
            hypotheses.add(beam.tokens, beam.score);
        }
    }

    hypotheses
        .best()
        .ok_or_else(|| anyhow::anyhow!("beam search produced no hypotheses"))
}

/// Finished sequences, scored with the length penalty, capped at `num_beams`.
struct Hypotheses {
    num_beams: usize,
    length_penalty: f32,
    early_stopping: bool,
    items: Vec<(f32, Vec<u32>)>,
    worst_score: f32,
}

impl Hypotheses {
    fn new(num_beams: usize, length_penalty: f32, early_stopping: bool) -> Self {
        Self {
            num_beams,
            length_penalty,
            early_stopping,
            items: Vec::with_capacity(num_beams + 1),
            worst_score: f32::INFINITY,
        }
    }

    fn penalized(&self, sum_logprobs: f32, len: usize) -> f32 {
        sum_logprobs / (len.max(1) as f32).powf(self.length_penalty)
    }

    fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32) {
        let score = self.penalized(sum_logprobs, tokens.len());
        if self.items.len() < self.num_beams || score > self.worst_score {
            self.items.push((score, tokens));
            if self.items.len() > self.num_beams {
                let worst = self
                    .items
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1.0.total_cmp(&b.1.0))
                    .map(|(i, _)| i);
                if let Some(i) = worst {
                    self.items.swap_remove(i);
                }
            }
            self.worst_score = self
                .items
                .iter()
                .map(|(s, _)| *s)
                .fold(f32::INFINITY, f32::min);
        }
    }

    /// Whether no open beam can still beat the stored hypotheses.
    fn is_done(&self, best_running_score: f32, cur_len: usize) -> bool {
        if self.items.len() < self.num_beams {
            return false;
        }
        if self.early_stopping {
            return true;
        }
        self.worst_score >= self.penalized(best_running_score, cur_len)
    }

    fn best(self) -> Option<Vec<u32>> {
        self.items
            .into_iter()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, tokens)| tokens)
    }
}

/// Mask tokens forbidden by the minimum length and n-gram rules.
fn apply_constraints(
    scores: &mut [f32],
    tokens: &[u32],
    config: &DecodingConfig,
    special: &SpecialTokens,
) {
    if tokens.len() < config.min_length {
        if let Some(s) = scores.get_mut(special.eos as usize) {
            *s = f32::NEG_INFINITY;
        }
    }
    for banned in banned_ngram_tokens(tokens, config.no_repeat_ngram_size) {
        if let Some(s) = scores.get_mut(banned as usize) {
            *s = f32::NEG_INFINITY;
        }
    }
}

/// Tokens that would complete an n-gram already present in `tokens`.
fn banned_ngram_tokens(tokens: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || tokens.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &tokens[tokens.len() + 1 - n..];
    tokens
        .windows(n)
        .filter(|w| &w[..n - 1] == prefix)
        .map(|w| w[n - 1])
        .collect()
}

fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![f32::NEG_INFINITY; logits.len()];
    }
    let log_sum = logits.iter().map(|&x| (x - max).exp()).sum::<f32>().ln() + max;
    logits.iter().map(|&x| x - log_sum).collect()
}

fn argmax(scores: &[f32]) -> Option<u32> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| **s > f32::NEG_INFINITY)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i as u32)
}

/// The `k` highest-scoring candidates, best first.
fn top_k(mut candidates: Vec<(f32, usize, u32)>, k: usize) -> Vec<(f32, usize, u32)> {
    let by_score_desc = |a: &(f32, usize, u32), b: &(f32, usize, u32)| b.0.total_cmp(&a.0);
    if candidates.len() > k && k > 0 {
        candidates.select_nth_unstable_by(k - 1, by_score_desc);
        candidates.truncate(k);
    }
    candidates.sort_by(by_score_desc);
    candidates
}

fn single_row(mut rows: Vec<Vec<f32>>) -> anyhow::Result<Vec<f32>> {
    anyhow::ensure!(rows.len() == 1, "decoder returned {} rows for one sequence", rows.len());
    Ok(rows.swap_remove(0))
}
