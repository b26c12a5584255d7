//! Greedy autoregressive decoding.
//!
//! The loop reruns the full decoder over the entire sequence-so-far on every
//! step; there is no key/value cache, so cost grows quadratically with the
//! number of steps. That recompute is the correctness baseline: any cached
//! variant has to reproduce its outputs exactly.

use candle_core::{DType, Result, Tensor, D};

use crate::decoder::{Decoder, EncoderContext};

/// Caller-supplied bounds and special ids for a decode.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    /// Id seeding the sequence; stripped from the returned output.
    pub start_id: u32,
    /// Id that terminates the decode when produced.
    pub end_id: u32,
    /// Upper bound on generated tokens, guarding against a model that never
    /// emits the end id.
    pub max_steps: usize,
}

/// Explicit decode state threaded through [`decode_step`].
#[derive(Debug, Clone)]
pub struct GenerationState {
    ids: Vec<u32>,
    steps: usize,
    finished: bool,
}

impl GenerationState {
    /// Start a fresh sequence holding only the start token.
    pub fn new(start_id: u32) -> Self {
        Self {
            ids: vec![start_id],
            steps: 0,
            finished: false,
        }
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Append a generated id, marking the state finished when it is `end_id`.
    pub fn push(&mut self, id: u32, end_id: u32) {
        self.ids.push(id);
        self.steps += 1;
        if id == end_id {
            self.finished = true;
        }
    }

    /// The `(1, len)` id tensor for the next decoder call.
    pub fn decoder_input(&self, device: &candle_core::Device) -> Result<Tensor> {
        Tensor::from_vec(self.ids.clone(), (1, self.ids.len()), device)
    }

    /// The decoder-side padding mask: generated tokens are never padding, so
    /// this is all-ones at the current length.
    pub fn padding_mask(&self, device: &candle_core::Device) -> Result<Tensor> {
        Tensor::ones((1, self.ids.len()), DType::U8, device)
    }

    /// The generated ids with the initial start token removed.
    pub fn into_output(self) -> Vec<u32> {
        self.ids.into_iter().skip(1).collect()
    }
}

/// Run one transition: full decoder forward over the current sequence, greedy
/// argmax over the last position's logits.
pub fn decode_step(
    decoder: &Decoder,
    state: &GenerationState,
    context: Option<&EncoderContext>,
) -> Result<u32> {
    let device = decoder.device();
    let input = state.decoder_input(device)?;
    let mask = state.padding_mask(device)?;

    let logits = decoder.forward(&input, Some(&mask), context, false)?;
    let last = logits.narrow(1, state.len() - 1, 1)?.squeeze(1)?;
    let next = last.argmax(D::Minus1)?.to_vec1::<u32>()?;
    Ok(next[0])
}

/// Drive [`decode_step`] until the end id appears or the step budget runs
/// out. The budget is additionally clamped so the sequence never outgrows
/// the decoder's configured maximum length.
pub fn greedy_decode(
    decoder: &Decoder,
    context: Option<&EncoderContext>,
    options: &GenerationOptions,
) -> Result<Vec<u32>> {
    let mut state = GenerationState::new(options.start_id);
    let capacity = decoder.config().max_seq_len.saturating_sub(state.len());
    let budget = options.max_steps.min(capacity);

    while state.steps() < budget && !state.is_finished() {
        let next = decode_step(decoder, &state, context)?;
        state.push(next, options.end_id);
    }

    log::debug!(
        "greedy decode stopped after {} step(s), end token {}",
        state.steps(),
        if state.is_finished() { "seen" } else { "not seen" },
    );
    Ok(state.into_output())
}
