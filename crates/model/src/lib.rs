//! Transformer encoder/decoder stacks and the greedy generation loop.
//!
//! The stacks assemble the attention and embedding crates into the two
//! forward interfaces of the system: encoder ids → contextual
//! representations, decoder ids → vocabulary logits (language-model or
//! seq2seq, fixed at construction). `generate` drives a decoder token by
//! token with greedy argmax selection.

pub mod block;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod feed_forward;
pub mod generate;

pub use config::ModelConfig;
pub use decoder::{Decoder, DecoderMode, EncoderContext};
pub use encoder::Encoder;
pub use generate::{decode_step, greedy_decode, GenerationOptions, GenerationState};
