use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use model::{Decoder, DecoderMode, Encoder, EncoderContext, ModelConfig};

fn build_config(vocab: usize, hidden: usize, head_dim: usize, layers: usize) -> ModelConfig {
    ModelConfig {
        vocab_size: vocab,
        max_seq_len: 16,
        hidden_dim: hidden,
        head_dim,
        n_heads: hidden / head_dim,
        n_layers: layers,
        dropout_p: 0.0,
    }
}

fn builder(device: &Device) -> (VarMap, VarBuilder<'static>) {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    (varmap, vb)
}

fn random_ids(device: &Device, vocab: usize, batch: usize, seq: usize) -> Result<Tensor> {
    let data: Vec<u32> = (0..batch * seq)
        .map(|_| fastrand::u32(0..vocab as u32))
        .collect();
    Ok(Tensor::from_vec(data, (batch, seq), device)?)
}

fn max_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
    Ok(a.sub(b)?.abs()?.max_all()?.to_vec0::<f32>()?)
}

#[test]
fn encoder_produces_contextual_representations() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let encoder = Encoder::new(build_config(30, 8, 4, 2), vb)?;
    let ids = random_ids(&device, 30, 2, 6)?;

    let out = encoder.forward(&ids, None, false)?;
    assert_eq!(out.dims(), &[2, 6, 8]);
    assert_eq!(out.dtype(), DType::F32);
    Ok(())
}

#[test]
fn encoder_shape_is_invariant_to_head_partitioning() -> Result<()> {
    let device = Device::Cpu;
    for &(head_dim, _heads) in &[(8usize, 1usize), (4, 2), (2, 4), (1, 8)] {
        let (_varmap, vb) = builder(&device);
        let encoder = Encoder::new(build_config(20, 8, head_dim, 1), vb)?;
        let ids = random_ids(&device, 20, 3, 5)?;
        let out = encoder.forward(&ids, None, false)?;
        assert_eq!(out.dims(), &[3, 5, 8], "head_dim {head_dim}");
    }
    Ok(())
}

#[test]
fn decoder_lm_emits_vocab_logits() -> Result<()> {
    // Decoder-only model: vocab 100, max_len 16, d_k 4, d_model 8, 2 heads,
    // 1 layer; a batch of 2 unpadded length-5 sequences.
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let decoder = Decoder::new(build_config(100, 8, 4, 1), DecoderMode::LanguageModel, vb)?;
    let ids = random_ids(&device, 100, 2, 5)?;

    let logits = decoder.forward(&ids, None, None, false)?;
    assert_eq!(logits.dims(), &[2, 5, 100]);
    Ok(())
}

#[test]
fn forward_is_deterministic_with_dropout_disabled() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let decoder = Decoder::new(build_config(40, 8, 4, 2), DecoderMode::LanguageModel, vb)?;
    let ids = random_ids(&device, 40, 2, 7)?;

    let first = decoder.forward(&ids, None, None, false)?;
    let second = decoder.forward(&ids, None, None, false)?;
    assert_eq!(max_diff(&first, &second)?, 0.0);
    Ok(())
}

#[test]
fn decoder_logits_ignore_future_tokens() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let decoder = Decoder::new(build_config(50, 8, 4, 2), DecoderMode::LanguageModel, vb)?;

    let base = Tensor::from_vec(vec![3u32, 14, 7, 21, 42], (1, 5), &device)?;
    let altered = Tensor::from_vec(vec![3u32, 14, 7, 9, 33], (1, 5), &device)?;

    let logits_base = decoder.forward(&base, None, None, false)?;
    let logits_altered = decoder.forward(&altered, None, None, false)?;

    // The first three positions share their prefix, so causal masking must
    // make their logits identical across every layer.
    let prefix_base = logits_base.narrow(1, 0, 3)?;
    let prefix_altered = logits_altered.narrow(1, 0, 3)?;
    assert!(max_diff(&prefix_base, &prefix_altered)? < 1e-6);
    Ok(())
}

#[test]
fn seq2seq_decoder_consumes_encoder_output() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let config = build_config(30, 8, 4, 1);
    let encoder = Encoder::new(config.clone(), vb.pp("encoder"))?;
    let decoder = Decoder::new(config, DecoderMode::Seq2Seq, vb.pp("decoder"))?;

    let src = random_ids(&device, 30, 2, 6)?;
    let src_mask = Tensor::ones((2, 6), DType::U8, &device)?;
    let encoded = encoder.forward(&src, Some(&src_mask), false)?;

    let tgt = random_ids(&device, 30, 2, 4)?;
    let context = EncoderContext {
        hidden: &encoded,
        padding_mask: Some(&src_mask),
    };
    let logits = decoder.forward(&tgt, None, Some(&context), false)?;
    assert_eq!(logits.dims(), &[2, 4, 30]);
    Ok(())
}

#[test]
fn padded_source_positions_cannot_reach_the_decoder() -> Result<()> {
    // Encoder sees a 6-token source whose last 2 positions are padding; the
    // content of those positions must never influence the decoder logits.
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let config = build_config(30, 8, 4, 1);
    let encoder = Encoder::new(config.clone(), vb.pp("encoder"))?;
    let decoder = Decoder::new(config, DecoderMode::Seq2Seq, vb.pp("decoder"))?;

    let src_mask = Tensor::from_vec(vec![1u32, 1, 1, 1, 0, 0], (1, 6), &device)?;
    let src_a = Tensor::from_vec(vec![5u32, 9, 2, 17, 1, 1], (1, 6), &device)?;
    let src_b = Tensor::from_vec(vec![5u32, 9, 2, 17, 22, 13], (1, 6), &device)?;

    let tgt = Tensor::from_vec(vec![4u32, 11, 3], (1, 3), &device)?;

    let mut logits = Vec::new();
    for src in [&src_a, &src_b] {
        let encoded = encoder.forward(src, Some(&src_mask), false)?;
        let context = EncoderContext {
            hidden: &encoded,
            padding_mask: Some(&src_mask),
        };
        logits.push(decoder.forward(&tgt, None, Some(&context), false)?);
    }
    assert!(max_diff(&logits[0], &logits[1])? < 1e-6);
    Ok(())
}

#[test]
fn decoder_modes_are_mutually_exclusive() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let config = build_config(20, 8, 4, 1);
    let lm = Decoder::new(config.clone(), DecoderMode::LanguageModel, vb.pp("lm"))?;
    let seq2seq = Decoder::new(config, DecoderMode::Seq2Seq, vb.pp("s2s"))?;

    let ids = random_ids(&device, 20, 1, 3)?;
    let fake_context = Tensor::zeros((1, 4, 8), DType::F32, &device)?;
    let context = EncoderContext {
        hidden: &fake_context,
        padding_mask: None,
    };

    assert!(lm.forward(&ids, None, Some(&context), false).is_err());
    assert!(seq2seq.forward(&ids, None, None, false).is_err());
    Ok(())
}

#[test]
fn invalid_dimension_combinations_fail_at_construction() {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let config = ModelConfig {
        vocab_size: 20,
        max_seq_len: 16,
        hidden_dim: 10,
        head_dim: 4,
        n_heads: 2, // 2 * 4 != 10
        n_layers: 1,
        dropout_p: 0.0,
    };
    assert!(Encoder::new(config, vb).is_err());
}

#[test]
fn overlong_sequences_fail_fast() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let decoder = Decoder::new(build_config(20, 8, 4, 1), DecoderMode::LanguageModel, vb)?;
    let ids = random_ids(&device, 20, 1, 17)?;

    let err = decoder.forward(&ids, None, None, false).unwrap_err();
    assert!(err.to_string().contains("exceeds the configured maximum"));
    Ok(())
}

#[test]
fn out_of_vocabulary_ids_fail_the_lookup() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let encoder = Encoder::new(build_config(20, 8, 4, 1), vb)?;
    let ids = Tensor::from_vec(vec![1u32, 20], (1, 2), &device)?;

    let err = encoder.forward(&ids, None, false).unwrap_err();
    assert!(err.to_string().contains("out of range"));
    Ok(())
}

#[test]
fn training_mode_with_dropout_still_produces_valid_shapes() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, vb) = builder(&device);
    let mut config = build_config(30, 8, 4, 2);
    config.dropout_p = 0.3;
    let decoder = Decoder::new(config, DecoderMode::LanguageModel, vb)?;
    let ids = random_ids(&device, 30, 2, 5)?;

    let logits = decoder.forward(&ids, None, None, true)?;
    assert_eq!(logits.dims(), &[2, 5, 30]);
    Ok(())
}
