use anyhow::Result;
use candle_core::{Device, Tensor};
use embedding::SinusoidalEncoding;

#[test]
fn table_matches_closed_form() -> Result<()> {
    let device = Device::Cpu;
    let d_model = 6;
    let encoding = SinusoidalEncoding::new(d_model, 8, 0.0, &device)?;
    let table = encoding.table().to_vec2::<f32>()?;

    // Position 0: sin(0) = 0 on even columns, cos(0) = 1 on odd columns.
    for i in 0..d_model {
        let expected = if i % 2 == 0 { 0.0 } else { 1.0 };
        assert!((table[0][i] - expected).abs() < 1e-6);
    }

    // Spot-check the closed form at a couple of interior entries.
    for &pos in &[1usize, 5] {
        for i in 0..d_model {
            let exponent = (2 * (i / 2)) as f32 / d_model as f32;
            let angle = pos as f32 / 10_000f32.powf(exponent);
            let expected = if i % 2 == 0 { angle.sin() } else { angle.cos() };
            assert!(
                (table[pos][i] - expected).abs() < 1e-6,
                "mismatch at ({pos}, {i})"
            );
        }
    }
    Ok(())
}

#[test]
fn forward_adds_table_slice() -> Result<()> {
    let device = Device::Cpu;
    let encoding = SinusoidalEncoding::new(4, 10, 0.0, &device)?;
    let zeros = Tensor::zeros((2, 3, 4), candle_core::DType::F32, &device)?;

    let out = encoding.forward(&zeros, false)?;
    assert_eq!(out.dims(), &[2, 3, 4]);

    let expected = encoding.table().narrow(0, 0, 3)?.to_vec2::<f32>()?;
    let got = out.narrow(0, 1, 1)?.squeeze(0)?.to_vec2::<f32>()?;
    for (row_expected, row_got) in expected.iter().zip(got.iter()) {
        for (a, b) in row_expected.iter().zip(row_got.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
    Ok(())
}

#[test]
fn forward_is_deterministic_outside_training() -> Result<()> {
    let device = Device::Cpu;
    let encoding = SinusoidalEncoding::new(8, 16, 0.5, &device)?;
    let input = Tensor::randn(0f32, 1.0, (1, 5, 8), &device)?;

    let a = encoding.forward(&input, false)?;
    let b = encoding.forward(&input, false)?;
    let diff = a.sub(&b)?.abs()?.max_all()?.to_vec0::<f32>()?;
    assert_eq!(diff, 0.0);
    Ok(())
}

#[test]
fn sequences_beyond_capacity_are_rejected() -> Result<()> {
    let device = Device::Cpu;
    let encoding = SinusoidalEncoding::new(4, 3, 0.0, &device)?;
    let input = Tensor::zeros((1, 4, 4), candle_core::DType::F32, &device)?;

    let err = encoding.forward(&input, false).unwrap_err();
    assert!(err.to_string().contains("exceeds positional table capacity"));
    Ok(())
}

#[test]
fn mismatched_model_dim_is_rejected() -> Result<()> {
    let device = Device::Cpu;
    let encoding = SinusoidalEncoding::new(4, 8, 0.0, &device)?;
    let input = Tensor::zeros((1, 2, 6), candle_core::DType::F32, &device)?;
    assert!(encoding.forward(&input, false).is_err());
    Ok(())
}
