use candle_core::{Device, Tensor};

use super::*;

fn to_grid(bias: &Tensor) -> Vec<Vec<f32>> {
    let dims = bias.dims();
    let (rows, cols) = (dims[dims.len() - 2], dims[dims.len() - 1]);
    let flat = bias
        .flatten_all()
        .unwrap()
        .to_vec1::<f32>()
        .unwrap();
    flat.chunks(cols).take(rows).map(|row| row.to_vec()).collect()
}

#[test]
fn causal_table_permits_self_and_past_only() {
    let device = Device::Cpu;
    let table = causal_bias_table(&device, 4).unwrap();
    assert_eq!(table.dims(), &[4, 4]);

    let grid = to_grid(&table);
    for (q, row) in grid.iter().enumerate() {
        for (k, &value) in row.iter().enumerate() {
            if k <= q {
                assert_eq!(value, 0.0, "position {q} must attend to {k}");
            } else {
                assert_eq!(value, f32::NEG_INFINITY, "position {q} must not see {k}");
            }
        }
    }
}

#[test]
fn causal_slice_matches_table_prefix() {
    let device = Device::Cpu;
    let table = causal_bias_table(&device, 8).unwrap();
    let sliced = slice_causal_bias(&table, 3, 3).unwrap();
    assert_eq!(sliced.dims(), &[1, 1, 3, 3]);

    let grid = to_grid(&sliced);
    assert_eq!(grid[0], vec![0.0, f32::NEG_INFINITY, f32::NEG_INFINITY]);
    assert_eq!(grid[2], vec![0.0, 0.0, 0.0]);
}

#[test]
fn causal_slice_rejects_lengths_beyond_capacity() {
    let device = Device::Cpu;
    let table = causal_bias_table(&device, 4).unwrap();
    assert!(slice_causal_bias(&table, 5, 5).is_err());
    assert!(slice_causal_bias(&table, 2, 5).is_err());
}

#[test]
fn padding_bias_masks_zero_entries() {
    let device = Device::Cpu;
    let mask = Tensor::from_vec(vec![1u32, 1, 0, 0], (1, 4), &device).unwrap();
    let bias = key_padding_bias(&mask).unwrap();
    assert_eq!(bias.dims(), &[1, 1, 1, 4]);

    let values = bias.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(values[0], 0.0);
    assert_eq!(values[1], 0.0);
    assert_eq!(values[2], f32::NEG_INFINITY);
    assert_eq!(values[3], f32::NEG_INFINITY);
}

#[test]
fn padding_bias_accepts_float_masks() {
    let device = Device::Cpu;
    let mask = Tensor::from_vec(vec![1.0f32, 0.0, 1.0], (1, 3), &device).unwrap();
    let bias = key_padding_bias(&mask).unwrap();
    let values = bias.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(values, vec![0.0, f32::NEG_INFINITY, 0.0]);
}

#[test]
fn padding_bias_rejects_wrong_rank() {
    let device = Device::Cpu;
    let mask = Tensor::from_vec(vec![1u32, 1, 1, 1], (1, 2, 2), &device).unwrap();
    assert!(key_padding_bias(&mask).is_err());
}

#[test]
fn lengths_and_boolean_masks_agree() {
    let device = Device::Cpu;
    let from_lengths = key_padding_bias_from_lengths(&device, &[3, 1], 4).unwrap();
    let mask = Tensor::from_vec(vec![1u32, 1, 1, 0, 1, 0, 0, 0], (2, 4), &device).unwrap();
    let from_mask = key_padding_bias(&mask).unwrap();

    let a = from_lengths.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    let b = from_mask.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(a, b);
}

#[test]
fn combine_merges_padding_and_causal() {
    let device = Device::Cpu;
    let table = causal_bias_table(&device, 3).unwrap();
    let causal = slice_causal_bias(&table, 3, 3).unwrap();
    let padding = key_padding_bias_from_lengths(&device, &[2], 3).unwrap();

    let merged = combine_biases(Some(&padding), Some(&causal), (1, 1, 3, 3))
        .unwrap()
        .expect("bias expected");
    assert_eq!(merged.dims(), &[1, 1, 3, 3]);

    let grid = to_grid(&merged);
    // Row 0: only key 0 open (key 1 is future, key 2 is padded).
    assert_eq!(grid[0][0], 0.0);
    assert_eq!(grid[0][1], f32::NEG_INFINITY);
    assert_eq!(grid[0][2], f32::NEG_INFINITY);
    // Row 2: keys 0 and 1 open, key 2 still padded.
    assert_eq!(grid[2][0], 0.0);
    assert_eq!(grid[2][1], 0.0);
    assert_eq!(grid[2][2], f32::NEG_INFINITY);
}

#[test]
fn combine_without_inputs_is_none() {
    assert!(combine_biases(None, None, (1, 1, 2, 2)).unwrap().is_none());
}
