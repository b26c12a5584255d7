mod demo_config;

use std::path::PathBuf;

use anyhow::Result;
use candle_core::{DType, Tensor};
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;

use model::{greedy_decode, Decoder, DecoderMode, Encoder, EncoderContext};

use crate::demo_config::{DemoConfig, DemoMode};

#[derive(Parser, Debug)]
#[command(author, version, about = "Greedy decoding demo for the seqformer stacks", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "PATH", help = "Path to a TOML or JSON config")]
    config: PathBuf,

    #[arg(long, help = "Override the generation step budget")]
    steps: Option<usize>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("seqformer failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = DemoConfig::from_path(&args.config)?;
    let device = seqformer::setup_device()?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

    let mut options = config.generation_options();
    if let Some(steps) = args.steps {
        options.max_steps = steps;
    }
    let model_config = config.model_config();

    let output = match config.mode {
        DemoMode::LanguageModel => {
            let decoder = Decoder::new(model_config, DecoderMode::LanguageModel, vb)?;
            greedy_decode(&decoder, None, &options)?
        }
        DemoMode::Seq2Seq => {
            let encoder = Encoder::new(model_config.clone(), vb.pp("encoder"))?;
            let decoder = Decoder::new(model_config, DecoderMode::Seq2Seq, vb.pp("decoder"))?;

            let source_len = config.source_ids.len();
            let source = Tensor::from_vec(config.source_ids.clone(), (1, source_len), &device)?;
            let source_mask = Tensor::ones((1, source_len), DType::U8, &device)?;
            // The encoder runs exactly once; the loop reuses its output.
            let encoded = encoder.forward(&source, Some(&source_mask), false)?;
            let context = EncoderContext {
                hidden: &encoded,
                padding_mask: Some(&source_mask),
            };
            greedy_decode(&decoder, Some(&context), &options)?
        }
    };

    println!("generated {} token id(s): {:?}", output.len(), output);
    println!("(weights are freshly initialised; map ids to text with your tokenizer)");
    Ok(())
}
