//! StableLM checkpoint to GGML converter
//!
//! Converts a Hugging Face GPT-NeoX / StableLM model directory into a single
//! versioned GGML (`ggmf`) file written next to the model directory.
//!
//! # Usage
//!
//! ```bash
//! # f16 weights (default)
//! stablelm-convert models/stablelm-base-alpha-3b
//!
//! # everything in f32
//! stablelm-convert models/stablelm-base-alpha-3b 0
//! ```
//!
//! The output lands in `models/ggml-stablelm-base-alpha-3b-f16.bin`
//! (or `-f32.bin`).

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stablelm_convert::{ConvertOptions, OutputPrecision, convert};

/// Convert a StableLM / GPT-NeoX model directory to GGML
#[derive(Parser, Debug)]
#[command(name = "stablelm-convert")]
#[command(version)]
#[command(after_help = "ftype == 0 -> float32\nftype != 0 -> float16 (2-D weight matrices)")]
struct Args {
    /// Model directory containing config.json, tokenizer.json and *.safetensors
    dir_model: PathBuf,

    /// Output precision: 0 = f32, anything else = f16
    #[arg(default_value_t = 1, allow_negative_numbers = true)]
    ftype: i32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let options = ConvertOptions::with_precision(OutputPrecision::from_ftype(args.ftype));

    tracing::info!("Model directory: {}", args.dir_model.display());
    tracing::info!("Output precision: {}", options.precision.file_suffix());

    let summary = convert(&args.dir_model, &options)
        .with_context(|| format!("converting {}", args.dir_model.display()))?;

    tracing::info!("Conversion complete!");
    tracing::info!(
        "  Tensors: {} written, {} skipped (f16: {}, f32: {})",
        summary.stats.written,
        summary.stats.skipped,
        summary.stats.f16,
        summary.stats.f32
    );
    tracing::info!("Done. Output file: {}", summary.output.display());

    Ok(())
}
