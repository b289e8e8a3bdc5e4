use anyhow::{Context, Result};
use clap::Parser;
use ggmf_format::FileHeader;
use std::path::PathBuf;

/// Print the header, vocabulary size and tensor table of a ggmf model file.
/// Exits non-zero if the file does not parse end to end.
#[derive(Parser, Debug)]
#[command(name = "ggmf-inspect")]
#[command(version)]
struct Cli {
    /// Path to a ggml-*.bin file
    input: PathBuf,

    /// Print one line per tensor
    #[arg(long)]
    tensors: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Cli::parse();

    let file = ggmf_format::open(&args.input)
        .with_context(|| format!("parsing {}", args.input.display()))?;

    tracing::info!("File: {}", args.input.display());
    for (name, value) in FileHeader::FIELD_NAMES.iter().zip(file.header.to_words()) {
        tracing::info!("  {:<22} = {}", name, value);
    }

    let empty = file.vocab.iter().filter(|t| t.is_empty()).count();
    tracing::info!("Vocabulary: {} entries ({} empty)", file.vocab.len(), empty);

    if args.tensors {
        for t in &file.tensors {
            println!("{:<64} {:?} dims={:?} bytes={}", t.name, t.dtype, t.dims, t.len);
        }
    }

    let f16 = file.tensors.iter().filter(|t| t.dtype == ggmf_format::GgmlDtype::F16).count();
    tracing::info!(
        "Tensors: {} (f16: {}, f32: {}), payload {:.2} MiB",
        file.tensors.len(),
        f16,
        file.tensors.len() - f16,
        file.payload_bytes() as f64 / (1024.0 * 1024.0)
    );

    Ok(())
}
