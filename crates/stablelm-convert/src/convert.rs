//! Output file assembly
//!
//! Sections are written strictly in order: header, vocabulary, tensors. The
//! destination is created or truncated in place; a failure part way leaves a
//! truncated file behind that must be discarded.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checkpoint::ModelParameters;
use crate::error::{ConvertError, Result};
use crate::hparams::Hyperparameters;
use crate::options::{ConvertOptions, OutputPrecision};
use crate::tensors::{TensorStreamStats, write_tensors};
use crate::vocab::{HfTokenDecoder, PrefixStripExtractor, VocabularyByteExtractor, write_vocabulary};

/// `<parent of model_dir>/ggml-<model dir name>-<f32|f16>.bin`
pub fn output_path(model_dir: &Path, precision: OutputPrecision) -> Result<PathBuf> {
    let name = model_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ConvertError::InvalidModelDir(model_dir.display().to_string()))?;
    let file_name = format!("ggml-{}-{}.bin", name, precision.file_suffix());
    let parent = model_dir.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(file_name))
}

/// Write a complete model to `writer`.
pub fn write_model<W: Write, E: VocabularyByteExtractor + ?Sized>(
    writer: &mut W,
    hparams: &Hyperparameters,
    extractor: &E,
    params: &ModelParameters,
    options: &ConvertOptions,
) -> Result<TensorStreamStats> {
    hparams.to_file_header(options.precision)?.write_to(writer)?;

    let empty = write_vocabulary(writer, extractor, hparams.vocab_size)?;
    tracing::info!("Wrote {} vocabulary entries ({} empty)", hparams.vocab_size, empty);

    write_tensors(writer, params, options.precision)
}

/// Result of a finished conversion.
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub output: PathBuf,
    pub hparams: Hyperparameters,
    pub stats: TensorStreamStats,
}

/// Convert the model directory and write the derived output file.
pub fn convert(model_dir: &Path, options: &ConvertOptions) -> Result<ConversionSummary> {
    let out_path = output_path(model_dir, options.precision)?;
    convert_to(model_dir, &out_path, options)
}

/// Convert the model directory into `out_path`.
pub fn convert_to(
    model_dir: &Path,
    out_path: &Path,
    options: &ConvertOptions,
) -> Result<ConversionSummary> {
    let hparams = Hyperparameters::from_json_file(model_dir.join("config.json"))?;
    tracing::info!("Hyperparameters: {}", serde_json::to_string(&hparams)?);

    let decoder = HfTokenDecoder::from_directory(model_dir)?;
    if decoder.vocab_size() != hparams.vocab_size {
        tracing::warn!(
            "tokenizer has {} tokens, config vocab_size is {}; writing {} entries",
            decoder.vocab_size(),
            hparams.vocab_size,
            hparams.vocab_size
        );
    }
    let extractor = PrefixStripExtractor::new(&decoder, options.vocab_prefix)?;

    let params = ModelParameters::from_safetensors_dir(model_dir)?;

    tracing::info!("Writing {}", out_path.display());
    let mut writer = BufWriter::new(File::create(out_path)?);
    let stats = write_model(&mut writer, &hparams, &extractor, &params, options)?;
    writer.flush()?;

    Ok(ConversionSummary { output: out_path.to_path_buf(), hparams, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Tensor;
    use crate::vocab::tests::TableDecoder;
    use ggmf_format::{GgmlDtype, parse_file};

    #[test]
    fn output_path_goes_next_to_the_model_dir() {
        let p = output_path(Path::new("/models/stablelm-base-alpha-3b"), OutputPrecision::F16).unwrap();
        assert_eq!(p, PathBuf::from("/models/ggml-stablelm-base-alpha-3b-f16.bin"));
        let p = output_path(Path::new("models/tiny/"), OutputPrecision::F32).unwrap();
        assert_eq!(p, PathBuf::from("models/ggml-tiny-f32.bin"));
        let p = output_path(Path::new("tiny"), OutputPrecision::F16).unwrap();
        assert_eq!(p, PathBuf::from("ggml-tiny-f16.bin"));
    }

    #[test]
    fn output_path_needs_a_directory_name() {
        assert!(matches!(
            output_path(Path::new("/"), OutputPrecision::F16),
            Err(ConvertError::InvalidModelDir(_))
        ));
    }

    #[test]
    fn write_model_section_order() {
        let hparams = Hyperparameters {
            vocab_size: 2,
            max_position_embeddings: 16,
            hidden_size: 4,
            num_attention_heads: 2,
            num_hidden_layers: 1,
            rotary_pct: 0.5,
            use_parallel_residual: true,
            multiple_of: 1,
        };
        let decoder = TableDecoder::new(&[".", "Hi"]);
        let extractor = PrefixStripExtractor::new(&decoder, ".").unwrap();
        let mut params = ModelParameters::new();
        params.push("gpt_neox.embed_in.weight", Tensor::from_f32(vec![2, 4], &[0.0; 8]));
        params.push("gpt_neox.layers.0.attention.bias", Tensor::from_f32(vec![1, 1, 4, 4], &[1.0; 16]));
        params.push("gpt_neox.final_layer_norm.bias", Tensor::from_f32(vec![4], &[0.0; 4]));

        let mut buf = Vec::new();
        let stats =
            write_model(&mut buf, &hparams, &extractor, &params, &ConvertOptions::default()).unwrap();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.skipped, 1);

        let file = parse_file(&buf).unwrap();
        assert_eq!(file.header.to_words(), [2, 16, 4, 2, 1, 1, 1, 1]);
        assert_eq!(file.vocab, vec![b".".to_vec(), b"Hi".to_vec()]);
        let names: Vec<&str> = file.tensors.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["gpt_neox.embed_in.weight", "gpt_neox.final_layer_norm.bias"]);
        assert_eq!(file.tensors[0].dtype, GgmlDtype::F16);
        assert_eq!(file.tensors[1].dtype, GgmlDtype::F32);
        assert_eq!(&buf[40..51], &[1, 0, 0, 0, 0x2E, 2, 0, 0, 0, 0x48, 0x69]);
    }
}
