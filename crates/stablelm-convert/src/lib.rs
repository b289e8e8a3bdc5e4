//! StableLM / GPT-NeoX checkpoint to ggmf conversion.
//!
//! Reads a Hugging Face model directory (`config.json`, `tokenizer.json`,
//! `*.safetensors`) and writes a single versioned GGML file:
//!
//! 1. [`hparams`] normalises `config.json` into the fixed header block.
//! 2. [`vocab`] recovers each token's bytes through the tokenizer.
//! 3. [`checkpoint`] loads every tensor in natural order.
//! 4. [`tensors`] filters, squeezes and casts them into records.
//! 5. [`convert`] writes the sections in order.

pub mod checkpoint;
pub mod convert;
mod error;
pub mod hparams;
pub mod options;
pub mod tensors;
pub mod vocab;

pub use checkpoint::{ModelParameters, SourceDtype, Tensor};
pub use convert::{ConversionSummary, convert, convert_to, output_path, write_model};
pub use error::{ConvertError, Result};
pub use hparams::Hyperparameters;
pub use options::{ConvertOptions, OutputPrecision};
pub use tensors::{EXCLUDED_SUFFIXES, TensorStreamStats, is_excluded, squeeze, write_tensors};
pub use vocab::{
    HfTokenDecoder, PrefixStripExtractor, TokenDecoder, VocabularyByteExtractor, write_vocabulary,
};
