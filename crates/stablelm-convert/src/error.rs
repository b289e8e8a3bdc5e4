//! Conversion error types

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("config.json is missing required key `{0}`")]
    MissingConfigKey(&'static str),

    #[error("config.json key `{key}` has unexpected value {value}")]
    InvalidConfigValue { key: &'static str, value: String },

    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("prefix text {0:?} encodes to no tokens")]
    EmptyPrefix(String),

    #[error("safetensors error in {file}: {reason}")]
    Safetensors { file: String, reason: String },

    #[error("no *.safetensors files found in {0}")]
    NoCheckpoint(String),

    #[error("tensor '{name}' has unsupported dtype {dtype}")]
    UnsupportedDtype { name: String, dtype: String },

    #[error("tensor '{name}' holds {got} bytes, shape {shape:?} needs {expected}")]
    ShapeMismatch { name: String, shape: Vec<usize>, expected: usize, got: usize },

    #[error("duplicate tensor name '{0}' across checkpoint shards")]
    DuplicateTensor(String),

    #[error("cannot derive an output file name from {0}")]
    InvalidModelDir(String),

    #[error("format error: {0}")]
    Format(#[from] ggmf_format::GgmfError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
