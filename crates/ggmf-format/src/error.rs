use std::io;
use thiserror::Error;

/// Errors returned while writing or parsing a ggmf file.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GgmfError {
    #[error("bad magic: 0x{0:08x}")]
    BadMagic(u32),
    #[error("unversioned ggml file (magic 0x67676d6c) is not supported")]
    Unversioned,
    #[error("unsupported ggmf version: {0}")]
    UnsupportedVersion(u32),
    #[error("truncated {section}: need {need} bytes at offset {offset}, have {have}")]
    Truncated { section: &'static str, offset: usize, need: usize, have: usize },
    #[error("invalid dtype tag: {0}")]
    InvalidDtype(i32),
    #[error("negative {field}: {value}")]
    Negative { field: &'static str, value: i32 },
    #[error("{field} does not fit in a 32-bit header field: {value}")]
    FieldOverflow { field: &'static str, value: u64 },
    #[error("tensor name is not valid UTF-8 at offset {0}")]
    InvalidName(usize),
    #[error("payload for tensor '{name}' is {got} bytes, shape {shape:?} needs {expected}")]
    PayloadSize { name: String, shape: Vec<usize>, expected: usize, got: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, GgmfError>;
