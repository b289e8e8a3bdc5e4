//! Checkpoint loading
//!
//! The whole checkpoint is read into memory before any output is written.
//! [`ModelParameters`] preserves the checkpoint's natural enumeration order,
//! which the output format depends on: shards in file-name order and, within
//! a shard, tensors in ascending data offset (the order they were saved in).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use half::{bf16, f16};
use safetensors::{Dtype, SafeTensors};
use walkdir::WalkDir;

use crate::error::{ConvertError, Result};

/// Element type of a source tensor.
///
/// Non-float buffers (e.g. boolean attention masks) load as `Other` so they
/// can still be filtered out; writing one is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDtype {
    F32,
    F16,
    BF16,
    F64,
    Other(String),
}

impl SourceDtype {
    /// Bytes per element, `None` for non-float types.
    pub fn element_size(&self) -> Option<usize> {
        match self {
            Self::F16 | Self::BF16 => Some(2),
            Self::F32 => Some(4),
            Self::F64 => Some(8),
            Self::Other(_) => None,
        }
    }

    fn from_safetensors(dtype: Dtype) -> Self {
        match dtype {
            Dtype::F32 => Self::F32,
            Dtype::F16 => Self::F16,
            Dtype::BF16 => Self::BF16,
            Dtype::F64 => Self::F64,
            other => Self::Other(format!("{other:?}")),
        }
    }
}

/// An owned source tensor: row-major little-endian elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub dtype: SourceDtype,
    pub data: Vec<u8>,
}

impl Tensor {
    /// Build a tensor, checking that `data` matches `shape` for float types.
    pub fn new(name: &str, shape: Vec<usize>, dtype: SourceDtype, data: Vec<u8>) -> Result<Self> {
        if let Some(size) = dtype.element_size()
            && data.len() != shape.iter().product::<usize>() * size
        {
            let expected = shape.iter().product::<usize>() * size;
            return Err(ConvertError::ShapeMismatch {
                name: name.to_string(),
                shape,
                expected,
                got: data.len(),
            });
        }
        Ok(Self { shape, dtype, data })
    }

    /// f32 tensor from values, mostly for tests and synthetic checkpoints.
    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self { shape, dtype: SourceDtype::F32, data }
    }

    pub fn n_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Elements widened (or, for f64, narrowed) to f32. `None` for non-float data.
    pub fn to_f32_vec(&self) -> Option<Vec<f32>> {
        let values = match self.dtype {
            SourceDtype::F32 => self
                .data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            SourceDtype::F16 => {
                self.data.chunks_exact(2).map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32()).collect()
            }
            SourceDtype::BF16 => self
                .data
                .chunks_exact(2)
                .map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            SourceDtype::F64 => self
                .data
                .chunks_exact(8)
                .map(|b| {
                    f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32
                })
                .collect(),
            SourceDtype::Other(_) => return None,
        };
        Some(values)
    }

    /// Elements as f16, rounding to nearest even where precision drops.
    /// `None` for non-float data.
    pub fn to_f16_vec(&self) -> Option<Vec<f16>> {
        match self.dtype {
            SourceDtype::F16 => Some(
                self.data.chunks_exact(2).map(|b| f16::from_le_bytes([b[0], b[1]])).collect(),
            ),
            SourceDtype::F64 => Some(
                self.data
                    .chunks_exact(8)
                    .map(|b| {
                        f16::from_f64(f64::from_le_bytes([
                            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                        ]))
                    })
                    .collect(),
            ),
            _ => Some(self.to_f32_vec()?.into_iter().map(f16::from_f32).collect()),
        }
    }
}

/// Ordered `(name, tensor)` sequence in natural enumeration order.
#[derive(Debug, Default, Clone)]
pub struct ModelParameters {
    entries: Vec<(String, Tensor)>,
}

impl ModelParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter. Order of calls is the enumeration order.
    pub fn push(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.entries.push((name.into(), tensor));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Total source bytes held in memory.
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.data.len()).sum()
    }

    /// Parse one safetensors buffer and append its tensors in on-disk order.
    pub fn extend_from_safetensors(&mut self, buffer: &[u8], origin: &str) -> Result<()> {
        let st_err = |e: safetensors::SafeTensorError| ConvertError::Safetensors {
            file: origin.to_string(),
            reason: e.to_string(),
        };

        let (_, metadata) = SafeTensors::read_metadata(buffer).map_err(st_err)?;
        let mut ordered: Vec<(String, usize)> = metadata
            .tensors()
            .into_iter()
            .map(|(name, info)| (name, info.data_offsets.0))
            .collect();
        ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let tensors = SafeTensors::deserialize(buffer).map_err(st_err)?;
        for (name, _) in ordered {
            let view = tensors.tensor(&name).map_err(st_err)?;
            let dtype = SourceDtype::from_safetensors(view.dtype());
            let tensor = Tensor::new(&name, view.shape().to_vec(), dtype, view.data().to_vec())?;
            self.entries.push((name, tensor));
        }
        Ok(())
    }

    /// Load every `*.safetensors` file in `dir` (non-recursive).
    pub fn from_safetensors_dir(dir: &Path) -> Result<Self> {
        let files = list_safetensors_files(dir)?;
        let mut params = Self::new();
        for path in &files {
            tracing::info!("Loading checkpoint shard: {}", path.display());
            let buffer = std::fs::read(path)?;
            params.extend_from_safetensors(&buffer, &path.display().to_string())?;
        }

        let mut seen = HashSet::new();
        for (name, _) in &params.entries {
            if !seen.insert(name.as_str()) {
                return Err(ConvertError::DuplicateTensor(name.clone()));
            }
        }

        tracing::info!(
            "Loaded {} tensors ({:.2} MiB) from {} file(s)",
            params.len(),
            params.total_bytes() as f64 / (1024.0 * 1024.0),
            files.len()
        );
        Ok(params)
    }
}

/// Sorted `*.safetensors` files directly inside `dir`.
pub fn list_safetensors_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ConvertError::Io(e.into()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|s| s.to_str()) == Some("safetensors")
        {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(ConvertError::NoCheckpoint(dir.display().to_string()));
    }
    files.sort();
    Ok(files)
}
