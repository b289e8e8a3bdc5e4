//! Tensor record stream
//!
//! Parameters are emitted in [`ModelParameters`] order with no index; the
//! reader depends on that order alone.

use std::io::Write;

use ggmf_format::GgmlDtype;
use ggmf_format::writer::write_tensor_record;

use crate::checkpoint::{ModelParameters, SourceDtype, Tensor};
use crate::error::{ConvertError, Result};
use crate::options::OutputPrecision;

/// Buffers that are rebuilt at load time and never persisted.
pub const EXCLUDED_SUFFIXES: &[&str] = &[
    ".attention.masked_bias",
    ".attention.bias",
    ".attention.rotary_emb.inv_freq",
];

pub fn is_excluded(name: &str) -> bool {
    EXCLUDED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Drop every size-1 dimension. Element order is unchanged.
pub fn squeeze(shape: &[usize]) -> Vec<usize> {
    shape.iter().copied().filter(|&d| d != 1).collect()
}

/// Payload bytes of `tensor` in the requested element type.
pub fn encode_payload(name: &str, tensor: &Tensor, dtype: GgmlDtype) -> Result<Vec<u8>> {
    let payload: Option<Vec<u8>> = match dtype {
        GgmlDtype::F32 => tensor
            .to_f32_vec()
            .map(|v| v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        GgmlDtype::F16 => tensor
            .to_f16_vec()
            .map(|v| v.iter().flat_map(|x| x.to_le_bytes()).collect()),
    };
    payload.ok_or_else(|| ConvertError::UnsupportedDtype {
        name: name.to_string(),
        dtype: match &tensor.dtype {
            SourceDtype::Other(raw) => raw.clone(),
            known => format!("{known:?}"),
        },
    })
}

/// Counters reported after the tensor section is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TensorStreamStats {
    pub written: usize,
    pub skipped: usize,
    pub f16: usize,
    pub f32: usize,
    /// Bytes written for the whole section, record headers included.
    pub bytes: usize,
}

/// Write one record per persisted parameter.
pub fn write_tensors<W: Write>(
    writer: &mut W,
    params: &ModelParameters,
    precision: OutputPrecision,
) -> Result<TensorStreamStats> {
    let mut stats = TensorStreamStats::default();

    for (name, tensor) in params.iter() {
        let shape = squeeze(&tensor.shape);
        tracing::info!("Processing variable: {} with shape: {:?}", name, shape);

        if is_excluded(name) {
            tracing::info!("  Skipping variable: {}", name);
            stats.skipped += 1;
            continue;
        }

        let dtype = precision.dtype_for(name, shape.len());
        match dtype {
            GgmlDtype::F16 => {
                tracing::info!("  Converting to float16");
                stats.f16 += 1;
            }
            GgmlDtype::F32 => {
                tracing::info!("  Converting to float32");
                stats.f32 += 1;
            }
        }

        let payload = encode_payload(name, tensor, dtype)?;
        stats.bytes += write_tensor_record(writer, name, &shape, dtype, &payload)?;
        stats.written += 1;
    }

    Ok(stats)
}
