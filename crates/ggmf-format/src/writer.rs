//! Low-level section writers.
//!
//! Every integer is little-endian. None of these functions buffer; wrap the
//! destination in a `BufWriter` when writing to a file.

use std::io::Write;

use crate::GgmlDtype;
use crate::error::{GgmfError, Result};

/// Convert a size into a 32-bit header field.
pub fn to_i32_field(field: &'static str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| GgmfError::FieldOverflow { field, value: value as u64 })
}

/// Write one vocabulary entry: `u32` length followed by the raw bytes.
pub fn write_vocab_entry<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| GgmfError::FieldOverflow {
        field: "vocab entry length",
        value: bytes.len() as u64,
    })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Write one tensor record and return the number of bytes written.
///
/// `shape` is the row-major shape of `payload` (slowest-varying first). The
/// record stores it reversed:
///
/// ```text
/// i32 n_dims | i32 name_len | i32 dtype | n_dims × i32 dims (reversed) | name | payload
/// ```
pub fn write_tensor_record<W: Write>(
    writer: &mut W,
    name: &str,
    shape: &[usize],
    dtype: GgmlDtype,
    payload: &[u8],
) -> Result<usize> {
    let expected = shape
        .iter()
        .try_fold(dtype.element_size(), |acc, &d| acc.checked_mul(d))
        .ok_or(GgmfError::FieldOverflow { field: "tensor size", value: u64::MAX })?;
    if payload.len() != expected {
        return Err(GgmfError::PayloadSize {
            name: name.to_string(),
            shape: shape.to_vec(),
            expected,
            got: payload.len(),
        });
    }

    let name_bytes = name.as_bytes();
    let n_dims = to_i32_field("n_dims", shape.len())?;
    let name_len = to_i32_field("name length", name_bytes.len())?;
    let dims = shape
        .iter()
        .rev()
        .map(|&d| to_i32_field("dimension", d))
        .collect::<Result<Vec<i32>>>()?;

    writer.write_all(&n_dims.to_le_bytes())?;
    writer.write_all(&name_len.to_le_bytes())?;
    writer.write_all(&dtype.as_i32().to_le_bytes())?;
    for dim in dims {
        writer.write_all(&dim.to_le_bytes())?;
    }
    writer.write_all(name_bytes)?;
    writer.write_all(payload)?;

    Ok(12 + 4 * shape.len() + name_bytes.len() + payload.len())
}
