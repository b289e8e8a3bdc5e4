//! Validating parser for complete ggmf files.
//!
//! Mirrors what the inference engine does on load: magic and version check,
//! the fixed hyperparameter block, `n_vocab` vocabulary entries, then tensor
//! records until end of input. Payloads are not copied; [`TensorInfo`] holds
//! their byte range in the input.

use std::path::Path;

use crate::error::{GgmfError, Result};
use crate::{
    FileHeader, GGMF_MAGIC, GGMF_VERSION, GGML_MAGIC_UNVERSIONED, GgmlDtype, HPARAM_COUNT,
};

/// Tensor record descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub name: String,
    /// Dims as stored, fastest-varying first.
    pub dims: Vec<usize>,
    pub dtype: GgmlDtype,
    /// Byte offset of the payload in the file.
    pub offset: usize,
    /// Payload length in bytes.
    pub len: usize,
}

impl TensorInfo {
    /// Row-major shape of the payload (stored dims reversed).
    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().rev().copied().collect()
    }

    pub fn n_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Payload bytes, given the buffer this descriptor was parsed from.
    pub fn data<'a>(&self, file: &'a [u8]) -> &'a [u8] {
        &file[self.offset..self.offset + self.len]
    }
}

/// A parsed ggmf file.
#[derive(Debug, Clone)]
pub struct GgmfFile {
    pub header: FileHeader,
    /// Token bytes indexed by token id.
    pub vocab: Vec<Vec<u8>>,
    pub tensors: Vec<TensorInfo>,
}

impl GgmfFile {
    pub fn tensor(&self, name: &str) -> Option<&TensorInfo> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Total payload bytes across all tensors.
    pub fn payload_bytes(&self) -> usize {
        self.tensors.iter().map(|t| t.len).sum()
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, section: &'static str, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(GgmfError::Truncated {
                section,
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        let data = self.data;
        let bytes = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u32(&mut self, section: &'static str) -> Result<u32> {
        let b = self.take(section, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self, section: &'static str) -> Result<i32> {
        let b = self.take(section, 4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn non_negative(&mut self, section: &'static str, field: &'static str) -> Result<usize> {
        let value = self.i32(section)?;
        usize::try_from(value).map_err(|_| GgmfError::Negative { field, value })
    }
}

fn read_header_at(cursor: &mut Cursor<'_>) -> Result<FileHeader> {
    let magic = cursor.u32("magic")?;
    if magic == GGML_MAGIC_UNVERSIONED {
        return Err(GgmfError::Unversioned);
    }
    if magic != GGMF_MAGIC {
        return Err(GgmfError::BadMagic(magic));
    }
    let version = cursor.u32("version")?;
    if version != GGMF_VERSION {
        return Err(GgmfError::UnsupportedVersion(version));
    }

    let mut words = [0i32; HPARAM_COUNT];
    for word in &mut words {
        *word = cursor.i32("hyperparameters")?;
    }
    Ok(FileHeader::from_words(words))
}

/// Parse magic, version and hyperparameters only.
pub fn read_header(data: &[u8]) -> Result<FileHeader> {
    read_header_at(&mut Cursor::new(data))
}

/// Parse a complete file held in memory.
pub fn parse_file(data: &[u8]) -> Result<GgmfFile> {
    let mut cursor = Cursor::new(data);
    let header = read_header_at(&mut cursor)?;

    let n_vocab = usize::try_from(header.n_vocab)
        .map_err(|_| GgmfError::Negative { field: "n_vocab", value: header.n_vocab })?;
    // Every entry needs at least its 4-byte length.
    let mut vocab = Vec::with_capacity(n_vocab.min(cursor.remaining() / 4));
    for _ in 0..n_vocab {
        let len = cursor.u32("vocabulary")? as usize;
        vocab.push(cursor.take("vocabulary", len)?.to_vec());
    }

    let mut tensors = Vec::new();
    while cursor.remaining() > 0 {
        let n_dims = cursor.non_negative("tensor header", "n_dims")?;
        let name_len = cursor.non_negative("tensor header", "name length")?;
        let tag = cursor.i32("tensor header")?;
        let dtype = GgmlDtype::from_i32(tag).ok_or(GgmfError::InvalidDtype(tag))?;

        if n_dims.saturating_mul(4) > cursor.remaining() {
            return Err(GgmfError::Truncated {
                section: "tensor dims",
                offset: cursor.pos,
                need: n_dims.saturating_mul(4),
                have: cursor.remaining(),
            });
        }
        let mut dims = Vec::with_capacity(n_dims);
        for _ in 0..n_dims {
            dims.push(cursor.non_negative("tensor dims", "dimension")?);
        }

        let name_offset = cursor.pos;
        let name = std::str::from_utf8(cursor.take("tensor name", name_len)?)
            .map_err(|_| GgmfError::InvalidName(name_offset))?
            .to_string();

        let len = dims
            .iter()
            .try_fold(dtype.element_size(), |acc, &d| acc.checked_mul(d))
            .ok_or(GgmfError::FieldOverflow { field: "tensor size", value: u64::MAX })?;
        let offset = cursor.pos;
        cursor.take("tensor payload", len)?;

        tensors.push(TensorInfo { name, dims, dtype, offset, len });
    }

    Ok(GgmfFile { header, vocab, tensors })
}

/// Memory-map a ggmf file and parse it.
///
/// The mapping is released before returning; tensor payloads have to be read
/// again through [`TensorInfo::offset`] if needed.
pub fn open(path: &Path) -> anyhow::Result<GgmfFile> {
    let file = std::fs::File::open(path)
        .map_err(|e| anyhow::anyhow!("cannot open {}: {e}", path.display()))?;
    // SAFETY: we do not mutate the mapping and the file is opened read-only.
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .map_err(|e| anyhow::anyhow!("mmap failed for {}: {e}", path.display()))?;
    Ok(parse_file(&mmap[..])?)
}
