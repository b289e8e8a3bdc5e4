//! Versioned GGML ("ggmf") model file format.
//!
//! A ggmf file is a flat little-endian byte stream with no index, no
//! checksums and no section markers. Readers rely on the fixed section order:
//!
//! | Section         | Layout                                                          |
//! |-----------------|-----------------------------------------------------------------|
//! | Magic           | `u32` `0x67676d66` ("ggmf")                                     |
//! | Version         | `u32` `1`                                                       |
//! | Hyperparameters | 8 × `i32` (see [`FileHeader`])                                  |
//! | Vocabulary      | `n_vocab` × (`u32` length + raw bytes)                          |
//! | Tensors         | repeated records until EOF (see [`writer::write_tensor_record`]) |
//!
//! Tensor dims are stored fastest-varying first, i.e. reversed relative to
//! the row-major shape of the payload.
//!
//! # Example
//!
//! ```no_run
//! use ggmf_format::{check_magic, parse_file};
//! use std::fs;
//!
//! let data = fs::read("ggml-model-f16.bin").unwrap();
//! if check_magic(&data) {
//!     let file = parse_file(&data).unwrap();
//!     println!("{:?}", file.header);
//!     println!("{} tensors", file.tensors.len());
//! }
//! ```

mod error;
mod header;
pub mod reader;
pub mod writer;

pub use error::{GgmfError, Result};
pub use header::FileHeader;
pub use reader::{GgmfFile, TensorInfo, open, parse_file, read_header};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic of the versioned format ("ggmf" as a little-endian `u32`).
pub const GGMF_MAGIC: u32 = 0x6767_6d66;
/// Magic of the older unversioned variant ("ggml"). Never written.
pub const GGML_MAGIC_UNVERSIONED: u32 = 0x6767_6d6c;
/// File version written after the magic.
pub const GGMF_VERSION: u32 = 1;
/// Number of `i32` hyperparameter fields following the version.
pub const HPARAM_COUNT: usize = 8;
/// Byte length of magic + version + hyperparameters.
pub const HEADER_LEN: usize = 4 + 4 + HPARAM_COUNT * 4;

// ---------------------------------------------------------------------------
// Tensor element type
// ---------------------------------------------------------------------------

/// Element type tag stored in each tensor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum GgmlDtype {
    F32 = 0,
    F16 = 1,
}

impl GgmlDtype {
    /// Convert from the raw tag in the file.
    pub const fn from_i32(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::F32),
            1 => Some(Self::F16),
            _ => None,
        }
    }

    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Bytes per element.
    pub const fn element_size(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F16 => 2,
        }
    }
}

/// Returns `true` if `data` starts with the versioned ggmf magic.
#[inline]
pub fn check_magic(data: &[u8]) -> bool {
    data.get(0..4) == Some(&GGMF_MAGIC.to_le_bytes()[..])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_spell_ggmf_backwards() {
        assert_eq!(&GGMF_MAGIC.to_le_bytes(), b"fmgg");
        assert_eq!(&GGML_MAGIC_UNVERSIONED.to_le_bytes(), b"lmgg");
    }

    #[test]
    fn check_magic_valid() {
        assert!(check_magic(b"fmgg\x01\x00\x00\x00"));
    }

    #[test]
    fn check_magic_rejects_unversioned_and_short() {
        assert!(!check_magic(b"lmgg\x01\x00\x00\x00"));
        assert!(!check_magic(b"fmg"));
        assert!(!check_magic(b""));
    }

    #[test]
    fn dtype_tags_and_sizes() {
        assert_eq!(GgmlDtype::F32.as_i32(), 0);
        assert_eq!(GgmlDtype::F16.as_i32(), 1);
        assert_eq!(GgmlDtype::F32.element_size(), 4);
        assert_eq!(GgmlDtype::F16.element_size(), 2);
        assert_eq!(GgmlDtype::from_i32(1), Some(GgmlDtype::F16));
        assert_eq!(GgmlDtype::from_i32(2), None);
        assert_eq!(GgmlDtype::from_i32(-1), None);
    }

    #[test]
    fn header_len_is_forty_bytes() {
        assert_eq!(HEADER_LEN, 40);
    }

    proptest::proptest! {
        #[test]
        fn check_magic_is_true_only_for_ggmf_prefix(data in proptest::collection::vec(0u8..=255, 0..16)) {
            let is_ggmf = data.starts_with(b"fmgg");
            proptest::prop_assert_eq!(check_magic(&data), is_ggmf);
        }
    }
}
