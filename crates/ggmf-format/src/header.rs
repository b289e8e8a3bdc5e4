use std::io::Write;

use crate::error::Result;
use crate::{GGMF_MAGIC, GGMF_VERSION, HPARAM_COUNT};

/// Hyperparameter block that follows the magic and version.
///
/// Field order is the on-disk order. `multiple_of` is not part of this
/// format version; readers expect exactly [`HPARAM_COUNT`] integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileHeader {
    pub n_vocab: i32,
    pub n_ctx: i32,
    pub n_embd: i32,
    pub n_head: i32,
    pub n_layer: i32,
    /// Rotary dimensions per head.
    pub n_rot: i32,
    /// 0 or 1.
    pub use_parallel_residual: i32,
    /// 0 = f32, 1 = f16.
    pub ftype: i32,
}

impl FileHeader {
    /// Fields in on-disk order.
    pub fn to_words(&self) -> [i32; HPARAM_COUNT] {
        [
            self.n_vocab,
            self.n_ctx,
            self.n_embd,
            self.n_head,
            self.n_layer,
            self.n_rot,
            self.use_parallel_residual,
            self.ftype,
        ]
    }

    pub fn from_words(w: [i32; HPARAM_COUNT]) -> Self {
        Self {
            n_vocab: w[0],
            n_ctx: w[1],
            n_embd: w[2],
            n_head: w[3],
            n_layer: w[4],
            n_rot: w[5],
            use_parallel_residual: w[6],
            ftype: w[7],
        }
    }

    /// Field names in on-disk order, for diagnostics.
    pub const FIELD_NAMES: [&'static str; HPARAM_COUNT] = [
        "n_vocab",
        "n_ctx",
        "n_embd",
        "n_head",
        "n_layer",
        "n_rot",
        "use_parallel_residual",
        "ftype",
    ];

    /// Write magic, version and the hyperparameter block.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&GGMF_MAGIC.to_le_bytes())?;
        writer.write_all(&GGMF_VERSION.to_le_bytes())?;
        for word in self.to_words() {
            writer.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HEADER_LEN;

    #[test]
    fn write_to_emits_magic_version_and_eight_words() {
        let header = FileHeader {
            n_vocab: 50_688,
            n_ctx: 4096,
            n_embd: 2560,
            n_head: 32,
            n_layer: 32,
            n_rot: 20,
            use_parallel_residual: 1,
            ftype: 1,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(&buf[0..4], &[0x66, 0x6d, 0x67, 0x67]);
        assert_eq!(&buf[4..8], &[1, 0, 0, 0]);
        let words: Vec<i32> = buf[8..]
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(words, header.to_words());
    }

    #[test]
    fn words_roundtrip() {
        let words = [1, 2, 3, 4, 5, 6, 0, 1];
        assert_eq!(FileHeader::from_words(words).to_words(), words);
    }
}
