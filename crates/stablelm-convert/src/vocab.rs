//! Vocabulary table encoding
//!
//! The tokenizer exposes no "token id -> raw bytes" accessor, so token bytes
//! are recovered by decoding `[prefix, id]` and dropping the prefix. The
//! prefix must render as exactly one byte; a tokenizer that violates this
//! produces corrupted entries that are not detected here.

use std::io::Write;
use std::path::Path;

use ggmf_format::writer::write_vocab_entry;

use crate::error::{ConvertError, Result};

/// Minimal tokenizer surface needed for vocabulary extraction.
pub trait TokenDecoder {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// Source of the byte representation of each token id.
pub trait VocabularyByteExtractor {
    fn token_bytes(&self, id: u32) -> Result<Vec<u8>>;
}

/// Hugging Face `tokenizer.json` backed decoder.
pub struct HfTokenDecoder {
    inner: tokenizers::Tokenizer,
}

impl HfTokenDecoder {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| ConvertError::Tokenizer(format!("{}: {e}", path.display())))?;
        Ok(Self { inner })
    }

    /// Load `tokenizer.json` from a model directory.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        Self::from_file(&dir.join("tokenizer.json"))
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl TokenDecoder for HfTokenDecoder {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ConvertError::Tokenizer(format!("encode error: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        // Special tokens are kept so that every id renders as something.
        self.inner
            .decode(ids, false)
            .map_err(|e| ConvertError::Tokenizer(format!("decode error: {e}")))
    }
}

/// Recovers token bytes by decoding `[prefix_id, id]` and stripping the
/// first byte.
pub struct PrefixStripExtractor<'a, D: TokenDecoder> {
    decoder: &'a D,
    prefix_id: u32,
}

impl<'a, D: TokenDecoder> PrefixStripExtractor<'a, D> {
    /// Resolve `prefix` to its first token id.
    pub fn new(decoder: &'a D, prefix: &str) -> Result<Self> {
        let prefix_id = decoder
            .encode(prefix)?
            .first()
            .copied()
            .ok_or_else(|| ConvertError::EmptyPrefix(prefix.to_string()))?;
        tracing::debug!("vocabulary prefix {:?} -> token {}", prefix, prefix_id);
        Ok(Self { decoder, prefix_id })
    }

    pub fn prefix_id(&self) -> u32 {
        self.prefix_id
    }
}

impl<D: TokenDecoder> VocabularyByteExtractor for PrefixStripExtractor<'_, D> {
    fn token_bytes(&self, id: u32) -> Result<Vec<u8>> {
        let text = self.decoder.decode(&[self.prefix_id, id])?;
        let mut bytes = text.into_bytes();
        if bytes.is_empty() {
            return Ok(bytes);
        }
        bytes.remove(0);
        Ok(bytes)
    }
}

/// Write `vocab_size` entries in id order. Returns the number of empty entries.
pub fn write_vocabulary<W: Write, E: VocabularyByteExtractor + ?Sized>(
    writer: &mut W,
    extractor: &E,
    vocab_size: usize,
) -> Result<usize> {
    let mut empty = 0;
    for id in 0..vocab_size {
        let id = u32::try_from(id).map_err(|_| {
            ConvertError::InvalidHyperparameters(format!("vocab_size {vocab_size} exceeds u32"))
        })?;
        let bytes = extractor.token_bytes(id)?;
        if bytes.is_empty() {
            empty += 1;
        }
        write_vocab_entry(writer, &bytes)?;
    }
    Ok(empty)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Concatenating decoder over a fixed id -> piece table.
    pub(crate) struct TableDecoder {
        pieces: Vec<&'static str>,
    }

    impl TableDecoder {
        pub(crate) fn new(pieces: &[&'static str]) -> Self {
            Self { pieces: pieces.to_vec() }
        }
    }

    impl TokenDecoder for TableDecoder {
        fn encode(&self, text: &str) -> Result<Vec<u32>> {
            let by_piece: HashMap<&str, u32> =
                self.pieces.iter().enumerate().map(|(i, p)| (*p, i as u32)).collect();
            Ok(by_piece.get(text).copied().into_iter().collect())
        }

        fn decode(&self, ids: &[u32]) -> Result<String> {
            Ok(ids.iter().map(|&id| self.pieces.get(id as usize).copied().unwrap_or("")).collect())
        }
    }

    #[test]
    fn two_token_vocabulary_bytes() {
        let decoder = TableDecoder::new(&[".", "Hi"]);
        let extractor = PrefixStripExtractor::new(&decoder, ".").unwrap();
        assert_eq!(extractor.prefix_id(), 0);

        let mut buf = Vec::new();
        let empty = write_vocabulary(&mut buf, &extractor, 2).unwrap();
        assert_eq!(empty, 0);
        assert_eq!(buf, [0x01, 0, 0, 0, 0x2E, 0x02, 0, 0, 0, 0x48, 0x69]);
    }

    #[test]
    fn token_rendering_as_nothing_gives_empty_entry() {
        let decoder = TableDecoder::new(&[".", "", "é"]);
        let extractor = PrefixStripExtractor::new(&decoder, ".").unwrap();
        assert_eq!(extractor.token_bytes(1).unwrap(), Vec::<u8>::new());
        assert_eq!(extractor.token_bytes(2).unwrap(), "é".as_bytes());

        let mut buf = Vec::new();
        assert_eq!(write_vocabulary(&mut buf, &extractor, 3).unwrap(), 1);
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        let decoder = TableDecoder::new(&["a", "b"]);
        assert!(matches!(
            PrefixStripExtractor::new(&decoder, "."),
            Err(ConvertError::EmptyPrefix(_))
        ));
    }

    #[test]
    fn entries_cover_every_id_in_order() {
        let decoder = TableDecoder::new(&[".", "a", "bb", "ccc", "dddd"]);
        let extractor = PrefixStripExtractor::new(&decoder, ".").unwrap();
        let mut buf = Vec::new();
        write_vocabulary(&mut buf, &extractor, 5).unwrap();

        let mut pos = 0;
        let mut lens = Vec::new();
        while pos < buf.len() {
            let len = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
            lens.push(len);
            pos += 4 + len;
        }
        assert_eq!(lens, [1, 1, 2, 3, 4]);
    }
}
