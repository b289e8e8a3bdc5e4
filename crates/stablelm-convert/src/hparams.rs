//! Hyperparameter extraction from a Hugging Face `config.json`

use serde::{Deserialize, Serialize};
use std::path::Path;

use ggmf_format::FileHeader;
use ggmf_format::writer::to_i32_field;

use crate::error::{ConvertError, Result};
use crate::options::OutputPrecision;

/// Keys read from `config.json`. Everything is optional at the serde level so
/// that a missing key can be reported by name.
#[derive(Debug, Deserialize)]
struct SourceConfig {
    vocab_size: Option<u64>,
    max_position_embeddings: Option<u64>,
    hidden_size: Option<u64>,
    num_attention_heads: Option<u64>,
    num_hidden_layers: Option<u64>,
    rotary_pct: Option<f64>,
    use_parallel_residual: Option<ResidualFlag>,
}

/// `use_parallel_residual` appears both as a JSON bool and as an integer.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum ResidualFlag {
    Bool(bool),
    Int(i64),
}

impl ResidualFlag {
    fn as_bool(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(i) => i != 0,
        }
    }
}

fn require<T>(value: Option<T>, key: &'static str) -> Result<T> {
    value.ok_or(ConvertError::MissingConfigKey(key))
}

fn to_usize(value: u64, key: &'static str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| ConvertError::InvalidConfigValue { key, value: value.to_string() })
}

/// Architecture hyperparameters of a GPT-NeoX style model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hyperparameters {
    pub vocab_size: usize,
    pub max_position_embeddings: usize,
    pub hidden_size: usize,
    pub num_attention_heads: usize,
    pub num_hidden_layers: usize,
    pub rotary_pct: f64,
    pub use_parallel_residual: bool,
    /// Always 1; a convention of the output format, not a model property.
    pub multiple_of: usize,
}

impl Hyperparameters {
    /// Load from a `config.json` file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: serde_json::Value = serde_json::from_str(&content)?;
        Self::from_config(&config)
    }

    /// Extract from an already parsed config. Every key is required.
    pub fn from_config(config: &serde_json::Value) -> Result<Self> {
        let raw = SourceConfig::deserialize(config)?;

        let rotary_pct = require(raw.rotary_pct, "rotary_pct")?;
        if !rotary_pct.is_finite() || rotary_pct < 0.0 {
            return Err(ConvertError::InvalidConfigValue {
                key: "rotary_pct",
                value: rotary_pct.to_string(),
            });
        }

        let hparams = Self {
            vocab_size: to_usize(require(raw.vocab_size, "vocab_size")?, "vocab_size")?,
            max_position_embeddings: to_usize(
                require(raw.max_position_embeddings, "max_position_embeddings")?,
                "max_position_embeddings",
            )?,
            hidden_size: to_usize(require(raw.hidden_size, "hidden_size")?, "hidden_size")?,
            num_attention_heads: to_usize(
                require(raw.num_attention_heads, "num_attention_heads")?,
                "num_attention_heads",
            )?,
            num_hidden_layers: to_usize(
                require(raw.num_hidden_layers, "num_hidden_layers")?,
                "num_hidden_layers",
            )?,
            rotary_pct,
            use_parallel_residual: require(raw.use_parallel_residual, "use_parallel_residual")?
                .as_bool(),
            multiple_of: 1,
        };
        hparams.validate()?;
        Ok(hparams)
    }

    /// Check the invariants the derived fields depend on.
    pub fn validate(&self) -> Result<()> {
        if self.num_attention_heads == 0 {
            return Err(ConvertError::InvalidHyperparameters(
                "num_attention_heads must be non-zero".to_string(),
            ));
        }
        if self.hidden_size % self.num_attention_heads != 0 {
            return Err(ConvertError::InvalidHyperparameters(format!(
                "hidden_size ({}) must be divisible by num_attention_heads ({})",
                self.hidden_size, self.num_attention_heads
            )));
        }
        Ok(())
    }

    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    /// `floor(rotary_pct * head_dim)`.
    pub fn rotary_dim(&self) -> usize {
        (self.rotary_pct * self.head_dim() as f64) as usize
    }

    /// The on-disk hyperparameter block for a given output precision.
    pub fn to_file_header(&self, precision: OutputPrecision) -> Result<FileHeader> {
        Ok(FileHeader {
            n_vocab: to_i32_field("vocab_size", self.vocab_size)?,
            n_ctx: to_i32_field("max_position_embeddings", self.max_position_embeddings)?,
            n_embd: to_i32_field("hidden_size", self.hidden_size)?,
            n_head: to_i32_field("num_attention_heads", self.num_attention_heads)?,
            n_layer: to_i32_field("num_hidden_layers", self.num_hidden_layers)?,
            n_rot: to_i32_field("rotary_dim", self.rotary_dim())?,
            use_parallel_residual: i32::from(self.use_parallel_residual),
            ftype: precision.ftype(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stablelm_3b() -> serde_json::Value {
        json!({
            "architectures": ["GPTNeoXForCausalLM"],
            "vocab_size": 50688,
            "max_position_embeddings": 4096,
            "hidden_size": 2560,
            "num_attention_heads": 32,
            "num_hidden_layers": 32,
            "rotary_pct": 0.25,
            "use_parallel_residual": true,
            "intermediate_size": 10240
        })
    }

    #[test]
    fn extracts_stablelm_3b() {
        let hp = Hyperparameters::from_config(&stablelm_3b()).unwrap();
        assert_eq!(hp.vocab_size, 50688);
        assert_eq!(hp.head_dim(), 80);
        assert_eq!(hp.rotary_dim(), 20);
        assert!(hp.use_parallel_residual);
        assert_eq!(hp.multiple_of, 1);
    }

    #[test]
    fn rotary_dim_truncates() {
        let mut cfg = stablelm_3b();
        // 0.33 * 80 = 26.4
        cfg["rotary_pct"] = json!(0.33);
        let hp = Hyperparameters::from_config(&cfg).unwrap();
        assert_eq!(hp.rotary_dim(), 26);
    }

    #[test]
    fn integer_residual_flag_is_coerced() {
        let mut cfg = stablelm_3b();
        cfg["use_parallel_residual"] = json!(0);
        assert!(!Hyperparameters::from_config(&cfg).unwrap().use_parallel_residual);
        cfg["use_parallel_residual"] = json!(2);
        let header = Hyperparameters::from_config(&cfg)
            .unwrap()
            .to_file_header(OutputPrecision::F16)
            .unwrap();
        assert_eq!(header.use_parallel_residual, 1);
    }

    #[test]
    fn missing_key_is_fatal_and_named() {
        for key in [
            "vocab_size",
            "max_position_embeddings",
            "hidden_size",
            "num_attention_heads",
            "num_hidden_layers",
            "rotary_pct",
            "use_parallel_residual",
        ] {
            let mut cfg = stablelm_3b();
            cfg.as_object_mut().unwrap().remove(key);
            let err = Hyperparameters::from_config(&cfg).unwrap_err();
            assert!(
                matches!(err, ConvertError::MissingConfigKey(k) if k == key),
                "expected missing `{key}`, got {err}"
            );
        }
    }

    #[test]
    fn indivisible_heads_are_rejected() {
        let mut cfg = stablelm_3b();
        cfg["num_attention_heads"] = json!(3);
        assert!(matches!(
            Hyperparameters::from_config(&cfg),
            Err(ConvertError::InvalidHyperparameters(_))
        ));
        cfg["num_attention_heads"] = json!(0);
        assert!(Hyperparameters::from_config(&cfg).is_err());
    }

    #[test]
    fn mistyped_value_is_an_error() {
        let mut cfg = stablelm_3b();
        cfg["hidden_size"] = json!("2560");
        assert!(matches!(Hyperparameters::from_config(&cfg), Err(ConvertError::Json(_))));
    }

    #[test]
    fn file_header_field_order() {
        let hp = Hyperparameters::from_config(&stablelm_3b()).unwrap();
        let header = hp.to_file_header(OutputPrecision::F32).unwrap();
        assert_eq!(header.to_words(), [50688, 4096, 2560, 32, 32, 20, 1, 0]);
    }
}
