//! Run-wide conversion settings

use ggmf_format::GgmlDtype;

/// Requested output precision (`ftype` in the file header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputPrecision {
    /// Every tensor is written as f32.
    F32,
    /// 2-D `.weight` matrices are written as f16, everything else as f32.
    #[default]
    F16,
}

impl OutputPrecision {
    /// Map the numeric command-line flag: 0 is f32, anything else f16.
    pub fn from_ftype(ftype: i32) -> Self {
        if ftype == 0 { Self::F32 } else { Self::F16 }
    }

    pub fn ftype(self) -> i32 {
        match self {
            Self::F32 => 0,
            Self::F16 => 1,
        }
    }

    /// Suffix used in the derived output file name.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F16 => "f16",
        }
    }

    /// Element type for a tensor with this name and squeezed rank.
    pub fn dtype_for(self, name: &str, rank: usize) -> GgmlDtype {
        match self {
            Self::F32 => GgmlDtype::F32,
            Self::F16 if name.ends_with(".weight") && rank == 2 => GgmlDtype::F16,
            Self::F16 => GgmlDtype::F32,
        }
    }
}

/// Immutable configuration passed through the whole conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub precision: OutputPrecision,
    /// Text whose single token prefixes every vocabulary decode.
    pub vocab_prefix: &'static str,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { precision: OutputPrecision::default(), vocab_prefix: "." }
    }
}

impl ConvertOptions {
    pub fn with_precision(precision: OutputPrecision) -> Self {
        Self { precision, ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ftype_mapping() {
        assert_eq!(OutputPrecision::from_ftype(0), OutputPrecision::F32);
        assert_eq!(OutputPrecision::from_ftype(1), OutputPrecision::F16);
        assert_eq!(OutputPrecision::from_ftype(-3), OutputPrecision::F16);
        assert_eq!(OutputPrecision::F32.ftype(), 0);
        assert_eq!(OutputPrecision::F16.ftype(), 1);
        assert_eq!(OutputPrecision::default(), OutputPrecision::F16);
    }

    #[test]
    fn f16_only_for_2d_weights() {
        let p = OutputPrecision::F16;
        assert_eq!(p.dtype_for("gpt_neox.layers.0.mlp.dense_4h_to_h.weight", 2), GgmlDtype::F16);
        assert_eq!(p.dtype_for("gpt_neox.layers.0.input_layernorm.weight", 1), GgmlDtype::F32);
        assert_eq!(p.dtype_for("gpt_neox.layers.0.mlp.dense_4h_to_h.bias", 1), GgmlDtype::F32);
        assert_eq!(p.dtype_for("embed_out.weight_scale", 2), GgmlDtype::F32);
        assert_eq!(p.dtype_for("conv.weight", 3), GgmlDtype::F32);
        assert_eq!(p.dtype_for("weight", 2), GgmlDtype::F32);
    }

    #[test]
    fn f32_mode_ignores_role() {
        let p = OutputPrecision::F32;
        assert_eq!(p.dtype_for("embed_out.weight", 2), GgmlDtype::F32);
    }
}
