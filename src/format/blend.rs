use serde::{Deserialize, Serialize};

use crate::foundation::math::mul_div255_u8;

/// Engine-neutral blend modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Source over destination.
    #[default]
    Normal,
    /// Add source to destination, saturating.
    Additive,
    /// Subtract source from destination, saturating at zero.
    Subtractive,
    /// Multiply source and destination.
    Multiply,
    /// Absolute difference of source and destination.
    Difference,
}

impl BlendMode {
    /// Every blend mode, in declaration order.
    pub const ALL: [BlendMode; 5] = [
        BlendMode::Normal,
        BlendMode::Additive,
        BlendMode::Subtractive,
        BlendMode::Multiply,
        BlendMode::Difference,
    ];

    /// Combine one source and one destination channel before alpha mixing.
    pub fn apply(self, src: u8, dst: u8) -> u8 {
        match self {
            BlendMode::Normal => src,
            BlendMode::Additive => src.saturating_add(dst),
            BlendMode::Subtractive => dst.saturating_sub(src),
            BlendMode::Multiply => mul_div255_u8(src, dst),
            BlendMode::Difference => src.abs_diff(dst),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/format/blend.rs"]
mod tests;
