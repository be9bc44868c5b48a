//! Translation of engine-neutral formats and blend modes to DMA2D register codes.

use crate::format::blend::BlendMode;
use crate::format::color::ColorFormat;
use crate::foundation::error::{BlitError, BlitResult};

/// Output (destination) color mode register values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Dma2dOutputCf {
    /// 32-bit ARGB.
    Argb8888 = 0,
    /// 24-bit RGB.
    Rgb888 = 1,
    /// 16-bit RGB 5:6:5.
    Rgb565 = 2,
    /// 16-bit ARGB 1:5:5:5.
    Argb1555 = 3,
    /// 16-bit ARGB 4:4:4:4.
    Argb4444 = 4,
}

/// Foreground/background color mode register values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Dma2dFgBgCf {
    /// 32-bit ARGB.
    Argb8888 = 0,
    /// 24-bit RGB.
    Rgb888 = 1,
    /// 16-bit RGB 5:6:5.
    Rgb565 = 2,
    /// 16-bit ARGB 1:5:5:5.
    Argb1555 = 3,
    /// 16-bit ARGB 4:4:4:4.
    Argb4444 = 4,
    /// 8-bit luminance with alpha.
    L8 = 5,
    /// 8-bit alpha.
    A8 = 9,
}

impl Dma2dOutputCf {
    /// Bytes per pixel written by the engine.
    pub const fn size(self) -> usize {
        match self {
            Dma2dOutputCf::Argb8888 => 4,
            Dma2dOutputCf::Rgb888 => 3,
            Dma2dOutputCf::Rgb565 | Dma2dOutputCf::Argb1555 | Dma2dOutputCf::Argb4444 => 2,
        }
    }
}

/// Map a destination format to the output color mode.
pub fn output_cf(cf: ColorFormat) -> BlitResult<Dma2dOutputCf> {
    match cf {
        ColorFormat::Argb8888 | ColorFormat::Xrgb8888 => Ok(Dma2dOutputCf::Argb8888),
        ColorFormat::Rgb888 => Ok(Dma2dOutputCf::Rgb888),
        ColorFormat::Rgb565 => Ok(Dma2dOutputCf::Rgb565),
        other => Err(BlitError::unsupported(format!("dma2d cannot write {other:?}"))),
    }
}

/// Map a source format to the foreground/background color mode.
///
/// The engine has an `L8` mode but it reads a palette index, not luminance, so `L8` is refused.
pub fn fgbg_cf(cf: ColorFormat) -> BlitResult<Dma2dFgBgCf> {
    match cf {
        ColorFormat::Argb8888 | ColorFormat::Xrgb8888 => Ok(Dma2dFgBgCf::Argb8888),
        ColorFormat::Rgb888 => Ok(Dma2dFgBgCf::Rgb888),
        ColorFormat::Rgb565 => Ok(Dma2dFgBgCf::Rgb565),
        other => Err(BlitError::unsupported(format!("dma2d cannot read {other:?}"))),
    }
}

/// The engine only implements source-over blending.
pub fn blend(mode: BlendMode) -> BlitResult<()> {
    match mode {
        BlendMode::Normal => Ok(()),
        other => Err(BlitError::unsupported(format!("dma2d has no {other:?} blend"))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/format/dma2d.rs"]
mod tests;
