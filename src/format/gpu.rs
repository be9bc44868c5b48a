//! Translation of engine-neutral formats and blend modes to GPU texture and blend codes.

use bitflags::bitflags;

use crate::format::blend::BlendMode;
use crate::format::color::ColorFormat;
use crate::foundation::error::{BlitError, BlitResult};

/// Native texture formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexFormat {
    /// 16-bit RGB 5:6:5.
    Rgb565,
    /// 24-bit, blue first.
    Bgr24,
    /// 32-bit, blue first, straight alpha.
    Bgra8888,
    /// 32-bit, blue first, fourth byte ignored.
    Bgrx8888,
    /// 8-bit alpha.
    A8,
    /// 8-bit luminance.
    L8,
}

impl TexFormat {
    /// Engine-neutral format with the same memory layout.
    pub const fn color_format(self) -> ColorFormat {
        match self {
            TexFormat::Rgb565 => ColorFormat::Rgb565,
            TexFormat::Bgr24 => ColorFormat::Rgb888,
            TexFormat::Bgra8888 => ColorFormat::Argb8888,
            TexFormat::Bgrx8888 => ColorFormat::Xrgb8888,
            TexFormat::A8 => ColorFormat::A8,
            TexFormat::L8 => ColorFormat::L8,
        }
    }
}

/// Texture sampling filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TexFilter {
    /// Nearest texel.
    #[default]
    PointSample,
    /// Bilinear interpolation of the four nearest texels.
    Bilinear,
}

impl TexFilter {
    /// Antialiased draws sample bilinearly.
    pub const fn for_antialias(antialias: bool) -> Self {
        if antialias {
            TexFilter::Bilinear
        } else {
            TexFilter::PointSample
        }
    }
}

/// Blend factor applied to one side of the blend equation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// `0`.
    Zero,
    /// `1`.
    One,
    /// Source alpha.
    SrcAlpha,
    /// `1 - source alpha`.
    InvSrcAlpha,
    /// Destination color.
    DestColor,
}

bitflags! {
    /// Modifiers applied to the source before blending.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BlopFlags: u32 {
        /// Premultiply source color by source alpha before blending.
        const SRC_PREMULT = 1 << 0;
        /// Multiply the source by the constant color's alpha.
        const MODULATE_A = 1 << 1;
    }
}

/// Complete blend operation: `out = src * src_factor + dst * dst_factor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendOp {
    /// Factor applied to the source.
    pub src: BlendFactor,
    /// Factor applied to the destination.
    pub dst: BlendFactor,
    /// Source modifiers.
    pub flags: BlopFlags,
}

impl BlendOp {
    /// Add modifiers.
    pub fn with(mut self, flags: BlopFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// Map an engine-neutral format to a texture format.
pub fn tex_format(cf: ColorFormat) -> BlitResult<TexFormat> {
    Ok(match cf {
        ColorFormat::Rgb565 => TexFormat::Rgb565,
        ColorFormat::Rgb888 => TexFormat::Bgr24,
        ColorFormat::Argb8888 => TexFormat::Bgra8888,
        ColorFormat::Xrgb8888 => TexFormat::Bgrx8888,
        ColorFormat::A8 => TexFormat::A8,
        ColorFormat::L8 => TexFormat::L8,
    })
}

/// Map a blend mode to a blend operation for a source of format `src_cf`.
///
/// Sources with per-pixel alpha get [`BlopFlags::SRC_PREMULT`].
pub fn blend_op(mode: BlendMode, src_cf: ColorFormat) -> BlitResult<BlendOp> {
    let (src, dst) = match mode {
        BlendMode::Normal => (BlendFactor::One, BlendFactor::InvSrcAlpha),
        BlendMode::Additive => (BlendFactor::One, BlendFactor::One),
        BlendMode::Multiply => (BlendFactor::DestColor, BlendFactor::InvSrcAlpha),
        other => {
            return Err(BlitError::unsupported(format!("gpu has no {other:?} blend")));
        }
    };
    let flags = if src_cf.has_alpha() {
        BlopFlags::SRC_PREMULT
    } else {
        BlopFlags::empty()
    };
    Ok(BlendOp { src, dst, flags })
}

#[cfg(test)]
#[path = "../../tests/unit/format/gpu.rs"]
mod tests;
