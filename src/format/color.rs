use serde::{Deserialize, Serialize};

/// Engine-neutral pixel formats understood by every backend translator.
///
/// Multi-byte formats are stored little-endian, i.e. blue first for the RGB formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    /// 8-bit luminance.
    L8,
    /// 8-bit alpha only.
    A8,
    /// 16-bit 5:6:5 RGB.
    Rgb565,
    /// 24-bit RGB (B, G, R in memory).
    Rgb888,
    /// 32-bit RGB with straight alpha (B, G, R, A in memory).
    Argb8888,
    /// 32-bit RGB with an ignored fourth byte.
    Xrgb8888,
}

impl ColorFormat {
    /// Every supported format, in declaration order.
    pub const ALL: [ColorFormat; 6] = [
        ColorFormat::L8,
        ColorFormat::A8,
        ColorFormat::Rgb565,
        ColorFormat::Rgb888,
        ColorFormat::Argb8888,
        ColorFormat::Xrgb8888,
    ];

    /// Byte size of one pixel.
    pub const fn size(self) -> usize {
        match self {
            ColorFormat::L8 | ColorFormat::A8 => 1,
            ColorFormat::Rgb565 => 2,
            ColorFormat::Rgb888 => 3,
            ColorFormat::Argb8888 | ColorFormat::Xrgb8888 => 4,
        }
    }

    /// Return `true` when pixels carry a per-pixel alpha channel.
    pub const fn has_alpha(self) -> bool {
        matches!(self, ColorFormat::A8 | ColorFormat::Argb8888)
    }

    /// Minimum row stride in bytes for `width` pixels.
    pub const fn min_stride(self, width: usize) -> usize {
        width * self.size()
    }
}

/// 32-bit color with straight (non-premultiplied) alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color32 {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color32 {
    /// Create a color from straight RGBA.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create a fully opaque color.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Fully transparent black.
    pub const fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Luminance using the 77/150/29 weights.
    pub fn luminance(self) -> u8 {
        ((u32::from(self.r) * 77 + u32::from(self.g) * 150 + u32::from(self.b) * 29) >> 8) as u8
    }
}

/// Decode one pixel of format `cf` from the start of `px`.
///
/// `px` must hold at least `cf.size()` bytes.
pub fn read_px(cf: ColorFormat, px: &[u8]) -> Color32 {
    match cf {
        ColorFormat::L8 => Color32::opaque(px[0], px[0], px[0]),
        ColorFormat::A8 => Color32::new(0, 0, 0, px[0]),
        ColorFormat::Rgb565 => {
            let v = u16::from_le_bytes([px[0], px[1]]);
            let r = ((v >> 11) & 0x1f) as u8;
            let g = ((v >> 5) & 0x3f) as u8;
            let b = (v & 0x1f) as u8;
            Color32::opaque((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
        }
        ColorFormat::Rgb888 | ColorFormat::Xrgb8888 => Color32::opaque(px[2], px[1], px[0]),
        ColorFormat::Argb8888 => Color32::new(px[2], px[1], px[0], px[3]),
    }
}

/// Encode `c` as one pixel of format `cf` at the start of `px`.
///
/// Formats without alpha drop it; callers blend before writing.
pub fn write_px(cf: ColorFormat, px: &mut [u8], c: Color32) {
    match cf {
        ColorFormat::L8 => px[0] = c.luminance(),
        ColorFormat::A8 => px[0] = c.a,
        ColorFormat::Rgb565 => {
            let v = (u16::from(c.r >> 3) << 11) | (u16::from(c.g >> 2) << 5) | u16::from(c.b >> 3);
            px[..2].copy_from_slice(&v.to_le_bytes());
        }
        ColorFormat::Rgb888 => {
            px[0] = c.b;
            px[1] = c.g;
            px[2] = c.r;
        }
        ColorFormat::Argb8888 => {
            px[0] = c.b;
            px[1] = c.g;
            px[2] = c.r;
            px[3] = c.a;
        }
        ColorFormat::Xrgb8888 => {
            px[0] = c.b;
            px[1] = c.g;
            px[2] = c.r;
            px[3] = 0xff;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/format/color.rs"]
mod tests;
