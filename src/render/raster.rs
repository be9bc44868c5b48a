//! CPU pixel loops shared by the software unit and the emulated hardware drivers.

use kurbo::Affine;

use crate::draw::image::StridedAddr;
use crate::format::blend::BlendMode;
use crate::format::color::{Color32, ColorFormat, read_px, write_px};
use crate::format::gpu::TexFilter;
use crate::foundation::core::Area;
use crate::foundation::math::{div_round, mul_div255_u8};

/// Strided 2D view over pixel bytes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PixelRect {
    pub(crate) addr: StridedAddr,
    pub(crate) cf: ColorFormat,
    pub(crate) w: usize,
    pub(crate) h: usize,
}

impl PixelRect {
    pub(crate) fn new(addr: StridedAddr, cf: ColorFormat, w: usize, h: usize) -> Self {
        Self { addr, cf, w, h }
    }

    fn px_range(&self, x: usize, y: usize) -> std::ops::Range<usize> {
        let start = self.addr.at(x, y);
        start..start + self.cf.size()
    }
}

/// Format-converting copy of `src` into `dst`; both views must have the same size.
pub(crate) fn copy_convert(src: &[u8], s: &PixelRect, dst: &mut [u8], d: &PixelRect) {
    let w = s.w.min(d.w);
    let h = s.h.min(d.h);
    if s.cf == d.cf {
        let row = s.cf.min_stride(w);
        for y in 0..h {
            let so = s.addr.at(0, y);
            let dof = d.addr.at(0, y);
            dst[dof..dof + row].copy_from_slice(&src[so..so + row]);
        }
        return;
    }
    for y in 0..h {
        for x in 0..w {
            let c = read_px(s.cf, &src[s.px_range(x, y)]);
            write_px(d.cf, &mut dst[d.px_range(x, y)], c);
        }
    }
}

/// Straight-alpha source-over of `src` onto `dst` with constant opacity and a blend mode.
pub(crate) fn blend_px(src: Color32, dst: Color32, opa: u8, mode: BlendMode) -> Color32 {
    let sa = mul_div255_u8(src.a, opa);
    if sa == 0 {
        return dst;
    }
    let da = dst.a;
    let out_a = u32::from(sa) + u32::from(mul_div255_u8(da, 255 - sa));
    let sa = u32::from(sa);
    let dw = u32::from(da) * (255 - sa);
    let den = out_a * 255;
    let mix = |s: u8, d: u8| -> u8 {
        let b = u32::from(mode.apply(s, d));
        div_round(b * sa * 255 + u32::from(d) * dw, den).min(255) as u8
    };
    Color32::new(
        mix(src.r, dst.r),
        mix(src.g, dst.g),
        mix(src.b, dst.b),
        out_a.min(255) as u8,
    )
}

/// Blend every pixel of `src` onto the same position of `dst`.
pub(crate) fn blend_rect(
    src: &[u8],
    s: &PixelRect,
    dst: &mut [u8],
    d: &PixelRect,
    opa: u8,
    mode: BlendMode,
) {
    for y in 0..s.h.min(d.h) {
        for x in 0..s.w.min(d.w) {
            let sc = read_px(s.cf, &src[s.px_range(x, y)]);
            let dr = d.px_range(x, y);
            let dc = read_px(d.cf, &dst[dr.clone()]);
            write_px(d.cf, &mut dst[dr], blend_px(sc, dc, opa, mode));
        }
    }
}

/// Read-only source texture.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Texture<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) rect: PixelRect,
}

impl Texture<'_> {
    fn texel(&self, x: i64, y: i64) -> Color32 {
        let x = x.clamp(0, self.rect.w as i64 - 1) as usize;
        let y = y.clamp(0, self.rect.h as i64 - 1) as usize;
        read_px(self.rect.cf, &self.data[self.rect.px_range(x, y)])
    }

    /// Sample at continuous texel coordinates, or `None` outside the texture.
    pub(crate) fn sample(&self, u: f64, v: f64, filter: TexFilter) -> Option<Color32> {
        let (w, h) = (self.rect.w as f64, self.rect.h as f64);
        if !(u >= 0.0 && v >= 0.0 && u < w && v < h) {
            return None;
        }
        match filter {
            TexFilter::PointSample => Some(self.texel(u.floor() as i64, v.floor() as i64)),
            TexFilter::Bilinear => Some(self.bilinear(u - 0.5, v - 0.5)),
        }
    }

    fn bilinear(&self, u: f64, v: f64) -> Color32 {
        let x0 = u.floor();
        let y0 = v.floor();
        let fx = u - x0;
        let fy = v - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let taps = [
            (self.texel(x0, y0), (1.0 - fx) * (1.0 - fy)),
            (self.texel(x0 + 1, y0), fx * (1.0 - fy)),
            (self.texel(x0, y0 + 1), (1.0 - fx) * fy),
            (self.texel(x0 + 1, y0 + 1), fx * fy),
        ];
        let mut acc = [0.0f64; 4];
        for (c, wgt) in taps {
            let a = f64::from(c.a) * wgt;
            acc[0] += f64::from(c.r) * a;
            acc[1] += f64::from(c.g) * a;
            acc[2] += f64::from(c.b) * a;
            acc[3] += a;
        }
        if acc[3] <= 0.0 {
            return Color32::transparent();
        }
        let ch = |v: f64| (v / acc[3]).round().clamp(0.0, 255.0) as u8;
        Color32::new(
            ch(acc[0]),
            ch(acc[1]),
            ch(acc[2]),
            acc[3].round().clamp(0.0, 255.0) as u8,
        )
    }
}

/// Map `tex` into `dst` through `texel_to_dst` and combine each covered pixel.
///
/// `region` is in destination pixel coordinates (relative to `d`) and bounds the pixels
/// visited; pixel centers whose preimage falls outside the texture are left untouched.
/// Returns the number of pixels written.
pub(crate) fn map_texture(
    tex: &Texture<'_>,
    filter: TexFilter,
    texel_to_dst: Affine,
    dst: &mut [u8],
    d: &PixelRect,
    region: &Area,
    mut combine: impl FnMut(Color32, Color32) -> Color32,
) -> usize {
    if texel_to_dst.determinant().abs() < f64::EPSILON {
        return 0;
    }
    let inv = texel_to_dst.inverse();
    let Some(region) = region.intersect(&Area::from_origin_size(0, 0, d.w as i32, d.h as i32))
    else {
        return 0;
    };
    let mut written = 0;
    for y in region.y1..=region.y2 {
        for x in region.x1..=region.x2 {
            let p = inv * kurbo::Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let Some(sc) = tex.sample(p.x, p.y, filter) else {
                continue;
            };
            let dr = d.px_range(x as usize, y as usize);
            let dc = read_px(d.cf, &dst[dr.clone()]);
            write_px(d.cf, &mut dst[dr], combine(sc, dc));
            written += 1;
        }
    }
    written
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
