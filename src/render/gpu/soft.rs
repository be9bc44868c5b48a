use kurbo::Affine;

use crate::draw::image::StridedAddr;
use crate::format::color::Color32;
use crate::format::gpu::{BlendFactor, BlendOp, BlopFlags};
use crate::foundation::core::Area;
use crate::foundation::error::{BlitError, BlitResult};
use crate::foundation::math::{div_round, mul_div255_u16};
use crate::render::gpu::{CommandList, GpuCommand, GpuDriver, GpuMemory, TexBinding};
use crate::render::raster::{self, PixelRect, Texture};
use crate::render::transform::{quad_bounds, texel_to_quad};

/// GPU emulated on the CPU with the same command semantics.
///
/// Blending happens in premultiplied space, as on the hardware. Command lists execute inside
/// [`GpuDriver::submit`].
#[derive(Debug, Default)]
pub struct SoftGpu {
    submissions: u64,
    pixels: u64,
}

impl SoftGpu {
    /// Create an idle GPU.
    pub fn new() -> Self {
        Self::default()
    }

    /// Command lists executed so far.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    /// Destination pixels written so far.
    pub fn pixels_written(&self) -> u64 {
        self.pixels
    }
}

#[derive(Default)]
struct State {
    clip: Option<Area>,
    dst: Option<TexBinding>,
    src: Option<TexBinding>,
    const_color: u32,
    blend: Option<BlendOp>,
}

fn bound_rect(mem: &[u8], tex: &TexBinding, what: &str) -> BlitResult<PixelRect> {
    let cf = tex.format.color_format();
    let stride = tex.resolved_stride();
    let base = mem.as_ptr() as usize;
    let (w, h) = (tex.w as usize, tex.h as usize);
    let fits = tex.address >= base
        && w > 0
        && h > 0
        && tex.address - base + stride * (h - 1) + cf.min_stride(w) <= mem.len();
    if !fits {
        return Err(BlitError::hardware(format!(
            "{what} texture at {:#x} ({}x{}) is outside the mapped memory",
            tex.address, tex.w, tex.h
        )));
    }
    Ok(PixelRect::new(
        StridedAddr::new(tex.address - base, stride, cf.size()),
        cf,
        w,
        h,
    ))
}

fn factor(f: BlendFactor, sa: u16, dst: u16, da: u16) -> (u16, u16) {
    match f {
        BlendFactor::Zero => (0, 0),
        BlendFactor::One => (255, 255),
        BlendFactor::SrcAlpha => (sa, sa),
        BlendFactor::InvSrcAlpha => (255 - sa, 255 - sa),
        BlendFactor::DestColor => (dst, da),
    }
}

/// `out = src * src_factor + dst * dst_factor` on premultiplied channels.
fn blend_premul(op: &BlendOp, const_a: u8, s: Color32, d: Color32) -> Color32 {
    let mut sa = u16::from(s.a);
    let mut sc = [u16::from(s.r), u16::from(s.g), u16::from(s.b)];
    if op.flags.contains(BlopFlags::SRC_PREMULT) {
        sc = sc.map(|c| mul_div255_u16(c, sa));
    }
    if op.flags.contains(BlopFlags::MODULATE_A) {
        let ca = u16::from(const_a);
        sc = sc.map(|c| mul_div255_u16(c, ca));
        sa = mul_div255_u16(sa, ca);
    }
    let da = u16::from(d.a);
    let dc = [u16::from(d.r), u16::from(d.g), u16::from(d.b)].map(|c| mul_div255_u16(c, da));

    let out: [u16; 3] = std::array::from_fn(|i| {
        let (fs, _) = factor(op.src, sa, dc[i], da);
        let (fd, _) = factor(op.dst, sa, dc[i], da);
        (mul_div255_u16(sc[i], fs) + mul_div255_u16(dc[i], fd)).min(255)
    });
    let (_, fsa) = factor(op.src, sa, 0, da);
    let (_, fda) = factor(op.dst, sa, 0, da);
    let oa = (mul_div255_u16(sa, fsa) + mul_div255_u16(da, fda)).min(255);
    if oa == 0 {
        return Color32::transparent();
    }
    let straight = |c: u16| div_round(u32::from(c) * 255, u32::from(oa)).min(255) as u8;
    Color32::new(
        straight(out[0]),
        straight(out[1]),
        straight(out[2]),
        oa as u8,
    )
}

impl SoftGpu {
    fn blit(
        &mut self,
        st: &State,
        mem: &mut GpuMemory<'_>,
        texel_to_dst: Affine,
        bounds: Area,
    ) -> BlitResult<()> {
        let (Some(dst), Some(src)) = (st.dst, st.src) else {
            return Err(BlitError::hardware("blit without bound textures"));
        };
        let d = bound_rect(&*mem.dst, &dst, "destination")?;
        let s = bound_rect(mem.src, &src, "source")?;
        let region = match st.clip {
            Some(clip) => clip.intersect(&bounds),
            None => Some(bounds),
        };
        let Some(region) = region else {
            return Ok(());
        };
        let op = st.blend.unwrap_or(BlendOp {
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
            flags: BlopFlags::empty(),
        });
        let const_a = (st.const_color >> 24) as u8;
        let tex = Texture {
            data: mem.src,
            rect: s,
        };
        let n = raster::map_texture(
            &tex,
            src.filter,
            texel_to_dst,
            &mut *mem.dst,
            &d,
            &region,
            |sc, dc| blend_premul(&op, const_a, sc, dc),
        );
        self.pixels += n as u64;
        Ok(())
    }
}

impl GpuDriver for SoftGpu {
    fn submit(&mut self, cl: &CommandList, mut mem: GpuMemory<'_>) -> BlitResult<()> {
        let mut st = State {
            const_color: u32::MAX,
            ..State::default()
        };
        for cmd in cl.commands() {
            match *cmd {
                GpuCommand::SetClip(a) => st.clip = Some(a),
                GpuCommand::BindDstTex(t) => st.dst = Some(t),
                GpuCommand::BindSrcTex(t) => st.src = Some(t),
                GpuCommand::SetConstColor(c) => st.const_color = c,
                GpuCommand::SetBlend(op) => st.blend = Some(op),
                GpuCommand::BlitRect { x, y, w, h } => {
                    let m = Affine::translate((f64::from(x), f64::from(y)));
                    self.blit(&st, &mut mem, m, Area::from_origin_size(x, y, w, h))?;
                }
                GpuCommand::BlitQuadFit(quad) => {
                    let Some(src) = st.src else {
                        return Err(BlitError::hardware("blit without bound textures"));
                    };
                    let m = texel_to_quad(&quad, f64::from(src.w), f64::from(src.h));
                    self.blit(&st, &mut mem, m, quad_bounds(&quad))?;
                }
            }
        }
        self.submissions += 1;
        Ok(())
    }

    fn wait_for_completion(&mut self) -> BlitResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/render/gpu_soft.rs"]
mod tests;
