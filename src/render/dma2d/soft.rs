use crate::format::blend::BlendMode;
use crate::format::color::{ColorFormat, read_px, write_px};
use crate::format::dma2d::{Dma2dFgBgCf, Dma2dOutputCf};
use crate::foundation::error::{BlitError, BlitResult};
use crate::foundation::math::mul_div255_u8;
use crate::render::dma2d::{
    AlphaMode, Dma2dDriver, Dma2dMode, TransferDescriptor, TransferMemory,
};
use crate::render::raster::blend_px;

/// DMA2D engine emulated on the CPU with the same register semantics.
///
/// Transfers complete inside [`Dma2dDriver::configure_and_execute`].
#[derive(Debug, Default)]
pub struct SoftDma2d {
    transfers: u64,
}

impl SoftDma2d {
    /// Create an idle engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers executed so far.
    pub fn transfers(&self) -> u64 {
        self.transfers
    }
}

fn fgbg_format(cf: Dma2dFgBgCf) -> BlitResult<ColorFormat> {
    match cf {
        Dma2dFgBgCf::Argb8888 => Ok(ColorFormat::Argb8888),
        Dma2dFgBgCf::Rgb888 => Ok(ColorFormat::Rgb888),
        Dma2dFgBgCf::Rgb565 => Ok(ColorFormat::Rgb565),
        other => Err(BlitError::hardware(format!(
            "dma2d emulator has no {other:?} input"
        ))),
    }
}

fn output_format(cf: Dma2dOutputCf) -> BlitResult<ColorFormat> {
    match cf {
        Dma2dOutputCf::Argb8888 => Ok(ColorFormat::Argb8888),
        Dma2dOutputCf::Rgb888 => Ok(ColorFormat::Rgb888),
        Dma2dOutputCf::Rgb565 => Ok(ColorFormat::Rgb565),
        other => Err(BlitError::hardware(format!(
            "dma2d emulator has no {other:?} output"
        ))),
    }
}

/// Bus view of one memory region: maps addresses back into a slice.
struct Lines {
    start: usize,
    pitch: usize,
    px: usize,
}

impl Lines {
    fn new(
        slice: &[u8],
        address: usize,
        (w, h): (usize, usize),
        offset: usize,
        px: usize,
    ) -> BlitResult<Self> {
        let base = slice.as_ptr() as usize;
        let pitch = (w + offset) * px;
        let in_range = address >= base
            && (h == 0 || address - base + pitch * (h - 1) + w * px <= slice.len());
        if !in_range {
            return Err(BlitError::hardware(format!(
                "dma2d address {address:#x} with {w}x{h} pixels is outside the mapped memory"
            )));
        }
        Ok(Self {
            start: address - base,
            pitch,
            px,
        })
    }

    fn at(&self, x: usize, y: usize) -> std::ops::Range<usize> {
        let i = self.start + self.pitch * y + self.px * x;
        i..i + self.px
    }
}

impl Dma2dDriver for SoftDma2d {
    fn configure_and_execute(
        &mut self,
        conf: &TransferDescriptor,
        mem: TransferMemory<'_>,
    ) -> BlitResult<()> {
        let (w, h) = (conf.w, conf.h);
        let fg_cf = fgbg_format(conf.fg.cf)?;
        let out_cf = output_format(conf.output_cf)?;
        let fg = Lines::new(mem.fg, conf.fg.address, (w, h), conf.fg.offset, fg_cf.size())?;
        let out = Lines::new(
            &*mem.output,
            conf.output_address,
            (w, h),
            conf.output_offset,
            out_cf.size(),
        )?;

        match conf.mode {
            Dma2dMode::MemToMemPfc => {
                for y in 0..h {
                    for x in 0..w {
                        let c = read_px(fg_cf, &mem.fg[fg.at(x, y)]);
                        write_px(out_cf, &mut mem.output[out.at(x, y)], c);
                    }
                }
            }
            Dma2dMode::MemToMemBlend => {
                let bg_conf = conf
                    .bg
                    .ok_or_else(|| BlitError::hardware("blend transfer without background"))?;
                if bg_conf.address != conf.output_address || bg_conf.offset != conf.output_offset
                {
                    return Err(BlitError::hardware(
                        "dma2d emulator blends in place only (background == output)",
                    ));
                }
                let bg_cf = fgbg_format(bg_conf.cf)?;
                for y in 0..h {
                    for x in 0..w {
                        let mut c = read_px(fg_cf, &mem.fg[fg.at(x, y)]);
                        c.a = match conf.fg.alpha_mode {
                            AlphaMode::NoModify => c.a,
                            AlphaMode::Replace => conf.fg.alpha,
                            AlphaMode::Multiply => mul_div255_u8(c.a, conf.fg.alpha),
                        };
                        let r = out.at(x, y);
                        let bg = read_px(bg_cf, &mem.output[r.clone()]);
                        let blended = blend_px(c, bg, 255, BlendMode::Normal);
                        write_px(out_cf, &mut mem.output[r], blended);
                    }
                }
            }
        }
        self.transfers += 1;
        Ok(())
    }

    fn wait_for_finish(&mut self) -> BlitResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/render/dma2d_soft.rs"]
mod tests;
