//! 2D DMA blitter backend.
//!
//! One draw is one memory-to-memory transfer: a plain format-converting copy, or a blend of
//! the foreground (source) with the background (the destination itself). Line offsets are in
//! pixels, so strides must be whole multiples of the pixel size.

mod soft;

use std::sync::Arc;

pub use soft::SoftDma2d;

use crate::cache::area::CacheArea;
use crate::cache::coherency::CoherencyManager;
use crate::draw::image::ImageDescriptor;
use crate::draw::target::TargetBuffer;
use crate::draw::task::DrawTask;
use crate::format::color::ColorFormat;
use crate::format::dma2d::{self, Dma2dFgBgCf, Dma2dOutputCf};
use crate::foundation::core::{Area, OPA_COVER, OPA_MAX, OPA_MIN, Opa};
use crate::foundation::error::{BlitError, BlitResult};
use crate::render::unit::{DrawUnit, OpKind, UnitKind, image_extent, required_ops};

/// Transfer mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dma2dMode {
    /// Memory to memory with pixel-format conversion.
    MemToMemPfc,
    /// Memory to memory blending foreground over background.
    MemToMemBlend,
}

/// How the foreground alpha is derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    /// Use the pixel alpha.
    NoModify,
    /// Use the constant alpha instead of the pixel alpha.
    Replace,
    /// Multiply the pixel alpha by the constant alpha.
    Multiply,
}

/// Foreground layer registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FgLayer {
    /// Address of the first pixel.
    pub address: usize,
    /// Pixels skipped at the end of each line.
    pub offset: usize,
    /// Color mode.
    pub cf: Dma2dFgBgCf,
    /// Alpha derivation.
    pub alpha_mode: AlphaMode,
    /// Constant alpha.
    pub alpha: Opa,
}

/// Background layer registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BgLayer {
    /// Address of the first pixel.
    pub address: usize,
    /// Pixels skipped at the end of each line.
    pub offset: usize,
    /// Color mode.
    pub cf: Dma2dFgBgCf,
}

/// Everything programmed for one transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransferDescriptor {
    /// Transfer mode.
    pub mode: Dma2dMode,
    /// Pixels per line.
    pub w: usize,
    /// Lines.
    pub h: usize,
    /// Output address of the first pixel.
    pub output_address: usize,
    /// Output pixels skipped at the end of each line.
    pub output_offset: usize,
    /// Output color mode.
    pub output_cf: Dma2dOutputCf,
    /// Foreground (source) layer.
    pub fg: FgLayer,
    /// Background layer; set only for blending.
    pub bg: Option<BgLayer>,
}

/// Memory a transfer reads and writes.
///
/// Addresses in the descriptor point inside these slices.
pub struct TransferMemory<'a> {
    /// Source pixels.
    pub fg: &'a [u8],
    /// Destination pixels (also the background when blending).
    pub output: &'a mut [u8],
}

/// Driver-level access to a DMA2D engine.
pub trait Dma2dDriver: Send {
    /// Program the registers from `conf` and start the transfer.
    fn configure_and_execute(
        &mut self,
        conf: &TransferDescriptor,
        mem: TransferMemory<'_>,
    ) -> BlitResult<()>;

    /// Block until the last transfer has finished.
    fn wait_for_finish(&mut self) -> BlitResult<()>;
}

/// Options for [`Dma2dUnit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dma2dOpts {
    /// Issue cache clean/invalidate around transfers; off for coherent memory.
    pub cache_maintenance: bool,
}

impl Default for Dma2dOpts {
    fn default() -> Self {
        Self {
            cache_maintenance: true,
        }
    }
}

impl Dma2dOpts {
    /// Set [`Dma2dOpts::cache_maintenance`].
    pub fn with_cache_maintenance(mut self, on: bool) -> Self {
        self.cache_maintenance = on;
        self
    }
}

/// Draw unit driving a DMA2D engine.
pub struct Dma2dUnit {
    driver: Box<dyn Dma2dDriver>,
    coherency: Arc<CoherencyManager>,
    opts: Dma2dOpts,
    writing_area: Option<CacheArea>,
    in_flight: bool,
}

impl std::fmt::Debug for Dma2dUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dma2dUnit")
            .field("opts", &self.opts)
            .field("writing_area", &self.writing_area)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl Dma2dUnit {
    /// Create a unit over `driver`.
    pub fn new(
        driver: Box<dyn Dma2dDriver>,
        coherency: Arc<CoherencyManager>,
        opts: Dma2dOpts,
    ) -> Self {
        Self {
            driver,
            coherency,
            opts,
            writing_area: None,
            in_flight: false,
        }
    }

    /// Destination region of the most recent transfer.
    pub fn writing_area(&self) -> Option<CacheArea> {
        self.writing_area
    }

    fn submit(
        &mut self,
        conf: &TransferDescriptor,
        src: &CacheArea,
        dst: &CacheArea,
        mem: TransferMemory<'_>,
    ) -> BlitResult<()> {
        if self.opts.cache_maintenance {
            self.coherency.clean_for_hw_read(src);
            // A plain copy overwrites every destination byte; only blending reads it.
            if conf.bg.is_some() {
                self.coherency.clean_for_hw_read(dst);
            }
            self.coherency.begin_hw_write(dst);
        }
        self.writing_area = Some(*dst);
        tracing::trace!(mode = ?conf.mode, w = conf.w, h = conf.h, "dma2d transfer");
        self.driver.configure_and_execute(conf, mem)?;
        self.in_flight = true;
        Ok(())
    }
}

fn stride_in_pixels(stride: usize, cf: ColorFormat, what: &str) -> BlitResult<usize> {
    let px = cf.size();
    if stride % px != 0 {
        return Err(BlitError::unsupported(format!(
            "dma2d {what} stride {stride} is not a multiple of the {px}-byte pixel"
        )));
    }
    Ok(stride / px)
}

/// Whether drawing `src_cf` at `opa` reads the destination back as a background layer.
fn blends(src_cf: ColorFormat, opa: Opa) -> bool {
    opa < OPA_MAX || src_cf.has_alpha()
}

/// The background layer of an XRGB destination would read its padding byte as alpha.
fn check_background(dst_cf: ColorFormat) -> BlitResult<()> {
    if dst_cf == ColorFormat::Xrgb8888 {
        return Err(BlitError::unsupported(
            "dma2d cannot blend onto Xrgb8888: padding reads as background alpha",
        ));
    }
    Ok(())
}

/// Registers for drawing `w` x `h` pixels with opacity `opa`.
///
/// `opa >= OPA_MAX` draws an opaque image: a plain converting copy when the source has no
/// alpha, otherwise a blend using the pixel alpha. Lower opacities always blend with the
/// foreground alpha scaled by `opa`. Blending onto [`ColorFormat::Xrgb8888`] is refused.
pub fn image_transfer(
    src_cf: ColorFormat,
    dst_cf: ColorFormat,
    opa: Opa,
    w: usize,
    h: usize,
    fg: (usize, usize),
    output: (usize, usize),
) -> BlitResult<TransferDescriptor> {
    let output_cf = dma2d::output_cf(dst_cf)?;
    let fg_cf = dma2d::fgbg_cf(src_cf)?;
    let bg_cf = dma2d::fgbg_cf(dst_cf)?;
    let (fg_address, fg_offset) = fg;
    let (output_address, output_offset) = output;

    let (mode, alpha_mode, alpha) = if !blends(src_cf, opa) {
        (Dma2dMode::MemToMemPfc, AlphaMode::NoModify, OPA_COVER)
    } else if opa >= OPA_MAX {
        (Dma2dMode::MemToMemBlend, AlphaMode::NoModify, OPA_COVER)
    } else if src_cf.has_alpha() {
        (Dma2dMode::MemToMemBlend, AlphaMode::Multiply, opa)
    } else {
        // The fourth byte of an XRGB source is not alpha.
        (Dma2dMode::MemToMemBlend, AlphaMode::Replace, opa)
    };

    if mode == Dma2dMode::MemToMemBlend {
        check_background(dst_cf)?;
    }
    let bg = (mode == Dma2dMode::MemToMemBlend).then(|| BgLayer {
        address: output_address,
        offset: output_offset,
        cf: bg_cf,
    });

    Ok(TransferDescriptor {
        mode,
        w,
        h,
        output_address,
        output_offset,
        output_cf,
        fg: FgLayer {
            address: fg_address,
            offset: fg_offset,
            cf: fg_cf,
            alpha_mode,
            alpha,
        },
        bg,
    })
}

impl DrawUnit for Dma2dUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Dma2d
    }

    fn supports(&self, cf: ColorFormat, op: OpKind) -> bool {
        match op {
            OpKind::ReadSource => dma2d::fgbg_cf(cf).is_ok(),
            OpKind::WriteTarget => dma2d::output_cf(cf).is_ok(),
            OpKind::Blend(mode) => dma2d::blend(mode).is_ok(),
            OpKind::Tile | OpKind::Transform => false,
        }
    }

    fn check(&self, task: &DrawTask, target: &TargetBuffer) -> BlitResult<()> {
        for (cf, op) in required_ops(task, task.src.format(), target.cf()) {
            if !self.supports(cf, op) {
                return Err(BlitError::unsupported(format!("dma2d cannot {op:?} {cf:?}")));
            }
        }
        if blends(task.src.format(), task.opa) {
            check_background(target.cf())?;
        }
        stride_in_pixels(target.stride(), target.cf(), "output")?;
        if let Some(hdr) = task.src.header() {
            stride_in_pixels(hdr.resolved_stride(), hdr.cf, "foreground")?;
        }
        Ok(())
    }

    fn execute(
        &mut self,
        task: &DrawTask,
        image: &ImageDescriptor,
        target: &mut TargetBuffer,
        clip: &Area,
    ) -> BlitResult<()> {
        if task.opa <= OPA_MIN {
            return Ok(());
        }
        if task.tile || task.has_transform() {
            return Err(BlitError::unsupported("dma2d cannot tile or transform"));
        }
        dma2d::blend(task.blend_mode)?;
        let image_area = task.image_area();
        let Some(clip) = clip.intersect(&image_extent(&image_area, image)) else {
            return Ok(());
        };
        let w = clip.width() as usize;
        let h = clip.height() as usize;

        let src_px = image.cf().size();
        let src_line = stride_in_pixels(image.stride(), image.cf(), "foreground")?;
        let dst_line = stride_in_pixels(target.stride(), target.cf(), "output")?;

        let fg_address =
            image.data().as_ptr() as usize + image.addr().clipped_origin(&image_area, &clip);
        let dst_off = target
            .offset_of(clip.x1, clip.y1)
            .ok_or_else(|| BlitError::validation(format!("clip {clip:?} is outside target")))?;
        let output_address = target.data().as_ptr() as usize + dst_off;

        let conf = image_transfer(
            image.cf(),
            target.cf(),
            task.opa,
            w,
            h,
            (fg_address, src_line - w),
            (output_address, dst_line - w),
        )?;

        let src_ca = CacheArea::new(fg_address, w * src_px, h, image.stride());
        let dst_ca = target
            .cache_area(&clip)
            .ok_or_else(|| BlitError::validation(format!("clip {clip:?} is outside target")))?;
        self.submit(
            &conf,
            &src_ca,
            &dst_ca,
            TransferMemory {
                fg: image.data(),
                output: target.data_mut(),
            },
        )
    }

    fn wait_for_completion(&mut self) -> BlitResult<()> {
        if !self.in_flight {
            return Ok(());
        }
        self.driver.wait_for_finish()?;
        self.in_flight = false;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/render/dma2d.rs"]
mod tests;
