//! GPU-style textured rasterizer backend.
//!
//! Every draw binds the destination and the source as textures, sets the clip and blend
//! state, and submits one command list per tile: an axis-aligned `BlitRect`, or a
//! `BlitQuadFit` onto the transformed corners when rotating or scaling.

mod soft;

use std::sync::Arc;

pub use soft::SoftGpu;

use crate::cache::area::CacheArea;
use crate::cache::coherency::CoherencyManager;
use crate::draw::image::ImageDescriptor;
use crate::draw::target::TargetBuffer;
use crate::draw::task::DrawTask;
use crate::format::blend::BlendMode;
use crate::format::color::ColorFormat;
use crate::format::gpu::{self, BlendOp, BlopFlags, TexFilter, TexFormat};
use crate::foundation::core::{Area, OPA_COVER, OPA_MIN, tile_origins};
use crate::foundation::error::{BlitError, BlitResult};
use crate::render::transform::{quad_bounds, transform_matrix, transformed_quad};
use crate::render::unit::{DrawUnit, OpKind, UnitKind, image_extent};

/// Texture binding registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TexBinding {
    /// Address of texel (0, 0).
    pub address: usize,
    /// Width in texels.
    pub w: u32,
    /// Height in texels.
    pub h: u32,
    /// Texel format.
    pub format: TexFormat,
    /// Row stride in bytes; `None` lets the hardware compute it from the width.
    pub stride: Option<usize>,
    /// Sampling filter.
    pub filter: TexFilter,
}

impl TexBinding {
    /// Row stride with the hardware default resolved.
    pub fn resolved_stride(&self) -> usize {
        self.stride
            .unwrap_or_else(|| self.format.color_format().min_stride(self.w as usize))
    }
}

/// One entry of a command list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GpuCommand {
    /// Restrict rasterization to a destination-relative rectangle.
    SetClip(Area),
    /// Bind the render target.
    BindDstTex(TexBinding),
    /// Bind the sampled source.
    BindSrcTex(TexBinding),
    /// Constant color, `0xAARRGGBB`.
    SetConstColor(u32),
    /// Blend state.
    SetBlend(BlendOp),
    /// Draw the source unscaled with its top-left corner at `(x, y)`.
    BlitRect {
        /// Left edge in destination pixels.
        x: i32,
        /// Top edge in destination pixels.
        y: i32,
        /// Width in pixels.
        w: i32,
        /// Height in pixels.
        h: i32,
    },
    /// Stretch the source onto a quad (clockwise from the source's top-left corner).
    BlitQuadFit([kurbo::Point; 4]),
}

/// Commands submitted together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    cmds: Vec<GpuCommand>,
}

impl CommandList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command.
    pub fn push(&mut self, cmd: GpuCommand) {
        self.cmds.push(cmd);
    }

    /// Commands in submission order.
    pub fn commands(&self) -> &[GpuCommand] {
        &self.cmds
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    /// Return `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
}

/// Memory a submission reads and writes.
pub struct GpuMemory<'a> {
    /// Source texture memory.
    pub src: &'a [u8],
    /// Destination texture memory.
    pub dst: &'a mut [u8],
}

/// Driver-level access to a GPU.
pub trait GpuDriver: Send {
    /// Queue `cl` for execution.
    fn submit(&mut self, cl: &CommandList, mem: GpuMemory<'_>) -> BlitResult<()>;

    /// Block until every queued command list has executed.
    fn wait_for_completion(&mut self) -> BlitResult<()>;
}

/// Options for [`GpuUnit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuOpts {
    /// Issue cache clean/invalidate around submissions; off for coherent memory.
    pub cache_maintenance: bool,
}

impl Default for GpuOpts {
    fn default() -> Self {
        Self {
            cache_maintenance: true,
        }
    }
}

impl GpuOpts {
    /// Set [`GpuOpts::cache_maintenance`].
    pub fn with_cache_maintenance(mut self, on: bool) -> Self {
        self.cache_maintenance = on;
        self
    }
}

/// Draw unit driving a GPU.
pub struct GpuUnit {
    driver: Box<dyn GpuDriver>,
    coherency: Arc<CoherencyManager>,
    opts: GpuOpts,
    in_flight: bool,
}

impl std::fmt::Debug for GpuUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuUnit")
            .field("opts", &self.opts)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl GpuUnit {
    /// Create a unit over `driver`.
    pub fn new(
        driver: Box<dyn GpuDriver>,
        coherency: Arc<CoherencyManager>,
        opts: GpuOpts,
    ) -> Self {
        Self {
            driver,
            coherency,
            opts,
            in_flight: false,
        }
    }
}

/// State shared by every tile of one task.
struct BlitSetup {
    clip: Area,
    dst: TexBinding,
    src: TexBinding,
    const_color: Option<u32>,
    blend: BlendOp,
}

impl BlitSetup {
    fn command_list(&self, blit: GpuCommand) -> CommandList {
        let mut cl = CommandList::new();
        cl.push(GpuCommand::SetClip(self.clip));
        cl.push(GpuCommand::BindDstTex(self.dst));
        cl.push(GpuCommand::BindSrcTex(self.src));
        if let Some(c) = self.const_color {
            cl.push(GpuCommand::SetConstColor(c));
        }
        cl.push(GpuCommand::SetBlend(self.blend));
        cl.push(blit);
        cl
    }
}

/// Destination bounds covered by drawing `area` (global coordinates).
fn footprint(task: &DrawTask, area: &Area) -> Area {
    if !task.has_transform() {
        return *area;
    }
    let m = transform_matrix(
        area.origin(),
        task.pivot,
        task.rotation,
        task.scale_x,
        task.scale_y,
    );
    quad_bounds(&transformed_quad(m, area))
}

/// Blit command placing `tile` (global coordinates) into a buffer framed by `frame`.
fn blit_command(task: &DrawTask, tile: &Area, frame: &Area) -> GpuCommand {
    if !task.has_transform() {
        let rel = tile.relative_to(frame);
        return GpuCommand::BlitRect {
            x: rel.x1,
            y: rel.y1,
            w: tile.width(),
            h: tile.height(),
        };
    }
    let m = transform_matrix(
        tile.origin(),
        task.pivot,
        task.rotation,
        task.scale_x,
        task.scale_y,
    );
    let shift = kurbo::Vec2::new(f64::from(frame.x1), f64::from(frame.y1));
    GpuCommand::BlitQuadFit(transformed_quad(m, tile).map(|p| p - shift))
}

impl DrawUnit for GpuUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Gpu
    }

    fn supports(&self, cf: ColorFormat, op: OpKind) -> bool {
        match op {
            OpKind::ReadSource | OpKind::WriteTarget => gpu::tex_format(cf).is_ok(),
            OpKind::Blend(mode) => gpu::blend_op(mode, cf).is_ok(),
            OpKind::Tile | OpKind::Transform => true,
        }
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
        let image_area = task.image_area();
        let anchor = image_extent(&image_area, image);
        let tiles: Vec<Area> = if task.tile {
            tile_origins(anchor, image.width(), image.height(), *clip)
                .filter(|t| t.overlaps(clip))
                .collect()
        } else if footprint(task, &anchor).overlaps(clip) {
            vec![anchor]
        } else {
            Vec::new()
        };
        if tiles.is_empty() {
            return Ok(());
        }

        let frame = target.area();
        let mut blend = gpu::blend_op(task.blend_mode, image.cf())?;
        let const_color = if task.opa < OPA_COVER {
            blend = blend.with(BlopFlags::MODULATE_A);
            Some(u32::from(task.opa) * 0x0101_0101)
        } else {
            None
        };
        // A quad leaves the corners of its clip untouched, so those bytes must reach memory too.
        let reads_dst = image.cf().has_alpha()
            || task.opa < OPA_COVER
            || task.blend_mode != BlendMode::Normal
            || task.has_transform();
        let setup = BlitSetup {
            clip: clip.relative_to(&frame),
            dst: TexBinding {
                address: target.data().as_ptr() as usize,
                w: frame.width() as u32,
                h: frame.height() as u32,
                format: gpu::tex_format(target.cf())?,
                stride: Some(target.stride()),
                filter: TexFilter::PointSample,
            },
            src: TexBinding {
                address: image.data().as_ptr() as usize,
                w: image.header().w,
                h: image.header().h,
                format: gpu::tex_format(image.cf())?,
                stride: (image.header().stride != 0).then_some(image.header().stride),
                filter: TexFilter::for_antialias(task.antialias),
            },
            const_color,
            blend,
        };

        if self.opts.cache_maintenance {
            let window = (!task.tile && !task.has_transform())
                .then(|| clip.intersect(&anchor))
                .flatten();
            let src_ca = match window {
                Some(w) => CacheArea::new(
                    setup.src.address + image.addr().clipped_origin(&image_area, &w),
                    w.width() as usize * image.cf().size(),
                    w.height() as usize,
                    image.stride(),
                ),
                None => CacheArea::new(
                    setup.src.address,
                    image.cf().min_stride(image.header().w as usize),
                    image.header().h as usize,
                    image.stride(),
                ),
            };
            self.coherency.clean_for_hw_read(&src_ca);
            let dst_ca = target
                .cache_area(clip)
                .ok_or_else(|| BlitError::validation(format!("clip {clip:?} is outside target")))?;
            if reads_dst {
                self.coherency.clean_for_hw_read(&dst_ca);
            }
            self.coherency.begin_hw_write(&dst_ca);
        }

        for tile in &tiles {
            let cl = setup.command_list(blit_command(task, tile, &frame));
            self.driver.submit(
                &cl,
                GpuMemory {
                    src: image.data(),
                    dst: target.data_mut(),
                },
            )?;
            self.in_flight = true;
        }
        tracing::trace!(tiles = tiles.len(), "gpu submissions");
        Ok(())
    }

    fn wait_for_completion(&mut self) -> BlitResult<()> {
        if !self.in_flight {
            return Ok(());
        }
        self.driver.wait_for_completion()?;
        self.in_flight = false;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/render/gpu.rs"]
mod tests;
