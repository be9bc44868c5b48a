use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::draw::image::ImageDescriptor;
use crate::draw::target::TargetBuffer;
use crate::draw::task::DrawTask;
use crate::format::blend::BlendMode;
use crate::format::color::ColorFormat;
use crate::foundation::core::Area;
use crate::foundation::error::{BlitError, BlitResult};

/// Backend families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// CPU loops; executes everything.
    Software,
    /// 2D DMA blitter.
    Dma2d,
    /// GPU-style textured rasterizer.
    Gpu,
}

impl UnitKind {
    /// Selection score when several units can run a task; lower wins.
    pub const fn default_preference(self) -> u32 {
        match self {
            UnitKind::Software => 100,
            UnitKind::Dma2d => 60,
            UnitKind::Gpu => 70,
        }
    }

    /// Short lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            UnitKind::Software => "software",
            UnitKind::Dma2d => "dma2d",
            UnitKind::Gpu => "gpu",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration index of a unit inside a dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub usize);

/// Operation kinds a unit advertises per color format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Read pixels of the format as a source.
    ReadSource,
    /// Write pixels of the format to a target.
    WriteTarget,
    /// Blend a source of the format with the given mode.
    Blend(BlendMode),
    /// Repeat a source of the format across the destination.
    Tile,
    /// Rotate or scale a source of the format.
    Transform,
}

/// Operations `task` needs for a source of format `src_cf` drawn into a `dst_cf` target.
pub fn required_ops(
    task: &DrawTask,
    src_cf: ColorFormat,
    dst_cf: ColorFormat,
) -> SmallVec<[(ColorFormat, OpKind); 5]> {
    let mut ops = SmallVec::new();
    ops.push((src_cf, OpKind::ReadSource));
    ops.push((dst_cf, OpKind::WriteTarget));
    ops.push((src_cf, OpKind::Blend(task.blend_mode)));
    if task.tile {
        ops.push((src_cf, OpKind::Tile));
    }
    if task.has_transform() {
        ops.push((src_cf, OpKind::Transform));
    }
    ops
}

/// `image_area` resized to the pixels `image` actually has.
pub(crate) fn image_extent(image_area: &Area, image: &ImageDescriptor) -> Area {
    Area::from_origin_size(image_area.x1, image_area.y1, image.width(), image.height())
}

/// An interchangeable execution engine for draw tasks.
pub trait DrawUnit: Send {
    /// Backend family.
    fn kind(&self) -> UnitKind;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Capability query.
    fn supports(&self, cf: ColorFormat, op: OpKind) -> bool;

    /// Selection score; lower wins.
    fn preference(&self) -> u32 {
        self.kind().default_preference()
    }

    /// Decide whether this unit can run `task` into `target` without opening the image.
    fn check(&self, task: &DrawTask, target: &TargetBuffer) -> BlitResult<()> {
        for (cf, op) in required_ops(task, task.src.format(), target.cf()) {
            if !self.supports(cf, op) {
                return Err(BlitError::unsupported(format!(
                    "{} cannot {op:?} {cf:?}",
                    self.name()
                )));
            }
        }
        Ok(())
    }

    /// Draw `image` for `task` into `target`, touching only pixels inside `clip`.
    ///
    /// `clip` is non-empty and lies inside the target.
    fn execute(
        &mut self,
        task: &DrawTask,
        image: &ImageDescriptor,
        target: &mut TargetBuffer,
        clip: &Area,
    ) -> BlitResult<()>;

    /// Block until every submitted operation has finished.
    fn wait_for_completion(&mut self) -> BlitResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/unit.rs"]
mod tests;
