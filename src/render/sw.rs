use std::sync::Arc;

use kurbo::Affine;

use crate::cache::coherency::CoherencyManager;
use crate::draw::image::{ImageDescriptor, StridedAddr};
use crate::draw::target::TargetBuffer;
use crate::draw::task::DrawTask;
use crate::format::blend::BlendMode;
use crate::format::color::ColorFormat;
use crate::format::gpu::TexFilter;
use crate::foundation::core::{Area, OPA_COVER, OPA_MAX, Opa, tile_origins};
use crate::foundation::error::{BlitError, BlitResult};
use crate::render::raster::{self, PixelRect, Texture};
use crate::render::transform::transform_matrix;
use crate::render::unit::{DrawUnit, OpKind, UnitKind, image_extent};

/// CPU compositor; runs every task and is the fallback for the hardware units.
#[derive(Debug)]
pub struct SoftwareUnit {
    coherency: Arc<CoherencyManager>,
}

impl Default for SoftwareUnit {
    fn default() -> Self {
        Self::new(Arc::new(CoherencyManager::default()))
    }
}

impl SoftwareUnit {
    /// Create a unit that synchronizes with hardware writes through `coherency`.
    pub fn new(coherency: Arc<CoherencyManager>) -> Self {
        Self { coherency }
    }

    fn draw_one(
        &self,
        task: &DrawTask,
        image: &ImageDescriptor,
        target: &mut TargetBuffer,
        image_area: Area,
        clip: Area,
    ) -> BlitResult<()> {
        let opa = if task.opa >= OPA_MAX { OPA_COVER } else { task.opa };
        if task.has_transform() {
            draw_transformed(task, image, target, image_area, clip, opa);
            return Ok(());
        }
        let Some(clip) = clip.intersect(&image_extent(&image_area, image)) else {
            return Ok(());
        };
        let src_base = image.addr().clipped_origin(&image_area, &clip);
        let s = PixelRect::new(
            StridedAddr::new(src_base, image.stride(), image.cf().size()),
            image.cf(),
            clip.width() as usize,
            clip.height() as usize,
        );
        let dst_base = target
            .offset_of(clip.x1, clip.y1)
            .ok_or_else(|| BlitError::validation(format!("clip {clip:?} is outside target")))?;
        let d = PixelRect::new(
            StridedAddr::new(dst_base, target.stride(), target.cf().size()),
            target.cf(),
            clip.width() as usize,
            clip.height() as usize,
        );
        if is_opaque_copy(image.cf(), opa, task.blend_mode) {
            raster::copy_convert(image.data(), &s, target.data_mut(), &d);
        } else {
            raster::blend_rect(image.data(), &s, target.data_mut(), &d, opa, task.blend_mode);
        }
        Ok(())
    }
}

/// Return `true` when a draw can overwrite the destination without reading it.
pub(crate) fn is_opaque_copy(src_cf: ColorFormat, opa: Opa, mode: BlendMode) -> bool {
    !src_cf.has_alpha() && opa >= OPA_MAX && mode == BlendMode::Normal
}

fn draw_transformed(
    task: &DrawTask,
    image: &ImageDescriptor,
    target: &mut TargetBuffer,
    image_area: Area,
    clip: Area,
    opa: Opa,
) {
    let frame = target.area();
    let m = transform_matrix(
        image_area.origin(),
        task.pivot,
        task.rotation,
        task.scale_x,
        task.scale_y,
    );
    let texel_to_dst = Affine::translate((-f64::from(frame.x1), -f64::from(frame.y1)))
        * m
        * Affine::translate((f64::from(image_area.x1), f64::from(image_area.y1)));
    let tex = Texture {
        data: image.data(),
        rect: PixelRect::new(
            image.addr(),
            image.cf(),
            image.width() as usize,
            image.height() as usize,
        ),
    };
    let d = PixelRect::new(
        StridedAddr::new(0, target.stride(), target.cf().size()),
        target.cf(),
        frame.width() as usize,
        frame.height() as usize,
    );
    let mode = task.blend_mode;
    raster::map_texture(
        &tex,
        TexFilter::for_antialias(task.antialias),
        texel_to_dst,
        target.data_mut(),
        &d,
        &clip.relative_to(&frame),
        |s, dc| raster::blend_px(s, dc, opa, mode),
    );
}

impl DrawUnit for SoftwareUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Software
    }

    fn supports(&self, _cf: ColorFormat, _op: OpKind) -> bool {
        true
    }

    fn execute(
        &mut self,
        task: &DrawTask,
        image: &ImageDescriptor,
        target: &mut TargetBuffer,
        clip: &Area,
    ) -> BlitResult<()> {
        if let Some(ca) = target.cache_area(clip) {
            self.coherency.prepare_cpu_access(&ca);
        }

        if !task.tile {
            return self.draw_one(task, image, target, task.image_area(), *clip);
        }

        let anchor = image_extent(&task.image_area(), image);
        let mut drawn = 0usize;
        for tile in tile_origins(anchor, image.width(), image.height(), *clip) {
            let Some(tile_clip) = tile.intersect(clip) else {
                continue;
            };
            // Transformed tiles may spill past their own cell.
            let region = if task.has_transform() { *clip } else { tile_clip };
            self.draw_one(task, image, target, tile, region)?;
            drawn += 1;
        }
        tracing::trace!(tiles = drawn, "software tiles drawn");
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/sw.rs"]
mod tests;
