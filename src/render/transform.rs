use kurbo::{Affine, Point as KPoint, Vec2};

use crate::foundation::core::{Area, Point, SCALE_NONE};

/// Pivot-anchored rotate/scale of an image whose top-left corner is at `origin`.
///
/// Applied to a point, in order: move `origin` to (0, 0), move `pivot` (image-relative) to
/// (0, 0), rotate by `rotation` tenths of a degree, scale by `scale_* / SCALE_NONE`, move the
/// pivot back, move back to `origin`.
pub fn transform_matrix(
    origin: Point,
    pivot: Point,
    rotation: i32,
    scale_x: i32,
    scale_y: i32,
) -> Affine {
    let o = Vec2::new(f64::from(origin.x), f64::from(origin.y));
    let p = Vec2::new(f64::from(pivot.x), f64::from(pivot.y));
    let t_rotate = Affine::rotate((f64::from(rotation) / 10.0).to_radians());
    let t_scale = Affine::scale_non_uniform(
        f64::from(scale_x) / f64::from(SCALE_NONE),
        f64::from(scale_y) / f64::from(SCALE_NONE),
    );
    Affine::translate(o)
        * Affine::translate(p)
        * t_scale
        * t_rotate
        * Affine::translate(-p)
        * Affine::translate(-o)
}

/// Corner points of the pixels covered by `area`, clockwise from the top-left.
pub fn blit_corners(area: &Area) -> [KPoint; 4] {
    let x1 = f64::from(area.x1);
    let y1 = f64::from(area.y1);
    let x2 = f64::from(area.x2 + 1);
    let y2 = f64::from(area.y2 + 1);
    [
        KPoint::new(x1, y1),
        KPoint::new(x2, y1),
        KPoint::new(x2, y2),
        KPoint::new(x1, y2),
    ]
}

/// Corners of `area` after `m`.
pub fn transformed_quad(m: Affine, area: &Area) -> [KPoint; 4] {
    blit_corners(area).map(|p| m * p)
}

/// Affine map from texel coordinates of a `w` x `h` texture onto `quad`.
///
/// `quad` is clockwise from the texture's top-left corner and must be a parallelogram.
pub(crate) fn texel_to_quad(quad: &[KPoint; 4], w: f64, h: f64) -> Affine {
    let p0 = quad[0];
    let ux = (quad[1] - p0) / w;
    let vy = (quad[3] - p0) / h;
    Affine::new([ux.x, ux.y, vy.x, vy.y, p0.x, p0.y])
}

/// Pixel bounding box of `quad`.
pub(crate) fn quad_bounds(quad: &[KPoint; 4]) -> Area {
    let (mut x0, mut y0, mut x1, mut y1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for p in quad {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    Area::new(
        x0.floor() as i32,
        y0.floor() as i32,
        x1.ceil() as i32 - 1,
        y1.ceil() as i32 - 1,
    )
}

#[cfg(test)]
#[path = "../../tests/unit/render/transform.rs"]
mod tests;
