use serde::{Deserialize, Serialize};

/// Opacity on a 0..=255 scale.
pub type Opa = u8;

/// Fully transparent.
pub const OPA_TRANSP: Opa = 0;
/// At or below this opacity a draw is invisible and is skipped.
pub const OPA_MIN: Opa = 2;
/// At or above this opacity a draw is treated as fully covering.
pub const OPA_MAX: Opa = 253;
/// Fully opaque.
pub const OPA_COVER: Opa = 255;

/// Fixed-point scale factor meaning 1.0 ("no scale").
pub const SCALE_NONE: i32 = 256;

/// Integer point in pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// Create a point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle with inclusive corners.
///
/// `width = x2 - x1 + 1`, `height = y2 - y1 + 1`. A zero or negative extent is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Area {
    /// Left edge (inclusive).
    pub x1: i32,
    /// Top edge (inclusive).
    pub y1: i32,
    /// Right edge (inclusive).
    pub x2: i32,
    /// Bottom edge (inclusive).
    pub y2: i32,
}

impl Area {
    /// Create an area from inclusive corners.
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create an area from its top-left corner and size.
    pub const fn from_origin_size(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + w - 1,
            y2: y + h - 1,
        }
    }

    /// Inclusive width.
    pub const fn width(&self) -> i32 {
        self.x2 - self.x1 + 1
    }

    /// Inclusive height.
    pub const fn height(&self) -> i32 {
        self.y2 - self.y1 + 1
    }

    /// Return `true` when either extent is zero or negative.
    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Resize horizontally, keeping `x1`.
    pub fn set_width(&mut self, w: i32) {
        self.x2 = self.x1 + w - 1;
    }

    /// Resize vertically, keeping `y1`.
    pub fn set_height(&mut self, h: i32) {
        self.y2 = self.y1 + h - 1;
    }

    /// Top-left corner.
    pub const fn origin(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    /// Overlapping rectangle of `self` and `other`, or `None` when they do not overlap.
    pub fn intersect(&self, other: &Area) -> Option<Area> {
        let out = Area {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        };
        if out.x1 > out.x2 || out.y1 > out.y2 {
            return None;
        }
        Some(out)
    }

    /// Return `true` when the two areas share at least one pixel.
    pub fn overlaps(&self, other: &Area) -> bool {
        self.intersect(other).is_some()
    }

    /// Return `true` when `other` lies fully inside `self`.
    pub fn contains(&self, other: &Area) -> bool {
        other.x1 >= self.x1 && other.y1 >= self.y1 && other.x2 <= self.x2 && other.y2 <= self.y2
    }

    /// Shift by `(dx, dy)`.
    pub const fn translate(&self, dx: i32, dy: i32) -> Area {
        Area {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Express `self` relative to the top-left corner of `frame`.
    pub const fn relative_to(&self, frame: &Area) -> Area {
        self.translate(-frame.x1, -frame.y1)
    }
}

/// Enumerate tile areas of size `(w, h)` starting at `anchor.x1/y1` until past `clip`.
///
/// Steps right by `w` while `tile.x1 <= clip.x2`, then resets x and steps down by `h` while
/// `tile.y1 <= clip.y2`. Tiles that miss `clip` are still produced; callers filter them.
pub fn tile_origins(anchor: Area, w: i32, h: i32, clip: Area) -> TileOrigins {
    TileOrigins {
        tile: Area::from_origin_size(anchor.x1, anchor.y1, w, h),
        x_start: anchor.x1,
        w,
        h,
        clip,
        done: w <= 0 || h <= 0,
    }
}

/// Iterator returned by [`tile_origins`].
#[derive(Clone, Debug)]
pub struct TileOrigins {
    tile: Area,
    x_start: i32,
    w: i32,
    h: i32,
    clip: Area,
    done: bool,
}

impl Iterator for TileOrigins {
    type Item = Area;

    fn next(&mut self) -> Option<Area> {
        while !self.done {
            if self.tile.y1 > self.clip.y2 {
                self.done = true;
                break;
            }
            if self.tile.x1 <= self.clip.x2 {
                let out = self.tile;
                self.tile = Area::from_origin_size(
                    self.tile.x1.saturating_add(self.w),
                    self.tile.y1,
                    self.w,
                    self.h,
                );
                return Some(out);
            }
            let next_y = self.tile.y1.saturating_add(self.h);
            if next_y == self.tile.y1 {
                self.done = true;
                break;
            }
            self.tile = Area::from_origin_size(self.x_start, next_y, self.w, self.h);
        }
        None
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
