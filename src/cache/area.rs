use std::ops::Range;

use crate::foundation::core::Area;

/// Strided rectangular memory region targeted by a cache operation.
///
/// Describes exactly the touched bytes: `height` rows of `width_bytes` bytes, consecutive rows
/// `stride` bytes apart, the first row starting at `first_byte`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheArea {
    /// Address of the first touched byte.
    pub first_byte: usize,
    /// Touched bytes per row.
    pub width_bytes: usize,
    /// Number of rows.
    pub height: usize,
    /// Byte distance between row starts.
    pub stride: usize,
}

impl CacheArea {
    /// Create a cache area.
    pub const fn new(first_byte: usize, width_bytes: usize, height: usize, stride: usize) -> Self {
        Self {
            first_byte,
            width_bytes,
            height,
            stride,
        }
    }

    /// Region of `area` inside a buffer whose pixel `(0, 0)` sits at `frame.x1/y1` and address `base`.
    ///
    /// Returns `None` when `area` is empty.
    pub fn for_area(
        base: usize,
        frame: &Area,
        stride: usize,
        pixel_size: usize,
        area: &Area,
    ) -> Option<Self> {
        if area.is_empty() {
            return None;
        }
        let rel = area.relative_to(frame);
        let first_byte = base + stride * rel.y1 as usize + pixel_size * rel.x1 as usize;
        Some(Self::new(
            first_byte,
            pixel_size * area.width() as usize,
            area.height() as usize,
            stride,
        ))
    }

    /// Return `true` when no bytes are covered.
    pub const fn is_empty(&self) -> bool {
        self.width_bytes == 0 || self.height == 0
    }

    /// Number of bytes actually covered.
    pub const fn byte_count(&self) -> usize {
        self.width_bytes * self.height
    }

    /// One past the last covered byte.
    pub const fn end_byte(&self) -> usize {
        if self.is_empty() {
            return self.first_byte;
        }
        self.first_byte + self.stride * (self.height - 1) + self.width_bytes
    }

    /// Byte range of each row.
    pub fn rows(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let n = if self.width_bytes == 0 { 0 } else { self.height };
        (0..n).map(move |y| {
            let start = self.first_byte + y * self.stride;
            start..start + self.width_bytes
        })
    }

    /// Row ranges widened to `line_size`-aligned cache lines, merging ranges that touch.
    ///
    /// A `line_size` of 0 or 1 returns the exact rows.
    pub fn line_ranges(&self, line_size: usize) -> Vec<Range<usize>> {
        let mut out: Vec<Range<usize>> = Vec::with_capacity(self.height);
        for row in self.rows() {
            let r = if line_size <= 1 {
                row
            } else {
                let start = row.start - row.start % line_size;
                let end = row.end.div_ceil(line_size) * line_size;
                start..end
            };
            match out.last_mut() {
                Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
                _ => out.push(r),
            }
        }
        out
    }

    /// Return `true` when the two regions share at least one byte.
    pub fn overlaps(&self, other: &CacheArea) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if self.end_byte() <= other.first_byte || other.end_byte() <= self.first_byte {
            return false;
        }
        let mut a = self.rows().peekable();
        let mut b = other.rows().peekable();
        while let (Some(ra), Some(rb)) = (a.peek(), b.peek()) {
            if ra.start < rb.end && rb.start < ra.end {
                return true;
            }
            if ra.end <= rb.end {
                a.next();
            } else {
                b.next();
            }
        }
        false
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/area.rs"]
mod tests;
