use crate::cache::area::CacheArea;
use crate::format::color::{Color32, ColorFormat, read_px, write_px};
use crate::foundation::core::Area;
use crate::foundation::error::{BlitError, BlitResult};

/// Destination pixel memory placed in global coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetBuffer {
    area: Area,
    cf: ColorFormat,
    stride: usize,
    data: Vec<u8>,
}

impl TargetBuffer {
    /// Zeroed, tightly packed buffer covering `area`.
    pub fn new(area: Area, cf: ColorFormat) -> BlitResult<Self> {
        let stride = cf.min_stride(area.width().max(0) as usize);
        Self::with_stride(area, cf, stride)
    }

    /// Zeroed buffer covering `area` with an explicit row stride.
    pub fn with_stride(area: Area, cf: ColorFormat, stride: usize) -> BlitResult<Self> {
        if area.is_empty() {
            return Err(BlitError::validation(format!(
                "target area must be non-empty (got {area:?})"
            )));
        }
        let min = cf.min_stride(area.width() as usize);
        if stride < min {
            return Err(BlitError::validation(format!(
                "target stride {stride} is below width*pixel_size {min}"
            )));
        }
        Ok(Self {
            area,
            cf,
            stride,
            data: vec![0; stride * area.height() as usize],
        })
    }

    /// Placement in global coordinates.
    pub fn area(&self) -> Area {
        self.area
    }

    /// Pixel format.
    pub fn cf(&self) -> ColorFormat {
        self.cf
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes, mutable.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Byte offset of the global pixel `(x, y)`, or `None` outside the buffer.
    pub fn offset_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < self.area.x1 || x > self.area.x2 || y < self.area.y1 || y > self.area.y2 {
            return None;
        }
        let dx = (x - self.area.x1) as usize;
        let dy = (y - self.area.y1) as usize;
        Some(self.stride * dy + self.cf.size() * dx)
    }

    /// Read the global pixel `(x, y)`.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color32> {
        let off = self.offset_of(x, y)?;
        Some(read_px(self.cf, &self.data[off..]))
    }

    /// Write the global pixel `(x, y)`; returns `false` outside the buffer.
    pub fn set_pixel(&mut self, x: i32, y: i32, c: Color32) -> bool {
        let Some(off) = self.offset_of(x, y) else {
            return false;
        };
        write_px(self.cf, &mut self.data[off..], c);
        true
    }

    /// Fill the whole buffer.
    pub fn fill(&mut self, c: Color32) {
        let area = self.area;
        self.fill_area(&area, c);
    }

    /// Fill the part of `area` that lies inside the buffer.
    pub fn fill_area(&mut self, area: &Area, c: Color32) {
        let Some(a) = area.intersect(&self.area) else {
            return;
        };
        let px = self.cf.size();
        for y in a.y1..=a.y2 {
            for x in a.x1..=a.x2 {
                if let Some(off) = self.offset_of(x, y) {
                    write_px(self.cf, &mut self.data[off..off + px], c);
                }
            }
        }
    }

    /// Memory region of `area` as seen by cache maintenance, using the real buffer address.
    pub fn cache_area(&self, area: &Area) -> Option<CacheArea> {
        let a = area.intersect(&self.area)?;
        CacheArea::for_area(
            self.data.as_ptr() as usize,
            &self.area,
            self.stride,
            self.cf.size(),
            &a,
        )
    }

    /// Tightly packed copy of `area` (which must lie inside the buffer).
    pub(crate) fn extract(&self, area: &Area) -> BlitResult<TargetBuffer> {
        if !self.area.contains(area) {
            return Err(BlitError::validation(format!(
                "extract area {area:?} is outside target {:?}",
                self.area
            )));
        }
        let mut out = TargetBuffer::new(*area, self.cf)?;
        let row = self.cf.min_stride(area.width() as usize);
        for y in area.y1..=area.y2 {
            let src = self.offset_of(area.x1, y);
            let dst = out.offset_of(area.x1, y);
            let (Some(src), Some(dst)) = (src, dst) else {
                continue;
            };
            out.data[dst..dst + row].copy_from_slice(&self.data[src..src + row]);
        }
        Ok(out)
    }

    /// Copy every pixel of `sub` back to its place in this buffer.
    pub(crate) fn write_back(&mut self, sub: &TargetBuffer) -> BlitResult<()> {
        if sub.cf != self.cf || !self.area.contains(&sub.area) {
            return Err(BlitError::validation(format!(
                "cannot write back {:?} {:?} into {:?} {:?}",
                sub.cf, sub.area, self.cf, self.area
            )));
        }
        let row = self.cf.min_stride(sub.area.width() as usize);
        for y in sub.area.y1..=sub.area.y2 {
            let src = sub.offset_of(sub.area.x1, y);
            let dst = self.offset_of(sub.area.x1, y);
            let (Some(src), Some(dst)) = (src, dst) else {
                continue;
            };
            self.data[dst..dst + row].copy_from_slice(&sub.data[src..src + row]);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/draw/target.rs"]
mod tests;
