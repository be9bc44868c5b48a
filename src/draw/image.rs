use std::sync::Arc;

use crate::format::color::ColorFormat;
use crate::foundation::core::Area;
use crate::foundation::error::{BlitError, BlitResult};

/// Pixel layout of a source image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHeader {
    /// Pixel format.
    pub cf: ColorFormat,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
    /// Row stride in bytes; 0 means tightly packed.
    pub stride: usize,
}

impl ImageHeader {
    /// Header for a tightly packed image.
    pub const fn new(cf: ColorFormat, w: u32, h: u32) -> Self {
        Self { cf, w, h, stride: 0 }
    }

    /// Set an explicit row stride.
    pub const fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Row stride with the tightly packed default resolved.
    pub const fn resolved_stride(&self) -> usize {
        if self.stride == 0 {
            self.cf.min_stride(self.w as usize)
        } else {
            self.stride
        }
    }

    /// Bytes needed to hold every row.
    pub const fn byte_len(&self) -> usize {
        if self.w == 0 || self.h == 0 {
            return 0;
        }
        self.resolved_stride() * (self.h as usize - 1) + self.cf.min_stride(self.w as usize)
    }
}

/// Source pixels plus their layout.
///
/// The pixel data is shared, never copied, for the lifetime of every task that draws it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDescriptor {
    header: ImageHeader,
    data: Arc<[u8]>,
}

impl ImageDescriptor {
    /// Wrap `data` laid out as `header`.
    pub fn new(header: ImageHeader, data: impl Into<Arc<[u8]>>) -> BlitResult<Self> {
        let data = data.into();
        if header.w == 0 || header.h == 0 {
            return Err(BlitError::validation(format!(
                "image size must be non-zero (got {}x{})",
                header.w, header.h
            )));
        }
        let min = header.cf.min_stride(header.w as usize);
        if header.resolved_stride() < min {
            return Err(BlitError::validation(format!(
                "image stride {} is below width*pixel_size {min}",
                header.stride
            )));
        }
        if data.len() < header.byte_len() {
            return Err(BlitError::validation(format!(
                "image data holds {} bytes, layout needs {}",
                data.len(),
                header.byte_len()
            )));
        }
        Ok(Self { header, data })
    }

    /// Layout.
    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// Pixel format.
    pub fn cf(&self) -> ColorFormat {
        self.header.cf
    }

    /// Width in pixels.
    pub fn width(&self) -> i32 {
        self.header.w as i32
    }

    /// Height in pixels.
    pub fn height(&self) -> i32 {
        self.header.h as i32
    }

    /// Resolved row stride in bytes.
    pub fn stride(&self) -> usize {
        self.header.resolved_stride()
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Addressing for this image, indexed from the start of [`ImageDescriptor::data`].
    pub fn addr(&self) -> StridedAddr {
        StridedAddr::new(0, self.stride(), self.cf().size())
    }
}

/// Base plus row stride plus pixel size: the whole of strided 2D addressing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StridedAddr {
    /// Address (or index) of pixel `(0, 0)`.
    pub base: usize,
    /// Bytes between row starts.
    pub stride: usize,
    /// Bytes per pixel.
    pub pixel_size: usize,
}

impl StridedAddr {
    /// Create an addressing value.
    pub const fn new(base: usize, stride: usize, pixel_size: usize) -> Self {
        Self {
            base,
            stride,
            pixel_size,
        }
    }

    /// Byte offset of pixel `(dx, dy)` from the base.
    pub const fn offset(&self, dx: usize, dy: usize) -> usize {
        self.stride * dy + self.pixel_size * dx
    }

    /// Address of pixel `(dx, dy)`.
    pub const fn at(&self, dx: usize, dy: usize) -> usize {
        self.base + self.offset(dx, dy)
    }

    /// Address of the first pixel sampled when an image placed at `image_area` is clipped to `clip`.
    ///
    /// `clip` must lie inside `image_area`.
    pub fn clipped_origin(&self, image_area: &Area, clip: &Area) -> usize {
        self.at(
            (clip.x1 - image_area.x1) as usize,
            (clip.y1 - image_area.y1) as usize,
        )
    }
}

/// Where a task's pixels come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// Already decoded pixels.
    Raw(ImageDescriptor),
    /// Encoded bytes (PNG, JPEG, ...) decoded to [`ColorFormat::Argb8888`] when opened.
    Encoded(Arc<[u8]>),
}

impl ImageSource {
    /// Pixel format the opened image will have.
    pub fn format(&self) -> ColorFormat {
        match self {
            ImageSource::Raw(img) => img.cf(),
            ImageSource::Encoded(_) => ColorFormat::Argb8888,
        }
    }

    /// Layout, when known before opening.
    pub fn header(&self) -> Option<&ImageHeader> {
        match self {
            ImageSource::Raw(img) => Some(img.header()),
            ImageSource::Encoded(_) => None,
        }
    }

    /// Produce the pixels to draw.
    pub fn open(&self) -> BlitResult<ImageDescriptor> {
        match self {
            ImageSource::Raw(img) => Ok(img.clone()),
            ImageSource::Encoded(bytes) => decode_image(bytes),
        }
    }
}

impl From<ImageDescriptor> for ImageSource {
    fn from(img: ImageDescriptor) -> Self {
        ImageSource::Raw(img)
    }
}

/// Decode encoded image bytes to a tightly packed [`ColorFormat::Argb8888`] image.
pub fn decode_image(bytes: &[u8]) -> BlitResult<ImageDescriptor> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| BlitError::decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (w, h) = rgba.dimensions();

    let mut bgra = rgba.into_raw();
    for px in bgra.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    ImageDescriptor::new(ImageHeader::new(ColorFormat::Argb8888, w, h), bgra)
        .map_err(|e| BlitError::decode(e.to_string()))
}

#[cfg(test)]
#[path = "../../tests/unit/draw/image.rs"]
mod tests;
