pub(crate) mod blend;
pub(crate) mod color;
pub(crate) mod dma2d;
pub(crate) mod gpu;
