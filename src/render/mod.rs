pub(crate) mod dispatch;
pub(crate) mod dma2d;
pub(crate) mod gpu;
pub(crate) mod raster;
pub(crate) mod scheduler;
pub(crate) mod sw;
pub(crate) mod transform;
pub(crate) mod unit;
