//! blitcore composes images into frame buffers through interchangeable draw units.
//!
//! A caller describes each draw as a [`DrawTask`] (source image, destination coordinates, clip,
//! opacity, blend mode, optional rotation/scale/tiling), queues it in a [`TaskQueue`], and hands
//! the queue to a [`Dispatcher`] together with a [`TargetBuffer`].
//!
//! # Pipeline overview
//!
//! 1. **Claim**: pending tasks are clipped against the target; empty or invisible ones are
//!    retired as skipped.
//! 2. **Select**: every registered [`DrawUnit`] is asked whether it can run the task; the most
//!    preferred capable unit wins, the software unit being the universal fallback.
//! 3. **Order**: tasks whose clips overlap run in submission order; disjoint tasks may run
//!    concurrently on distinct units.
//! 4. **Execute**: the unit composes the image, issuing cache maintenance through the shared
//!    [`CoherencyManager`] whenever hardware reads or writes memory.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate. Hardware units talk to drivers through
//!   the [`Dma2dDriver`] and [`GpuDriver`] traits; [`SoftDma2d`] and [`SoftGpu`] emulate them.
//! - **Clip is law**: no unit modifies a destination pixel outside the task's effective clip.
//! - **Straight alpha**: [`Color32`] and every [`ColorFormat`] with alpha store straight
//!   (non-premultiplied) alpha.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod draw;
mod format;
mod foundation;
mod render;

pub use cache::area::CacheArea;
pub use cache::coherency::{CacheOps, CoherencyManager, CoherencyStats, CoherentMemory};
pub use draw::image::{ImageDescriptor, ImageHeader, ImageSource, StridedAddr, decode_image};
pub use draw::target::TargetBuffer;
pub use draw::task::{DrawTask, SkipReason, TaskId, TaskQueue, TaskRecord, TaskState};
pub use format::blend::BlendMode;
pub use format::color::{Color32, ColorFormat, read_px, write_px};
pub use format::dma2d::{
    Dma2dFgBgCf, Dma2dOutputCf, blend as dma2d_blend, fgbg_cf as dma2d_fgbg_cf,
    output_cf as dma2d_output_cf,
};
pub use format::gpu::{
    BlendFactor, BlendOp, BlopFlags, TexFilter, TexFormat, blend_op as gpu_blend_op,
    tex_format as gpu_tex_format,
};
pub use foundation::core::{
    Area, OPA_COVER, OPA_MAX, OPA_MIN, OPA_TRANSP, Opa, Point, SCALE_NONE, TileOrigins,
    tile_origins,
};
pub use foundation::error::{BlitError, BlitResult};
pub use render::dispatch::{DispatchOpts, DispatchStats, Dispatcher, create_unit};
pub use render::dma2d::{
    AlphaMode, BgLayer, Dma2dDriver, Dma2dMode, Dma2dOpts, Dma2dUnit, FgLayer, SoftDma2d,
    TransferDescriptor, TransferMemory, image_transfer,
};
pub use render::gpu::{
    CommandList, GpuCommand, GpuDriver, GpuMemory, GpuOpts, GpuUnit, SoftGpu, TexBinding,
};
pub use render::sw::SoftwareUnit;
pub use render::transform::{blit_corners, transform_matrix, transformed_quad};
pub use render::unit::{DrawUnit, OpKind, UnitId, UnitKind, required_ops};
