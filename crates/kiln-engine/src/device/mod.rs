//! GPU device + surface management.
//!
//! One `Gpu` per window: instance, adapter, device, queue and the configured
//! surface. Frames are acquired as `GpuFrame`s and presented on submit;
//! surface failures map to a `SurfaceErrorAction`.

mod gpu;

pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
