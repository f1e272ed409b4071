//! Time subsystem.
//!
//! Frame timing without coupling to the runtime:
//! - one `FrameClock` per window (or per render loop)
//! - call `tick()` once per presented frame to obtain `FrameTime`
//! - `delta()` is scaled by the clock's time scale, `real_delta()` is not

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
