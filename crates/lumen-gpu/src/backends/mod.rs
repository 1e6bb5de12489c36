//! [`GpuDriver`](crate::protocol::GpuDriver) implementations.
//!
//! - [`NullDriver`]: ids and counters only.
//! - [`ValidatingDriver`]: protocol checks in front of another driver.
//! - [`RecordingDriver`]: owned call traces with replay and audit.
//! - [`SoftwareDriver`]: CPU reference rasterizer.
//! - [`WgpuDriver`]: headless wgpu device.

pub mod gpu;
mod null;
mod recording;
pub mod software;
mod validating;

pub use gpu::{GpuFrameStats, HeadlessGpu, WgpuDriver, WgpuInit};
pub use null::{CallCounts, NullDriver};
pub use recording::{AuditReport, RecordedCall, RecordingDriver, Trace};
pub use software::{DrawStats, SoftwareDriver};
pub use validating::ValidatingDriver;
