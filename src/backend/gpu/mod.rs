//! GPU compute backend (spec.md §5, "GPU").
//!
//! Dispatches the same two kernels as [`super::cpu`] as wgpu compute
//! shaders, with an explicit synchronization barrier between the stress and
//! velocity passes (spec.md §5, "Ordering guarantees").

mod propagator;

pub use propagator::GpuBackend;

/// Error type for GPU operations (spec.md §7, "Backend fault").
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("GPU readback channel closed unexpectedly")]
    ReadbackChannelClosed,
}
