//! Backend polymorphism (spec.md §5, §9 "Backend polymorphism").
//!
//! Two concrete kernel implementations behind one dispatch trait; no runtime
//! inheritance. The CPU implementation uses rayon's parallel-for; the GPU
//! implementation (behind the `gpu` feature) uses a wgpu compute-shader
//! launcher. Both satisfy the same per-voxel contract from
//! [`crate::kernels`].

pub mod cpu;

#[cfg(feature = "gpu")]
pub mod gpu;

use crate::volume::VolumeModel;

#[cfg(feature = "gpu")]
pub use gpu::GpuError;

/// Backend-reported fault, used even by backends (CPU) that never actually
/// produce one — keeps the driver's error handling uniform across backends
/// (spec.md §7, "Backend fault").
#[cfg(not(feature = "gpu"))]
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("GPU support was not compiled into this build")]
    Unavailable,
}

/// One full step's stress-then-velocity kernel pass over the whole grid.
/// Implementations must complete the stress pass over every voxel before any
/// voxel's velocity pass begins (spec.md §5, "Ordering guarantees").
pub trait SolverBackend {
    fn step(&mut self, model: &mut VolumeModel, dt: f64) -> Result<(), GpuError>;
}
