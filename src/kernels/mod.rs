//! FDTD Solver Kernels (C3, spec.md §4.3).
//!
//! The per-voxel physics lives here as small, pure functions operating on
//! scalar/struct inputs rather than whole-grid buffers — the "object-heavy
//! 'params' structures collapse into two plain parameter records
//! (`PhysicsParams`, `GridParams`) passed by value to each kernel
//! invocation" design note (spec.md §9). Whole-grid iteration and
//! parallelization are backend concerns (see [`crate::backend`]).

mod cubic;
mod stress;
mod velocity;

pub use cubic::*;
pub use stress::*;
pub use velocity::*;
