//! `ctwave-core` - 3D elastodynamic wave propagation core for a CT-data
//! acoustic simulator.
//!
//! This crate provides a staggered-grid finite-difference time-domain
//! (FDTD) solver for elastic wave propagation through a heterogeneous
//! volume, with optional Mohr-Coulomb plasticity and brittle-damage
//! coupling, a CFL-safe time-step planner, wavefront arrival detection, and
//! an on-disk frame-cache pipeline for external viewers.
//!
//! # Architecture
//!
//! - [`schema`]: solver configuration and transducer geometry derivation.
//! - [`volume`]: the per-voxel field model and derived physical constants.
//! - [`timestep`]: CFL- and frequency-safe `dt` and run-length planning.
//! - [`kernels`]: the per-voxel stress/velocity update functions.
//! - [`source`]: initial impulse injection (point source or full-face
//!   transducer).
//! - [`arrival`]: P/S wavefront arrival detection at the receiver.
//! - [`backend`]: parallel-CPU (rayon) and GPU (wgpu, `gpu` feature)
//!   dispatch of the kernels over the whole grid.
//! - [`driver`]: the step-loop state machine tying everything together.
//! - [`framecache`]: the on-disk artifact writer consumed by external
//!   viewers.
//!
//! # Example
//!
//! ```rust,no_run
//! use ctwave_core::driver::Driver;
//! use ctwave_core::schema::{
//!     Axis, ElasticConfig, GridConfig, MaterialStrengthConfig, ModelFlags,
//!     SolverConfig, SourceConfig, WaveType,
//! };
//!
//! let config = SolverConfig {
//!     grid: GridConfig { width: 64, height: 64, depth: 64, dx: 1e-4 },
//!     material_id: 1,
//!     axis: Axis::X,
//!     wave_type: WaveType::Both,
//!     strength: MaterialStrengthConfig {
//!         confining_pressure_mpa: 0.0,
//!         tensile_strength_mpa: 5.0,
//!         failure_angle_deg: 30.0,
//!         cohesion_mpa: 10.0,
//!     },
//!     source: SourceConfig {
//!         energy_j: 1.0,
//!         frequency_khz: 100.0,
//!         amplitude: 100,
//!         total_time_steps: 200,
//!     },
//!     flags: ModelFlags::default(),
//!     elastic: ElasticConfig { youngs_modulus_mpa: 20_000.0, poisson_ratio: 0.25 },
//!     use_full_face_transducers: false,
//! };
//!
//! let n = config.grid.grid_size();
//! let mut driver = Driver::new(config, vec![1u8; n], vec![2000.0f32; n]).unwrap();
//! let outcome = driver.run(|evt| println!("{}% at step {}", evt.percent, evt.step));
//! println!("{:?}", outcome);
//! ```

pub mod arrival;
pub mod backend;
pub mod driver;
pub mod error;
pub mod events;
pub mod framecache;
pub mod kernels;
pub mod schema;
pub mod source;
pub mod timestep;
pub mod volume;

pub use driver::{CancellationToken, Driver, DriverState, RunOutcome};
pub use error::{FrameCacheError, SolverError};
pub use events::{CancelledEvent, CompletionEvent, ProgressEvent};
pub use schema::SolverConfig;
pub use volume::VolumeModel;
