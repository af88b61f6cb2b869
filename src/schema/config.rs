//! Scalar configuration for a single solver run.
//!
//! `SolverConfig` carries every input from `spec.md` §6 except the two
//! per-voxel volumes (`material`, `density`), which are passed directly to
//! [`crate::volume::VolumeModel::new`] since they scale with grid size and
//! have no natural place in a small, serializable config struct.

use serde::{Deserialize, Serialize};

/// Principal axis along which the transducer pair is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Index into the 0=X,1=Y,2=Z convention used throughout the solver.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Wave type requested by the caller. Informational only — the solver always
/// excites and measures both P and S arrivals (spec.md §4.4); this flag is
/// not read by any kernel and exists purely for the caller's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveType {
    P,
    S,
    Both,
}

/// Grid geometry: dimensions and voxel spacing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    /// Voxel spacing in meters.
    pub dx: f32,
}

impl GridConfig {
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.width * self.height * self.depth
    }
}

/// Material-strength parameters, in the input units named by spec.md §3/§6
/// (pressure in MPa, angle in degrees). `PhysicsParams` converts these to SI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaterialStrengthConfig {
    /// Confining pressure, MPa.
    pub confining_pressure_mpa: f32,
    /// Tensile strength, MPa.
    pub tensile_strength_mpa: f32,
    /// Mohr-Coulomb failure angle, degrees.
    pub failure_angle_deg: f32,
    /// Cohesion, MPa.
    pub cohesion_mpa: f32,
}

/// Source/receiver pulse parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source energy, joules.
    pub energy_j: f32,
    /// Source frequency, kHz (converted to Hz internally).
    pub frequency_khz: f32,
    /// Integer amplitude multiplier.
    pub amplitude: i32,
    /// Tail length (in steps) required after both arrivals before completion.
    pub total_time_steps: u64,
}

/// Which physical effects are active in the stress update (spec.md §4.3.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelFlags {
    pub use_elastic: bool,
    pub use_plastic: bool,
    pub use_brittle: bool,
}

impl Default for ModelFlags {
    fn default() -> Self {
        Self {
            use_elastic: true,
            use_plastic: true,
            use_brittle: true,
        }
    }
}

/// Linear-elastic constants, input units MPa/dimensionless.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ElasticConfig {
    /// Young's modulus, MPa.
    pub youngs_modulus_mpa: f32,
    /// Poisson's ratio.
    pub poisson_ratio: f32,
}

/// Top-level, immutable-after-construction solver configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverConfig {
    pub grid: GridConfig,
    pub material_id: u8,
    pub axis: Axis,
    pub wave_type: WaveType,
    pub strength: MaterialStrengthConfig,
    pub source: SourceConfig,
    pub flags: ModelFlags,
    pub elastic: ElasticConfig,
    pub use_full_face_transducers: bool,
}

impl SolverConfig {
    /// Validate static configuration (not the volumes, which are checked by
    /// `VolumeModel::new` against this grid once they're available).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.width == 0 || self.grid.height == 0 || self.grid.depth == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.grid.dx <= 0.0 {
            return Err(ConfigError::InvalidVoxelSpacing);
        }
        if self.elastic.youngs_modulus_mpa <= 0.0 {
            return Err(ConfigError::InvalidElasticConstants);
        }
        if self.elastic.poisson_ratio <= -1.0 || self.elastic.poisson_ratio >= 0.5 {
            return Err(ConfigError::InvalidElasticConstants);
        }
        Ok(())
    }
}

/// Configuration validation errors (spec.md §7, "Configuration error").
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("grid dimensions (width, height, depth) must be non-zero")]
    InvalidDimensions,

    #[error("voxel spacing dx must be positive")]
    InvalidVoxelSpacing,

    #[error("elastic constants (E, nu) out of physical range")]
    InvalidElasticConstants,

    #[error("material/density volume length {actual} does not match grid size {expected}")]
    VolumeShapeMismatch { expected: usize, actual: usize },
}
