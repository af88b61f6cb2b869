//! Volume & Parameter Model (C1, spec.md §3, §4.1).
//!
//! Owns the grid geometry, the derived physical constants, and the lifetime
//! of every per-voxel field. Buffers are allocated once at construction and
//! released together when the model is dropped; there is no reallocation in
//! the step loop.

use crate::schema::{ConfigError, SolverConfig, TransducerGeometry};

/// Minimum density used anywhere a reciprocal density appears (spec.md §3).
pub const MIN_DENSITY: f32 = 100.0;

/// Magnitude clamp applied to every dynamic field (spec.md §3, I3).
pub const FIELD_CLAMP: f64 = 1e10;

/// Maximum accumulated brittle damage (spec.md §3, I2).
pub const MAX_DAMAGE: f64 = 0.9;

/// Clamp a scalar into `[-FIELD_CLAMP, FIELD_CLAMP]`, mapping non-finite
/// values to zero. This is the safe-get/safe-clamp contract referenced
/// throughout spec.md §3/§4/§7: arithmetic errors are masked here rather
/// than propagated.
#[inline]
pub fn safe_clamp(v: f64) -> f64 {
    if !v.is_finite() {
        0.0
    } else {
        v.clamp(-FIELD_CLAMP, FIELD_CLAMP)
    }
}

/// Grid dimensions, spacing, and the flat-index strides derived from them.
#[derive(Debug, Clone, Copy)]
pub struct GridParams {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub dx: f32,
    /// Stride for a +1 step in Y (`= width`).
    pub stride_y: usize,
    /// Stride for a +1 step in Z (`= width * height`).
    pub stride_z: usize,
    pub n: usize,
}

impl GridParams {
    fn new(width: usize, height: usize, depth: usize, dx: f32) -> Self {
        Self {
            width,
            height,
            depth,
            dx,
            stride_y: width,
            stride_z: width * height,
            n: width * height * depth,
        }
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.stride_z + y * self.stride_y + x
    }

    #[inline]
    pub fn coords(&self, i: usize) -> (usize, usize, usize) {
        let z = i / self.stride_z;
        let rem = i % self.stride_z;
        let y = rem / self.stride_y;
        let x = rem % self.stride_y;
        (x, y, z)
    }

    /// True if `(x, y, z)` lies on the outer boundary (spec.md I5) — these
    /// voxels are never updated and act as a zero-Dirichlet sponge.
    #[inline]
    pub fn is_boundary(&self, x: usize, y: usize, z: usize) -> bool {
        x == 0
            || y == 0
            || z == 0
            || x == self.width - 1
            || y == self.height - 1
            || z == self.depth - 1
    }
}

/// Derived physical constants, computed once at construction (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct PhysicsParams {
    /// Young's modulus, Pa.
    pub e: f64,
    /// Shear modulus (Lame mu), Pa.
    pub mu0: f64,
    /// Lame lambda, Pa.
    pub lambda0: f64,
    /// Confining pressure, Pa.
    pub confining_pressure: f64,
    /// Tensile strength, Pa.
    pub tensile_strength: f64,
    /// Cohesion, Pa.
    pub cohesion: f64,
    pub sin_phi: f64,
    pub cos_phi: f64,
    /// Source energy, J.
    pub energy: f64,
    /// Source frequency, Hz.
    pub frequency: f64,
    pub amplitude: i32,
    pub total_time_steps: u64,
}

impl PhysicsParams {
    fn from_config(cfg: &SolverConfig) -> Self {
        let e = cfg.elastic.youngs_modulus_mpa as f64 * 1e6;
        let nu = cfg.elastic.poisson_ratio as f64;
        let mu0 = e / (2.0 * (1.0 + nu));
        let lambda0 = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));

        let phi = cfg.strength.failure_angle_deg as f64 * std::f64::consts::PI / 180.0;

        Self {
            e,
            mu0,
            lambda0,
            confining_pressure: cfg.strength.confining_pressure_mpa as f64 * 1e6,
            tensile_strength: cfg.strength.tensile_strength_mpa as f64 * 1e6,
            cohesion: cfg.strength.cohesion_mpa as f64 * 1e6,
            sin_phi: phi.sin(),
            cos_phi: phi.cos(),
            energy: cfg.source.energy_j as f64,
            frequency: cfg.source.frequency_khz as f64 * 1000.0,
            amplitude: cfg.source.amplitude,
            total_time_steps: cfg.source.total_time_steps,
        }
    }

    /// The `(Vp/Vs)` ratio predicted by pure linear elasticity, clamped into
    /// `[1.3, 2.2]` as required by the S-arrival gate (spec.md §4.4).
    pub fn theoretical_vp_vs(&self) -> f64 {
        let ratio = ((self.lambda0 + 2.0 * self.mu0) / self.mu0).sqrt();
        ratio.clamp(1.3, 2.2)
    }

    /// Poisson's ratio recovered from the Lame constants (used by the Vs
    /// fallback in spec.md §4.4).
    pub fn poisson_ratio(&self) -> f64 {
        self.lambda0 / (2.0 * (self.lambda0 + self.mu0))
    }
}

/// Owns every per-voxel field and the model's derived constants.
pub struct VolumeModel {
    pub config: SolverConfig,
    pub grid: GridParams,
    pub physics: PhysicsParams,
    pub geometry: TransducerGeometry,

    pub material: Vec<u8>,
    pub density: Vec<f32>,

    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub vz: Vec<f64>,

    pub sxx: Vec<f64>,
    pub syy: Vec<f64>,
    pub szz: Vec<f64>,
    pub sxy: Vec<f64>,
    pub sxz: Vec<f64>,
    pub syz: Vec<f64>,

    pub damage: Vec<f64>,
}

impl VolumeModel {
    /// Construct a new model. Validates that `material` and `density` match
    /// the configured grid shape; fails fast rather than allocating the
    /// dynamic fields on a malformed input (spec.md §7, "Configuration
    /// error").
    pub fn new(
        config: SolverConfig,
        material: Vec<u8>,
        density: Vec<f32>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let grid = GridParams::new(
            config.grid.width,
            config.grid.height,
            config.grid.depth,
            config.grid.dx,
        );

        if material.len() != grid.n {
            return Err(ConfigError::VolumeShapeMismatch {
                expected: grid.n,
                actual: material.len(),
            });
        }
        if density.len() != grid.n {
            return Err(ConfigError::VolumeShapeMismatch {
                expected: grid.n,
                actual: density.len(),
            });
        }

        let physics = PhysicsParams::from_config(&config);
        let geometry = TransducerGeometry::derive(&config.grid, config.axis);

        let n = grid.n;
        Ok(Self {
            config,
            grid,
            physics,
            geometry,
            material,
            density,
            vx: vec![0.0; n],
            vy: vec![0.0; n],
            vz: vec![0.0; n],
            sxx: vec![0.0; n],
            syy: vec![0.0; n],
            szz: vec![0.0; n],
            sxy: vec![0.0; n],
            sxz: vec![0.0; n],
            syz: vec![0.0; n],
            damage: vec![0.0; n],
        })
    }

    #[inline]
    pub fn is_target(&self, i: usize) -> bool {
        self.material[i] == self.config.material_id
    }

    /// Density at voxel `i`, clamped at read time to `max(rho, 100)`
    /// (spec.md §3).
    #[inline]
    pub fn density_at(&self, i: usize) -> f64 {
        (self.density[i].max(MIN_DENSITY)) as f64
    }

    /// Minimum clamped density across the whole volume (spec.md §4.2,
    /// `rho_min`), used by the time-step planner.
    pub fn min_density(&self) -> f64 {
        self.density
            .iter()
            .copied()
            .filter(|&d| d > 0.0)
            .fold(f32::MAX, f32::min)
            .max(MIN_DENSITY) as f64
    }

    /// Volume-average clamped density (spec.md §4.2, `rho_avg`).
    pub fn average_density(&self) -> f64 {
        if self.density.is_empty() {
            return MIN_DENSITY as f64;
        }
        let sum: f64 = self.density.iter().map(|&d| d.max(MIN_DENSITY) as f64).sum();
        (sum / self.density.len() as f64).max(MIN_DENSITY as f64)
    }

    /// Pre-stress every target-material voxel to `-confining_pressure` on
    /// the diagonal, zero shear/velocity/damage (spec.md §4.4, "Pre-stress").
    pub fn apply_pre_stress(&mut self) {
        let p = -self.physics.confining_pressure;
        for i in 0..self.grid.n {
            let (x, y, z) = self.grid.coords(i);
            if self.grid.is_boundary(x, y, z) {
                continue;
            }
            if self.is_target(i) {
                self.sxx[i] = p;
                self.syy[i] = p;
                self.szz[i] = p;
            }
        }
    }

    /// Copy of the three velocity fields (the public snapshot operation,
    /// spec.md §6, `snapshot()`).
    pub fn snapshot_velocity(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        (self.vx.clone(), self.vy.clone(), self.vz.clone())
    }

    /// Sample `M = max|field|` over a strided subset of voxels across all
    /// twelve dynamic fields, used by both the renormalization check
    /// (spec.md §4.3.3) and the instability watcher (spec.md §4.5).
    pub fn sampled_max_abs(&self, stride: usize) -> f64 {
        let stride = stride.max(1);
        let fields: [&[f64]; 9] = [
            &self.vx, &self.vy, &self.vz, &self.sxx, &self.syy, &self.szz, &self.sxy, &self.sxz,
            &self.syz,
        ];
        let mut m = 0.0f64;
        for field in fields {
            let mut i = 0;
            while i < field.len() {
                let v = field[i];
                if v.is_finite() {
                    m = m.max(v.abs());
                } else {
                    return f64::INFINITY;
                }
                i += stride;
            }
        }
        m
    }

    /// Multiply every voxel of every dynamic field (including damage is
    /// excluded — damage is monotone and dimensionless, not part of the
    /// renormalized wave fields) by `scale` (spec.md §4.3.3).
    pub fn renormalize(&mut self, scale: f64) {
        for field in [
            &mut self.vx,
            &mut self.vy,
            &mut self.vz,
            &mut self.sxx,
            &mut self.syy,
            &mut self.szz,
            &mut self.sxy,
            &mut self.sxz,
            &mut self.syz,
        ] {
            for v in field.iter_mut() {
                *v = safe_clamp(*v * scale);
            }
        }
    }
}
