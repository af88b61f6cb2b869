//! Velocity update kernel (C3, spec.md §4.3.2).

use crate::volume::{safe_clamp, GridParams};

/// Global damping coefficient applied every step (spec.md §4.3.2 step 4).
/// Essential to the calibrated arrival thresholds in spec.md §4.4 — do not
/// remove.
pub const DAMPING_ALPHA: f64 = 0.05;

/// The three velocity components at a voxel.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityState {
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}

/// One-sided stress gradients feeding the velocity update, gathered by the
/// caller from the current step's stress fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct StressGradient {
    pub dsxx_dx: f64,
    pub dsxy_dy: f64,
    pub dsxz_dz: f64,
    pub dsxy_dx: f64,
    pub dsyy_dy: f64,
    pub dsyz_dz: f64,
    pub dsxz_dx: f64,
    pub dsyz_dy: f64,
    pub dszz_dz: f64,
}

impl StressGradient {
    /// Gather the nine one-sided backward differences around voxel `i` from
    /// the current step's stress fields (spec.md §4.3.2 step 2).
    #[inline]
    pub fn backward(
        grid: &GridParams,
        sxx: &[f64],
        syy: &[f64],
        szz: &[f64],
        sxy: &[f64],
        sxz: &[f64],
        syz: &[f64],
        i: usize,
    ) -> Self {
        let inv_dx = 1.0 / grid.dx as f64;
        let sx = 1;
        let sy = grid.stride_y;
        let sz = grid.stride_z;

        Self {
            dsxx_dx: (sxx[i] - sxx[i - sx]) * inv_dx,
            dsxy_dy: (sxy[i] - sxy[i - sy]) * inv_dx,
            dsxz_dz: (sxz[i] - sxz[i - sz]) * inv_dx,
            dsxy_dx: (sxy[i] - sxy[i - sx]) * inv_dx,
            dsyy_dy: (syy[i] - syy[i - sy]) * inv_dx,
            dsyz_dz: (syz[i] - syz[i - sz]) * inv_dx,
            dsxz_dx: (sxz[i] - sxz[i - sx]) * inv_dx,
            dsyz_dy: (syz[i] - syz[i - sy]) * inv_dx,
            dszz_dz: (szz[i] - szz[i - sz]) * inv_dx,
        }
    }
}

/// Advance one voxel's velocity by `dt`, given the previous velocity, the
/// stress gradients surrounding it, and the voxel's clamped density
/// (spec.md §4.3.2 steps 3-5). The boundary/material guard (step 1) is the
/// caller's responsibility.
pub fn update_velocity_voxel(
    prev: VelocityState,
    grad: StressGradient,
    density: f64,
    dt: f64,
) -> VelocityState {
    let inv_rho = dt / density;

    let dvx = inv_rho * (grad.dsxx_dx + grad.dsxy_dy + grad.dsxz_dz);
    let dvy = inv_rho * (grad.dsxy_dx + grad.dsyy_dy + grad.dsyz_dz);
    let dvz = inv_rho * (grad.dsxz_dx + grad.dsyz_dy + grad.dszz_dz);

    VelocityState {
        vx: safe_clamp((1.0 - DAMPING_ALPHA) * prev.vx + dvx),
        vy: safe_clamp((1.0 - DAMPING_ALPHA) * prev.vy + dvy),
        vz: safe_clamp((1.0 - DAMPING_ALPHA) * prev.vz + dvz),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gradient_decays_toward_zero_via_damping() {
        let prev = VelocityState {
            vx: 1.0,
            vy: 2.0,
            vz: -3.0,
        };
        let next = update_velocity_voxel(prev, StressGradient::default(), 2000.0, 1e-6);
        assert_eq!(next.vx, 0.95);
        assert_eq!(next.vy, 1.9);
        assert_eq!(next.vz, -2.85);
    }

    #[test]
    fn stress_gradient_accelerates_matching_component() {
        let grad = StressGradient {
            dsxx_dx: 1.0e9,
            ..Default::default()
        };
        let next = update_velocity_voxel(VelocityState::default(), grad, 2000.0, 1e-6);
        assert!(next.vx > 0.0);
        assert_eq!(next.vy, 0.0);
    }

    #[test]
    fn clamps_extreme_values() {
        let grad = StressGradient {
            dsxx_dx: f64::MAX,
            ..Default::default()
        };
        let next = update_velocity_voxel(VelocityState::default(), grad, 100.0, 1e-6);
        assert!(next.vx.is_finite());
        assert!(next.vx <= 1e10);
    }

    #[test]
    fn non_finite_previous_velocity_is_masked() {
        let prev = VelocityState {
            vx: f64::NAN,
            ..Default::default()
        };
        let next = update_velocity_voxel(prev, StressGradient::default(), 2000.0, 1e-6);
        assert_eq!(next.vx, 0.0);
    }
}
