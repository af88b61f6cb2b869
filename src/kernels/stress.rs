//! Stress update kernel (C3, spec.md §4.3.1).

use crate::kernels::max_principal_stress;
use crate::schema::ModelFlags;
use crate::volume::{safe_clamp, GridParams, MAX_DAMAGE};

/// The nine velocity gradients `d v_i / d x_j`, centered differences.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityGradient {
    pub dvx_dx: f64,
    pub dvx_dy: f64,
    pub dvx_dz: f64,
    pub dvy_dx: f64,
    pub dvy_dy: f64,
    pub dvy_dz: f64,
    pub dvz_dx: f64,
    pub dvz_dy: f64,
    pub dvz_dz: f64,
}

impl VelocityGradient {
    /// Gather the nine centered-difference gradients around voxel `i` from
    /// the previous step's velocity fields.
    #[inline]
    pub fn centered(
        grid: &GridParams,
        vx: &[f64],
        vy: &[f64],
        vz: &[f64],
        i: usize,
    ) -> Self {
        let inv_2dx = 1.0 / (2.0 * grid.dx as f64);
        let sx = 1;
        let sy = grid.stride_y;
        let sz = grid.stride_z;

        Self {
            dvx_dx: (vx[i + sx] - vx[i - sx]) * inv_2dx,
            dvx_dy: (vx[i + sy] - vx[i - sy]) * inv_2dx,
            dvx_dz: (vx[i + sz] - vx[i - sz]) * inv_2dx,
            dvy_dx: (vy[i + sx] - vy[i - sx]) * inv_2dx,
            dvy_dy: (vy[i + sy] - vy[i - sy]) * inv_2dx,
            dvy_dz: (vy[i + sz] - vy[i - sz]) * inv_2dx,
            dvz_dx: (vz[i + sx] - vz[i - sx]) * inv_2dx,
            dvz_dy: (vz[i + sy] - vz[i - sy]) * inv_2dx,
            dvz_dz: (vz[i + sz] - vz[i - sz]) * inv_2dx,
        }
    }

    #[inline]
    fn divergence(&self) -> f64 {
        self.dvx_dx + self.dvy_dy + self.dvz_dz
    }
}

/// The six independent components of a symmetric stress tensor, plus damage.
#[derive(Debug, Clone, Copy, Default)]
pub struct StressState {
    pub sxx: f64,
    pub syy: f64,
    pub szz: f64,
    pub sxy: f64,
    pub sxz: f64,
    pub syz: f64,
    pub damage: f64,
}

/// Advance one voxel's stress state by `dt`, given the velocity gradients
/// around it and the voxel's undamaged Lame constants. Implements spec.md
/// §4.3.1 steps 2-8; the boundary/material guard (step 1) is the caller's
/// responsibility (whole-grid iteration lives in [`crate::backend`]).
pub fn update_stress_voxel(
    state: StressState,
    grad: VelocityGradient,
    lambda0: f64,
    mu0: f64,
    confining_pressure: f64,
    tensile_strength: f64,
    cohesion: f64,
    sin_phi: f64,
    cos_phi: f64,
    dt: f64,
    flags: ModelFlags,
) -> StressState {
    let mut s = state;

    let div = grad.divergence();

    let (lambda, mu) = if flags.use_brittle {
        let d = s.damage;
        ((1.0 - d) * lambda0, (1.0 - d) * mu0)
    } else {
        (lambda0, mu0)
    };

    if flags.use_elastic {
        s.sxx += dt * (lambda * div + 2.0 * mu * grad.dvx_dx);
        s.syy += dt * (lambda * div + 2.0 * mu * grad.dvy_dy);
        s.szz += dt * (lambda * div + 2.0 * mu * grad.dvz_dz);
        s.sxy += dt * mu * (grad.dvx_dy + grad.dvy_dx);
        s.sxz += dt * mu * (grad.dvx_dz + grad.dvz_dx);
        s.syz += dt * mu * (grad.dvy_dz + grad.dvz_dy);
    }

    if flags.use_plastic {
        apply_mohr_coulomb(&mut s, confining_pressure, sin_phi, cos_phi, cohesion);
    }

    if flags.use_brittle {
        apply_brittle_damage(&mut s, tensile_strength);
    }

    clamp_stress(&mut s);
    s
}

/// Mohr-Coulomb plastic corrector (spec.md §4.3.1 step 6).
pub fn apply_mohr_coulomb(
    s: &mut StressState,
    confining_pressure: f64,
    sin_phi: f64,
    cos_phi: f64,
    cohesion: f64,
) {
    let p_bar = (s.sxx + s.syy + s.szz) / 3.0;
    let dxx = s.sxx - p_bar;
    let dyy = s.syy - p_bar;
    let dzz = s.szz - p_bar;

    let j2 = (0.5 * (dxx * dxx + dyy * dyy + dzz * dzz)
        + s.sxy * s.sxy
        + s.sxz * s.sxz
        + s.syz * s.syz)
        .max(0.0);
    let tau = j2.sqrt();
    let p = -p_bar + confining_pressure;

    let f = tau + p * sin_phi - cohesion * cos_phi;
    if f > 0.0 {
        let k = (0.9f64).min((tau - (cohesion * cos_phi - p * sin_phi)) / tau.max(1e-10));
        let scale = 1.0 - k;
        s.sxx = dxx * scale + p_bar;
        s.syy = dyy * scale + p_bar;
        s.szz = dzz * scale + p_bar;
        s.sxy *= scale;
        s.sxz *= scale;
        s.syz *= scale;
    }
}

/// Brittle damage accumulation and stiffness degradation (spec.md §4.3.1
/// step 7). Per the specification text, the `(1-D_new)` stress scaling is
/// applied only when the tensile-overload condition actually fires, not
/// unconditionally every step.
pub fn apply_brittle_damage(s: &mut StressState, tensile_strength: f64) {
    let i1 = s.sxx + s.syy + s.szz;
    let i2 = s.sxx * s.syy + s.syy * s.szz + s.szz * s.sxx
        - s.sxy * s.sxy
        - s.sxz * s.sxz
        - s.syz * s.syz;
    let i3 = s.sxx * s.syy * s.szz + 2.0 * s.sxy * s.sxz * s.syz
        - s.sxx * s.syz * s.syz
        - s.syy * s.sxz * s.sxz
        - s.szz * s.sxy * s.sxy;

    let sigma_max = max_principal_stress(i1, i2, i3);

    if sigma_max > tensile_strength && s.damage < 1.0 {
        let growth = 0.005 * (0.05f64).min((sigma_max - tensile_strength) / tensile_strength);
        let d_new = (s.damage + growth).min(MAX_DAMAGE);
        s.damage = d_new;

        let scale = 1.0 - d_new;
        s.sxx *= scale;
        s.syy *= scale;
        s.szz *= scale;
        s.sxy *= scale;
        s.sxz *= scale;
        s.syz *= scale;
    }
}

fn clamp_stress(s: &mut StressState) {
    s.sxx = safe_clamp(s.sxx);
    s.syy = safe_clamp(s.syy);
    s.szz = safe_clamp(s.szz);
    s.sxy = safe_clamp(s.sxy);
    s.sxz = safe_clamp(s.sxz);
    s.syz = safe_clamp(s.syz);
}
