//! Parallel-CPU backend (spec.md §5, "Parallel-CPU").
//!
//! The step loop itself stays single-threaded for ordering; each kernel is a
//! rayon parallel-for over all voxels with no cross-voxel dependency within
//! one kernel invocation. Disjoint output fields are borrowed simultaneously
//! by destructuring `VolumeModel` so rayon can hand out independent
//! `par_iter_mut` lanes without the borrow checker seeing a conflict.

use rayon::prelude::*;

use super::{GpuError, SolverBackend};
use crate::kernels::{
    update_stress_voxel, update_velocity_voxel, StressGradient, StressState, VelocityGradient,
    VelocityState,
};
use crate::volume::VolumeModel;

/// Parallel-CPU kernel dispatcher. Holds no state of its own — every field
/// lives on [`VolumeModel`] — but exists as a concrete type so the driver can
/// hold `Box<dyn SolverBackend>` uniformly with the GPU backend.
#[derive(Debug, Default)]
pub struct CpuBackend;

impl SolverBackend for CpuBackend {
    fn step(&mut self, model: &mut VolumeModel, dt: f64) -> Result<(), GpuError> {
        stress_pass(model, dt);
        velocity_pass(model, dt);
        Ok(())
    }
}

fn stress_pass(model: &mut VolumeModel, dt: f64) {
    let VolumeModel {
        grid,
        config,
        physics,
        material,
        vx,
        vy,
        vz,
        sxx,
        syy,
        szz,
        sxy,
        sxz,
        syz,
        damage,
        ..
    } = model;

    let material_id = config.material_id;
    let flags = config.flags;
    let lambda0 = physics.lambda0;
    let mu0 = physics.mu0;
    let confining_pressure = physics.confining_pressure;
    let tensile_strength = physics.tensile_strength;
    let cohesion = physics.cohesion;
    let sin_phi = physics.sin_phi;
    let cos_phi = physics.cos_phi;

    sxx.par_iter_mut()
        .zip(syy.par_iter_mut())
        .zip(szz.par_iter_mut())
        .zip(sxy.par_iter_mut())
        .zip(sxz.par_iter_mut())
        .zip(syz.par_iter_mut())
        .zip(damage.par_iter_mut())
        .enumerate()
        .for_each(
            |(i, ((((((sxx_i, syy_i), szz_i), sxy_i), sxz_i), syz_i), damage_i))| {
                let (x, y, z) = grid.coords(i);
                if grid.is_boundary(x, y, z) || material[i] != material_id {
                    return;
                }

                let grad = VelocityGradient::centered(grid, vx, vy, vz, i);
                let state = StressState {
                    sxx: *sxx_i,
                    syy: *syy_i,
                    szz: *szz_i,
                    sxy: *sxy_i,
                    sxz: *sxz_i,
                    syz: *syz_i,
                    damage: *damage_i,
                };

                let next = update_stress_voxel(
                    state,
                    grad,
                    lambda0,
                    mu0,
                    confining_pressure,
                    tensile_strength,
                    cohesion,
                    sin_phi,
                    cos_phi,
                    dt,
                    flags,
                );

                *sxx_i = next.sxx;
                *syy_i = next.syy;
                *szz_i = next.szz;
                *sxy_i = next.sxy;
                *sxz_i = next.sxz;
                *syz_i = next.syz;
                *damage_i = next.damage;
            },
        );
}

fn velocity_pass(model: &mut VolumeModel, dt: f64) {
    let VolumeModel {
        grid,
        config,
        material,
        density,
        sxx,
        syy,
        szz,
        sxy,
        sxz,
        syz,
        vx,
        vy,
        vz,
        ..
    } = model;

    let material_id = config.material_id;

    vx.par_iter_mut()
        .zip(vy.par_iter_mut())
        .zip(vz.par_iter_mut())
        .enumerate()
        .for_each(|(i, ((vx_i, vy_i), vz_i))| {
            let (x, y, z) = grid.coords(i);
            if grid.is_boundary(x, y, z) || material[i] != material_id {
                return;
            }

            let grad = StressGradient::backward(grid, sxx, syy, szz, sxy, sxz, syz, i);
            let rho = (density[i].max(crate::volume::MIN_DENSITY)) as f64;
            let prev = VelocityState {
                vx: *vx_i,
                vy: *vy_i,
                vz: *vz_i,
            };

            let next = update_velocity_voxel(prev, grad, rho, dt);
            *vx_i = next.vx;
            *vy_i = next.vy;
            *vz_i = next.vz;
        });
}
