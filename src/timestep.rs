//! Time-Step Planner (C2, spec.md §4.2).

use crate::volume::VolumeModel;

/// Courant safety factor applied to the CFL limit.
pub const COURANT_SAFETY: f64 = 0.2;

/// Ceiling imposed on any estimated wave speed, m/s.
pub const MAX_WAVE_SPEED: f64 = 6000.0;

/// A CFL- and frequency-safe `dt` plus the expected run length derived from
/// transducer geometry and average material properties.
#[derive(Debug, Clone, Copy)]
pub struct TimeStepPlan {
    pub dt: f64,
    /// Expected number of steps for the wave to cross from source to
    /// receiver plus the post-arrival tail (spec.md §4.2, `S_exp`).
    pub expected_steps: u64,
    /// Absolute safety cap on total steps (spec.md §4.2).
    pub safety_cap: u64,
    /// Minimum steps required before the instability fallback will accept
    /// degraded arrival estimates (spec.md §4.2, `S_min`).
    pub min_required_steps: u64,
}

impl TimeStepPlan {
    pub fn derive(model: &VolumeModel) -> Self {
        let dx = model.grid.dx as f64;
        let rho_min = model.min_density();
        let v_p_max = (((model.physics.lambda0 + 2.0 * model.physics.mu0) / rho_min).sqrt())
            .min(MAX_WAVE_SPEED);

        let dt_cfl = COURANT_SAFETY * dx / v_p_max;
        let f = model.physics.frequency;
        let dt_freq = if f > 0.0 { 1.0 / (20.0 * f) } else { 1e-5 };
        let dt = dt_cfl.min(dt_freq).max(1e-8);

        let l = dx * model.geometry.voxel_distance() as f64;
        let rho_avg = model.average_density();
        let v_p_est = (((model.physics.lambda0 + 2.0 * model.physics.mu0) / rho_avg).sqrt())
            .min(MAX_WAVE_SPEED);

        let total_time_steps = model.physics.total_time_steps;
        let expected_steps = (l / (v_p_est * dt)).ceil() as u64 + total_time_steps;
        let safety_cap = (2 * expected_steps).max(1000);
        let min_required_steps = (total_time_steps / 10).max(50);

        Self {
            dt,
            expected_steps,
            safety_cap,
            min_required_steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Axis, ElasticConfig, GridConfig, MaterialStrengthConfig, ModelFlags, SolverConfig,
        SourceConfig, WaveType,
    };

    fn model() -> VolumeModel {
        let cfg = SolverConfig {
            grid: GridConfig {
                width: 64,
                height: 64,
                depth: 64,
                dx: 1e-4,
            },
            material_id: 1,
            axis: Axis::X,
            wave_type: WaveType::Both,
            strength: MaterialStrengthConfig {
                confining_pressure_mpa: 0.0,
                tensile_strength_mpa: 5.0,
                failure_angle_deg: 30.0,
                cohesion_mpa: 10.0,
            },
            source: SourceConfig {
                energy_j: 1.0,
                frequency_khz: 100.0,
                amplitude: 100,
                total_time_steps: 200,
            },
            flags: ModelFlags::default(),
            elastic: ElasticConfig {
                youngs_modulus_mpa: 20_000.0,
                poisson_ratio: 0.25,
            },
            use_full_face_transducers: false,
        };
        let n = cfg.grid.grid_size();
        VolumeModel::new(cfg, vec![1u8; n], vec![2000.0f32; n]).unwrap()
    }

    #[test]
    fn dt_respects_cfl_and_frequency_bounds() {
        let model = model();
        let plan = TimeStepPlan::derive(&model);

        let rho_min = model.min_density();
        let v_p_max = ((model.physics.lambda0 + 2.0 * model.physics.mu0) / rho_min)
            .sqrt()
            .min(MAX_WAVE_SPEED);
        let dt_cfl = COURANT_SAFETY * model.grid.dx as f64 / v_p_max;
        assert!(plan.dt <= dt_cfl + 1e-15);

        let dt_freq = 1.0 / (20.0 * model.physics.frequency);
        assert!(plan.dt * 20.0 * model.physics.frequency <= 1.0 + 1e-9);
        assert!(plan.dt <= dt_freq + 1e-15);
    }

    #[test]
    fn safety_cap_is_at_least_twice_expected_and_1000() {
        let plan = TimeStepPlan::derive(&model());
        assert!(plan.safety_cap >= 1000);
        assert!(plan.safety_cap >= 2 * plan.expected_steps);
    }

    #[test]
    fn min_required_steps_floor_is_fifty() {
        let plan = TimeStepPlan::derive(&model());
        assert!(plan.min_required_steps >= 50);
    }
}
