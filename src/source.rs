//! Source injection (C4, spec.md §4.4, "Source injection").
//!
//! Applied once at `t=0`, after [`crate::volume::VolumeModel::apply_pre_stress`].

use crate::volume::VolumeModel;

/// Amplitude coefficient `p = amplitude * sqrt(energy) * 1e6` shared by both
/// injection modes.
fn pressure_amplitude(amplitude: i32, energy: f64) -> f64 {
    amplitude as f64 * energy.max(0.0).sqrt() * 1e6
}

/// Inject the initial impulse, dispatching to point-source or full-face
/// transducer geometry per `config.use_full_face_transducers`.
pub fn inject_source(model: &mut VolumeModel) {
    if model.config.use_full_face_transducers {
        inject_full_face(model);
    } else {
        inject_point_source(model);
    }
}

/// Spherical neighborhood of radius 2 around the transmitter (spec.md §4.4).
fn inject_point_source(model: &mut VolumeModel) {
    let p = pressure_amplitude(model.physics.amplitude, model.physics.energy);
    let (tx, ty, tz) = (
        model.geometry.tx as i64,
        model.geometry.ty as i64,
        model.geometry.tz as i64,
    );
    let (rx, ry, rz) = (
        model.geometry.rx as i64,
        model.geometry.ry as i64,
        model.geometry.rz as i64,
    );
    let main_axis = model.geometry.main_axis;
    let radius = 2i64;

    let (w, h, d) = (
        model.grid.width as i64,
        model.grid.height as i64,
        model.grid.depth as i64,
    );

    let x_lo = (tx - radius).max(0);
    let x_hi = (tx + radius).min(w - 1);
    let y_lo = (ty - radius).max(0);
    let y_hi = (ty + radius).min(h - 1);
    let z_lo = (tz - radius).max(0);
    let z_hi = (tz + radius).min(d - 1);

    for z in z_lo..=z_hi {
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let dxv = (x - tx) as f64;
                let dyv = (y - ty) as f64;
                let dzv = (z - tz) as f64;
                let dist = (dxv * dxv + dyv * dyv + dzv * dzv).sqrt();
                if dist > radius as f64 {
                    continue;
                }

                let (xu, yu, zu) = (x as usize, y as usize, z as usize);
                if model.grid.is_boundary(xu, yu, zu) {
                    continue;
                }

                let i = model.grid.index(xu, yu, zu);
                if !model.is_target(i) {
                    continue;
                }

                let weight = (1.0 - dist / radius as f64).powi(2);
                let kick = p * weight;

                model.sxx[i] += kick;
                model.syy[i] += kick;
                model.szz[i] += kick;

                let (t_axis, r_axis) = match main_axis {
                    0 => (tx, rx),
                    1 => (ty, ry),
                    _ => (tz, rz),
                };
                let sign = if r_axis > t_axis {
                    1.0
                } else if r_axis < t_axis {
                    -1.0
                } else {
                    1.0
                };
                let rho = model.density_at(i);
                let velocity_kick = sign * kick / (10.0 * rho);

                match main_axis {
                    0 => model.vx[i] += velocity_kick,
                    1 => model.vy[i] += velocity_kick,
                    _ => model.vz[i] += velocity_kick,
                }
            }
        }
    }
}

/// All target-material voxels on the plane `axis = t_axis` (spec.md §4.4,
/// "Full-face transducer").
fn inject_full_face(model: &mut VolumeModel) {
    let p = pressure_amplitude(model.physics.amplitude, model.physics.energy);
    let main_axis = model.geometry.main_axis;
    let (tx, ty, tz) = (model.geometry.tx, model.geometry.ty, model.geometry.tz);
    let (rx, ry, rz) = (model.geometry.rx, model.geometry.ry, model.geometry.rz);

    let (w, h, d) = (model.grid.width, model.grid.height, model.grid.depth);

    let sign = match main_axis {
        0 => {
            if rx > tx {
                1.0
            } else if rx < tx {
                -1.0
            } else {
                1.0
            }
        }
        1 => {
            if ry > ty {
                1.0
            } else if ry < ty {
                -1.0
            } else {
                1.0
            }
        }
        _ => {
            if rz > tz {
                1.0
            } else if rz < tz {
                -1.0
            } else {
                1.0
            }
        }
    };

    let mut plane_voxels: Vec<(usize, usize, usize)> = Vec::new();
    match main_axis {
        0 => {
            for z in 0..d {
                for y in 0..h {
                    plane_voxels.push((tx, y, z));
                }
            }
        }
        1 => {
            for z in 0..d {
                for x in 0..w {
                    plane_voxels.push((x, ty, z));
                }
            }
        }
        _ => {
            for y in 0..h {
                for x in 0..w {
                    plane_voxels.push((x, y, tz));
                }
            }
        }
    }

    for (x, y, z) in plane_voxels {
        if model.grid.is_boundary(x, y, z) {
            continue;
        }

        let i = model.grid.index(x, y, z);
        if !model.is_target(i) {
            continue;
        }

        model.sxx[i] += p;
        model.syy[i] += p;
        model.szz[i] += p;

        let rho = model.density_at(i);
        let velocity_kick = sign * p / (10.0 * rho);
        match main_axis {
            0 => model.vx[i] += velocity_kick,
            1 => model.vy[i] += velocity_kick,
            _ => model.vz[i] += velocity_kick,
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

    fn config(use_full_face: bool) -> SolverConfig {
        SolverConfig {
            grid: GridConfig {
                width: 16,
                height: 16,
                depth: 16,
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
            use_full_face_transducers: use_full_face,
        }
    }

    #[test]
    fn point_source_excites_neighborhood_of_transmitter() {
        let cfg = config(false);
        let n = cfg.grid.grid_size();
        let material = vec![1u8; n];
        let density = vec![2000.0f32; n];
        let mut model = VolumeModel::new(cfg, material, density).unwrap();
        model.apply_pre_stress();
        inject_source(&mut model);

        let i = model
            .grid
            .index(model.geometry.tx, model.geometry.ty, model.geometry.tz);
        assert!(model.sxx[i] > 0.0);
        assert!(model.vx[i] != 0.0);
    }

    #[test]
    fn point_source_does_not_excite_non_target_material() {
        let cfg = config(false);
        let n = cfg.grid.grid_size();
        let material = vec![0u8; n]; // nothing is target material
        let density = vec![2000.0f32; n];
        let mut model = VolumeModel::new(cfg, material, density).unwrap();
        inject_source(&mut model);
        assert!(model.sxx.iter().all(|&v| v == 0.0));
        assert!(model.vx.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn full_face_excites_entire_transmitter_plane_except_its_boundary_edge() {
        let cfg = config(true);
        let n = cfg.grid.grid_size();
        let material = vec![1u8; n];
        let density = vec![2000.0f32; n];
        let mut model = VolumeModel::new(cfg, material, density).unwrap();
        model.apply_pre_stress();
        inject_source(&mut model);

        let tx = model.geometry.tx;
        let mut excited = 0;
        let mut interior = 0;
        for z in 0..model.grid.depth {
            for y in 0..model.grid.height {
                let i = model.grid.index(tx, y, z);
                if model.grid.is_boundary(tx, y, z) {
                    assert_eq!(model.sxx[i], 0.0);
                    continue;
                }
                interior += 1;
                if model.sxx[i] > 0.0 {
                    excited += 1;
                }
            }
        }
        assert_eq!(excited, interior);
    }
}
