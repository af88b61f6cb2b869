//! Wavefront arrival detector (C4, spec.md §4.4, "Arrival detection").

use crate::volume::VolumeModel;

/// Absolute floor applied under both the P and S relative thresholds, so a
/// silent receiver never spuriously "arrives" on round-off noise.
const THRESHOLD_FLOOR: f64 = 1e-10;

/// P-arrival threshold as a fraction of the running peak.
const P_THRESHOLD_FRACTION: f64 = 0.01;

/// S-arrival threshold as a fraction of the running peak.
const S_THRESHOLD_FRACTION: f64 = 0.15;

/// Minimum step gap enforced between P- and S-arrival.
const S_MIN_STEP_GAP: u64 = 5;

/// Tolerance applied to the `(Vp/Vs)_theory` step-ratio gate.
const RATIO_TOLERANCE: f64 = 0.05;

/// Acceptable window for the measured `stepCount / P_step` ratio.
const RATIO_WINDOW: (f64, f64) = (1.3, 2.2);

/// Running state of the arrival detector; owned by the driver and updated
/// once per step after the velocity pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrivalDetector {
    pub p_max: f64,
    pub s_max: f64,
    pub p_step: Option<u64>,
    pub s_step: Option<u64>,
}

/// `v_parallel` and `v_perp` sampled at the receiver for one step.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverSample {
    pub v_parallel: f64,
    pub v_perp: f64,
}

impl ReceiverSample {
    /// Single-voxel sample at `(rx,ry,rz)` (spec.md §4.4, "Receiver metric").
    pub fn from_voxel(model: &VolumeModel, main_axis: usize) -> Self {
        let i = model
            .grid
            .index(model.geometry.rx, model.geometry.ry, model.geometry.rz);
        Self::from_components(model.vx[i], model.vy[i], model.vz[i], main_axis)
    }

    /// Material-masked mean over the receiver face, used with full-face
    /// transducers (spec.md §4.4, "Receiver metric").
    pub fn from_face_mean(model: &VolumeModel, main_axis: usize) -> Self {
        let (w, h, d) = (model.grid.width, model.grid.height, model.grid.depth);
        let r = (model.geometry.rx, model.geometry.ry, model.geometry.rz);

        let mut voxels: Vec<(usize, usize, usize)> = Vec::new();
        match main_axis {
            0 => {
                for z in 0..d {
                    for y in 0..h {
                        voxels.push((r.0, y, z));
                    }
                }
            }
            1 => {
                for z in 0..d {
                    for x in 0..w {
                        voxels.push((x, r.1, z));
                    }
                }
            }
            _ => {
                for y in 0..h {
                    for x in 0..w {
                        voxels.push((x, y, r.2));
                    }
                }
            }
        }

        let mut sum = (0.0, 0.0, 0.0);
        let mut count = 0usize;
        for (x, y, z) in voxels {
            let i = model.grid.index(x, y, z);
            if !model.is_target(i) {
                continue;
            }
            sum.0 += model.vx[i];
            sum.1 += model.vy[i];
            sum.2 += model.vz[i];
            count += 1;
        }

        if count == 0 {
            return Self {
                v_parallel: 0.0,
                v_perp: 0.0,
            };
        }
        let n = count as f64;
        Self::from_components(sum.0 / n, sum.1 / n, sum.2 / n, main_axis)
    }

    fn from_components(vx: f64, vy: f64, vz: f64, main_axis: usize) -> Self {
        let (v_par, a, b) = match main_axis {
            0 => (vx, vy, vz),
            1 => (vy, vx, vz),
            _ => (vz, vx, vy),
        };
        Self {
            v_parallel: v_par.abs(),
            v_perp: (a * a + b * b).sqrt(),
        }
    }
}

impl ArrivalDetector {
    /// Update running maxima and (possibly) declare P/S arrival for this
    /// step. `vp_vs_theory` is [`crate::volume::PhysicsParams::theoretical_vp_vs`].
    pub fn observe(&mut self, step: u64, sample: ReceiverSample, vp_vs_theory: f64) {
        self.p_max = self.p_max.max(sample.v_parallel);
        self.s_max = self.s_max.max(sample.v_perp);

        if self.p_step.is_none() {
            let threshold = (P_THRESHOLD_FRACTION * self.p_max).max(THRESHOLD_FLOOR);
            if sample.v_parallel > threshold {
                self.p_step = Some(step);
            }
        }

        if self.s_step.is_none() {
            if let Some(p_step) = self.p_step {
                if step >= p_step + S_MIN_STEP_GAP {
                    let threshold = (S_THRESHOLD_FRACTION * self.s_max).max(THRESHOLD_FLOOR);
                    let gate1 = sample.v_perp > threshold;
                    let gate2 = sample.v_perp > sample.v_parallel;
                    let gate3 = (step as f64)
                        >= (1.0 - RATIO_TOLERANCE) * (p_step as f64) * vp_vs_theory;
                    let ratio = step as f64 / p_step.max(1) as f64;
                    let gate4 = ratio >= RATIO_WINDOW.0 && ratio <= RATIO_WINDOW.1;

                    if gate1 && gate2 && gate3 && gate4 {
                        self.s_step = Some(step);
                    }
                }
            }
        }
    }

    pub fn p_detected(&self) -> bool {
        self.p_step.is_some()
    }

    pub fn s_detected(&self) -> bool {
        self.s_step.is_some()
    }

    /// Impute any missing arrivals against the expected-step estimate
    /// (spec.md §4.4, "Failure semantics" and §4.5, "Termination").
    pub fn impute_missing(&mut self, expected_steps: u64) {
        if self.p_step.is_none() {
            self.p_step = Some((expected_steps / 3).max(1));
        }
        if self.s_step.is_none() {
            self.s_step = Some((expected_steps / 2).max(1));
        }
    }

    /// Derive `S_step` from `P_step` via Poisson's ratio when P is detected
    /// but S never gates (spec.md §4.4, "Failure semantics").
    pub fn derive_s_from_vp(&mut self, poisson_ratio: f64) {
        if let (Some(p_step), None) = (self.p_step, self.s_step) {
            let nu = poisson_ratio;
            let vs_over_vp = ((1.0 - 2.0 * nu) / (2.0 - 2.0 * nu)).max(0.0).sqrt();
            if vs_over_vp > 1e-12 {
                self.s_step = Some(((p_step as f64) / vs_over_vp).round() as u64);
            }
        }
    }
}
