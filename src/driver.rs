//! Simulation driver & state machine (C5, spec.md §4.5, §5, §6).
//!
//! Owns every dynamic field exclusively; external consumers only ever see
//! copies via [`Driver::snapshot`] (spec.md §5, "Shared resources"). Global
//! mutable state — the step counter, max-amplitude trackers, instability
//! counters — is confined to this struct and accessed under the
//! single-threaded step-loop discipline, except `step_count`, which is
//! atomic so the progress-event marshal path can read it cross-thread
//! (spec.md §9, "Global mutable state").

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::arrival::{ArrivalDetector, ReceiverSample};
use crate::backend::{cpu::CpuBackend, SolverBackend};
use crate::error::{FrameCacheError, SolverError};
use crate::events::{CancelledEvent, CompletionEvent, ProgressEvent};
use crate::framecache::FrameCacheWriter;
use crate::schema::SolverConfig;
use crate::source::inject_source;
use crate::timestep::TimeStepPlan;
use crate::volume::VolumeModel;

/// Instability/progress checks happen every 20-30 steps (spec.md §4.5); 25
/// splits the difference.
const PERIODIC_CHECK_INTERVAL: u64 = 25;

/// Three consecutive failed stability checks are required before the
/// instability watcher declares a fault (spec.md §4.5).
const INSTABILITY_STRIKE_LIMIT: u32 = 3;

/// State machine positions (spec.md §4.5, "State machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Initialized,
    Running,
    Completed,
    Cancelled,
    Degraded,
}

/// A cooperative cancellation handle; cloning shares the same underlying
/// flag. Polled between steps only, never inside a kernel (spec.md §5,
/// "Cancellation").
#[derive(Debug, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal outcome of [`Driver::run`].
#[derive(Debug, Clone, Copy)]
pub enum RunOutcome {
    Completed(CompletionEvent),
    Cancelled(CancelledEvent),
}

/// Owns the volume model, the active backend, and every piece of per-run
/// bookkeeping (spec.md §6, "Operations").
pub struct Driver {
    model: VolumeModel,
    backend: Box<dyn SolverBackend>,
    dt: f64,
    plan: TimeStepPlan,
    detector: ArrivalDetector,
    frame_cache: Option<FrameCacheWriter>,
    step_count: Arc<AtomicU64>,
    cancel_flag: Arc<AtomicBool>,
    state: DriverState,
    instability_strikes: u32,
    prev_sampled_max: f64,
}

impl Driver {
    /// Construct a driver on the default parallel-CPU backend. Applies
    /// pre-stress and the single initial source impulse immediately, as the
    /// specification requires both to happen before the first step (spec.md
    /// §4.4).
    pub fn new(
        config: SolverConfig,
        material: Vec<u8>,
        density: Vec<f32>,
    ) -> Result<Self, SolverError> {
        Self::with_backend(config, material, density, Box::new(CpuBackend))
    }

    /// Construct a driver on a caller-supplied backend (e.g. the GPU
    /// backend behind the `gpu` feature). Both backends satisfy the same
    /// [`SolverBackend`] contract (spec.md §9, "Backend polymorphism").
    pub fn with_backend(
        config: SolverConfig,
        material: Vec<u8>,
        density: Vec<f32>,
        backend: Box<dyn SolverBackend>,
    ) -> Result<Self, SolverError> {
        let mut model = VolumeModel::new(config, material, density)?;
        model.apply_pre_stress();
        inject_source(&mut model);

        let plan = TimeStepPlan::derive(&model);

        Ok(Self {
            dt: plan.dt,
            plan,
            model,
            backend,
            detector: ArrivalDetector::default(),
            frame_cache: None,
            step_count: Arc::new(AtomicU64::new(0)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            state: DriverState::Initialized,
            instability_strikes: 0,
            prev_sampled_max: 0.0,
        })
    }

    /// Enable the on-disk frame cache (spec.md §6, `setCachePath`,
    /// `enableFrameCaching`, `cacheInterval`).
    pub fn enable_frame_cache<P: AsRef<Path>>(
        &mut self,
        dir: P,
        interval: u32,
    ) -> Result<(), FrameCacheError> {
        self.frame_cache = Some(FrameCacheWriter::new(dir, interval)?);
        Ok(())
    }

    /// A cooperative handle the caller can use to request termination from
    /// another thread (spec.md §6, `cancel()`).
    pub fn cancellation_token(&self) -> CancellationToken {
        CancellationToken(self.cancel_flag.clone())
    }

    /// Safe concurrent read of the three velocity fields (spec.md §6,
    /// `snapshot()`). Returns copies; the driver keeps exclusive ownership
    /// of the live buffers.
    pub fn snapshot(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        self.model.snapshot_velocity()
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn step_count(&self) -> u64 {
        self.step_count.load(Ordering::Relaxed)
    }

    /// Run the step loop to completion or cancellation. May only be called
    /// once per instance (spec.md §6, `start()`); a second call is a logic
    /// error on the caller's part, not one this type tries to prevent at
    /// the type level, matching the teacher's propagator's `run` shape.
    pub fn run(&mut self, mut on_progress: impl FnMut(ProgressEvent)) -> RunOutcome {
        self.state = DriverState::Running;

        let full_face = self.model.config.use_full_face_transducers;
        let progress_interval: u64 = if full_face { 10 } else { 1 };
        let main_axis = self.model.geometry.main_axis;

        loop {
            if self.cancel_flag.load(Ordering::Relaxed) {
                let step = self.step_count.load(Ordering::Relaxed);
                self.state = DriverState::Cancelled;
                on_progress(ProgressEvent {
                    percent: self.percent_complete(step),
                    step,
                    status: "cancelled".to_string(),
                    p_field: None,
                    s_field: None,
                });
                return RunOutcome::Cancelled(CancelledEvent { step });
            }

            if let Err(err) = self.backend.step(&mut self.model, self.dt) {
                warn!("backend fault, degrading run: {err}");
                return RunOutcome::Completed(self.finish(true));
            }

            let step = self.step_count.fetch_add(1, Ordering::Relaxed) + 1;

            let sample = if full_face {
                ReceiverSample::from_face_mean(&self.model, main_axis)
            } else {
                ReceiverSample::from_voxel(&self.model, main_axis)
            };
            self.detector
                .observe(step, sample, self.model.physics.theoretical_vp_vs());

            if let Some(cache) = &mut self.frame_cache {
                cache.push_series(sample.v_parallel, sample.v_perp);
                if cache.should_write(step) {
                    let percent = self.percent_complete(step) as f64;
                    if let Err(err) = cache.write_frame(
                        &self.model,
                        step,
                        sample.v_parallel,
                        sample.v_perp,
                        percent,
                        percent,
                    ) {
                        warn!("frame cache write failed at step {step}: {err}");
                    }
                }
            }

            if step % PERIODIC_CHECK_INTERVAL == 0 {
                self.run_instability_check(step);
            }

            if step % progress_interval == 0 {
                let (p_field, s_field) = if step % (progress_interval * 5) == 0 {
                    (
                        Some(downsample_normalized(&self.model.vx, 4)),
                        Some(downsample_normalized(&self.model.vy, 4)),
                    )
                } else {
                    (None, None)
                };
                on_progress(ProgressEvent {
                    percent: self.percent_complete(step),
                    step,
                    status: "running".to_string(),
                    p_field,
                    s_field,
                });
            }

            let tail_elapsed = self
                .detector
                .s_step
                .map(|s_step| step.saturating_sub(s_step) >= self.model.physics.total_time_steps)
                .unwrap_or(false);
            let normal_done = self.detector.p_detected() && self.detector.s_detected() && tail_elapsed;
            let cap_done = step >= self.plan.safety_cap;

            if normal_done || cap_done {
                let degraded = !normal_done || self.instability_strikes >= INSTABILITY_STRIKE_LIMIT;
                return RunOutcome::Completed(self.finish(degraded));
            }
        }
    }

    fn percent_complete(&self, step: u64) -> u32 {
        let pct = 100.0 * step as f64 / self.plan.expected_steps.max(1) as f64;
        pct.min(99.0).max(0.0) as u32
    }

    fn run_instability_check(&mut self, step: u64) {
        let m = self.model.sampled_max_abs(7);
        let unstable = !m.is_finite() || m > 1e30 || (m > 1e15 && m > 10.0 * self.prev_sampled_max);

        if unstable {
            self.instability_strikes += 1;
        } else {
            self.instability_strikes = 0;
        }
        self.prev_sampled_max = m;

        if self.instability_strikes >= INSTABILITY_STRIKE_LIMIT {
            if !self.detector.p_detected() && step > self.plan.min_required_steps / 2 {
                info!("instability watcher imputing P arrival at step {step}");
                self.detector.p_step = Some(step);
            }
            if let Some(p_step) = self.detector.p_step {
                if !self.detector.s_detected() && step > p_step + self.plan.min_required_steps / 4 {
                    info!("instability watcher imputing S arrival at step {step}");
                    self.detector.s_step = Some(step);
                }
            }
        }

        if m > 1e12 {
            self.model.renormalize(1e10 / m);
        }
    }

    fn finish(&mut self, degraded: bool) -> CompletionEvent {
        if self.detector.p_detected() && !self.detector.s_detected() {
            self.detector.derive_s_from_vp(self.model.physics.poisson_ratio());
        }
        self.detector.impute_missing(self.plan.expected_steps);

        let p_step = self.detector.p_step.unwrap_or(1);
        let s_step = self.detector.s_step.unwrap_or(1);
        let l = self.model.grid.dx as f64 * self.model.geometry.voxel_distance() as f64;
        let vp = l / (p_step as f64 * self.dt);
        let vs = l / (s_step as f64 * self.dt);

        self.state = if degraded {
            DriverState::Degraded
        } else {
            DriverState::Completed
        };

        CompletionEvent {
            vp,
            vs,
            vp_vs_ratio: if vs > 0.0 { vp / vs } else { 0.0 },
            p_step,
            s_step,
            total_steps: self.step_count.load(Ordering::Relaxed),
            degraded,
        }
    }
}

/// Down-sample a field by `stride` and normalize so `max|.| <= 1e3` (spec.md
/// §4.5, "Progress events").
fn downsample_normalized(field: &[f64], stride: usize) -> Vec<f32> {
    let stride = stride.max(1);
    let sampled: Vec<f64> = field.iter().step_by(stride).copied().collect();
    let peak = sampled.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if peak <= 1e3 || peak == 0.0 {
        sampled.iter().map(|&v| v as f32).collect()
    } else {
        let scale = 1e3 / peak;
        sampled.iter().map(|&v| (v * scale) as f32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Axis, ElasticConfig, GridConfig, MaterialStrengthConfig, ModelFlags, SolverConfig,
        SourceConfig, WaveType,
    };

    fn config() -> SolverConfig {
        SolverConfig {
            grid: GridConfig {
                width: 24,
                height: 24,
                depth: 24,
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
                total_time_steps: 20,
            },
            flags: ModelFlags::default(),
            elastic: ElasticConfig {
                youngs_modulus_mpa: 20_000.0,
                poisson_ratio: 0.25,
            },
            use_full_face_transducers: false,
        }
    }

    #[test]
    fn new_applies_pre_stress_and_source_before_first_step() {
        let cfg = config();
        let n = cfg.grid.grid_size();
        let driver = Driver::new(cfg, vec![1u8; n], vec![2000.0f32; n]).unwrap();
        assert_eq!(driver.state(), DriverState::Initialized);
        assert_eq!(driver.step_count(), 0);
    }

    #[test]
    fn run_reaches_completed_or_degraded_state() {
        let cfg = config();
        let n = cfg.grid.grid_size();
        let mut driver = Driver::new(cfg, vec![1u8; n], vec![2000.0f32; n]).unwrap();
        let outcome = driver.run(|_evt| {});
        match outcome {
            RunOutcome::Completed(evt) => {
                assert!(evt.total_steps > 0);
                assert!(driver.state() == DriverState::Completed || driver.state() == DriverState::Degraded);
            }
            RunOutcome::Cancelled(_) => panic!("did not expect cancellation"),
        }
    }

    #[test]
    fn cancellation_token_stops_the_loop_promptly() {
        let cfg = config();
        let n = cfg.grid.grid_size();
        let mut driver = Driver::new(cfg, vec![1u8; n], vec![2000.0f32; n]).unwrap();
        let token = driver.cancellation_token();
        token.cancel();
        let outcome = driver.run(|_evt| {});
        assert!(matches!(outcome, RunOutcome::Cancelled(_)));
        assert_eq!(driver.state(), DriverState::Cancelled);
    }

    #[test]
    fn frame_cache_writes_files_during_run() {
        let cfg = config();
        let n = cfg.grid.grid_size();
        let mut driver = Driver::new(cfg, vec![1u8; n], vec![2000.0f32; n]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        driver.enable_frame_cache(dir.path(), 5).unwrap();
        driver.run(|_evt| {});
        let has_any_frame = std::fs::read_dir(dir.path())
            .unwrap()
            .any(|e| e.unwrap().file_name().to_string_lossy().starts_with("frame_"));
        assert!(has_any_frame);
    }
}
