//! Frame cache (C5, spec.md §4.5 "Frame cache" / §6 "Frame-cache layout").
//!
//! When enabled, the driver calls [`FrameCacheWriter::write_frame`] every
//! `K`-th step. Layout mirrors the teacher's animation writer
//! (`animation::recorder::AnimationRecorder`) — a `BufWriter` per artifact,
//! `io::Result` propagated up as [`FrameCacheError`] — but as a directory of
//! small per-step files instead of one indexed binary, per spec.md §6.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::FrameCacheError;
use crate::volume::VolumeModel;

/// Ring-buffer capacity for the accumulated P/S time-series (spec.md §4.5).
const SERIES_CAPACITY: usize = 1000;

/// Per-step metadata written alongside the binary artifacts
/// (`frame_<step>.meta.json`, spec.md §6).
///
/// The two mid-plane slices capture the same plane two ways: `tomo` is
/// unsigned velocity magnitude (a tomography-style intensity image); `cross`
/// is the signed main-axis velocity component (a seismic-style
/// cross-section). The specification names both artifacts without fully
/// disambiguating their contents; this split is recorded as a judgment call
/// in DESIGN.md.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameMeta {
    step: u64,
    p_val: f64,
    s_val: f64,
    p_progress: f64,
    s_progress: f64,
    p_series: Vec<f64>,
    s_series: Vec<f64>,
}

/// Writes frame-cache artifacts to a directory, one file set per cached
/// step, and maintains the ring-buffered P/S time series.
pub struct FrameCacheWriter {
    dir: PathBuf,
    interval: u32,
    p_series: VecDeque<f64>,
    s_series: VecDeque<f64>,
}

impl FrameCacheWriter {
    /// Create the cache directory (if missing) and a writer with the given
    /// cache interval (spec.md §6, `cacheInterval : int >= 1`).
    pub fn new<P: AsRef<Path>>(dir: P, interval: u32) -> Result<Self, FrameCacheError> {
        if interval < 1 {
            return Err(FrameCacheError::InvalidInterval(interval));
        }
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            interval,
            p_series: VecDeque::with_capacity(SERIES_CAPACITY),
            s_series: VecDeque::with_capacity(SERIES_CAPACITY),
        })
    }

    /// True if `step` should be persisted given the configured interval.
    #[inline]
    pub fn should_write(&self, step: u64) -> bool {
        step % self.interval as u64 == 0
    }

    /// Push new receiver scalars into the ring-buffered series (called every
    /// step regardless of `should_write`, so the series stay dense even when
    /// the cache interval skips frames).
    pub fn push_series(&mut self, p_val: f64, s_val: f64) {
        push_ring(&mut self.p_series, p_val);
        push_ring(&mut self.s_series, s_val);
    }

    /// Write one step's artifacts: three velocity volumes, two mid-plane
    /// slices, and the JSON metadata (spec.md §6).
    pub fn write_frame(
        &self,
        model: &VolumeModel,
        step: u64,
        p_val: f64,
        s_val: f64,
        p_progress: f64,
        s_progress: f64,
    ) -> Result<(), FrameCacheError> {
        write_volume(&self.path(step, "vx"), &model.vx)?;
        write_volume(&self.path(step, "vy"), &model.vy)?;
        write_volume(&self.path(step, "vz"), &model.vz)?;

        let (tomo, cross) = mid_plane_slices(model);
        write_f32_slice(&self.path(step, "tomo"), &tomo)?;
        write_f32_slice(&self.path(step, "cross"), &cross)?;

        let meta = FrameMeta {
            step,
            p_val,
            s_val,
            p_progress,
            s_progress,
            p_series: self.p_series.iter().copied().collect(),
            s_series: self.s_series.iter().copied().collect(),
        };
        let meta_path = self.dir.join(format!("frame_{step}.meta.json"));
        let file = File::create(meta_path)?;
        serde_json::to_writer(BufWriter::new(file), &meta)?;

        Ok(())
    }

    fn path(&self, step: u64, suffix: &str) -> PathBuf {
        self.dir.join(format!("frame_{step}.{suffix}.bin"))
    }
}

fn push_ring(series: &mut VecDeque<f64>, value: f64) {
    if series.len() >= SERIES_CAPACITY {
        series.pop_front();
    }
    series.push_back(value);
}

fn write_volume(path: &Path, field: &[f64]) -> Result<(), FrameCacheError> {
    let data: Vec<f32> = field.iter().map(|&v| v as f32).collect();
    write_f32_slice(path, &data)
}

fn write_f32_slice(path: &Path, data: &[f32]) -> Result<(), FrameCacheError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for &v in data {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Velocity-magnitude ("tomo") and signed main-axis-component ("cross")
/// slices through the mid-plane perpendicular to `mainAxis` (spec.md §6).
fn mid_plane_slices(model: &VolumeModel) -> (Vec<f32>, Vec<f32>) {
    let grid = &model.grid;
    let axis = model.geometry.main_axis;

    let (dim_a, dim_b, mid) = match axis {
        0 => (grid.height, grid.depth, grid.width / 2),
        1 => (grid.width, grid.depth, grid.height / 2),
        _ => (grid.width, grid.height, grid.depth / 2),
    };

    let mut tomo = Vec::with_capacity(dim_a * dim_b);
    let mut cross = Vec::with_capacity(dim_a * dim_b);

    for b in 0..dim_b {
        for a in 0..dim_a {
            let (x, y, z) = match axis {
                0 => (mid, a, b),
                1 => (a, mid, b),
                _ => (a, b, mid),
            };
            let i = grid.index(x, y, z);
            let (vx, vy, vz) = (model.vx[i], model.vy[i], model.vz[i]);
            let magnitude = (vx * vx + vy * vy + vz * vz).sqrt();
            let main_component = match axis {
                0 => vx,
                1 => vy,
                _ => vz,
            };
            tomo.push(magnitude as f32);
            cross.push(main_component as f32);
        }
    }

    (tomo, cross)
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
                width: 8,
                height: 8,
                depth: 8,
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
    fn new_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let err = FrameCacheWriter::new(dir.path(), 0).unwrap_err();
        assert!(matches!(err, FrameCacheError::InvalidInterval(0)));
    }

    #[test]
    fn should_write_respects_interval() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FrameCacheWriter::new(dir.path(), 5).unwrap();
        assert!(writer.should_write(0));
        assert!(writer.should_write(5));
        assert!(!writer.should_write(3));
    }

    #[test]
    fn write_frame_produces_expected_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameCacheWriter::new(dir.path(), 1).unwrap();
        writer.push_series(0.1, 0.2);
        let m = model();
        writer.write_frame(&m, 3, 0.1, 0.2, 10.0, 5.0).unwrap();

        for suffix in ["vx", "vy", "vz", "tomo", "cross"] {
            assert!(dir.path().join(format!("frame_3.{suffix}.bin")).exists());
        }
        let meta_path = dir.path().join("frame_3.meta.json");
        let meta_bytes = std::fs::read(meta_path).unwrap();
        let meta: serde_json::Value = serde_json::from_slice(&meta_bytes).unwrap();
        assert_eq!(meta["step"], 3);
        assert_eq!(meta["pSeries"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn series_ring_buffer_caps_at_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameCacheWriter::new(dir.path(), 1).unwrap();
        for i in 0..(SERIES_CAPACITY + 10) {
            writer.push_series(i as f64, i as f64);
        }
        assert_eq!(writer.p_series.len(), SERIES_CAPACITY);
        assert_eq!(*writer.p_series.front().unwrap(), 10.0);
    }
}
