//! Transducer geometry derivation (spec.md §3, "Transducer geometry").

use super::{Axis, GridConfig};

/// Transmitter/receiver placement and the dominant propagation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransducerGeometry {
    pub tx: usize,
    pub ty: usize,
    pub tz: usize,
    pub rx: usize,
    pub ry: usize,
    pub rz: usize,
    /// 0 = X, 1 = Y, 2 = Z — the axis of largest `|r - t|`.
    pub main_axis: usize,
}

impl TransducerGeometry {
    /// Place transmitter/receiver one voxel inside the boundary on opposite
    /// faces along `axis`, centered on the other two axes, clamped into
    /// `[1, dim-2]` on every axis.
    pub fn derive(grid: &GridConfig, axis: Axis) -> Self {
        let clamp = |v: i64, dim: usize| -> usize {
            let max = dim as i64 - 2;
            v.max(1).min(max.max(1)) as usize
        };

        let cx = clamp(grid.width as i64 / 2, grid.width);
        let cy = clamp(grid.height as i64 / 2, grid.height);
        let cz = clamp(grid.depth as i64 / 2, grid.depth);

        let (mut tx, mut ty, mut tz) = (cx, cy, cz);
        let (mut rx, mut ry, mut rz) = (cx, cy, cz);

        match axis {
            Axis::X => {
                tx = clamp(1, grid.width);
                rx = clamp(grid.width as i64 - 2, grid.width);
            }
            Axis::Y => {
                ty = clamp(1, grid.height);
                ry = clamp(grid.height as i64 - 2, grid.height);
            }
            Axis::Z => {
                tz = clamp(1, grid.depth);
                rz = clamp(grid.depth as i64 - 2, grid.depth);
            }
        }

        let d = [
            (rx as i64 - tx as i64).unsigned_abs(),
            (ry as i64 - ty as i64).unsigned_abs(),
            (rz as i64 - tz as i64).unsigned_abs(),
        ];
        let main_axis = (0..3).max_by_key(|&i| d[i]).unwrap_or(0);

        Self {
            tx,
            ty,
            tz,
            rx,
            ry,
            rz,
            main_axis,
        }
    }

    /// Straight-line distance between transmitter and receiver, in voxels.
    pub fn voxel_distance(&self) -> f32 {
        let dx = self.rx as f32 - self.tx as f32;
        let dy = self.ry as f32 - self.ty as f32;
        let dz = self.rz as f32 - self.tz as f32;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}
