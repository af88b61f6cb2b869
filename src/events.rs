//! Progress/completion event stream (spec.md §6 "Events", §9 "Cyclic
//! ownership").
//!
//! The solver never holds a reference back to its consumer: events are
//! one-way value snapshots, delivered through whatever channel the driver's
//! caller supplies (see [`crate::driver::Driver::run`]).

/// Emitted every 1-10 steps depending on backend/transducer configuration
/// (spec.md §4.5, "Progress events").
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// `min(99, 100 * stepCount / S_exp)`.
    pub percent: u32,
    pub step: u64,
    pub status: String,
    /// Down-sampled, normalized (`max|.| <= 1e3`) snapshot of one scalar
    /// field, for visualization only.
    pub p_field: Option<Vec<f32>>,
    pub s_field: Option<Vec<f32>>,
}

/// Carries the measured (or imputed) wave velocities and arrival steps
/// (spec.md §4.5, "Completion event").
#[derive(Debug, Clone, Copy)]
pub struct CompletionEvent {
    pub vp: f64,
    pub vs: f64,
    pub vp_vs_ratio: f64,
    pub p_step: u64,
    pub s_step: u64,
    pub total_steps: u64,
    /// True if the run ended in the `Degraded` state (spec.md §7, "Runtime
    /// instability").
    pub degraded: bool,
}

/// Emitted in place of a completion event when the driver is cancelled
/// (spec.md §4.5, "Cancellation").
#[derive(Debug, Clone, Copy)]
pub struct CancelledEvent {
    pub step: u64,
}
