//! Incrementally maintained aggregates over a sample window.
//!
//! Three families share the [`Statistic`] trait:
//! - [`Iterative`]: a scalar nudged by an O(1) change function (mean).
//! - [`TopK`]: a bounded sorted list of extremes (min / max).
//! - [`DirectIndex`]: recomputed from the window on every query (median).

pub mod direct;
pub mod extrema;
pub mod iterative;
pub mod set;

pub use direct::DirectIndex;
pub use extrema::TopK;
pub use iterative::Iterative;
pub use set::StatisticSet;

use heli_core::{Sample, SampleWindow, StatKind};

/// Number of extremes a [`TopK`] keeps unless configured otherwise.
pub const DEFAULT_EXTREMA: usize = 10;

/// An aggregate over the window a [`StatisticSet`] entry observes.
///
/// `update` is called after the window already reflects the change: a pure
/// add passes `(None, Some(new))`, a pure removal `(Some(old), None)`, an
/// in-place replacement `(Some(old), Some(new))`.
pub trait Statistic: Send + std::fmt::Debug {
    fn update(&mut self, old: Option<Sample>, new: Option<Sample>, window: &dyn SampleWindow);

    /// Current value; `None` when the window holds no defined samples.
    fn value(&self, window: &dyn SampleWindow) -> Option<f64>;

    /// Discard incremental state and recompute it from `window`.
    fn rebuild(&mut self, window: &dyn SampleWindow);
}

/// Construct one of the built-in statistics.
pub fn build(kind: StatKind, extrema: usize) -> Box<dyn Statistic> {
    match kind {
        StatKind::Mean => Box::new(Iterative::mean()),
        StatKind::Min => Box::new(TopK::minimum(extrema)),
        StatKind::Max => Box::new(TopK::maximum(extrema)),
        StatKind::Median => Box::new(DirectIndex::median()),
    }
}
