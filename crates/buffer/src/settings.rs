use heli_core::{HeliError, PatchPolicy, Result, StatKind, StatScope};
use heli_stats::DEFAULT_EXTREMA;

/// Largest buffer a stream may allocate, in samples (1 GiB of storage).
pub const MAX_CAPACITY: usize = 1 << 28;

/// How much history a buffer keeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capacity {
    /// A time window; resolved against the stream's sample rate.
    Minutes(f64),
    /// An exact sample count.
    Samples(usize),
}

impl Capacity {
    /// Sample count for a stream running at `sample_rate` Hz.
    pub fn resolve(self, sample_rate: f64) -> Result<usize> {
        let samples = match self {
            Self::Minutes(minutes) => {
                if !(minutes.is_finite() && minutes > 0.0) {
                    return Err(HeliError::Config(format!(
                        "window of {minutes} minutes is not positive"
                    )));
                }
                (60.0 * minutes * sample_rate).floor() as usize
            }
            Self::Samples(samples) => samples,
        };
        if samples == 0 {
            return Err(HeliError::Config(
                "buffer capacity resolves to zero samples".into(),
            ));
        }
        if samples > MAX_CAPACITY {
            return Err(HeliError::Config(format!(
                "buffer capacity of {samples} samples exceeds the limit of {MAX_CAPACITY}"
            )));
        }
        Ok(samples)
    }
}

/// A named statistic to attach at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticSpec {
    pub name: String,
    pub kind: StatKind,
    pub scope: StatScope,
}

impl StatisticSpec {
    pub fn new(name: impl Into<String>, kind: StatKind, scope: StatScope) -> Self {
        Self {
            name: name.into(),
            kind,
            scope,
        }
    }
}

/// Everything a [`GraphQueueBuffer`](crate::GraphQueueBuffer) needs besides
/// its seed segment.
#[derive(Debug, Clone)]
pub struct BufferSettings {
    pub capacity: Capacity,
    /// K for min / max statistics.
    pub extrema: usize,
    pub statistics: Vec<StatisticSpec>,
    pub patch_policy: PatchPolicy,
}

impl BufferSettings {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            capacity,
            extrema: DEFAULT_EXTREMA,
            statistics: Vec::new(),
            patch_policy: PatchPolicy::default(),
        }
    }

    pub fn with_statistic(mut self, name: impl Into<String>, kind: StatKind, scope: StatScope) -> Self {
        self.statistics.push(StatisticSpec::new(name, kind, scope));
        self
    }

    pub fn with_patch_policy(mut self, policy: PatchPolicy) -> Self {
        self.patch_policy = policy;
        self
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self::new(Capacity::Minutes(60.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_resolve_against_rate() {
        assert_eq!(Capacity::Minutes(60.0).resolve(100.0).unwrap(), 360_000);
        assert_eq!(Capacity::Minutes(0.5).resolve(40.0).unwrap(), 1_200);
        assert_eq!(Capacity::Samples(5).resolve(100.0).unwrap(), 5);
    }

    #[test]
    fn zero_capacity_is_a_config_error() {
        assert!(Capacity::Samples(0).resolve(100.0).is_err());
        assert!(Capacity::Minutes(0.0).resolve(100.0).is_err());
        assert!(Capacity::Minutes(0.001).resolve(1.0).is_err());
    }

    #[test]
    fn oversized_capacity_is_a_config_error() {
        assert!(matches!(
            Capacity::Minutes(1e300).resolve(100.0),
            Err(HeliError::Config(_))
        ));
        assert!(Capacity::Samples(MAX_CAPACITY + 1).resolve(1.0).is_err());
        assert_eq!(Capacity::Samples(MAX_CAPACITY).resolve(1.0).unwrap(), MAX_CAPACITY);
    }
}
