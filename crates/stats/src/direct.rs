use heli_core::{Sample, SampleWindow};

use crate::Statistic;

/// Computes a value straight from the window.
pub type SelectFn = fn(&dyn SampleWindow) -> Option<f64>;

/// A statistic with no incremental state; evaluated lazily on every query.
#[derive(Debug, Clone)]
pub struct DirectIndex {
    select: SelectFn,
}

impl DirectIndex {
    pub fn new(select: SelectFn) -> Self {
        Self { select }
    }

    pub fn median() -> Self {
        Self::new(median)
    }

    /// Most recent defined sample.
    pub fn latest() -> Self {
        Self::new(|window| {
            (0..window.len())
                .rev()
                .find_map(|i| window.sample_at(i))
                .map(f64::from)
        })
    }
}

impl Statistic for DirectIndex {
    fn update(&mut self, _old: Option<Sample>, _new: Option<Sample>, _window: &dyn SampleWindow) {}

    fn value(&self, window: &dyn SampleWindow) -> Option<f64> {
        (self.select)(window)
    }

    fn rebuild(&mut self, _window: &dyn SampleWindow) {}
}

fn median(window: &dyn SampleWindow) -> Option<f64> {
    let mut values = window.defined_values();
    if values.is_empty() {
        return None;
    }
    let mid = values.len() / 2;
    let odd = values.len() % 2 == 1;
    let (lower, upper, _) = values.select_nth_unstable(mid);
    let upper = f64::from(*upper);
    if odd {
        return Some(upper);
    }
    // Even length: the other central element is the largest of the lower half.
    let lower = lower.iter().copied().max().map(f64::from)?;
    Some((lower + upper) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_even_empty() {
        let m = DirectIndex::median();
        assert_eq!(m.value(&vec![9, 1, 5]), Some(5.0));
        assert_eq!(m.value(&vec![4, 1, 3, 2]), Some(2.5));
        assert_eq!(m.value(&Vec::<Sample>::new()), None);
    }

    #[test]
    fn median_ignores_gaps() {
        let m = DirectIndex::median();
        let window: Vec<Option<Sample>> = vec![Some(10), None, Some(-2), None];
        assert_eq!(m.value(&window), Some(4.0));
    }

    #[test]
    fn latest_skips_trailing_gap() {
        let latest = DirectIndex::latest();
        let window: Vec<Option<Sample>> = vec![Some(3), Some(7), None];
        assert_eq!(latest.value(&window), Some(7.0));
    }
}
