use heli_core::{Prefix, Sample, SampleWindow};

use crate::Statistic;

/// Returns the change to apply to the current value, given the sample that
/// left (if any) and the sample that arrived (if any). The window passed in
/// already reflects the change.
pub type ChangeFn =
    fn(current: f64, old: Option<Sample>, new: Option<Sample>, window: &dyn SampleWindow) -> f64;

/// A scalar aggregate maintained in O(1) per update.
#[derive(Debug, Clone)]
pub struct Iterative {
    change: ChangeFn,
    initial: f64,
    value: f64,
}

impl Iterative {
    pub fn new(change: ChangeFn, initial: f64) -> Self {
        Self {
            change,
            initial,
            value: initial,
        }
    }

    /// Running arithmetic mean.
    pub fn mean() -> Self {
        Self::new(mean_change, 0.0)
    }

    /// Raw running value, even when the window is empty.
    pub fn raw(&self) -> f64 {
        self.value
    }
}

impl Statistic for Iterative {
    fn update(&mut self, old: Option<Sample>, new: Option<Sample>, window: &dyn SampleWindow) {
        if old.is_none() && new.is_none() {
            return;
        }
        self.value += (self.change)(self.value, old, new, window);
    }

    fn value(&self, window: &dyn SampleWindow) -> Option<f64> {
        if window.is_empty() {
            None
        } else {
            Some(self.value)
        }
    }

    /// Replays every defined sample as an add, over a growing prefix.
    fn rebuild(&mut self, window: &dyn SampleWindow) {
        self.value = self.initial;
        let mut defined = 0;
        for i in 0..window.len() {
            let Some(sample) = window.sample_at(i) else {
                continue;
            };
            defined += 1;
            let prefix = Prefix::new(window, i + 1, defined);
            self.value += (self.change)(self.value, None, Some(sample), &prefix);
        }
    }
}

/// `n` is the defined length after the change.
fn mean_change(current: f64, old: Option<Sample>, new: Option<Sample>, window: &dyn SampleWindow) -> f64 {
    let n = window.defined_len();
    if n == 0 {
        return -current;
    }
    let n = n as f64;
    match (old, new) {
        (Some(old), Some(new)) => (f64::from(new) - f64::from(old)) / n,
        (Some(old), None) => (current - f64::from(old)) / n,
        (None, Some(new)) => (f64::from(new) - current) / n,
        (None, None) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::VecDeque;

    fn exact_mean(values: &[Sample]) -> f64 {
        values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64
    }

    #[test]
    fn empty_window_is_undefined() {
        let mean = Iterative::mean();
        assert_eq!(mean.value(&Vec::<Sample>::new()), None);
    }

    #[test]
    fn add_remove_replace() {
        let mut mean = Iterative::mean();
        let mut window: Vec<Sample> = Vec::new();

        for v in [2, 4, 6] {
            window.push(v);
            mean.update(None, Some(v), &window);
        }
        assert!((mean.value(&window).unwrap() - 4.0).abs() < 1e-12);

        window.remove(0);
        mean.update(Some(2), None, &window);
        assert!((mean.value(&window).unwrap() - 5.0).abs() < 1e-12);

        window[0] = 10;
        mean.update(Some(4), Some(10), &window);
        assert!((mean.value(&window).unwrap() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn removing_the_last_sample_resets() {
        let mut mean = Iterative::mean();
        let mut window = vec![7];
        mean.update(None, Some(7), &window);
        window.clear();
        mean.update(Some(7), None, &window);
        assert_eq!(mean.raw(), 0.0);
        assert_eq!(mean.value(&window), None);
    }

    #[test]
    fn rebuild_skips_gaps() {
        let mut mean = Iterative::mean();
        let window: Vec<Option<Sample>> = vec![Some(1), None, Some(3), None, Some(8)];
        mean.rebuild(&window);
        assert!((mean.value(&window).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn sliding_mean_tracks_exact_mean() {
        let mut rng = StdRng::seed_from_u64(0x5e15);
        let mut mean = Iterative::mean();
        let mut window: VecDeque<Sample> = VecDeque::new();

        for _ in 0..5_000 {
            let op = rng.random_range(0..3);
            let v = rng.random_range(-100_000..100_000);
            let (old, new) = match op {
                0 => {
                    window.push_back(v);
                    (None, Some(v))
                }
                1 if !window.is_empty() => (window.pop_front(), None),
                _ if !window.is_empty() => {
                    let old = window.pop_front();
                    window.push_back(v);
                    (old, Some(v))
                }
                _ => continue,
            };
            let view: Vec<Sample> = window.iter().copied().collect();
            mean.update(old, new, &view);

            match mean.value(&view) {
                None => assert!(view.is_empty()),
                Some(got) => {
                    let want = exact_mean(&view);
                    let scale = view.iter().map(|v| f64::from(v.abs())).fold(1.0, f64::max);
                    assert!(
                        (got - want).abs() <= 1e-9 * scale,
                        "mean drifted: {got} vs {want}"
                    );
                }
            }
        }
    }
}
