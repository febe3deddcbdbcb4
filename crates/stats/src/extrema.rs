use std::cmp::Ordering;

use heli_core::{Sample, SampleWindow};
use tracing::debug;

use crate::Statistic;

/// Three-way comparator: `Greater` means the first argument is the more
/// extreme of the two.
pub type Compare = fn(Sample, Sample) -> Ordering;

/// Bounded, sorted list of the `K` most extreme samples in the window.
///
/// The tracked list is always a prefix of what a full rescan would produce,
/// so its head is always the true extreme. It may shrink below `K` when a
/// tracked extreme leaves and nothing visible can prove its replacement; a
/// full rescan runs only once it empties while the window does not.
#[derive(Debug, Clone)]
pub struct TopK {
    compare: Compare,
    capacity: usize,
    tracked: Vec<Sample>,
    rescans: u64,
}

impl TopK {
    pub fn new(compare: Compare, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            compare,
            capacity,
            tracked: Vec::with_capacity(capacity + 1),
            rescans: 0,
        }
    }

    pub fn minimum(capacity: usize) -> Self {
        Self::new(|a, b| b.cmp(&a), capacity)
    }

    pub fn maximum(capacity: usize) -> Self {
        Self::new(|a, b| a.cmp(&b), capacity)
    }

    /// Tracked extremes, best first.
    pub fn tracked(&self) -> &[Sample] {
        &self.tracked
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many full rescans have run so far.
    pub fn rescans(&self) -> u64 {
        self.rescans
    }

    /// Top-K of `window` computed from scratch.
    pub fn scan(&self, window: &dyn SampleWindow) -> Vec<Sample> {
        let mut out = Vec::with_capacity(self.capacity + 1);
        for i in 0..window.len() {
            let Some(value) = window.sample_at(i) else {
                continue;
            };
            let qualifies = out.len() < self.capacity
                || out
                    .last()
                    .is_some_and(|&worst| (self.compare)(value, worst) == Ordering::Greater);
            if qualifies {
                insert_sorted(&mut out, value, self.compare);
                out.truncate(self.capacity);
            }
        }
        out
    }

    fn rescan(&mut self, window: &dyn SampleWindow) {
        self.tracked = self.scan(window);
        self.rescans += 1;
        debug!(
            tracked = self.tracked.len(),
            window = window.len(),
            "extrema rescan"
        );
    }
}

impl Statistic for TopK {
    fn update(&mut self, old: Option<Sample>, new: Option<Sample>, window: &dyn SampleWindow) {
        if old.is_none() && new.is_none() {
            return;
        }
        let defined = window.defined_len();
        if defined == 0 {
            self.tracked.clear();
            return;
        }
        if self.tracked.is_empty() {
            self.rescan(window);
            return;
        }

        if let Some(old) = old {
            let worst = self.tracked[self.tracked.len() - 1];
            if (self.compare)(old, worst) != Ordering::Less {
                let compare = self.compare;
                match self
                    .tracked
                    .iter()
                    .rposition(|&t| compare(t, old) == Ordering::Equal)
                {
                    Some(at) => {
                        self.tracked.remove(at);
                    }
                    None => {
                        debug!(old, "evicted extreme was not tracked");
                        self.rescan(window);
                        return;
                    }
                }
            }
        }

        if let Some(new) = new {
            // Window size before `new` arrived (and after `old` left).
            let before = defined - 1;
            if let Some(&worst) = self.tracked.last() {
                let complete = self.tracked.len() == before;
                if complete || (self.compare)(new, worst) != Ordering::Less {
                    insert_sorted(&mut self.tracked, new, self.compare);
                    self.tracked.truncate(self.capacity);
                }
            }
        }

        if self.tracked.is_empty() {
            self.rescan(window);
        }
    }

    fn value(&self, window: &dyn SampleWindow) -> Option<f64> {
        if window.is_empty() {
            return None;
        }
        self.tracked.first().map(|&v| f64::from(v))
    }

    fn rebuild(&mut self, window: &dyn SampleWindow) {
        self.rescan(window);
    }
}

/// Insertion by shifting; ties keep insertion order.
fn insert_sorted(sorted: &mut Vec<Sample>, value: Sample, compare: Compare) {
    let at = sorted
        .iter()
        .position(|&t| compare(value, t) == Ordering::Greater)
        .unwrap_or(sorted.len());
    sorted.insert(at, value);
}
