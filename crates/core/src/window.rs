use crate::state::Sample;

/// Read-only accessor over the ordered samples a statistic observes.
///
/// Positions run `0..len()`, oldest first. A position inside an unresolved
/// gap reports `None`; validity is never inferred from the stored value.
pub trait SampleWindow {
    /// Number of positions in the window, defined or not.
    fn len(&self) -> usize;

    /// Value at `index`, or `None` if it is out of range or not yet received.
    fn sample_at(&self, index: usize) -> Option<Sample>;

    /// Number of positions holding a defined value.
    fn defined_len(&self) -> usize {
        (0..self.len()).filter(|&i| self.sample_at(i).is_some()).count()
    }

    fn is_empty(&self) -> bool {
        self.defined_len() == 0
    }

    /// Defined values in order.
    fn defined_values(&self) -> Vec<Sample> {
        (0..self.len()).filter_map(|i| self.sample_at(i)).collect()
    }
}

/// A window over the first `end` positions of another window.
///
/// Used to replay a window's history one sample at a time.
pub struct Prefix<'a> {
    inner: &'a dyn SampleWindow,
    end: usize,
    defined: usize,
}

impl<'a> Prefix<'a> {
    /// `defined` must equal the number of defined positions in `0..end`.
    pub fn new(inner: &'a dyn SampleWindow, end: usize, defined: usize) -> Self {
        Self {
            inner,
            end: end.min(inner.len()),
            defined,
        }
    }
}

impl SampleWindow for Prefix<'_> {
    fn len(&self) -> usize {
        self.end
    }

    fn sample_at(&self, index: usize) -> Option<Sample> {
        if index < self.end {
            self.inner.sample_at(index)
        } else {
            None
        }
    }

    fn defined_len(&self) -> usize {
        self.defined
    }
}

impl SampleWindow for Vec<Sample> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn sample_at(&self, index: usize) -> Option<Sample> {
        self.get(index).copied()
    }

    fn defined_len(&self) -> usize {
        Vec::len(self)
    }
}

impl SampleWindow for Vec<Option<Sample>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn sample_at(&self, index: usize) -> Option<Sample> {
        self.get(index).copied().flatten()
    }
}
