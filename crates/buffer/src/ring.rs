//! Fixed-capacity circular storage partitioned into graph | queue | free.

use heli_core::{Sample, SampleWindow, StatScope};

use crate::holes::HoleLedger;

/// Value written into slots that belong to a hole. Never read back as data.
pub(crate) const FILLER: Sample = 0;

#[derive(Debug)]
pub(crate) struct Ring {
    storage: Vec<Sample>,
    /// Physical slot of logical index 0.
    physical_start: usize,
    /// Absolute sample number of logical index 0 (samples evicted so far).
    pub(crate) evicted: u64,
    pub(crate) graph_len: usize,
    pub(crate) partition: usize,
    pub(crate) queue_len: usize,
    pub(crate) holes: HoleLedger,
}

impl Ring {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            storage: vec![FILLER; capacity],
            physical_start: 0,
            evicted: 0,
            graph_len: 0,
            partition: 0,
            queue_len: 0,
            holes: HoleLedger::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub(crate) fn stored_len(&self) -> usize {
        self.partition + self.queue_len
    }

    pub(crate) fn absolute(&self, index: usize) -> u64 {
        self.evicted + index as u64
    }

    /// Logical index of an absolute position at or after the origin.
    pub(crate) fn logical(&self, position: u64) -> usize {
        position.saturating_sub(self.evicted) as usize
    }

    fn physical(&self, index: usize) -> usize {
        (self.physical_start + index) % self.storage.len()
    }

    pub(crate) fn raw(&self, index: usize) -> Sample {
        self.storage[self.physical(index)]
    }

    pub(crate) fn set(&mut self, index: usize, value: Sample) {
        let at = self.physical(index);
        self.storage[at] = value;
    }

    pub(crate) fn is_defined(&self, index: usize) -> bool {
        !self.holes.covers(self.absolute(index))
    }

    /// Stored value at `index`, `None` if beyond the stored data or in a hole.
    pub(crate) fn sample(&self, index: usize) -> Option<Sample> {
        (index < self.stored_len() && self.is_defined(index)).then(|| self.raw(index))
    }

    /// Raw copy of `[start, end)` in logical order.
    pub(crate) fn slice(&self, start: usize, end: usize) -> Vec<Sample> {
        if start >= end {
            return Vec::new();
        }
        let cap = self.storage.len();
        let first = self.physical(start);
        let len = end - start;
        let mut out = Vec::with_capacity(len);
        if first + len <= cap {
            out.extend_from_slice(&self.storage[first..first + len]);
        } else {
            out.extend_from_slice(&self.storage[first..]);
            out.extend_from_slice(&self.storage[..len - (cap - first)]);
        }
        out
    }

    /// Rotate by one: logical index 0 falls off, the origin advances.
    pub(crate) fn rotate(&mut self) {
        self.physical_start = (self.physical_start + 1) % self.storage.len();
        self.evicted += 1;
        self.holes.trim_before(self.evicted);
    }

    /// Replace the entire contents, with logical index 0 at absolute `origin`.
    pub(crate) fn refill(&mut self, origin: u64, values: impl Iterator<Item = Sample>) {
        self.physical_start = 0;
        self.evicted = origin;
        for (slot, value) in self.storage.iter_mut().zip(values) {
            *slot = value;
        }
        self.graph_len = 0;
        self.partition = 0;
        self.queue_len = self.storage.len();
        self.holes.trim_before(origin);
    }

    /// Last defined index in `[floor, end)`, walking back over holes.
    pub(crate) fn last_defined_before(&self, end: usize, floor: usize) -> Option<usize> {
        let mut i = end;
        while i > floor {
            let index = i - 1;
            match self.holes.covering(self.absolute(index)) {
                Some(hole) => i = self.logical(hole.start),
                None => return Some(index),
            }
        }
        None
    }

    pub(crate) fn window(&self, scope: StatScope) -> Region<'_> {
        let len = match scope {
            StatScope::Graph => self.graph_len,
            StatScope::Buffer => self.stored_len(),
        };
        Region { ring: self, len }
    }
}

/// The graph region or the whole stored buffer, seen through the hole ledger.
pub(crate) struct Region<'a> {
    ring: &'a Ring,
    len: usize,
}

impl SampleWindow for Region<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn sample_at(&self, index: usize) -> Option<Sample> {
        (index < self.len && self.ring.is_defined(index)).then(|| self.ring.raw(index))
    }

    fn defined_len(&self) -> usize {
        let start = self.ring.evicted;
        let missing = self.ring.holes.covered_in(start, start + self.len as u64);
        self.len - missing as usize
    }
}
