//! Ordered ledger of gaps in the logical sample stream.
//!
//! Positions are absolute sample numbers counted from buffer creation, so
//! eviction never renumbers a hole; it only trims the head of the ledger.

use std::collections::VecDeque;

use heli_core::{HeliError, Result};

/// Inclusive range of absolute sample numbers not yet received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    pub start: u64,
    pub end: u64,
}

impl Hole {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }
}

/// Holes sorted by position, strictly increasing and non-overlapping.
#[derive(Debug, Clone, Default)]
pub struct HoleLedger {
    holes: VecDeque<Hole>,
}

impl HoleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hole; it must lie strictly after the last one.
    pub fn push(&mut self, hole: Hole) -> Result<()> {
        if hole.start > hole.end {
            return Err(HeliError::InvalidHolePatch(format!(
                "hole [{}, {}] is inverted",
                hole.start, hole.end
            )));
        }
        if let Some(last) = self.holes.back() {
            if hole.start <= last.end {
                return Err(HeliError::InvalidHolePatch(format!(
                    "hole [{}, {}] does not follow [{}, {}]",
                    hole.start, hole.end, last.start, last.end
                )));
            }
        }
        self.holes.push_back(hole);
        Ok(())
    }

    pub fn first(&self) -> Option<&Hole> {
        self.holes.front()
    }

    pub fn pop_first(&mut self) -> Option<Hole> {
        self.holes.pop_front()
    }

    pub fn len(&self) -> usize {
        self.holes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hole> {
        self.holes.iter()
    }

    /// Hole containing `position`, if any.
    pub fn covering(&self, position: u64) -> Option<&Hole> {
        let at = self.holes.partition_point(|h| h.end < position);
        self.holes.get(at).filter(|h| h.start <= position)
    }

    pub fn covers(&self, position: u64) -> bool {
        self.covering(position).is_some()
    }

    /// First hole that has not ended before `position`.
    pub fn next_from(&self, position: u64) -> Option<&Hole> {
        let at = self.holes.partition_point(|h| h.end < position);
        self.holes.get(at)
    }

    /// Number of missing positions in `[start, end)`.
    pub fn covered_in(&self, start: u64, end: u64) -> u64 {
        if start >= end {
            return 0;
        }
        let first = self.holes.partition_point(|h| h.end < start);
        self.holes
            .iter()
            .skip(first)
            .take_while(|h| h.start < end)
            .map(|h| (h.end + 1).min(end) - h.start.max(start))
            .sum()
    }

    /// Drop what lies before `origin`: whole holes are removed, a hole
    /// straddling it is clipped. Returns how many holes were removed.
    pub fn trim_before(&mut self, origin: u64) -> usize {
        let mut dropped = 0;
        while let Some(front) = self.holes.front_mut() {
            if front.end < origin {
                self.holes.pop_front();
                dropped += 1;
                continue;
            }
            if front.start < origin {
                front.start = origin;
            }
            break;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(holes: &[(u64, u64)]) -> HoleLedger {
        let mut ledger = HoleLedger::new();
        for &(s, e) in holes {
            ledger.push(Hole::new(s, e)).unwrap();
        }
        ledger
    }

    #[test]
    fn push_requires_strict_order() {
        let mut l = ledger(&[(3, 4)]);
        assert!(l.push(Hole::new(4, 6)).is_err());
        assert!(l.push(Hole::new(2, 2)).is_err());
        assert!(l.push(Hole::new(7, 5)).is_err());
        assert!(l.push(Hole::new(5, 5)).is_ok());
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn covering_and_counts() {
        let l = ledger(&[(3, 4), (8, 10)]);
        assert!(!l.covers(2));
        assert!(l.covers(3) && l.covers(4));
        assert!(!l.covers(5));
        assert_eq!(l.covering(9), Some(&Hole::new(8, 10)));
        assert_eq!(l.covered_in(0, 20), 5);
        assert_eq!(l.covered_in(4, 9), 2);
        assert_eq!(l.covered_in(5, 8), 0);
        assert_eq!(l.next_from(5), Some(&Hole::new(8, 10)));
        assert_eq!(l.next_from(11), None);
    }

    #[test]
    fn trim_drops_and_clips() {
        let mut l = ledger(&[(3, 4), (8, 10)]);
        assert_eq!(l.trim_before(9), 1);
        assert_eq!(l.first(), Some(&Hole::new(9, 10)));
        assert_eq!(l.trim_before(11), 1);
        assert!(l.is_empty());
    }
}
