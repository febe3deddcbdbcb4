use heli_core::{
    HeliError, HoleWindow, PatchPolicy, PromotedRange, Result, Sample, Segment,
    StatKind, StatScope, StatisticsSnapshot,
};
use heli_stats::{build, Statistic, StatisticSet};
use tracing::{debug, info, warn};

use crate::holes::Hole;
use crate::ring::{Ring, FILLER};
use crate::settings::BufferSettings;

/// Tolerance for millisecond-rounded timestamps when mapping a time onto the
/// sample grid.
const GRID_TOLERANCE_MILLIS: f64 = 0.5;

/// What one ingestion call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ingest {
    /// Samples taken from the caller.
    pub appended: usize,
    /// Samples rotated off the front to make room.
    pub evicted: usize,
    /// Positions recorded as a new hole ahead of the data.
    pub gap: usize,
}

/// Result of a successful [`GraphQueueBuffer::patch_hole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Nothing was provided; nothing changed.
    Empty,
    /// The first hole was filled exactly.
    Applied,
    /// The first hole was covered end to end, but the provided length did not
    /// match its span. Applied anyway under [`PatchPolicy::Warn`].
    Discontinuous { provided: usize, expected: usize },
}

/// Constant-memory sliding window over one sample stream.
///
/// Logical indices `[0, graph_len)` are promoted (displayed),
/// `[partition, partition + queue_len)` are queued, the rest is free.
/// Gaps in the stream are tracked by the hole ledger, never by value.
#[derive(Debug)]
pub struct GraphQueueBuffer {
    ring: Ring,
    stats: StatisticSet,
    extrema: usize,
    patch_policy: PatchPolicy,
    sample_rate: f64,
    interval_millis: f64,
    /// Epoch milliseconds of absolute sample 0.
    base_millis: i64,
}

impl GraphQueueBuffer {
    /// Create a buffer whose time origin is the seed's start, then ingest the
    /// seed into the queue.
    pub fn new(settings: BufferSettings, sample_rate: f64, seed: Segment) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(HeliError::Config(format!(
                "sample rate {sample_rate} Hz is not positive"
            )));
        }
        let capacity = settings.capacity.resolve(sample_rate)?;
        let ring = Ring::new(capacity);

        let mut stats = StatisticSet::new();
        for spec in &settings.statistics {
            stats.attach(
                spec.name.clone(),
                spec.scope,
                build(spec.kind, settings.extrema),
                &ring.window(spec.scope),
            );
        }

        let mut buffer = Self {
            ring,
            stats,
            extrema: settings.extrema,
            patch_policy: settings.patch_policy,
            sample_rate,
            interval_millis: 1000.0 / sample_rate,
            base_millis: seed.start_millis,
        };
        info!(
            capacity,
            sample_rate,
            statistics = buffer.stats.len(),
            "graph/queue buffer created"
        );
        buffer.add_segment(&seed)?;
        Ok(buffer)
    }

    // ── Ingestion ─────────────────────────────────────────────────────────────

    /// Place `segment` by its start time. A segment starting past the end of
    /// stored data leaves a hole; one starting before it is refused.
    pub fn add_segment(&mut self, segment: &Segment) -> Result<Ingest> {
        if segment.is_empty() {
            return Ok(Ingest::default());
        }
        let end = self.ring.absolute(self.ring.stored_len()) as i64;
        let offset = self.grid_position(segment.start_millis).saturating_sub(end);
        if offset < 0 {
            warn!(
                offset,
                start_millis = segment.start_millis,
                "segment overlaps stored data; route it through hole patching"
            );
            return Err(HeliError::OutOfOrder { offset });
        }
        self.add_data(&segment.samples, offset as usize)
    }

    /// Append `samples` after `offset` missing positions. The missing
    /// positions are recorded as a hole.
    pub fn add_data(&mut self, samples: &[Sample], offset: usize) -> Result<Ingest> {
        if samples.is_empty() {
            return Ok(Ingest::default());
        }
        if offset > 0 {
            let start = self.ring.absolute(self.ring.stored_len());
            let hole = Hole::new(start, start.saturating_add(offset as u64 - 1));
            self.ring.holes.push(hole)?;
            debug!(start = hole.start, len = offset, "hole recorded");
        }

        let total = offset.saturating_add(samples.len());
        let padded = |k: usize| (k >= offset).then(|| samples[k - offset]);
        let capacity = self.ring.capacity();

        if total >= capacity {
            let evicted = self.ring.stored_len() + (total - capacity);
            let origin = self.ring.evicted + evicted as u64;
            let skip = total - capacity;
            self.ring.refill(
                origin,
                (skip..total).map(|k| padded(k).unwrap_or(FILLER)),
            );
            self.stats.rebuild(StatScope::Graph, &self.ring.window(StatScope::Graph));
            self.stats.rebuild(StatScope::Buffer, &self.ring.window(StatScope::Buffer));
            debug!(evicted, "segment spans the whole buffer; contents replaced");
            return Ok(Ingest {
                appended: samples.len(),
                evicted,
                gap: offset,
            });
        }

        let mut evicted = 0;
        for k in 0..total {
            let item = padded(k);
            if self.ring.stored_len() < capacity {
                self.append(item);
            } else {
                self.evict_and_write(item);
                evicted += 1;
            }
        }
        Ok(Ingest {
            appended: samples.len(),
            evicted,
            gap: offset,
        })
    }

    /// Write into the first free slot.
    fn append(&mut self, item: Option<Sample>) {
        let index = self.ring.stored_len();
        self.ring.set(index, item.unwrap_or(FILLER));
        self.ring.queue_len += 1;
        self.stats.notify(
            StatScope::Buffer,
            None,
            item,
            &self.ring.window(StatScope::Buffer),
        );
    }

    /// Evict logical index 0 and write `item` into the freed last slot. One
    /// unit of graph capacity turns into queue capacity while a graph exists.
    fn evict_and_write(&mut self, item: Option<Sample>) {
        let old = self.ring.sample(0);
        let was_graph = self.ring.graph_len > 0;
        if self.ring.partition > 0 {
            self.ring.partition -= 1;
            self.ring.graph_len = self.ring.graph_len.saturating_sub(1);
            self.ring.queue_len += 1;
        }
        self.ring.rotate();
        let last = self.ring.capacity() - 1;
        self.ring.set(last, item.unwrap_or(FILLER));

        if was_graph {
            self.stats.notify(
                StatScope::Graph,
                old,
                None,
                &self.ring.window(StatScope::Graph),
            );
        }
        self.stats.notify(
            StatScope::Buffer,
            old,
            item,
            &self.ring.window(StatScope::Buffer),
        );
    }

    // ── Promotion ─────────────────────────────────────────────────────────────

    /// Move up to `n` queued samples (all of them for `None`) into the graph,
    /// stopping short of the first unresolved hole.
    pub fn promote(&mut self, n: Option<usize>) -> Option<PromotedRange> {
        let start = self.ring.partition;
        let mut n = n.unwrap_or(self.ring.queue_len).min(self.ring.queue_len);
        if let Some(hole) = self.ring.holes.next_from(self.ring.absolute(start)) {
            let hole_start = self.ring.logical(hole.start);
            if hole_start < start + n {
                n = hole_start.saturating_sub(start);
            }
        }
        if n == 0 {
            return None;
        }

        self.ring.partition += n;
        self.ring.queue_len -= n;

        let old_graph = self.ring.graph_len;
        let new_graph = self
            .ring
            .last_defined_before(self.ring.partition, old_graph)
            .map_or(old_graph, |i| i + 1);
        for i in old_graph..new_graph {
            self.ring.graph_len = i + 1;
            let value = self.ring.sample(i);
            self.stats.notify(
                StatScope::Graph,
                None,
                value,
                &self.ring.window(StatScope::Graph),
            );
        }

        Some(PromotedRange {
            start_index: start,
            start_millis: self.time_of(start),
            samples: self.ring.slice(start, start + n),
        })
    }

    // ── Holes ─────────────────────────────────────────────────────────────────

    /// The earliest unresolved gap, in absolute time.
    pub fn first_hole(&self) -> Option<HoleWindow> {
        self.ring.holes.first().map(|h| self.hole_window(h))
    }

    /// Every unresolved gap, oldest first.
    pub fn holes(&self) -> Vec<HoleWindow> {
        self.ring.holes.iter().map(|h| self.hole_window(h)).collect()
    }

    fn hole_window(&self, hole: &Hole) -> HoleWindow {
        let start_index = self.ring.logical(hole.start);
        let len = hole.len() as usize;
        HoleWindow {
            start_millis: self.time_of(start_index),
            end_millis: self.time_of(start_index + len - 1),
            start_index,
            len,
        }
    }

    /// Fill the first hole with `segments[i]` written at `start_indices[i]`.
    ///
    /// The union must reach from at or before the hole's first index to at or
    /// past its last one. Only the first hole can be patched.
    pub fn patch_hole<S: AsRef<[Sample]>>(
        &mut self,
        segments: &[S],
        start_indices: &[usize],
    ) -> Result<PatchOutcome> {
        if segments.len() != start_indices.len() {
            return Err(HeliError::InvalidHolePatch(format!(
                "{} segments but {} start indices",
                segments.len(),
                start_indices.len()
            )));
        }
        let pieces: Vec<(usize, &[Sample])> = start_indices
            .iter()
            .copied()
            .zip(segments.iter().map(<S as AsRef<[Sample]>>::as_ref))
            .filter(|(_, samples)| !samples.is_empty())
            .collect();
        if pieces.is_empty() {
            return Ok(PatchOutcome::Empty);
        }
        let Some(hole) = self.ring.holes.first().copied() else {
            return Err(HeliError::NoHole);
        };

        let hole_start = self.ring.logical(hole.start);
        let hole_end = self.ring.logical(hole.end);
        let earliest = pieces.iter().map(|(s, _)| *s).min().unwrap_or(usize::MAX);
        let Some(furthest) = pieces
            .iter()
            .map(|(s, v)| s.checked_add(v.len()))
            .try_fold(0, |acc, end| end.map(|end| acc.max(end)))
        else {
            return Err(HeliError::InvalidHolePatch(
                "patch start index overflows the index space".into(),
            ));
        };
        if earliest > hole_start || furthest <= hole_end {
            warn!(earliest, furthest, hole_start, hole_end, "patch does not cover the first hole");
            return Err(HeliError::InvalidHolePatch(format!(
                "patch covers [{earliest}, {furthest}) but the first hole is [{hole_start}, {hole_end}]"
            )));
        }
        if furthest > self.ring.stored_len() {
            return Err(HeliError::InvalidHolePatch(format!(
                "patch reaches index {furthest}, past the {} stored samples",
                self.ring.stored_len()
            )));
        }

        let provided: usize = pieces.iter().map(|(_, v)| v.len()).sum();
        let expected = hole.len() as usize;
        let outcome = if provided == expected {
            PatchOutcome::Applied
        } else {
            match self.patch_policy {
                PatchPolicy::Strict => {
                    warn!(provided, expected, "discontinuous patch refused");
                    return Err(HeliError::DiscontinuousPatch { provided, expected });
                }
                PatchPolicy::Warn => {
                    warn!(provided, expected, "discontinuous patch applied");
                    PatchOutcome::Discontinuous { provided, expected }
                }
            }
        };

        self.ring.holes.pop_first();
        let mut touched_graph = false;
        for (start, samples) in pieces {
            touched_graph |= start < self.ring.graph_len;
            for (k, &value) in samples.iter().enumerate() {
                self.ring.set(start + k, value);
            }
        }
        // Patched positions become defined all at once, so incremental
        // bookkeeping cannot follow them one by one.
        self.stats.rebuild(StatScope::Buffer, &self.ring.window(StatScope::Buffer));
        if touched_graph {
            self.stats.rebuild(StatScope::Graph, &self.ring.window(StatScope::Graph));
        }
        debug!(
            start = hole_start,
            len = expected,
            remaining = self.ring.holes.len(),
            "hole patched"
        );
        Ok(outcome)
    }

    /// Time-addressed form of [`patch_hole`](Self::patch_hole). Samples that
    /// fall before the current origin are dropped first.
    pub fn patch_hole_segments(&mut self, segments: &[Segment]) -> Result<PatchOutcome> {
        let origin = self.ring.evicted as i64;
        let mut slices = Vec::with_capacity(segments.len());
        let mut indices = Vec::with_capacity(segments.len());
        for segment in segments {
            let index = self.grid_position(segment.start_millis).saturating_sub(origin);
            let skip = if index < 0 {
                usize::try_from(index.unsigned_abs()).unwrap_or(usize::MAX)
            } else {
                0
            };
            if skip >= segment.len() {
                continue;
            }
            slices.push(&segment.samples[skip..]);
            indices.push(index.max(0) as usize);
        }
        if slices.is_empty() && segments.iter().any(|s| !s.is_empty()) {
            return Err(HeliError::InvalidHolePatch(
                "every patch segment ends before the buffer origin".into(),
            ));
        }
        self.patch_hole(&slices, &indices)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Promoted window, oldest first.
    pub fn graph(&self) -> Vec<Sample> {
        self.ring.slice(0, self.ring.graph_len)
    }

    /// Unpromoted backlog; `None` marks positions inside a hole.
    pub fn queue(&self) -> Vec<Option<Sample>> {
        let start = self.ring.partition;
        (start..start + self.ring.queue_len)
            .map(|i| self.ring.sample(i))
            .collect()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot(
            &self.ring.window(StatScope::Graph),
            &self.ring.window(StatScope::Buffer),
        )
    }

    /// Attach another statistic; it is brought up to date immediately.
    pub fn attach_statistic(&mut self, name: impl Into<String>, kind: StatKind, scope: StatScope) {
        self.attach_custom(name, scope, build(kind, self.extrema));
    }

    pub fn attach_custom(&mut self, name: impl Into<String>, scope: StatScope, stat: Box<dyn Statistic>) {
        let window = self.ring.window(scope);
        self.stats.attach(name, scope, stat, &window);
    }

    pub fn detach_statistic(&mut self, name: &str) -> bool {
        self.stats.detach(name)
    }

    pub fn is_empty(&self) -> bool {
        self.ring.stored_len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn graph_len(&self) -> usize {
        self.ring.graph_len
    }

    pub fn partition_index(&self) -> usize {
        self.ring.partition
    }

    pub fn queue_len(&self) -> usize {
        self.ring.queue_len
    }

    /// Graph plus queue, including positions still inside holes.
    pub fn stored_len(&self) -> usize {
        self.ring.stored_len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn interval_millis(&self) -> f64 {
        self.interval_millis
    }

    /// Epoch milliseconds of logical index 0.
    pub fn origin_millis(&self) -> i64 {
        self.time_of(0)
    }

    /// Samples rotated off since creation.
    pub fn evicted_total(&self) -> u64 {
        self.ring.evicted
    }

    // ── Time mapping ──────────────────────────────────────────────────────────

    /// Epoch milliseconds of logical `index`.
    pub fn time_of(&self, index: usize) -> i64 {
        let position = self.ring.absolute(index) as f64;
        self.base_millis
            .saturating_add((position * self.interval_millis).round() as i64)
    }

    /// Absolute grid position of `millis`, floored. Saturates at the `i64`
    /// bounds for timestamps far outside the stream.
    fn grid_position(&self, millis: i64) -> i64 {
        let delta = (i128::from(millis) - i128::from(self.base_millis)) as f64;
        ((delta + GRID_TOLERANCE_MILLIS) / self.interval_millis).floor() as i64
    }
}
