//! One [`GraphQueueBuffer`] per channel, created from the channel's first packet.

use std::collections::{BTreeMap, HashMap};

use heli_buffer::{BufferSettings, GraphQueueBuffer, Ingest, PatchOutcome};
use heli_core::{HeliError, Packet, PromotedRange, Result, Segment, StreamId};
use tracing::{info, warn};

/// Relative tolerance when comparing a packet's rate to the stream's.
const RATE_TOLERANCE: f64 = 1e-9;

#[derive(Debug)]
struct Entry {
    buffer: GraphQueueBuffer,
    packets: u64,
}

#[derive(Debug)]
pub struct Registry {
    settings: BufferSettings,
    declared: HashMap<StreamId, f64>,
    streams: BTreeMap<StreamId, Entry>,
}

impl Registry {
    /// `settings` is the template every new buffer is built from.
    pub fn new(settings: BufferSettings) -> Self {
        Self {
            settings,
            declared: HashMap::new(),
            streams: BTreeMap::new(),
        }
    }

    /// Pin the expected sample rate of `id` before its first packet arrives.
    pub fn declare(&mut self, id: StreamId, sample_rate: f64) {
        self.declared.insert(id, sample_rate);
    }

    /// Replace the template for buffers created from now on.
    pub fn set_settings(&mut self, settings: BufferSettings) {
        self.settings = settings;
    }

    /// Route `packet` to its stream, creating the buffer on first sight.
    pub fn ingest(&mut self, packet: &Packet) -> Result<Ingest> {
        let expected = self
            .streams
            .get(&packet.stream)
            .map(|e| e.buffer.sample_rate())
            .or_else(|| self.declared.get(&packet.stream).copied());
        if let Some(expected) = expected {
            if !same_rate(expected, packet.sample_rate) {
                warn!(
                    stream = %packet.stream,
                    expected,
                    got = packet.sample_rate,
                    "packet sample rate differs from the stream's"
                );
                return Err(HeliError::SampleRateMismatch {
                    expected,
                    got: packet.sample_rate,
                });
            }
        }

        if let Some(entry) = self.streams.get_mut(&packet.stream) {
            let ingest = entry.buffer.add_segment(&packet.segment)?;
            entry.packets += 1;
            return Ok(ingest);
        }

        let buffer = GraphQueueBuffer::new(
            self.settings.clone(),
            packet.sample_rate,
            packet.segment.clone(),
        )?;
        info!(stream = %packet.stream, capacity = buffer.capacity(), "stream registered");
        let ingest = Ingest {
            appended: packet.segment.len(),
            evicted: buffer.evicted_total() as usize,
            gap: 0,
        };
        self.streams.insert(
            packet.stream.clone(),
            Entry {
                buffer,
                packets: 1,
            },
        );
        Ok(ingest)
    }

    /// Time-addressed patch of the first hole of `id`.
    pub fn patch(&mut self, id: &StreamId, segments: &[Segment]) -> Result<PatchOutcome> {
        self.entry_mut(id)?.buffer.patch_hole_segments(segments)
    }

    /// Promote everything promotable on `id`.
    pub fn promote(&mut self, id: &StreamId) -> Result<Option<PromotedRange>> {
        Ok(self.entry_mut(id)?.buffer.promote(None))
    }

    fn entry_mut(&mut self, id: &StreamId) -> Result<&mut Entry> {
        self.streams
            .get_mut(id)
            .ok_or_else(|| HeliError::Stream(format!("no packets seen yet for {id}")))
    }

    pub fn get(&self, id: &StreamId) -> Option<&GraphQueueBuffer> {
        self.streams.get(id).map(|e| &e.buffer)
    }

    /// Packets accepted for `id`, including the seed.
    pub fn packets(&self, id: &StreamId) -> u64 {
        self.streams.get(id).map_or(0, |e| e.packets)
    }

    /// Registered streams in identifier order.
    pub fn ids(&self) -> impl Iterator<Item = &StreamId> {
        self.streams.keys()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

fn same_rate(a: f64, b: f64) -> bool {
    (a - b).abs() <= RATE_TOLERANCE * a.abs().max(b.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use heli_buffer::Capacity;

    fn id() -> StreamId {
        "UW.JCW..EHZ".parse().unwrap()
    }

    fn packet(start_millis: i64, samples: Vec<i32>, sample_rate: f64) -> Packet {
        Packet {
            stream: id(),
            sample_rate,
            segment: Segment::new(start_millis, samples),
        }
    }

    fn registry() -> Registry {
        Registry::new(BufferSettings::new(Capacity::Samples(100)))
    }

    #[test]
    fn first_packet_creates_the_buffer() {
        let mut reg = registry();
        assert!(reg.get(&id()).is_none());
        reg.ingest(&packet(0, vec![1, 2, 3], 10.0)).unwrap();
        reg.ingest(&packet(300, vec![4], 10.0)).unwrap();

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.packets(&id()), 2);
        let buffer = reg.get(&id()).unwrap();
        assert_eq!(buffer.queue_len(), 4);
        assert_eq!(buffer.sample_rate(), 10.0);
    }

    #[test]
    fn rate_change_is_refused() {
        let mut reg = registry();
        reg.ingest(&packet(0, vec![1], 10.0)).unwrap();
        let err = reg.ingest(&packet(100, vec![2], 20.0)).unwrap_err();
        assert!(matches!(err, HeliError::SampleRateMismatch { .. }));
        assert_eq!(reg.packets(&id()), 1);
    }

    #[test]
    fn declared_rate_is_enforced_on_the_first_packet() {
        let mut reg = registry();
        reg.declare(id(), 100.0);
        assert!(reg.ingest(&packet(0, vec![1], 40.0)).is_err());
        assert!(reg.is_empty());
        reg.ingest(&packet(0, vec![1], 100.0)).unwrap();
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_streams_are_stream_errors() {
        let mut reg = registry();
        assert!(matches!(reg.promote(&id()), Err(HeliError::Stream(_))));
        assert!(matches!(reg.patch(&id(), &[]), Err(HeliError::Stream(_))));
    }

    #[test]
    fn patch_and_promote_through_the_registry() {
        let mut reg = registry();
        reg.ingest(&packet(0, vec![1, 2], 10.0)).unwrap();
        reg.ingest(&packet(400, vec![5], 10.0)).unwrap();
        assert_eq!(reg.promote(&id()).unwrap().unwrap().samples, vec![1, 2]);

        let outcome = reg.patch(&id(), &[Segment::new(200, vec![3, 4])]).unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(reg.promote(&id()).unwrap().unwrap().samples, vec![3, 4, 5]);
    }
}
