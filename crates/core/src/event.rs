use serde::Serialize;

use crate::state::{HoleWindow, PromotedRange, Segment, StatisticsSnapshot, StreamId};

/// One transport packet: a segment for a single channel plus the rate it was
/// digitized at.
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream: StreamId,
    pub sample_rate: f64,
    pub segment: Segment,
}

/// How promotion (queue → graph) is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionMode {
    /// Promote everything promotable right after each ingested packet.
    OnIngest,
    /// Promote on a fixed cadence.
    Interval { interval_ms: u64 },
}

/// Messages flowing into the ingestion service.
///
/// Sources:
/// - transport / demo feed → `Packet`
/// - gap-fill collaborator → `PatchHole`
/// - renderer / caller     → `Promote`
/// - config watcher        → `Reconfigure`
#[derive(Debug, Clone)]
pub enum Command {
    // ── Ingestion ─────────────────────────────────────────────────────────────
    /// A freshly received segment.
    Packet(Packet),
    /// Late data for the first hole of a stream, addressed by absolute time.
    PatchHole {
        stream: StreamId,
        segments: Vec<Segment>,
    },

    // ── Promotion ─────────────────────────────────────────────────────────────
    /// Promote now; `None` promotes every stream.
    Promote(Option<StreamId>),

    // ── Internal ──────────────────────────────────────────────────────────────
    /// Promotion cadence changed (config reload).
    Reconfigure(PromotionMode),
    /// Drain what is pending, then stop.
    Shutdown,
}

/// Messages emitted by the ingestion service.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    /// Samples newly committed to a stream's graph region.
    Promoted {
        stream: StreamId,
        range: PromotedRange,
        statistics: StatisticsSnapshot,
    },
    /// A stream has a new earliest gap that needs back-filling.
    HoleOpened { stream: StreamId, hole: HoleWindow },
    /// The earliest gap of a stream was patched.
    HoleClosed { stream: StreamId, remaining: usize },
    /// A command was refused; the stream's buffer is unchanged.
    Rejected {
        stream: StreamId,
        kind: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_serialize_as_tagged_json() {
        let stream: StreamId = "UW.JCW..EHZ".parse().unwrap();
        let mut statistics = StatisticsSnapshot::default();
        statistics.insert("mean".to_string(), Some(2.0));
        statistics.insert("median".to_string(), None);
        let update = Update::Promoted {
            stream: stream.clone(),
            range: PromotedRange {
                start_index: 0,
                start_millis: 1_000,
                samples: vec![1, 2, 3],
            },
            statistics,
        };
        let json: serde_json::Value = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "promoted");
        assert_eq!(json["stream"], "UW.JCW..EHZ");
        assert_eq!(json["range"]["samples"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["statistics"]["mean"], 2.0);
        assert!(json["statistics"]["median"].is_null());

        let rejected = Update::Rejected {
            stream,
            kind: "out_of_order",
            reason: "late".into(),
        };
        let json = serde_json::to_value(&rejected).unwrap();
        assert_eq!(json["type"], "rejected");
        assert_eq!(json["kind"], "out_of_order");
    }
}
