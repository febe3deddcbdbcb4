use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::HeliError;

/// Fixed-width signed sample type used throughout (raw digitizer counts).
pub type Sample = i32;

/// An ordered run of samples tagged with the absolute time of the first one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Epoch milliseconds of `samples[0]`.
    pub start_millis: i64,
    pub samples: Vec<Sample>,
}

impl Segment {
    pub fn new(start_millis: i64, samples: Vec<Sample>) -> Self {
        Self {
            start_millis,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Samples newly committed to the graph region by one promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotedRange {
    /// Logical index of the first promoted sample at the time of promotion.
    pub start_index: usize,
    /// Epoch milliseconds of the first promoted sample.
    pub start_millis: i64,
    pub samples: Vec<Sample>,
}

impl PromotedRange {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_millis)
    }
}

/// The earliest unresolved gap, expressed in absolute time.
///
/// Both ends are inclusive: `end_millis` is the time of the last missing sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HoleWindow {
    pub start_millis: i64,
    pub end_millis: i64,
    /// Logical index of the first missing sample.
    pub start_index: usize,
    /// Number of missing samples.
    pub len: usize,
}

impl HoleWindow {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_millis)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.end_millis)
    }
}

/// Current value of every attached statistic, keyed by name.
/// `None` means "undefined" (empty window).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatisticsSnapshot(pub BTreeMap<String, Option<f64>>);

impl StatisticsSnapshot {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied().flatten()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.0.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which built-in statistic to attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Mean,
    Min,
    Max,
    Median,
}

/// Which part of the buffer a statistic observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatScope {
    /// Promoted samples only, `[0, graph_len)`.
    #[default]
    Graph,
    /// Every stored, defined sample: graph plus queue.
    Buffer,
}

/// What to do with a patch that reaches both hole boundaries but whose
/// total length differs from the hole's span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatchPolicy {
    /// Log a warning and apply it anyway.
    #[default]
    Warn,
    /// Refuse it.
    Strict,
}

/// SEED-style channel identity: `NET.STA.LOC.CHAN`.
///
/// The location code is frequently empty (`UW.JCW..EHZ`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl StreamId {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }

    /// Ringserver match pattern for this channel's miniSEED packets.
    #[must_use]
    pub fn match_pattern(&self) -> String {
        format!(
            "{}_{}_{}_{}/MSEED",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl FromStr for StreamId {
    type Err = HeliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let [net, sta, loc, chan] = parts.as_slice() else {
            return Err(HeliError::Stream(format!(
                "stream id '{s}' is not of the form NET.STA.LOC.CHAN"
            )));
        };
        if net.is_empty() || sta.is_empty() || chan.is_empty() {
            return Err(HeliError::Stream(format!(
                "stream id '{s}' is missing a network, station or channel code"
            )));
        }
        Ok(Self::new(*net, *sta, *loc, *chan))
    }
}

impl TryFrom<String> for StreamId {
    type Error = HeliError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StreamId> for String {
    fn from(id: StreamId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_round_trips_with_empty_location() {
        let id: StreamId = "UW.JCW..EHZ".parse().unwrap();
        assert_eq!(id.location, "");
        assert_eq!(id.to_string(), "UW.JCW..EHZ");
        assert_eq!(id.match_pattern(), "UW_JCW__EHZ/MSEED");
    }

    #[test]
    fn stream_id_rejects_short_form() {
        assert!("UW.JCW.EHZ".parse::<StreamId>().is_err());
        assert!(".JCW..EHZ".parse::<StreamId>().is_err());
    }

    #[test]
    fn snapshot_flattens_undefined() {
        let mut snap = StatisticsSnapshot::default();
        snap.insert("mean", None);
        snap.insert("max", Some(7.0));
        assert_eq!(snap.get("mean"), None);
        assert_eq!(snap.get("max"), Some(7.0));
        assert_eq!(snap.get("missing"), None);
    }
}
