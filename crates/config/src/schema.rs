use heli_buffer::{BufferSettings, Capacity};
use heli_core::{HeliError, PatchPolicy, PromotionMode, Result, StatKind, StatScope, StreamId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Root configuration structure parsed from `heli.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeliConfig {
    /// Settings shared by every stream's buffer.
    pub buffer: BufferConfig,
    /// When queued samples move into the graph.
    pub promotion: PromotionConfig,
    /// Named statistics attached to every new buffer.
    pub statistics: Vec<StatisticConfig>,
    /// Streams declared up front, with their expected sample rate.
    pub streams: Vec<StreamConfig>,
}

impl Default for HeliConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            promotion: PromotionConfig::default(),
            statistics: vec![
                StatisticConfig::new("mean", StatKind::Mean),
                StatisticConfig::new("min", StatKind::Min),
                StatisticConfig::new("max", StatKind::Max),
                StatisticConfig::new("median", StatKind::Median),
            ],
            streams: Vec::new(),
        }
    }
}

impl HeliConfig {
    /// Reject values that parse but cannot drive a buffer.
    pub fn validate(&self) -> Result<()> {
        if !(self.buffer.window_minutes.is_finite() && self.buffer.window_minutes > 0.0) {
            return Err(HeliError::Config(format!(
                "buffer.window_minutes must be positive, got {}",
                self.buffer.window_minutes
            )));
        }
        if self.buffer.extrema_tracked == 0 {
            return Err(HeliError::Config("buffer.extrema_tracked must be at least 1".into()));
        }
        if self.promotion.mode == PromotionKind::Interval && self.promotion.interval_ms == 0 {
            return Err(HeliError::Config("promotion.interval_ms must be at least 1".into()));
        }

        let mut names = HashSet::new();
        for stat in &self.statistics {
            if !names.insert(stat.name.as_str()) {
                return Err(HeliError::Config(format!(
                    "statistic '{}' is declared twice",
                    stat.name
                )));
            }
        }

        let mut ids = HashSet::new();
        for stream in &self.streams {
            if !(stream.sample_rate.is_finite() && stream.sample_rate > 0.0) {
                return Err(HeliError::Config(format!(
                    "stream {} has non-positive sample rate {}",
                    stream.id, stream.sample_rate
                )));
            }
            if !ids.insert(&stream.id) {
                return Err(HeliError::Config(format!("stream {} is declared twice", stream.id)));
            }
            Capacity::Minutes(self.buffer.window_minutes).resolve(stream.sample_rate)?;
        }
        Ok(())
    }

    /// Settings for a freshly created buffer.
    pub fn buffer_settings(&self) -> BufferSettings {
        let mut settings = BufferSettings::new(Capacity::Minutes(self.buffer.window_minutes))
            .with_patch_policy(self.buffer.patch_policy);
        settings.extrema = self.buffer.extrema_tracked;
        for stat in &self.statistics {
            settings = settings.with_statistic(stat.name.clone(), stat.kind, stat.scope);
        }
        settings
    }

    pub fn promotion_mode(&self) -> PromotionMode {
        self.promotion.mode()
    }

    /// Declared sample rate of `id`, if the stream is listed.
    pub fn declared_rate(&self, id: &StreamId) -> Option<f64> {
        self.streams
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.sample_rate)
    }
}

/// `[buffer]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// History kept per stream; capacity is `floor(60 * minutes * rate)`.
    pub window_minutes: f64,
    /// K for min / max statistics.
    pub extrema_tracked: usize,
    pub patch_policy: PatchPolicy,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            window_minutes: 60.0,
            extrema_tracked: heli_stats::DEFAULT_EXTREMA,
            patch_policy: PatchPolicy::Warn,
        }
    }
}

/// `[promotion]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    pub mode: PromotionKind,
    /// Cadence for `mode = "interval"`; ignored otherwise.
    pub interval_ms: u64,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            mode: PromotionKind::Interval,
            interval_ms: 1000,
        }
    }
}

impl PromotionConfig {
    pub fn mode(&self) -> PromotionMode {
        match self.mode {
            PromotionKind::OnIngest => PromotionMode::OnIngest,
            PromotionKind::Interval => PromotionMode::Interval {
                interval_ms: self.interval_ms,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    #[default]
    Interval,
    OnIngest,
}

/// One `[[statistics]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticConfig {
    /// Key in every statistics snapshot.
    pub name: String,
    pub kind: StatKind,
    #[serde(default)]
    pub scope: StatScope,
}

impl StatisticConfig {
    pub fn new(name: impl Into<String>, kind: StatKind) -> Self {
        Self {
            name: name.into(),
            kind,
            scope: StatScope::Graph,
        }
    }
}

/// One `[[streams]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// `NET.STA.LOC.CHAN`
    pub id: StreamId,
    pub sample_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: HeliConfig = toml::from_str("").unwrap();
        assert_eq!(config, HeliConfig::default());
        assert_eq!(config.statistics.len(), 4);
        assert_eq!(
            config.promotion_mode(),
            PromotionMode::Interval { interval_ms: 1000 }
        );
        config.validate().unwrap();
    }

    #[test]
    fn full_file_parses() {
        let raw = r#"
            [buffer]
            window_minutes = 0.5
            extrema_tracked = 4
            patch_policy = "strict"

            [promotion]
            mode = "on_ingest"

            [[statistics]]
            name = "backlog_mean"
            kind = "mean"
            scope = "buffer"

            [[statistics]]
            name = "peak"
            kind = "max"

            [[streams]]
            id = "UW.JCW..EHZ"
            sample_rate = 100.0
        "#;
        let config: HeliConfig = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.promotion_mode(), PromotionMode::OnIngest);

        let settings = config.buffer_settings();
        assert_eq!(settings.capacity.resolve(100.0).unwrap(), 3000);
        assert_eq!(settings.extrema, 4);
        assert_eq!(settings.patch_policy, PatchPolicy::Strict);
        assert_eq!(settings.statistics.len(), 2);
        assert_eq!(settings.statistics[0].scope, StatScope::Buffer);
        assert_eq!(settings.statistics[1].scope, StatScope::Graph);

        let id: StreamId = "UW.JCW..EHZ".parse().unwrap();
        assert_eq!(config.declared_rate(&id), Some(100.0));
    }

    #[test]
    fn bad_values_are_rejected() {
        let zero_window: HeliConfig = toml::from_str("[buffer]\nwindow_minutes = 0.0").unwrap();
        assert!(zero_window.validate().is_err());

        let dup = r#"
            [[statistics]]
            name = "m"
            kind = "mean"
            [[statistics]]
            name = "m"
            kind = "max"
        "#;
        let dup: HeliConfig = toml::from_str(dup).unwrap();
        assert!(matches!(dup.validate(), Err(HeliError::Config(_))));

        let huge = "[buffer]\nwindow_minutes = 1e300\n[[streams]]\nid = \"UW.JCW..EHZ\"\nsample_rate = 100.0";
        let huge: HeliConfig = toml::from_str(huge).unwrap();
        assert!(matches!(huge.validate(), Err(HeliError::Config(_))));

        let zero_interval: HeliConfig =
            toml::from_str("[promotion]\ninterval_ms = 0").unwrap();
        assert!(zero_interval.validate().is_err());

        assert!(toml::from_str::<HeliConfig>("[[streams]]\nid = \"bogus\"\nsample_rate = 1.0").is_err());
    }
}
