//! Synthetic seismic source: a sinusoid plus noise, packetized like a live
//! feed, with some packets held back and delivered late as hole patches.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::time::Duration;

use heli_core::{Command, Packet, Sample, Segment, StreamId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub stream: StreamId,
    pub sample_rate: f64,
    /// Samples per packet.
    pub packet_len: usize,
    /// Epoch milliseconds of the first sample.
    pub start_millis: i64,
    pub amplitude: f64,
    pub period_secs: f64,
    /// Peak absolute noise added to every sample.
    pub noise: u32,
    /// Chance that a packet is withheld and sent later as a patch.
    pub holdback: f64,
    /// Packets emitted between withholding one and delivering it.
    pub patch_delay: usize,
    pub seed: u64,
}

impl DemoConfig {
    pub fn new(stream: StreamId, sample_rate: f64, start_millis: i64) -> Self {
        Self {
            stream,
            sample_rate,
            packet_len: 50,
            start_millis,
            amplitude: 2_000.0,
            period_secs: 8.0,
            noise: 150,
            holdback: 0.05,
            patch_delay: 3,
            seed: 0x5e15,
        }
    }
}

struct Withheld {
    due: u64,
    segment: Segment,
}

pub struct DemoFeed {
    config: DemoConfig,
    rng: StdRng,
    /// Absolute index of the next sample to synthesize.
    next_sample: u64,
    packets: u64,
    held_last: bool,
    withheld: VecDeque<Withheld>,
}

impl DemoFeed {
    pub fn new(config: DemoConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            next_sample: 0,
            packets: 0,
            held_last: false,
            withheld: VecDeque::new(),
        }
    }

    /// Commands for one packet interval: any patches now due, then the fresh
    /// packet unless it is withheld.
    pub fn step(&mut self) -> Vec<Command> {
        let segment = self.synthesize();
        self.packets += 1;

        let mut out = Vec::new();
        while self.withheld.front().is_some_and(|w| w.due <= self.packets) {
            if let Some(w) = self.withheld.pop_front() {
                out.push(self.patch(w.segment));
            }
        }

        // Never the seed packet, and never two in a row: each withheld packet
        // must be exactly one hole.
        let hold = self.packets > 1 && !self.held_last && self.rng.random_bool(self.config.holdback);
        self.held_last = hold;
        if hold {
            debug!(start_millis = segment.start_millis, "withholding packet");
            self.withheld.push_back(Withheld {
                due: self.packets + self.config.patch_delay.max(1) as u64,
                segment,
            });
        } else {
            out.push(Command::Packet(Packet {
                stream: self.config.stream.clone(),
                sample_rate: self.config.sample_rate,
                segment,
            }));
        }
        out
    }

    /// Patches for everything still withheld.
    pub fn flush(&mut self) -> Vec<Command> {
        let pending: Vec<Segment> = self.withheld.drain(..).map(|w| w.segment).collect();
        pending.into_iter().map(|s| self.patch(s)).collect()
    }

    /// Wall-clock time one packet spans.
    pub fn packet_period(&self) -> Duration {
        Duration::from_secs_f64(self.config.packet_len as f64 / self.config.sample_rate)
    }

    fn patch(&self, segment: Segment) -> Command {
        Command::PatchHole {
            stream: self.config.stream.clone(),
            segments: vec![segment],
        }
    }

    fn synthesize(&mut self) -> Segment {
        let interval_millis = 1000.0 / self.config.sample_rate;
        let first = self.next_sample;
        let start_millis = self.config.start_millis + (first as f64 * interval_millis).round() as i64;
        let peak = Sample::try_from(self.config.noise).unwrap_or(Sample::MAX);
        let samples: Vec<Sample> = (first..first + self.config.packet_len as u64)
            .map(|n| {
                let t = n as f64 / self.config.sample_rate;
                let wave = self.config.amplitude * (TAU * t / self.config.period_secs).sin();
                let noise = self.rng.random_range(-peak..=peak);
                (wave.round() as Sample).saturating_add(noise)
            })
            .collect();
        self.next_sample += self.config.packet_len as u64;
        Segment::new(start_millis, samples)
    }
}

/// Feed `packets` packets (forever for `None`) into `tx`, one per packet
/// period, then deliver whatever is still withheld. The feed runs past the
/// limit while the latest packet is withheld so that its hole exists.
pub async fn run_demo(mut feed: DemoFeed, tx: mpsc::Sender<Command>, packets: Option<u64>) {
    let mut ticker = time::interval(feed.packet_period());
    info!(stream = %feed.config.stream, "demo feed started");

    let mut sent = 0;
    while feed.held_last || packets.map_or(true, |limit| sent < limit) {
        ticker.tick().await;
        for command in feed.step() {
            if tx.send(command).await.is_err() {
                return; // service stopped
            }
        }
        sent += 1;
    }
    for command in feed.flush() {
        if tx.send(command).await.is_err() {
            return;
        }
    }
    info!(packets = sent, "demo feed finished");
}
