//! Queue-and-drain ingestion task.
//!
//! Commands from every source land in one channel, are moved into a pending
//! list, and are handled strictly one at a time by the task that owns the
//! [`Registry`]. Buffers are never touched from anywhere else.

use std::collections::VecDeque;
use std::time::Duration;

use heli_buffer::PatchOutcome;
use heli_core::{Command, HeliError, HoleWindow, PromotionMode, Result, StreamId, Update};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::registry::Registry;

const COMMAND_CAPACITY: usize = 256;
const UPDATE_CAPACITY: usize = 256;

/// Handle to a running service.
#[derive(Debug)]
pub struct ServiceHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<Registry>,
}

impl ServiceHandle {
    /// A sender for another command source.
    pub fn sender(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HeliError::Stream("ingestion service has stopped".into()))
    }

    /// Drain what is pending, stop, and hand the registry back.
    pub async fn shutdown(self) -> Result<Registry> {
        // The task may already be gone if every update receiver was dropped.
        let _ = self.commands.send(Command::Shutdown).await;
        self.task
            .await
            .map_err(|e| HeliError::Stream(format!("ingestion service panicked: {e}")))
    }
}

/// Spawn the ingestion task. It stops on [`Command::Shutdown`], when every
/// command sender is dropped, or when the update receiver is dropped.
pub fn spawn_service(
    registry: Registry,
    mode: PromotionMode,
) -> (ServiceHandle, mpsc::Receiver<Update>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (update_tx, update_rx) = mpsc::channel(UPDATE_CAPACITY);

    let service = Service {
        registry,
        mode,
        pending: VecDeque::new(),
        updates: update_tx,
    };
    let task = tokio::spawn(service.run(cmd_rx));

    (
        ServiceHandle {
            commands: cmd_tx,
            task,
        },
        update_rx,
    )
}

struct Service {
    registry: Registry,
    mode: PromotionMode,
    pending: VecDeque<Command>,
    updates: mpsc::Sender<Update>,
}

/// Why the drain loop stopped early.
enum Halt {
    Shutdown,
    ReceiverDropped,
}

impl Service {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Registry {
        info!(mode = ?self.mode, "ingestion service started");
        let mut ticker = make_ticker(self.mode);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        self.pending.push_back(command);
                        while let Ok(more) = commands.try_recv() {
                            self.pending.push_back(more);
                        }
                    }
                    None => break, // every sender dropped
                },
                _ = tick(&mut ticker) => self.pending.push_back(Command::Promote(None)),
            }

            match self.drain(&mut ticker).await {
                Ok(()) => {}
                Err(Halt::Shutdown) => break,
                Err(Halt::ReceiverDropped) => {
                    warn!("update receiver dropped; stopping");
                    break;
                }
            }
        }

        info!(streams = self.registry.len(), "ingestion service stopped");
        self.registry
    }

    /// Handle pending commands oldest first until the list is empty.
    async fn drain(&mut self, ticker: &mut Option<Interval>) -> Result<(), Halt> {
        let mut stopping = false;
        while let Some(command) = self.pending.pop_front() {
            match command {
                Command::Packet(packet) => {
                    let stream = packet.stream.clone();
                    let before = self.first_hole(&stream);
                    match self.registry.ingest(&packet) {
                        Ok(ingest) => {
                            debug!(%stream, ?ingest, "packet ingested");
                            self.announce_hole(&stream, before).await?;
                            if self.mode == PromotionMode::OnIngest {
                                self.promote(&stream).await?;
                            }
                        }
                        Err(e) => self.reject(stream, e).await?,
                    }
                }
                Command::PatchHole { stream, segments } => {
                    match self.registry.patch(&stream, &segments) {
                        Ok(PatchOutcome::Empty) => {}
                        Ok(outcome) => {
                            if let PatchOutcome::Discontinuous { provided, expected } = outcome {
                                warn!(%stream, provided, expected, "hole closed by a patch of the wrong length");
                            }
                            let remaining = self
                                .registry
                                .get(&stream)
                                .map_or(0, |b| b.holes().len());
                            self.emit(Update::HoleClosed {
                                stream: stream.clone(),
                                remaining,
                            })
                            .await?;
                            self.announce_hole(&stream, None).await?;
                            if self.mode == PromotionMode::OnIngest {
                                self.promote(&stream).await?;
                            }
                        }
                        Err(e) => self.reject(stream, e).await?,
                    }
                }
                Command::Promote(Some(stream)) => {
                    if self.registry.get(&stream).is_some() {
                        self.promote(&stream).await?;
                    } else {
                        let e = HeliError::Stream(format!("no packets seen yet for {stream}"));
                        self.reject(stream, e).await?;
                    }
                }
                Command::Promote(None) => {
                    let ids: Vec<StreamId> = self.registry.ids().cloned().collect();
                    for stream in ids {
                        self.promote(&stream).await?;
                    }
                }
                Command::Reconfigure(mode) => {
                    if mode != self.mode {
                        info!(from = ?self.mode, to = ?mode, "promotion mode changed");
                        self.mode = mode;
                        *ticker = make_ticker(mode);
                    }
                }
                Command::Shutdown => stopping = true,
            }
        }
        if stopping {
            Err(Halt::Shutdown)
        } else {
            Ok(())
        }
    }

    fn first_hole(&self, stream: &StreamId) -> Option<HoleWindow> {
        self.registry.get(stream).and_then(|b| b.first_hole())
    }

    /// Emit `HoleOpened` when the earliest gap of `stream` is not `before`.
    async fn announce_hole(
        &mut self,
        stream: &StreamId,
        before: Option<HoleWindow>,
    ) -> Result<(), Halt> {
        let now = self.first_hole(stream);
        let changed = match (before, now) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(b), Some(n)) => b.start_millis != n.start_millis || b.end_millis != n.end_millis,
        };
        if let (true, Some(hole)) = (changed, now) {
            self.emit(Update::HoleOpened {
                stream: stream.clone(),
                hole,
            })
            .await?;
        }
        Ok(())
    }

    async fn promote(&mut self, stream: &StreamId) -> Result<(), Halt> {
        let promoted = match self.registry.promote(stream) {
            Ok(Some(range)) => range,
            Ok(None) | Err(_) => return Ok(()),
        };
        let statistics = self
            .registry
            .get(stream)
            .map(|b| b.statistics())
            .unwrap_or_default();
        self.emit(Update::Promoted {
            stream: stream.clone(),
            range: promoted,
            statistics,
        })
        .await
    }

    async fn reject(&mut self, stream: StreamId, error: HeliError) -> Result<(), Halt> {
        warn!(%stream, kind = error.kind(), "{error}");
        self.emit(Update::Rejected {
            stream,
            kind: error.kind(),
            reason: error.to_string(),
        })
        .await
    }

    async fn emit(&mut self, update: Update) -> Result<(), Halt> {
        self.updates
            .send(update)
            .await
            .map_err(|_| Halt::ReceiverDropped)
    }
}

fn make_ticker(mode: PromotionMode) -> Option<Interval> {
    match mode {
        PromotionMode::OnIngest => None,
        PromotionMode::Interval { interval_ms } => {
            let period = Duration::from_millis(interval_ms.max(1));
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        }
    }
}

/// Resolves on the next tick, or never when promotion is not timed.
async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
