//! heli: live helicorder buffering for seismic channels.
//!
//! Run with:  `RUST_LOG=info heli [CONFIG]`
//!
//! Without a network transport the binary drives a synthetic channel through
//! the ingestion service and prints every update as one JSON line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use heli_core::{Command, StreamId};
use heli_stream::{run_demo, spawn_service, DemoConfig, DemoFeed, Registry};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Channel and rate used when the config declares no streams.
const DEMO_STREAM: &str = "XX.DEMO..HHZ";
const DEMO_RATE: f64 = 100.0;

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logging; RUST_LOG controls verbosity (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("heli v{} starting", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(heli_config::default_path);
    let config = heli_config::load(&path)
        .with_context(|| format!("loading config from '{}'", path.display()))?;

    let mut registry = Registry::new(config.buffer_settings());
    for stream in &config.streams {
        registry.declare(stream.id.clone(), stream.sample_rate);
    }
    let (service, mut updates) = spawn_service(registry, config.promotion_mode());

    let (_watcher, changes) = heli_config::ConfigWatcher::spawn(&path);
    tokio::spawn(reload_loop(path, changes, service.sender()));

    let (stream, rate) = match config.streams.first() {
        Some(s) => (s.id.clone(), s.sample_rate),
        None => (DEMO_STREAM.parse::<StreamId>()?, DEMO_RATE),
    };
    info!(%stream, rate, pattern = %stream.match_pattern(), "feeding synthetic channel");
    let feed = DemoFeed::new(DemoConfig::new(
        stream,
        rate,
        chrono::Utc::now().timestamp_millis(),
    ));
    let mut demo = tokio::spawn(run_demo(feed, service.sender(), None));

    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match serde_json::to_string(&update) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("cannot encode update: {e}"),
            }
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("waiting for ctrl-c")?,
        _ = &mut demo => {}
    }
    info!("shutting down");
    demo.abort();

    let registry = service.shutdown().await?;
    for id in registry.ids() {
        info!(stream = %id, packets = registry.packets(id), "final");
    }
    printer.await.context("update printer")?;
    Ok(())
}

/// Re-read the config on every change and push the new promotion cadence
/// into the running service.
async fn reload_loop(path: PathBuf, mut changes: mpsc::Receiver<()>, commands: mpsc::Sender<Command>) {
    while changes.recv().await.is_some() {
        match heli_config::load(&path) {
            Ok(config) => {
                info!("config reloaded");
                let mode = config.promotion_mode();
                if commands.send(Command::Reconfigure(mode)).await.is_err() {
                    break; // service stopped
                }
            }
            Err(e) => warn!("config reload failed, keeping current settings: {e}"),
        }
    }
}
