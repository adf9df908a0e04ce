//! Realtime loop: serial lines -> readings -> inventory snapshots
//!
//! Runs on one task. Publishing is awaited in-line, so a slow store delays
//! reading; the controller only reports real weight changes, which keeps
//! the line rate low.

use crate::clock::StationClock;
use crate::inventory::InventoryState;
use crate::line_source::{LineSource, LineTransport, TransportError};
use crate::parser::parse;
use crate::publisher::SnapshotPublisher;
use station_common::SensorTable;
use std::future::Future;
use std::io;
use std::time::Duration;

/// Counters reported when the loop stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// Non-empty lines received
    pub lines: u64,
    /// Lines that were loadcell reports for an installed sensor
    pub readings: u64,
    /// Readings that changed a level
    pub snapshots: u64,
    /// Snapshots the store did not accept
    pub publish_failures: u64,
}

pub struct Monitor {
    sensors: SensorTable,
    state: InventoryState,
    publisher: SnapshotPublisher,
    clock: StationClock,
    stats: LoopStats,
}

impl Monitor {
    pub fn new(sensors: SensorTable, publisher: SnapshotPublisher, clock: StationClock) -> Self {
        Self {
            state: InventoryState::new(&sensors),
            sensors,
            publisher,
            clock,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> &InventoryState {
        &self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Parse one line, update levels and publish a snapshot on change
    ///
    /// Lines that are not reports are ignored, reports from loadcells missing
    /// in the sensor table are logged and skipped. Publish failures are
    /// counted and the snapshot is dropped.
    pub async fn handle_line(&mut self, line: &str) {
        self.stats.lines += 1;

        let Some(reading) = parse(line, &self.sensors) else {
            log::debug!("Ignoring line: {}", line);
            return;
        };
        self.stats.readings += 1;

        let Some(event) = self.state.apply(reading, self.clock.now()) else {
            return;
        };
        self.stats.snapshots += 1;

        if self.publisher.publish(&event).await.is_err() {
            self.stats.publish_failures += 1;
        }
    }

    /// Process lines until the transport fails; returns that failure
    pub async fn run<T: LineTransport>(
        &mut self,
        source: &mut LineSource<T>,
        poll_interval: Duration,
    ) -> TransportError {
        log::info!("Reading loadcell reports from {}", source.name());
        loop {
            match source.next_line(poll_interval).await {
                Ok(line) => {
                    self.handle_line(&line).await;
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    log::error!("{}", e);
                    return e;
                }
            }
        }
    }
}

/// Print every received line without interpreting it
pub async fn echo_lines<T: LineTransport>(
    source: &mut LineSource<T>,
    poll_interval: Duration,
) -> TransportError {
    log::info!("Echoing raw lines from {}", source.name());
    loop {
        match source.next_line(poll_interval).await {
            Ok(line) => println!("Received: {}", line),
            Err(e) => {
                log::error!("{}", e);
                return e;
            }
        }
    }
}

/// Completes when `signal` reports Ctrl+C
///
/// If the handler cannot be installed this never completes, so monitoring
/// keeps running instead of shutting down.
pub async fn interrupt<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Race a session (open, settle, read) against `signal`
///
/// `signal` is polled first, so the handler is installed before the session
/// touches the port. On interrupt the session is dropped along with the
/// transport it owns and `Ok(())` is returned.
pub async fn until_interrupted<S, I>(session: S, signal: I) -> Result<(), TransportError>
where
    S: Future<Output = TransportError>,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = signal => Ok(()),
        err = session => Err(err),
    }
}
