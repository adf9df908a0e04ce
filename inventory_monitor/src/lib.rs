//! Inventory Monitor - loadcell stock levels for the dispensing station
//!
//! Reads weight reports from the loadcell controller over serial, keeps the
//! current level of every loadcell, and writes a snapshot row whenever a
//! level changes. A separate job sums each day's consumption.

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod error;
pub mod inventory;
pub mod line_source;
pub mod monitor;
pub mod parser;
pub mod publisher;
pub mod store;

pub use aggregator::{aggregate_day, AggregateOutcome};
pub use clock::StationClock;
pub use error::{Error, Result};
pub use inventory::{InventoryState, SnapshotEvent};
pub use line_source::{LineSource, LineTransport, SerialTransport, TransportError};
pub use monitor::{LoopStats, Monitor};
pub use parser::{parse, Reading};
pub use publisher::SnapshotPublisher;
pub use store::{SqliteTableStore, Tables, TableStore};
