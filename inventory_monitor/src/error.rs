//! Error types for inventory_monitor

use crate::aggregator::AggregateError;
use crate::config::ConfigError;
use crate::line_source::TransportError;
use crate::store::StoreError;
use thiserror::Error;

/// Unified error type for inventory_monitor operations
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Serial link could not be opened or was lost
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Daily aggregation failed
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    /// Table store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Invalid or incomplete configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Error = InventoryError;

/// Result alias for inventory_monitor operations
pub type Result<T> = std::result::Result<T, InventoryError>;
