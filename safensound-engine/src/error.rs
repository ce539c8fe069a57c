//! Fatal startup errors
//!
//! Per-source failures during a cycle never show up here; they are turned
//! into data inside the published state. These are the errors that stop
//! the engine from starting at all.

use crate::airport::{AirportIndexError, DatasetError};
use crate::location::LocationError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot determine startup location: {0}")]
    Location(#[from] LocationError),

    #[error("Cannot load airport dataset: {0}")]
    DatasetLoad(#[from] DatasetError),

    #[error("Airport dataset unusable: {0}")]
    Dataset(#[from] AirportIndexError),
}
