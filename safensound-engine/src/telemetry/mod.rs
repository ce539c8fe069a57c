//! Vehicle telemetry source
//!
//! [`TelemetrySource`] is the pull contract the refresh engine consumes:
//! one call, one snapshot, no internal retries. [`UdpVehicleLink`] is the
//! production implementation listening for telemetry frames over UDP.

mod link;

use std::time::Duration;

use async_trait::async_trait;
use safensound_common::{Absence, FailureKind, TelemetrySnapshot};

pub use link::{UdpVehicleLink, parse_frame};

/// Errors that can occur when polling the vehicle link.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Link unreachable or session not established.
    #[error("Vehicle link unavailable: {0}")]
    LinkUnavailable(String),

    /// A frame arrived but could not be read.
    #[error("Malformed telemetry: {0}")]
    MalformedTelemetry(String),

    /// Nothing arrived within the poll bound.
    #[error("No telemetry within {0:?}")]
    Timeout(Duration),
}

impl TelemetryError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TelemetryError::LinkUnavailable(_) => FailureKind::LinkUnavailable,
            TelemetryError::MalformedTelemetry(_) => FailureKind::MalformedTelemetry,
            TelemetryError::Timeout(_) => FailureKind::Timeout,
        }
    }
}

impl From<TelemetryError> for Absence {
    fn from(e: TelemetryError) -> Self {
        Absence::new(e.kind(), e.to_string())
    }
}

/// Pull interface to the vehicle.
///
/// Implementations must return (or fail) within a bounded time and must not
/// retry internally.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn poll(&self) -> Result<TelemetrySnapshot, TelemetryError>;
}
