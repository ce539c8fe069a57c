//! Startup location resolution
//!
//! The engine needs one fixed location before its first cycle. It comes
//! either from configuration ([`FixedLocation`]) or from IP geolocation
//! ([`IpInfoLocator`]). Absence is always an explicit error, never a
//! sentinel coordinate: `(0, 0)` is a perfectly valid answer.

mod ipinfo;

use std::time::Duration;

use async_trait::async_trait;
use safensound_common::GeoPoint;

pub use ipinfo::{DEFAULT_IPINFO_URL, IpInfoLocator, parse_ipinfo};

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn resolve_location(&self) -> Result<GeoPoint, LocationError>;
}

/// A location known up front, e.g. from the config file.
pub struct FixedLocation(GeoPoint);

impl FixedLocation {
    pub fn new(point: GeoPoint) -> Self {
        Self(point)
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn resolve_location(&self) -> Result<GeoPoint, LocationError> {
        if self.0.is_valid() {
            Ok(self.0)
        } else {
            Err(LocationError::Unavailable(format!(
                "configured location {} is out of range",
                self.0
            )))
        }
    }
}

/// Resolve the location, trying up to `attempts` times with a linearly
/// growing delay between attempts.
pub async fn resolve_with_retries(
    provider: &dyn LocationProvider,
    attempts: u32,
    retry_delay: Duration,
) -> Result<GeoPoint, LocationError> {
    let attempts = attempts.max(1);
    let mut last_error = LocationError::Unavailable("no attempt made".to_string());

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = retry_delay * (attempt - 1);
            tracing::debug!(
                "Retrying location lookup after {:?} (attempt {}/{})",
                delay,
                attempt,
                attempts
            );
            tokio::time::sleep(delay).await;
        }

        match provider.resolve_location().await {
            Ok(point) => {
                tracing::info!("Resolved location {}", point);
                return Ok(point);
            }
            Err(e) => {
                tracing::warn!("Location lookup failed (attempt {}/{}): {}", attempt, attempts, e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}
