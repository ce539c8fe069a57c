//! Weather-at-location source

mod open_meteo;

use async_trait::async_trait;
use safensound_common::{Absence, FailureKind, WeatherSnapshot};

pub use open_meteo::{DEFAULT_OPEN_METEO_URL, OpenMeteoClient, parse_forecast};

/// Errors that can occur when fetching weather.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// Transport failure or non-success HTTP status.
    #[error("Weather provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Success status, but the body is not a forecast document.
    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),
}

impl WeatherError {
    pub fn kind(&self) -> FailureKind {
        match self {
            WeatherError::ProviderUnavailable(_) => FailureKind::ProviderUnavailable,
            WeatherError::MalformedResponse(_) => FailureKind::MalformedResponse,
        }
    }
}

impl From<WeatherError> for Absence {
    fn from(e: WeatherError) -> Self {
        Absence::new(e.kind(), e.to_string())
    }
}

/// Pull interface to a weather provider.
///
/// A reachable provider that has nothing for some field yields a snapshot
/// with that field set to `None`, not an error.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherSnapshot, WeatherError>;
}
