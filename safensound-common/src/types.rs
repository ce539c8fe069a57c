use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180], both finite
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// One airport record from the static dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub name: String,
    /// Empty when the dataset has no IATA code for this airport
    pub iata_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Airport {
    pub fn new(name: impl Into<String>, iata_code: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            iata_code: iata_code.into(),
            latitude,
            longitude,
        }
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Single telemetry reading from the vehicle link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_meters: f64,
    pub ground_speed_mps: f64,
    /// None when the vehicle does not report a battery level
    pub battery_percent: Option<f64>,
    /// Flight mode identifier, e.g. "LOITER"
    pub mode: String,
}

/// Current weather at the fixed location.
///
/// Each numeric field is independently optional: a provider answer that
/// lacks a field is still a valid snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_celsius: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub relative_humidity_percent: Option<f64>,
    /// Provider timestamp of the observation (local ISO-8601 without zone)
    pub observed_at: Option<String>,
}

impl WeatherSnapshot {
    pub fn temperature_fahrenheit(&self) -> Option<f64> {
        self.temperature_celsius.map(|c| c * 9.0 / 5.0 + 32.0)
    }
}

/// An airport together with its great-circle distance from the query point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestAirport {
    pub airport: Airport,
    pub distance_km: f64,
}

/// Classified reason for a missing value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    LinkUnavailable,
    MalformedTelemetry,
    Timeout,
    ProviderUnavailable,
    MalformedResponse,
    InvalidDataset,
    InvalidQuery,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::LinkUnavailable => "link unavailable",
            FailureKind::MalformedTelemetry => "malformed telemetry",
            FailureKind::Timeout => "timeout",
            FailureKind::ProviderUnavailable => "provider unavailable",
            FailureKind::MalformedResponse => "malformed response",
            FailureKind::InvalidDataset => "invalid dataset",
            FailureKind::InvalidQuery => "invalid query",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed "no value" outcome: what failed and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Absence {
    pub kind: FailureKind,
    pub message: String,
}

impl Absence {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Absence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Per-source outcome of one refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reading<T> {
    Available(T),
    Unavailable(Absence),
}

impl<T> Reading<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Reading::Available(v) => Some(v),
            Reading::Unavailable(_) => None,
        }
    }

    pub fn absence(&self) -> Option<&Absence> {
        match self {
            Reading::Available(_) => None,
            Reading::Unavailable(a) => Some(a),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Available(_))
    }
}

/// The published snapshot of one refresh cycle.
///
/// Built completely before publication and never modified afterwards;
/// the next cycle replaces it as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayState {
    pub telemetry: Reading<TelemetrySnapshot>,
    pub weather: Reading<WeatherSnapshot>,
    /// Sorted ascending by distance
    pub nearest_airports: Vec<NearestAirport>,
    /// Set when the airport query itself failed; the list is then empty
    pub nearest_airports_error: Option<Absence>,
    /// Fixed location every query of this run is made against
    pub origin: GeoPoint,
    /// 1-based cycle sequence number
    pub cycle: u64,
    pub cycle_duration_ms: u64,
    pub generated_at: DateTime<Utc>,
}
