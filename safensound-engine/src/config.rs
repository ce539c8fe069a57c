use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StartupError;
use crate::location::DEFAULT_IPINFO_URL;
use crate::weather::DEFAULT_OPEN_METEO_URL;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DEFAULT_AIRPORTS_URL: &str =
    "https://raw.githubusercontent.com/jpatokal/openflights/master/data/airports.dat";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub vehicle: VehicleConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub airports: AirportsConfig,

    #[serde(default)]
    pub startup: StartupConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub directory: String,

    /// Log files older than this are deleted
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Pause between the end of one publish and the start of the next cycle
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_nearest_airports")]
    pub nearest_airports: usize,

    /// Upper bound on any single source call inside a cycle
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    #[serde(default = "default_vehicle_address")]
    pub bind_address: String,

    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_url")]
    pub base_url: String,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Fixed location; when both are set, no geolocation lookup happens
    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default = "default_location_url")]
    pub url: String,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportsConfig {
    #[serde(default = "default_airports_path")]
    pub path: String,

    #[serde(default = "default_airports_url")]
    pub url: String,

    #[serde(default = "default_true")]
    pub download_if_missing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Location lookups tried before giving up
    #[serde(default = "default_location_attempts")]
    pub location_attempts: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Print the HUD text to stdout on every publish
    #[serde(default = "default_true")]
    pub console: bool,

    /// Write every published state as JSON to this file
    #[serde(default)]
    pub snapshot_path: Option<String>,

    /// Serve the published state over HTTP on this port
    #[serde(default)]
    pub http_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_retention_days() -> u64 {
    3
}

fn default_interval_secs() -> u64 {
    5
}

fn default_nearest_airports() -> usize {
    5
}

fn default_source_timeout_secs() -> u64 {
    3
}

fn default_vehicle_address() -> String {
    "127.0.0.1:14550".to_string()
}

fn default_recv_timeout_ms() -> u64 {
    2000
}

fn default_weather_url() -> String {
    DEFAULT_OPEN_METEO_URL.to_string()
}

fn default_location_url() -> String {
    DEFAULT_IPINFO_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    5
}

fn default_airports_path() -> String {
    "data/airports.dat".to_string()
}

fn default_airports_url() -> String {
    DEFAULT_AIRPORTS_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_location_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            logging: LoggingConfig::default(),
            refresh: RefreshConfig::default(),
            vehicle: VehicleConfig::default(),
            weather: WeatherConfig::default(),
            location: LocationConfig::default(),
            airports: AirportsConfig::default(),
            startup: StartupConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            retention_days: default_log_retention_days(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            nearest_airports: default_nearest_airports(),
            source_timeout_secs: default_source_timeout_secs(),
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            bind_address: default_vehicle_address(),
            recv_timeout_ms: default_recv_timeout_ms(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            url: default_location_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for AirportsConfig {
    fn default() -> Self {
        Self {
            path: default_airports_path(),
            url: default_airports_url(),
            download_if_missing: default_true(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            location_attempts: default_location_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            console: default_true(),
            snapshot_path: None,
            http_port: None,
        }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if self.refresh.interval_secs == 0 {
            return Err(StartupError::Config("refresh.interval_secs must be > 0".to_string()));
        }
        if self.refresh.nearest_airports == 0 {
            return Err(StartupError::Config("refresh.nearest_airports must be >= 1".to_string()));
        }
        if self.refresh.source_timeout_secs == 0 {
            return Err(StartupError::Config("refresh.source_timeout_secs must be > 0".to_string()));
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(StartupError::Config(format!(
                        "location ({}, {}) is out of range",
                        lat, lon
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(StartupError::Config(
                    "location.latitude and location.longitude must be set together".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh.source_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.refresh.interval_secs, 5);
        assert_eq!(config.refresh.nearest_airports, 5);
        assert_eq!(config.vehicle.bind_address, "127.0.0.1:14550");
        assert_eq!(config.weather.base_url, DEFAULT_OPEN_METEO_URL);
        assert!(config.location.latitude.is_none());
        assert!(config.airports.download_if_missing);
        assert!(config.display.console);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_overrides() {
        let config: AppConfig = toml::from_str(
            r#"
            log_level = "debug"

            [refresh]
            interval_secs = 10

            [location]
            latitude = 0.0
            longitude = 0.0

            [display]
            snapshot_path = "state.json"
            http_port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.refresh.interval_secs, 10);
        assert_eq!(config.refresh.nearest_airports, 5);
        assert_eq!(config.location.latitude, Some(0.0));
        assert_eq!(config.display.snapshot_path.as_deref(), Some("state.json"));
        assert_eq!(config.display.http_port, Some(8080));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.refresh.interval_secs = 0;
        assert!(matches!(config.validate(), Err(StartupError::Config(_))));

        let mut config = AppConfig::default();
        config.refresh.nearest_airports = 0;
        assert!(matches!(config.validate(), Err(StartupError::Config(_))));

        let mut config = AppConfig::default();
        config.location.latitude = Some(10.0);
        assert!(matches!(config.validate(), Err(StartupError::Config(_))));

        let mut config = AppConfig::default();
        config.location.latitude = Some(100.0);
        config.location.longitude = Some(10.0);
        assert!(matches!(config.validate(), Err(StartupError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.refresh.interval_secs, 5);
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "refresh = [not valid").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }
}
