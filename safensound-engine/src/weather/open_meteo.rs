//! Open-Meteo forecast client
//!
//! Requests `current_weather` plus the hourly temperature, wind and relative
//! humidity series. Wind is requested in m/s so no conversion is needed.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use safensound_common::WeatherSnapshot;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{WeatherError, WeatherSource};

pub const DEFAULT_OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

const HOURLY_FIELDS: &str = "temperature_2m,wind_speed_10m,relative_humidity_2m";

/// Any JSON value; numbers become `Some`, everything else `None`.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_f64())
}

/// Any JSON value; strings become `Some`, everything else `None`.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_str().map(str::to_string))
}

/// Any JSON value; arrays are kept, everything else (including `null`)
/// becomes an empty series.
fn lenient_series<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Array(values) => Ok(values),
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current_weather: Option<CurrentWeather>,
    #[serde(default)]
    hourly: Option<Hourly>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentWeather {
    #[serde(default, deserialize_with = "lenient_string")]
    time: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    windspeed: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Hourly {
    #[serde(default, deserialize_with = "lenient_series")]
    time: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_series")]
    temperature_2m: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_series")]
    wind_speed_10m: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_series")]
    relative_humidity_2m: Vec<Value>,
}

impl Hourly {
    /// Index of the hourly slot covering `time` ("YYYY-MM-DDTHH:MM").
    /// Non-string timestamps never match.
    fn slot_for(&self, time: &str) -> Option<usize> {
        let hour = time.get(..13)?;
        self.time
            .iter()
            .position(|t| t.as_str().and_then(|t| t.get(..13)) == Some(hour))
    }

    fn value_at(series: &[Value], slot: Option<usize>) -> Option<f64> {
        series.get(slot?)?.as_f64()
    }
}

/// Parse an Open-Meteo forecast body.
pub fn parse_forecast(body: &[u8]) -> Result<WeatherSnapshot, WeatherError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| WeatherError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(WeatherError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    }

    let forecast = ForecastResponse::deserialize(value)
        .map_err(|e| WeatherError::MalformedResponse(e.to_string()))?;

    let current = forecast.current_weather.unwrap_or_default();
    let hourly = forecast.hourly.unwrap_or_default();
    let slot = current.time.as_deref().and_then(|t| hourly.slot_for(t));

    Ok(WeatherSnapshot {
        temperature_celsius: current
            .temperature
            .or_else(|| Hourly::value_at(&hourly.temperature_2m, slot)),
        wind_speed_mps: current
            .windspeed
            .or_else(|| Hourly::value_at(&hourly.wind_speed_10m, slot)),
        relative_humidity_percent: Hourly::value_at(&hourly.relative_humidity_2m, slot),
        observed_at: current.time,
    })
}

/// Weather source backed by the Open-Meteo forecast API.
///
/// Owns its HTTP client; the client timeout bounds every fetch.
pub struct OpenMeteoClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("safensound/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build weather HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn forecast_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?latitude={}&longitude={}&current_weather=true&hourly={}&windspeed_unit=ms",
            self.base_url, latitude, longitude, HOURLY_FIELDS
        )
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherSnapshot, WeatherError> {
        let url = self.forecast_url(latitude, longitude);
        tracing::debug!("Fetching weather from {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherError::ProviderUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WeatherError::ProviderUnavailable(format!(
                "HTTP error {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| WeatherError::ProviderUnavailable(format!("failed to read body: {}", e)))?;

        parse_forecast(&body)
    }
}
