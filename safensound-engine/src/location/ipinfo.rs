//! IP geolocation via ipinfo.io

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use safensound_common::GeoPoint;
use serde::Deserialize;

use super::{LocationError, LocationProvider};

pub const DEFAULT_IPINFO_URL: &str = "https://ipinfo.io/json";

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    /// "lat,lon"
    loc: Option<String>,
}

/// Parse the ipinfo JSON body into a location.
pub fn parse_ipinfo(body: &[u8]) -> Result<GeoPoint, LocationError> {
    let response: IpInfoResponse = serde_json::from_slice(body)
        .map_err(|e| LocationError::Unavailable(format!("invalid ipinfo response: {}", e)))?;

    let loc = response
        .loc
        .ok_or_else(|| LocationError::Unavailable("ipinfo response has no 'loc' field".to_string()))?;

    let (lat, lon) = loc
        .split_once(',')
        .ok_or_else(|| LocationError::Unavailable(format!("unexpected 'loc' format: {:?}", loc)))?;

    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| LocationError::Unavailable(format!("unexpected 'loc' format: {:?}", loc)))
    };
    let point = GeoPoint::new(parse(lat)?, parse(lon)?);

    if !point.is_valid() {
        return Err(LocationError::Unavailable(format!("location {} is out of range", point)));
    }
    Ok(point)
}

/// Location provider asking ipinfo.io where this machine's IP is.
pub struct IpInfoLocator {
    http: reqwest::Client,
    url: String,
}

impl IpInfoLocator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build geolocation HTTP client")?;

        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl LocationProvider for IpInfoLocator {
    async fn resolve_location(&self) -> Result<GeoPoint, LocationError> {
        tracing::info!("Resolving location from {}", self.url);

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LocationError::Unavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(LocationError::Unavailable(format!(
                "HTTP error {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LocationError::Unavailable(format!("failed to read body: {}", e)))?;

        parse_ipinfo(&body)
    }
}
