//! Nearest-airport index over the immutable airport dataset.

use std::cmp::Ordering;

use safensound_common::{Absence, Airport, FailureKind, GeoPoint, NearestAirport};

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Error type for airport index operations.
#[derive(Debug, thiserror::Error)]
pub enum AirportIndexError {
    #[error("Invalid airport dataset: {0}")]
    InvalidDataset(String),
    #[error("Invalid nearest-airport query: {0}")]
    InvalidQuery(String),
}

impl AirportIndexError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AirportIndexError::InvalidDataset(_) => FailureKind::InvalidDataset,
            AirportIndexError::InvalidQuery(_) => FailureKind::InvalidQuery,
        }
    }
}

impl From<AirportIndexError> for Absence {
    fn from(e: AirportIndexError) -> Self {
        Absence::new(e.kind(), e.to_string())
    }
}

/// Great-circle distance between two points in kilometres (haversine).
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let from_lat = from.latitude.to_radians();
    let to_lat = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + from_lat.cos() * to_lat.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Read-only index answering "k nearest airports to a point".
///
/// Queries are a full scan with a partial selection, which is fast enough
/// for the ~8k airports of the OpenFlights dataset. Airports at equal
/// distance come back in dataset order.
#[derive(Debug)]
pub struct AirportIndex {
    airports: Vec<Airport>,
}

impl AirportIndex {
    /// Build an index from an already-parsed dataset.
    pub fn build(records: Vec<Airport>) -> Result<Self, AirportIndexError> {
        if records.is_empty() {
            return Err(AirportIndexError::InvalidDataset(
                "dataset contains no airports".to_string(),
            ));
        }

        if let Some(bad) = records.iter().find(|a| !a.location().is_valid()) {
            return Err(AirportIndexError::InvalidDataset(format!(
                "airport '{}' has out-of-range coordinates {}",
                bad.name,
                bad.location()
            )));
        }

        tracing::info!(count = records.len(), "Built airport index");

        Ok(Self { airports: records })
    }

    /// Return up to `k` airports closest to `origin`, nearest first.
    pub fn nearest(&self, origin: GeoPoint, k: usize) -> Result<Vec<NearestAirport>, AirportIndexError> {
        if k == 0 {
            return Err(AirportIndexError::InvalidQuery(
                "k must be at least 1".to_string(),
            ));
        }
        if !origin.is_valid() {
            return Err(AirportIndexError::InvalidQuery(format!(
                "origin {} is outside the valid coordinate range",
                origin
            )));
        }

        let mut ranked: Vec<(usize, f64)> = self
            .airports
            .iter()
            .enumerate()
            .map(|(i, airport)| (i, haversine_km(origin, airport.location())))
            .collect();

        // Dataset position breaks ties, which keeps the ordering total and stable.
        let by_distance = |a: &(usize, f64), b: &(usize, f64)| -> Ordering {
            a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
        };

        if k < ranked.len() {
            ranked.select_nth_unstable_by(k - 1, by_distance);
            ranked.truncate(k);
        }
        ranked.sort_unstable_by(by_distance);

        Ok(ranked
            .into_iter()
            .map(|(i, distance_km)| NearestAirport {
                airport: self.airports[i].clone(),
                distance_km,
            })
            .collect())
    }

    /// Returns the number of airports in the index.
    pub fn len(&self) -> usize {
        self.airports.len()
    }

    /// Always false for a built index.
    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }
}
