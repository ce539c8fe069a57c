//! OpenFlights airport dataset loader
//!
//! Reads the headerless `airports.dat` CSV published by OpenFlights
//! (https://github.com/jpatokal/openflights) into [`Airport`] records.
//! Rows without usable coordinates are dropped here, so the index only
//! ever sees valid locations.

use std::path::Path;
use std::time::Duration;

use safensound_common::Airport;

/// Column positions in `airports.dat`
const COL_NAME: usize = 1;
const COL_IATA: usize = 4;
const COL_LATITUDE: usize = 6;
const COL_LONGITUDE: usize = 7;

/// OpenFlights marker for a missing value
const NULL_MARKER: &str = "\\N";

const DOWNLOAD_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read airport dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to download airport dataset: {0}")]
    Download(String),
}

/// Parse OpenFlights CSV content. Unusable rows are skipped, never fatal.
pub fn parse_openflights(content: &[u8]) -> Vec<Airport> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .escape(Some(b'\\'))
        .from_reader(content);

    let mut airports = Vec::new();
    let mut row_count = 0;
    let mut skipped = 0;

    for result in reader.records() {
        row_count += 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                skipped += 1;
                tracing::debug!("Error parsing airport row {}: {}", row_count, e);
                continue;
            }
        };

        match parse_record(&record) {
            Some(airport) => airports.push(airport),
            None => {
                skipped += 1;
                tracing::debug!("Skipping airport row {} without usable coordinates", row_count);
            }
        }
    }

    tracing::debug!(
        "Processed {} airport rows, {} kept, {} skipped",
        row_count,
        airports.len(),
        skipped
    );

    airports
}

fn parse_record(record: &csv::StringRecord) -> Option<Airport> {
    let name = record.get(COL_NAME)?.trim();
    let latitude: f64 = record.get(COL_LATITUDE)?.trim().parse().ok()?;
    let longitude: f64 = record.get(COL_LONGITUDE)?.trim().parse().ok()?;

    let airport = Airport::new(
        name,
        normalize_code(record.get(COL_IATA).unwrap_or_default()),
        latitude,
        longitude,
    );

    airport.location().is_valid().then_some(airport)
}

fn normalize_code(raw: &str) -> String {
    let code = raw.trim();
    if code == NULL_MARKER {
        String::new()
    } else {
        code.to_string()
    }
}

/// Load and parse a local `airports.dat`.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Vec<Airport>, DatasetError> {
    let path = path.as_ref();
    tracing::info!("Loading airport dataset from: {}", path.display());

    let content = tokio::fs::read(path).await.map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let airports = parse_openflights(&content);
    tracing::info!("Loaded {} airports from {}", airports.len(), path.display());

    Ok(airports)
}

/// Download the dataset into `path`.
pub async fn download_to_path(url: &str, path: impl AsRef<Path>) -> Result<(), DatasetError> {
    let path = path.as_ref();
    tracing::info!("Downloading airport dataset from {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECONDS))
        .build()
        .map_err(|e| DatasetError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DatasetError::Download(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DatasetError::Download(format!("HTTP error {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DatasetError::Download(e.to_string()))?;

    let io_err = |e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, &bytes).await.map_err(io_err)?;

    tracing::info!("Saved {} bytes of airport data to {}", bytes.len(), path.display());
    Ok(())
}

/// Load the dataset from `path`, fetching it from `url` first when the file
/// is missing and downloading is allowed.
pub async fn load_or_download(
    path: impl AsRef<Path>,
    url: &str,
    download_if_missing: bool,
) -> Result<Vec<Airport>, DatasetError> {
    let path = path.as_ref();

    if !path.exists() && download_if_missing {
        tracing::info!("Airport dataset {} not found locally", path.display());
        download_to_path(url, path).await?;
    }

    load_from_path(path).await
}
