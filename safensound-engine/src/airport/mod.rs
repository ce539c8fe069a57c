//! Airport dataset and nearest-airport queries

pub mod dataset;
mod index;

pub use dataset::{DatasetError, load_or_download, parse_openflights};
pub use index::{AirportIndex, AirportIndexError, haversine_km};

use crate::config::AirportsConfig;
use crate::error::StartupError;

/// Load the configured dataset and build the index. Any failure here is
/// fatal to startup.
pub async fn load_index(config: &AirportsConfig) -> Result<AirportIndex, StartupError> {
    let records = load_or_download(&config.path, &config.url, config.download_if_missing).await?;
    Ok(AirportIndex::build(records)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airports_config(path: &std::path::Path) -> AirportsConfig {
        AirportsConfig {
            path: path.display().to_string(),
            url: "http://127.0.0.1:9/airports.dat".to_string(),
            download_if_missing: false,
        }
    }

    #[tokio::test]
    async fn test_empty_dataset_is_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airports.dat");
        std::fs::write(&path, "9,\"Short Row\"\n").unwrap();

        let result = load_index(&airports_config(&path)).await;
        assert!(matches!(
            result,
            Err(StartupError::Dataset(AirportIndexError::InvalidDataset(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_dataset_is_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_index(&airports_config(&dir.path().join("missing.dat"))).await;
        assert!(matches!(result, Err(StartupError::DatasetLoad(DatasetError::Io { .. }))));
    }

    #[tokio::test]
    async fn test_load_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airports.dat");
        std::fs::write(
            &path,
            "1,\"Test Airfield\",\"Testville\",\"Nowhere\",\"TST\",\"KTST\",40.0,-73.0,10,-5,\"A\",\"America/New_York\",\"airport\",\"OurAirports\"\n",
        )
        .unwrap();

        let index = load_index(&airports_config(&path)).await.unwrap();
        assert_eq!(index.len(), 1);
    }
}
