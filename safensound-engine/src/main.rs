use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use safensound_common::GeoPoint;
use safensound_engine::airport::load_index;
use safensound_engine::config::{AppConfig, DEFAULT_CONFIG_PATH};
use safensound_engine::engine::{EngineConfig, RefreshEngine, Sources};
use safensound_engine::location::{FixedLocation, IpInfoLocator, LocationProvider};
use safensound_engine::logging;
use safensound_engine::telemetry::UdpVehicleLink;
use safensound_engine::weather::OpenMeteoClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load_or_default(&config_path)?;

    // Initialize logging
    let _logging_guard = logging::init_logging(&config.logging, "safensound", &config.log_level)?;

    tracing::info!("SafeNSound starting (config: {})", config_path);
    config.validate()?;

    // Airport dataset is loaded once and shared read-only by every cycle
    let airports = Arc::new(load_index(&config.airports).await?);

    let locator: Box<dyn LocationProvider> = match (config.location.latitude, config.location.longitude) {
        (Some(lat), Some(lon)) => Box::new(FixedLocation::new(GeoPoint::new(lat, lon))),
        _ => Box::new(IpInfoLocator::new(
            config.location.url.clone(),
            Duration::from_secs(config.location.timeout_secs),
        )?),
    };

    let telemetry = UdpVehicleLink::new(
        config.vehicle.bind_address.clone(),
        Duration::from_millis(config.vehicle.recv_timeout_ms),
    );
    match telemetry.connect().await {
        Ok(addr) => tracing::info!("Listening for vehicle telemetry on {}", addr),
        Err(e) => tracing::warn!("Vehicle link not ready yet: {}", e),
    }

    let weather = OpenMeteoClient::new(
        config.weather.base_url.clone(),
        Duration::from_secs(config.weather.timeout_secs),
    )?;

    let sources = Sources {
        telemetry: Arc::new(telemetry),
        weather: Arc::new(weather),
        airports,
    };
    let engine = RefreshEngine::start(sources, locator.as_ref(), EngineConfig::from(&config)).await?;

    // Display sinks
    if config.display.console {
        tokio::spawn(safensound_display::console::run_console(engine.subscribe()));
    }
    if let Some(path) = &config.display.snapshot_path {
        tokio::spawn(safensound_display::snapshot::run_snapshot_writer(
            engine.subscribe(),
            PathBuf::from(path),
        ));
    }
    if let Some(port) = config.display.http_port {
        let receiver = engine.subscribe();
        tokio::spawn(async move {
            if let Err(e) = safensound_display::http::serve(receiver, port).await {
                tracing::error!("Status endpoint stopped: {:#}", e);
            }
        });
    }

    engine
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!("SafeNSound stopped");
    Ok(())
}
