//! Refresh engine
//!
//! Runs one refresh cycle per tick: poll the vehicle, fetch weather at the
//! fixed location and query the nearest airports. Every source failure is
//! folded into the published [`DisplayState`] as an [`Absence`]; a cycle
//! always completes and publishes.
//!
//! Cycles are strictly sequential. The interval is measured from the end of
//! one publish to the start of the next cycle, so a slow cycle delays the
//! next tick instead of overlapping it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use safensound_common::{
    Absence, DisplayState, GeoPoint, NearestAirport, Reading, StateReceiver, TelemetrySnapshot,
    WeatherSnapshot,
};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::airport::AirportIndex;
use crate::config::AppConfig;
use crate::error::StartupError;
use crate::location::{LocationProvider, resolve_with_retries};
use crate::telemetry::{TelemetryError, TelemetrySource};
use crate::weather::{WeatherError, WeatherSource};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub interval: Duration,
    pub nearest_airports: usize,
    /// Upper bound on each source call, on top of the source's own bound
    pub source_timeout: Duration,
    pub location_attempts: u32,
    pub location_retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            nearest_airports: 5,
            source_timeout: Duration::from_secs(3),
            location_attempts: 3,
            location_retry_delay: Duration::from_secs(2),
        }
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            interval: config.refresh_interval(),
            nearest_airports: config.refresh.nearest_airports,
            source_timeout: config.source_timeout(),
            location_attempts: config.startup.location_attempts,
            location_retry_delay: Duration::from_secs(config.startup.retry_delay_secs),
        }
    }
}

/// The collaborators a cycle reads from.
pub struct Sources {
    pub telemetry: Arc<dyn TelemetrySource>,
    pub weather: Arc<dyn WeatherSource>,
    pub airports: Arc<AirportIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Cycling,
}

pub struct RefreshEngine {
    sources: Sources,
    origin: GeoPoint,
    config: EngineConfig,
    publisher: watch::Sender<Option<Arc<DisplayState>>>,
    status: watch::Sender<EngineState>,
    cycle: u64,
}

impl RefreshEngine {
    /// Create an engine for an already resolved location.
    pub fn new(sources: Sources, origin: GeoPoint, config: EngineConfig) -> Self {
        let (publisher, _) = watch::channel(None);
        let (status, _) = watch::channel(EngineState::Idle);
        Self {
            sources,
            origin,
            config,
            publisher,
            status,
            cycle: 0,
        }
    }

    /// Resolve the fixed location, then create the engine.
    ///
    /// Fails with [`StartupError`] when no location can be resolved; the
    /// engine never cycles against an undefined location.
    pub async fn start(
        sources: Sources,
        location: &dyn LocationProvider,
        config: EngineConfig,
    ) -> Result<Self, StartupError> {
        let origin =
            resolve_with_retries(location, config.location_attempts, config.location_retry_delay)
                .await?;

        tracing::info!(
            "Refresh engine ready at {} ({} airports, every {:?})",
            origin,
            sources.airports.len(),
            config.interval
        );

        Ok(Self::new(sources, origin, config))
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Follow the Idle/Cycling state, including while a cycle runs.
    pub fn status(&self) -> watch::Receiver<EngineState> {
        self.status.subscribe()
    }

    pub fn subscribe(&self) -> StateReceiver {
        self.publisher.subscribe()
    }

    /// Most recently published state.
    pub fn latest(&self) -> Option<Arc<DisplayState>> {
        self.publisher.borrow().clone()
    }

    /// Run one full cycle and publish its result.
    ///
    /// Taking `&mut self` keeps cycles from overlapping. Dropping the
    /// returned future before it resolves publishes nothing.
    pub async fn run_cycle(&mut self) -> Arc<DisplayState> {
        self.status.send_replace(EngineState::Cycling);
        let started = Instant::now();
        let cycle = self.cycle + 1;

        let (telemetry, weather) = tokio::join!(self.poll_telemetry(), self.fetch_weather());
        let (nearest_airports, nearest_airports_error) = self.query_airports();

        let state = Arc::new(DisplayState {
            telemetry,
            weather,
            nearest_airports,
            nearest_airports_error,
            origin: self.origin,
            cycle,
            cycle_duration_ms: started.elapsed().as_millis() as u64,
            generated_at: Utc::now(),
        });

        self.publisher.send_replace(Some(state.clone()));
        self.cycle = cycle;
        self.status.send_replace(EngineState::Idle);

        tracing::debug!(
            cycle,
            duration_ms = state.cycle_duration_ms,
            telemetry = state.telemetry.is_available(),
            weather = state.weather.is_available(),
            airports = state.nearest_airports.len(),
            "Published display state"
        );

        state
    }

    /// Cycle until `shutdown` resolves. A cycle still in flight at that
    /// point is abandoned and the previous state stays published.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("Refresh loop started");

        loop {
            let next = self.cycle + 1;
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, abandoning cycle {}", next);
                    break;
                }
                _ = self.run_cycle() => {}
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        self.status.send_replace(EngineState::Idle);
        tracing::info!("Refresh loop stopped after {} cycles", self.cycle);
    }

    async fn poll_telemetry(&self) -> Reading<TelemetrySnapshot> {
        let bound = self.config.source_timeout;
        let result = match timeout(bound, self.sources.telemetry.poll()).await {
            Ok(result) => result,
            Err(_) => Err(TelemetryError::Timeout(bound)),
        };

        match result {
            Ok(snapshot) => Reading::Available(snapshot),
            Err(e) => {
                tracing::warn!("Telemetry unavailable: {}", e);
                Reading::Unavailable(e.into())
            }
        }
    }

    async fn fetch_weather(&self) -> Reading<WeatherSnapshot> {
        let bound = self.config.source_timeout;
        let fetch = self
            .sources
            .weather
            .fetch(self.origin.latitude, self.origin.longitude);

        let result = match timeout(bound, fetch).await {
            Ok(result) => result,
            Err(_) => Err(WeatherError::ProviderUnavailable(format!(
                "no response within {:?}",
                bound
            ))),
        };

        match result {
            Ok(snapshot) => Reading::Available(snapshot),
            Err(e) => {
                tracing::warn!("Weather unavailable: {}", e);
                Reading::Unavailable(e.into())
            }
        }
    }

    fn query_airports(&self) -> (Vec<NearestAirport>, Option<Absence>) {
        match self
            .sources
            .airports
            .nearest(self.origin, self.config.nearest_airports)
        {
            Ok(nearest) => (nearest, None),
            Err(e) => {
                tracing::error!("Nearest-airport query failed: {}", e);
                (Vec::new(), Some(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{FixedLocation, LocationError};
    use crate::weather::OpenMeteoClient;
    use async_trait::async_trait;
    use axum::{Router, http::StatusCode, routing::get};
    use safensound_common::{Airport, FailureKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            latitude: 40.01,
            longitude: -73.02,
            altitude_meters: 120.0,
            ground_speed_mps: 8.5,
            battery_percent: Some(76.0),
            mode: "GUIDED".to_string(),
        }
    }

    struct StubTelemetry {
        fail: bool,
    }

    #[async_trait]
    impl TelemetrySource for StubTelemetry {
        async fn poll(&self) -> Result<TelemetrySnapshot, TelemetryError> {
            if self.fail {
                Err(TelemetryError::LinkUnavailable("connection refused".to_string()))
            } else {
                Ok(snapshot())
            }
        }
    }

    /// Sleeps on every poll and records when each poll started and ended.
    struct SlowTelemetry {
        delay: Duration,
        windows: Mutex<Vec<(Instant, Instant)>>,
    }

    #[async_trait]
    impl TelemetrySource for SlowTelemetry {
        async fn poll(&self) -> Result<TelemetrySnapshot, TelemetryError> {
            let entered = Instant::now();
            tokio::time::sleep(self.delay).await;
            self.windows.lock().unwrap().push((entered, Instant::now()));
            Ok(snapshot())
        }
    }

    /// Answers the first poll, then never answers again.
    struct StallingTelemetry {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TelemetrySource for StallingTelemetry {
        async fn poll(&self) -> Result<TelemetrySnapshot, TelemetryError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(snapshot())
            } else {
                std::future::pending().await
            }
        }
    }

    struct StubWeather {
        fail: bool,
    }

    #[async_trait]
    impl WeatherSource for StubWeather {
        async fn fetch(&self, _latitude: f64, _longitude: f64) -> Result<WeatherSnapshot, WeatherError> {
            if self.fail {
                Err(WeatherError::MalformedResponse("expected a JSON object".to_string()))
            } else {
                Ok(WeatherSnapshot {
                    temperature_celsius: Some(18.0),
                    wind_speed_mps: Some(3.5),
                    relative_humidity_percent: None,
                    observed_at: Some("2026-10-19T14:00".to_string()),
                })
            }
        }
    }

    struct NoLocation;

    #[async_trait]
    impl LocationProvider for NoLocation {
        async fn resolve_location(&self) -> Result<GeoPoint, LocationError> {
            Err(LocationError::Unavailable("lookup refused".to_string()))
        }
    }

    fn airports() -> Arc<AirportIndex> {
        Arc::new(
            AirportIndex::build(vec![
                Airport::new("Test Airfield", "TST", 40.0, -73.0),
                Airport::new("Far Field", "FAR", 45.0, -80.0),
            ])
            .unwrap(),
        )
    }

    fn sources(telemetry: impl TelemetrySource + 'static, weather: impl WeatherSource + 'static) -> Sources {
        Sources {
            telemetry: Arc::new(telemetry),
            weather: Arc::new(weather),
            airports: airports(),
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            interval: Duration::from_millis(10),
            source_timeout: Duration::from_millis(200),
            location_retry_delay: Duration::from_millis(1),
            ..EngineConfig::default()
        }
    }

    const ORIGIN: GeoPoint = GeoPoint {
        latitude: 40.0,
        longitude: -73.1,
    };

    #[tokio::test]
    async fn test_telemetry_failure_is_isolated() {
        let mut engine = RefreshEngine::new(
            sources(StubTelemetry { fail: true }, StubWeather { fail: false }),
            ORIGIN,
            config(),
        );

        let state = engine.run_cycle().await;
        let absence = state.telemetry.absence().unwrap();
        assert_eq!(absence.kind, FailureKind::LinkUnavailable);
        assert!(absence.message.contains("connection refused"));

        assert_eq!(state.weather.value().unwrap().temperature_celsius, Some(18.0));
        assert_eq!(state.nearest_airports.len(), 2);
        assert_eq!(state.nearest_airports[0].airport.iata_code, "TST");
        assert!(state.nearest_airports_error.is_none());
    }

    #[tokio::test]
    async fn test_weather_failure_is_isolated() {
        let mut engine = RefreshEngine::new(
            sources(StubTelemetry { fail: false }, StubWeather { fail: true }),
            ORIGIN,
            config(),
        );

        let state = engine.run_cycle().await;
        assert_eq!(state.telemetry.value().unwrap().mode, "GUIDED");
        assert_eq!(
            state.weather.absence().unwrap().kind,
            FailureKind::MalformedResponse
        );
        assert_eq!(state.nearest_airports[0].airport.iata_code, "TST");
        assert!((state.nearest_airports[0].distance_km - 8.518).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_slow_telemetry_times_out_within_bound() {
        let slow = SlowTelemetry {
            delay: Duration::from_secs(10),
            windows: Mutex::new(Vec::new()),
        };
        let mut engine = RefreshEngine::new(sources(slow, StubWeather { fail: false }), ORIGIN, config());

        let started = Instant::now();
        let state = engine.run_cycle().await;
        assert!(started.elapsed() < Duration::from_secs(1));

        let absence = state.telemetry.absence().unwrap();
        assert_eq!(absence.kind, FailureKind::Timeout);
        assert!(state.weather.is_available());
    }

    #[tokio::test]
    async fn test_weather_http_500_is_recorded() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/v1/forecast",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let weather =
            OpenMeteoClient::new(format!("http://{}/v1/forecast", addr), Duration::from_secs(2)).unwrap();
        let mut engine = RefreshEngine::new(sources(StubTelemetry { fail: false }, weather), ORIGIN, config());

        let state = engine.run_cycle().await;
        assert_eq!(
            state.weather.absence().unwrap().kind,
            FailureKind::ProviderUnavailable
        );
        assert!(state.telemetry.is_available());
    }

    #[tokio::test]
    async fn test_invalid_origin_surfaces_airport_error() {
        let mut engine = RefreshEngine::new(
            sources(StubTelemetry { fail: false }, StubWeather { fail: false }),
            GeoPoint::new(95.0, 0.0),
            config(),
        );

        let state = engine.run_cycle().await;
        assert!(state.nearest_airports.is_empty());
        assert_eq!(
            state.nearest_airports_error.as_ref().unwrap().kind,
            FailureKind::InvalidQuery
        );
        assert!(state.telemetry.is_available());
    }

    #[tokio::test]
    async fn test_most_recent_state_wins() {
        let mut engine = RefreshEngine::new(
            sources(StubTelemetry { fail: false }, StubWeather { fail: false }),
            ORIGIN,
            config(),
        );
        let mut receiver = engine.subscribe();
        assert!(receiver.borrow().is_none());

        engine.run_cycle().await;
        engine.run_cycle().await;

        assert!(receiver.has_changed().unwrap());
        let published = receiver.borrow_and_update().clone().unwrap();
        assert_eq!(published.cycle, 2);
        assert_eq!(engine.latest().unwrap().cycle, 2);
    }

    #[tokio::test]
    async fn test_cycles_never_overlap() {
        let slow = Arc::new(SlowTelemetry {
            delay: Duration::from_millis(50),
            windows: Mutex::new(Vec::new()),
        });
        let sources = Sources {
            telemetry: slow.clone(),
            weather: Arc::new(StubWeather { fail: false }),
            airports: airports(),
        };
        let engine = RefreshEngine::new(sources, ORIGIN, config());
        let receiver = engine.subscribe();

        engine.run(tokio::time::sleep(Duration::from_millis(400))).await;

        let windows = slow.windows.lock().unwrap().clone();
        assert!(windows.len() >= 2, "only {} cycles ran", windows.len());
        for pair in windows.windows(2) {
            let (_, previous_exit) = pair[0];
            let (next_entry, _) = pair[1];
            assert!(next_entry >= previous_exit, "cycles overlapped");
        }

        let last = receiver.borrow().clone().unwrap();
        assert!(last.cycle as usize >= windows.len() - 1);
    }

    #[tokio::test]
    async fn test_interval_runs_from_end_of_publish() {
        // Each cycle takes ~60ms; a start-to-start schedule would leave only
        // ~40ms between one cycle's end and the next cycle's start.
        let slow = Arc::new(SlowTelemetry {
            delay: Duration::from_millis(60),
            windows: Mutex::new(Vec::new()),
        });
        let sources = Sources {
            telemetry: slow.clone(),
            weather: Arc::new(StubWeather { fail: false }),
            airports: airports(),
        };
        let interval = Duration::from_millis(100);
        let config = EngineConfig {
            interval,
            ..config()
        };
        let engine = RefreshEngine::new(sources, ORIGIN, config);

        engine.run(tokio::time::sleep(Duration::from_millis(600))).await;

        // A poll ends before its cycle publishes, so the gap from a poll's
        // end to the next poll's start bounds the publish-to-start gap.
        let windows = slow.windows.lock().unwrap().clone();
        assert!(windows.len() >= 2, "only {} cycles ran", windows.len());
        for pair in windows.windows(2) {
            let (_, previous_exit) = pair[0];
            let (next_entry, _) = pair[1];
            let gap = next_entry.duration_since(previous_exit);
            assert!(gap >= interval, "next cycle started {:?} after the previous one ended", gap);
        }
    }

    #[tokio::test]
    async fn test_status_reports_cycling_while_in_flight() {
        let slow = SlowTelemetry {
            delay: Duration::from_secs(10),
            windows: Mutex::new(Vec::new()),
        };
        let engine = RefreshEngine::new(sources(slow, StubWeather { fail: false }), ORIGIN, config());
        let mut status = engine.status();
        assert_eq!(*status.borrow(), EngineState::Idle);

        let task = tokio::spawn(engine.run(tokio::time::sleep(Duration::from_millis(100))));
        status
            .wait_for(|state| *state == EngineState::Cycling)
            .await
            .unwrap();

        task.await.unwrap();
        assert_eq!(*status.borrow(), EngineState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_cycle() {
        let telemetry = StallingTelemetry {
            calls: AtomicU32::new(0),
        };
        let config = EngineConfig {
            source_timeout: Duration::from_secs(30),
            ..config()
        };
        let engine = RefreshEngine::new(sources(telemetry, StubWeather { fail: false }), ORIGIN, config);
        let receiver = engine.subscribe();

        engine.run(tokio::time::sleep(Duration::from_millis(200))).await;

        let last = receiver.borrow().clone().unwrap();
        assert_eq!(last.cycle, 1);
        assert!(last.telemetry.is_available());
    }

    #[tokio::test]
    async fn test_start_resolves_location() {
        let engine = RefreshEngine::start(
            sources(StubTelemetry { fail: false }, StubWeather { fail: false }),
            &FixedLocation::new(GeoPoint::new(0.0, 0.0)),
            config(),
        )
        .await
        .unwrap();
        assert_eq!(engine.origin(), GeoPoint::new(0.0, 0.0));
        assert!(engine.latest().is_none());
    }

    #[tokio::test]
    async fn test_start_fails_without_location() {
        let result = RefreshEngine::start(
            sources(StubTelemetry { fail: false }, StubWeather { fail: false }),
            &NoLocation,
            config(),
        )
        .await;
        assert!(matches!(result, Err(StartupError::Location(_))));
    }
}
