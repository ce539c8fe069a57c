//! Text rendering of the display state
//!
//! Produces the three HUD sections: "Telemetry Data", "Weather Data" and
//! "Nearest Airports". An absent source shows its recorded failure reason.

use safensound_common::{DisplayState, Reading, TelemetrySnapshot, WeatherSnapshot};

const UNKNOWN: &str = "unknown";

fn optional(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => UNKNOWN.to_string(),
    }
}

pub fn render_telemetry(reading: &Reading<TelemetrySnapshot>) -> String {
    match reading {
        Reading::Available(t) => {
            let battery = match t.battery_percent {
                Some(b) => format!("{:.0}%", b),
                None => UNKNOWN.to_string(),
            };
            format!(
                "Latitude: {:.6}\nLongitude: {:.6}\nAltitude: {:.1} meters\nGround Speed: {:.1} m/s\nBattery: {}\nMode: {}",
                t.latitude, t.longitude, t.altitude_meters, t.ground_speed_mps, battery, t.mode
            )
        }
        Reading::Unavailable(absence) => format!("unavailable: {}", absence),
    }
}

pub fn render_weather(reading: &Reading<WeatherSnapshot>) -> String {
    match reading {
        Reading::Available(w) => {
            let temperature = match (w.temperature_celsius, w.temperature_fahrenheit()) {
                (Some(c), Some(f)) => format!("{:.1} C / {:.1} F", c, f),
                _ => UNKNOWN.to_string(),
            };
            let mut text = format!(
                "Current Temperature: {}\nCurrent Wind Speed: {} m/s\nRelative Humidity: {}",
                temperature,
                optional(w.wind_speed_mps, 1),
                match w.relative_humidity_percent {
                    Some(h) => format!("{:.0}%", h),
                    None => UNKNOWN.to_string(),
                }
            );
            if let Some(observed_at) = &w.observed_at {
                text.push_str(&format!("\nObserved: {}", observed_at));
            }
            text
        }
        Reading::Unavailable(absence) => format!("unavailable: {}", absence),
    }
}

pub fn render_airports(state: &DisplayState) -> String {
    if let Some(absence) = &state.nearest_airports_error {
        return format!("unavailable: {}", absence);
    }

    state
        .nearest_airports
        .iter()
        .map(|n| {
            let code = if n.airport.iata_code.is_empty() {
                "-"
            } else {
                n.airport.iata_code.as_str()
            };
            format!("{} ({}) - {:.2} km", n.airport.name, code, n.distance_km)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the whole HUD as plain text.
pub fn render_text(state: &DisplayState) -> String {
    format!(
        "=== Cycle {} at {} (origin {}) ===\n\nTelemetry Data\n{}\n\nWeather Data\n{}\n\nNearest Airports\n{}\n",
        state.cycle,
        state.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        state.origin,
        render_telemetry(&state.telemetry),
        render_weather(&state.weather),
        render_airports(state),
    )
}
