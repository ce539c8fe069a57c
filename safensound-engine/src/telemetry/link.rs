//! UDP vehicle link
//!
//! Listens on a UDP address for text telemetry frames:
//!
//! ```text
//! TLM,<lat>,<lon>,<alt_m>,<groundspeed_mps>,<battery_pct|->,<mode>
//! ```
//!
//! The socket is bound on first use and rebound after a socket error, so a
//! link that was unavailable at startup can come up later.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use safensound_common::{GeoPoint, TelemetrySnapshot};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{TelemetryError, TelemetrySource};

/// Maximum frame size we expect.
const MAX_FRAME_SIZE: usize = 1024;

const FRAME_TAG: &str = "TLM";
const FRAME_FIELDS: usize = 7;

/// Parse one telemetry frame.
pub fn parse_frame(data: &[u8]) -> Result<TelemetrySnapshot, TelemetryError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| TelemetryError::MalformedTelemetry("frame is not valid UTF-8".to_string()))?;

    let parts: Vec<&str> = text.trim().split(',').map(str::trim).collect();
    if parts.first() != Some(&FRAME_TAG) {
        return Err(TelemetryError::MalformedTelemetry(format!(
            "unexpected frame tag: {:?}",
            parts.first().unwrap_or(&"")
        )));
    }
    if parts.len() != FRAME_FIELDS {
        return Err(TelemetryError::MalformedTelemetry(format!(
            "expected {} fields, got {}",
            FRAME_FIELDS,
            parts.len()
        )));
    }

    let latitude = number(parts[1], "latitude")?;
    let longitude = number(parts[2], "longitude")?;
    if !GeoPoint::new(latitude, longitude).is_valid() {
        return Err(TelemetryError::MalformedTelemetry(format!(
            "position ({}, {}) out of range",
            latitude, longitude
        )));
    }

    let battery_percent = match parts[5] {
        "-" | "" => None,
        raw => Some(number(raw, "battery")?),
    };

    let mode = parts[6];
    if mode.is_empty() {
        return Err(TelemetryError::MalformedTelemetry("empty flight mode".to_string()));
    }

    Ok(TelemetrySnapshot {
        latitude,
        longitude,
        altitude_meters: number(parts[3], "altitude")?,
        ground_speed_mps: number(parts[4], "ground speed")?,
        battery_percent,
        mode: mode.to_string(),
    })
}

fn number(raw: &str, field: &str) -> Result<f64, TelemetryError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TelemetryError::MalformedTelemetry(format!("{} is not a number: {:?}", field, raw)))
}

/// Vehicle link over UDP.
///
/// Owns its socket; nothing else in the process touches it.
pub struct UdpVehicleLink {
    bind_address: String,
    recv_timeout: Duration,
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpVehicleLink {
    pub fn new(bind_address: impl Into<String>, recv_timeout: Duration) -> Self {
        Self {
            bind_address: bind_address.into(),
            recv_timeout,
            socket: Mutex::new(None),
        }
    }

    /// Bind the socket now instead of on the first poll.
    ///
    /// Returns the bound local address.
    pub async fn connect(&self) -> Result<SocketAddr, TelemetryError> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            *guard = Some(self.bind().await?);
        }

        let Some(socket) = guard.as_ref() else {
            return Err(TelemetryError::LinkUnavailable("socket not bound".to_string()));
        };
        socket
            .local_addr()
            .map_err(|e| TelemetryError::LinkUnavailable(e.to_string()))
    }

    async fn bind(&self) -> Result<UdpSocket, TelemetryError> {
        let socket = UdpSocket::bind(&self.bind_address).await.map_err(|e| {
            TelemetryError::LinkUnavailable(format!("cannot bind {}: {}", self.bind_address, e))
        })?;

        info!(
            bind_address = %self.bind_address,
            local_addr = ?socket.local_addr().ok(),
            "Vehicle link listening"
        );
        Ok(socket)
    }

    /// Wait for a frame, then drain anything queued behind it so the caller
    /// gets the newest one.
    async fn receive_latest(socket: &UdpSocket, recv_timeout: Duration) -> Result<Vec<u8>, TelemetryError> {
        // One spare byte so an oversized datagram is detectable
        let mut buffer = [0u8; MAX_FRAME_SIZE + 1];

        let len = match tokio::time::timeout(recv_timeout, socket.recv(&mut buffer)).await {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => return Err(TelemetryError::LinkUnavailable(e.to_string())),
            Err(_) => return Err(TelemetryError::Timeout(recv_timeout)),
        };
        let mut latest = buffer[..len].to_vec();
        let mut dropped = 0;

        loop {
            match socket.try_recv(&mut buffer) {
                Ok(len) => {
                    latest = buffer[..len].to_vec();
                    dropped += 1;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Error draining vehicle link socket: {}", e);
                    break;
                }
            }
        }

        if dropped > 0 {
            debug!(dropped, "Skipped stale telemetry frames");
        }

        if latest.len() > MAX_FRAME_SIZE {
            return Err(TelemetryError::MalformedTelemetry(format!(
                "frame exceeds {} bytes",
                MAX_FRAME_SIZE
            )));
        }

        Ok(latest)
    }
}

#[async_trait]
impl TelemetrySource for UdpVehicleLink {
    async fn poll(&self) -> Result<TelemetrySnapshot, TelemetryError> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            *guard = Some(self.bind().await?);
        }

        let received = match guard.as_ref() {
            Some(socket) => Self::receive_latest(socket, self.recv_timeout).await,
            None => Err(TelemetryError::LinkUnavailable("socket not bound".to_string())),
        };

        if let Err(TelemetryError::LinkUnavailable(reason)) = &received {
            warn!("Vehicle link socket failed, will rebind: {}", reason);
            *guard = None;
        }

        parse_frame(&received?)
    }
}
