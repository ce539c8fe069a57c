//! HTTP status endpoint
//!
//! `GET /health` answers "OK"; `GET /state` returns the latest published
//! state as JSON, or 503 before the first cycle has completed.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use safensound_common::StateReceiver;
use tower_http::trace::TraceLayer;

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn current_state(State(receiver): State<StateReceiver>) -> Response {
    let latest = receiver.borrow().clone();
    match latest {
        Some(state) => Json(state.as_ref().clone()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "No state published yet").into_response(),
    }
}

pub fn router(receiver: StateReceiver) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/state", get(current_state))
        .layer(TraceLayer::new_for_http())
        .with_state(receiver)
}

/// Serve the status endpoint on `0.0.0.0:port` until the process exits.
pub async fn serve(receiver: StateReceiver, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Status endpoint listening on http://{}", addr);

    axum::serve(listener, router(receiver)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_state;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tokio::sync::watch;
    use tower::ServiceExt;

    async fn get_path(app: Router, path: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let (_tx, rx) = watch::channel(None);
        let (status, body) = get_path(router(rx), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_state_before_and_after_publish() {
        let (tx, rx) = watch::channel(None);

        let (status, _) = get_path(router(rx.clone()), "/state").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        tx.send_replace(Some(sample_state(9)));
        let (status, body) = get_path(router(rx), "/state").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["cycle"], 9);
        assert_eq!(json["origin"]["latitude"], 0.0);
    }
}
