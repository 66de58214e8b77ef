//! Access logging middleware.
//!
//! Logs every API request with method, path, status, latency and, for
//! authenticated routes, the acting user.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::models::Actor;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;
    match response.extensions().get::<Actor>() {
        Some(actor) => tracing::info!(
            %method,
            path,
            status,
            latency_ms,
            actor_id = %actor.id,
            actor_role = %actor.role,
            "API request"
        ),
        None => tracing::info!(%method, path, status, latency_ms, "API request"),
    }

    response
}
