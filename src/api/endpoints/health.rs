//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub uptime_secs: u64,
}

/// `GET /api/health`: liveness plus a database open check.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let database = match ctx.core.open_db() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not open database");
            false
        }
    };

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: crate::config::APP_VERSION,
        database,
        uptime_secs: ctx.core.uptime_secs(),
    })
}
