//! Account endpoints: registration and bearer sessions.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::middleware::auth::bearer_token;
use crate::api::types::ApiContext;
use crate::auth::{self, NewPatient};
use crate::models::{Actor, Patient, Role};

#[derive(Serialize)]
pub struct RegisterResponse {
    pub patient: Patient,
}

/// `POST /api/auth/register`: patient self-registration.
pub async fn register(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NewPatient>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(new) = payload?;
    let core = ctx.core.clone();
    let patient = run_blocking(move || {
        let conn = core.open_db()?;
        Ok(auth::register_patient(&conn, &new)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { patient })))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub role: Role,
    pub email: String,
    pub password: Zeroizing<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in_secs: u64,
    pub user: Actor,
}

/// `POST /api/auth/login`: exchange credentials for a bearer token.
pub async fn login(
    State(ctx): State<ApiContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;
    let core = ctx.core.clone();
    let actor = run_blocking(move || {
        let conn = core.open_db()?;
        Ok(auth::login(&conn, req.role, req.email.trim(), &req.password)?)
    })
    .await?;

    let (token, ttl) = {
        let mut sessions = ctx
            .sessions
            .lock()
            .map_err(|_| ApiError::Internal("session lock".into()))?;
        (sessions.issue(actor.clone()), sessions.ttl())
    };
    tracing::info!(actor_id = %actor.id, role = %actor.role, "Session started");

    Ok(Json(LoginResponse {
        token,
        expires_in_secs: ttl.as_secs(),
        user: actor,
    }))
}

/// `POST /api/auth/logout`: revoke the presented token.
pub async fn logout(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    let mut sessions = ctx
        .sessions
        .lock()
        .map_err(|_| ApiError::Internal("session lock".into()))?;
    sessions.revoke(token);
    Ok(StatusCode::NO_CONTENT)
}
