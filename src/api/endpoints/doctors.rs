//! Doctor directory endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::{self, NewDoctor};
use crate::db::repository;
use crate::models::{Actor, Doctor, Role};

#[derive(Serialize)]
pub struct DoctorsResponse {
    pub doctors: Vec<Doctor>,
}

/// `GET /api/doctors`: every doctor, for the booking picker.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_actor): Extension<Actor>,
) -> Result<Json<DoctorsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctors = repository::list_doctors(&conn)?;
    Ok(Json(DoctorsResponse { doctors }))
}

#[derive(Serialize)]
pub struct DoctorResponse {
    pub doctor: Doctor,
}

/// `POST /api/doctors`: admin creates a doctor account.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<NewDoctor>, JsonRejection>,
) -> Result<(StatusCode, Json<DoctorResponse>), ApiError> {
    if actor.role != Role::Admin {
        return Err(ApiError::Forbidden("only admins create doctor accounts".into()));
    }
    let Json(new) = payload?;
    let core = ctx.core.clone();
    let doctor = run_blocking(move || {
        let conn = core.open_db()?;
        Ok(auth::create_doctor(&conn, &new)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(DoctorResponse { doctor })))
}
