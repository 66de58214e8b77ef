//! Appointment endpoints: booking, slot lookups, listings and status changes.
//!
//! Status changes act as the session's actor. The `doctorId` / `adminId`
//! a client sends must name that same actor or the request is refused.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::appointment::{self, BookingRequest};
use crate::models::{Actor, Appointment, Role};
use crate::notify::{notify, AppointmentEvent};
use crate::slots::{self, clinic_now, SlotAvailability};
use crate::transition::{self, TransitionRequest};

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub appointment: Appointment,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

/// `POST /api/appointments/book`
pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    let Json(request) = payload?;
    let mut conn = ctx.core.open_db()?;
    let appointment = appointment::book(&mut conn, &actor, &request, clinic_now())?;

    notify(
        &mut conn,
        ctx.core.admin_recipients(),
        &AppointmentEvent::booked(&actor, &appointment),
        ctx.core.email_waker(),
    );

    Ok((StatusCode::CREATED, Json(AppointmentResponse { appointment })))
}

/// `GET /api/appointments/doctor/:doctor_id/date/:date`: taken slot labels.
pub async fn booked_times(
    State(ctx): State<ApiContext>,
    Extension(_actor): Extension<Actor>,
    Path((doctor_id, date)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, ApiError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    let date = slots::parse_date(&date)?;
    let conn = ctx.core.open_db()?;
    let booked = slots::list_booked_times(&conn, &doctor_id, &date)?;
    Ok(Json(booked.into_iter().collect()))
}

/// `GET /api/appointments/doctor/:doctor_id/date/:date/slots`: full day grid.
pub async fn day_slots(
    State(ctx): State<ApiContext>,
    Extension(_actor): Extension<Actor>,
    Path((doctor_id, date)): Path<(String, String)>,
) -> Result<Json<Vec<SlotAvailability>>, ApiError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    let date = slots::parse_date(&date)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(slots::day_availability(&conn, &doctor_id, &date, clinic_now())?))
}

/// `GET /api/appointments/doctor/:doctor_id`
pub async fn for_doctor(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(doctor_id): Path<String>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    let conn = ctx.core.open_db()?;
    let appointments = appointment::list_for_doctor(&conn, &actor, &doctor_id)?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `GET /api/appointments/patient/:patient_id`
pub async fn for_patient(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(patient_id): Path<String>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let conn = ctx.core.open_db()?;
    let appointments = appointment::list_for_patient(&conn, &actor, &patient_id)?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `GET /api/appointments`: admin overview.
pub async fn list_all(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointments = appointment::list_all(&conn, &actor)?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `GET /api/appointments/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let id = parse_id(&id, "appointment")?;
    let conn = ctx.core.open_db()?;
    let appointment = appointment::get(&conn, &actor, &id)?;
    Ok(Json(AppointmentResponse { appointment }))
}

/// `DELETE /api/appointments/:id`: admin removal, no notifications.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "appointment")?;
    let conn = ctx.core.open_db()?;
    appointment::admin_delete(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStatusBody {
    pub status: String,
    pub notes: Option<String>,
    pub new_date: Option<String>,
    pub new_time: Option<String>,
    pub doctor_id: Uuid,
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusBody {
    pub status: String,
    pub notes: Option<String>,
    pub new_date: Option<String>,
    pub new_time: Option<String>,
    pub admin_id: Uuid,
    /// Accepted for client compatibility; the session's name is used.
    #[allow(dead_code)]
    pub admin_name: Option<String>,
    pub version: Option<i64>,
}

/// `PUT /api/appointments/:id/status`: doctor status change.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<DoctorStatusBody>, JsonRejection>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let id = parse_id(&id, "appointment")?;
    let Json(body) = payload?;
    if !actor.is(&body.doctor_id, Role::Doctor) {
        return Err(ApiError::Forbidden("doctorId does not match the signed-in doctor".into()));
    }
    let request = TransitionRequest {
        status: body.status,
        new_date: body.new_date,
        new_time: body.new_time,
        notes: body.notes,
        expected_version: body.version,
    };
    apply_transition(&ctx, &actor, &id, &request)
}

/// `PUT /api/appointments/:id/status-admin`: admin status change.
pub async fn update_status_admin(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<AdminStatusBody>, JsonRejection>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let id = parse_id(&id, "appointment")?;
    let Json(body) = payload?;
    if !actor.is(&body.admin_id, Role::Admin) {
        return Err(ApiError::Forbidden("adminId does not match the signed-in admin".into()));
    }
    let request = TransitionRequest {
        status: body.status,
        new_date: body.new_date,
        new_time: body.new_time,
        notes: body.notes,
        expected_version: body.version,
    };
    apply_transition(&ctx, &actor, &id, &request)
}

fn apply_transition(
    ctx: &ApiContext,
    actor: &Actor,
    id: &Uuid,
    request: &TransitionRequest,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    let outcome = transition::transition(&mut conn, id, actor, request, clinic_now())?;

    notify(
        &mut conn,
        ctx.core.admin_recipients(),
        &AppointmentEvent::transitioned(actor, &outcome),
        ctx.core.email_waker(),
    );

    Ok(Json(AppointmentResponse {
        appointment: outcome.appointment,
    }))
}
