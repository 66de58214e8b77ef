//! Notification inbox endpoints.
//!
//! `role` in the query selects which inbox of `:id` is meant; it defaults
//! to the signed-in actor's role.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::inbox;
use crate::models::{Actor, Notification, Role};

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: Option<String>,
}

impl RoleQuery {
    fn resolve(&self, actor: &Actor) -> Result<Role, ApiError> {
        match self.role.as_deref() {
            None => Ok(actor.role),
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("unknown role '{raw}'"))),
        }
    }
}

/// `GET /api/notifications/:id?role=`: bare array, newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<String>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let role = query.resolve(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(inbox::list(&conn, &actor, &user_id, role)?))
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// `GET /api/notifications/:id/unread-count?role=`
pub async fn unread_count(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<String>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let role = query.resolve(&actor)?;
    let conn = ctx.core.open_db()?;
    let count = inbox::unread_count(&conn, &actor, &user_id, role)?;
    Ok(Json(UnreadCountResponse { count }))
}

/// `PUT /api/notifications/:id/read`
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "notification")?;
    let conn = ctx.core.open_db()?;
    inbox::mark_read(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// `PUT /api/notifications/:id/read-all?role=`
pub async fn mark_all_read(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<String>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let role = query.resolve(&actor)?;
    let conn = ctx.core.open_db()?;
    let updated = inbox::mark_all_read(&conn, &actor, &user_id, role)?;
    Ok(Json(MarkAllReadResponse { updated }))
}
