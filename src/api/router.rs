//! OptiDoc REST router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. `Cache-Control: no-store` → 3. Audit logger → 4. Auth validator

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
/// `cors_origins` lists the browser origins allowed to call the API.
pub fn api_router(ctx: ApiContext, cors_origins: &[String]) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7), and
    // params at the same position must share a name.
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route(
            "/doctors",
            get(endpoints::doctors::list).post(endpoints::doctors::create),
        )
        .route("/appointments", get(endpoints::appointments::list_all))
        .route("/appointments/book", post(endpoints::appointments::book))
        .route(
            "/appointments/doctor/:doctor_id",
            get(endpoints::appointments::for_doctor),
        )
        .route(
            "/appointments/doctor/:doctor_id/date/:date",
            get(endpoints::appointments::booked_times),
        )
        .route(
            "/appointments/doctor/:doctor_id/date/:date/slots",
            get(endpoints::appointments::day_slots),
        )
        .route(
            "/appointments/patient/:patient_id",
            get(endpoints::appointments::for_patient),
        )
        .route(
            "/appointments/:id",
            get(endpoints::appointments::get).delete(endpoints::appointments::delete),
        )
        .route(
            "/appointments/:id/status",
            put(endpoints::appointments::update_status),
        )
        .route(
            "/appointments/:id/status-admin",
            put(endpoints::appointments::update_status_admin),
        )
        .route("/notifications/:id", get(endpoints::notifications::list))
        .route(
            "/notifications/:id/unread-count",
            get(endpoints::notifications::unread_count),
        )
        .route(
            "/notifications/:id/read",
            put(endpoints::notifications::mark_read),
        )
        .route(
            "/notifications/:id/read-all",
            put(endpoints::notifications::mark_all_read),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors_layer(cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::core_state::CoreState;
    use crate::test_support::{self, Clinic, PASSWORD};

    struct Harness {
        _dir: TempDir,
        ctx: ApiContext,
        clinic: Clinic,
    }

    impl Harness {
        fn new() -> Self {
            let (dir, core) = test_support::temp_core();
            let conn = core.open_db().unwrap();
            let clinic = test_support::seed_clinic(&conn);
            Self {
                _dir: dir,
                ctx: ApiContext::new(core, Duration::from_secs(3600)),
                clinic,
            }
        }

        fn core(&self) -> Arc<CoreState> {
            self.ctx.core.clone()
        }

        fn app(&self) -> Router {
            api_router(self.ctx.clone(), &["http://localhost:3000".to_string()])
        }

        fn session(&self, actor: crate::models::Actor) -> String {
            self.ctx.sessions.lock().unwrap().issue(actor)
        }

        fn patient_token(&self) -> String {
            self.session(test_support::actor_for_patient(&self.clinic.patient))
        }

        fn doctor_token(&self) -> String {
            self.session(test_support::actor_for_doctor(&self.clinic.doctor))
        }

        fn admin_token(&self) -> String {
            self.session(test_support::actor_for_admin(&self.clinic.admin))
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let response = self
                .app()
                .oneshot(make_request(method, uri, token, body))
                .await
                .unwrap();
            let status = response.status();
            (status, response_json(response).await)
        }

        async fn book(&self, token: &str, date: &str, time: &str) -> (StatusCode, Value) {
            let body = json!({
                "patientId": self.clinic.patient.id,
                "doctorId": self.clinic.doctor.id,
                "date": date,
                "time": time,
            });
            self.send("POST", "/api/appointments/book", Some(token), Some(body))
                .await
        }
    }

    fn make_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: axum::http::Response<Body>) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 65536)
            .await
            .unwrap();
        if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        }
    }

    const FUTURE_DAY: &str = "2099-03-01";
    const NEXT_DAY: &str = "2099-03-02";

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new();
        let (status, json) = h.send("GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], true);
        assert!(!json["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let h = Harness::new();
        let (status, json) = h.send("GET", "/api/doctors", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "AUTH_REQUIRED");

        let (status, _) = h.send("GET", "/api/doctors", Some("forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn responses_are_not_cached() {
        let h = Harness::new();
        let response = h
            .app()
            .oneshot(make_request("GET", "/api/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.headers()["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn login_issues_usable_token_and_logout_revokes_it() {
        let h = Harness::new();
        let (status, json) = h
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"role": "doctor", "email": "grey@example.com", "password": PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["role"], "doctor");
        assert_eq!(json["user"]["name"], "Dr. Grey");
        let token = json["token"].as_str().unwrap().to_string();

        let (status, json) = h.send("GET", "/api/doctors", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["doctors"].as_array().unwrap().len(), 1);

        let (status, _) = h.send("POST", "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = h.send("GET", "/api/doctors", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_failures_look_identical() {
        let h = Harness::new();
        for body in [
            json!({"role": "patient", "email": "pat@example.com", "password": "wrong-password"}),
            json!({"role": "patient", "email": "nobody@example.com", "password": PASSWORD}),
            // Right credentials, wrong role.
            json!({"role": "admin", "email": "pat@example.com", "password": PASSWORD}),
        ] {
            let (status, json) = h.send("POST", "/api/auth/login", None, Some(body)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(json["code"], "INVALID_CREDENTIALS");
        }
    }

    #[tokio::test]
    async fn register_creates_patient_once() {
        let h = Harness::new();
        let body = json!({
            "name": "Sam Doe",
            "email": "sam@example.com",
            "password": "a-long-password",
        });
        let (status, json) = h
            .send("POST", "/api/auth/register", None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["patient"]["email"], "sam@example.com");
        assert!(json["patient"].get("password").is_none());

        let (status, json) = h.send("POST", "/api/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let h = Harness::new();
        let token = h.patient_token();
        let (status, json) = h
            .send(
                "POST",
                "/api/appointments/book",
                Some(&token),
                Some(json!({"doctorId": "not-a-uuid"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn only_admins_create_doctors() {
        let h = Harness::new();
        let body = json!({
            "name": "Dr. Shepherd",
            "email": "shepherd@example.com",
            "password": "a-long-password",
            "specialty": "Neurology",
        });
        let token = h.patient_token();
        let (status, _) = h
            .send("POST", "/api/doctors", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn booking_a_taken_slot_conflicts() {
        let h = Harness::new();
        let token = h.patient_token();

        let (status, json) = h.book(&token, FUTURE_DAY, "09:00").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["appointment"]["status"], "booked");
        assert_eq!(json["appointment"]["version"], 1);

        let (status, json) = h.book(&token, FUTURE_DAY, "09:00").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "CONFLICT");

        let uri = format!(
            "/api/appointments/doctor/{}/date/{FUTURE_DAY}",
            h.clinic.doctor.id
        );
        let (status, json) = h.send("GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!(["09:00"]));

        let (status, json) = h
            .send("GET", &format!("{uri}/slots"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let grid = json.as_array().unwrap();
        assert_eq!(grid.len(), 48);
        assert_eq!(grid[18], json!({"time": "09:00", "available": false, "booked": true}));
    }

    #[tokio::test]
    async fn booking_notifies_doctor_and_admin() {
        let h = Harness::new();
        let (status, _) = h.book(&h.patient_token(), FUTURE_DAY, "10:00").await;
        assert_eq!(status, StatusCode::CREATED);

        let token = h.doctor_token();
        let uri = format!("/api/notifications/{}", h.clinic.doctor.id);
        let (status, json) = h.send("GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.is_array());
        let inbox = json.as_array().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0]["type"], "appointment_booked");
        assert_eq!(inbox[0]["senderName"], "Pat Lee");

        let uri = format!("/api/notifications/{}/unread-count?role=admin", h.clinic.admin.id);
        let (_, json) = h.send("GET", &uri, Some(&h.admin_token()), None).await;
        assert_eq!(json["count"], 1);
    }

    #[tokio::test]
    async fn doctor_reschedule_round_trip() {
        let h = Harness::new();
        let (_, booked) = h.book(&h.patient_token(), FUTURE_DAY, "09:00").await;
        let id = booked["appointment"]["id"].as_str().unwrap().to_string();

        let (status, json) = h
            .send(
                "PUT",
                &format!("/api/appointments/{id}/status"),
                Some(&h.doctor_token()),
                Some(json!({
                    "status": "delayed",
                    "newDate": NEXT_DAY,
                    "newTime": "14:30",
                    "notes": "Clinic closed in the morning",
                    "doctorId": h.clinic.doctor.id,
                    "version": 1,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["appointment"]["status"], "rescheduled");
        assert_eq!(json["appointment"]["date"], NEXT_DAY);
        assert_eq!(json["appointment"]["time"], "14:30");
        assert_eq!(json["appointment"]["version"], 2);

        // Repeating the same move changes nothing and announces nothing.
        let (status, _) = h
            .send(
                "PUT",
                &format!("/api/appointments/{id}/status"),
                Some(&h.doctor_token()),
                Some(json!({
                    "status": "rescheduled",
                    "newDate": NEXT_DAY,
                    "newTime": "14:30",
                    "doctorId": h.clinic.doctor.id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // The old slot is free again.
        let uri = format!(
            "/api/appointments/doctor/{}/date/{FUTURE_DAY}",
            h.clinic.doctor.id
        );
        let (_, json) = h.send("GET", &uri, Some(&h.patient_token()), None).await;
        assert_eq!(json, json!([]));

        let patient_token = h.patient_token();
        let uri = format!("/api/notifications/{}", h.clinic.patient.id);
        let (_, json) = h.send("GET", &uri, Some(&patient_token), None).await;
        assert!(json.is_array());
        let inbox = json.as_array().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0]["type"], "appointment_delayed");
        assert_eq!(inbox[0]["appointmentDate"], NEXT_DAY);
        assert_eq!(inbox[0]["appointmentTime"], "14:30");

        let (status, json) = h
            .send("PUT", &format!("{uri}/read-all"), Some(&patient_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["updated"], 1);
        let (_, json) = h
            .send("GET", &format!("{uri}/unread-count"), Some(&patient_token), None)
            .await;
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn body_identity_must_match_session() {
        let h = Harness::new();
        let appt = {
            let conn = h.core().open_db().unwrap();
            test_support::seed_appointment(
                &conn,
                h.clinic.patient.id,
                h.clinic.doctor.id,
                FUTURE_DAY,
                "11:00",
            )
        };

        let (status, json) = h
            .send(
                "PUT",
                &format!("/api/appointments/{}/status", appt.id),
                Some(&h.doctor_token()),
                Some(json!({"status": "completed", "doctorId": uuid::Uuid::new_v4()})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], "FORBIDDEN");

        // A doctor cannot use the admin route by claiming an admin id.
        let (status, _) = h
            .send(
                "PUT",
                &format!("/api/appointments/{}/status-admin", appt.id),
                Some(&h.doctor_token()),
                Some(json!({
                    "status": "completed",
                    "adminId": h.clinic.admin.id,
                    "adminName": "Ada Admin",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let h = Harness::new();
        let appt = {
            let conn = h.core().open_db().unwrap();
            test_support::seed_appointment(
                &conn,
                h.clinic.patient.id,
                h.clinic.doctor.id,
                FUTURE_DAY,
                "11:00",
            )
        };

        let (status, json) = h
            .send(
                "PUT",
                &format!("/api/appointments/{}/status-admin", appt.id),
                Some(&h.admin_token()),
                Some(json!({
                    "status": "canceled",
                    "adminId": h.clinic.admin.id,
                    "adminName": "Ada Admin",
                    "version": 7,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "STALE_VERSION");
    }

    #[tokio::test]
    async fn terminal_appointment_rejects_transition() {
        let h = Harness::new();
        let appt = {
            let conn = h.core().open_db().unwrap();
            test_support::seed_appointment(
                &conn,
                h.clinic.patient.id,
                h.clinic.doctor.id,
                FUTURE_DAY,
                "11:00",
            )
        };
        let uri = format!("/api/appointments/{}/status-admin", appt.id);
        let body = json!({"status": "cancelled", "adminId": h.clinic.admin.id});

        let (status, _) = h.send("PUT", &uri, Some(&h.admin_token()), Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = h.send("PUT", &uri, Some(&h.admin_token()), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn inbox_of_another_user_is_forbidden() {
        let h = Harness::new();
        let uri = format!("/api/notifications/{}?role=doctor", h.clinic.doctor.id);
        let (status, _) = h.send("GET", &uri, Some(&h.patient_token()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/notifications/{}?role=surgeon", h.clinic.patient.id);
        let (status, _) = h.send("GET", &uri, Some(&h.patient_token()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_lists_and_deletes() {
        let h = Harness::new();
        let (_, booked) = h.book(&h.admin_token(), FUTURE_DAY, "09:30").await;
        let id = booked["appointment"]["id"].as_str().unwrap().to_string();

        let (status, json) = h.send("GET", "/api/appointments", Some(&h.admin_token()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["appointments"].as_array().unwrap().len(), 1);

        let (status, _) = h.send("GET", "/api/appointments", Some(&h.patient_token()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/appointments/{id}");
        let (status, _) = h.send("DELETE", &uri, Some(&h.admin_token()), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, json) = h.send("GET", &uri, Some(&h.admin_token()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_path_id_is_bad_request() {
        let h = Harness::new();
        let (status, _) = h
            .send("GET", "/api/appointments/not-a-uuid", Some(&h.admin_token()), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
