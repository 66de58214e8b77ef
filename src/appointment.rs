//! Appointment Store: booking and read access.
//!
//! Booking runs its slot check and insert inside one `BEGIN IMMEDIATE`
//! transaction, so two concurrent bookings for the same doctor, date and
//! time serialize on the write lock and the loser sees the winner's row.
//! The partial unique index on live slots backs this up at the schema level.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{repository, timestamp_now};
use crate::error::WorkflowError;
use crate::models::{Actor, Appointment, AppointmentStatus, Role};
use crate::slots::{ensure_not_past, parse_date, parse_slot};

// ─── Types ────────────────────────────────────────────────────────────────────

/// Request to book a new appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: String, // YYYY-MM-DD
    pub time: String, // HH:MM slot label
}

// ─── Booking ──────────────────────────────────────────────────────────────────

/// Book a slot. Only the patient themself or an admin may book.
pub fn book(
    conn: &mut Connection,
    actor: &Actor,
    request: &BookingRequest,
    now: NaiveDateTime,
) -> Result<Appointment, WorkflowError> {
    match actor.role {
        Role::Patient if actor.id == request.patient_id => {}
        Role::Admin => {}
        _ => {
            return Err(WorkflowError::forbidden(
                "appointments are booked by the patient or an admin",
            ))
        }
    }

    let date = parse_date(&request.date)?;
    let (time, label) = parse_slot(&request.time)?;
    ensure_not_past(date, time, now)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if repository::get_patient(&tx, &request.patient_id)?.is_none() {
        return Err(WorkflowError::not_found("Patient", request.patient_id));
    }
    let doctor = repository::get_doctor(&tx, &request.doctor_id)?
        .ok_or_else(|| WorkflowError::not_found("Doctor", request.doctor_id))?;
    if !doctor.available {
        return Err(WorkflowError::validation(format!(
            "{} is not accepting appointments",
            doctor.name
        )));
    }

    if let Some(holder) = repository::find_slot_holder(&tx, &doctor.id, &date, &label, None)? {
        tracing::info!(
            doctor_id = %doctor.id,
            date = %date,
            time = %label,
            holder = %holder,
            "Booking rejected: slot taken"
        );
        return Err(WorkflowError::Conflict(format!(
            "{} is already booked at {date} {label}",
            doctor.name
        )));
    }

    let stamp = timestamp_now();
    let appt = Appointment {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        doctor_id: doctor.id,
        date,
        time: label,
        status: AppointmentStatus::Booked,
        notes: None,
        version: 1,
        created_at: stamp.clone(),
        updated_at: stamp,
    };
    repository::insert_appointment(&tx, &appt)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appt.id,
        doctor_id = %appt.doctor_id,
        patient_id = %appt.patient_id,
        slot = %appt.schedule_label(),
        "Appointment booked"
    );
    Ok(appt)
}

// ─── Read access ──────────────────────────────────────────────────────────────

fn can_view(actor: &Actor, appt: &Appointment) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Doctor => actor.id == appt.doctor_id,
        Role::Patient => actor.id == appt.patient_id,
    }
}

/// Fetch one appointment the actor takes part in (admins see all).
pub fn get(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<Appointment, WorkflowError> {
    let appt = repository::get_appointment(conn, id)?
        .ok_or_else(|| WorkflowError::not_found("Appointment", id))?;
    if !can_view(actor, &appt) {
        return Err(WorkflowError::forbidden("not a party to this appointment"));
    }
    Ok(appt)
}

pub fn list_for_patient(
    conn: &Connection,
    actor: &Actor,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, WorkflowError> {
    if !(actor.role == Role::Admin || actor.is(patient_id, Role::Patient)) {
        return Err(WorkflowError::forbidden("cannot list another patient's appointments"));
    }
    Ok(repository::list_appointments_for_patient(conn, patient_id)?)
}

pub fn list_for_doctor(
    conn: &Connection,
    actor: &Actor,
    doctor_id: &Uuid,
) -> Result<Vec<Appointment>, WorkflowError> {
    if !(actor.role == Role::Admin || actor.is(doctor_id, Role::Doctor)) {
        return Err(WorkflowError::forbidden("cannot list another doctor's appointments"));
    }
    Ok(repository::list_appointments_for_doctor(conn, doctor_id)?)
}

pub fn list_all(conn: &Connection, actor: &Actor) -> Result<Vec<Appointment>, WorkflowError> {
    if actor.role != Role::Admin {
        return Err(WorkflowError::forbidden("admin only"));
    }
    Ok(repository::list_all_appointments(conn)?)
}

/// Hard delete. Not a status transition: no notifications are produced and
/// the slot is released immediately.
pub fn admin_delete(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), WorkflowError> {
    if actor.role != Role::Admin {
        return Err(WorkflowError::forbidden("admin only"));
    }
    repository::delete_appointment(conn, id)?;
    tracing::warn!(appointment_id = %id, admin_id = %actor.id, "Appointment deleted by admin");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;
    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::test_support::{self, actor_for_admin, actor_for_doctor, actor_for_patient, early};

    fn request(patient_id: Uuid, doctor_id: Uuid, date: &str, time: &str) -> BookingRequest {
        BookingRequest {
            patient_id,
            doctor_id,
            date: date.into(),
            time: time.into(),
        }
    }

    #[test]
    fn patient_books_free_slot() {
        let mut conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let actor = actor_for_patient(&clinic.patient);

        let appt = book(
            &mut conn,
            &actor,
            &request(clinic.patient.id, clinic.doctor.id, "2025-03-01", "09:00"),
            early(),
        )
        .unwrap();

        assert_eq!(appt.status, AppointmentStatus::Booked);
        assert_eq!(appt.version, 1);
        assert_eq!(appt.time, "09:00");
        let stored = repository::get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(stored, appt);
    }

    #[test]
    fn second_booking_of_same_slot_conflicts() {
        let mut conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let other = test_support::seed_patient(&conn, "Sam Roe", "sam@example.com");

        book(
            &mut conn,
            &actor_for_patient(&clinic.patient),
            &request(clinic.patient.id, clinic.doctor.id, "2025-03-01", "09:00"),
            early(),
        )
        .unwrap();
        let err = book(
            &mut conn,
            &actor_for_patient(&other),
            &request(other.id, clinic.doctor.id, "2025-03-01", "09:00"),
            early(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }

    #[test]
    fn canceled_appointment_frees_its_slot() {
        let mut conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let mut old = test_support::seed_appointment(
            &conn,
            clinic.patient.id,
            clinic.doctor.id,
            "2025-03-01",
            "09:00",
        );
        old.status = AppointmentStatus::Canceled;
        old.version = 2;
        assert_eq!(repository::update_appointment_versioned(&conn, &old, 1).unwrap(), 1);

        let fresh = book(
            &mut conn,
            &actor_for_admin(&clinic.admin),
            &request(clinic.patient.id, clinic.doctor.id, "2025-03-01", "09:00"),
            early(),
        );
        assert!(fresh.is_ok());
    }

    #[test]
    fn booking_in_the_past_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let err = book(
            &mut conn,
            &actor_for_patient(&clinic.patient),
            &request(clinic.patient.id, clinic.doctor.id, "2025-03-01", "09:00"),
            test_support::at("2025-03-01", "09:01"),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn doctors_and_other_patients_cannot_book() {
        let mut conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let other = test_support::seed_patient(&conn, "Sam Roe", "sam@example.com");
        let req = request(clinic.patient.id, clinic.doctor.id, "2025-03-01", "09:00");

        let by_doctor = book(&mut conn, &actor_for_doctor(&clinic.doctor), &req, early());
        let by_stranger = book(&mut conn, &actor_for_patient(&other), &req, early());
        assert!(matches!(by_doctor, Err(WorkflowError::Authorization(_))));
        assert!(matches!(by_stranger, Err(WorkflowError::Authorization(_))));
    }

    #[test]
    fn unknown_doctor_is_not_found() {
        let mut conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let err = book(
            &mut conn,
            &actor_for_patient(&clinic.patient),
            &request(clinic.patient.id, Uuid::new_v4(), "2025-03-01", "09:00"),
            early(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { entity: "Doctor", .. }));
    }

    #[test]
    fn off_grid_time_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let err = book(
            &mut conn,
            &actor_for_patient(&clinic.patient),
            &request(clinic.patient.id, clinic.doctor.id, "2025-03-01", "09:10"),
            early(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn concurrent_bookings_exactly_one_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let (patient_a, patient_b, doctor) = {
            let conn = open_database(&path).unwrap();
            let a = test_support::seed_patient(&conn, "A", "a@example.com");
            let b = test_support::seed_patient(&conn, "B", "b@example.com");
            let d = test_support::seed_doctor(&conn, "Dr. Grey", "grey@example.com");
            (a, b, d)
        };

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [patient_a, patient_b]
            .into_iter()
            .map(|patient| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                let doctor_id = doctor.id;
                std::thread::spawn(move || {
                    let mut conn = open_database(&path).unwrap();
                    let req = request(patient.id, doctor_id, "2025-03-01", "09:00");
                    barrier.wait();
                    book(&mut conn, &actor_for_patient(&patient), &req, early())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(WorkflowError::Conflict(_))))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 1);

        let conn = open_database(&path).unwrap();
        let date = parse_date("2025-03-01").unwrap();
        assert_eq!(repository::booked_times(&conn, &doctor.id, &date).unwrap().len(), 1);
    }

    #[test]
    fn visibility_follows_participation() {
        let conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let stranger = test_support::seed_doctor(&conn, "Dr. Who", "who@example.com");
        let appt = test_support::seed_appointment(
            &conn,
            clinic.patient.id,
            clinic.doctor.id,
            "2025-03-01",
            "09:00",
        );

        assert!(get(&conn, &actor_for_patient(&clinic.patient), &appt.id).is_ok());
        assert!(get(&conn, &actor_for_doctor(&clinic.doctor), &appt.id).is_ok());
        assert!(get(&conn, &actor_for_admin(&clinic.admin), &appt.id).is_ok());
        assert!(matches!(
            get(&conn, &actor_for_doctor(&stranger), &appt.id),
            Err(WorkflowError::Authorization(_))
        ));
        assert!(matches!(
            get(&conn, &actor_for_admin(&clinic.admin), &Uuid::new_v4()),
            Err(WorkflowError::NotFound { .. })
        ));
    }

    #[test]
    fn listings_are_scoped_and_newest_first() {
        let conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let (p, d) = (clinic.patient.id, clinic.doctor.id);
        test_support::seed_appointment(&conn, p, d, "2025-03-01", "09:00");
        test_support::seed_appointment(&conn, p, d, "2025-03-02", "10:00");

        let mine = list_for_patient(&conn, &actor_for_patient(&clinic.patient), &p).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].date.to_string(), "2025-03-02");

        let agenda = list_for_doctor(&conn, &actor_for_doctor(&clinic.doctor), &d).unwrap();
        assert_eq!(agenda.len(), 2);

        assert!(list_for_doctor(&conn, &actor_for_patient(&clinic.patient), &d).is_err());
        assert!(list_all(&conn, &actor_for_doctor(&clinic.doctor)).is_err());
        assert_eq!(list_all(&conn, &actor_for_admin(&clinic.admin)).unwrap().len(), 2);
    }

    #[test]
    fn admin_delete_releases_slot() {
        let conn = open_memory_database().unwrap();
        let clinic = test_support::seed_clinic(&conn);
        let appt = test_support::seed_appointment(
            &conn,
            clinic.patient.id,
            clinic.doctor.id,
            "2025-03-01",
            "09:00",
        );

        assert!(matches!(
            admin_delete(&conn, &actor_for_doctor(&clinic.doctor), &appt.id),
            Err(WorkflowError::Authorization(_))
        ));
        admin_delete(&conn, &actor_for_admin(&clinic.admin), &appt.id).unwrap();
        assert!(repository::get_appointment(&conn, &appt.id).unwrap().is_none());
        assert!(matches!(
            admin_delete(&conn, &actor_for_admin(&clinic.admin), &appt.id),
            Err(WorkflowError::NotFound { .. })
        ));
    }
}
