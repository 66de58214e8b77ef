//! Fixtures shared by unit tests across modules.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use tempfile::TempDir;
use uuid::Uuid;

use crate::auth::{generate_salt, hash_password_with};
use crate::core_state::CoreState;
use crate::db::{self, repository};
use crate::models::*;

/// Password every seeded account logs in with.
pub const PASSWORD: &str = "correct-horse-battery";

/// Low work factor keeps fixture setup fast.
const FIXTURE_ITERATIONS: u32 = 1_000;

pub fn fixture_hash() -> String {
    hash_password_with(PASSWORD, FIXTURE_ITERATIONS, &generate_salt())
}

pub fn seed_patient(conn: &Connection, name: &str, email: &str) -> Patient {
    let patient = Patient {
        id: Uuid::new_v4(),
        name: name.into(),
        email: email.into(),
        phone: None,
    };
    repository::insert_patient(conn, &patient, &fixture_hash()).unwrap();
    patient
}

pub fn seed_doctor(conn: &Connection, name: &str, email: &str) -> Doctor {
    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: name.into(),
        email: email.into(),
        specialty: "General Practice".into(),
        available: true,
    };
    repository::insert_doctor(conn, &doctor, &fixture_hash()).unwrap();
    doctor
}

pub fn seed_admin(conn: &Connection, name: &str, email: &str) -> Admin {
    let admin = Admin {
        id: Uuid::new_v4(),
        name: name.into(),
        email: email.into(),
    };
    repository::insert_admin(conn, &admin, &fixture_hash()).unwrap();
    admin
}

/// Insert a booked appointment directly, bypassing workflow checks.
pub fn seed_appointment(
    conn: &Connection,
    patient_id: Uuid,
    doctor_id: Uuid,
    date: &str,
    time: &str,
) -> Appointment {
    let appt = Appointment {
        id: Uuid::new_v4(),
        patient_id,
        doctor_id,
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        time: time.into(),
        status: AppointmentStatus::Booked,
        notes: None,
        version: 1,
        created_at: "2025-01-01T00:00:00.000Z".into(),
        updated_at: "2025-01-01T00:00:00.000Z".into(),
    };
    repository::insert_appointment(conn, &appt).unwrap();
    appt
}

/// `YYYY-MM-DD HH:MM` as a local timestamp.
pub fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
}

/// A clock reading well before every fixture date.
pub fn early() -> NaiveDateTime {
    at("2025-01-01", "08:00")
}

pub fn actor_for_patient(p: &Patient) -> Actor {
    Actor::new(p.id, Role::Patient, p.name.clone())
}

pub fn actor_for_doctor(d: &Doctor) -> Actor {
    Actor::new(d.id, Role::Doctor, d.name.clone())
}

pub fn actor_for_admin(a: &Admin) -> Actor {
    Actor::new(a.id, Role::Admin, a.name.clone())
}

/// One patient, one doctor, one admin in a fresh database.
pub struct Clinic {
    pub patient: Patient,
    pub doctor: Doctor,
    pub admin: Admin,
}

pub fn seed_clinic(conn: &Connection) -> Clinic {
    Clinic {
        patient: seed_patient(conn, "Pat Lee", "pat@example.com"),
        doctor: seed_doctor(conn, "Dr. Grey", "grey@example.com"),
        admin: seed_admin(conn, "Ada Admin", "admin@example.com"),
    }
}

/// A `CoreState` over a migrated database file in a temp directory.
/// Keep the `TempDir` alive for the duration of the test.
pub fn temp_core() -> (TempDir, Arc<CoreState>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optidoc.db");
    db::open_database(&path).unwrap();
    (dir, Arc::new(CoreState::new(path, Vec::new())))
}
