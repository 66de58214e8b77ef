use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::*;

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, doctor_id, date, time, status, notes, version, created_at, updated_at";

type AppointmentRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    i64,
    String,
    String,
);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn into_appointment(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    let (id, patient_id, doctor_id, date, time, status, notes, version, created_at, updated_at) =
        row;
    Ok(Appointment {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        doctor_id: parse_uuid(&doctor_id)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| DatabaseError::ConstraintViolation(format!("appointment date: {e}")))?,
        time,
        status: AppointmentStatus::from_str(&status)?,
        notes,
        version,
        created_at,
        updated_at,
    })
}

fn query_appointments<P: rusqlite::Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments {filter}
         ORDER BY date DESC, time DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, read_row)?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(into_appointment(row?)?);
    }
    Ok(appointments)
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments
         (id, patient_id, doctor_id, date, time, status, notes, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.date.to_string(),
            appt.time,
            appt.status.as_str(),
            appt.notes,
            appt.version,
            appt.created_at,
            appt.updated_at,
        ],
    )
    .map_err(DatabaseError::classify)?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], read_row)
        .optional()?
        .map(into_appointment)
        .transpose()
}

/// Write status, schedule and notes if the stored version still matches.
///
/// Returns the number of rows changed: 0 means another writer got there first
/// (or the appointment is gone).
pub fn update_appointment_versioned(
    conn: &Connection,
    appt: &Appointment,
    expected_version: i64,
) -> Result<usize, DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE appointments
             SET status = ?1, date = ?2, time = ?3, notes = ?4, version = ?5, updated_at = ?6
             WHERE id = ?7 AND version = ?8",
            params![
                appt.status.as_str(),
                appt.date.to_string(),
                appt.time,
                appt.notes,
                appt.version,
                appt.updated_at,
                appt.id.to_string(),
                expected_version,
            ],
        )
        .map_err(DatabaseError::classify)?;
    Ok(changed)
}

/// The live appointment holding a doctor's slot, ignoring `exclude`.
pub fn find_slot_holder(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
    time: &str,
    exclude: Option<&Uuid>,
) -> Result<Option<Uuid>, DatabaseError> {
    let exclude = exclude.map(|id| id.to_string()).unwrap_or_default();
    let holder: Option<String> = conn
        .query_row(
            "SELECT id FROM appointments
             WHERE doctor_id = ?1 AND date = ?2 AND time = ?3
               AND status <> 'canceled' AND id <> ?4
             LIMIT 1",
            params![doctor_id.to_string(), date.to_string(), time, exclude],
            |row| row.get(0),
        )
        .optional()?;
    holder.map(|id| parse_uuid(&id)).transpose()
}

/// Time labels taken by non-canceled appointments, ascending.
pub fn booked_times(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT time FROM appointments
         WHERE doctor_id = ?1 AND date = ?2 AND status <> 'canceled'
         ORDER BY time ASC",
    )?;
    let times = stmt
        .query_map(params![doctor_id.to_string(), date.to_string()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(times)
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(conn, "WHERE patient_id = ?1", params![patient_id.to_string()])
}

pub fn list_appointments_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(conn, "WHERE doctor_id = ?1", params![doctor_id.to_string()])
}

pub fn list_all_appointments(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(conn, "", [])
}

pub fn delete_appointment(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM appointments WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
