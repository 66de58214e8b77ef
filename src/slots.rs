//! Slot availability: the fixed 30-minute grid and which labels are taken.
//!
//! A slot is a point label (`HH:MM`), not an interval. Two appointments
//! clash only when doctor, date and label are identical.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository;
use crate::error::WorkflowError;

/// Minutes between two consecutive slot labels.
pub const SLOT_MINUTES: u32 = 30;

/// Labels per calendar day.
pub const SLOTS_PER_DAY: usize = (24 * 60 / SLOT_MINUTES) as usize;

const LABEL_FORMAT: &str = "%H:%M";

/// One entry of a doctor's day grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub time: String,
    pub available: bool,
    pub booked: bool,
}

/// Every slot label of a day, `00:00` through `23:30`.
pub fn all_slots() -> Vec<String> {
    (0..SLOTS_PER_DAY as u32)
        .map(|i| {
            let minutes = i * SLOT_MINUTES;
            format!("{:02}:{:02}", minutes / 60, minutes % 60)
        })
        .collect()
}

/// Validate a slot label and return it in canonical `HH:MM` form.
pub fn parse_slot(label: &str) -> Result<(NaiveTime, String), WorkflowError> {
    let time = NaiveTime::parse_from_str(label.trim(), LABEL_FORMAT)
        .map_err(|_| WorkflowError::validation(format!("'{label}' is not a HH:MM time")))?;
    if time.minute() % SLOT_MINUTES != 0 || time.second() != 0 {
        return Err(WorkflowError::validation(format!(
            "'{label}' is not on the {SLOT_MINUTES}-minute slot grid"
        )));
    }
    Ok((time, time.format(LABEL_FORMAT).to_string()))
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, WorkflowError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| WorkflowError::validation(format!("'{value}' is not a YYYY-MM-DD date")))
}

/// Reject a schedule that starts before `now`.
pub fn ensure_not_past(
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
) -> Result<(), WorkflowError> {
    if date.and_time(time) < now {
        return Err(WorkflowError::validation(format!(
            "{date} {} is in the past",
            time.format(LABEL_FORMAT)
        )));
    }
    Ok(())
}

/// Wall-clock time at the clinic. Slot labels are local times.
pub fn clinic_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Labels held by any non-canceled appointment for this doctor and date.
pub fn list_booked_times(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
) -> Result<BTreeSet<String>, WorkflowError> {
    Ok(repository::booked_times(conn, doctor_id, date)?
        .into_iter()
        .collect())
}

/// The full day grid with past and booked slots marked unavailable.
pub fn day_availability(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
    now: NaiveDateTime,
) -> Result<Vec<SlotAvailability>, WorkflowError> {
    let booked = list_booked_times(conn, doctor_id, date)?;
    let mut grid = Vec::with_capacity(SLOTS_PER_DAY);
    for label in all_slots() {
        let (time, _) = parse_slot(&label)?;
        let is_booked = booked.contains(&label);
        let in_past = date.and_time(time) < now;
        grid.push(SlotAvailability {
            available: !is_booked && !in_past,
            booked: is_booked,
            time: label,
        });
    }
    Ok(grid)
}
