//! Status Transition Engine.
//!
//! ```text
//! booked ──────┬──> completed   (terminal)
//!              ├──> canceled    (terminal)
//!              └──> rescheduled ──> completed | canceled | rescheduled
//! ```
//!
//! `booked -> booked` is accepted only as a notes-only edit. Every accepted
//! transition bumps the appointment's `version`; callers that send the
//! version they last saw get `ConcurrentModification` instead of silently
//! overwriting a newer change.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{repository, timestamp_now};
use crate::error::WorkflowError;
use crate::models::{Actor, Appointment, AppointmentStatus, Role};
use crate::slots::{ensure_not_past, parse_date, parse_slot};

/// A requested status change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    /// Canonical status or one of the legacy labels (`cleared`, `delayed`).
    pub status: String,
    pub new_date: Option<String>,
    pub new_time: Option<String>,
    pub notes: Option<String>,
    /// Version the caller last read. `None` skips the staleness check.
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedField {
    Status,
    Date,
    Time,
}

impl ChangedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Date => "date",
            Self::Time => "time",
        }
    }
}

/// One entry of a transition diff; only fields whose value changed appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: ChangedField,
    pub from: String,
    pub to: String,
}

impl FieldChange {
    /// `status: booked → rescheduled`
    pub fn summary(&self) -> String {
        format!("{}: {} → {}", self.field.as_str(), self.from, self.to)
    }
}

/// Result of an accepted transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub previous: Appointment,
    pub appointment: Appointment,
    pub changes: Vec<FieldChange>,
}

impl TransitionOutcome {
    /// True when only the notes were edited.
    pub fn is_notes_only(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Whether the state machine allows `from -> to` at all.
pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    to != AppointmentStatus::Booked || from == AppointmentStatus::Booked
}

/// Compute the status/date/time diff between two versions of an appointment.
pub fn diff(before: &Appointment, after: &Appointment) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if before.status != after.status {
        changes.push(FieldChange {
            field: ChangedField::Status,
            from: before.status.to_string(),
            to: after.status.to_string(),
        });
    }
    if before.date != after.date {
        changes.push(FieldChange {
            field: ChangedField::Date,
            from: before.date.to_string(),
            to: after.date.to_string(),
        });
    }
    if before.time != after.time {
        changes.push(FieldChange {
            field: ChangedField::Time,
            from: before.time.clone(),
            to: after.time.clone(),
        });
    }
    changes
}

/// Validated form of the request's schedule fields.
struct NewSchedule {
    date: NaiveDate,
    time: String,
}

fn parse_schedule(
    status: AppointmentStatus,
    request: &TransitionRequest,
    now: NaiveDateTime,
) -> Result<Option<NewSchedule>, WorkflowError> {
    let date = request.new_date.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let time = request.new_time.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if status != AppointmentStatus::Rescheduled {
        if date.is_some() || time.is_some() {
            return Err(WorkflowError::validation(
                "newDate/newTime are only accepted when rescheduling",
            ));
        }
        return Ok(None);
    }

    let (Some(date), Some(time)) = (date, time) else {
        return Err(WorkflowError::validation(
            "rescheduling requires both newDate and newTime",
        ));
    };
    let date = parse_date(date)?;
    let (naive_time, label) = parse_slot(time)?;
    ensure_not_past(date, naive_time, now)?;
    Ok(Some(NewSchedule { date, time: label }))
}

/// Apply a status change on behalf of a doctor or admin.
pub fn transition(
    conn: &mut Connection,
    appointment_id: &Uuid,
    actor: &Actor,
    request: &TransitionRequest,
    now: NaiveDateTime,
) -> Result<TransitionOutcome, WorkflowError> {
    if actor.role == Role::Patient {
        return Err(WorkflowError::forbidden(
            "only doctors and admins change appointment status",
        ));
    }

    let status = AppointmentStatus::from_label(&request.status).ok_or_else(|| {
        WorkflowError::validation(format!("unknown status '{}'", request.status))
    })?;
    let schedule = parse_schedule(status, request, now)?;
    let notes = request
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = repository::get_appointment(&tx, appointment_id)?
        .ok_or_else(|| WorkflowError::not_found("Appointment", appointment_id))?;

    if actor.role == Role::Doctor && actor.id != current.doctor_id {
        tracing::warn!(
            appointment_id = %current.id,
            actor_id = %actor.id,
            "Transition rejected: doctor does not own appointment"
        );
        return Err(WorkflowError::forbidden("appointment belongs to another doctor"));
    }

    if let Some(expected) = request.expected_version {
        if expected != current.version {
            return Err(WorkflowError::ConcurrentModification {
                id: current.id,
                expected,
                found: current.version,
            });
        }
    }

    if !can_transition(current.status, status) {
        return Err(WorkflowError::validation(format!(
            "cannot move a {} appointment to {status}",
            current.status
        )));
    }
    let mut next = current.clone();
    next.status = status;
    if let Some(schedule) = schedule {
        if let Some(holder) = repository::find_slot_holder(
            &tx,
            &current.doctor_id,
            &schedule.date,
            &schedule.time,
            Some(&current.id),
        )? {
            tracing::info!(
                appointment_id = %current.id,
                holder = %holder,
                "Reschedule rejected: slot taken"
            );
            return Err(WorkflowError::Conflict(format!(
                "slot {} {} is already booked",
                schedule.date, schedule.time
            )));
        }
        next.date = schedule.date;
        next.time = schedule.time;
    }
    if notes.is_some() {
        next.notes = notes;
    }
    // A request that changes nothing must not bump the version or notify.
    if next.notes == current.notes && diff(&current, &next).is_empty() {
        return Err(WorkflowError::validation("nothing to update"));
    }
    next.version = current.version + 1;
    next.updated_at = timestamp_now();

    let changed = repository::update_appointment_versioned(&tx, &next, current.version)?;
    if changed == 0 {
        return Err(WorkflowError::ConcurrentModification {
            id: current.id,
            expected: current.version,
            found: repository::get_appointment(&tx, &current.id)?
                .map(|a| a.version)
                .unwrap_or(current.version),
        });
    }
    tx.commit()?;

    let changes = diff(&current, &next);
    tracing::info!(
        appointment_id = %next.id,
        actor_role = %actor.role,
        actor_id = %actor.id,
        from = %current.status,
        to = %next.status,
        version = next.version,
        "Appointment status changed"
    );

    Ok(TransitionOutcome {
        previous: current,
        appointment: next,
        changes,
    })
}
