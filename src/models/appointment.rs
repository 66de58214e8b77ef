use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// A booked consultation slot between one patient and one doctor.
///
/// `time` is always a canonical slot label (`HH:MM`, 30-minute grid).
/// `version` increments on every successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    /// `YYYY-MM-DD HH:MM`, as shown in notification text.
    pub fn schedule_label(&self) -> String {
        format!("{} {}", self.date, self.time)
    }
}
