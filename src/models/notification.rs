use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{NotificationType, Role};

/// In-app notification. Immutable after creation except for `is_read`.
///
/// `appointment_date` / `appointment_time` are a snapshot taken when the
/// notification was created, not a live view of the appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_role: Role,
    pub sender_id: Uuid,
    pub sender_role: Role,
    pub sender_name: String,
    pub appointment_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub is_read: bool,
    pub created_at: String,
}
