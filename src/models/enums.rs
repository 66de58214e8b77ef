use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Booked => "booked",
    Completed => "completed",
    Canceled => "canceled",
    Rescheduled => "rescheduled",
});

impl AppointmentStatus {
    /// Parse a status as clients send it. Doctor screens historically used
    /// `cleared` and `delayed`; those collapse onto the canonical variants
    /// here and are never persisted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "booked" => Some(Self::Booked),
            "completed" | "cleared" => Some(Self::Completed),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "rescheduled" | "delayed" => Some(Self::Rescheduled),
            _ => None,
        }
    }

    /// Completed and canceled appointments leave the workflow.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

str_enum!(Role {
    Patient => "patient",
    Doctor => "doctor",
    Admin => "admin",
});

str_enum!(NotificationType {
    AppointmentBooked => "appointment_booked",
    AppointmentCleared => "appointment_cleared",
    AppointmentDelayed => "appointment_delayed",
    AppointmentCanceled => "appointment_canceled",
    AppointmentUpdated => "appointment_updated",
});

impl NotificationType {
    /// Notification type for a transition that left the appointment in `status`.
    pub fn for_status(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Completed => Self::AppointmentCleared,
            AppointmentStatus::Rescheduled => Self::AppointmentDelayed,
            AppointmentStatus::Canceled => Self::AppointmentCanceled,
            AppointmentStatus::Booked => Self::AppointmentUpdated,
        }
    }
}

str_enum!(OutboxStatus {
    Pending => "pending",
    Sent => "sent",
    Failed => "failed",
});
