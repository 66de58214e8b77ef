//! Errors raised by the booking and status workflow.

use uuid::Uuid;

use crate::db::DatabaseError;

/// Workflow failures surfaced to callers. None of them are retried
/// automatically; `ConcurrentModification` asks the caller to refetch.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Slot conflict: {0}")]
    Conflict(String),
    #[error("Not permitted: {0}")]
    Authorization(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Appointment {id} was modified concurrently (expected version {expected}, found {found})")]
    ConcurrentModification { id: Uuid, expected: i64, found: i64 },
    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DatabaseError> for WorkflowError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation(detail) => WorkflowError::Conflict(detail),
            DatabaseError::NotFound { entity_type, id } => WorkflowError::NotFound {
                entity: match entity_type.as_str() {
                    "Appointment" => "Appointment",
                    "Notification" => "Notification",
                    _ => "Record",
                },
                id,
            },
            other => WorkflowError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::classify(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_becomes_conflict() {
        let err: WorkflowError = DatabaseError::UniqueViolation("slot".into()).into();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }

    #[test]
    fn repository_not_found_keeps_entity() {
        let err: WorkflowError = DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: "abc".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Appointment abc not found");
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err: WorkflowError = DatabaseError::ConstraintViolation("bad".into()).into();
        assert!(matches!(err, WorkflowError::Database(_)));
    }
}
