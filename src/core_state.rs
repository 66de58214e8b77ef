//! Shared application state handed to every request handler.

use std::path::{Path, PathBuf};
use std::time::Instant;

use uuid::Uuid;

use crate::db;
use crate::notify::EmailWaker;

/// Process-wide state. Wrapped in `Arc` at startup.
///
/// Holds no connection: handlers open their own through [`CoreState::open_db`]
/// so concurrent requests never contend on an in-process lock; SQLite's own
/// locking (WAL, `BEGIN IMMEDIATE`) serializes writers.
pub struct CoreState {
    db_path: PathBuf,
    /// Admins notified of patient and doctor actions. Empty: every admin.
    admin_recipients: Vec<Uuid>,
    /// Present when the email dispatcher runs.
    email_waker: Option<EmailWaker>,
    started_at: Instant,
}

impl CoreState {
    pub fn new(db_path: PathBuf, admin_recipients: Vec<Uuid>) -> Self {
        Self {
            db_path,
            admin_recipients,
            email_waker: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_email_waker(mut self, waker: EmailWaker) -> Self {
        self.email_waker = Some(waker);
        self
    }

    /// Open a connection to the application database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn admin_recipients(&self) -> &[Uuid] {
        &self.admin_recipients
    }

    pub fn email_waker(&self) -> Option<&EmailWaker> {
        self.email_waker.as_ref()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn open_db_returns_migrated_connection() {
        let (_dir, core) = test_support::temp_core();
        let conn = core.open_db().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn unusable_path_is_database_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let core = CoreState::new(dir.path().to_path_buf(), Vec::new());
        assert!(matches!(core.open_db(), Err(CoreError::Database(_))));
    }

    #[test]
    fn waker_is_optional() {
        let (_dir, core) = test_support::temp_core();
        assert!(core.email_waker().is_none());

        let (waker, rx) = EmailWaker::channel();
        let core = CoreState::new(core.db_path().to_path_buf(), Vec::new()).with_email_waker(waker);
        core.email_waker().unwrap().wake();
        assert!(rx.try_recv().is_ok());
    }
}
