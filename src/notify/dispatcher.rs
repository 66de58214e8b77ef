//! Background email dispatcher: drains the outbox on its own thread.
//!
//! Woken immediately after a fan-out queues an email, and otherwise polls
//! every `poll_interval` so retries come due without outside help. Failed
//! sends back off exponentially; after `max_attempts` a message is marked
//! `failed` and left for an operator.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::{self, format_timestamp, repository};

use super::email::{EmailMessage, EmailTransport};
use super::DeliveryError;

/// Emails handled per drain pass.
const BATCH_SIZE: usize = 25;

/// Upper bound on any single backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next try, given how many attempts already failed.
    pub fn backoff_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }

    /// When to try again, or `None` once attempts are exhausted.
    pub fn next_attempt(&self, failed_attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if failed_attempts >= self.max_attempts {
            return None;
        }
        let delay = chrono::Duration::from_std(self.backoff_after(failed_attempts)).ok()?;
        Some(now + delay)
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Send every due email once and record the result.
pub fn deliver_due(
    conn: &Connection,
    transport: &dyn EmailTransport,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<DispatchSummary, DeliveryError> {
    let stamp = format_timestamp(now);
    let mut summary = DispatchSummary::default();

    for email in repository::due_emails(conn, &stamp, BATCH_SIZE)? {
        let message = EmailMessage {
            to: email.recipient.clone(),
            subject: email.subject.clone(),
            body: email.body.clone(),
        };

        match transport.send(&message) {
            Ok(()) => {
                repository::mark_email_sent(conn, &email.id, &stamp)?;
                summary.sent += 1;
                tracing::info!(
                    email_id = %email.id,
                    transport = transport.name(),
                    attempt = email.attempts + 1,
                    "Email delivered"
                );
            }
            Err(e) => {
                let failed_attempts = email.attempts + 1;
                let error = e.to_string();
                match policy.next_attempt(failed_attempts, now) {
                    Some(retry_at) => {
                        let retry_stamp = format_timestamp(retry_at);
                        repository::record_email_failure(conn, &email.id, &error, Some(&retry_stamp))?;
                        summary.retried += 1;
                        tracing::warn!(
                            email_id = %email.id,
                            attempt = failed_attempts,
                            retry_at = %retry_stamp,
                            error = %error,
                            "Email delivery failed, will retry"
                        );
                    }
                    None => {
                        repository::record_email_failure(conn, &email.id, &error, None)?;
                        summary.failed += 1;
                        tracing::error!(
                            email_id = %email.id,
                            attempts = failed_attempts,
                            error = %error,
                            "Email delivery abandoned"
                        );
                    }
                }
            }
        }
    }

    Ok(summary)
}

/// Nudges the dispatcher to drain now instead of at the next poll.
#[derive(Debug, Clone)]
pub struct EmailWaker(Sender<()>);

impl EmailWaker {
    pub fn channel() -> (Self, Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        (Self(tx), rx)
    }

    pub fn wake(&self) {
        // A closed channel means the dispatcher already stopped.
        let _ = self.0.send(());
    }
}

/// Handle for the dispatcher thread. Dropping it stops and joins the thread.
pub struct EmailDispatcherHandle {
    shutdown: Arc<AtomicBool>,
    waker: EmailWaker,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl EmailDispatcherHandle {
    pub fn waker(&self) -> EmailWaker {
        self.waker.clone()
    }

    /// Stop after the current pass.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.waker.wake();
    }
}

impl Drop for EmailDispatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start the dispatcher on its own thread.
pub fn start_email_dispatcher(
    db_path: PathBuf,
    transport: Box<dyn EmailTransport>,
    policy: RetryPolicy,
    poll_interval: Duration,
) -> EmailDispatcherHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let (waker, wake_rx) = EmailWaker::channel();

    let handle = std::thread::spawn(move || {
        tracing::info!(
            transport = transport.name(),
            poll_secs = poll_interval.as_secs(),
            "Email dispatcher started"
        );
        dispatcher_loop(&db_path, transport.as_ref(), &policy, poll_interval, &wake_rx, &flag);
        tracing::info!("Email dispatcher shutting down");
    });

    EmailDispatcherHandle {
        shutdown,
        waker,
        handle: Some(handle),
    }
}

fn dispatcher_loop(
    db_path: &Path,
    transport: &dyn EmailTransport,
    policy: &RetryPolicy,
    poll_interval: Duration,
    wake_rx: &Receiver<()>,
    shutdown: &AtomicBool,
) {
    // Drain anything left over from a previous run before waiting.
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        drain_once(db_path, transport, policy);

        match wake_rx.recv_timeout(poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
        // Coalesce wakes that piled up during the last pass.
        while wake_rx.try_recv().is_ok() {}
    }
}

fn drain_once(db_path: &Path, transport: &dyn EmailTransport, policy: &RetryPolicy) {
    let conn = match db::open_database(db_path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "Email dispatcher cannot open database");
            return;
        }
    };
    match deliver_due(&conn, transport, policy, Utc::now()) {
        Ok(summary) if summary != DispatchSummary::default() => {
            tracing::debug!(
                sent = summary.sent,
                retried = summary.retried,
                failed = summary.failed,
                "Email dispatch pass complete"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Email dispatch pass failed"),
    }
}
