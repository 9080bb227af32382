//! # Notification Sink Port
//!
//! Outbound port for delivering notifications to store owners.
//!
//! ## Delivery Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Best-Effort Delivery                                  │
//! │                                                                         │
//! │  Service (orchestrator/batcher/job)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ... financial writes ... COMMIT   ← state is durable FIRST      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  send_best_effort(sink, notification)    ← AFTER commit, never before  │
//! │       │                                                                 │
//! │       ├── Ok  → debug! trace                                           │
//! │       └── Err → warn! and swallow        ← never unwinds into caller   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed delivery never rolls back or fails a financial operation.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use plaza_core::Notification;

/// Notification delivery error.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The underlying channel (push service, message queue, ...) failed.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound notification port.
///
/// Production wires a real delivery adapter here (push, e-mail, in-app
/// inbox); this crate ships [`TracingSink`] for deployments without one
/// and [`RecordingSink`] for tests.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Sends a notification, logging and swallowing any delivery failure.
///
/// Services call this AFTER their transaction has committed.
pub async fn send_best_effort(sink: &dyn NotificationSink, notification: Notification) {
    let kind = notification.kind;
    let user_id = notification.user_id.clone();

    if let Err(e) = sink.notify(notification).await {
        warn!(
            ?kind,
            user_id = %user_id,
            error = %e,
            "Notification delivery failed (ignored)"
        );
    }
}

// =============================================================================
// Tracing Sink
// =============================================================================

/// Default sink: writes notifications to the log.
///
/// Useful for single-node deployments and local development where no
/// delivery channel is configured yet.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&notification)
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        info!(
            kind = ?notification.kind,
            user_id = %notification.user_id,
            payload = %payload,
            "Notification"
        );
        Ok(())
    }
}

// =============================================================================
// Recording Sink (test double)
// =============================================================================

/// Test sink that records every notification it receives.
///
/// ## Usage
/// ```rust,ignore
/// let sink = Arc::new(RecordingSink::new());
/// let orchestrator = db.orchestrator(sink.clone());
/// orchestrator.calculate_commissions("order-1").await?;
/// assert_eq!(sink.sent().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
    /// When true, every delivery fails. Used to verify that financial
    /// operations survive sink outages.
    fail: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every notification delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Makes subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if *self.fail.lock().unwrap() {
            return Err(NotifyError::Delivery("sink configured to fail".to_string()));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
