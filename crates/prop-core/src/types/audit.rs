//! Audit trail records for circuit-breaker events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LockKind;

/// One immutable audit record: which breaker fired, what value tripped it,
/// and against which threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Database-assigned id; 0 until stored.
    pub id: i64,
    pub account_id: Uuid,
    /// User who triggered the evaluation, when known.
    pub user_id: Option<Uuid>,
    pub kind: LockKind,
    /// The measured value that crossed the threshold (percent or currency,
    /// depending on the breaker).
    pub trigger_value: Decimal,
    pub threshold: Decimal,
    /// The same human-readable reason persisted on the account lock.
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        account_id: Uuid,
        user_id: Option<Uuid>,
        kind: LockKind,
        trigger_value: Decimal,
        threshold: Decimal,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            account_id,
            user_id,
            kind,
            trigger_value,
            threshold,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}
