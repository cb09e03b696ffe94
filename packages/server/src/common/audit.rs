//! Audit trail folded into the entities it decorates.
//!
//! Every terminal transition stamps the deciding actor, the time and (for rejections) the
//! reason onto the entity itself. Those fields are written by the same conditional update
//! that leaves `pending` and are never touched again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::entity_ids::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: UserId,
    pub at: DateTime<Utc>,
    /// Terminal status as stored (`approved`, `rejected`, `withdrawn`, ...).
    pub outcome: String,
    pub reason: Option<String>,
}

/// Entities that carry a decision record once they leave `pending`.
pub trait Audited {
    fn audit_record(&self) -> Option<AuditRecord>;
}

/// Next `updated_at` for a row: the current time, but never at or before the previous value.
pub fn advance_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
