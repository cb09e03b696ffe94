use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{AuditRecord, Audited, CommunityId, JoinRequestId, Result, UserId};

/// Lifecycle shared by join and role change requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    /// Cancelled by the requester, distinct from a moderator rejection.
    Withdrawn,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
            RequestStatus::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "withdrawn" => Ok(RequestStatus::Withdrawn),
            _ => Err(anyhow::anyhow!("Invalid request status: {}", s)),
        }
    }
}

/// JoinRequest - a user asking to become a member of a community.
///
/// At most one pending request exists per (user, community); decided requests are kept
/// as history.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JoinRequest {
    pub id: JoinRequestId,
    pub user_id: UserId,
    pub community_id: CommunityId,
    pub status: RequestStatus,
    pub message: String,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl JoinRequest {
    pub fn new(user_id: UserId, community_id: CommunityId, message: String) -> Self {
        let now = Utc::now();
        Self {
            id: JoinRequestId::new(),
            user_id,
            community_id,
            status: RequestStatus::Pending,
            message,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

impl Audited for JoinRequest {
    fn audit_record(&self) -> Option<AuditRecord> {
        Some(AuditRecord {
            actor: self.decided_by?,
            at: self.decided_at?,
            outcome: self.status.to_string(),
            reason: self.rejection_reason.clone(),
        })
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl JoinRequest {
    pub async fn insert<'e>(request: &JoinRequest, db: impl PgExecutor<'e>) -> Result<Self> {
        let request = sqlx::query_as::<_, JoinRequest>(
            r#"
            INSERT INTO join_requests (id, user_id, community_id, status, message)
            VALUES ($1, $2, $3, 'pending', $4)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.community_id)
        .bind(&request.message)
        .fetch_one(db)
        .await?;
        Ok(request)
    }

    pub async fn find_by_id<'e>(
        id: JoinRequestId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let request = sqlx::query_as::<_, JoinRequest>(
            "SELECT * FROM join_requests WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(request)
    }

    /// Compare-and-set out of `pending`. `None` when the request was already decided.
    pub async fn close<'e>(
        id: JoinRequestId,
        status: RequestStatus,
        actor: UserId,
        rejection_reason: Option<&str>,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let request = sqlx::query_as::<_, JoinRequest>(
            r#"
            UPDATE join_requests
            SET status = $2,
                decided_by = $3,
                decided_at = NOW(),
                rejection_reason = $4,
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND status = 'pending' AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(actor)
        .bind(rejection_reason)
        .fetch_optional(db)
        .await?;
        Ok(request)
    }

    /// Approve whatever request the user still has pending in the community. Used when they
    /// are added directly, so the request does not outlive the membership it asked for.
    pub async fn approve_pending_for<'e>(
        user_id: UserId,
        community_id: CommunityId,
        decided_by: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        let requests = sqlx::query_as::<_, JoinRequest>(
            r#"
            UPDATE join_requests
            SET status = 'approved',
                decided_by = $3,
                decided_at = NOW(),
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE user_id = $1 AND community_id = $2 AND status = 'pending' AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(community_id)
        .bind(decided_by)
        .fetch_all(db)
        .await?;
        Ok(requests)
    }

    pub async fn find_by_community<'e>(
        community_id: CommunityId,
        status: Option<RequestStatus>,
        limit: i64,
        offset: i64,
        db: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        let requests = sqlx::query_as::<_, JoinRequest>(
            r#"
            SELECT *
            FROM join_requests
            WHERE community_id = $1
              AND deleted_at IS NULL
              AND ($2::request_status IS NULL OR status = $2)
            ORDER BY created_at ASC, id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(community_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(requests)
    }

    pub async fn count_by_community<'e>(
        community_id: CommunityId,
        status: Option<RequestStatus>,
        db: impl PgExecutor<'e>,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM join_requests
            WHERE community_id = $1
              AND deleted_at IS NULL
              AND ($2::request_status IS NULL OR status = $2)
            "#,
        )
        .bind(community_id)
        .bind(status)
        .fetch_one(db)
        .await?;
        Ok(count)
    }
}
