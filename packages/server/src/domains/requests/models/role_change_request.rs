use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use super::join_request::RequestStatus;
use crate::common::{
    AuditRecord, Audited, CommunityId, GlobalRole, Result, RoleChangeRequestId, UserId,
};
use crate::domains::communities::models::{ManagerGrant, RoleAssignment};

/// RoleChangeRequest - a member asking for a different role in a community.
///
/// Unique on (user, community, requested role) across every status, so the same ask can
/// only be made once.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleChangeRequest {
    pub id: RoleChangeRequestId,
    pub user_id: UserId,
    pub community_id: CommunityId,
    /// Role held when the request was submitted.
    #[sqlx(rename = "held_role")]
    pub current_role: GlobalRole,
    pub requested_role: GlobalRole,
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RoleChangeRequest {
    pub fn new(
        user_id: UserId,
        community_id: CommunityId,
        current_role: GlobalRole,
        requested_role: GlobalRole,
        reason: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RoleChangeRequestId::new(),
            user_id,
            community_id,
            current_role,
            requested_role,
            reason,
            status: RequestStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Same (user, community, requested role) triple.
    pub fn duplicates(&self, other: &RoleChangeRequest) -> bool {
        self.user_id == other.user_id
            && self.community_id == other.community_id
            && self.requested_role == other.requested_role
    }
}

/// A decided role change request plus the records the decision wrote. Rejections and
/// withdrawals carry neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChangeOutcome {
    pub request: RoleChangeRequest,
    /// Created or reactivated for `manager`, deactivated for `user`.
    pub grant: Option<ManagerGrant>,
    /// Written for `admin` and `super_admin`.
    pub assignment: Option<RoleAssignment>,
}

impl Audited for RoleChangeRequest {
    fn audit_record(&self) -> Option<AuditRecord> {
        Some(AuditRecord {
            actor: self.reviewed_by?,
            at: self.reviewed_at?,
            outcome: self.status.to_string(),
            reason: self.rejection_reason.clone(),
        })
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl RoleChangeRequest {
    pub async fn insert<'e>(request: &RoleChangeRequest, db: impl PgExecutor<'e>) -> Result<Self> {
        let request = sqlx::query_as::<_, RoleChangeRequest>(
            r#"
            INSERT INTO role_change_requests (
                id, user_id, community_id, held_role, requested_role, reason, status
            ) VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.community_id)
        .bind(request.current_role)
        .bind(request.requested_role)
        .bind(&request.reason)
        .fetch_one(db)
        .await?;
        Ok(request)
    }

    pub async fn find_by_id<'e>(
        id: RoleChangeRequestId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let request = sqlx::query_as::<_, RoleChangeRequest>(
            "SELECT * FROM role_change_requests WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(request)
    }

    /// Compare-and-set out of `pending`. `None` when the request was already decided.
    pub async fn close<'e>(
        id: RoleChangeRequestId,
        status: RequestStatus,
        actor: UserId,
        rejection_reason: Option<&str>,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let request = sqlx::query_as::<_, RoleChangeRequest>(
            r#"
            UPDATE role_change_requests
            SET status = $2,
                reviewed_by = $3,
                reviewed_at = NOW(),
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

    pub async fn find_by_community<'e>(
        community_id: CommunityId,
        status: Option<RequestStatus>,
        limit: i64,
        offset: i64,
        db: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        let requests = sqlx::query_as::<_, RoleChangeRequest>(
            r#"
            SELECT *
            FROM role_change_requests
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
            FROM role_change_requests
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_compare_the_requested_role() {
        let user = UserId::new();
        let community = CommunityId::new();
        let ask = || {
            RoleChangeRequest::new(user, community, GlobalRole::User, GlobalRole::Manager, None)
        };
        let (a, b) = (ask(), ask());
        let c = RoleChangeRequest::new(user, community, GlobalRole::User, GlobalRole::Admin, None);
        assert!(a.duplicates(&b));
        assert!(!a.duplicates(&c));
    }
}
