use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{CommunityId, ManagerGrantId, Permissions, Result, UserId};

/// ManagerGrant - community-scoped elevated permissions, one record per (user, community).
///
/// Re-granting updates the existing record; revoking flips `status` to `inactive`.
/// Records are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ManagerGrant {
    pub id: ManagerGrantId,
    pub user_id: UserId,
    pub community_id: CommunityId,
    #[sqlx(flatten)]
    pub permissions: Permissions,
    pub status: GrantStatus,
    pub granted_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "grant_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Inactive,
}

impl ManagerGrant {
    pub fn new(
        user_id: UserId,
        community_id: CommunityId,
        permissions: Permissions,
        granted_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ManagerGrantId::new(),
            user_id,
            community_id,
            permissions,
            status: GrantStatus::Active,
            granted_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == GrantStatus::Active && self.deleted_at.is_none()
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl ManagerGrant {
    /// Create or reactivate the grant for (user, community). Keyed on the unique pair,
    /// so concurrent approvals converge on one record.
    pub async fn upsert<'e>(
        user_id: UserId,
        community_id: CommunityId,
        permissions: Permissions,
        granted_by: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Self> {
        let grant = sqlx::query_as::<_, ManagerGrant>(
            r#"
            INSERT INTO manager_grants (
                id, user_id, community_id,
                can_approve_join_requests, can_manage_posts, can_manage_users,
                can_create_events, can_manage_reports,
                status, granted_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9)
            ON CONFLICT (user_id, community_id) DO UPDATE SET
                can_approve_join_requests = EXCLUDED.can_approve_join_requests,
                can_manage_posts = EXCLUDED.can_manage_posts,
                can_manage_users = EXCLUDED.can_manage_users,
                can_create_events = EXCLUDED.can_create_events,
                can_manage_reports = EXCLUDED.can_manage_reports,
                status = 'active',
                granted_by = EXCLUDED.granted_by,
                deleted_at = NULL,
                updated_at = GREATEST(NOW(), manager_grants.updated_at + INTERVAL '1 microsecond')
            RETURNING *
            "#,
        )
        .bind(ManagerGrantId::new())
        .bind(user_id)
        .bind(community_id)
        .bind(permissions.can_approve_join_requests)
        .bind(permissions.can_manage_posts)
        .bind(permissions.can_manage_users)
        .bind(permissions.can_create_events)
        .bind(permissions.can_manage_reports)
        .bind(granted_by)
        .fetch_one(db)
        .await?;
        Ok(grant)
    }

    /// Revoke the grant. Returns `None` when there was no active grant.
    pub async fn deactivate<'e>(
        user_id: UserId,
        community_id: CommunityId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let grant = sqlx::query_as::<_, ManagerGrant>(
            r#"
            UPDATE manager_grants
            SET status = 'inactive',
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE user_id = $1 AND community_id = $2 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(community_id)
        .fetch_optional(db)
        .await?;
        Ok(grant)
    }

    /// Raw grant record, whatever its status.
    pub async fn find<'e>(
        user_id: UserId,
        community_id: CommunityId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let grant = sqlx::query_as::<_, ManagerGrant>(
            "SELECT * FROM manager_grants WHERE user_id = $1 AND community_id = $2",
        )
        .bind(user_id)
        .bind(community_id)
        .fetch_optional(db)
        .await?;
        Ok(grant)
    }

    /// Active grants of a user that are backed by membership. A grant whose holder left the
    /// community is never returned, even if a revocation was missed.
    pub async fn find_active_for_user<'e>(
        user_id: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        let grants = sqlx::query_as::<_, ManagerGrant>(
            r#"
            SELECT g.*
            FROM manager_grants g
            JOIN communities c ON c.id = g.community_id
            WHERE g.user_id = $1
              AND g.status = 'active'
              AND g.deleted_at IS NULL
              AND c.deleted_at IS NULL
              AND g.user_id = ANY(c.members)
            ORDER BY g.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(grants)
    }
}
