use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{GlobalRole, Result, UserId};

/// RoleAssignment - platform role granted through an approved role change request.
///
/// The identity provider's role is the floor; an assignment can only raise it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleAssignment {
    pub user_id: UserId,
    pub role: GlobalRole,
    pub assigned_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    pub fn new(user_id: UserId, role: GlobalRole, assigned_by: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            role,
            assigned_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

impl RoleAssignment {
    pub async fn upsert<'e>(
        user_id: UserId,
        role: GlobalRole,
        assigned_by: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Self> {
        let assignment = sqlx::query_as::<_, RoleAssignment>(
            r#"
            INSERT INTO role_assignments (user_id, role, assigned_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                role = EXCLUDED.role,
                assigned_by = EXCLUDED.assigned_by,
                deleted_at = NULL,
                updated_at = GREATEST(NOW(), role_assignments.updated_at + INTERVAL '1 microsecond')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(role)
        .bind(assigned_by)
        .fetch_one(db)
        .await?;
        Ok(assignment)
    }

    pub async fn find_by_user<'e>(
        user_id: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let assignment = sqlx::query_as::<_, RoleAssignment>(
            "SELECT * FROM role_assignments WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(assignment)
    }
}
