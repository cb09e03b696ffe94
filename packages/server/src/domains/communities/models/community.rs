use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{CommunityId, ModerationError, Result, UserId};

/// Community - a tenant scope that exclusively owns its roster.
///
/// Invariants: `members` and `pending_requests` are disjoint, and neither contains
/// duplicates. Every roster mutation is a single-row conditional update that bumps
/// `roster_version`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    pub description: Option<String>,
    pub status: CommunityStatus,

    // Roster
    pub members: Vec<UserId>,
    pub pending_requests: Vec<UserId>,
    pub roster_version: i64,

    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "community_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommunityStatus {
    Active,
    Pending,
    Inactive,
}

impl std::fmt::Display for CommunityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunityStatus::Active => write!(f, "active"),
            CommunityStatus::Pending => write!(f, "pending"),
            CommunityStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for CommunityStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "active" => Ok(CommunityStatus::Active),
            "pending" => Ok(CommunityStatus::Pending),
            "inactive" => Ok(CommunityStatus::Inactive),
            _ => Err(anyhow::anyhow!("Invalid community status: {}", s)),
        }
    }
}

/// Whether a roster mutation changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterChange {
    Applied,
    /// The roster already had the requested shape (idempotent repeat).
    Unchanged,
}

impl Community {
    pub fn new(name: String, description: Option<String>, created_by: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: CommunityId::new(),
            name,
            description,
            status: CommunityStatus::Pending,
            members: Vec::new(),
            pending_requests: Vec::new(),
            roster_version: 0,
            created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    pub fn has_pending_request(&self, user_id: UserId) -> bool {
        self.pending_requests.contains(&user_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == CommunityStatus::Active && self.deleted_at.is_none()
    }

    /// Submissions are only accepted by active communities.
    pub fn ensure_active(&self) -> Result<()> {
        if !self.is_active() {
            return Err(ModerationError::CommunityNotActive);
        }
        Ok(())
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Community {
    pub async fn insert<'e>(community: &Community, db: impl PgExecutor<'e>) -> Result<Self> {
        let community = sqlx::query_as::<_, Community>(
            r#"
            INSERT INTO communities (id, name, description, status, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(community.id)
        .bind(&community.name)
        .bind(&community.description)
        .bind(community.status)
        .bind(community.created_by)
        .fetch_one(db)
        .await?;
        Ok(community)
    }

    pub async fn find_by_id<'e>(id: CommunityId, db: impl PgExecutor<'e>) -> Result<Option<Self>> {
        let community = sqlx::query_as::<_, Community>(
            "SELECT * FROM communities WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(community)
    }

    /// Lock the community row for the rest of the transaction.
    pub async fn find_for_update<'e>(
        id: CommunityId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let community = sqlx::query_as::<_, Community>(
            "SELECT * FROM communities WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(community)
    }

    pub async fn update_status<'e>(
        id: CommunityId,
        status: CommunityStatus,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let community = sqlx::query_as::<_, Community>(
            r#"
            UPDATE communities
            SET status = $2,
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(db)
        .await?;
        Ok(community)
    }

    /// Add a user to `pending_requests` unless they are already a member or pending.
    /// Returns `None` when nothing matched.
    pub async fn push_pending_request<'e>(
        id: CommunityId,
        user_id: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let community = sqlx::query_as::<_, Community>(
            r#"
            UPDATE communities
            SET pending_requests = array_append(pending_requests, $2),
                roster_version = roster_version + 1,
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1
              AND deleted_at IS NULL
              AND NOT ($2 = ANY(members))
              AND NOT ($2 = ANY(pending_requests))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(community)
    }

    /// Pull a user from `pending_requests`. Returns `None` when they were not pending.
    pub async fn pull_pending_request<'e>(
        id: CommunityId,
        user_id: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let community = sqlx::query_as::<_, Community>(
            r#"
            UPDATE communities
            SET pending_requests = array_remove(pending_requests, $2),
                roster_version = roster_version + 1,
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND $2 = ANY(pending_requests)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(community)
    }

    /// Move a user into `members` (and out of `pending_requests`) in one statement.
    /// Returns `None` when the user already was a member.
    pub async fn admit_member<'e>(
        id: CommunityId,
        user_id: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let community = sqlx::query_as::<_, Community>(
            r#"
            UPDATE communities
            SET members = array_append(members, $2),
                pending_requests = array_remove(pending_requests, $2),
                roster_version = roster_version + 1,
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND deleted_at IS NULL AND NOT ($2 = ANY(members))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(community)
    }

    /// Pull a user from `members`. Returns `None` when they were not a member.
    pub async fn pull_member<'e>(
        id: CommunityId,
        user_id: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let community = sqlx::query_as::<_, Community>(
            r#"
            UPDATE communities
            SET members = array_remove(members, $2),
                roster_version = roster_version + 1,
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND $2 = ANY(members)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(community)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_communities_start_pending_with_empty_roster() {
        let community = Community::new("Maple Court".to_string(), None, UserId::new());
        assert_eq!(community.status, CommunityStatus::Pending);
        assert!(community.members.is_empty());
        assert!(community.pending_requests.is_empty());
        assert!(matches!(
            community.ensure_active(),
            Err(ModerationError::CommunityNotActive)
        ));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            CommunityStatus::Active,
            CommunityStatus::Pending,
            CommunityStatus::Inactive,
        ] {
            assert_eq!(status.to_string().parse::<CommunityStatus>().unwrap(), status);
        }
    }

    #[test]
    fn deleted_communities_are_not_active() {
        let mut community = Community::new("Harbor Guild".to_string(), None, UserId::new());
        community.status = CommunityStatus::Active;
        assert!(community.is_active());
        community.deleted_at = Some(Utc::now());
        assert!(!community.is_active());
    }
}
