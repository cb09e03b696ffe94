use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::common::{AuditRecord, Audited, CommunityId, ItemId, Result, UserId, ValidatedPage};
use crate::domains::moderation::kinds::{ItemKind, ItemStatus, Moderatable};

/// ModeratedItem - a pulse, listing or directory entry moving through moderation.
///
/// `decided_by`/`decided_at` are set exactly when the item has left `pending`, and
/// `rejection_reason` exactly when it was rejected. Both are written by the single
/// conditional update that performs the decision.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModeratedItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub community_id: CommunityId,
    pub author_id: UserId,
    pub payload: serde_json::Value,
    pub media_urls: Vec<String>,
    pub status: ItemStatus,

    // Decision
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    // Post-approval transition (sold, closed)
    pub transitioned_by: Option<UserId>,
    pub transitioned_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Filter for community listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemQuery {
    pub community_id: CommunityId,
    pub kind: Option<ItemKind>,
    pub status: Option<ItemStatus>,
    /// Moderators see every status.
    pub include_unpublished: bool,
    /// Authors always see their own unpublished items.
    pub viewer: Option<UserId>,
}

impl ItemQuery {
    pub fn published(community_id: CommunityId) -> Self {
        Self {
            community_id,
            kind: None,
            status: None,
            include_unpublished: false,
            viewer: None,
        }
    }

    /// Whether `item` passes this filter. Mirrors the SQL in [`ModeratedItem::find_page`].
    pub fn matches(&self, item: &ModeratedItem) -> bool {
        item.community_id == self.community_id
            && item.deleted_at.is_none()
            && self.kind.map_or(true, |kind| item.kind == kind)
            && self.status.map_or(true, |status| item.status == status)
            && (self.include_unpublished
                || item.status.is_published()
                || self.viewer == Some(item.author_id))
    }
}

impl ModeratedItem {
    pub fn new<P: Moderatable>(
        community_id: CommunityId,
        author_id: UserId,
        payload: &P,
        media_urls: Vec<String>,
    ) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: ItemId::new(),
            kind: P::KIND,
            community_id,
            author_id,
            payload: serde_json::to_value(payload)?,
            media_urls,
            status: ItemStatus::Pending,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
            transitioned_by: None,
            transitioned_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Decode the payload into its typed form.
    pub fn payload_as<P: Moderatable>(&self) -> Result<P> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn is_pending(&self) -> bool {
        self.status == ItemStatus::Pending
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Audited for ModeratedItem {
    fn audit_record(&self) -> Option<AuditRecord> {
        match (self.decided_by, self.decided_at) {
            (Some(actor), Some(at)) => Some(AuditRecord {
                actor,
                at,
                outcome: match self.status {
                    // A sold or closed item was approved first; the decision is what we audit.
                    ItemStatus::Sold | ItemStatus::Closed => ItemStatus::Approved.to_string(),
                    status => status.to_string(),
                },
                reason: self.rejection_reason.clone(),
            }),
            _ => None,
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl ModeratedItem {
    pub async fn insert<'e>(item: &ModeratedItem, db: impl PgExecutor<'e>) -> Result<Self> {
        let item = sqlx::query_as::<_, ModeratedItem>(
            r#"
            INSERT INTO moderated_items (id, kind, community_id, author_id, payload, media_urls, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(item.kind)
        .bind(item.community_id)
        .bind(item.author_id)
        .bind(&item.payload)
        .bind(&item.media_urls)
        .fetch_one(db)
        .await?;
        Ok(item)
    }

    /// Live (not soft-deleted) item.
    pub async fn find_by_id<'e>(id: ItemId, db: impl PgExecutor<'e>) -> Result<Option<Self>> {
        let item = sqlx::query_as::<_, ModeratedItem>(
            "SELECT * FROM moderated_items WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(item)
    }

    /// Any item, soft-deleted or not.
    pub async fn find_any_by_id<'e>(id: ItemId, db: impl PgExecutor<'e>) -> Result<Option<Self>> {
        let item = sqlx::query_as::<_, ModeratedItem>("SELECT * FROM moderated_items WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(item)
    }

    /// Leave `pending` for `approved` or `rejected`. The `status = 'pending'` predicate is the
    /// compare-and-set: `None` means another decision got there first (or the item is gone).
    pub async fn decide<'e>(
        id: ItemId,
        status: ItemStatus,
        decided_by: UserId,
        rejection_reason: Option<&str>,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let item = sqlx::query_as::<_, ModeratedItem>(
            r#"
            UPDATE moderated_items
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
        .bind(decided_by)
        .bind(rejection_reason)
        .fetch_optional(db)
        .await?;
        Ok(item)
    }

    /// Move an approved item to a post-approval state. `None` when it is no longer approved.
    pub async fn transition<'e>(
        id: ItemId,
        status: ItemStatus,
        actor: UserId,
        db: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let item = sqlx::query_as::<_, ModeratedItem>(
            r#"
            UPDATE moderated_items
            SET status = $2,
                transitioned_by = $3,
                transitioned_at = NOW(),
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND status = 'approved' AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(actor)
        .fetch_optional(db)
        .await?;
        Ok(item)
    }

    /// Soft delete. Repeating it keeps the original `deleted_at`.
    pub async fn soft_delete<'e>(id: ItemId, db: impl PgExecutor<'e>) -> Result<Option<Self>> {
        let item = sqlx::query_as::<_, ModeratedItem>(
            r#"
            UPDATE moderated_items
            SET deleted_at = COALESCE(deleted_at, NOW()),
                updated_at = CASE
                    WHEN deleted_at IS NULL
                        THEN GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
                    ELSE updated_at
                END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(item)
    }

    /// One page of a community listing, newest first.
    pub async fn find_page<'e>(
        query: &ItemQuery,
        page: &ValidatedPage,
        db: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>> {
        let items = sqlx::query_as::<_, ModeratedItem>(
            r#"
            SELECT *
            FROM moderated_items
            WHERE community_id = $1
              AND deleted_at IS NULL
              AND ($2::item_kind IS NULL OR kind = $2)
              AND ($3::item_status IS NULL OR status = $3)
              AND ($4 OR status IN ('approved', 'sold', 'closed') OR author_id = $5)
            ORDER BY created_at DESC, id DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(query.community_id)
        .bind(query.kind)
        .bind(query.status)
        .bind(query.include_unpublished)
        .bind(query.viewer)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(db)
        .await?;
        Ok(items)
    }

    pub async fn count<'e>(query: &ItemQuery, db: impl PgExecutor<'e>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM moderated_items
            WHERE community_id = $1
              AND deleted_at IS NULL
              AND ($2::item_kind IS NULL OR kind = $2)
              AND ($3::item_status IS NULL OR status = $3)
              AND ($4 OR status IN ('approved', 'sold', 'closed') OR author_id = $5)
            "#,
        )
        .bind(query.community_id)
        .bind(query.kind)
        .bind(query.status)
        .bind(query.include_unpublished)
        .bind(query.viewer)
        .fetch_one(db)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::moderation::kinds::{ListingPayload, ListingType, PulsePayload};

    fn pulse(community_id: CommunityId, author_id: UserId) -> ModeratedItem {
        let payload = PulsePayload {
            title: "Water outage".to_string(),
            body: "Tower B, Tuesday 10am".to_string(),
        };
        ModeratedItem::new(community_id, author_id, &payload, Vec::new()).unwrap()
    }

    #[test]
    fn new_items_are_pending_without_a_decision() {
        let item = pulse(CommunityId::new(), UserId::new());
        assert_eq!(item.kind, ItemKind::Pulse);
        assert!(item.is_pending());
        assert!(item.audit_record().is_none());
    }

    #[test]
    fn payload_decodes_back_to_its_kind() {
        let listing = ListingPayload {
            title: "Bicycle".to_string(),
            description: "Blue".to_string(),
            listing_type: ListingType::Sell,
            price: Some(5000),
        };
        let item = ModeratedItem::new(CommunityId::new(), UserId::new(), &listing, Vec::new())
            .unwrap();
        assert_eq!(item.kind, ItemKind::Listing);
        assert_eq!(item.payload_as::<ListingPayload>().unwrap(), listing);
    }

    #[test]
    fn published_query_hides_pending_items_from_strangers() {
        let community_id = CommunityId::new();
        let author = UserId::new();
        let item = pulse(community_id, author);

        let mut query = ItemQuery::published(community_id);
        assert!(!query.matches(&item));

        query.viewer = Some(author);
        assert!(query.matches(&item));

        let moderator = ItemQuery {
            include_unpublished: true,
            ..ItemQuery::published(community_id)
        };
        assert!(moderator.matches(&item));
    }

    #[test]
    fn deleted_items_match_nothing() {
        let community_id = CommunityId::new();
        let mut item = pulse(community_id, UserId::new());
        item.status = ItemStatus::Approved;
        item.deleted_at = Some(Utc::now());
        let query = ItemQuery {
            include_unpublished: true,
            ..ItemQuery::published(community_id)
        };
        assert!(!query.matches(&item));
    }

    #[test]
    fn audit_record_reports_the_decision() {
        let mut item = pulse(CommunityId::new(), UserId::new());
        let moderator = UserId::new();
        item.status = ItemStatus::Sold;
        item.decided_by = Some(moderator);
        item.decided_at = Some(Utc::now());
        let record = item.audit_record().unwrap();
        assert_eq!(record.actor, moderator);
        assert_eq!(record.outcome, "approved");
    }
}
