//! PostgreSQL implementation of [`ModerationStore`].
//!
//! Every SQL statement lives in `domains/*/models`; this adapter only decides which of them
//! share a transaction.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::traits::ModerationStore;
use crate::common::{
    CommunityId, GlobalRole, ItemId, JoinRequestId, ModerationError, Permissions, Result,
    RoleChangeRequestId, UserId, ValidatedPage,
};
use crate::domains::communities::models::{
    Community, CommunityStatus, ManagerGrant, RoleAssignment, RosterChange,
};
use crate::domains::moderation::kinds::ItemStatus;
use crate::domains::moderation::models::{ItemQuery, ModeratedItem};
use crate::domains::requests::models::{
    JoinRequest, RequestStatus, RoleChangeOutcome, RoleChangeRequest,
};

#[derive(Clone)]
pub struct PgModerationStore {
    pool: PgPool,
}

impl PgModerationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn not_a_member(user_id: UserId, community_id: CommunityId) -> ModerationError {
    ModerationError::Conflict(format!(
        "user {} is not a member of community {}",
        user_id, community_id
    ))
}

#[async_trait]
impl ModerationStore for PgModerationStore {
    async fn insert_community(&self, community: Community) -> Result<Community> {
        Community::insert(&community, &self.pool).await
    }

    async fn find_community(&self, id: CommunityId) -> Result<Option<Community>> {
        Community::find_by_id(id, &self.pool).await
    }

    async fn set_community_status(
        &self,
        id: CommunityId,
        status: CommunityStatus,
    ) -> Result<Option<Community>> {
        Community::update_status(id, status, &self.pool).await
    }

    async fn add_member(
        &self,
        community_id: CommunityId,
        user_id: UserId,
        added_by: UserId,
    ) -> Result<RosterChange> {
        let mut tx = self.pool.begin().await?;

        if Community::admit_member(community_id, user_id, &mut *tx)
            .await?
            .is_some()
        {
            let closed =
                JoinRequest::approve_pending_for(user_id, community_id, added_by, &mut *tx).await?;
            if !closed.is_empty() {
                debug!(%user_id, %community_id, "pending join request approved by direct add");
            }
            tx.commit().await?;
            return Ok(RosterChange::Applied);
        }
        tx.rollback().await?;
        match Community::find_by_id(community_id, &self.pool).await? {
            Some(_) => Ok(RosterChange::Unchanged),
            None => Err(ModerationError::not_found(format!("community {}", community_id))),
        }
    }

    async fn remove_member(
        &self,
        community_id: CommunityId,
        user_id: UserId,
    ) -> Result<RosterChange> {
        let mut tx = self.pool.begin().await?;

        let Some(_) = Community::pull_member(community_id, user_id, &mut *tx).await? else {
            tx.rollback().await?;
            return match Community::find_by_id(community_id, &self.pool).await? {
                Some(_) => Ok(RosterChange::Unchanged),
                None => Err(ModerationError::not_found(format!("community {}", community_id))),
            };
        };
        if ManagerGrant::deactivate(user_id, community_id, &mut *tx)
            .await?
            .is_some()
        {
            debug!(%user_id, %community_id, "grant revoked with membership");
        }

        tx.commit().await?;
        Ok(RosterChange::Applied)
    }

    async fn upsert_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
        permissions: Permissions,
        granted_by: UserId,
    ) -> Result<ManagerGrant> {
        let mut tx = self.pool.begin().await?;

        // The row lock keeps a concurrent remove_member from slipping in between.
        let community = Community::find_for_update(community_id, &mut *tx)
            .await?
            .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))?;
        if !community.is_member(user_id) {
            return Err(not_a_member(user_id, community_id));
        }
        let grant =
            ManagerGrant::upsert(user_id, community_id, permissions, granted_by, &mut *tx).await?;

        tx.commit().await?;
        Ok(grant)
    }

    async fn deactivate_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<ManagerGrant>> {
        ManagerGrant::deactivate(user_id, community_id, &self.pool).await
    }

    async fn find_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<ManagerGrant>> {
        ManagerGrant::find(user_id, community_id, &self.pool).await
    }

    async fn active_grants_for_user(&self, user_id: UserId) -> Result<Vec<ManagerGrant>> {
        ManagerGrant::find_active_for_user(user_id, &self.pool).await
    }

    async fn find_role_assignment(&self, user_id: UserId) -> Result<Option<RoleAssignment>> {
        RoleAssignment::find_by_user(user_id, &self.pool).await
    }

    async fn insert_item(&self, item: ModeratedItem) -> Result<ModeratedItem> {
        ModeratedItem::insert(&item, &self.pool).await
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<ModeratedItem>> {
        ModeratedItem::find_by_id(id, &self.pool).await
    }

    async fn find_item_including_deleted(&self, id: ItemId) -> Result<Option<ModeratedItem>> {
        ModeratedItem::find_any_by_id(id, &self.pool).await
    }

    async fn decide_item(
        &self,
        id: ItemId,
        status: ItemStatus,
        decided_by: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<ModeratedItem>> {
        ModeratedItem::decide(id, status, decided_by, rejection_reason.as_deref(), &self.pool)
            .await
    }

    async fn transition_item(
        &self,
        id: ItemId,
        status: ItemStatus,
        actor: UserId,
    ) -> Result<Option<ModeratedItem>> {
        ModeratedItem::transition(id, status, actor, &self.pool).await
    }

    async fn soft_delete_item(&self, id: ItemId) -> Result<Option<ModeratedItem>> {
        ModeratedItem::soft_delete(id, &self.pool).await
    }

    async fn list_items(
        &self,
        query: &ItemQuery,
        page: &ValidatedPage,
    ) -> Result<(Vec<ModeratedItem>, i64)> {
        let items = ModeratedItem::find_page(query, page, &self.pool).await?;
        let total = ModeratedItem::count(query, &self.pool).await?;
        Ok((items, total))
    }

    async fn insert_join_request(&self, request: JoinRequest) -> Result<JoinRequest> {
        let mut tx = self.pool.begin().await?;

        let pushed =
            Community::push_pending_request(request.community_id, request.user_id, &mut *tx)
                .await?;
        if pushed.is_none() {
            tx.rollback().await?;
            let community = Community::find_by_id(request.community_id, &self.pool)
                .await?
                .ok_or_else(|| {
                    ModerationError::not_found(format!("community {}", request.community_id))
                })?;
            return Err(if community.is_member(request.user_id) {
                ModerationError::Conflict("already a member".to_string())
            } else {
                ModerationError::Conflict("a join request is already pending".to_string())
            });
        }
        let request = JoinRequest::insert(&request, &mut *tx).await?;

        tx.commit().await?;
        Ok(request)
    }

    async fn find_join_request(&self, id: JoinRequestId) -> Result<Option<JoinRequest>> {
        JoinRequest::find_by_id(id, &self.pool).await
    }

    async fn approve_join_request(
        &self,
        id: JoinRequestId,
        decided_by: UserId,
    ) -> Result<Option<(JoinRequest, RosterChange)>> {
        let mut tx = self.pool.begin().await?;

        let Some(request) =
            JoinRequest::close(id, RequestStatus::Approved, decided_by, None, &mut *tx).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        let change = match Community::admit_member(request.community_id, request.user_id, &mut *tx)
            .await?
        {
            Some(_) => RosterChange::Applied,
            None => RosterChange::Unchanged,
        };

        tx.commit().await?;
        Ok(Some((request, change)))
    }

    async fn close_join_request(
        &self,
        id: JoinRequestId,
        status: RequestStatus,
        actor: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<JoinRequest>> {
        let mut tx = self.pool.begin().await?;

        let Some(request) =
            JoinRequest::close(id, status, actor, rejection_reason.as_deref(), &mut *tx).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        Community::pull_pending_request(request.community_id, request.user_id, &mut *tx).await?;

        tx.commit().await?;
        Ok(Some(request))
    }

    async fn list_join_requests(
        &self,
        community_id: CommunityId,
        status: Option<RequestStatus>,
        page: &ValidatedPage,
    ) -> Result<(Vec<JoinRequest>, i64)> {
        let requests = JoinRequest::find_by_community(
            community_id,
            status,
            page.limit(),
            page.offset(),
            &self.pool,
        )
        .await?;
        let total = JoinRequest::count_by_community(community_id, status, &self.pool).await?;
        Ok((requests, total))
    }

    async fn insert_role_change_request(
        &self,
        request: RoleChangeRequest,
    ) -> Result<RoleChangeRequest> {
        RoleChangeRequest::insert(&request, &self.pool).await
    }

    async fn find_role_change_request(
        &self,
        id: RoleChangeRequestId,
    ) -> Result<Option<RoleChangeRequest>> {
        RoleChangeRequest::find_by_id(id, &self.pool).await
    }

    async fn approve_role_change_request(
        &self,
        id: RoleChangeRequestId,
        reviewed_by: UserId,
    ) -> Result<Option<RoleChangeOutcome>> {
        let mut tx = self.pool.begin().await?;

        let Some(request) =
            RoleChangeRequest::close(id, RequestStatus::Approved, reviewed_by, None, &mut *tx)
                .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut approval = RoleChangeOutcome {
            request,
            grant: None,
            assignment: None,
        };
        let (user_id, community_id) = (approval.request.user_id, approval.request.community_id);
        match approval.request.requested_role {
            GlobalRole::Manager => {
                let community = Community::find_for_update(community_id, &mut *tx)
                    .await?
                    .ok_or_else(|| {
                        ModerationError::not_found(format!("community {}", community_id))
                    })?;
                // Returning here drops the transaction, so the request stays pending.
                if !community.is_member(user_id) {
                    return Err(not_a_member(user_id, community_id));
                }
                approval.grant = Some(
                    ManagerGrant::upsert(
                        user_id,
                        community_id,
                        Permissions::all(),
                        reviewed_by,
                        &mut *tx,
                    )
                    .await?,
                );
            }
            GlobalRole::User => {
                approval.grant = ManagerGrant::deactivate(user_id, community_id, &mut *tx).await?;
            }
            role @ (GlobalRole::Admin | GlobalRole::SuperAdmin) => {
                approval.assignment =
                    Some(RoleAssignment::upsert(user_id, role, reviewed_by, &mut *tx).await?);
            }
        }

        tx.commit().await?;
        Ok(Some(approval))
    }

    async fn close_role_change_request(
        &self,
        id: RoleChangeRequestId,
        status: RequestStatus,
        actor: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<RoleChangeRequest>> {
        RoleChangeRequest::close(id, status, actor, rejection_reason.as_deref(), &self.pool).await
    }

    async fn list_role_change_requests(
        &self,
        community_id: CommunityId,
        status: Option<RequestStatus>,
        page: &ValidatedPage,
    ) -> Result<(Vec<RoleChangeRequest>, i64)> {
        let requests = RoleChangeRequest::find_by_community(
            community_id,
            status,
            page.limit(),
            page.offset(),
            &self.pool,
        )
        .await?;
        let total =
            RoleChangeRequest::count_by_community(community_id, status, &self.pool).await?;
        Ok((requests, total))
    }
}
