// Trait definitions for dependency injection
//
// Base* traits are INFRASTRUCTURE only - no business logic. Moderation and membership rules
// live in domain actions that call through these traits.
//
// ModerationStore is the persistence seam. Each method is one atomic step: implementations
// must apply every write a method describes together or not at all.

use async_trait::async_trait;
use bytes::Bytes;

use crate::common::{
    AuthError, CommunityId, GlobalRole, ItemId, JoinRequestId, Permissions, Result,
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

// =============================================================================
// Identity Provider Trait (Infrastructure)
// =============================================================================

/// A token the identity provider vouched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub global_role: GlobalRole,
}

#[async_trait]
pub trait BaseIdentityProvider: Send + Sync {
    /// Verify a bearer token and return who it belongs to.
    async fn verify(&self, token: &str) -> std::result::Result<VerifiedIdentity, AuthError>;
}

// =============================================================================
// Media Store Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseMediaStore: Send + Sync {
    /// Store bytes under `folder` and return the public URL.
    async fn store(&self, bytes: Bytes, folder: &str) -> anyhow::Result<String>;

    /// Delete a stored object. Returns `false` when nothing was stored under `url`.
    async fn delete(&self, url: &str) -> anyhow::Result<bool>;
}

// =============================================================================
// Notification Bus Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseNotificationBus: Send + Sync {
    /// Publish a message to a subject.
    async fn publish(&self, subject: String, payload: Bytes) -> anyhow::Result<()>;
}

// =============================================================================
// Moderation Store Trait (Persistence)
// =============================================================================

/// Persistence for communities, rosters, grants, items and requests.
///
/// Compare-and-set methods return `Ok(None)` when the expected prior state was not found;
/// callers re-read to tell a lost race from a missing entity.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    // --- Communities ---

    async fn insert_community(&self, community: Community) -> Result<Community>;

    async fn find_community(&self, id: CommunityId) -> Result<Option<Community>>;

    async fn set_community_status(
        &self,
        id: CommunityId,
        status: CommunityStatus,
    ) -> Result<Option<Community>>;

    // --- Roster ---

    /// Add to `members`, pulling the user from `pending_requests` and approving their pending
    /// join request (decided by `added_by`) in the same step.
    /// `NotFound` when the community does not exist.
    async fn add_member(
        &self,
        community_id: CommunityId,
        user_id: UserId,
        added_by: UserId,
    ) -> Result<RosterChange>;

    /// Pull from `members` and deactivate any grant the user held there, together.
    async fn remove_member(
        &self,
        community_id: CommunityId,
        user_id: UserId,
    ) -> Result<RosterChange>;

    // --- Manager grants ---

    /// Create or reactivate the (user, community) grant. `Conflict` when the user is not a
    /// member; membership is checked under the same lock as the write.
    async fn upsert_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
        permissions: Permissions,
        granted_by: UserId,
    ) -> Result<ManagerGrant>;

    /// `None` when there was no active grant.
    async fn deactivate_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<ManagerGrant>>;

    /// The raw grant record, in any status.
    async fn find_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<ManagerGrant>>;

    /// Active grants backed by current membership.
    async fn active_grants_for_user(&self, user_id: UserId) -> Result<Vec<ManagerGrant>>;

    async fn find_role_assignment(&self, user_id: UserId) -> Result<Option<RoleAssignment>>;

    // --- Moderated items ---

    async fn insert_item(&self, item: ModeratedItem) -> Result<ModeratedItem>;

    /// Live items only; soft-deleted items are invisible.
    async fn find_item(&self, id: ItemId) -> Result<Option<ModeratedItem>>;

    /// Including soft-deleted items; for idempotent deletes and audit reads.
    async fn find_item_including_deleted(&self, id: ItemId) -> Result<Option<ModeratedItem>>;

    /// CAS from `pending`.
    async fn decide_item(
        &self,
        id: ItemId,
        status: ItemStatus,
        decided_by: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<ModeratedItem>>;

    /// CAS from `approved`.
    async fn transition_item(
        &self,
        id: ItemId,
        status: ItemStatus,
        actor: UserId,
    ) -> Result<Option<ModeratedItem>>;

    /// Idempotent; keeps the first `deleted_at`. `None` when the id never existed.
    async fn soft_delete_item(&self, id: ItemId) -> Result<Option<ModeratedItem>>;

    /// A page of matching items (newest first) and the total match count.
    async fn list_items(
        &self,
        query: &ItemQuery,
        page: &ValidatedPage,
    ) -> Result<(Vec<ModeratedItem>, i64)>;

    // --- Join requests ---

    /// Insert a pending request and add the user to `pending_requests`. `Conflict` when
    /// the user is already a member or already pending.
    async fn insert_join_request(&self, request: JoinRequest) -> Result<JoinRequest>;

    async fn find_join_request(&self, id: JoinRequestId) -> Result<Option<JoinRequest>>;

    /// CAS to `approved` and admit the user to `members`, together. A user who is already
    /// a member yields `RosterChange::Unchanged`.
    async fn approve_join_request(
        &self,
        id: JoinRequestId,
        decided_by: UserId,
    ) -> Result<Option<(JoinRequest, RosterChange)>>;

    /// CAS to `rejected` or `withdrawn` and pull the user from `pending_requests`.
    async fn close_join_request(
        &self,
        id: JoinRequestId,
        status: RequestStatus,
        actor: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<JoinRequest>>;

    async fn list_join_requests(
        &self,
        community_id: CommunityId,
        status: Option<RequestStatus>,
        page: &ValidatedPage,
    ) -> Result<(Vec<JoinRequest>, i64)>;

    // --- Role change requests ---

    /// `Conflict` when the same (user, community, requested role) was asked before.
    async fn insert_role_change_request(
        &self,
        request: RoleChangeRequest,
    ) -> Result<RoleChangeRequest>;

    async fn find_role_change_request(
        &self,
        id: RoleChangeRequestId,
    ) -> Result<Option<RoleChangeRequest>>;

    /// CAS to `approved` and apply the role, together:
    /// `manager` upserts the grant (`Conflict` for non-members, request stays pending),
    /// `user` deactivates it, `admin`/`super_admin` write the role assignment.
    async fn approve_role_change_request(
        &self,
        id: RoleChangeRequestId,
        reviewed_by: UserId,
    ) -> Result<Option<RoleChangeOutcome>>;

    /// CAS to `rejected` or `withdrawn`. Never touches grants or assignments.
    async fn close_role_change_request(
        &self,
        id: RoleChangeRequestId,
        status: RequestStatus,
        actor: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<RoleChangeRequest>>;

    async fn list_role_change_requests(
        &self,
        community_id: CommunityId,
        status: Option<RequestStatus>,
        page: &ValidatedPage,
    ) -> Result<(Vec<RoleChangeRequest>, i64)>;
}
