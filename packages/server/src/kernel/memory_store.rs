//! In-process implementation of [`ModerationStore`].
//!
//! One mutex guards all state, so every trait method is a single critical section and
//! gets the same all-or-nothing behavior the PostgreSQL store gets from transactions.
//! Used by tests and local tooling.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::traits::ModerationStore;
use crate::common::audit::advance_timestamp;
use crate::common::{
    CommunityId, GlobalRole, ItemId, JoinRequestId, ModerationError, Permissions, Result,
    RoleChangeRequestId, UserId, ValidatedPage,
};
use crate::domains::communities::models::{
    Community, CommunityStatus, GrantStatus, ManagerGrant, RoleAssignment, RosterChange,
};
use crate::domains::moderation::kinds::ItemStatus;
use crate::domains::moderation::models::{ItemQuery, ModeratedItem};
use crate::domains::requests::models::{
    JoinRequest, RequestStatus, RoleChangeOutcome, RoleChangeRequest,
};

#[derive(Default)]
struct State {
    communities: HashMap<CommunityId, Community>,
    grants: HashMap<(UserId, CommunityId), ManagerGrant>,
    assignments: HashMap<UserId, RoleAssignment>,
    items: HashMap<ItemId, ModeratedItem>,
    join_requests: HashMap<JoinRequestId, JoinRequest>,
    role_requests: HashMap<RoleChangeRequestId, RoleChangeRequest>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    reject_item_inserts: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `insert_item` fail until switched back off. Lets tests drive the submit
    /// cleanup path.
    pub fn reject_item_inserts(&self, reject: bool) {
        self.reject_item_inserts.store(reject, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn community_not_found(id: CommunityId) -> ModerationError {
    ModerationError::not_found(format!("community {}", id))
}

fn page_of<T: Clone>(rows: Vec<T>, page: &ValidatedPage) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let rows = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (rows, total)
}

impl State {
    fn live_community(&mut self, id: CommunityId) -> Result<&mut Community> {
        self.communities
            .get_mut(&id)
            .filter(|c| c.deleted_at.is_none())
            .ok_or_else(|| community_not_found(id))
    }

    fn touch_roster(community: &mut Community) {
        community.roster_version += 1;
        community.updated_at = advance_timestamp(community.updated_at);
    }

    fn admit(&mut self, community_id: CommunityId, user_id: UserId) -> Result<RosterChange> {
        let community = self.live_community(community_id)?;
        if community.is_member(user_id) {
            return Ok(RosterChange::Unchanged);
        }
        community.pending_requests.retain(|id| *id != user_id);
        community.members.push(user_id);
        Self::touch_roster(community);
        Ok(RosterChange::Applied)
    }

    fn approve_pending_join(&mut self, user_id: UserId, community_id: CommunityId, by: UserId) {
        for request in self.join_requests.values_mut().filter(|r| {
            r.user_id == user_id
                && r.community_id == community_id
                && r.is_pending()
                && r.deleted_at.is_none()
        }) {
            request.status = RequestStatus::Approved;
            request.decided_by = Some(by);
            request.decided_at = Some(Utc::now());
            request.updated_at = advance_timestamp(request.updated_at);
        }
    }

    fn has_pending_join(&self, user_id: UserId, community_id: CommunityId) -> bool {
        self.join_requests.values().any(|r| {
            r.user_id == user_id
                && r.community_id == community_id
                && r.is_pending()
                && r.deleted_at.is_none()
        })
    }

    fn deactivate_grant(
        &mut self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Option<ManagerGrant> {
        let grant = self
            .grants
            .get_mut(&(user_id, community_id))
            .filter(|g| g.status == GrantStatus::Active)?;
        grant.status = GrantStatus::Inactive;
        grant.updated_at = advance_timestamp(grant.updated_at);
        Some(grant.clone())
    }

    fn upsert_grant(
        &mut self,
        user_id: UserId,
        community_id: CommunityId,
        permissions: Permissions,
        granted_by: UserId,
    ) -> Result<ManagerGrant> {
        if !self.live_community(community_id)?.is_member(user_id) {
            return Err(ModerationError::Conflict(format!(
                "user {} is not a member of community {}",
                user_id, community_id
            )));
        }
        let grant = self
            .grants
            .entry((user_id, community_id))
            .and_modify(|grant| {
                grant.permissions = permissions;
                grant.status = GrantStatus::Active;
                grant.granted_by = granted_by;
                grant.deleted_at = None;
                grant.updated_at = advance_timestamp(grant.updated_at);
            })
            .or_insert_with(|| ManagerGrant::new(user_id, community_id, permissions, granted_by));
        Ok(grant.clone())
    }
}

#[async_trait]
impl ModerationStore for InMemoryStore {
    async fn insert_community(&self, community: Community) -> Result<Community> {
        let mut state = self.state();
        if state.communities.contains_key(&community.id) {
            return Err(ModerationError::Conflict("communities_pkey".to_string()));
        }
        state.communities.insert(community.id, community.clone());
        Ok(community)
    }

    async fn find_community(&self, id: CommunityId) -> Result<Option<Community>> {
        let state = self.state();
        Ok(state
            .communities
            .get(&id)
            .filter(|c| c.deleted_at.is_none())
            .cloned())
    }

    async fn set_community_status(
        &self,
        id: CommunityId,
        status: CommunityStatus,
    ) -> Result<Option<Community>> {
        let mut state = self.state();
        let Ok(community) = state.live_community(id) else {
            return Ok(None);
        };
        community.status = status;
        community.updated_at = advance_timestamp(community.updated_at);
        Ok(Some(community.clone()))
    }

    async fn add_member(
        &self,
        community_id: CommunityId,
        user_id: UserId,
        added_by: UserId,
    ) -> Result<RosterChange> {
        let mut state = self.state();
        let change = state.admit(community_id, user_id)?;
        if change == RosterChange::Applied {
            state.approve_pending_join(user_id, community_id, added_by);
        }
        Ok(change)
    }

    async fn remove_member(
        &self,
        community_id: CommunityId,
        user_id: UserId,
    ) -> Result<RosterChange> {
        let mut state = self.state();
        let community = state.live_community(community_id)?;
        if !community.is_member(user_id) {
            return Ok(RosterChange::Unchanged);
        }
        community.members.retain(|id| *id != user_id);
        State::touch_roster(community);
        state.deactivate_grant(user_id, community_id);
        Ok(RosterChange::Applied)
    }

    async fn upsert_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
        permissions: Permissions,
        granted_by: UserId,
    ) -> Result<ManagerGrant> {
        self.state()
            .upsert_grant(user_id, community_id, permissions, granted_by)
    }

    async fn deactivate_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<ManagerGrant>> {
        Ok(self.state().deactivate_grant(user_id, community_id))
    }

    async fn find_grant(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<ManagerGrant>> {
        Ok(self.state().grants.get(&(user_id, community_id)).cloned())
    }

    async fn active_grants_for_user(&self, user_id: UserId) -> Result<Vec<ManagerGrant>> {
        let state = self.state();
        let mut grants: Vec<ManagerGrant> = state
            .grants
            .values()
            .filter(|g| g.user_id == user_id && g.is_active())
            .filter(|g| {
                state
                    .communities
                    .get(&g.community_id)
                    .is_some_and(|c| c.deleted_at.is_none() && c.is_member(user_id))
            })
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn find_role_assignment(&self, user_id: UserId) -> Result<Option<RoleAssignment>> {
        let state = self.state();
        Ok(state
            .assignments
            .get(&user_id)
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn insert_item(&self, item: ModeratedItem) -> Result<ModeratedItem> {
        if self.reject_item_inserts.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("item storage unavailable").into());
        }
        let mut state = self.state();
        state.live_community(item.community_id)?;
        if state.items.contains_key(&item.id) {
            return Err(ModerationError::Conflict("moderated_items_pkey".to_string()));
        }
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<ModeratedItem>> {
        let state = self.state();
        Ok(state.items.get(&id).filter(|i| !i.is_deleted()).cloned())
    }

    async fn find_item_including_deleted(&self, id: ItemId) -> Result<Option<ModeratedItem>> {
        Ok(self.state().items.get(&id).cloned())
    }

    async fn decide_item(
        &self,
        id: ItemId,
        status: ItemStatus,
        decided_by: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<ModeratedItem>> {
        let mut state = self.state();
        let Some(item) = state
            .items
            .get_mut(&id)
            .filter(|i| i.is_pending() && !i.is_deleted())
        else {
            return Ok(None);
        };
        item.status = status;
        item.decided_by = Some(decided_by);
        item.decided_at = Some(Utc::now());
        item.rejection_reason = rejection_reason;
        item.updated_at = advance_timestamp(item.updated_at);
        Ok(Some(item.clone()))
    }

    async fn transition_item(
        &self,
        id: ItemId,
        status: ItemStatus,
        actor: UserId,
    ) -> Result<Option<ModeratedItem>> {
        let mut state = self.state();
        let Some(item) = state
            .items
            .get_mut(&id)
            .filter(|i| i.status == ItemStatus::Approved && !i.is_deleted())
        else {
            return Ok(None);
        };
        item.status = status;
        item.transitioned_by = Some(actor);
        item.transitioned_at = Some(Utc::now());
        item.updated_at = advance_timestamp(item.updated_at);
        Ok(Some(item.clone()))
    }

    async fn soft_delete_item(&self, id: ItemId) -> Result<Option<ModeratedItem>> {
        let mut state = self.state();
        let Some(item) = state.items.get_mut(&id) else {
            return Ok(None);
        };
        if item.deleted_at.is_none() {
            item.deleted_at = Some(Utc::now());
            item.updated_at = advance_timestamp(item.updated_at);
        }
        Ok(Some(item.clone()))
    }

    async fn list_items(
        &self,
        query: &ItemQuery,
        page: &ValidatedPage,
    ) -> Result<(Vec<ModeratedItem>, i64)> {
        let state = self.state();
        let mut items: Vec<ModeratedItem> = state
            .items
            .values()
            .filter(|i| query.matches(i))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page_of(items, page))
    }

    async fn insert_join_request(&self, request: JoinRequest) -> Result<JoinRequest> {
        let mut state = self.state();
        let open_row = state.has_pending_join(request.user_id, request.community_id);
        let community = state.live_community(request.community_id)?;
        if community.is_member(request.user_id) {
            return Err(ModerationError::Conflict("already a member".to_string()));
        }
        if open_row || community.has_pending_request(request.user_id) {
            return Err(ModerationError::Conflict(
                "a join request is already pending".to_string(),
            ));
        }
        community.pending_requests.push(request.user_id);
        State::touch_roster(community);
        state.join_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_join_request(&self, id: JoinRequestId) -> Result<Option<JoinRequest>> {
        let state = self.state();
        Ok(state
            .join_requests
            .get(&id)
            .filter(|r| r.deleted_at.is_none())
            .cloned())
    }

    async fn approve_join_request(
        &self,
        id: JoinRequestId,
        decided_by: UserId,
    ) -> Result<Option<(JoinRequest, RosterChange)>> {
        let mut state = self.state();
        let Some(request) = state
            .join_requests
            .get(&id)
            .filter(|r| r.is_pending() && r.deleted_at.is_none())
            .cloned()
        else {
            return Ok(None);
        };
        // Admit first: if the community is gone nothing has been written yet.
        let change = state.admit(request.community_id, request.user_id)?;

        let mut request = request;
        request.status = RequestStatus::Approved;
        request.decided_by = Some(decided_by);
        request.decided_at = Some(Utc::now());
        request.updated_at = advance_timestamp(request.updated_at);
        state.join_requests.insert(id, request.clone());
        Ok(Some((request, change)))
    }

    async fn close_join_request(
        &self,
        id: JoinRequestId,
        status: RequestStatus,
        actor: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<JoinRequest>> {
        let mut state = self.state();
        let Some(request) = state
            .join_requests
            .get_mut(&id)
            .filter(|r| r.is_pending() && r.deleted_at.is_none())
        else {
            return Ok(None);
        };
        request.status = status;
        request.decided_by = Some(actor);
        request.decided_at = Some(Utc::now());
        request.rejection_reason = rejection_reason;
        request.updated_at = advance_timestamp(request.updated_at);
        let request = request.clone();

        if let Some(community) = state.communities.get_mut(&request.community_id) {
            if community.has_pending_request(request.user_id) {
                community.pending_requests.retain(|id| *id != request.user_id);
                State::touch_roster(community);
            }
        }
        Ok(Some(request))
    }

    async fn list_join_requests(
        &self,
        community_id: CommunityId,
        status: Option<RequestStatus>,
        page: &ValidatedPage,
    ) -> Result<(Vec<JoinRequest>, i64)> {
        let state = self.state();
        let mut requests: Vec<JoinRequest> = state
            .join_requests
            .values()
            .filter(|r| r.community_id == community_id && r.deleted_at.is_none())
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(page_of(requests, page))
    }

    async fn insert_role_change_request(
        &self,
        request: RoleChangeRequest,
    ) -> Result<RoleChangeRequest> {
        let mut state = self.state();
        let duplicate = state
            .role_requests
            .values()
            .any(|r| r.deleted_at.is_none() && r.duplicates(&request));
        if duplicate {
            return Err(ModerationError::Conflict(
                "role_change_requests_unique".to_string(),
            ));
        }
        state.role_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_role_change_request(
        &self,
        id: RoleChangeRequestId,
    ) -> Result<Option<RoleChangeRequest>> {
        let state = self.state();
        Ok(state
            .role_requests
            .get(&id)
            .filter(|r| r.deleted_at.is_none())
            .cloned())
    }

    async fn approve_role_change_request(
        &self,
        id: RoleChangeRequestId,
        reviewed_by: UserId,
    ) -> Result<Option<RoleChangeOutcome>> {
        let mut state = self.state();
        let Some(mut request) = state
            .role_requests
            .get(&id)
            .filter(|r| r.is_pending() && r.deleted_at.is_none())
            .cloned()
        else {
            return Ok(None);
        };
        let (user_id, community_id) = (request.user_id, request.community_id);

        // Apply the role before recording the decision so a failure leaves the request pending.
        let (grant, assignment) = match request.requested_role {
            GlobalRole::Manager => (
                Some(state.upsert_grant(user_id, community_id, Permissions::all(), reviewed_by)?),
                None,
            ),
            GlobalRole::User => (state.deactivate_grant(user_id, community_id), None),
            role @ (GlobalRole::Admin | GlobalRole::SuperAdmin) => {
                let assignment = state
                    .assignments
                    .entry(user_id)
                    .and_modify(|a| {
                        a.role = role;
                        a.assigned_by = reviewed_by;
                        a.deleted_at = None;
                        a.updated_at = advance_timestamp(a.updated_at);
                    })
                    .or_insert_with(|| RoleAssignment::new(user_id, role, reviewed_by))
                    .clone();
                (None, Some(assignment))
            }
        };

        request.status = RequestStatus::Approved;
        request.reviewed_by = Some(reviewed_by);
        request.reviewed_at = Some(Utc::now());
        request.updated_at = advance_timestamp(request.updated_at);
        state.role_requests.insert(id, request.clone());

        Ok(Some(RoleChangeOutcome {
            request,
            grant,
            assignment,
        }))
    }

    async fn close_role_change_request(
        &self,
        id: RoleChangeRequestId,
        status: RequestStatus,
        actor: UserId,
        rejection_reason: Option<String>,
    ) -> Result<Option<RoleChangeRequest>> {
        let mut state = self.state();
        let Some(request) = state
            .role_requests
            .get_mut(&id)
            .filter(|r| r.is_pending() && r.deleted_at.is_none())
        else {
            return Ok(None);
        };
        request.status = status;
        request.reviewed_by = Some(actor);
        request.reviewed_at = Some(Utc::now());
        request.rejection_reason = rejection_reason;
        request.updated_at = advance_timestamp(request.updated_at);
        Ok(Some(request.clone()))
    }

    async fn list_role_change_requests(
        &self,
        community_id: CommunityId,
        status: Option<RequestStatus>,
        page: &ValidatedPage,
    ) -> Result<(Vec<RoleChangeRequest>, i64)> {
        let state = self.state();
        let mut requests: Vec<RoleChangeRequest> = state
            .role_requests
            .values()
            .filter(|r| r.community_id == community_id && r.deleted_at.is_none())
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(page_of(requests, page))
    }
}
