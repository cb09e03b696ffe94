use serde::{Deserialize, Serialize};

use crate::common::{
    Action, Actor, AuthError, Caller, CommunityId, GlobalRole, ModerationError, PageArgs,
    Paginated, Result, Target,
};
use crate::domains::moderation::kinds::ItemStatus;
use crate::domains::moderation::models::{ItemQuery, ModeratedItem};
use crate::domains::requests::models::{JoinRequest, RequestStatus, RoleChangeRequest};
use crate::kernel::ServerDeps;

/// Everything waiting for a decision in one community, limited to what the caller may decide.
/// A section the caller has no authority over is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQueue {
    pub community_id: CommunityId,
    pub items: Option<Paginated<ModeratedItem>>,
    pub join_requests: Option<Paginated<JoinRequest>>,
    pub role_change_requests: Option<Paginated<RoleChangeRequest>>,
}

fn allowed(caller: &Caller, action: Action, community_id: CommunityId) -> bool {
    Actor::new(caller)
        .can(action)
        .on(Target::community(community_id))
        .decide()
        .is_allowed()
}

/// Pending work for a community, scoped by the caller's grants: items need `ManagePosts`,
/// join requests need `ApproveJoinRequests`, role changes need a platform administrator.
pub async fn list_pending_for_community(
    community_id: CommunityId,
    page: PageArgs,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<PendingQueue> {
    if caller.is_guest() {
        return Err(AuthError::AuthenticationRequired.into());
    }
    let page = page.validate_with(deps.default_page_limit)?;

    let sees_items = allowed(caller, Action::ViewPending, community_id);
    let sees_joins = allowed(caller, Action::DecideJoinRequest, community_id);
    let sees_roles = allowed(
        caller,
        Action::DecideRoleChange {
            requested_role: GlobalRole::Manager,
        },
        community_id,
    );
    if !(sees_items || sees_joins || sees_roles) {
        return Err(ModerationError::Forbidden(format!(
            "no moderation rights in community {}",
            community_id
        )));
    }

    deps.store
        .find_community(community_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))?;

    let items = if sees_items {
        let query = ItemQuery {
            community_id,
            kind: None,
            status: Some(ItemStatus::Pending),
            include_unpublished: true,
            viewer: Some(caller.user_id),
        };
        let (items, total) = deps.store.list_items(&query, &page).await?;
        Some(Paginated::new(items, total, &page))
    } else {
        None
    };

    let join_requests = if sees_joins {
        let (requests, total) = deps
            .store
            .list_join_requests(community_id, Some(RequestStatus::Pending), &page)
            .await?;
        Some(Paginated::new(requests, total, &page))
    } else {
        None
    };

    let role_change_requests = if sees_roles {
        let (requests, total) = deps
            .store
            .list_role_change_requests(community_id, Some(RequestStatus::Pending), &page)
            .await?;
        Some(Paginated::new(requests, total, &page))
    } else {
        None
    };

    Ok(PendingQueue {
        community_id,
        items,
        join_requests,
        role_change_requests,
    })
}
