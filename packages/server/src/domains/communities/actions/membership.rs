//! Membership store actions: roster changes and manager grants.
//!
//! Every roster write is a single atomic store call. Removing a member revokes their grant in
//! the same step, and grant reads re-check membership, so a non-member never holds manager
//! permissions.

use tracing::info;

use crate::common::{
    Action, Actor, Caller, CommunityId, ModerationError, Permissions, Result, Target, UserId,
};
use crate::domains::communities::events::MembershipEvent;
use crate::domains::communities::models::{ManagerGrant, RosterChange};
use crate::kernel::{publish_event, ServerDeps};

/// Add a user directly, bypassing the join request flow. Adding an existing member is a
/// no-op reported as [`RosterChange::Unchanged`].
pub async fn add_member(
    community_id: CommunityId,
    user_id: UserId,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<RosterChange> {
    Actor::new(caller)
        .can(Action::AddMember)
        .on(Target::community(community_id))
        .check()?;

    let change = deps
        .store
        .add_member(community_id, user_id, caller.user_id)
        .await?;
    if change == RosterChange::Applied {
        info!(%community_id, %user_id, added_by = %caller.user_id, "member added");
        publish_event(
            deps,
            &MembershipEvent::MemberAdded {
                community_id,
                user_id,
                actor: caller.user_id,
            },
        );
    }
    Ok(change)
}

/// Remove a member. Any manager grant they held in the community is deactivated with it.
pub async fn remove_member(
    community_id: CommunityId,
    user_id: UserId,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<RosterChange> {
    Actor::new(caller)
        .can(Action::RemoveMember)
        .on(Target::community(community_id))
        .check()?;

    let change = deps.store.remove_member(community_id, user_id).await?;
    if change == RosterChange::Applied {
        info!(%community_id, %user_id, removed_by = %caller.user_id, "member removed");
        publish_event(
            deps,
            &MembershipEvent::MemberRemoved {
                community_id,
                user_id,
                actor: caller.user_id,
            },
        );
    }
    Ok(change)
}

/// Promote a member to manager. Re-assigning updates the existing grant. Defaults to every
/// permission. Fails with `Conflict` when the user is not a member.
pub async fn assign_manager(
    community_id: CommunityId,
    user_id: UserId,
    permissions: Option<Permissions>,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<ManagerGrant> {
    Actor::new(caller)
        .can(Action::AssignManager)
        .on(Target::community(community_id))
        .check()?;

    let grant = deps
        .store
        .upsert_grant(
            user_id,
            community_id,
            permissions.unwrap_or_default(),
            caller.user_id,
        )
        .await?;

    info!(%community_id, %user_id, granted_by = %caller.user_id, "manager assigned");
    publish_event(
        deps,
        &MembershipEvent::ManagerAssigned {
            community_id,
            user_id,
            actor: caller.user_id,
        },
    );
    Ok(grant)
}

/// Demote a manager. The grant record is kept, inactive. `None` when there was nothing to
/// revoke.
pub async fn revoke_manager(
    community_id: CommunityId,
    user_id: UserId,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<Option<ManagerGrant>> {
    Actor::new(caller)
        .can(Action::RevokeManager)
        .on(Target::community(community_id))
        .check()?;

    let grant = deps.store.deactivate_grant(user_id, community_id).await?;
    if grant.is_some() {
        info!(%community_id, %user_id, revoked_by = %caller.user_id, "manager revoked");
        publish_event(
            deps,
            &MembershipEvent::ManagerRevoked {
                community_id,
                user_id,
                actor: caller.user_id,
            },
        );
    }
    Ok(grant)
}

pub async fn is_member(
    community_id: CommunityId,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<bool> {
    let community = deps
        .store
        .find_community(community_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))?;
    Ok(community.is_member(user_id))
}

/// Whether the user holds an active grant in the community. A grant without membership
/// does not count.
pub async fn has_grant(
    community_id: CommunityId,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<bool> {
    let active = deps
        .store
        .find_grant(user_id, community_id)
        .await?
        .is_some_and(|grant| grant.is_active());
    Ok(active && is_member(community_id, user_id, deps).await?)
}
