use tracing::info;

use crate::common::{
    Action, Actor, Caller, CommunityId, GlobalRole, ModerationError, Result, RoleChangeRequestId,
    Target,
};
use crate::domains::communities::events::MembershipEvent;
use crate::domains::moderation::kinds::{require_reason, Decision};
use crate::domains::requests::models::{RequestStatus, RoleChangeOutcome, RoleChangeRequest};
use crate::kernel::{publish_event, ServerDeps};

/// Ask for a different role in a community the caller belongs to. The role held right now
/// is recorded on the request. `Conflict` when the same role was already requested.
pub async fn submit_role_change_request(
    community_id: CommunityId,
    requested_role: GlobalRole,
    reason: Option<String>,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<RoleChangeRequest> {
    Actor::new(caller)
        .can(Action::SubmitRoleChange)
        .on(Target::owned(community_id, caller.user_id))
        .check()?;

    let community = deps
        .store
        .find_community(community_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))?;
    if !community.is_member(caller.user_id) {
        return Err(ModerationError::Forbidden(format!(
            "not a member of community {}",
            community_id
        )));
    }

    let current_role = caller.role.role_in(community_id);
    if current_role == requested_role {
        return Err(ModerationError::Validation(format!(
            "role {} is already held",
            requested_role
        )));
    }

    let request = deps
        .store
        .insert_role_change_request(RoleChangeRequest::new(
            caller.user_id,
            community_id,
            current_role,
            requested_role,
            reason,
        ))
        .await?;

    info!(
        request_id = %request.id,
        %community_id,
        user_id = %caller.user_id,
        current_role = %current_role,
        requested_role = %requested_role,
        "role change requested"
    );
    Ok(request)
}

/// Approve or reject a pending role change.
///
/// The gate is evaluated here against the requested role, so elevation to `admin` or
/// `super_admin` is authorized at decision time by a `super_admin`. Approval applies the
/// role in the same atomic step as the status change.
pub async fn decide_role_change_request(
    request_id: RoleChangeRequestId,
    decision: Decision,
    reason: Option<String>,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<RoleChangeOutcome> {
    let request = find_role_change_request(request_id, deps).await?;

    Actor::new(caller)
        .can(Action::DecideRoleChange {
            requested_role: request.requested_role,
        })
        .on(Target::community(request.community_id))
        .check()?;

    if !request.is_pending() {
        return Err(ModerationError::AlreadyDecided);
    }
    let reason = require_reason(decision, reason)?;

    let outcome = match decision {
        Decision::Approve => {
            let Some(outcome) = deps
                .store
                .approve_role_change_request(request_id, caller.user_id)
                .await?
            else {
                return Err(lost_race(request_id, deps).await?);
            };
            outcome
        }
        Decision::Reject => RoleChangeOutcome {
            request: deps
                .store
                .close_role_change_request(
                    request_id,
                    RequestStatus::Rejected,
                    caller.user_id,
                    reason,
                )
                .await?
                .ok_or(ModerationError::AlreadyDecided)?,
            grant: None,
            assignment: None,
        },
    };

    info!(
        %request_id,
        community_id = %outcome.request.community_id,
        user_id = %outcome.request.user_id,
        requested_role = %outcome.request.requested_role,
        status = %outcome.request.status,
        reviewed_by = %caller.user_id,
        "role change decided"
    );
    publish_closed(&outcome.request, caller, deps);
    Ok(outcome)
}

/// Cancel one's own pending role change. Fails with `AlreadyDecided` if a decision landed
/// first.
pub async fn withdraw_role_change_request(
    request_id: RoleChangeRequestId,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<RoleChangeRequest> {
    let request = find_role_change_request(request_id, deps).await?;

    Actor::new(caller)
        .can(Action::WithdrawRoleChange)
        .on(Target::owned(request.community_id, request.user_id))
        .check()?;

    let withdrawn = deps
        .store
        .close_role_change_request(request_id, RequestStatus::Withdrawn, caller.user_id, None)
        .await?
        .ok_or(ModerationError::AlreadyDecided)?;

    info!(%request_id, user_id = %caller.user_id, "role change withdrawn");
    publish_closed(&withdrawn, caller, deps);
    Ok(withdrawn)
}

async fn find_role_change_request(
    request_id: RoleChangeRequestId,
    deps: &ServerDeps,
) -> Result<RoleChangeRequest> {
    deps.store
        .find_role_change_request(request_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("role change request {}", request_id)))
}

async fn lost_race(request_id: RoleChangeRequestId, deps: &ServerDeps) -> Result<ModerationError> {
    Ok(match deps.store.find_role_change_request(request_id).await? {
        Some(_) => ModerationError::AlreadyDecided,
        None => ModerationError::not_found(format!("role change request {}", request_id)),
    })
}

fn publish_closed(request: &RoleChangeRequest, caller: &Caller, deps: &ServerDeps) {
    publish_event(
        deps,
        &MembershipEvent::RoleChangeClosed {
            request_id: request.id,
            community_id: request.community_id,
            user_id: request.user_id,
            requested_role: request.requested_role,
            status: request.status,
            actor: caller.user_id,
        },
    );
}
