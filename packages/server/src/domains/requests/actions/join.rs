use tracing::info;

use crate::common::{
    Action, Actor, Caller, CommunityId, JoinRequestId, ModerationError, Result, Target,
};
use crate::domains::communities::events::MembershipEvent;
use crate::domains::communities::models::RosterChange;
use crate::domains::moderation::kinds::{require_reason, Decision};
use crate::domains::requests::models::{JoinRequest, RequestStatus};
use crate::kernel::{publish_event, ServerDeps};

/// Ask to join an active community. `Conflict` when the caller is already a member or
/// already has a pending request.
pub async fn submit_join_request(
    community_id: CommunityId,
    message: String,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<JoinRequest> {
    Actor::new(caller)
        .can(Action::SubmitJoinRequest)
        .on(Target::owned(community_id, caller.user_id))
        .check()?;

    let community = deps
        .store
        .find_community(community_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))?;
    community.ensure_active()?;

    let request = deps
        .store
        .insert_join_request(JoinRequest::new(caller.user_id, community_id, message))
        .await?;

    info!(
        request_id = %request.id,
        %community_id,
        user_id = %caller.user_id,
        "join request submitted"
    );
    Ok(request)
}

/// Approve or reject a pending join request.
///
/// Approval moves the user from `pending_requests` to `members` in the same atomic step as
/// the status change. If they were already a member the approval still succeeds, without a
/// second insert.
pub async fn decide_join_request(
    request_id: JoinRequestId,
    decision: Decision,
    reason: Option<String>,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<JoinRequest> {
    let request = find_join_request(request_id, deps).await?;

    Actor::new(caller)
        .can(Action::DecideJoinRequest)
        .on(Target::community(request.community_id))
        .check()?;

    if !request.is_pending() {
        return Err(ModerationError::AlreadyDecided);
    }
    let reason = require_reason(decision, reason)?;

    let decided = match decision {
        Decision::Approve => {
            let Some((decided, change)) = deps
                .store
                .approve_join_request(request_id, caller.user_id)
                .await?
            else {
                return Err(lost_race(request_id, deps).await?);
            };
            if change == RosterChange::Unchanged {
                info!(
                    %request_id,
                    user_id = %decided.user_id,
                    "approved user was already a member"
                );
            }
            decided
        }
        Decision::Reject => deps
            .store
            .close_join_request(request_id, RequestStatus::Rejected, caller.user_id, reason)
            .await?
            .ok_or(ModerationError::AlreadyDecided)?,
    };

    info!(
        %request_id,
        community_id = %decided.community_id,
        user_id = %decided.user_id,
        status = %decided.status,
        decided_by = %caller.user_id,
        "join request decided"
    );
    publish_closed(&decided, caller, deps);
    Ok(decided)
}

/// Cancel one's own pending request. Fails with `AlreadyDecided` if a decision landed first.
pub async fn withdraw_join_request(
    request_id: JoinRequestId,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<JoinRequest> {
    let request = find_join_request(request_id, deps).await?;

    Actor::new(caller)
        .can(Action::WithdrawJoinRequest)
        .on(Target::owned(request.community_id, request.user_id))
        .check()?;

    let withdrawn = deps
        .store
        .close_join_request(request_id, RequestStatus::Withdrawn, caller.user_id, None)
        .await?
        .ok_or(ModerationError::AlreadyDecided)?;

    info!(%request_id, user_id = %caller.user_id, "join request withdrawn");
    publish_closed(&withdrawn, caller, deps);
    Ok(withdrawn)
}

async fn find_join_request(request_id: JoinRequestId, deps: &ServerDeps) -> Result<JoinRequest> {
    deps.store
        .find_join_request(request_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("join request {}", request_id)))
}

async fn lost_race(request_id: JoinRequestId, deps: &ServerDeps) -> Result<ModerationError> {
    Ok(match deps.store.find_join_request(request_id).await? {
        Some(_) => ModerationError::AlreadyDecided,
        None => ModerationError::not_found(format!("join request {}", request_id)),
    })
}

fn publish_closed(request: &JoinRequest, caller: &Caller, deps: &ServerDeps) {
    publish_event(
        deps,
        &MembershipEvent::JoinRequestClosed {
            request_id: request.id,
            community_id: request.community_id,
            user_id: request.user_id,
            status: request.status,
            actor: caller.user_id,
        },
    );
}
