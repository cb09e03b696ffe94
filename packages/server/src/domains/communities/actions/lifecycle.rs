//! Community lifecycle actions (platform administrators only).

use tracing::info;

use crate::common::{Action, Actor, Caller, CommunityId, ModerationError, Result, Target};
use crate::domains::communities::models::{Community, CommunityStatus};
use crate::kernel::ServerDeps;

/// Create a community. New communities start `pending` and accept no submissions until
/// activated.
pub async fn create_community(
    name: String,
    description: Option<String>,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<Community> {
    Actor::new(caller)
        .can(Action::ManageCommunity)
        .on(Target::platform())
        .check()?;

    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ModerationError::Validation("name is required".to_string()));
    }

    let community = deps
        .store
        .insert_community(Community::new(name, description, caller.user_id))
        .await?;

    info!(community_id = %community.id, name = %community.name, "community created");
    Ok(community)
}

pub async fn set_community_status(
    community_id: CommunityId,
    status: CommunityStatus,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<Community> {
    Actor::new(caller)
        .can(Action::ManageCommunity)
        .on(Target::community(community_id))
        .check()?;

    let community = deps
        .store
        .set_community_status(community_id, status)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))?;

    info!(community_id = %community_id, status = %status, "community status changed");
    Ok(community)
}

pub async fn get_community(community_id: CommunityId, deps: &ServerDeps) -> Result<Community> {
    deps.store
        .find_community(community_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))
}
