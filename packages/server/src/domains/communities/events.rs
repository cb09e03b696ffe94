use serde::{Deserialize, Serialize};

use crate::common::nats::IntoNotification;
use crate::common::{CommunityId, GlobalRole, JoinRequestId, RoleChangeRequestId, UserId};
use crate::domains::requests::models::RequestStatus;

/// Membership events - facts about roster, grant and request outcomes.
///
/// Errors go in `Result::Err`, not in events. Events are for state changes that landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MembershipEvent {
    /// Join request approved, rejected or withdrawn.
    JoinRequestClosed {
        request_id: JoinRequestId,
        community_id: CommunityId,
        user_id: UserId,
        status: RequestStatus,
        actor: UserId,
    },

    /// Role change request approved, rejected or withdrawn.
    RoleChangeClosed {
        request_id: RoleChangeRequestId,
        community_id: CommunityId,
        user_id: UserId,
        requested_role: GlobalRole,
        status: RequestStatus,
        actor: UserId,
    },

    MemberAdded {
        community_id: CommunityId,
        user_id: UserId,
        actor: UserId,
    },

    /// Removal also revokes any manager grant in the community.
    MemberRemoved {
        community_id: CommunityId,
        user_id: UserId,
        actor: UserId,
    },

    ManagerAssigned {
        community_id: CommunityId,
        user_id: UserId,
        actor: UserId,
    },

    ManagerRevoked {
        community_id: CommunityId,
        user_id: UserId,
        actor: UserId,
    },
}

impl IntoNotification for MembershipEvent {
    fn subject(&self) -> String {
        match self {
            MembershipEvent::JoinRequestClosed { status, .. } => {
                format!("membership.join.{}", status)
            }
            MembershipEvent::RoleChangeClosed { status, .. } => {
                format!("membership.role.{}", status)
            }
            MembershipEvent::MemberAdded { .. } => "membership.member.added".to_string(),
            MembershipEvent::MemberRemoved { .. } => "membership.member.removed".to_string(),
            MembershipEvent::ManagerAssigned { .. } => "membership.manager.assigned".to_string(),
            MembershipEvent::ManagerRevoked { .. } => "membership.manager.revoked".to_string(),
        }
    }

    fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
