use super::role::{GlobalRole, Permission};
use crate::common::entity_ids::{CommunityId, UserId};

/// Actions that pass through the authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Submit a pulse, listing or directory entry.
    SubmitItem,
    /// Approve or reject a pending item.
    DecideItem,
    /// Move an approved item to a kind-specific state (sold, closed).
    TransitionItem,
    DeleteItem,
    /// Read pending queues and unpublished items of a community.
    ViewPending,
    SubmitJoinRequest,
    DecideJoinRequest,
    WithdrawJoinRequest,
    SubmitRoleChange,
    DecideRoleChange { requested_role: GlobalRole },
    WithdrawRoleChange,
    AddMember,
    RemoveMember,
    AssignManager,
    RevokeManager,
    /// Create communities and change their lifecycle.
    ManageCommunity,
}

/// Where an action's authority comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionScope {
    /// Any authenticated user, acting for themselves.
    SelfService,
    /// Only the owner of the target (its author or requester).
    Owner,
    /// The owner, or a community manager holding the permission.
    OwnerOrCommunity(Permission),
    /// Community managers holding the permission.
    Community(Permission),
    /// Platform administrators only.
    Platform,
}

impl Action {
    pub fn scope(&self) -> ActionScope {
        match self {
            Action::SubmitItem | Action::SubmitJoinRequest | Action::SubmitRoleChange => {
                ActionScope::SelfService
            }
            Action::WithdrawJoinRequest | Action::WithdrawRoleChange => ActionScope::Owner,
            Action::TransitionItem | Action::DeleteItem => {
                ActionScope::OwnerOrCommunity(Permission::ManagePosts)
            }
            Action::DecideItem | Action::ViewPending => {
                ActionScope::Community(Permission::ManagePosts)
            }
            Action::DecideJoinRequest => ActionScope::Community(Permission::ApproveJoinRequests),
            Action::AddMember | Action::RemoveMember => {
                ActionScope::Community(Permission::ManageUsers)
            }
            Action::DecideRoleChange { .. }
            | Action::AssignManager
            | Action::RevokeManager
            | Action::ManageCommunity => ActionScope::Platform,
        }
    }

    /// Role-assignment actions that hand out `Admin` or `SuperAdmin`.
    pub fn assigns_privileged_role(&self) -> bool {
        matches!(
            self,
            Action::DecideRoleChange { requested_role } if requested_role.is_privileged()
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::DecideRoleChange { requested_role } => {
                write!(f, "DecideRoleChange({})", requested_role)
            }
            other => write!(f, "{:?}", other),
        }
    }
}

/// What an action is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// `None` for platform-wide actions such as creating a community.
    pub community_id: Option<CommunityId>,
    /// Author of an item or requester of a request.
    pub owner_id: Option<UserId>,
}

impl Target {
    pub fn community(community_id: CommunityId) -> Self {
        Self {
            community_id: Some(community_id),
            owner_id: None,
        }
    }

    pub fn owned(community_id: CommunityId, owner_id: UserId) -> Self {
        Self {
            community_id: Some(community_id),
            owner_id: Some(owner_id),
        }
    }

    pub fn platform() -> Self {
        Self {
            community_id: None,
            owner_id: None,
        }
    }
}
