use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::entity_ids::{CommunityId, UserId};

/// Platform-wide role as issued by the identity provider or the role registry.
///
/// Variants are ordered by privilege, so `max` picks the stronger role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "platform_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    User,
    Manager,
    Admin,
    SuperAdmin,
}

impl GlobalRole {
    /// Roles whose assignment only a `SuperAdmin` may approve.
    pub fn is_privileged(&self) -> bool {
        matches!(self, GlobalRole::Admin | GlobalRole::SuperAdmin)
    }
}

impl std::fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobalRole::User => write!(f, "user"),
            GlobalRole::Manager => write!(f, "manager"),
            GlobalRole::Admin => write!(f, "admin"),
            GlobalRole::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl std::str::FromStr for GlobalRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "user" => Ok(GlobalRole::User),
            "manager" => Ok(GlobalRole::Manager),
            "admin" => Ok(GlobalRole::Admin),
            "super_admin" => Ok(GlobalRole::SuperAdmin),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

/// A single community-scoped permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ApproveJoinRequests,
    ManagePosts,
    ManageUsers,
    CreateEvents,
    ManageReports,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::ApproveJoinRequests => write!(f, "can_approve_join_requests"),
            Permission::ManagePosts => write!(f, "can_manage_posts"),
            Permission::ManageUsers => write!(f, "can_manage_users"),
            Permission::CreateEvents => write!(f, "can_create_events"),
            Permission::ManageReports => write!(f, "can_manage_reports"),
        }
    }
}

/// Permission flags carried by a manager grant. New grants get every flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permissions {
    pub can_approve_join_requests: bool,
    pub can_manage_posts: bool,
    pub can_manage_users: bool,
    pub can_create_events: bool,
    pub can_manage_reports: bool,
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            can_approve_join_requests: true,
            can_manage_posts: true,
            can_manage_users: true,
            can_create_events: true,
            can_manage_reports: true,
        }
    }

    pub fn none() -> Self {
        Self {
            can_approve_join_requests: false,
            can_manage_posts: false,
            can_manage_users: false,
            can_create_events: false,
            can_manage_reports: false,
        }
    }

    /// Builder-style helper for granting a single flag.
    pub fn with(mut self, permission: Permission) -> Self {
        match permission {
            Permission::ApproveJoinRequests => self.can_approve_join_requests = true,
            Permission::ManagePosts => self.can_manage_posts = true,
            Permission::ManageUsers => self.can_manage_users = true,
            Permission::CreateEvents => self.can_create_events = true,
            Permission::ManageReports => self.can_manage_reports = true,
        }
        self
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ApproveJoinRequests => self.can_approve_join_requests,
            Permission::ManagePosts => self.can_manage_posts,
            Permission::ManageUsers => self.can_manage_users,
            Permission::CreateEvents => self.can_create_events,
            Permission::ManageReports => self.can_manage_reports,
        }
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}

/// Active manager grants of one user, keyed by community.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommunityGrants(HashMap<CommunityId, Permissions>);

impl CommunityGrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, community_id: CommunityId, permissions: Permissions) {
        self.0.insert(community_id, permissions);
    }

    pub fn get(&self, community_id: CommunityId) -> Option<&Permissions> {
        self.0.get(&community_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(CommunityId, Permissions)> for CommunityGrants {
    fn from_iter<I: IntoIterator<Item = (CommunityId, Permissions)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Role resolved once per request and consumed by the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Guest,
    User,
    Manager(CommunityGrants),
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn is_platform_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// Permissions held in `community_id` through an active grant.
    pub fn grant_for(&self, community_id: CommunityId) -> Option<&Permissions> {
        match self {
            Role::Manager(grants) => grants.get(community_id),
            _ => None,
        }
    }

    /// The role this caller holds inside one community, as recorded on role requests.
    pub fn role_in(&self, community_id: CommunityId) -> GlobalRole {
        match self {
            Role::SuperAdmin => GlobalRole::SuperAdmin,
            Role::Admin => GlobalRole::Admin,
            Role::Manager(grants) if grants.get(community_id).is_some() => GlobalRole::Manager,
            _ => GlobalRole::User,
        }
    }
}

/// The verified caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Unauthenticated caller. Denied everything by the gate.
    pub fn guest() -> Self {
        Self {
            user_id: UserId::nil(),
            role: Role::Guest,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self.role, Role::Guest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_order_by_privilege() {
        assert!(GlobalRole::SuperAdmin > GlobalRole::Admin);
        assert!(GlobalRole::Admin > GlobalRole::Manager);
        assert!(GlobalRole::Manager > GlobalRole::User);
        assert_eq!(
            GlobalRole::User.max(GlobalRole::Admin),
            GlobalRole::Admin
        );
    }

    #[test]
    fn role_strings_match_storage_names() {
        for role in [
            GlobalRole::User,
            GlobalRole::Manager,
            GlobalRole::Admin,
            GlobalRole::SuperAdmin,
        ] {
            assert_eq!(role.to_string().parse::<GlobalRole>().unwrap(), role);
        }
        assert!("owner".parse::<GlobalRole>().is_err());
    }

    #[test]
    fn default_permissions_grant_everything() {
        let permissions = Permissions::default();
        assert!(permissions.allows(Permission::ApproveJoinRequests));
        assert!(permissions.allows(Permission::ManageReports));
        assert!(!Permissions::none().allows(Permission::ManagePosts));
        assert!(Permissions::none()
            .with(Permission::ManagePosts)
            .allows(Permission::ManagePosts));
    }

    #[test]
    fn manager_role_is_scoped_to_granted_communities() {
        let granted = CommunityId::new();
        let other = CommunityId::new();
        let role = Role::Manager([(granted, Permissions::all())].into_iter().collect());

        assert_eq!(role.role_in(granted), GlobalRole::Manager);
        assert_eq!(role.role_in(other), GlobalRole::User);
        assert!(role.grant_for(other).is_none());
    }
}
