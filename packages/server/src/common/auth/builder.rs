use tracing::debug;

use super::capability::{Action, ActionScope, Target};
use super::role::{Caller, Permission, Role};
use super::AuthError;
use crate::common::error::ModerationError;

/// Outcome of the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    NotOwner,
    MissingPermission(Permission),
    PlatformOnly,
    /// Plain admins cannot hand out `Admin` or `SuperAdmin`.
    PrivilegedRoleAssignment,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::Unauthenticated => write!(f, "authentication required"),
            DenyReason::NotOwner => write!(f, "only the owner may perform this action"),
            DenyReason::MissingPermission(p) => {
                write!(f, "an active manager grant with {} is required", p)
            }
            DenyReason::PlatformOnly => write!(f, "platform administrator required"),
            DenyReason::PrivilegedRoleAssignment => {
                write!(f, "only a super admin may assign admin roles")
            }
        }
    }
}

/// The authorization gate.
///
/// Rules, in order:
/// 1. Owner-only actions (withdrawals) belong to the owner alone, whatever the role.
/// 2. `SuperAdmin` may do anything else; `Admin` too, except approving `Admin`/`SuperAdmin`
///    roles.
/// 3. An active grant for the target community with the required flag allows
///    community-scoped actions in that community only.
/// 4. Users may act on their own submissions.
/// 5. Everything else is denied.
pub fn authorize(caller: &Caller, action: Action, target: &Target) -> AccessDecision {
    let is_owner = target.owner_id == Some(caller.user_id);

    match &caller.role {
        Role::Guest => return AccessDecision::Deny(DenyReason::Unauthenticated),
        _ if matches!(action.scope(), ActionScope::Owner) && !is_owner => {
            return AccessDecision::Deny(DenyReason::NotOwner)
        }
        role if role.is_platform_admin() => {
            return match role {
                Role::Admin if action.assigns_privileged_role() => {
                    AccessDecision::Deny(DenyReason::PrivilegedRoleAssignment)
                }
                _ => AccessDecision::Allow,
            }
        }
        _ => {}
    }

    let holds = |permission: Permission| {
        target
            .community_id
            .and_then(|community_id| caller.role.grant_for(community_id))
            .is_some_and(|granted| granted.allows(permission))
    };

    match action.scope() {
        ActionScope::SelfService if target.owner_id.is_none() || is_owner => AccessDecision::Allow,
        ActionScope::SelfService | ActionScope::Owner if !is_owner => {
            AccessDecision::Deny(DenyReason::NotOwner)
        }
        ActionScope::SelfService | ActionScope::Owner => AccessDecision::Allow,
        ActionScope::OwnerOrCommunity(permission) if is_owner || holds(permission) => {
            AccessDecision::Allow
        }
        ActionScope::Community(permission) if holds(permission) => AccessDecision::Allow,
        ActionScope::OwnerOrCommunity(permission) | ActionScope::Community(permission) => {
            AccessDecision::Deny(DenyReason::MissingPermission(permission))
        }
        ActionScope::Platform => AccessDecision::Deny(DenyReason::PlatformOnly),
    }
}

/// Entry point for authorization checks in actions:
///
/// ```rust,ignore
/// Actor::new(&caller)
///     .can(Action::DecideItem)
///     .on(Target::community(item.community_id))
///     .check()?;
/// ```
pub struct Actor<'a> {
    caller: &'a Caller,
}

impl<'a> Actor<'a> {
    pub fn new(caller: &'a Caller) -> Self {
        Self { caller }
    }

    pub fn can(self, action: Action) -> CapabilityBuilder<'a> {
        CapabilityBuilder {
            caller: self.caller,
            action,
            target: Target::platform(),
        }
    }
}

pub struct CapabilityBuilder<'a> {
    caller: &'a Caller,
    action: Action,
    target: Target,
}

impl CapabilityBuilder<'_> {
    pub fn on(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Evaluate the gate without converting to an error.
    pub fn decide(&self) -> AccessDecision {
        authorize(self.caller, self.action, &self.target)
    }

    pub fn check(self) -> Result<(), ModerationError> {
        match self.decide() {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny(reason) => {
                debug!(
                    user_id = %self.caller.user_id,
                    action = %self.action,
                    reason = %reason,
                    "authorization denied"
                );
                Err(match reason {
                    DenyReason::Unauthenticated => AuthError::AuthenticationRequired.into(),
                    other => ModerationError::Forbidden(other.to_string()),
                })
            }
        }
    }
}
