use tracing::debug;

use crate::common::{Caller, GlobalRole, Result, Role, UserId};
use crate::common::auth::CommunityGrants;
use crate::kernel::ServerDeps;

/// Resolve the caller of a request once, up front.
///
/// No token means a guest. Otherwise the identity provider's role is raised by any role
/// assignment on record, and non-admins pick up their active, membership-backed grants.
pub async fn resolve_caller(token: Option<&str>, deps: &ServerDeps) -> Result<Caller> {
    let Some(token) = token else {
        return Ok(Caller::guest());
    };
    let identity = deps.identity.verify(token).await?;
    resolve_user(identity.user_id, identity.global_role, deps).await
}

/// Resolve a caller whose identity is already established (operator tooling, tests).
pub async fn resolve_user(
    user_id: UserId,
    global_role: GlobalRole,
    deps: &ServerDeps,
) -> Result<Caller> {
    let assigned = deps
        .store
        .find_role_assignment(user_id)
        .await?
        .map(|assignment| assignment.role);
    let effective = assigned.map_or(global_role, |role| role.max(global_role));

    let role = match effective {
        GlobalRole::SuperAdmin => Role::SuperAdmin,
        GlobalRole::Admin => Role::Admin,
        GlobalRole::Manager | GlobalRole::User => {
            let grants: CommunityGrants = deps
                .store
                .active_grants_for_user(user_id)
                .await?
                .into_iter()
                .map(|grant| (grant.community_id, grant.permissions))
                .collect();
            if grants.is_empty() {
                Role::User
            } else {
                Role::Manager(grants)
            }
        }
    };

    debug!(%user_id, role = ?role, "caller resolved");
    Ok(Caller::new(user_id, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AuthError, ModerationError, Permissions};
    use crate::domains::communities::models::{Community, CommunityStatus};
    use crate::kernel::{ModerationStore, TestDependencies};

    #[tokio::test]
    async fn missing_token_is_a_guest() {
        let deps = TestDependencies::new().server_deps();
        let caller = resolve_caller(None, &deps).await.unwrap();
        assert!(caller.is_guest());
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let deps = TestDependencies::new().server_deps();
        let err = resolve_caller(Some("nope"), &deps).await.unwrap_err();
        assert!(matches!(err, ModerationError::Auth(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn grants_make_a_manager_until_membership_ends() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();
        let user = UserId::new();

        let mut community = Community::new("Harbor Guild".to_string(), None, UserId::new());
        community.status = CommunityStatus::Active;
        let community = test_deps.store.insert_community(community).await.unwrap();
        test_deps
            .store
            .add_member(community.id, user, UserId::new())
            .await
            .unwrap();
        test_deps
            .store
            .upsert_grant(user, community.id, Permissions::all(), UserId::new())
            .await
            .unwrap();

        let token = test_deps.identity.issue(user, GlobalRole::User);
        let caller = resolve_caller(Some(token.as_str()), &deps).await.unwrap();
        assert!(caller.role.grant_for(community.id).is_some());

        test_deps.store.remove_member(community.id, user).await.unwrap();
        let caller = resolve_caller(Some(token.as_str()), &deps).await.unwrap();
        assert_eq!(caller.role, Role::User);
    }

    #[tokio::test]
    async fn identity_role_is_the_floor() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();
        let admin = UserId::new();
        let token = test_deps.identity.issue(admin, GlobalRole::Admin);

        let caller = resolve_caller(Some(token.as_str()), &deps).await.unwrap();
        assert_eq!(caller.role, Role::Admin);
    }
}
