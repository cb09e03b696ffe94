//! Test fixtures for workflow tests.
//!
//! These fixtures drive the public actions against the in-memory store, so every setup
//! step goes through the same gate and atomic store calls as production code.

use community_core::common::{Caller, CommunityId, GlobalRole, Permissions, Role, UserId};
use community_core::domains::communities::actions::{
    add_member, assign_manager, create_community, set_community_status,
};
use community_core::domains::communities::models::{Community, CommunityStatus};
use community_core::domains::identity::resolve_user;
use community_core::domains::moderation::kinds::{
    DirectoryEntryPayload, ListingPayload, ListingType, PulsePayload,
};
use community_core::kernel::{ModerationStore, ServerDeps, TestDependencies};

/// Install a test subscriber that respects RUST_LOG. Safe to call repeatedly.
///
/// Run tests with: RUST_LOG=debug cargo test -- --nocapture
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An in-memory platform with a super admin and an admin ready to act.
pub struct World {
    pub test_deps: TestDependencies,
    pub deps: ServerDeps,
    pub super_admin: Caller,
    pub admin: Caller,
}

impl World {
    pub fn new() -> Self {
        Self::with(TestDependencies::new())
    }

    pub fn with(test_deps: TestDependencies) -> Self {
        init_tracing();
        let deps = test_deps.server_deps();
        Self {
            test_deps,
            deps,
            super_admin: Caller::new(UserId::new(), Role::SuperAdmin),
            admin: Caller::new(UserId::new(), Role::Admin),
        }
    }

    /// Create and activate a community.
    pub async fn active_community(&self, name: &str) -> Community {
        let community = create_community(name.to_string(), None, &self.admin, &self.deps)
            .await
            .expect("create community");
        set_community_status(
            community.id,
            CommunityStatus::Active,
            &self.admin,
            &self.deps,
        )
        .await
        .expect("activate community")
    }

    /// A signed-in user with no memberships.
    pub fn user(&self) -> Caller {
        Caller::new(UserId::new(), Role::User)
    }

    /// Re-resolve a user's role from the store, as a new request would.
    pub async fn resolve(&self, user_id: UserId) -> Caller {
        resolve_user(user_id, GlobalRole::User, &self.deps)
            .await
            .expect("resolve caller")
    }

    /// A new user added directly to the roster.
    pub async fn member(&self, community_id: CommunityId) -> Caller {
        let user = self.user();
        add_member(community_id, user.user_id, &self.admin, &self.deps)
            .await
            .expect("add member");
        self.resolve(user.user_id).await
    }

    /// A new member holding a manager grant with the given permissions.
    pub async fn manager(&self, community_id: CommunityId, permissions: Permissions) -> Caller {
        let member = self.member(community_id).await;
        assign_manager(
            community_id,
            member.user_id,
            Some(permissions),
            &self.admin,
            &self.deps,
        )
        .await
        .expect("assign manager");
        self.resolve(member.user_id).await
    }

    pub async fn community(&self, community_id: CommunityId) -> Community {
        self.deps
            .store
            .find_community(community_id)
            .await
            .expect("find community")
            .expect("community exists")
    }

    /// The roster never lists a user as both member and pending.
    pub async fn assert_roster_disjoint(&self, community_id: CommunityId) {
        let community = self.community(community_id).await;
        for user_id in &community.pending_requests {
            assert!(
                !community.members.contains(user_id),
                "user {} is both member and pending in {}",
                user_id,
                community_id
            );
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

pub fn pulse(title: &str) -> PulsePayload {
    PulsePayload {
        title: title.to_string(),
        body: "Water supply will be off on Sunday morning.".to_string(),
    }
}

pub fn listing_for_sale(price: i64) -> ListingPayload {
    ListingPayload {
        title: "Road bike".to_string(),
        description: "Barely used, 54cm frame".to_string(),
        listing_type: ListingType::Sell,
        price: Some(price),
    }
}

pub fn directory_entry(name: &str) -> DirectoryEntryPayload {
    DirectoryEntryPayload {
        name: name.to_string(),
        category: "plumbing".to_string(),
        phone: Some("+1 612 555 0100".to_string()),
        description: None,
    }
}
