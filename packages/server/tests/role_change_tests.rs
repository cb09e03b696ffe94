//! Role change request workflow tests, including the grants they write.

mod common;

use futures::future::join_all;

use crate::common::World;
use community_core::common::{Caller, GlobalRole, ModerationError, Permissions, Role, UserId};
use community_core::domains::communities::actions::{has_grant, remove_member};
use community_core::domains::communities::models::GrantStatus;
use community_core::domains::identity::resolve_user;
use community_core::domains::moderation::kinds::Decision;
use community_core::domains::requests::actions::{
    decide_role_change_request, submit_role_change_request, withdraw_role_change_request,
};
use community_core::domains::requests::models::RequestStatus;
use community_core::kernel::ModerationStore;

#[tokio::test]
async fn approved_manager_request_grants_every_permission_until_removal() {
    let world = World::new();
    let c2 = world.active_community("C2").await;
    let u3 = world.member(c2.id).await;

    let request = submit_role_change_request(
        c2.id,
        GlobalRole::Manager,
        Some("I run the gardening club".to_string()),
        &u3,
        &world.deps,
    )
    .await
    .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.current_role, GlobalRole::User);

    let outcome =
        decide_role_change_request(request.id, Decision::Approve, None, &world.admin, &world.deps)
            .await
            .unwrap();
    assert_eq!(outcome.request.status, RequestStatus::Approved);
    assert_eq!(outcome.request.reviewed_by, Some(world.admin.user_id));

    let grant = outcome.grant.expect("manager approval writes a grant");
    assert_eq!(grant.status, GrantStatus::Active);
    assert_eq!(grant.permissions, Permissions::all());
    assert!(has_grant(c2.id, u3.user_id, &world.deps).await.unwrap());

    let u3 = world.resolve(u3.user_id).await;
    assert_eq!(u3.role.grant_for(c2.id), Some(&Permissions::all()));

    remove_member(c2.id, u3.user_id, &world.admin, &world.deps)
        .await
        .unwrap();
    assert!(!has_grant(c2.id, u3.user_id, &world.deps).await.unwrap());
    let stored = world
        .deps
        .store
        .find_grant(u3.user_id, c2.id)
        .await
        .unwrap()
        .expect("grant history is kept");
    assert_eq!(stored.status, GrantStatus::Inactive);
    assert_eq!(world.resolve(u3.user_id).await.role, Role::User);
}

#[tokio::test]
async fn identical_requests_conflict() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let member = world.member(community.id).await;

    submit_role_change_request(community.id, GlobalRole::Manager, None, &member, &world.deps)
        .await
        .unwrap();
    let duplicate =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &member, &world.deps)
            .await;
    assert!(matches!(duplicate, Err(ModerationError::Conflict(_))));

    // A different requested role is a different request.
    submit_role_change_request(community.id, GlobalRole::Admin, None, &member, &world.deps)
        .await
        .unwrap();
}

#[tokio::test]
async fn only_members_may_ask_for_a_role() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;

    let outsider = world.user();
    let result =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &outsider, &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Forbidden(_))));

    let guest = Caller::guest();
    let result =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &guest, &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Auth(_))));
}

#[tokio::test]
async fn asking_for_the_role_already_held_is_invalid() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let member = world.member(community.id).await;
    let manager = world.manager(community.id, Permissions::all()).await;

    let result =
        submit_role_change_request(community.id, GlobalRole::User, None, &member, &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Validation(_))));

    let result =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &manager, &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Validation(_))));
}

#[tokio::test]
async fn managers_cannot_decide_role_changes() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let member = world.member(community.id).await;
    let manager = world.manager(community.id, Permissions::all()).await;
    let request =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &member, &world.deps)
            .await
            .unwrap();

    let result =
        decide_role_change_request(request.id, Decision::Approve, None, &manager, &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Forbidden(_))));
}

#[tokio::test]
async fn elevation_to_admin_needs_a_super_admin_at_decision_time() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let member = world.member(community.id).await;
    let request =
        submit_role_change_request(community.id, GlobalRole::Admin, None, &member, &world.deps)
            .await
            .unwrap();

    let result =
        decide_role_change_request(request.id, Decision::Approve, None, &world.admin, &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Forbidden(_))));

    let outcome = decide_role_change_request(
        request.id,
        Decision::Approve,
        None,
        &world.super_admin,
        &world.deps,
    )
    .await
    .unwrap();
    let assignment = outcome.assignment.expect("admin approval records the role");
    assert_eq!(assignment.role, GlobalRole::Admin);
    assert_eq!(assignment.assigned_by, world.super_admin.user_id);

    let resolved = resolve_user(member.user_id, GlobalRole::User, &world.deps)
        .await
        .unwrap();
    assert_eq!(resolved.role, Role::Admin);
}

#[tokio::test]
async fn demotion_deactivates_the_grant() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let manager = world.manager(community.id, Permissions::all()).await;

    let request =
        submit_role_change_request(community.id, GlobalRole::User, None, &manager, &world.deps)
            .await
            .unwrap();
    assert_eq!(request.current_role, GlobalRole::Manager);

    let outcome =
        decide_role_change_request(request.id, Decision::Approve, None, &world.admin, &world.deps)
            .await
            .unwrap();
    assert_eq!(
        outcome.grant.map(|g| g.status),
        Some(GrantStatus::Inactive)
    );
    assert!(!has_grant(community.id, manager.user_id, &world.deps).await.unwrap());
}

#[tokio::test]
async fn manager_approval_for_a_departed_member_conflicts_and_stays_pending() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let member = world.member(community.id).await;
    let request =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &member, &world.deps)
            .await
            .unwrap();

    remove_member(community.id, member.user_id, &world.admin, &world.deps)
        .await
        .unwrap();

    let result =
        decide_role_change_request(request.id, Decision::Approve, None, &world.admin, &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Conflict(_))));

    let stored = world
        .deps
        .store
        .find_role_change_request(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(world
        .deps
        .store
        .find_grant(member.user_id, community.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn rejection_needs_a_reason_and_writes_nothing() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let member = world.member(community.id).await;
    let request =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &member, &world.deps)
            .await
            .unwrap();

    let missing =
        decide_role_change_request(request.id, Decision::Reject, None, &world.admin, &world.deps)
            .await;
    assert!(matches!(missing, Err(ModerationError::Validation(_))));

    let outcome = decide_role_change_request(
        request.id,
        Decision::Reject,
        Some("not enough history".to_string()),
        &world.admin,
        &world.deps,
    )
    .await
    .unwrap();
    assert_eq!(outcome.request.status, RequestStatus::Rejected);
    assert_eq!(
        outcome.request.rejection_reason.as_deref(),
        Some("not enough history")
    );
    assert!(outcome.grant.is_none());
    assert!(outcome.assignment.is_none());
    assert!(!has_grant(community.id, member.user_id, &world.deps).await.unwrap());

    let again =
        decide_role_change_request(request.id, Decision::Approve, None, &world.admin, &world.deps)
            .await;
    assert!(matches!(again, Err(ModerationError::AlreadyDecided)));
    let again =
        decide_role_change_request(request.id, Decision::Reject, None, &world.admin, &world.deps)
            .await;
    assert!(matches!(again, Err(ModerationError::AlreadyDecided)));
}

#[tokio::test]
async fn withdrawal_is_owner_only_and_terminal() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let member = world.member(community.id).await;
    let request =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &member, &world.deps)
            .await
            .unwrap();

    let other = world.member(community.id).await;
    let result = withdraw_role_change_request(request.id, &other, &world.deps).await;
    assert!(matches!(result, Err(ModerationError::Forbidden(_))));
    let result = withdraw_role_change_request(request.id, &world.admin, &world.deps).await;
    assert!(matches!(result, Err(ModerationError::Forbidden(_))));

    let withdrawn = withdraw_role_change_request(request.id, &member, &world.deps)
        .await
        .unwrap();
    assert_eq!(withdrawn.status, RequestStatus::Withdrawn);

    let late =
        decide_role_change_request(request.id, Decision::Approve, None, &world.admin, &world.deps)
            .await;
    assert!(matches!(late, Err(ModerationError::AlreadyDecided)));
    let again = withdraw_role_change_request(request.id, &member, &world.deps).await;
    assert!(matches!(again, Err(ModerationError::AlreadyDecided)));
}

#[tokio::test]
async fn concurrent_manager_approvals_leave_one_grant() {
    let world = World::new();
    let community = world.active_community("Lakeview Residents").await;
    let member = world.member(community.id).await;
    let first =
        submit_role_change_request(community.id, GlobalRole::Manager, None, &member, &world.deps)
            .await
            .unwrap();

    let admins: Vec<Caller> = (0..4)
        .map(|_| Caller::new(UserId::new(), Role::Admin))
        .collect();
    let results = join_all(admins.iter().map(|admin| {
        decide_role_change_request(first.id, Decision::Approve, None, admin, &world.deps)
    }))
    .await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let grants = world
        .deps
        .store
        .active_grants_for_user(member.user_id)
        .await
        .unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].community_id, community.id);
}
