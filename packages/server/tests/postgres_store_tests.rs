//! PostgreSQL store tests: the conditional updates and roster writes against a real database.
//!
//! Run with `cargo test -- --ignored` when Docker is available.

mod common;

use test_context::test_context;

use crate::common::{pulse, TestHarness};
use community_core::common::{
    GlobalRole, ModerationError, PageArgs, Permission, Permissions, UserId,
};
use community_core::domains::communities::models::{
    Community, CommunityStatus, GrantStatus, RosterChange,
};
use community_core::domains::moderation::kinds::ItemStatus;
use community_core::domains::moderation::models::{ItemQuery, ModeratedItem};
use community_core::domains::requests::models::{
    JoinRequest, RequestStatus, RoleChangeRequest,
};
use community_core::kernel::{ModerationStore, PgModerationStore};

async fn active_community(store: &PgModerationStore, name: &str) -> Community {
    let community = store
        .insert_community(Community::new(name.to_string(), None, UserId::new()))
        .await
        .unwrap();
    store
        .set_community_status(community.id, CommunityStatus::Active)
        .await
        .unwrap()
        .unwrap()
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn community_status_round_trips(ctx: &mut TestHarness) {
    let store = ctx.store();
    let community = store
        .insert_community(Community::new("Lakeview".to_string(), None, UserId::new()))
        .await
        .unwrap();
    assert_eq!(community.status, CommunityStatus::Pending);

    let updated = store
        .set_community_status(community.id, CommunityStatus::Inactive)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, CommunityStatus::Inactive);

    let missing = store
        .set_community_status(Default::default(), CommunityStatus::Active)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn join_approval_admits_once_and_clears_pending(ctx: &mut TestHarness) {
    let store = ctx.store();
    let community = active_community(&store, "Lakeview").await;
    let applicant = UserId::new();

    let request = store
        .insert_join_request(JoinRequest::new(applicant, community.id, String::new()))
        .await
        .unwrap();
    let duplicate = store
        .insert_join_request(JoinRequest::new(applicant, community.id, String::new()))
        .await;
    assert!(matches!(duplicate, Err(ModerationError::Conflict(_))));

    let pending = store.find_community(community.id).await.unwrap().unwrap();
    assert!(pending.has_pending_request(applicant));

    let decider = UserId::new();
    let (approved, change) = store
        .approve_join_request(request.id, decider)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.decided_by, Some(decider));
    assert_eq!(change, RosterChange::Applied);

    let again = store.approve_join_request(request.id, decider).await.unwrap();
    assert!(again.is_none());

    let admitted = store.find_community(community.id).await.unwrap().unwrap();
    assert!(admitted.is_member(applicant));
    assert!(!admitted.has_pending_request(applicant));
    assert_eq!(admitted.roster_version, pending.roster_version + 1);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn direct_add_approves_the_open_join_request(ctx: &mut TestHarness) {
    let store = ctx.store();
    let community = active_community(&store, "Lakeview").await;
    let applicant = UserId::new();
    let admin = UserId::new();

    let request = store
        .insert_join_request(JoinRequest::new(applicant, community.id, String::new()))
        .await
        .unwrap();
    store.add_member(community.id, applicant, admin).await.unwrap();

    let closed = store.find_join_request(request.id).await.unwrap().unwrap();
    assert_eq!(closed.status, RequestStatus::Approved);
    assert_eq!(closed.decided_by, Some(admin));

    store.remove_member(community.id, applicant).await.unwrap();
    store
        .insert_join_request(JoinRequest::new(applicant, community.id, String::new()))
        .await
        .unwrap();
    let page = PageArgs::default().validate().unwrap();
    let (_, pending) = store
        .list_join_requests(community.id, Some(RequestStatus::Pending), &page)
        .await
        .unwrap();
    assert_eq!(pending, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn removal_deactivates_the_grant(ctx: &mut TestHarness) {
    let store = ctx.store();
    let community = active_community(&store, "Riverside").await;
    let user = UserId::new();
    let admin = UserId::new();

    let outsider = store
        .upsert_grant(user, community.id, Permissions::all(), admin)
        .await;
    assert!(matches!(outsider, Err(ModerationError::Conflict(_))));

    assert_eq!(
        store.add_member(community.id, user, admin).await.unwrap(),
        RosterChange::Applied
    );
    assert_eq!(
        store.add_member(community.id, user, admin).await.unwrap(),
        RosterChange::Unchanged
    );

    let first = store
        .upsert_grant(user, community.id, Permissions::all(), admin)
        .await
        .unwrap();
    let narrowed = Permissions::none().with(Permission::ManagePosts);
    let second = store
        .upsert_grant(user, community.id, narrowed, admin)
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.permissions, narrowed);
    assert_eq!(store.active_grants_for_user(user).await.unwrap().len(), 1);

    store.remove_member(community.id, user).await.unwrap();
    let grant = store.find_grant(user, community.id).await.unwrap().unwrap();
    assert_eq!(grant.status, GrantStatus::Inactive);
    assert!(store.active_grants_for_user(user).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn role_requests_are_unique_and_apply_on_approval(ctx: &mut TestHarness) {
    let store = ctx.store();
    let community = active_community(&store, "Hillside").await;
    let user = UserId::new();
    store.add_member(community.id, user, UserId::new()).await.unwrap();

    let request = store
        .insert_role_change_request(RoleChangeRequest::new(
            user,
            community.id,
            GlobalRole::User,
            GlobalRole::Manager,
            None,
        ))
        .await
        .unwrap();
    let duplicate = store
        .insert_role_change_request(RoleChangeRequest::new(
            user,
            community.id,
            GlobalRole::User,
            GlobalRole::Manager,
            None,
        ))
        .await;
    assert!(matches!(duplicate, Err(ModerationError::Conflict(_))));

    let reviewer = UserId::new();
    let outcome = store
        .approve_role_change_request(request.id, reviewer)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.request.status, RequestStatus::Approved);
    let grant = outcome.grant.unwrap();
    assert_eq!(grant.permissions, Permissions::all());
    assert!(store
        .approve_role_change_request(request.id, reviewer)
        .await
        .unwrap()
        .is_none());

    let admin_request = store
        .insert_role_change_request(RoleChangeRequest::new(
            user,
            community.id,
            GlobalRole::Manager,
            GlobalRole::Admin,
            None,
        ))
        .await
        .unwrap();
    store
        .approve_role_change_request(admin_request.id, reviewer)
        .await
        .unwrap()
        .unwrap();
    let assignment = store.find_role_assignment(user).await.unwrap().unwrap();
    assert_eq!(assignment.role, GlobalRole::Admin);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn item_decisions_are_compare_and_set(ctx: &mut TestHarness) {
    let store = ctx.store();
    let community = active_community(&store, "Makers").await;
    let author = UserId::new();
    let item = store
        .insert_item(ModeratedItem::new(community.id, author, &pulse("Hello"), vec![]).unwrap())
        .await
        .unwrap();

    let first = store
        .decide_item(item.id, ItemStatus::Rejected, UserId::new(), Some("spam".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, ItemStatus::Rejected);
    assert_eq!(first.rejection_reason.as_deref(), Some("spam"));

    let second = store
        .decide_item(item.id, ItemStatus::Approved, UserId::new(), None)
        .await
        .unwrap();
    assert!(second.is_none());

    let page = PageArgs::default().validate().unwrap();
    let (published, total) = store
        .list_items(&ItemQuery::published(community.id), &page)
        .await
        .unwrap();
    assert!(published.is_empty());
    assert_eq!(total, 0);

    let own = ItemQuery {
        viewer: Some(author),
        ..ItemQuery::published(community.id)
    };
    let (mine, _) = store.list_items(&own, &page).await.unwrap();
    assert_eq!(mine.len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn soft_delete_keeps_the_first_timestamp(ctx: &mut TestHarness) {
    let store = ctx.store();
    let community = active_community(&store, "Orchard").await;
    let item = store
        .insert_item(
            ModeratedItem::new(community.id, UserId::new(), &pulse("Bye"), vec![]).unwrap(),
        )
        .await
        .unwrap();

    let deleted = store.soft_delete_item(item.id).await.unwrap().unwrap();
    let again = store.soft_delete_item(item.id).await.unwrap().unwrap();
    assert_eq!(deleted.deleted_at, again.deleted_at);
    assert!(store.find_item(item.id).await.unwrap().is_none());
    assert!(store
        .find_item_including_deleted(item.id)
        .await
        .unwrap()
        .is_some());
    assert!(store.soft_delete_item(Default::default()).await.unwrap().is_none());
}
