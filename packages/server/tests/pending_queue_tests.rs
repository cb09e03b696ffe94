//! Pending queue tests: each caller sees only the sections they may decide.

mod common;

use crate::common::{pulse, World};
use community_core::common::{
    Caller, CommunityId, GlobalRole, ModerationError, PageArgs, Permission, Permissions,
};
use community_core::domains::moderation::actions::{decide_item, submit_item};
use community_core::domains::moderation::kinds::Decision;
use community_core::domains::requests::actions::{
    list_pending_for_community, submit_join_request, submit_role_change_request,
    PendingQueue,
};

async fn busy_community(world: &World) -> CommunityId {
    let community = world.active_community("Lakeview Residents").await;
    let author = world.user();
    for n in 0..3 {
        submit_item(community.id, pulse(&format!("Post {}", n)), vec![], &author, &world.deps)
            .await
            .unwrap();
    }
    for _ in 0..2 {
        submit_join_request(community.id, String::new(), &world.user(), &world.deps)
            .await
            .unwrap();
    }
    let member = world.member(community.id).await;
    submit_role_change_request(community.id, GlobalRole::Manager, None, &member, &world.deps)
        .await
        .unwrap();
    community.id
}

async fn queue(world: &World, community_id: CommunityId, caller: &Caller) -> PendingQueue {
    list_pending_for_community(community_id, PageArgs::default(), caller, &world.deps)
        .await
        .unwrap()
}

#[tokio::test]
async fn admins_see_every_section() {
    let world = World::new();
    let community_id = busy_community(&world).await;

    let pending = queue(&world, community_id, &world.admin).await;
    assert_eq!(pending.community_id, community_id);
    assert_eq!(pending.items.map(|p| p.total), Some(3));
    assert_eq!(pending.join_requests.map(|p| p.total), Some(2));
    assert_eq!(pending.role_change_requests.map(|p| p.total), Some(1));
}

#[tokio::test]
async fn managers_see_the_sections_their_flags_cover() {
    let world = World::new();
    let community_id = busy_community(&world).await;

    let poster = world
        .manager(community_id, Permissions::none().with(Permission::ManagePosts))
        .await;
    let pending = queue(&world, community_id, &poster).await;
    assert_eq!(pending.items.map(|p| p.total), Some(3));
    assert!(pending.join_requests.is_none());
    assert!(pending.role_change_requests.is_none());

    let gatekeeper = world
        .manager(community_id, Permissions::none().with(Permission::ApproveJoinRequests))
        .await;
    let pending = queue(&world, community_id, &gatekeeper).await;
    assert!(pending.items.is_none());
    assert_eq!(pending.join_requests.map(|p| p.total), Some(2));
    assert!(pending.role_change_requests.is_none());
}

#[tokio::test]
async fn callers_without_moderation_rights_are_refused() {
    let world = World::new();
    let community_id = busy_community(&world).await;

    let member = world.member(community_id).await;
    let result =
        list_pending_for_community(community_id, PageArgs::default(), &member, &world.deps).await;
    assert!(matches!(result, Err(ModerationError::Forbidden(_))));

    let elsewhere = world.active_community("Riverside Makers").await;
    let foreign_manager = world.manager(elsewhere.id, Permissions::all()).await;
    let result =
        list_pending_for_community(community_id, PageArgs::default(), &foreign_manager, &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Forbidden(_))));

    let result =
        list_pending_for_community(community_id, PageArgs::default(), &Caller::guest(), &world.deps)
            .await;
    assert!(matches!(result, Err(ModerationError::Auth(_))));
}

#[tokio::test]
async fn decided_entries_leave_the_queue_and_pages_are_bounded() {
    let world = World::new();
    let community_id = busy_community(&world).await;

    let page =
        list_pending_for_community(community_id, PageArgs::new(2, 2), &world.admin, &world.deps)
            .await
            .unwrap();
    let items = page.items.unwrap();
    assert_eq!(items.total, 3);
    assert_eq!(items.total_pages, 2);
    assert_eq!(items.items.len(), 1);

    let first = queue(&world, community_id, &world.admin).await;
    let item_id = first.items.unwrap().items[0].id;
    decide_item(item_id, Decision::Approve, None, &world.admin, &world.deps)
        .await
        .unwrap();

    let after = queue(&world, community_id, &world.admin).await;
    assert_eq!(after.items.map(|p| p.total), Some(2));
}

#[tokio::test]
async fn missing_communities_are_not_found() {
    let world = World::new();
    let result = list_pending_for_community(
        Default::default(),
        PageArgs::default(),
        &world.admin,
        &world.deps,
    )
    .await;
    assert!(matches!(result, Err(ModerationError::NotFound(_))));
}
