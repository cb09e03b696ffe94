//! Moderation actions - the submission registry's entry points.
//!
//! One state machine serves every item kind: `pending -> approved | rejected`, then the
//! kind's post-approval states. Decisions are compare-and-set on `pending` in the store;
//! the loser of a race gets [`ModerationError::AlreadyDecided`].

use bytes::Bytes;
use tracing::{info, warn};

use crate::common::{
    Action, Actor, Caller, CommunityId, ItemId, ModerationError, PageArgs, Paginated, Result,
    Target,
};
use crate::domains::moderation::events::ModerationEvent;
use crate::domains::moderation::kinds::{
    require_reason, Decision, ItemKind, ItemStatus, Moderatable,
};
use crate::domains::moderation::models::{ItemQuery, ModeratedItem};
use crate::kernel::{publish_event, ServerDeps};

/// Optional filters for community listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub kind: Option<ItemKind>,
    pub status: Option<ItemStatus>,
}

/// Submit an item for moderation. It starts `pending`.
///
/// Attachments are uploaded first; if storing the item fails, the uploads are deleted again.
pub async fn submit_item<P: Moderatable>(
    community_id: CommunityId,
    payload: P,
    attachments: Vec<Bytes>,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<ModeratedItem> {
    Actor::new(caller)
        .can(Action::SubmitItem)
        .on(Target::community(community_id))
        .check()?;

    payload.validate()?;

    let community = deps
        .store
        .find_community(community_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))?;
    community.ensure_active()?;

    let folder = format!("communities/{}/{}", community_id, P::KIND);
    let media_urls = upload_attachments(attachments, &folder, deps).await?;

    let item = ModeratedItem::new(community_id, caller.user_id, &payload, media_urls.clone())?;
    let item = match deps.store.insert_item(item).await {
        Ok(item) => item,
        Err(e) => {
            discard_uploads(&media_urls, deps).await;
            return Err(e);
        }
    };

    info!(
        item_id = %item.id,
        community_id = %community_id,
        kind = %item.kind,
        author_id = %caller.user_id,
        "item submitted"
    );
    Ok(item)
}

async fn upload_attachments(
    attachments: Vec<Bytes>,
    folder: &str,
    deps: &ServerDeps,
) -> Result<Vec<String>> {
    if attachments.is_empty() {
        return Ok(Vec::new());
    }
    let media = deps
        .media
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no media store configured"))?;

    let mut urls = Vec::with_capacity(attachments.len());
    for bytes in attachments {
        match media.store(bytes, folder).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                discard_uploads(&urls, deps).await;
                return Err(e.context("media upload failed").into());
            }
        }
    }
    Ok(urls)
}

/// Best-effort compensation; a leftover object is logged, not surfaced.
async fn discard_uploads(urls: &[String], deps: &ServerDeps) {
    let Some(media) = deps.media.as_ref() else {
        return;
    };
    for url in urls {
        if let Err(e) = media.delete(url).await {
            warn!(%url, error = %e, "failed to delete orphaned upload");
        }
    }
}

/// Approve or reject a pending item. Rejections need a non-empty reason, stored verbatim.
/// An item that is no longer pending reports `AlreadyDecided` before the reason is checked.
pub async fn decide_item(
    item_id: ItemId,
    decision: Decision,
    reason: Option<String>,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<ModeratedItem> {
    let item = deps
        .store
        .find_item(item_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("item {}", item_id)))?;

    Actor::new(caller)
        .can(Action::DecideItem)
        .on(Target::community(item.community_id))
        .check()?;

    if !item.is_pending() {
        return Err(ModerationError::AlreadyDecided);
    }
    let reason = require_reason(decision, reason)?;
    let status = decision.item_status();

    let Some(decided) = deps
        .store
        .decide_item(item_id, status, caller.user_id, reason)
        .await?
    else {
        return Err(lost_race(item_id, deps).await?);
    };

    info!(
        item_id = %item_id,
        community_id = %decided.community_id,
        status = %decided.status,
        decided_by = %caller.user_id,
        "item decided"
    );
    publish_event(deps, &ModerationEvent::decided(&decided, caller.user_id));
    Ok(decided)
}

/// Tell a lost compare-and-set apart from an item that vanished in between.
async fn lost_race(item_id: ItemId, deps: &ServerDeps) -> Result<ModerationError> {
    Ok(match deps.store.find_item(item_id).await? {
        Some(_) => ModerationError::AlreadyDecided,
        None => ModerationError::not_found(format!("item {}", item_id)),
    })
}

/// Move an approved item to one of its kind's post-approval states (a listing to `sold`).
/// Allowed for the author and for managers with `ManagePosts`.
pub async fn transition_item(
    item_id: ItemId,
    new_status: ItemStatus,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<ModeratedItem> {
    let item = deps
        .store
        .find_item(item_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("item {}", item_id)))?;

    Actor::new(caller)
        .can(Action::TransitionItem)
        .on(Target::owned(item.community_id, item.author_id))
        .check()?;

    item.kind.check_transition(item.status, new_status)?;

    let Some(moved) = deps
        .store
        .transition_item(item_id, new_status, caller.user_id)
        .await?
    else {
        // Someone else moved it first; report against what is stored now.
        let current = deps
            .store
            .find_item(item_id)
            .await?
            .ok_or_else(|| ModerationError::not_found(format!("item {}", item_id)))?;
        return Err(ModerationError::InvalidTransition {
            from: current.status.to_string(),
            to: new_status.to_string(),
        });
    };

    info!(item_id = %item_id, status = %new_status, actor = %caller.user_id, "item transitioned");
    publish_event(deps, &ModerationEvent::transitioned(&moved, caller.user_id));
    Ok(moved)
}

/// Soft delete. The row is kept for audit and hidden from every read. Repeating is a no-op.
pub async fn soft_delete_item(
    item_id: ItemId,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<ModeratedItem> {
    let item = deps
        .store
        .find_item_including_deleted(item_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("item {}", item_id)))?;

    Actor::new(caller)
        .can(Action::DeleteItem)
        .on(Target::owned(item.community_id, item.author_id))
        .check()?;

    if item.is_deleted() {
        return Ok(item);
    }
    let deleted = deps
        .store
        .soft_delete_item(item_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("item {}", item_id)))?;

    info!(item_id = %item_id, deleted_by = %caller.user_id, "item deleted");
    Ok(deleted)
}

fn can_moderate(caller: &Caller, community_id: CommunityId) -> bool {
    Actor::new(caller)
        .can(Action::ViewPending)
        .on(Target::community(community_id))
        .decide()
        .is_allowed()
}

/// Read one item. Unpublished items are visible to their author and the community's
/// moderators only; to everyone else they do not exist.
pub async fn get_item(
    item_id: ItemId,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<ModeratedItem> {
    let item = deps
        .store
        .find_item(item_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("item {}", item_id)))?;

    let visible = item.status.is_published()
        || (!caller.is_guest() && item.author_id == caller.user_id)
        || can_moderate(caller, item.community_id);
    if !visible {
        return Err(ModerationError::not_found(format!("item {}", item_id)));
    }
    Ok(item)
}

/// List a community's items, newest first, with the same visibility as [`get_item`].
pub async fn list_items_by_community(
    community_id: CommunityId,
    filter: ItemFilter,
    page: PageArgs,
    caller: &Caller,
    deps: &ServerDeps,
) -> Result<Paginated<ModeratedItem>> {
    let page = page.validate_with(deps.default_page_limit)?;
    deps.store
        .find_community(community_id)
        .await?
        .ok_or_else(|| ModerationError::not_found(format!("community {}", community_id)))?;

    let query = ItemQuery {
        community_id,
        kind: filter.kind,
        status: filter.status,
        include_unpublished: can_moderate(caller, community_id),
        viewer: (!caller.is_guest()).then_some(caller.user_id),
    };
    let (items, total) = deps.store.list_items(&query, &page).await?;
    Ok(Paginated::new(items, total, &page))
}
