use serde::{Deserialize, Serialize};

use crate::common::nats::IntoNotification;
use crate::common::{CommunityId, ItemId, UserId};
use crate::domains::moderation::kinds::{ItemKind, ItemStatus};
use crate::domains::moderation::models::ModeratedItem;

/// Moderation events - facts about items reaching a terminal or post-approval state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModerationEvent {
    /// Approved or rejected.
    ItemDecided {
        item_id: ItemId,
        community_id: CommunityId,
        kind: ItemKind,
        author_id: UserId,
        status: ItemStatus,
        decided_by: UserId,
        rejection_reason: Option<String>,
    },

    /// Sold or closed after approval.
    ItemTransitioned {
        item_id: ItemId,
        community_id: CommunityId,
        kind: ItemKind,
        status: ItemStatus,
        actor: UserId,
    },
}

impl ModerationEvent {
    pub fn decided(item: &ModeratedItem, decided_by: UserId) -> Self {
        ModerationEvent::ItemDecided {
            item_id: item.id,
            community_id: item.community_id,
            kind: item.kind,
            author_id: item.author_id,
            status: item.status,
            decided_by,
            rejection_reason: item.rejection_reason.clone(),
        }
    }

    pub fn transitioned(item: &ModeratedItem, actor: UserId) -> Self {
        ModerationEvent::ItemTransitioned {
            item_id: item.id,
            community_id: item.community_id,
            kind: item.kind,
            status: item.status,
            actor,
        }
    }
}

impl IntoNotification for ModerationEvent {
    fn subject(&self) -> String {
        match self {
            ModerationEvent::ItemDecided { status, .. }
            | ModerationEvent::ItemTransitioned { status, .. } => {
                format!("moderation.item.{}", status)
            }
        }
    }

    fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_follows_the_new_status() {
        let event = ModerationEvent::ItemTransitioned {
            item_id: ItemId::new(),
            community_id: CommunityId::new(),
            kind: ItemKind::Listing,
            status: ItemStatus::Sold,
            actor: UserId::new(),
        };
        assert_eq!(event.subject(), "moderation.item.sold");
        assert_eq!(event.payload()["type"], "item_transitioned");
    }
}
