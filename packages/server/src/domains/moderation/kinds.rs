//! Item kinds and their payloads.
//!
//! Pulses, marketplace listings and directory entries share one moderation state machine.
//! What differs per kind is the payload shape and the small table of states reachable
//! after approval:
//!
//! | kind            | post-approval states |
//! |-----------------|----------------------|
//! | pulse           | (none)               |
//! | listing         | sold, closed         |
//! | directory_entry | closed               |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::common::{ModerationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Pulse,
    Listing,
    DirectoryEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
    Sold,
    Closed,
}

impl ItemStatus {
    /// Statuses visible on community-facing reads.
    pub const PUBLISHED: [ItemStatus; 3] =
        [ItemStatus::Approved, ItemStatus::Sold, ItemStatus::Closed];

    pub fn is_published(&self) -> bool {
        Self::PUBLISHED.contains(self)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Approved => write!(f, "approved"),
            ItemStatus::Rejected => write!(f, "rejected"),
            ItemStatus::Sold => write!(f, "sold"),
            ItemStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "approved" => Ok(ItemStatus::Approved),
            "rejected" => Ok(ItemStatus::Rejected),
            "sold" => Ok(ItemStatus::Sold),
            "closed" => Ok(ItemStatus::Closed),
            _ => Err(anyhow::anyhow!("Invalid item status: {}", s)),
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Pulse => write!(f, "pulse"),
            ItemKind::Listing => write!(f, "listing"),
            ItemKind::DirectoryEntry => write!(f, "directory_entry"),
        }
    }
}

impl ItemKind {
    pub fn post_approval_states(&self) -> &'static [ItemStatus] {
        match self {
            ItemKind::Pulse => &[],
            ItemKind::Listing => &[ItemStatus::Sold, ItemStatus::Closed],
            ItemKind::DirectoryEntry => &[ItemStatus::Closed],
        }
    }

    /// Check a post-approval transition against the kind's table.
    pub fn check_transition(&self, from: ItemStatus, to: ItemStatus) -> Result<()> {
        if from == ItemStatus::Approved && self.post_approval_states().contains(&to) {
            return Ok(());
        }
        Err(ModerationError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Moderator verdict on a pending item or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn item_status(&self) -> ItemStatus {
        match self {
            Decision::Approve => ItemStatus::Approved,
            Decision::Reject => ItemStatus::Rejected,
        }
    }
}

/// Rejections require a non-blank reason; it is stored verbatim.
pub fn require_reason(decision: Decision, reason: Option<String>) -> Result<Option<String>> {
    match decision {
        Decision::Approve => Ok(None),
        Decision::Reject => match reason {
            Some(reason) if !reason.trim().is_empty() => Ok(Some(reason)),
            _ => Err(ModerationError::reason_required()),
        },
    }
}

/// Capability shared by every payload that goes through moderation.
pub trait Moderatable: Serialize + DeserializeOwned + Send + Sync {
    const KIND: ItemKind;

    /// Field-level validation run before the item is stored.
    fn validate(&self) -> Result<()>;
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ModerationError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

// =============================================================================
// Pulse
// =============================================================================

/// Community post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulsePayload {
    pub title: String,
    pub body: String,
}

impl Moderatable for PulsePayload {
    const KIND: ItemKind = ItemKind::Pulse;

    fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        require_text("body", &self.body)
    }
}

// =============================================================================
// Marketplace listing
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Sell,
    Buy,
    Rent,
    Giveaway,
}

/// Marketplace listing. `price` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPayload {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub price: Option<i64>,
}

impl Moderatable for ListingPayload {
    const KIND: ItemKind = ItemKind::Listing;

    fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        match (self.listing_type, self.price) {
            (_, Some(price)) if price < 0 => Err(ModerationError::Validation(
                "price must not be negative".to_string(),
            )),
            (ListingType::Sell | ListingType::Rent, None) => Err(ModerationError::Validation(
                "price is required for sell and rent listings".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Directory entry
// =============================================================================

/// Service directory entry (plumber, tutor, clinic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntryPayload {
    pub name: String,
    pub category: String,
    pub phone: Option<String>,
    pub description: Option<String>,
}

impl Moderatable for DirectoryEntryPayload {
    const KIND: ItemKind = ItemKind::DirectoryEntry;

    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("category", &self.category)?;
        if let Some(phone) = &self.phone {
            let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
            if digits < 7 {
                return Err(ModerationError::Validation(format!(
                    "phone number {} is too short",
                    phone
                )));
            }
        }
        Ok(())
    }
}
