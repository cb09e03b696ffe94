//! Typed ID definitions for all domain entities.
//!
//! ```rust
//! use community_core::common::{JoinRequestId, UserId};
//!
//! let user_id = UserId::new();
//! let request_id = JoinRequestId::new();
//! // let wrong: JoinRequestId = user_id; // compile error
//! # let _ = (user_id, request_id);
//! ```

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for platform users (identities come from the identity provider).
pub struct User;

/// Marker type for communities (tenant scopes).
pub struct Community;

/// Marker type for moderated items (pulses, listings, directory entries).
pub struct ModeratedItem;

/// Marker type for community join requests.
pub struct JoinRequest;

/// Marker type for role change requests.
pub struct RoleChangeRequest;

/// Marker type for community manager grants.
pub struct ManagerGrant;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type UserId = Id<User>;

pub type CommunityId = Id<Community>;

pub type ItemId = Id<ModeratedItem>;

pub type JoinRequestId = Id<JoinRequest>;

pub type RoleChangeRequestId = Id<RoleChangeRequest>;

pub type ManagerGrantId = Id<ManagerGrant>;
