// Common types and utilities shared across the application

pub mod audit;
pub mod auth;
pub mod entity_ids;
pub mod error;
pub mod id;
pub mod nats;
pub mod pagination;

pub use audit::{AuditRecord, Audited};
pub use auth::{Action, Actor, AuthError, Caller, GlobalRole, Permission, Permissions, Role, Target};
pub use entity_ids::{
    CommunityId, ItemId, JoinRequestId, ManagerGrantId, RoleChangeRequestId, UserId,
};
pub use error::{ModerationError, Result};
pub use id::Id;
pub use nats::IntoNotification;
pub use pagination::{PageArgs, Paginated, ValidatedPage};
