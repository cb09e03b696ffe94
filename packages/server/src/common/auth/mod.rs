//! Authorization for the community platform.
//!
//! Roles are resolved once per request into a [`Caller`]; every state transition then
//! passes through the gate:
//!
//! ```rust,ignore
//! use crate::common::auth::{Action, Actor, Target};
//!
//! Actor::new(&caller)
//!     .can(Action::DecideJoinRequest)
//!     .on(Target::community(request.community_id))
//!     .check()?;
//! ```
//!
//! The gate is a pure function of the caller, the action and the target; it performs no
//! I/O and needs no synchronization.

mod builder;
mod capability;
mod errors;
mod role;

pub use builder::{authorize, AccessDecision, Actor, CapabilityBuilder, DenyReason};
pub use capability::{Action, ActionScope, Target};
pub use errors::AuthError;
pub use role::{Caller, CommunityGrants, GlobalRole, Permission, Permissions, Role};
