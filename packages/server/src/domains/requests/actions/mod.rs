//! Request engine actions - join and role change requests.
//!
//! Same shape as item moderation (`pending -> approved | rejected`, plus `withdrawn` by the
//! requester), but approval also mutates the membership store in the same atomic step.

pub mod join;
pub mod pending;
pub mod role_change;

pub use join::*;
pub use pending::*;
pub use role_change::*;
