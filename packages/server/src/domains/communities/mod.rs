//! Communities: tenant scopes, their rosters and manager grants.

pub mod actions;
pub mod events;
pub mod models;
