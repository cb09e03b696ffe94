//! Requests: community join requests and role change requests.

pub mod actions;
pub mod models;
