// Community Platform - Moderation Core
//
// Multi-tenant moderation and membership engine: an authorization gate, a generic
// submission registry, join and role change request workflows, and the membership store
// they mutate. Each workflow follows the same shape, `pending -> approved | rejected`,
// with decisions applied as compare-and-set on `pending`.
//
// Business logic lives per-domain in domains/*/actions; storage backends in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
