//! Community actions - entry-point functions for lifecycle and membership.
//!
//! Actions are self-contained: they take the resolved caller, run the authorization gate,
//! call the store and return the updated entity or a typed error.

pub mod lifecycle;
pub mod membership;

pub use lifecycle::*;
pub use membership::*;
