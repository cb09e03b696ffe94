//! Identity & role resolution: who is calling and with what authority.

pub mod jwt;
pub mod resolver;

pub use jwt::{Claims, JwtIdentityProvider};
pub use resolver::{resolve_caller, resolve_user};
