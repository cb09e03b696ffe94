pub mod join_request;
pub mod role_change_request;

pub use join_request::*;
pub use role_change_request::*;
