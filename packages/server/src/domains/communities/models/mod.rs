pub mod community;
pub mod manager_grant;
pub mod role_assignment;

pub use community::*;
pub use manager_grant::*;
pub use role_assignment::*;
