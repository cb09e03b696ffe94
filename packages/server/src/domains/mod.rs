// Business domains
pub mod communities;
pub mod identity;
pub mod moderation;
pub mod requests;
