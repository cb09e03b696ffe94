//! Moderation: the submission registry shared by pulses, listings and directory entries.

pub mod actions;
pub mod events;
pub mod kinds;
pub mod models;
