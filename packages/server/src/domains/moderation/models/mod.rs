pub mod moderated_item;

pub use moderated_item::*;
