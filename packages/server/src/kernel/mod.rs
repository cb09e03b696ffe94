//! Kernel module - infrastructure traits, adapters and dependencies.

pub mod deps;
pub mod memory_store;
pub mod nats;
pub mod notify;
pub mod postgres_store;
pub mod test_dependencies;
pub mod traits;

pub use deps::ServerDeps;
pub use memory_store::InMemoryStore;
pub use nats::{NatsNotificationBus, PublishedMessage, TestNotificationBus};
pub use notify::publish_event;
pub use postgres_store::PgModerationStore;
pub use test_dependencies::{MockIdentityProvider, MockMediaStore, TestDependencies};
pub use traits::*;
