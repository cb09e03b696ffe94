//! Server dependencies for actions (using traits for testability)
//!
//! This module provides the central dependency container used by all domain actions.
//! All external services use trait abstractions to enable testing.

use std::sync::Arc;
use typed_builder::TypedBuilder;

use crate::common::pagination::DEFAULT_LIMIT;
use crate::kernel::{BaseIdentityProvider, BaseMediaStore, BaseNotificationBus, ModerationStore};

/// Server dependencies accessible to actions.
#[derive(Clone, TypedBuilder)]
pub struct ServerDeps {
    pub store: Arc<dyn ModerationStore>,
    pub identity: Arc<dyn BaseIdentityProvider>,
    /// Needed only when items are submitted with attachments.
    #[builder(default, setter(strip_option))]
    pub media: Option<Arc<dyn BaseMediaStore>>,
    /// Decisions still succeed without a bus; events are just not published.
    #[builder(default, setter(strip_option))]
    pub notifications: Option<Arc<dyn BaseNotificationBus>>,
    /// Page size used when a list call does not ask for one.
    #[builder(default = DEFAULT_LIMIT)]
    pub default_page_limit: u32,
}
