//! Fire-and-forget event publishing.
//!
//! Publishing runs on its own task after the state change has been stored. A failed or slow
//! bus is logged and otherwise ignored; it never fails or delays the decision.

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::common::nats::IntoNotification;
use crate::kernel::ServerDeps;

/// Publish `event` in the background. Returns the task handle (tests await it), or `None`
/// when no bus is configured.
pub fn publish_event<E: IntoNotification>(deps: &ServerDeps, event: &E) -> Option<JoinHandle<()>> {
    let bus = deps.notifications.clone()?;
    let subject = event.subject();
    let payload = match serde_json::to_vec(&event.payload()) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            warn!(%subject, error = %e, "failed to encode event");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        match bus.publish(subject.clone(), payload).await {
            Ok(()) => debug!(%subject, "event published"),
            Err(e) => warn!(%subject, error = %e, "failed to publish event"),
        }
    }))
}
