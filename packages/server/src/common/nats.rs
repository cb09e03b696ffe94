//! Common notification publishing utilities.
//!
//! Domain events implement [`IntoNotification`] to declare their subject and payload.
//! Publishing itself happens in `kernel::notify`, after the state change has been stored.

/// Trait for domain events that are published on the notification bus.
///
/// ```ignore
/// impl IntoNotification for MyEvent {
///     fn subject(&self) -> String {
///         format!("my_domain.{}", self.verb())
///     }
///
///     fn payload(&self) -> serde_json::Value {
///         serde_json::to_value(self).unwrap_or_default()
///     }
/// }
/// ```
pub trait IntoNotification: Send + Sync {
    /// Dotted subject, e.g. `moderation.item.approved`.
    fn subject(&self) -> String;

    /// JSON body of the message.
    fn payload(&self) -> serde_json::Value;
}
