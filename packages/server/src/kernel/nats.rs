//! Notification bus backed by NATS, plus a recording bus for tests.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::RwLock;

use super::traits::BaseNotificationBus;

/// A published message.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// Real NATS client publisher.
pub struct NatsNotificationBus {
    client: async_nats::Client,
}

impl NatsNotificationBus {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url).await?;
        Ok(Self::new(client))
    }

    /// Wait until buffered messages have been written to the server.
    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl BaseNotificationBus for NatsNotificationBus {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.client.publish(subject, payload).await?;
        Ok(())
    }
}

/// Records published messages so tests can inspect them. Can be told to fail every publish.
#[derive(Default)]
pub struct TestNotificationBus {
    published: RwLock<Vec<PublishedMessage>>,
    failing: bool,
}

impl TestNotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus whose every publish errors.
    pub fn failing() -> Self {
        Self {
            published: RwLock::default(),
            failing: true,
        }
    }

    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    pub fn was_published_to(&self, subject: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|m| m.subject == subject)
    }

    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Deserialize a published message payload as JSON.
    pub fn deserialize_message<T: serde::de::DeserializeOwned>(
        &self,
        msg: &PublishedMessage,
    ) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&msg.payload)
    }
}

#[async_trait]
impl BaseNotificationBus for TestNotificationBus {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        if self.failing {
            anyhow::bail!("notification bus unavailable");
        }
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage { subject, payload });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_published_messages() {
        let bus = TestNotificationBus::new();
        bus.publish(
            "moderation.item.approved".to_string(),
            Bytes::from(r#"{"item_id":"123"}"#),
        )
        .await
        .unwrap();

        assert_eq!(bus.publish_count(), 1);
        assert!(bus.was_published_to("moderation.item.approved"));
        assert!(!bus.was_published_to("moderation.item.rejected"));
    }

    #[tokio::test]
    async fn failing_bus_records_nothing() {
        let bus = TestNotificationBus::failing();
        assert!(bus
            .publish("membership.join.approved".to_string(), Bytes::new())
            .await
            .is_err());
        assert_eq!(bus.publish_count(), 0);
    }
}
