// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    BaseIdentityProvider, BaseMediaStore, InMemoryStore, ServerDeps, TestNotificationBus,
    VerifiedIdentity,
};
use crate::common::{AuthError, GlobalRole, UserId};

// =============================================================================
// Mock Identity Provider
// =============================================================================

/// Resolves tokens from a fixed table.
#[derive(Default)]
pub struct MockIdentityProvider {
    tokens: Mutex<HashMap<String, VerifiedIdentity>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token and return it.
    pub fn issue(&self, user_id: UserId, global_role: GlobalRole) -> String {
        let token = format!("token-{}", user_id);
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                token.clone(),
                VerifiedIdentity {
                    user_id,
                    global_role,
                },
            );
        token
    }
}

#[async_trait]
impl BaseIdentityProvider for MockIdentityProvider {
    async fn verify(&self, token: &str) -> std::result::Result<VerifiedIdentity, AuthError> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .copied()
            .ok_or(AuthError::InvalidToken)
    }
}

// =============================================================================
// Mock Media Store
// =============================================================================

/// Keeps uploads in memory. Can be told to fail uploads after a number of successes, and
/// records every delete.
#[derive(Default)]
pub struct MockMediaStore {
    objects: Mutex<HashMap<String, Bytes>>,
    deleted: Mutex<Vec<String>>,
    uploads: AtomicUsize,
    fail_after: Option<usize>,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upload fails.
    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    /// The first `successes` uploads succeed, every later one fails.
    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::default()
        }
    }

    pub fn stored_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        urls.sort();
        urls
    }

    /// URLs passed to `delete`, in call order.
    pub fn deleted_urls(&self) -> Vec<String> {
        self.deleted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(url)
    }
}

#[async_trait]
impl BaseMediaStore for MockMediaStore {
    async fn store(&self, bytes: Bytes, folder: &str) -> Result<String> {
        let attempt = self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|successes| attempt >= successes) {
            anyhow::bail!("media store unavailable");
        }
        let url = format!("https://media.test/{}/{}", folder, uuid::Uuid::new_v4());
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.clone(), bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        self.deleted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(url)
            .is_some())
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<InMemoryStore>,
    pub identity: Arc<MockIdentityProvider>,
    pub media: Arc<MockMediaStore>,
    pub notifications: Arc<TestNotificationBus>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            identity: Arc::new(MockIdentityProvider::new()),
            media: Arc::new(MockMediaStore::new()),
            notifications: Arc::new(TestNotificationBus::new()),
        }
    }

    /// Set a mock media store
    pub fn mock_media(mut self, media: MockMediaStore) -> Self {
        self.media = Arc::new(media);
        self
    }

    /// Set a notification bus
    pub fn mock_notifications(mut self, bus: TestNotificationBus) -> Self {
        self.notifications = Arc::new(bus);
        self
    }

    /// Convert into ServerDeps for testing
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::builder()
            .store(self.store.clone())
            .identity(self.identity.clone())
            .media(self.media.clone())
            .notifications(self.notifications.clone())
            .build()
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
