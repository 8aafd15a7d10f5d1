//! Synchronous in-process hand-off. The sender runs the consuming route on
//! its own task and receives the route's resulting exchange.

use crate::container::FromProperty;
use crate::errors::MainError;
use crate::routing::component::attribute_matches;
use crate::routing::{Component, Endpoint, EndpointUri, Exchange, Processor};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug)]
struct DirectSettings {
    timeout_ms: AtomicU64,
    block: AtomicBool,
}

/// The `direct` component
#[derive(Debug)]
pub struct DirectComponent {
    settings: Arc<DirectSettings>,
}

impl DirectComponent {
    pub fn new() -> Self {
        Self {
            settings: Arc::new(DirectSettings {
                timeout_ms: AtomicU64::new(DEFAULT_TIMEOUT_MS),
                block: AtomicBool::new(true),
            }),
        }
    }

    /// How long a blocking sender waits for a consumer, in milliseconds
    pub fn timeout(&self) -> u64 {
        self.settings.timeout_ms.load(Ordering::SeqCst)
    }

    pub fn set_timeout(&self, millis: u64) {
        self.settings.timeout_ms.store(millis, Ordering::SeqCst);
    }

    /// Whether senders wait for a consumer instead of failing immediately
    pub fn block(&self) -> bool {
        self.settings.block.load(Ordering::SeqCst)
    }

    pub fn set_block(&self, block: bool) {
        self.settings.block.store(block, Ordering::SeqCst);
    }
}

impl Default for DirectComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for DirectComponent {
    fn name(&self) -> &str {
        "direct"
    }

    fn configure_attribute(&self, attribute: &str, value: &str) -> Result<(), MainError> {
        if attribute_matches(attribute, "timeout") {
            self.set_timeout(u64::coerce(attribute, value)?);
        } else if attribute_matches(attribute, "block") {
            self.set_block(bool::coerce(attribute, value)?);
        } else {
            return Err(MainError::unknown_attribute(self.name(), attribute));
        }
        Ok(())
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("block".to_string(), self.block().to_string()),
            ("timeout".to_string(), self.timeout().to_string()),
        ])
    }

    fn create_endpoint(&self, uri: &EndpointUri) -> Result<Arc<dyn Endpoint>, MainError> {
        Ok(Arc::new(DirectEndpoint {
            uri: uri.to_string(),
            settings: Arc::clone(&self.settings),
            consumer: RwLock::new(None),
            consumer_available: Notify::new(),
        }))
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A `direct:` endpoint; at most one route may consume from it
pub struct DirectEndpoint {
    uri: String,
    settings: Arc<DirectSettings>,
    consumer: RwLock<Option<Arc<dyn Processor>>>,
    consumer_available: Notify,
}

impl DirectEndpoint {
    pub fn has_consumer(&self) -> bool {
        self.consumer.read().is_some()
    }
}

impl std::fmt::Debug for DirectEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectEndpoint")
            .field("uri", &self.uri)
            .field("has_consumer", &self.has_consumer())
            .finish()
    }
}

#[async_trait]
impl Endpoint for DirectEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn send(&self, exchange: Exchange) -> Result<Exchange, MainError> {
        let timeout = Duration::from_millis(self.settings.timeout_ms.load(Ordering::SeqCst));
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let available = self.consumer_available.notified();
            let consumer = self.consumer.read().clone();
            if let Some(consumer) = consumer {
                return consumer.process(exchange).await;
            }

            if !self.settings.block.load(Ordering::SeqCst) {
                return Err(MainError::delivery(&self.uri, "no consumers available"));
            }
            if tokio::time::timeout_at(deadline, available).await.is_err() {
                return Err(MainError::delivery(
                    &self.uri,
                    format!("no consumers available after waiting {}ms", timeout.as_millis()),
                ));
            }
        }
    }

    fn bind_consumer(&self, consumer: Arc<dyn Processor>) -> Result<(), MainError> {
        let mut slot = self.consumer.write();
        if slot.is_some() {
            return Err(MainError::route_install(
                &self.uri,
                "multiple consumers for the same direct endpoint are not allowed",
            ));
        }
        *slot = Some(consumer);
        drop(slot);
        self.consumer_available.notify_waiters();
        Ok(())
    }

    fn stop(&self) {
        self.consumer.write().take();
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
