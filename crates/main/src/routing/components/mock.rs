//! Recording sink used to assert what a route delivered.

use crate::container::FromProperty;
use crate::errors::MainError;
use crate::routing::component::attribute_matches;
use crate::routing::{Component, Endpoint, EndpointUri, Exchange, Processor};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const DEFAULT_RESULT_WAIT_MS: u64 = 10_000;

/// The `mock` component
#[derive(Debug)]
pub struct MockComponent {
    result_wait_time_ms: Arc<AtomicU64>,
}

impl MockComponent {
    pub fn new() -> Self {
        Self {
            result_wait_time_ms: Arc::new(AtomicU64::new(DEFAULT_RESULT_WAIT_MS)),
        }
    }

    /// How long assertions wait for expected messages, in milliseconds
    pub fn result_wait_time(&self) -> u64 {
        self.result_wait_time_ms.load(Ordering::SeqCst)
    }
}

impl Default for MockComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for MockComponent {
    fn name(&self) -> &str {
        "mock"
    }

    fn configure_attribute(&self, attribute: &str, value: &str) -> Result<(), MainError> {
        if attribute_matches(attribute, "resultWaitTime") {
            self.result_wait_time_ms
                .store(u64::coerce(attribute, value)?, Ordering::SeqCst);
            Ok(())
        } else {
            Err(MainError::unknown_attribute(self.name(), attribute))
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            "resultWaitTime".to_string(),
            self.result_wait_time().to_string(),
        )])
    }

    fn create_endpoint(&self, uri: &EndpointUri) -> Result<Arc<dyn Endpoint>, MainError> {
        Ok(Arc::new(MockEndpoint {
            uri: uri.to_string(),
            result_wait_time_ms: Arc::clone(&self.result_wait_time_ms),
            received: Mutex::new(Vec::new()),
            expectations: Mutex::new(Expectations::default()),
            arrived: Notify::new(),
        }))
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Debug, Default)]
struct Expectations {
    bodies: Option<Vec<String>>,
    count: Option<usize>,
}

impl Expectations {
    fn required_count(&self) -> usize {
        match (&self.bodies, self.count) {
            (Some(bodies), Some(count)) => bodies.len().max(count),
            (Some(bodies), None) => bodies.len(),
            (None, Some(count)) => count,
            (None, None) => 0,
        }
    }
}

/// A `mock:` endpoint recording every exchange it receives
#[derive(Debug)]
pub struct MockEndpoint {
    uri: String,
    result_wait_time_ms: Arc<AtomicU64>,
    received: Mutex<Vec<Exchange>>,
    expectations: Mutex<Expectations>,
    arrived: Notify,
}

impl MockEndpoint {
    /// Expect exactly these bodies, in order
    pub fn expected_bodies_received<I, S>(&self, bodies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expectations.lock().bodies = Some(bodies.into_iter().map(Into::into).collect());
    }

    pub fn expected_message_count(&self, count: usize) {
        self.expectations.lock().count = Some(count);
    }

    pub fn received_counter(&self) -> usize {
        self.received.lock().len()
    }

    pub fn received_exchanges(&self) -> Vec<Exchange> {
        self.received.lock().clone()
    }

    pub fn received_bodies(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .map(|exchange| exchange.body.clone())
            .collect()
    }

    /// Clear received messages and expectations
    pub fn reset(&self) {
        self.received.lock().clear();
        *self.expectations.lock() = Expectations::default();
    }

    /// Wait up to the component's `resultWaitTime` for the expected number of
    /// messages, then verify count and bodies
    pub async fn assert_is_satisfied(&self) -> Result<(), MainError> {
        let wait = Duration::from_millis(self.result_wait_time_ms.load(Ordering::SeqCst));
        self.assert_is_satisfied_within(wait).await
    }

    pub async fn assert_is_satisfied_within(&self, wait: Duration) -> Result<(), MainError> {
        let required = self.expectations.lock().required_count();
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let arrived = self.arrived.notified();
            if self.received_counter() >= required {
                break;
            }
            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                break;
            }
        }

        let bodies = self.received_bodies();
        let expectations = self.expectations.lock();

        if let Some(count) = expectations.count {
            if bodies.len() != count {
                return Err(MainError::assertion(
                    &self.uri,
                    format!("expected {} message(s) but received {}", count, bodies.len()),
                ));
            }
        }
        if let Some(expected) = &expectations.bodies {
            if &bodies != expected {
                return Err(MainError::assertion(
                    &self.uri,
                    format!("expected bodies {:?} but received {:?}", expected, bodies),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Endpoint for MockEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn send(&self, exchange: Exchange) -> Result<Exchange, MainError> {
        self.received.lock().push(exchange.clone());
        self.arrived.notify_waiters();
        Ok(exchange)
    }

    fn bind_consumer(&self, _consumer: Arc<dyn Processor>) -> Result<(), MainError> {
        Err(MainError::route_install(
            &self.uri,
            "mock endpoints cannot be consumed from",
        ))
    }

    fn stop(&self) {}

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
