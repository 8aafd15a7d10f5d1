use crate::errors::MainError;
use crate::routing::{EndpointUri, Exchange};
use async_trait::async_trait;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Something that handles an exchange and returns the resulting exchange
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, exchange: Exchange) -> Result<Exchange, MainError>;
}

/// Named, pluggable transport registered in the routing context
pub trait Component: Send + Sync + 'static {
    /// Scheme this component serves, e.g. `seda`
    fn name(&self) -> &str;

    /// Set a configurable attribute from its string form
    fn configure_attribute(&self, attribute: &str, value: &str) -> Result<(), MainError>;

    /// Current attribute values keyed by canonical name
    fn attributes(&self) -> BTreeMap<String, String>;

    fn create_endpoint(&self, uri: &EndpointUri) -> Result<Arc<dyn Endpoint>, MainError>;

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Address messages can be sent to, and optionally consumed from
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    fn uri(&self) -> &str;

    /// Deliver an exchange to this endpoint
    async fn send(&self, exchange: Exchange) -> Result<Exchange, MainError>;

    /// Attach the route that consumes from this endpoint
    fn bind_consumer(&self, consumer: Arc<dyn Processor>) -> Result<(), MainError>;

    /// Begin consuming. Called once when the context starts.
    async fn start(&self) -> Result<(), MainError> {
        Ok(())
    }

    /// True when no accepted message is waiting for this endpoint's consumer
    fn is_idle(&self) -> bool {
        true
    }

    /// Stop accepting new messages and finish pending ones, within `timeout`
    async fn drain(&self, _timeout: Duration) {}

    /// Detach the consumer
    fn stop(&self);

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Attribute names compare case-insensitively and ignore dashes
pub fn attribute_matches(candidate: &str, canonical: &str) -> bool {
    let mut left = candidate.chars().filter(|c| *c != '-');
    let mut right = canonical.chars().filter(|c| *c != '-');
    loop {
        match (left.next(), right.next()) {
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(&b) => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
