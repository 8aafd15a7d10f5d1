use crate::errors::MainError;
use crate::routing::{Exchange, RoutingContext};
use std::sync::Arc;

/// Sends messages into a running context from outside any route
#[derive(Debug, Clone)]
pub struct ProducerTemplate {
    context: Arc<RoutingContext>,
}

impl ProducerTemplate {
    pub fn new(context: Arc<RoutingContext>) -> Self {
        Self { context }
    }

    /// Send an exchange and return the exchange produced by the endpoint
    pub async fn send(&self, uri: &str, exchange: Exchange) -> Result<Exchange, MainError> {
        if !self.context.is_running() {
            return Err(MainError::delivery(uri, "routing context is not running"));
        }
        let endpoint = self.context.endpoint(uri)?;
        tracing::trace!("Sending exchange {} to '{}'", exchange.id(), endpoint.uri());
        endpoint.send(exchange).await
    }

    pub async fn send_body(&self, uri: &str, body: impl Into<String>) -> Result<(), MainError> {
        self.send(uri, Exchange::new(body)).await.map(|_| ())
    }

    pub async fn send_body_and_header(
        &self,
        uri: &str,
        body: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MainError> {
        self.send(uri, Exchange::new(body).with_header(name, value))
            .await
            .map(|_| ())
    }

    /// Send a body and return the reply body
    pub async fn request_body(&self, uri: &str, body: impl Into<String>) -> Result<String, MainError> {
        self.send(uri, Exchange::new(body))
            .await
            .map(|exchange| exchange.body)
    }
}
