use crate::errors::MainError;
use crate::foundation::RunningFlag;
use crate::routing::{Endpoint, Exchange, Expression, InflightRepository, Processor};
use async_trait::async_trait;
use std::sync::Arc;

/// A route step with its endpoint already resolved
pub enum RouteStep {
    SetBody(Expression),
    SetHeader(String, Expression),
    Log(String),
    To(Arc<dyn Endpoint>),
}

impl std::fmt::Debug for RouteStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteStep::SetBody(expression) => f.debug_tuple("SetBody").field(expression).finish(),
            RouteStep::SetHeader(name, expression) => f
                .debug_tuple("SetHeader")
                .field(name)
                .field(expression)
                .finish(),
            RouteStep::Log(message) => f.debug_tuple("Log").field(message).finish(),
            RouteStep::To(endpoint) => f.debug_tuple("To").field(&endpoint.uri()).finish(),
        }
    }
}

/// An installed route, bound as the consumer of its input endpoint
#[derive(Debug)]
pub struct Route {
    id: String,
    from_uri: String,
    steps: Vec<RouteStep>,
    inflight: Arc<InflightRepository>,
    // open while the owning context is started
    active: RunningFlag,
}

impl Route {
    pub fn new(
        id: String,
        from_uri: String,
        steps: Vec<RouteStep>,
        inflight: Arc<InflightRepository>,
        active: RunningFlag,
    ) -> Self {
        Self {
            id,
            from_uri,
            steps,
            inflight,
            active,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from_uri(&self) -> &str {
        &self.from_uri
    }
}

#[async_trait]
impl Processor for Route {
    async fn process(&self, mut exchange: Exchange) -> Result<Exchange, MainError> {
        if !self.active.is_running() {
            return Err(MainError::delivery(
                &self.from_uri,
                format!("route '{}' is not started", self.id),
            ));
        }
        let _inflight = self.inflight.begin();

        for step in &self.steps {
            match step {
                RouteStep::SetBody(expression) => {
                    exchange.body = expression.evaluate(&exchange);
                }
                RouteStep::SetHeader(name, expression) => {
                    let value = expression.evaluate(&exchange);
                    exchange.headers.insert(name.clone(), value);
                }
                RouteStep::Log(message) => {
                    tracing::info!(
                        route = %self.id,
                        exchange = %exchange.id(),
                        "{}",
                        message.replace("${body}", &exchange.body)
                    );
                }
                RouteStep::To(endpoint) => {
                    exchange = endpoint.send(exchange).await?;
                }
            }
        }

        Ok(exchange)
    }
}
