//! Route definition DSL
//!
//! ```rust
//! use elif_main::routing::{constant, RouteDefinitions};
//!
//! let mut routes = RouteDefinitions::new();
//! routes
//!     .from("direct:start")
//!     .transform(constant("World"))
//!     .to("mock:results");
//! assert_eq!(routes.len(), 1);
//! ```

use crate::container::Injectable;
use crate::errors::MainError;
use crate::routing::Exchange;
use std::sync::Arc;

type ExpressionFn = Arc<dyn Fn(&Exchange) -> String + Send + Sync>;

/// Computes a string from an exchange
#[derive(Clone)]
pub enum Expression {
    Constant(String),
    Body,
    Header(String),
    Function(ExpressionFn),
}

impl Expression {
    pub fn evaluate(&self, exchange: &Exchange) -> String {
        match self {
            Expression::Constant(value) => value.clone(),
            Expression::Body => exchange.body.clone(),
            Expression::Header(name) => exchange.header(name).unwrap_or_default().to_string(),
            Expression::Function(f) => f(exchange),
        }
    }
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Expression::Body => f.write_str("Body"),
            Expression::Header(name) => f.debug_tuple("Header").field(name).finish(),
            Expression::Function(_) => f.write_str("Function(<fn>)"),
        }
    }
}

pub fn constant(value: impl Into<String>) -> Expression {
    Expression::Constant(value.into())
}

pub fn body() -> Expression {
    Expression::Body
}

pub fn header(name: impl Into<String>) -> Expression {
    Expression::Header(name.into())
}

pub fn function<F>(f: F) -> Expression
where
    F: Fn(&Exchange) -> String + Send + Sync + 'static,
{
    Expression::Function(Arc::new(f))
}

/// One step of a route
#[derive(Debug, Clone)]
pub enum Step {
    /// Replace the message body
    SetBody(Expression),
    SetHeader(String, Expression),
    /// Log a message; `${body}` is replaced by the current body
    Log(String),
    /// Send to an endpoint and continue with its reply
    To(String),
}

/// A single route: one input endpoint followed by processing steps
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    id: Option<String>,
    from: String,
    steps: Vec<Step>,
}

impl RouteDefinition {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            id: None,
            from: from.into(),
            steps: Vec::new(),
        }
    }

    pub fn route_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.id = Some(id.into());
        self
    }

    /// Replace the body with the value of `expression`
    pub fn transform(&mut self, expression: Expression) -> &mut Self {
        self.steps.push(Step::SetBody(expression));
        self
    }

    pub fn set_body(&mut self, expression: Expression) -> &mut Self {
        self.transform(expression)
    }

    pub fn set_header(&mut self, name: impl Into<String>, expression: Expression) -> &mut Self {
        self.steps.push(Step::SetHeader(name.into(), expression));
        self
    }

    pub fn log(&mut self, message: impl Into<String>) -> &mut Self {
        self.steps.push(Step::Log(message.into()));
        self
    }

    pub fn to(&mut self, uri: impl Into<String>) -> &mut Self {
        self.steps.push(Step::To(uri.into()));
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn from_uri(&self) -> &str {
        &self.from
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub(crate) fn set_from_uri(&mut self, uri: String) {
        self.from = uri;
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }
}

/// Routes collected from route builders, in declaration order
#[derive(Debug, Clone, Default)]
pub struct RouteDefinitions {
    routes: Vec<RouteDefinition>,
}

impl RouteDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new route consuming from `uri`
    pub fn from(&mut self, uri: impl Into<String>) -> &mut RouteDefinition {
        self.routes.push(RouteDefinition::new(uri));
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.iter()
    }

    pub fn into_vec(self) -> Vec<RouteDefinition> {
        self.routes
    }
}

impl IntoIterator for RouteDefinitions {
    type Item = RouteDefinition;
    type IntoIter = std::vec::IntoIter<RouteDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}

/// User type describing routes. Injection happens before `configure` runs.
pub trait RouteBuilder: Injectable {
    fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError>;
}
