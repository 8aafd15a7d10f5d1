pub mod component;
pub mod components;
pub mod context;
pub mod definition;
pub mod exchange;
pub mod inflight;
pub mod route;
pub mod template;
pub mod uri;

pub use component::{Component, Endpoint, Processor};
pub use components::{
    DirectComponent, DirectEndpoint, MockComponent, MockEndpoint, SedaComponent, SedaEndpoint,
};
pub use context::RoutingContext;
pub use definition::{
    body, constant, function, header, Expression, RouteBuilder, RouteDefinition,
    RouteDefinitions, Step,
};
pub use exchange::Exchange;
pub use inflight::{InflightGuard, InflightRepository};
pub use route::{Route, RouteStep};
pub use template::ProducerTemplate;
pub use uri::EndpointUri;
