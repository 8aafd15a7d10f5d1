pub mod bootstrap;
pub mod config;
pub mod container;
pub mod errors;
pub mod foundation;
pub mod routing;

// Re-export key types for convenience
pub use bootstrap::{BootstrapStats, Configuration, Main};
pub use config::{ConfigError, ConfigSource, MainConfig, MainConfigTrait, PropertyOrigin, PropertySource};
pub use container::{
    AutoConfigReport, AutoConfigurator, BeanRegistry, FromProperty, Injectable, InjectionPoints,
    InjectionReport, Injector,
};
pub use errors::MainError;
pub use foundation::MainState;
pub use routing::{
    Component, Endpoint, Exchange, ProducerTemplate, RouteBuilder, RouteDefinitions,
    RoutingContext,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework information
pub const FRAMEWORK_NAME: &str = "elif.rs";

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}

/// Get framework name
pub fn name() -> &'static str {
    FRAMEWORK_NAME
}
