//! The bootstrapper: loads properties, wires user objects into a
//! [`RoutingContext`], installs their routes, configures components and
//! starts the context.

use crate::bootstrap::configuration::{Factory, Managed, ManagedConfiguration, ManagedRouteBuilder};
use crate::bootstrap::Configuration;
use crate::config::{MainConfig, MainConfigTrait, PropertySource};
use crate::container::{AutoConfigReport, AutoConfigurator, BeanRegistry, Injector};
use crate::errors::MainError;
use crate::foundation::{LifecycleTracker, MainState};
use crate::routing::{Component, ProducerTemplate, RouteBuilder, RouteDefinitions, RoutingContext};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics for the last `start()` call
#[derive(Debug, Clone, Default)]
pub struct BootstrapStats {
    pub property_count: usize,
    pub injection_count: usize,
    pub route_builder_count: usize,
    pub route_count: usize,
    pub total_time: Duration,
}

/// Bootstraps and runs a routing context
///
/// ```rust,no_run
/// use elif_main::{Main, Injectable, InjectionPoints, RouteBuilder, RouteDefinitions, MainError};
/// use elif_main::routing::constant;
///
/// #[derive(Default)]
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl Injectable for Greeter {
///     fn injection_points(points: &mut InjectionPoints<Self>) {
///         points.property_or("greeting", "Hello", |g: &mut Greeter, v: String| g.greeting = v);
///     }
/// }
///
/// impl RouteBuilder for Greeter {
///     fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
///         routes.from("direct:start").transform(constant(self.greeting.as_str())).to("mock:out");
///         Ok(())
///     }
/// }
///
/// # async fn demo() -> Result<(), MainError> {
/// let mut main = Main::new();
/// main.add_route_builder_type::<Greeter>();
/// main.run().await
/// # }
/// ```
pub struct Main {
    config: MainConfig,
    context: Arc<RoutingContext>,
    beans: BeanRegistry,
    properties: Option<Arc<PropertySource>>,
    extra_locations: Vec<String>,
    configuration: Option<Factory<dyn ManagedConfiguration>>,
    route_builders: Vec<Factory<dyn ManagedRouteBuilder>>,
    lifecycle: LifecycleTracker,
    auto_config_report: Option<AutoConfigReport>,
    stats: BootstrapStats,
}

impl std::fmt::Debug for Main {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Main")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("state", &self.state())
            .field("route_builders", &self.route_builders.len())
            .finish()
    }
}

impl Main {
    /// Create a bootstrapper with default settings
    pub fn new() -> Self {
        Self::with_config(MainConfig::default())
    }

    pub fn with_config(config: MainConfig) -> Self {
        Self {
            config,
            context: Arc::new(RoutingContext::new()),
            beans: BeanRegistry::new(),
            properties: None,
            extra_locations: Vec::new(),
            configuration: None,
            route_builders: Vec::new(),
            lifecycle: LifecycleTracker::new(),
            auto_config_report: None,
            stats: BootstrapStats::default(),
        }
    }

    /// Create a bootstrapper configured from `ELIF_MAIN_*` environment variables
    pub fn from_env() -> Result<Self, MainError> {
        Ok(Self::with_config(MainConfig::from_env()?))
    }

    pub fn config(&self) -> &MainConfig {
        &self.config
    }

    /// Use `configuration` as the configuration object, replacing any earlier one
    pub fn with_configuration<T: Configuration>(&mut self, configuration: T) -> &mut Self {
        self.set_configuration(Box::new(move || {
            Ok(Box::new(Managed(configuration)) as Box<dyn ManagedConfiguration>)
        }))
    }

    /// Instantiate `T` with `Default::default()` during `start()`
    pub fn with_configuration_type<T: Configuration + Default>(&mut self) -> &mut Self {
        self.set_configuration(Box::new(|| {
            Ok(Box::new(Managed(T::default())) as Box<dyn ManagedConfiguration>)
        }))
    }

    /// Instantiate the configuration object with `factory` during `start()`.
    /// A factory error aborts the start with `Instantiation`.
    pub fn with_configuration_factory<T, F, E>(&mut self, factory: F) -> &mut Self
    where
        T: Configuration,
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Display,
    {
        self.set_configuration(Box::new(move || {
            let configuration = factory().map_err(instantiation_error::<T, E>)?;
            Ok(Box::new(Managed(configuration)) as Box<dyn ManagedConfiguration>)
        }))
    }

    fn set_configuration(&mut self, factory: Factory<dyn ManagedConfiguration>) -> &mut Self {
        if self.configuration.replace(factory).is_some() {
            tracing::debug!("Replacing previously registered configuration object");
        }
        self
    }

    /// Add a route builder instance. Builders run in registration order.
    pub fn add_route_builder<T: RouteBuilder>(&mut self, builder: T) -> &mut Self {
        self.route_builders.push(Box::new(move || {
            Ok(Box::new(Managed(builder)) as Box<dyn ManagedRouteBuilder>)
        }));
        self
    }

    pub fn add_route_builder_type<T: RouteBuilder + Default>(&mut self) -> &mut Self {
        self.route_builders.push(Box::new(|| {
            Ok(Box::new(Managed(T::default())) as Box<dyn ManagedRouteBuilder>)
        }));
        self
    }

    pub fn add_route_builder_factory<T, F, E>(&mut self, factory: F) -> &mut Self
    where
        T: RouteBuilder,
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Display,
    {
        self.route_builders.push(Box::new(move || {
            let builder = factory().map_err(instantiation_error::<T, E>)?;
            Ok(Box::new(Managed(builder)) as Box<dyn ManagedRouteBuilder>)
        }));
        self
    }

    /// Use an already loaded property source; configured locations are not read
    pub fn with_properties(&mut self, properties: PropertySource) -> &mut Self {
        self.properties = Some(Arc::new(properties));
        self
    }

    /// Load `location` after the configured locations
    pub fn add_property_location(&mut self, location: impl Into<String>) -> &mut Self {
        self.extra_locations.push(location.into());
        self
    }

    /// Register a bean for injection
    pub fn bind<T: Send + Sync + 'static>(&mut self, bean: Arc<T>) -> &mut Self {
        self.beans.register(bean);
        self
    }

    pub fn bind_named<T: Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
        bean: Arc<T>,
    ) -> &mut Self {
        self.beans.register_named(name, bean);
        self
    }

    /// Register a component with the context
    pub fn add_component(&mut self, component: Arc<dyn Component>) -> &mut Self {
        self.context.add_component(component);
        self
    }

    pub fn context(&self) -> Arc<RoutingContext> {
        Arc::clone(&self.context)
    }

    /// A producer bound to the context
    pub fn template(&self) -> ProducerTemplate {
        ProducerTemplate::new(self.context())
    }

    pub fn state(&self) -> MainState {
        self.lifecycle.current()
    }

    /// Every state entered so far, starting with `Created`
    pub fn transitions(&self) -> &[MainState] {
        self.lifecycle.history()
    }

    /// What auto-configuration applied, once it has run
    pub fn auto_config_report(&self) -> Option<&AutoConfigReport> {
        self.auto_config_report.as_ref()
    }

    pub fn stats(&self) -> &BootstrapStats {
        &self.stats
    }

    /// Bootstrap and start the context
    ///
    /// Calling `start()` on a started bootstrapper does nothing. A stopped or
    /// failed bootstrapper cannot be restarted.
    pub async fn start(&mut self) -> Result<(), MainError> {
        match self.state() {
            MainState::Started => return Ok(()),
            state if state.is_terminal() => {
                return Err(MainError::illegal_state(format!(
                    "cannot start from state {}, create a new Main",
                    state
                )))
            }
            _ => {}
        }

        let start_time = Instant::now();
        tracing::info!("Starting bootstrap of routing context '{}'", self.context.name());

        if let Err(e) = self.bootstrap().await {
            tracing::error!("Bootstrap aborted in state {}: {}", self.state(), e);
            self.lifecycle.advance(MainState::Failed);
            return Err(e);
        }

        self.stats.total_time = start_time.elapsed();
        tracing::info!(
            "Bootstrap completed in {:?} with {} route(s)",
            self.stats.total_time,
            self.stats.route_count
        );
        Ok(())
    }

    async fn bootstrap(&mut self) -> Result<(), MainError> {
        let properties = self.load_properties()?;
        self.context.set_properties(Arc::clone(&properties));
        self.beans.register(Arc::clone(&self.context));
        self.stats.property_count = properties.len();

        {
            let injector = Injector::new(&properties, &self.beans);

            if let Some(factory) = self.configuration.take() {
                let mut configuration = factory()?;
                let report = configuration.inject(&injector)?;
                tracing::debug!(
                    "Injected {} value(s) into {}",
                    report.total(),
                    configuration.type_name()
                );
                self.stats.injection_count += report.total();
                configuration.configure()?;
            }
            self.lifecycle.advance(MainState::Configured);

            let factories = std::mem::take(&mut self.route_builders);
            self.stats.route_builder_count = factories.len();

            let mut builders = Vec::with_capacity(factories.len());
            for factory in factories {
                builders.push(factory()?);
            }
            for builder in &mut builders {
                let report = builder.inject(&injector)?;
                tracing::debug!(
                    "Injected {} value(s) into {}",
                    report.total(),
                    builder.type_name()
                );
                self.stats.injection_count += report.total();
            }

            let mut routes = RouteDefinitions::new();
            for builder in &builders {
                builder.configure(&mut routes)?;
            }
            self.stats.route_count = routes.len();
            self.context.add_routes(routes)?;
            self.lifecycle.advance(MainState::RoutesAdded);
        }

        let report = AutoConfigurator::new(self.config.auto_configuration_fail_fast)
            .configure(&self.context, &properties)?;
        self.auto_config_report = Some(report);
        self.lifecycle.advance(MainState::AutoConfigured);

        self.context.start().await?;
        self.lifecycle.advance(MainState::Started);
        Ok(())
    }

    fn load_properties(&mut self) -> Result<Arc<PropertySource>, MainError> {
        if let Some(properties) = &self.properties {
            return Ok(Arc::clone(properties));
        }

        self.config.validate()?;
        let locations = self
            .config
            .property_locations
            .iter()
            .chain(self.extra_locations.iter());
        let properties = Arc::new(PropertySource::load_all(locations)?);
        tracing::info!("Loaded {} propert(ies)", properties.len());

        self.properties = Some(Arc::clone(&properties));
        Ok(properties)
    }

    /// Stop the context, waiting up to the shutdown timeout for pending
    /// exchanges. Does nothing unless the bootstrapper is started.
    pub async fn stop(&mut self) -> Result<(), MainError> {
        if self.state() != MainState::Started {
            tracing::debug!("Ignoring stop() in state {}", self.state());
            return Ok(());
        }

        self.context.stop(self.config.shutdown_timeout).await;
        self.lifecycle.advance(MainState::Stopped);
        Ok(())
    }

    /// Start, wait for Ctrl+C, then stop
    pub async fn run(&mut self) -> Result<(), MainError> {
        self.start().await?;
        tracing::info!("Routing context running, press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown signal received");
        self.stop().await
    }
}

impl Default for Main {
    fn default() -> Self {
        Self::new()
    }
}

fn instantiation_error<T, E: Display>(error: E) -> MainError {
    MainError::instantiation(std::any::type_name::<T>(), error.to_string())
}
