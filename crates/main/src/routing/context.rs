//! The routing context: components, endpoints, global options and routes.

use crate::config::PropertySource;
use crate::errors::MainError;
use crate::foundation::RunningFlag;
use crate::routing::components::{DirectComponent, MockComponent, SedaComponent};
use crate::routing::{
    Component, Endpoint, EndpointUri, InflightRepository, Processor, Route, RouteDefinition,
    RouteDefinitions, RouteStep, Step,
};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const QUIESCE_POLL: Duration = Duration::from_millis(10);

/// Container for components, endpoints, global options and installed routes
pub struct RoutingContext {
    name: String,
    components: RwLock<BTreeMap<String, Arc<dyn Component>>>,
    endpoints: RwLock<HashMap<String, Arc<dyn Endpoint>>>,
    global_options: RwLock<BTreeMap<String, String>>,
    definitions: RwLock<Vec<RouteDefinition>>,
    routes: RwLock<Vec<Arc<Route>>>,
    properties: RwLock<Arc<PropertySource>>,
    inflight: Arc<InflightRepository>,
    // lets installed routes process; opened before consumers start
    routes_active: RunningFlag,
    running: RunningFlag,
}

impl std::fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingContext")
            .field("name", &self.name)
            .field("components", &self.component_names())
            .field("routes", &self.route_count())
            .field("running", &self.is_running())
            .finish()
    }
}

impl RoutingContext {
    /// Create a context with the `direct`, `seda` and `mock` components registered
    pub fn new() -> Self {
        Self::with_name("elif-main")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        let context = Self {
            name: name.into(),
            components: RwLock::new(BTreeMap::new()),
            endpoints: RwLock::new(HashMap::new()),
            global_options: RwLock::new(BTreeMap::new()),
            definitions: RwLock::new(Vec::new()),
            routes: RwLock::new(Vec::new()),
            properties: RwLock::new(Arc::new(PropertySource::new())),
            inflight: Arc::new(InflightRepository::new()),
            routes_active: RunningFlag::new(),
            running: RunningFlag::new(),
        };
        context.add_component(Arc::new(DirectComponent::new()));
        context.add_component(Arc::new(SedaComponent::new()));
        context.add_component(Arc::new(MockComponent::new()));
        context
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// Register a component under its own name, replacing any previous one
    pub fn add_component(&self, component: Arc<dyn Component>) {
        let name = component.name().to_string();
        if self.components.write().insert(name.clone(), component).is_some() {
            tracing::debug!("Replaced component '{}'", name);
        }
    }

    pub fn component(&self, name: &str) -> Result<Arc<dyn Component>, MainError> {
        self.components
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MainError::illegal_state(format!("no component named '{}'", name)))
    }

    /// Look up a component and downcast it to its concrete type
    pub fn component_as<C: Component>(&self, name: &str) -> Result<Arc<C>, MainError> {
        self.component(name)?.as_any_arc().downcast::<C>().map_err(|_| {
            MainError::illegal_state(format!(
                "component '{}' is not a {}",
                name,
                std::any::type_name::<C>()
            ))
        })
    }

    /// Registered component names in sorted order
    pub fn component_names(&self) -> Vec<String> {
        self.components.read().keys().cloned().collect()
    }

    /// Resolve an endpoint, creating and caching it on first use
    pub fn endpoint(&self, uri: &str) -> Result<Arc<dyn Endpoint>, MainError> {
        let resolved = self.properties.read().resolve_placeholders(uri)?;
        let parsed = EndpointUri::parse(&resolved)?;
        let key = parsed.to_string();

        if let Some(endpoint) = self.endpoints.read().get(&key) {
            return Ok(Arc::clone(endpoint));
        }

        let component = self.component(parsed.scheme()).map_err(|_| {
            MainError::route_install(
                uri,
                format!("no component found with scheme '{}'", parsed.scheme()),
            )
        })?;

        let mut endpoints = self.endpoints.write();
        // another caller may have created it between the read and the write lock
        if let Some(endpoint) = endpoints.get(&key) {
            return Ok(Arc::clone(endpoint));
        }
        let endpoint = component.create_endpoint(&parsed)?;
        endpoints.insert(key, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Resolve an endpoint and downcast it to its concrete type
    pub fn endpoint_as<E: Endpoint>(&self, uri: &str) -> Result<Arc<E>, MainError> {
        self.endpoint(uri)?.as_any_arc().downcast::<E>().map_err(|_| {
            MainError::illegal_state(format!(
                "endpoint '{}' is not a {}",
                uri,
                std::any::type_name::<E>()
            ))
        })
    }

    /// Mutable access to the global options
    pub fn global_options(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.global_options.write()
    }

    pub fn global_option(&self, key: &str) -> Option<String> {
        self.global_options.read().get(key).cloned()
    }

    /// Properties used to resolve `{{placeholders}}` in endpoint URIs
    pub fn set_properties(&self, properties: Arc<PropertySource>) {
        *self.properties.write() = properties;
    }

    pub fn properties(&self) -> Arc<PropertySource> {
        self.properties.read().clone()
    }

    /// Validate and register route definitions. Nothing is registered if any
    /// definition is invalid. Routes start consuming when the context starts.
    pub fn add_routes(&self, routes: RouteDefinitions) -> Result<(), MainError> {
        let properties = self.properties();
        let components = self.component_names();
        let mut definitions = self.definitions.write();

        let mut ids: HashSet<String> = definitions
            .iter()
            .filter_map(|d| d.id().map(str::to_string))
            .collect();
        let mut inputs: HashSet<String> = definitions
            .iter()
            .map(|d| d.from_uri().to_string())
            .collect();
        let mut accepted = Vec::new();

        for mut definition in routes {
            let id = match definition.id() {
                Some(id) => id.to_string(),
                None => format!("route{}", definitions.len() + accepted.len() + 1),
            };
            if !ids.insert(id.clone()) {
                return Err(MainError::route_install(&id, "duplicate route id"));
            }

            let from = normalize_uri(&id, definition.from_uri(), &properties, &components)?;
            if !inputs.insert(from.clone()) {
                return Err(MainError::route_install(
                    &id,
                    format!("another route already consumes from '{}'", from),
                ));
            }
            definition.set_from_uri(from);

            for step in definition.steps_mut() {
                if let Step::To(uri) = step {
                    *uri = normalize_uri(&id, uri, &properties, &components)?;
                }
            }

            definition.set_id(id);
            accepted.push(definition);
        }

        for definition in &accepted {
            tracing::debug!(
                "Registered route '{}' from '{}'",
                definition.id().unwrap_or_default(),
                definition.from_uri()
            );
        }
        definitions.extend(accepted);
        Ok(())
    }

    pub fn route_ids(&self) -> Vec<String> {
        self.definitions
            .read()
            .iter()
            .filter_map(|d| d.id().map(str::to_string))
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.definitions.read().len()
    }

    /// Exchanges currently being processed by routes
    pub fn inflight_count(&self) -> usize {
        self.inflight.size()
    }

    /// Resolve endpoints, bind routes to their inputs and start consumers
    pub async fn start(&self) -> Result<(), MainError> {
        if self.is_running() {
            return Ok(());
        }

        if let Err(e) = self.install_routes() {
            self.release();
            return Err(e);
        }
        self.routes_active.set_running(true);

        let endpoints: Vec<_> = self.endpoints.read().values().cloned().collect();
        for endpoint in endpoints {
            if let Err(e) = endpoint.start().await {
                self.release();
                return Err(e);
            }
        }

        self.running.set_running(true);
        tracing::info!(
            "Routing context '{}' started with {} route(s)",
            self.name,
            self.route_count()
        );
        Ok(())
    }

    fn install_routes(&self) -> Result<(), MainError> {
        let definitions = self.definitions.read().clone();
        let mut installed = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let id = definition.id().unwrap_or_default().to_string();
            let from = self.endpoint(definition.from_uri())?;

            let mut steps = Vec::with_capacity(definition.steps().len());
            for step in definition.steps() {
                steps.push(match step {
                    Step::SetBody(expression) => RouteStep::SetBody(expression.clone()),
                    Step::SetHeader(name, expression) => {
                        RouteStep::SetHeader(name.clone(), expression.clone())
                    }
                    Step::Log(message) => RouteStep::Log(message.clone()),
                    Step::To(uri) => RouteStep::To(self.endpoint(uri)?),
                });
            }

            let route = Arc::new(Route::new(
                id.clone(),
                definition.from_uri().to_string(),
                steps,
                Arc::clone(&self.inflight),
                self.routes_active.clone(),
            ));
            from.bind_consumer(Arc::clone(&route) as Arc<dyn Processor>)
                .map_err(|e| MainError::route_install(&id, e.to_string()))?;
            installed.push(route);
        }

        *self.routes.write() = installed;
        Ok(())
    }

    /// Stop accepting sends, wait up to `timeout` for every queue to empty
    /// and every exchange to finish, then release endpoints and routes.
    /// Does nothing if the context is not running.
    pub async fn stop(&self, timeout: Duration) {
        if !self.is_running() {
            return;
        }
        self.running.set_running(false);
        tracing::info!("Stopping routing context '{}'", self.name);

        let deadline = tokio::time::Instant::now() + timeout;
        let endpoints: Vec<_> = self.endpoints.read().values().cloned().collect();

        // A route may still forward into a queue that was already empty, so
        // keep checking until queues and in-flight work are quiet together.
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if endpoints.iter().all(|e| e.is_idle())
                && self.inflight.wait_drained(remaining).await
                && endpoints.iter().all(|e| e.is_idle())
            {
                break;
            }
            if remaining.is_zero() {
                tracing::warn!(
                    "Routing context '{}' did not quiesce within {}ms ({} exchange(s) in flight)",
                    self.name,
                    timeout.as_millis(),
                    self.inflight.size()
                );
                break;
            }
            tokio::time::sleep(QUIESCE_POLL.min(remaining)).await;
        }

        for endpoint in &endpoints {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            endpoint.drain(remaining).await;
        }

        self.release();
        tracing::info!("Routing context '{}' stopped", self.name);
    }

    fn release(&self) {
        let endpoints: Vec<_> = self.endpoints.write().drain().map(|(_, e)| e).collect();
        for endpoint in endpoints {
            endpoint.stop();
        }
        self.routes.write().clear();
        self.routes_active.set_running(false);
        self.running.set_running(false);
    }
}

impl Default for RoutingContext {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_uri(
    route: &str,
    uri: &str,
    properties: &PropertySource,
    components: &[String],
) -> Result<String, MainError> {
    let resolved = properties
        .resolve_placeholders(uri)
        .map_err(|e| MainError::route_install(route, e.to_string()))?;
    let parsed = EndpointUri::parse(&resolved)
        .map_err(|e| MainError::route_install(route, e.to_string()))?;
    if !components.iter().any(|name| name == parsed.scheme()) {
        return Err(MainError::route_install(
            route,
            format!("no component found with scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::components::MockEndpoint;
    use crate::routing::{constant, Exchange};

    fn greeting_routes() -> RouteDefinitions {
        let mut routes = RouteDefinitions::new();
        routes
            .from("direct:start")
            .transform(constant("World"))
            .to("mock:results");
        routes
    }

    #[test]
    fn test_default_components() {
        let context = RoutingContext::new();
        assert_eq!(context.component_names(), vec!["direct", "mock", "seda"]);
        assert!(context.component_as::<SedaComponent>("seda").is_ok());
        assert!(context.component_as::<SedaComponent>("direct").is_err());
        assert!(context.component("jms").is_err());
    }

    #[test]
    fn test_global_options() {
        let context = RoutingContext::new();
        context
            .global_options()
            .insert("foo".to_string(), "123".to_string());

        assert_eq!(context.global_option("foo").as_deref(), Some("123"));
        assert_eq!(context.global_option("bar"), None);
    }

    #[test]
    fn test_endpoints_are_cached_by_normalized_uri() {
        let context = RoutingContext::new();
        let a = context.endpoint("direct:start").unwrap();
        let b = context.endpoint("direct://start").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(context.endpoint("jms:queue").err().expect("expected error").is_route_install());
    }

    #[test]
    fn test_endpoint_placeholders() {
        let context = RoutingContext::new();
        context.set_properties(Arc::new(PropertySource::from_pairs([("sink", "results")])));

        let endpoint = context.endpoint("mock:{{sink}}").unwrap();
        assert_eq!(endpoint.uri(), "mock:results");
    }

    #[test]
    fn test_add_routes_validation_is_all_or_nothing() {
        let context = RoutingContext::new();
        let mut routes = greeting_routes();
        routes.from("direct:start").to("mock:other");

        let err = context.add_routes(routes).unwrap_err();
        assert!(err.is_route_install());
        assert_eq!(context.route_count(), 0);

        let mut routes = RouteDefinitions::new();
        routes.from("direct:a").to("ftp:somewhere");
        assert!(context.add_routes(routes).unwrap_err().is_route_install());

        context.add_routes(greeting_routes()).unwrap();
        assert_eq!(context.route_ids(), vec!["route1"]);
    }

    #[test]
    fn test_duplicate_route_ids_rejected() {
        let context = RoutingContext::new();
        let mut routes = RouteDefinitions::new();
        routes.from("direct:a").route_id("same").to("mock:a");
        routes.from("direct:b").route_id("same").to("mock:b");

        assert!(context.add_routes(routes).unwrap_err().is_route_install());
    }

    #[tokio::test]
    async fn test_start_send_stop() {
        let context = RoutingContext::new();
        context.add_routes(greeting_routes()).unwrap();
        context.start().await.unwrap();
        assert!(context.is_running());

        let mock = context.endpoint_as::<MockEndpoint>("mock:results").unwrap();
        mock.expected_bodies_received(["World"]);

        context
            .endpoint("direct:start")
            .unwrap()
            .send(Exchange::new("<message>1</message>"))
            .await
            .unwrap();
        mock.assert_is_satisfied().await.unwrap();

        context.stop(Duration::from_secs(1)).await;
        assert!(!context.is_running());
        assert_eq!(context.inflight_count(), 0);
    }

    #[tokio::test]
    async fn test_consuming_from_mock_fails_start() {
        let context = RoutingContext::new();
        let mut routes = RouteDefinitions::new();
        routes.from("mock:input").to("mock:output");
        context.add_routes(routes).unwrap();

        let err = context.start().await.unwrap_err();
        assert!(err.is_route_install());
        assert!(!context.is_running());
    }

    #[tokio::test]
    async fn test_seda_route_drains_on_stop() {
        let context = RoutingContext::new();
        let mut routes = RouteDefinitions::new();
        routes.from("seda:work").to("mock:done");
        context.add_routes(routes).unwrap();
        context.start().await.unwrap();

        let mock = context.endpoint_as::<MockEndpoint>("mock:done").unwrap();
        let seda = context.endpoint("seda:work").unwrap();
        for i in 0..20 {
            seda.send(Exchange::new(i.to_string())).await.unwrap();
        }

        context.stop(Duration::from_secs(5)).await;
        assert_eq!(mock.received_counter(), 20);
    }

    #[tokio::test]
    async fn test_stop_drains_chained_queues_registered_downstream_first() {
        let context = RoutingContext::new();
        let mut routes = RouteDefinitions::new();
        routes.from("seda:b").route_id("downstream").to("mock:done");
        routes.from("seda:a").route_id("upstream").to("seda:b");
        context.add_routes(routes).unwrap();
        context.start().await.unwrap();

        let mock = context.endpoint_as::<MockEndpoint>("mock:done").unwrap();
        let seda = context.endpoint("seda:a").unwrap();
        for i in 0..20 {
            seda.send(Exchange::new(i.to_string())).await.unwrap();
        }

        context.stop(Duration::from_secs(5)).await;
        assert_eq!(mock.received_counter(), 20);
        assert_eq!(context.inflight_count(), 0);
    }

    #[tokio::test]
    async fn test_seda_send_before_start_is_rejected() {
        let context = RoutingContext::new();
        let mut routes = RouteDefinitions::new();
        routes.from("seda:work").to("mock:done");
        context.add_routes(routes).unwrap();

        let seda = context.endpoint("seda:work").unwrap();
        assert!(seda.send(Exchange::new("early")).await.unwrap_err().is_delivery());

        context.start().await.unwrap();
        let mock = context.endpoint_as::<MockEndpoint>("mock:done").unwrap();
        mock.expected_bodies_received(["on time"]);
        seda.send(Exchange::new("on time")).await.unwrap();
        mock.assert_is_satisfied().await.unwrap();
        context.stop(Duration::from_secs(1)).await;
    }
}
