//! Integration tests for the bootstrapper
//!
//! Tests the complete flow from property files through injection, route
//! installation and component auto-configuration to message delivery.

use elif_main::routing::{
    body, constant, function, DirectComponent, MockComponent, MockEndpoint, SedaComponent,
    SedaEndpoint,
};
use elif_main::{
    BeanRegistry, Configuration, Exchange, Injectable, InjectionPoints, Injector, Main,
    MainConfig, MainError, MainState, PropertySource, RouteBuilder, RouteDefinitions,
    RoutingContext,
};
use serial_test::serial;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Configuration object that sets a global option on the context
#[derive(Default)]
struct MyConfiguration {
    context: Option<Arc<RoutingContext>>,
}

impl Injectable for MyConfiguration {
    fn injection_points(points: &mut InjectionPoints<Self>) {
        points.bean(|c: &mut MyConfiguration, context: Arc<RoutingContext>| {
            c.context = Some(context)
        });
    }
}

impl Configuration for MyConfiguration {
    fn configure(&mut self) -> Result<(), MainError> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| MainError::illegal_state("context was not injected"))?;
        context
            .global_options()
            .insert("foo".to_string(), "123".to_string());
        Ok(())
    }
}

/// Route builder whose reply comes from the `hello` property
#[derive(Default)]
struct MyRouteBuilder {
    hello: String,
}

impl Injectable for MyRouteBuilder {
    fn injection_points(points: &mut InjectionPoints<Self>) {
        points.property("hello", |b: &mut MyRouteBuilder, v: String| b.hello = v);
    }
}

impl RouteBuilder for MyRouteBuilder {
    fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
        routes
            .from("direct:start")
            .transform(constant(self.hello.as_str()))
            .to("mock:results");
        Ok(())
    }
}

/// Shared service resolved through bean injection
struct Greeter {
    salutation: String,
}

#[derive(Default)]
struct GreetingRoutes {
    greeter: Option<Arc<Greeter>>,
}

impl Injectable for GreetingRoutes {
    fn injection_points(points: &mut InjectionPoints<Self>) {
        points.bean(|b: &mut GreetingRoutes, greeter: Arc<Greeter>| b.greeter = Some(greeter));
    }
}

impl RouteBuilder for GreetingRoutes {
    fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
        let salutation = self
            .greeter
            .as_ref()
            .map(|g| g.salutation.clone())
            .unwrap_or_default();
        routes
            .from("direct:greet")
            .route_id("greet")
            .transform(function(move |ex: &Exchange| format!("{} {}", salutation, ex.body)))
            .to("mock:greetings");
        Ok(())
    }
}

fn properties_file(contents: &str) -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("application.properties");
    std::fs::write(&path, contents).unwrap();
    let location = path.to_string_lossy().into_owned();
    (dir, location)
}

fn main_with(pairs: &[(&str, &str)]) -> Main {
    let mut main = Main::new();
    main.with_properties(PropertySource::from_pairs(pairs.iter().copied()));
    main
}

#[tokio::test]
async fn test_scenario_from_properties_file() {
    let (_dir, location) = properties_file(
        "# routing setup\n\
         hello = World\n\
         component.seda.queueSize=500\n\
         component.seda.concurrentConsumers=2\n\
         component.direct.timeout: 1234\n",
    );

    let mut main = Main::with_config(MainConfig::default().with_property_locations([location]));
    main.with_configuration_type::<MyConfiguration>()
        .add_route_builder_type::<MyRouteBuilder>();
    main.start().await.unwrap();

    let context = main.context();
    assert!(context.is_running());

    let mock = context.endpoint_as::<MockEndpoint>("mock:results").unwrap();
    mock.expected_bodies_received(["World"]);
    main.template()
        .send_body("direct:start", "<message>1</message>")
        .await
        .unwrap();
    mock.assert_is_satisfied().await.unwrap();

    let seda = context.component_as::<SedaComponent>("seda").unwrap();
    assert_eq!(seda.queue_size(), 500);
    assert_eq!(seda.concurrent_consumers(), 2);

    let direct = context.component_as::<DirectComponent>("direct").unwrap();
    assert_eq!(direct.timeout(), 1234);
    assert!(direct.block());

    assert_eq!(context.global_option("foo").as_deref(), Some("123"));

    main.stop().await.unwrap();
    assert!(!context.is_running());
}

#[tokio::test]
async fn test_start_stop_visits_every_state_once() {
    let mut main = main_with(&[("hello", "World")]);
    main.with_configuration(MyConfiguration::default())
        .add_route_builder(MyRouteBuilder::default());

    main.start().await.unwrap();
    main.stop().await.unwrap();

    assert_eq!(
        main.transitions(),
        &[
            MainState::Created,
            MainState::Configured,
            MainState::RoutesAdded,
            MainState::AutoConfigured,
            MainState::Started,
            MainState::Stopped,
        ]
    );
    assert!(!main.context().is_running());
}

#[tokio::test]
async fn test_missing_property_fails_before_routes_are_installed() {
    let mut main = main_with(&[]);
    main.add_route_builder_type::<MyRouteBuilder>();

    let err = main.start().await.unwrap_err();
    assert!(err.is_missing_property());
    assert!(err.to_string().contains("hello"));

    assert_eq!(main.state(), MainState::Failed);
    assert!(!main.context().is_running());
    assert_eq!(main.context().route_count(), 0);
    assert!(main.auto_config_report().is_none());
}

#[tokio::test]
async fn test_unresolved_bean_fails_start() {
    let mut main = main_with(&[]);
    main.add_route_builder_type::<GreetingRoutes>();

    let err = main.start().await.unwrap_err();
    assert!(err.is_unresolved_bean());
    assert!(!main.context().is_running());
}

#[tokio::test]
async fn test_bound_bean_is_injected() {
    let mut main = main_with(&[]);
    main.bind(Arc::new(Greeter {
        salutation: "Hello".to_string(),
    }))
    .add_route_builder_type::<GreetingRoutes>();
    main.start().await.unwrap();

    let reply = main
        .template()
        .request_body("direct:greet", "Ana")
        .await
        .unwrap();
    assert_eq!(reply, "Hello Ana");
    assert_eq!(main.context().route_ids(), vec!["greet"]);

    main.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_injection_skips_every_route_builder() {
    let mut main = main_with(&[("hello", "World")]);
    main.add_route_builder_type::<MyRouteBuilder>()
        .add_route_builder_type::<GreetingRoutes>();

    let err = main.start().await.unwrap_err();
    assert!(err.is_unresolved_bean());
    assert_eq!(main.context().route_count(), 0);
}

#[tokio::test]
async fn test_component_attributes_keep_defaults() {
    let mut main = main_with(&[("component.mock.resultWaitTime", "250")]);
    main.start().await.unwrap();

    let context = main.context();
    let seda = context.component_as::<SedaComponent>("seda").unwrap();
    assert_eq!(seda.queue_size(), 1000);
    assert_eq!(seda.concurrent_consumers(), 1);

    let direct = context.component_as::<DirectComponent>("direct").unwrap();
    assert_eq!(direct.timeout(), 30_000);
    assert!(direct.block());

    let mock = context.component_as::<MockComponent>("mock").unwrap();
    assert_eq!(mock.result_wait_time(), 250);

    let report = main.auto_config_report().unwrap();
    assert_eq!(report.applied_count(), 1);
    assert_eq!(
        report.applied["mock"].get("resultWaitTime").map(String::as_str),
        Some("250")
    );

    main.stop().await.unwrap();
}

#[tokio::test]
async fn test_attribute_names_ignore_case_and_dashes() {
    let mut main = main_with(&[
        ("component.seda.queue-size", "42"),
        ("component.direct.BLOCK", "false"),
    ]);
    main.start().await.unwrap();

    let context = main.context();
    assert_eq!(
        context.component_as::<SedaComponent>("seda").unwrap().queue_size(),
        42
    );
    assert!(!context.component_as::<DirectComponent>("direct").unwrap().block());

    main.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_attribute_fails_fast_by_default() {
    let mut main = main_with(&[("component.seda.bogus", "1")]);

    let err = main.start().await.unwrap_err();
    assert!(err.is_unknown_attribute());
    assert_eq!(main.state(), MainState::Failed);
    assert!(!main.context().is_running());
}

#[tokio::test]
async fn test_unknown_attribute_skipped_when_lenient() {
    let mut main =
        Main::with_config(MainConfig::default().with_auto_configuration_fail_fast(false));
    main.with_properties(PropertySource::from_pairs([
        ("component.seda.bogus", "1"),
        ("component.seda.queueSize", "8"),
        ("component.jms.brokerUrl", "tcp://localhost"),
    ]));
    main.start().await.unwrap();

    let report = main.auto_config_report().unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].attribute, "bogus");
    assert_eq!(report.unknown_components, vec!["jms".to_string()]);
    assert_eq!(
        main.context()
            .component_as::<SedaComponent>("seda")
            .unwrap()
            .queue_size(),
        8
    );

    main.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_attribute_value_is_always_fatal() {
    let mut main =
        Main::with_config(MainConfig::default().with_auto_configuration_fail_fast(false));
    main.with_properties(PropertySource::from_pairs([("component.direct.timeout", "soon")]));

    let err = main.start().await.unwrap_err();
    assert!(err.is_type_coercion());
    assert!(!main.context().is_running());
}

#[tokio::test]
async fn test_route_builders_run_in_registration_order() {
    struct Inbound;
    impl Injectable for Inbound {}
    impl RouteBuilder for Inbound {
        fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
            routes.from("direct:in").to("seda:work");
            Ok(())
        }
    }

    struct Worker;
    impl Injectable for Worker {}
    impl RouteBuilder for Worker {
        fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
            routes
                .from("seda:work")
                .transform(function(|ex: &Exchange| ex.body.to_uppercase()))
                .to("mock:done");
            Ok(())
        }
    }

    let mut main = main_with(&[]);
    main.add_route_builder(Inbound).add_route_builder(Worker);
    main.start().await.unwrap();

    let context = main.context();
    assert_eq!(context.route_ids(), vec!["route1", "route2"]);

    let mock = context.endpoint_as::<MockEndpoint>("mock:done").unwrap();
    mock.expected_bodies_received(["PING"]);
    main.template().send_body("direct:in", "ping").await.unwrap();
    mock.assert_is_satisfied_within(Duration::from_secs(2))
        .await
        .unwrap();

    main.stop().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_inputs_install_nothing() {
    struct Twice;
    impl Injectable for Twice {}
    impl RouteBuilder for Twice {
        fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
            routes.from("direct:start").to("mock:a");
            routes.from("direct:start").to("mock:b");
            Ok(())
        }
    }

    let mut main = main_with(&[]);
    main.add_route_builder(Twice);

    let err = main.start().await.unwrap_err();
    assert!(err.is_route_install());
    assert_eq!(main.context().route_count(), 0);
    assert_eq!(main.state(), MainState::Failed);
}

#[tokio::test]
async fn test_unknown_scheme_is_rejected() {
    struct Jms;
    impl Injectable for Jms {}
    impl RouteBuilder for Jms {
        fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
            routes.from("jms:queue").to("mock:out");
            Ok(())
        }
    }

    let mut main = main_with(&[]);
    main.add_route_builder(Jms);

    let err = main.start().await.unwrap_err();
    assert!(err.is_route_install());
}

#[tokio::test]
async fn test_placeholders_in_properties_and_uris() {
    #[derive(Default)]
    struct Templated {
        greeting: String,
    }

    impl Injectable for Templated {
        fn injection_points(points: &mut InjectionPoints<Self>) {
            points.property("greeting", |b: &mut Templated, v: String| b.greeting = v);
        }
    }

    impl RouteBuilder for Templated {
        fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
            routes
                .from("direct:{{input}}")
                .transform(constant(self.greeting.as_str()))
                .to("mock:{{output:results}}");
            Ok(())
        }
    }

    let mut main = main_with(&[
        ("hello", "World"),
        ("greeting", "Hello {{hello}}"),
        ("input", "start"),
    ]);
    main.add_route_builder_type::<Templated>();
    main.start().await.unwrap();

    let reply = main
        .template()
        .request_body("direct:start", "ignored")
        .await
        .unwrap();
    assert_eq!(reply, "Hello World");

    let mock = main
        .context()
        .endpoint_as::<MockEndpoint>("mock:results")
        .unwrap();
    assert_eq!(mock.received_bodies(), vec!["Hello World"]);

    main.stop().await.unwrap();
}

#[tokio::test]
async fn test_configuration_factory_error_is_instantiation() {
    let mut main = main_with(&[]);
    main.with_configuration_factory(|| -> Result<MyConfiguration, String> {
        Err("license expired".to_string())
    });

    let err = main.start().await.unwrap_err();
    assert!(err.is_instantiation());
    assert!(err.to_string().contains("license expired"));
    assert_eq!(
        main.transitions(),
        &[MainState::Created, MainState::Failed]
    );
}

#[tokio::test]
async fn test_later_locations_override_earlier_ones() {
    let (_base_dir, base) = properties_file("hello=Base\ncomponent.seda.queueSize=10\n");

    let mut overrides = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    writeln!(overrides, "hello: Override").unwrap();
    writeln!(overrides, "component:").unwrap();
    writeln!(overrides, "  seda:").unwrap();
    writeln!(overrides, "    concurrentConsumers: 3").unwrap();
    let overrides_location = overrides.path().to_string_lossy().into_owned();

    let mut main = Main::with_config(MainConfig::default().with_property_locations([base]));
    main.add_property_location(overrides_location)
        .add_property_location("optional:/definitely/not/here.properties")
        .add_route_builder_type::<MyRouteBuilder>();
    main.start().await.unwrap();

    let reply = main
        .template()
        .request_body("direct:start", "x")
        .await
        .unwrap();
    assert_eq!(reply, "Override");

    let seda = main.context().component_as::<SedaComponent>("seda").unwrap();
    assert_eq!(seda.queue_size(), 10);
    assert_eq!(seda.concurrent_consumers(), 3);

    main.stop().await.unwrap();
}

#[tokio::test]
async fn test_required_location_must_exist() {
    let mut main = Main::with_config(
        MainConfig::default().with_property_locations(["/definitely/not/here.properties"]),
    );

    let err = main.start().await.unwrap_err();
    assert!(err.is_config_load());
    assert_eq!(main.state(), MainState::Failed);
}

#[tokio::test]
#[serial]
async fn test_main_from_env() {
    let (_dir, location) = properties_file("hello=Env\n");
    std::env::set_var("ELIF_MAIN_PROPERTIES", &location);
    std::env::set_var("ELIF_MAIN_SHUTDOWN_TIMEOUT_MS", "500");

    let result = Main::from_env();

    std::env::remove_var("ELIF_MAIN_PROPERTIES");
    std::env::remove_var("ELIF_MAIN_SHUTDOWN_TIMEOUT_MS");

    let mut main = result.unwrap();
    assert_eq!(main.config().shutdown_timeout, Duration::from_millis(500));
    main.add_route_builder_type::<MyRouteBuilder>();
    main.start().await.unwrap();

    let reply = main
        .template()
        .request_body("direct:start", "x")
        .await
        .unwrap();
    assert_eq!(reply, "Env");
    main.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_invalid_env_config_is_rejected() {
    std::env::set_var("ELIF_MAIN_SHUTDOWN_TIMEOUT_MS", "0");
    let result = Main::from_env();
    std::env::remove_var("ELIF_MAIN_SHUTDOWN_TIMEOUT_MS");

    let err = result.unwrap_err();
    assert!(matches!(err, MainError::Settings(_)));
}

#[tokio::test]
async fn test_template_rejects_sends_after_stop() {
    let mut main = main_with(&[("hello", "World")]);
    main.add_route_builder_type::<MyRouteBuilder>();
    main.start().await.unwrap();

    let template = main.template();
    main.stop().await.unwrap();

    let err = template.send_body("direct:start", "late").await.unwrap_err();
    assert!(err.is_delivery());
}

#[tokio::test]
async fn test_stop_waits_for_queued_exchanges() {
    struct Slow;
    impl Injectable for Slow {}
    impl RouteBuilder for Slow {
        fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
            routes.from("seda:slow").transform(body()).to("mock:slow");
            Ok(())
        }
    }

    let mut main = main_with(&[]);
    main.add_route_builder(Slow);
    main.start().await.unwrap();

    let template = main.template();
    for i in 0..5 {
        template.send_body("seda:slow", format!("m{}", i)).await.unwrap();
    }
    let mock = main
        .context()
        .endpoint_as::<MockEndpoint>("mock:slow")
        .unwrap();

    main.stop().await.unwrap();
    assert_eq!(mock.received_counter(), 5);
    assert_eq!(main.context().inflight_count(), 0);
}

/// Configuration hook that resolves a queue before components are configured
#[derive(Default)]
struct EagerQueueConfiguration {
    context: Option<Arc<RoutingContext>>,
}

impl Injectable for EagerQueueConfiguration {
    fn injection_points(points: &mut InjectionPoints<Self>) {
        points.bean(|c: &mut EagerQueueConfiguration, context: Arc<RoutingContext>| {
            c.context = Some(context)
        });
    }
}

impl Configuration for EagerQueueConfiguration {
    fn configure(&mut self) -> Result<(), MainError> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| MainError::illegal_state("context was not injected"))?;
        context.endpoint("seda:work")?;
        Ok(())
    }
}

#[tokio::test]
async fn test_queue_resolved_during_configuration_uses_configured_attributes() {
    struct Work;
    impl Injectable for Work {}
    impl RouteBuilder for Work {
        fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
            routes.from("seda:work").to("mock:work");
            Ok(())
        }
    }

    let mut main = main_with(&[
        ("component.seda.queueSize", "5"),
        ("component.seda.concurrentConsumers", "3"),
    ]);
    main.with_configuration_type::<EagerQueueConfiguration>()
        .add_route_builder(Work);
    main.start().await.unwrap();

    let seda = main
        .context()
        .endpoint_as::<SedaEndpoint>("seda:work")
        .unwrap();
    assert_eq!(seda.queue_size(), 5);
    assert_eq!(seda.concurrent_consumers(), 3);
    assert_eq!(seda.worker_count(), 3);

    main.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_drains_queue_chain_registered_downstream_first() {
    struct Chain;
    impl Injectable for Chain {}
    impl RouteBuilder for Chain {
        fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
            routes.from("seda:b").route_id("downstream").to("mock:done");
            routes.from("seda:a").route_id("upstream").to("seda:b");
            Ok(())
        }
    }

    let mut main = main_with(&[]);
    main.add_route_builder(Chain);
    main.start().await.unwrap();

    let template = main.template();
    for i in 0..20 {
        template.send_body("seda:a", format!("m{}", i)).await.unwrap();
    }
    let mock = main
        .context()
        .endpoint_as::<MockEndpoint>("mock:done")
        .unwrap();

    main.stop().await.unwrap();
    assert_eq!(mock.received_counter(), 20);
}

#[test]
fn test_property_injection_is_idempotent() {
    let properties = PropertySource::from_pairs([("hello", "World")]);
    let beans = BeanRegistry::new();
    let injector = Injector::new(&properties, &beans);

    let mut builder = MyRouteBuilder::default();
    injector.inject(&mut builder).unwrap();
    let first = builder.hello.clone();
    injector.inject(&mut builder).unwrap();

    assert_eq!(first, "World");
    assert_eq!(builder.hello, first);
}
