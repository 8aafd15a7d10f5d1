//! Boots a small routing context from `application.properties` (if present)
//! and pushes a few messages through it.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p elif-main --example hello_routes
//! ```

use elif_main::routing::{constant, function, MockEndpoint};
use elif_main::{
    Configuration, Exchange, Injectable, InjectionPoints, Main, MainConfig, MainError,
    PropertySource, RouteBuilder, RouteDefinitions, RoutingContext,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct AppConfiguration {
    context: Option<Arc<RoutingContext>>,
    environment: String,
}

impl Injectable for AppConfiguration {
    fn injection_points(points: &mut InjectionPoints<Self>) {
        points
            .bean(|c: &mut AppConfiguration, context: Arc<RoutingContext>| {
                c.context = Some(context)
            })
            .property_or("app.environment", "development", |c: &mut AppConfiguration, v: String| {
                c.environment = v
            });
    }
}

impl Configuration for AppConfiguration {
    fn configure(&mut self) -> Result<(), MainError> {
        if let Some(context) = &self.context {
            context
                .global_options()
                .insert("environment".to_string(), self.environment.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
struct GreetingRoutes {
    hello: String,
}

impl Injectable for GreetingRoutes {
    fn injection_points(points: &mut InjectionPoints<Self>) {
        points.property("hello", |r: &mut GreetingRoutes, v: String| r.hello = v);
    }
}

impl RouteBuilder for GreetingRoutes {
    fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
        routes
            .from("direct:start")
            .route_id("greeting")
            .log("received ${body}")
            .transform(constant(self.hello.as_str()))
            .to("seda:audit")
            .to("mock:results");

        routes
            .from("seda:audit")
            .route_id("audit")
            .transform(function(|ex: &Exchange| format!("audited {}", ex.body)))
            .log("${body}")
            .to("mock:audit");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut main = Main::with_config(MainConfig::default());
    // fallback values used when application.properties does not define them
    let defaults = PropertySource::from_pairs([
        ("hello", "World"),
        ("component.seda.concurrentConsumers", "2"),
    ]);
    let properties = defaults.merge(PropertySource::load("optional:application.properties")?);

    main.with_properties(properties)
        .with_configuration_type::<AppConfiguration>()
        .add_route_builder_type::<GreetingRoutes>();
    main.start().await?;

    let template = main.template();
    for i in 1..=3 {
        template
            .send_body("direct:start", format!("<message>{}</message>", i))
            .await?;
    }

    let context = main.context();
    let results = context.endpoint_as::<MockEndpoint>("mock:results")?;
    results.expected_message_count(3);
    results.assert_is_satisfied().await?;
    let audit = context.endpoint_as::<MockEndpoint>("mock:audit")?;

    main.stop().await?;
    tracing::info!(
        "results={:?} audited={} environment={:?}",
        results.received_bodies(),
        audit.received_counter(),
        context.global_option("environment")
    );
    Ok(())
}
