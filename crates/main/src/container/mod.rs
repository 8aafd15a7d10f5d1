pub mod auto_config;
pub mod injection;
pub mod registry;

pub use auto_config::{AutoConfigReport, AutoConfigurator, SkippedAttribute, COMPONENT_PREFIX};
pub use injection::{
    FromProperty, Injectable, InjectionPoint, InjectionPoints, InjectionReport, InjectionSource,
    Injector,
};
pub use registry::BeanRegistry;
