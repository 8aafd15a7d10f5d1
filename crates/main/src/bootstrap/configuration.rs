use crate::container::{Injectable, InjectionReport, Injector};
use crate::errors::MainError;
use crate::routing::{RouteBuilder, RouteDefinitions};

/// User configuration object. Its injection points are resolved first, then
/// `configure` runs exactly once before any route is registered.
pub trait Configuration: Injectable {
    fn configure(&mut self) -> Result<(), MainError>;
}

/// Type-erased configuration object owned by the bootstrapper
pub(crate) trait ManagedConfiguration: Send {
    fn type_name(&self) -> &'static str;
    fn inject(&mut self, injector: &Injector<'_>) -> Result<InjectionReport, MainError>;
    fn configure(&mut self) -> Result<(), MainError>;
}

/// Type-erased route builder owned by the bootstrapper
pub(crate) trait ManagedRouteBuilder: Send {
    fn type_name(&self) -> &'static str;
    fn inject(&mut self, injector: &Injector<'_>) -> Result<InjectionReport, MainError>;
    fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError>;
}

pub(crate) struct Managed<T>(pub T);

impl<T: Configuration> ManagedConfiguration for Managed<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn inject(&mut self, injector: &Injector<'_>) -> Result<InjectionReport, MainError> {
        injector.inject(&mut self.0)
    }

    fn configure(&mut self) -> Result<(), MainError> {
        Configuration::configure(&mut self.0)
    }
}

impl<T: RouteBuilder> ManagedRouteBuilder for Managed<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn inject(&mut self, injector: &Injector<'_>) -> Result<InjectionReport, MainError> {
        injector.inject(&mut self.0)
    }

    fn configure(&self, routes: &mut RouteDefinitions) -> Result<(), MainError> {
        RouteBuilder::configure(&self.0, routes)
    }
}

/// Deferred construction of a managed object
pub(crate) type Factory<M> = Box<dyn FnOnce() -> Result<Box<M>, MainError> + Send>;
