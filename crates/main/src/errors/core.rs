use crate::config::ConfigError;
use thiserror::Error;

/// Error type for bootstrapping and running a routing context
#[derive(Debug, Error)]
pub enum MainError {
    #[error("Failed to load properties from '{location}': {message}")]
    ConfigLoad { location: String, message: String },

    #[error("Could not instantiate '{type_name}': {message}")]
    Instantiation { type_name: String, message: String },

    #[error("No bean of type '{bean_type}'{} is registered (required by '{target}')", named_suffix(.name))]
    UnresolvedBean {
        target: String,
        bean_type: String,
        name: Option<String>,
    },

    #[error("Property '{key}' is required by '{target}' but was not found and has no default")]
    MissingProperty { target: String, key: String },

    #[error("Cannot convert '{value}' for '{key}' into {expected}")]
    TypeCoercion {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Component '{component}' has no attribute '{attribute}'")]
    UnknownAttribute { component: String, attribute: String },

    #[error("Failed to install route '{route}': {message}")]
    RouteInstall { route: String, message: String },

    #[error("Illegal state: {message}")]
    IllegalState { message: String },

    #[error("Delivery to '{endpoint}' failed: {message}")]
    Delivery { endpoint: String, message: String },

    #[error("Assertion failed on '{endpoint}': {message}")]
    Assertion { endpoint: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Settings(#[from] ConfigError),
}

fn named_suffix(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" named '{}'", name),
        None => String::new(),
    }
}

impl MainError {
    /// Create a new property loading error
    pub fn config_load(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigLoad {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a new instantiation error
    pub fn instantiation(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Instantiation {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a new missing property error
    pub fn missing_property(target: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingProperty {
            target: target.into(),
            key: key.into(),
        }
    }

    /// Create a new coercion error
    pub fn type_coercion(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::TypeCoercion {
            key: key.into(),
            value: value.into(),
            expected,
        }
    }

    /// Create a new unknown attribute error
    pub fn unknown_attribute(component: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            component: component.into(),
            attribute: attribute.into(),
        }
    }

    /// Create a new route installation error
    pub fn route_install(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RouteInstall {
            route: route.into(),
            message: message.into(),
        }
    }

    /// Create a new illegal state error
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Create a new delivery error
    pub fn delivery(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a new assertion error
    pub fn assertion(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Assertion {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Check if the error is a property loading error
    pub fn is_config_load(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. })
    }

    /// Check if the error is an instantiation error
    pub fn is_instantiation(&self) -> bool {
        matches!(self, Self::Instantiation { .. })
    }

    /// Check if the error is an unresolved bean error
    pub fn is_unresolved_bean(&self) -> bool {
        matches!(self, Self::UnresolvedBean { .. })
    }

    /// Check if the error is a missing property error
    pub fn is_missing_property(&self) -> bool {
        matches!(self, Self::MissingProperty { .. })
    }

    /// Check if the error is a coercion error
    pub fn is_type_coercion(&self) -> bool {
        matches!(self, Self::TypeCoercion { .. })
    }

    /// Check if the error is an unknown attribute error
    pub fn is_unknown_attribute(&self) -> bool {
        matches!(self, Self::UnknownAttribute { .. })
    }

    /// Check if the error is a route installation error
    pub fn is_route_install(&self) -> bool {
        matches!(self, Self::RouteInstall { .. })
    }

    /// Check if the error is an illegal state error
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }

    /// Check if the error is a delivery error
    pub fn is_delivery(&self) -> bool {
        matches!(self, Self::Delivery { .. })
    }
}
