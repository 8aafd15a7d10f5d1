//! Declarative field injection
//!
//! A type opts into injection by implementing [`Injectable`] and listing its
//! injection points. Each point names its source (a bean from the
//! [`BeanRegistry`] or a key in the [`PropertySource`]) and a setter that
//! writes the resolved value into the target.
//!
//! ```rust
//! use elif_main::container::{Injectable, InjectionPoints};
//!
//! #[derive(Default)]
//! struct Greeting {
//!     hello: String,
//!     repeat: u32,
//! }
//!
//! impl Injectable for Greeting {
//!     fn injection_points(points: &mut InjectionPoints<Self>) {
//!         points
//!             .property("hello", |g: &mut Self, v: String| g.hello = v)
//!             .property_or("repeat", "1", |g: &mut Self, v: u32| g.repeat = v);
//!     }
//! }
//! ```
//!
//! Points are resolved in declaration order. A point that cannot be resolved
//! aborts injection; setters that already ran are not undone.

use crate::config::PropertySource;
use crate::container::BeanRegistry;
use crate::errors::MainError;
use std::sync::Arc;
use std::time::Duration;

/// Conversion from a raw property string into a field value
pub trait FromProperty: Sized {
    /// Human readable description used in coercion errors
    const EXPECTED: &'static str;

    fn from_property(value: &str) -> Option<Self>;

    /// Convert `value`, reporting failures against `key`
    fn coerce(key: &str, value: &str) -> Result<Self, MainError> {
        Self::from_property(value)
            .ok_or_else(|| MainError::type_coercion(key, value, Self::EXPECTED))
    }
}

impl FromProperty for String {
    const EXPECTED: &'static str = "a string";

    fn from_property(value: &str) -> Option<Self> {
        Some(value.to_string())
    }
}

impl FromProperty for bool {
    const EXPECTED: &'static str = "a boolean (true or false)";

    fn from_property(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

macro_rules! from_property_parse {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(
            impl FromProperty for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_property(value: &str) -> Option<Self> {
                    value.trim().parse().ok()
                }
            }
        )*
    };
}

from_property_parse! {
    i32 => "a 32-bit integer",
    i64 => "a 64-bit integer",
    u16 => "an unsigned 16-bit integer",
    u32 => "an unsigned 32-bit integer",
    u64 => "an unsigned 64-bit integer",
    usize => "an unsigned integer",
    f64 => "a number",
}

/// Durations are written in milliseconds
impl FromProperty for Duration {
    const EXPECTED: &'static str = "a duration in milliseconds";

    fn from_property(value: &str) -> Option<Self> {
        value.trim().parse().ok().map(Duration::from_millis)
    }
}

/// Where an injection point takes its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionSource {
    Bean {
        bean_type: &'static str,
        name: Option<String>,
    },
    Property {
        key: String,
        default: Option<String>,
    },
}

type PropertySetter<T> = Box<dyn Fn(&mut T, &str) -> Result<(), MainError> + Send + Sync>;
type BeanSetter<T> = Box<dyn Fn(&mut T, &BeanRegistry, &str) -> Result<(), MainError> + Send + Sync>;

enum Setter<T> {
    Property(PropertySetter<T>),
    Bean(BeanSetter<T>),
}

/// A single declared injection point on `T`
pub struct InjectionPoint<T> {
    source: InjectionSource,
    setter: Setter<T>,
}

impl<T> InjectionPoint<T> {
    pub fn source(&self) -> &InjectionSource {
        &self.source
    }
}

impl<T> std::fmt::Debug for InjectionPoint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("source", &self.source)
            .finish()
    }
}

/// Ordered list of injection points declared by a type
pub struct InjectionPoints<T> {
    points: Vec<InjectionPoint<T>>,
}

impl<T: 'static> InjectionPoints<T> {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Inject a required property
    pub fn property<V, F>(&mut self, key: &str, setter: F) -> &mut Self
    where
        V: FromProperty + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push_property::<V, F>(key, None, setter)
    }

    /// Inject a property, falling back to `default` when the key is absent
    pub fn property_or<V, F>(&mut self, key: &str, default: impl Into<String>, setter: F) -> &mut Self
    where
        V: FromProperty + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push_property::<V, F>(key, Some(default.into()), setter)
    }

    fn push_property<V, F>(&mut self, key: &str, default: Option<String>, setter: F) -> &mut Self
    where
        V: FromProperty + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let owned_key = key.to_string();
        self.points.push(InjectionPoint {
            source: InjectionSource::Property {
                key: key.to_string(),
                default,
            },
            setter: Setter::Property(Box::new(move |target, raw| {
                setter(target, V::coerce(&owned_key, raw)?);
                Ok(())
            })),
        });
        self
    }

    /// Inject the bean registered for type `B`
    pub fn bean<B, F>(&mut self, setter: F) -> &mut Self
    where
        B: Send + Sync + 'static,
        F: Fn(&mut T, Arc<B>) + Send + Sync + 'static,
    {
        self.points.push(InjectionPoint {
            source: InjectionSource::Bean {
                bean_type: std::any::type_name::<B>(),
                name: None,
            },
            setter: Setter::Bean(Box::new(move |target, beans, target_name| {
                setter(target, beans.resolve::<B>(target_name)?);
                Ok(())
            })),
        });
        self
    }

    /// Inject the bean of type `B` registered under `name`
    pub fn bean_named<B, F>(&mut self, name: &str, setter: F) -> &mut Self
    where
        B: Send + Sync + 'static,
        F: Fn(&mut T, Arc<B>) + Send + Sync + 'static,
    {
        let owned_name = name.to_string();
        self.points.push(InjectionPoint {
            source: InjectionSource::Bean {
                bean_type: std::any::type_name::<B>(),
                name: Some(name.to_string()),
            },
            setter: Setter::Bean(Box::new(move |target, beans, target_name| {
                setter(target, beans.resolve_named::<B>(target_name, &owned_name)?);
                Ok(())
            })),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InjectionPoint<T>> {
        self.points.iter()
    }
}

impl<T: 'static> Default for InjectionPoints<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Types whose fields are populated by the [`Injector`]
pub trait Injectable: Send + 'static {
    /// Declare the injection points of this type. The default declares none.
    fn injection_points(_points: &mut InjectionPoints<Self>)
    where
        Self: Sized,
    {
    }
}

/// Outcome of injecting a single object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionReport {
    pub beans: usize,
    pub properties: usize,
    pub defaults_used: usize,
}

impl InjectionReport {
    pub fn total(&self) -> usize {
        self.beans + self.properties
    }
}

/// Resolves injection points against a property source and bean registry
#[derive(Debug, Clone, Copy)]
pub struct Injector<'a> {
    properties: &'a PropertySource,
    beans: &'a BeanRegistry,
}

impl<'a> Injector<'a> {
    pub fn new(properties: &'a PropertySource, beans: &'a BeanRegistry) -> Self {
        Self { properties, beans }
    }

    /// Resolve and apply every injection point declared by `T`
    pub fn inject<T: Injectable>(&self, target: &mut T) -> Result<InjectionReport, MainError> {
        let mut points = InjectionPoints::new();
        T::injection_points(&mut points);
        self.apply(target, &points)
    }

    /// Apply an explicit list of injection points to `target`
    pub fn apply<T: 'static>(
        &self,
        target: &mut T,
        points: &InjectionPoints<T>,
    ) -> Result<InjectionReport, MainError> {
        let target_name = std::any::type_name::<T>();
        let mut report = InjectionReport::default();

        for point in points.iter() {
            match (&point.source, &point.setter) {
                (InjectionSource::Property { key, default }, Setter::Property(setter)) => {
                    let (raw, used_default) =
                        self.resolve_property(target_name, key, default.as_deref())?;
                    setter(target, &raw)?;
                    report.properties += 1;
                    if used_default {
                        report.defaults_used += 1;
                    }
                    tracing::debug!("Injected property '{}' into {}", key, target_name);
                }
                (InjectionSource::Bean { bean_type, .. }, Setter::Bean(setter)) => {
                    setter(target, self.beans, target_name)?;
                    report.beans += 1;
                    tracing::debug!("Injected bean '{}' into {}", bean_type, target_name);
                }
                _ => unreachable!("injection source and setter are constructed together"),
            }
        }

        Ok(report)
    }

    /// Look up `key`, falling back to `default`, with placeholders resolved.
    /// The flag reports whether the default was used.
    pub fn resolve_property(
        &self,
        target: &str,
        key: &str,
        default: Option<&str>,
    ) -> Result<(String, bool), MainError> {
        match (self.properties.get(key), default) {
            (Some(value), _) => Ok((self.properties.resolve_placeholders(value)?, false)),
            (None, Some(default)) => Ok((self.properties.resolve_placeholders(default)?, true)),
            (None, None) => Err(MainError::missing_property(target, key)),
        }
    }
}
