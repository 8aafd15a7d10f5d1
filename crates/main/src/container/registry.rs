use crate::errors::MainError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BeanKey {
    type_id: TypeId,
    name: Option<String>,
}

struct BeanEntry {
    type_name: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for BeanEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanEntry")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Shared instances available for bean injection
///
/// Beans are keyed by type and an optional name. Lookups by type alone return
/// the unnamed bean, or the single named bean of that type when exactly one
/// exists.
#[derive(Debug, Default)]
pub struct BeanRegistry {
    beans: HashMap<BeanKey, BeanEntry>,
}

impl BeanRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an unnamed bean, replacing any previous bean of the same type
    pub fn register<T: Send + Sync + 'static>(&mut self, bean: Arc<T>) {
        self.insert(None, bean);
    }

    /// Register a bean under a name
    pub fn register_named<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, bean: Arc<T>) {
        self.insert(Some(name.into()), bean);
    }

    fn insert<T: Send + Sync + 'static>(&mut self, name: Option<String>, bean: Arc<T>) {
        let key = BeanKey {
            type_id: TypeId::of::<T>(),
            name,
        };
        if self.beans.contains_key(&key) {
            tracing::debug!(
                "Replacing bean of type '{}'{}",
                std::any::type_name::<T>(),
                key.name
                    .as_deref()
                    .map(|name| format!(" named '{}'", name))
                    .unwrap_or_default()
            );
        }
        self.beans.insert(
            key,
            BeanEntry {
                type_name: std::any::type_name::<T>(),
                instance: bean,
            },
        );
    }

    /// Try to resolve a bean by type
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let type_id = TypeId::of::<T>();
        let unnamed = BeanKey {
            type_id,
            name: None,
        };
        if let Some(entry) = self.beans.get(&unnamed) {
            return entry.instance.clone().downcast::<T>().ok();
        }

        let mut candidates = self
            .beans
            .iter()
            .filter(|(key, _)| key.type_id == type_id);
        match (candidates.next(), candidates.next()) {
            (Some((_, entry)), None) => entry.instance.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Try to resolve a bean by type and name
    pub fn try_resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        let key = BeanKey {
            type_id: TypeId::of::<T>(),
            name: Some(name.to_string()),
        };
        self.beans
            .get(&key)
            .and_then(|entry| entry.instance.clone().downcast::<T>().ok())
    }

    /// Resolve a bean for `target`, failing with `UnresolvedBean`
    pub fn resolve<T: Send + Sync + 'static>(&self, target: &str) -> Result<Arc<T>, MainError> {
        self.try_resolve::<T>().ok_or_else(|| MainError::UnresolvedBean {
            target: target.to_string(),
            bean_type: std::any::type_name::<T>().to_string(),
            name: None,
        })
    }

    /// Resolve a named bean for `target`, failing with `UnresolvedBean`
    pub fn resolve_named<T: Send + Sync + 'static>(
        &self,
        target: &str,
        name: &str,
    ) -> Result<Arc<T>, MainError> {
        self.try_resolve_named::<T>(name)
            .ok_or_else(|| MainError::UnresolvedBean {
                target: target.to_string(),
                bean_type: std::any::type_name::<T>().to_string(),
                name: Some(name.to_string()),
            })
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }
}
