//! Automatic component configuration
//!
//! Applies every `component.<name>.<attribute>=<value>` property onto the
//! component registered under `<name>`. Components without matching keys
//! keep their built-in defaults.

use crate::config::PropertySource;
use crate::errors::MainError;
use crate::routing::RoutingContext;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Key prefix addressing component attributes
pub const COMPONENT_PREFIX: &str = "component.";

/// An attribute ignored in warn-and-skip mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAttribute {
    pub component: String,
    pub attribute: String,
    pub reason: String,
}

/// What auto-configuration changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoConfigReport {
    /// Applied values per component, keyed by attribute as written in the properties
    pub applied: BTreeMap<String, BTreeMap<String, String>>,
    pub skipped: Vec<SkippedAttribute>,
    /// Component names found in properties but not registered in the context
    pub unknown_components: Vec<String>,
}

impl AutoConfigReport {
    pub fn applied_count(&self) -> usize {
        self.applied.values().map(BTreeMap::len).sum()
    }
}

/// Maps component-scoped properties onto registered components
#[derive(Debug, Clone, Copy)]
pub struct AutoConfigurator {
    fail_fast: bool,
}

impl AutoConfigurator {
    /// `fail_fast` makes unknown attributes an error instead of a warning
    pub fn new(fail_fast: bool) -> Self {
        Self { fail_fast }
    }

    pub fn configure(
        &self,
        context: &RoutingContext,
        properties: &PropertySource,
    ) -> Result<AutoConfigReport, MainError> {
        let mut report = AutoConfigReport::default();
        let names = context.component_names();

        for name in &names {
            let component = context.component(name)?;
            let scoped = properties.keys_with_prefix(&format!("{}{}.", COMPONENT_PREFIX, name));

            for (attribute, raw) in scoped {
                let value = properties.resolve_placeholders(&raw)?;
                match component.configure_attribute(&attribute, &value) {
                    Ok(()) => {
                        tracing::debug!("Configured {}.{} = {}", name, attribute, value);
                        report
                            .applied
                            .entry(name.clone())
                            .or_default()
                            .insert(attribute, value);
                    }
                    Err(e) if e.is_unknown_attribute() && !self.fail_fast => {
                        tracing::warn!("Skipping unknown attribute '{}' on component '{}'", attribute, name);
                        report.skipped.push(SkippedAttribute {
                            component: name.clone(),
                            attribute,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let known: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let mentioned: BTreeSet<String> = properties
            .keys_with_prefix(COMPONENT_PREFIX)
            .keys()
            .filter_map(|suffix| suffix.split_once('.').map(|(name, _)| name.to_string()))
            .collect();
        for name in mentioned {
            if !known.contains(name.as_str()) {
                tracing::warn!(
                    "Properties configure component '{}' which is not registered",
                    name
                );
                report.unknown_components.push(name);
            }
        }

        tracing::info!(
            "Auto-configured {} component attribute(s)",
            report.applied_count()
        );
        Ok(report)
    }
}

impl Default for AutoConfigurator {
    fn default() -> Self {
        Self::new(true)
    }
}
