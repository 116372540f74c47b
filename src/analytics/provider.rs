//! Analytics providers and the factory registry that builds them.

use super::config::{IntegrationConfig, ScopeId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One analytics event as handed to providers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    /// Scope the event happened in; `None` for sitewide events.
    pub scope: Option<ScopeId>,
    /// Identifier of the object the event concerns, if any.
    pub subject: Option<String>,
    pub event_type: String,
    pub time: DateTime<Utc>,
    pub attributes: Map<String, Value>,
}

/// Destination for analytics events.
pub trait AnalyticsProvider: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Record one event.
    ///
    /// # Errors
    /// Any error aborts the dispatch of this event to later providers.
    fn collect_event(&self, event: &AnalyticsEvent) -> Result<()>;
}

/// Factory building a provider from its configuration row. The second
/// argument is the scope the instance serves, or `None` for a sitewide one.
type ProviderFactoryFn =
    dyn Fn(&IntegrationConfig, Option<ScopeId>) -> Result<Box<dyn AnalyticsProvider>> + Send + Sync;

/// Registry of provider factories keyed by protocol name.
pub struct ProviderRegistry {
    factories: HashMap<String, Box<ProviderFactoryFn>>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        ProviderRegistry {
            factories: HashMap::new(),
        }
    }

    /// Registry holding the built-in providers (`log`).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(LogProvider::PROTOCOL, |config, scope| {
            Ok(Box::new(LogProvider::from_config(config, scope)?) as Box<dyn AnalyticsProvider>)
        });
        registry
    }

    /// Register a factory for `protocol`, replacing any previous one.
    pub fn register<F>(&mut self, protocol: impl Into<String>, factory: F)
    where
        F: Fn(&IntegrationConfig, Option<ScopeId>) -> Result<Box<dyn AnalyticsProvider>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(protocol.into(), Box::new(factory));
    }

    pub fn contains(&self, protocol: &str) -> bool {
        self.factories.contains_key(protocol)
    }

    /// Build a provider for `config`.
    ///
    /// # Errors
    /// `Error::ProviderNotFound` for an unknown protocol; otherwise whatever
    /// the factory returns.
    pub fn build(
        &self,
        config: &IntegrationConfig,
        scope: Option<ScopeId>,
    ) -> Result<Box<dyn AnalyticsProvider>> {
        let factory = self.factories.get(&config.protocol).ok_or_else(|| {
            Error::ProviderNotFound(format!(
                "no analytics provider registered for protocol '{}'",
                config.protocol
            ))
        })?;
        factory(config, scope)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Provider writing every event to the `log` facade.
///
/// Settings: `target` (optional string) overrides the log target.
pub struct LogProvider {
    name: String,
    target: String,
}

impl LogProvider {
    pub const PROTOCOL: &'static str = "log";
    const DEFAULT_TARGET: &'static str = "table_cache::analytics";

    /// # Errors
    /// `Error::CannotLoadConfiguration` if `target` is set but not a string
    pub fn from_config(config: &IntegrationConfig, scope: Option<ScopeId>) -> Result<Self> {
        let target = match config.setting("target") {
            None => Self::DEFAULT_TARGET.to_string(),
            Some(_) => config.required_str("target")?.to_string(),
        };
        let name = match scope {
            Some(scope) => format!("log#{}@{}", config.id, scope),
            None => format!("log#{}", config.id),
        };
        Ok(LogProvider { name, target })
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl AnalyticsProvider for LogProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect_event(&self, event: &AnalyticsEvent) -> Result<()> {
        let attributes = Value::Object(event.attributes.clone());
        info!(
            target: self.target.as_str(),
            "{} {} scope={:?} subject={:?} at {} {}",
            self.name,
            event.event_type,
            event.scope,
            event.subject,
            event.time.to_rfc3339(),
            attributes
        );
        Ok(())
    }
}
