//! Analytics event dispatch.
//!
//! `Analytics` is built once from the integration configuration rows and a
//! [`ProviderRegistry`], then shared by reference. Providers without scopes
//! receive every event; scoped providers only receive events of their scope.
//!
//! ```
//! use table_cache::analytics::{Analytics, IntegrationConfig, ProviderRegistry};
//!
//! let configs = vec![
//!     IntegrationConfig::analytics(1, "log"),
//!     IntegrationConfig::analytics(2, "log").with_scopes([7]),
//! ];
//! let analytics = Analytics::load(&configs, &ProviderRegistry::with_builtin());
//!
//! assert!(analytics.is_configured(Some(7)));
//! analytics
//!     .collect_event(Some(7), Some("urn:isbn:9780000000001"), "checkout", None, Default::default())
//!     .unwrap();
//! ```

mod config;
mod provider;

pub use config::{IntegrationConfig, IntegrationId, ScopeId, ANALYTICS_GOAL};
pub use provider::{AnalyticsEvent, AnalyticsProvider, LogProvider, ProviderRegistry};

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Loaded analytics providers.
#[derive(Default)]
pub struct Analytics {
    sitewide: Vec<Box<dyn AnalyticsProvider>>,
    scoped: HashMap<ScopeId, Vec<Box<dyn AnalyticsProvider>>>,
    initialization_errors: Vec<(IntegrationId, Error)>,
}

impl Analytics {
    /// Build providers for every analytics row in `configs`.
    ///
    /// Rows that fail to load are recorded in
    /// [`initialization_errors`](Self::initialization_errors) and skipped. A
    /// scoped row keeps the providers of scopes built before its first
    /// failing scope; later scopes are skipped.
    pub fn load(configs: &[IntegrationConfig], registry: &ProviderRegistry) -> Self {
        let mut analytics = Analytics::default();

        for config in configs.iter().filter(|c| c.is_analytics()) {
            if config.is_sitewide() {
                match registry.build(config, None) {
                    Ok(provider) => analytics.sitewide.push(provider),
                    Err(e) => analytics.record_failure(config, e),
                }
                continue;
            }

            for &scope in &config.scopes {
                match registry.build(config, Some(scope)) {
                    Ok(provider) => analytics.scoped.entry(scope).or_default().push(provider),
                    Err(e) => {
                        analytics.record_failure(config, e);
                        break;
                    }
                }
            }
        }

        info!(
            "✓ Loaded {} sitewide and {} scoped analytics provider(s), {} failed integration(s)",
            analytics.sitewide.len(),
            analytics.scoped.values().map(Vec::len).sum::<usize>(),
            analytics.initialization_errors.len()
        );
        analytics
    }

    /// Rebuild from fresh configuration, replacing all state at once.
    pub fn reload(&mut self, configs: &[IntegrationConfig], registry: &ProviderRegistry) {
        *self = Analytics::load(configs, registry);
    }

    /// Dispatch an event to every sitewide provider, then to every provider of
    /// `scope`, in load order. `time` defaults to now.
    ///
    /// # Errors
    /// The first provider error; later providers do not see the event.
    pub fn collect_event(
        &self,
        scope: Option<ScopeId>,
        subject: Option<&str>,
        event_type: &str,
        time: Option<DateTime<Utc>>,
        attributes: Map<String, Value>,
    ) -> Result<()> {
        let event = AnalyticsEvent {
            scope,
            subject: subject.map(str::to_string),
            event_type: event_type.to_string(),
            time: time.unwrap_or_else(Utc::now),
            attributes,
        };

        for provider in self.providers_for(scope) {
            if let Err(e) = provider.collect_event(&event) {
                warn!(
                    "✗ Analytics provider {} failed on {}: {}",
                    provider.name(),
                    event.event_type,
                    e
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Whether events in `scope` reach at least one provider.
    pub fn is_configured(&self, scope: Option<ScopeId>) -> bool {
        !self.sitewide.is_empty() || scope.is_some_and(|s| self.scoped.contains_key(&s))
    }

    /// Whether any sitewide provider is loaded.
    pub fn is_globally_enabled(&self) -> bool {
        !self.sitewide.is_empty()
    }

    /// Integrations that failed to load, in configuration order.
    pub fn initialization_errors(&self) -> &[(IntegrationId, Error)] {
        &self.initialization_errors
    }

    pub fn sitewide_count(&self) -> usize {
        self.sitewide.len()
    }

    pub fn scoped_count(&self, scope: ScopeId) -> usize {
        self.scoped.get(&scope).map_or(0, Vec::len)
    }

    fn providers_for(&self, scope: Option<ScopeId>) -> impl Iterator<Item = &dyn AnalyticsProvider> {
        let scoped = scope
            .and_then(|s| self.scoped.get(&s))
            .map(Vec::as_slice)
            .unwrap_or_default();
        self.sitewide.iter().chain(scoped).map(|p| p.as_ref())
    }

    fn record_failure(&mut self, config: &IntegrationConfig, error: Error) {
        warn!(
            "✗ Failed to load analytics integration {} ({}): {}",
            config.id, config.protocol, error
        );
        self.initialization_errors.push((config.id, error));
    }
}
