//! Integration configuration rows.
//!
//! Each row describes one configured external integration. Rows whose goal is
//! [`ANALYTICS_GOAL`] become analytics providers; all others are ignored by
//! the analytics facade.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of an integration configuration row.
pub type IntegrationId = i64;

/// Identifier of a scope (for example a library) that providers can be
/// restricted to.
pub type ScopeId = i64;

/// Goal marking an integration as an analytics provider.
pub const ANALYTICS_GOAL: &str = "analytics";

/// One integration configuration row.
///
/// # Example
///
/// ```
/// use table_cache::analytics::IntegrationConfig;
///
/// let rows = IntegrationConfig::from_json_list(r#"[
///     { "id": 1, "goal": "analytics", "protocol": "log" },
///     { "id": 2, "goal": "analytics", "protocol": "log", "scopes": [7, 8] },
///     { "id": 3, "goal": "search", "protocol": "opensearch" }
/// ]"#).unwrap();
///
/// assert!(rows[0].is_sitewide());
/// assert_eq!(rows[1].scopes, vec![7, 8]);
/// assert!(!rows[2].is_analytics());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub id: IntegrationId,
    pub goal: String,
    /// Name of the provider factory to build this integration with.
    pub protocol: String,
    /// Scopes the integration is restricted to; empty means sitewide.
    #[serde(default)]
    pub scopes: Vec<ScopeId>,
    /// Provider-specific settings.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl IntegrationConfig {
    /// Build an analytics integration row.
    pub fn analytics(id: IntegrationId, protocol: impl Into<String>) -> Self {
        IntegrationConfig {
            id,
            goal: ANALYTICS_GOAL.to_string(),
            protocol: protocol.into(),
            scopes: Vec::new(),
            settings: Map::new(),
        }
    }

    /// Restrict the integration to the given scopes.
    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = ScopeId>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    /// Add a provider setting.
    pub fn with_setting(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(name.into(), value.into());
        self
    }

    /// Parse a JSON array of configuration rows.
    ///
    /// # Errors
    /// `Error::ConfigError` on malformed JSON
    pub fn from_json_list(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether this row configures an analytics provider.
    pub fn is_analytics(&self) -> bool {
        self.goal == ANALYTICS_GOAL
    }

    /// Whether the integration applies to every scope.
    pub fn is_sitewide(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Look up a provider setting.
    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }

    /// Look up a string setting a provider cannot work without.
    ///
    /// # Errors
    /// `Error::CannotLoadConfiguration` if the setting is missing or not a string
    pub fn required_str(&self, name: &str) -> Result<&str> {
        self.setting(name)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::CannotLoadConfiguration(format!(
                    "integration {} ({}) is missing required setting '{}'",
                    self.id, self.protocol, name
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let row = IntegrationConfig::analytics(4, "log")
            .with_scopes([1, 2])
            .with_setting("target", "analytics.events");

        assert!(row.is_analytics());
        assert!(!row.is_sitewide());
        assert_eq!(row.required_str("target").unwrap(), "analytics.events");
    }

    #[test]
    fn test_required_setting_missing() {
        let row = IntegrationConfig::analytics(4, "log").with_setting("target", 3);
        let err = row.required_str("target").unwrap_err();
        assert!(matches!(err, Error::CannotLoadConfiguration(_)));
        assert!(row.required_str("other").is_err());
    }

    #[test]
    fn test_from_json_defaults() {
        let rows = IntegrationConfig::from_json_list(
            r#"[{ "id": 9, "goal": "analytics", "protocol": "log" }]"#,
        )
        .expect("valid rows");

        assert_eq!(rows.len(), 1);
        assert!(rows[0].scopes.is_empty());
        assert!(rows[0].settings.is_empty());
    }

    #[test]
    fn test_from_json_rejects_missing_protocol() {
        let err = IntegrationConfig::from_json_list(r#"[{ "id": 9, "goal": "analytics" }]"#)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
