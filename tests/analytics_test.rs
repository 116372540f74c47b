//! Integration tests for the analytics facade
//!
//! Configuration rows are loaded from JSON the way a deployment would store
//! them, then events are dispatched through the loaded providers.

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use table_cache::analytics::{AnalyticsEvent, LogProvider};
use table_cache::{Analytics, AnalyticsProvider, Error, IntegrationConfig, ProviderRegistry};

/// Provider collecting events into a shared buffer.
struct Collector {
    events: Arc<Mutex<Vec<AnalyticsEvent>>>,
}

impl AnalyticsProvider for Collector {
    fn name(&self) -> &str {
        "collector"
    }

    fn collect_event(&self, event: &AnalyticsEvent) -> Result<(), Error> {
        self.events
            .lock()
            .map_err(|_| Error::ProviderError("collector poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

fn registry(events: &Arc<Mutex<Vec<AnalyticsEvent>>>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::with_builtin();
    let events = Arc::clone(events);
    registry.register("collector", move |config, _scope| {
        config.required_str("endpoint")?;
        Ok(Box::new(Collector {
            events: Arc::clone(&events),
        }) as Box<dyn AnalyticsProvider>)
    });
    registry
}

const CONFIG: &str = r#"[
    { "id": 1, "goal": "analytics", "protocol": "log", "settings": { "target": "events" } },
    { "id": 2, "goal": "analytics", "protocol": "collector", "scopes": [10, 20],
      "settings": { "endpoint": "https://collector.example/events" } },
    { "id": 3, "goal": "analytics", "protocol": "collector", "scopes": [30] },
    { "id": 4, "goal": "analytics", "protocol": "mystery" },
    { "id": 5, "goal": "metadata", "protocol": "mystery" }
]"#;

/// Test 1: Loading from JSON
///
/// - Valid rows become providers
/// - Broken rows are reported by id, in order
/// - Rows with another goal are skipped silently
#[test]
fn test_load_from_json() {
    let _ = env_logger::builder().is_test(true).try_init();

    let events = Arc::new(Mutex::new(Vec::new()));
    let configs = IntegrationConfig::from_json_list(CONFIG).expect("Failed to parse config");
    let analytics = Analytics::load(&configs, &registry(&events));

    assert_eq!(analytics.sitewide_count(), 1);
    assert_eq!(analytics.scoped_count(10), 1);
    assert_eq!(analytics.scoped_count(20), 1);
    assert_eq!(analytics.scoped_count(30), 0);

    let failed: Vec<_> = analytics
        .initialization_errors()
        .iter()
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(failed, vec![3, 4]);
    assert!(matches!(
        analytics.initialization_errors()[0].1,
        Error::CannotLoadConfiguration(_)
    ));
    assert!(matches!(
        analytics.initialization_errors()[1].1,
        Error::ProviderNotFound(_)
    ));
}

/// Test 2: Scoped events carry their data to scoped providers
#[test]
fn test_collect_scoped_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let configs = IntegrationConfig::from_json_list(CONFIG).expect("Failed to parse config");
    let analytics = Analytics::load(&configs, &registry(&events));

    let mut attributes = Map::new();
    attributes.insert("neighborhood".to_string(), json!("downtown"));
    analytics
        .collect_event(
            Some(20),
            Some("urn:isbn:9781234567897"),
            "circulation_checkout",
            None,
            attributes,
        )
        .expect("Failed to collect event");

    analytics
        .collect_event(Some(30), None, "open_book", None, Map::new())
        .expect("Failed to collect event");

    let events = events.lock().expect("events lock");
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.scope, Some(20));
    assert_eq!(event.subject.as_deref(), Some("urn:isbn:9781234567897"));
    assert_eq!(event.event_type, "circulation_checkout");
    assert_eq!(event.attributes.get("neighborhood"), Some(&Value::from("downtown")));
}

/// Test 3: is_configured follows the loaded providers
#[test]
fn test_is_configured() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let registry = registry(&events);

    let scoped = IntegrationConfig::from_json_list(
        r#"[{ "id": 2, "goal": "analytics", "protocol": "collector", "scopes": [10],
              "settings": { "endpoint": "x" } }]"#,
    )
    .expect("Failed to parse config");
    let analytics = Analytics::load(&scoped, &registry);
    assert!(analytics.is_configured(Some(10)));
    assert!(!analytics.is_configured(Some(11)));

    let none = Analytics::load(&[], &registry);
    assert!(!none.is_configured(Some(10)));
    assert!(!none.is_configured(None));

    let everywhere = Analytics::load(
        &[IntegrationConfig::analytics(1, LogProvider::PROTOCOL)],
        &registry,
    );
    assert!(everywhere.is_configured(Some(11)));
}

/// Test 4: One loaded facade shared across threads
#[test]
fn test_shared_across_threads() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let configs = vec![IntegrationConfig::analytics(1, "collector").with_setting("endpoint", "x")];
    let analytics = Arc::new(Analytics::load(&configs, &registry(&events)));

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let analytics = Arc::clone(&analytics);
            std::thread::spawn(move || {
                analytics.collect_event(None, None, &format!("event_{}", n), None, Map::new())
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .expect("thread panicked")
            .expect("Failed to collect event");
    }

    assert_eq!(events.lock().expect("events lock").len(), 4);
}
