#![cfg(test)]

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::error_bus::{error_handler, ErrorBus};
use crate::kernel::constants::{KERNEL_NAMESPACE, MULTIPLE_AUGMENTS_KIND};
use crate::plugin_system::augment::AugmentationMerger;
use crate::plugin_system::plugin::{Api, ApiDefinition, Plugin};

fn quiet_bus() -> ErrorBus {
    ErrorBus::with_pipeline(Vec::new())
}

fn with_setup(name: &str) -> Plugin {
    Plugin::builder(name, "1.0.0")
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .build()
        .unwrap()
}

fn plugin_map(plugins: Vec<Plugin>) -> (Vec<String>, HashMap<String, Arc<Plugin>>) {
    let order: Vec<String> = plugins.iter().map(|p| p.name().to_string()).collect();
    let map = plugins
        .into_iter()
        .map(|p| (p.name().to_string(), Arc::new(p)))
        .collect();
    (order, map)
}

#[tokio::test]
async fn merge_combines_setup_output_with_contributions() {
    let target = with_setup("store");
    let augmenter = Plugin::builder("cache", "1.0.0")
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .augments("store", |_| {
            Api::new()
                .method("cached_get", |_| async { Ok(json!("from-cache")) })
                .build()
        })
        .build()
        .unwrap();

    let (order, plugins) = plugin_map(vec![target, augmenter]);
    let mut setups = HashMap::new();
    setups.insert(
        "store".to_string(),
        Api::new().method("get", |_| async { Ok(json!("from-store")) }).build(),
    );
    setups.insert("cache".to_string(), ApiDefinition::new());

    let apis = AugmentationMerger::merge(&order, &plugins, setups, &quiet_bus()).await;

    let store = &apis["store"];
    assert!(store.is_sealed());
    assert_eq!(store.method_names(), vec!["cached_get", "get"]);
    assert_eq!(store.invoke("get", json!(null)).await.unwrap(), json!("from-store"));
    assert_eq!(
        store.invoke("cached_get", json!(null)).await.unwrap(),
        json!("from-cache")
    );
}

#[tokio::test]
async fn collisions_resolve_last_writer_wins_and_warn() {
    let target = with_setup("store");
    let first = Plugin::builder("first", "1.0.0")
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .augments("store", |_| {
            Api::new().method("get", |_| async { Ok(json!("first")) }).build()
        })
        .build()
        .unwrap();
    let second = Plugin::builder("second", "1.0.0")
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .augments("store", |_| {
            Api::new().method("get", |_| async { Ok(json!("second")) }).build()
        })
        .build()
        .unwrap();

    let errors = quiet_bus();
    let warnings = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = Arc::clone(&warnings);
    errors.on_kind(
        KERNEL_NAMESPACE,
        MULTIPLE_AUGMENTS_KIND,
        error_handler(move |report| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().push(report.meta.clone());
            }
        }),
    );

    let (order, plugins) = plugin_map(vec![target, first, second]);
    let mut setups = HashMap::new();
    setups.insert(
        "store".to_string(),
        Api::new().method("get", |_| async { Ok(json!("own")) }).build(),
    );

    let apis = AugmentationMerger::merge(&order, &plugins, setups, &errors).await;

    // Last writer in resolved order wins.
    assert_eq!(apis["store"].invoke("get", json!(null)).await.unwrap(), json!("second"));
    // Both overwrites warned.
    let warnings = warnings.lock();
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[0]["method"], json!("get"));
}

#[tokio::test]
async fn augmenters_can_close_over_their_own_api() {
    let target = with_setup("app");
    let augmenter = Plugin::builder("auth", "1.0.0")
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .augments("app", |ctx| {
            let own = Arc::clone(&ctx.augmenter_api);
            Api::new()
                .method("whoami", move |payload| {
                    let own = Arc::clone(&own);
                    async move { own.invoke("user", payload).await.map_err(Into::into) }
                })
                .build()
        })
        .build()
        .unwrap();

    let (order, plugins) = plugin_map(vec![target, augmenter]);
    let mut setups = HashMap::new();
    setups.insert("app".to_string(), ApiDefinition::new());
    setups.insert(
        "auth".to_string(),
        Api::new().method("user", |_| async { Ok(json!("admin")) }).build(),
    );

    let apis = AugmentationMerger::merge(&order, &plugins, setups, &quiet_bus()).await;
    assert_eq!(apis["app"].invoke("whoami", json!(null)).await.unwrap(), json!("admin"));
}

#[tokio::test]
async fn contributions_to_unknown_targets_are_dropped() {
    let augmenter = Plugin::builder("orphan", "1.0.0")
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .augments("ghost", |_| {
            Api::new().method("noop", |_| async { Ok(json!(null)) }).build()
        })
        .build()
        .unwrap();

    let (order, plugins) = plugin_map(vec![augmenter]);
    let apis = AugmentationMerger::merge(&order, &plugins, HashMap::new(), &quiet_bus()).await;
    assert_eq!(apis.len(), 1);
    assert!(apis.contains_key("orphan"));
}
