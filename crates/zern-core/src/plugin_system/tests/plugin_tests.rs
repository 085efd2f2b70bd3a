#![cfg(test)]

use serde_json::json;

use crate::lifecycle::LifecyclePhase;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::plugin::{Api, ApiDefinition, ApiHandle, Plugin};

#[test]
fn builder_rejects_empty_names() {
    let err = Plugin::builder("  ", "1.0.0")
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .build()
        .unwrap_err();
    assert!(matches!(err, PluginSystemError::InvalidDefinition { .. }));
}

#[test]
fn builder_requires_setup() {
    let err = Plugin::builder("db", "1.0.0").build().unwrap_err();
    assert!(matches!(err, PluginSystemError::InvalidDefinition { .. }));
}

#[test]
fn phase_table_is_indexed_by_phase() {
    let plugin = Plugin::builder("db", "1.0.0")
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .on_init(|_| async { Ok(()) })
        .on_destroy(|_| async { Ok(()) })
        .build()
        .unwrap();

    assert!(plugin.phase_fn(LifecyclePhase::Init).is_some());
    assert!(plugin.phase_fn(LifecyclePhase::Destroy).is_some());
    assert!(plugin.phase_fn(LifecyclePhase::BeforeInit).is_none());
    assert!(plugin.phase_fn(LifecyclePhase::AfterDestroy).is_none());
}

#[test]
fn declarations_are_kept_on_the_plugin() {
    use crate::event::{DeliveryMode, StartupPolicy};

    let plugin = Plugin::builder("metrics", "0.3.0")
        .declare_event("metrics", "tick", DeliveryMode::Async, StartupPolicy::Drop)
        .declare_hook("metrics", "flush")
        .declare_alerts("metrics")
        .declare_errors("metrics", &["Overflow"])
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .build()
        .unwrap();

    assert_eq!(plugin.event_decls().len(), 1);
    assert_eq!(plugin.hook_decls()[0].key, "flush");
    assert_eq!(plugin.alert_namespaces(), &["metrics"]);
    assert_eq!(plugin.error_decls()[0].kinds, vec!["Overflow"]);
}

#[tokio::test]
async fn api_handle_invokes_methods() {
    let methods = Api::new()
        .method("double", |payload| async move {
            let n = payload.as_i64().unwrap_or(0);
            Ok(json!(n * 2))
        })
        .build();
    let api = ApiHandle::new("math", methods);

    let result = api.invoke("double", json!(21)).await.unwrap();
    assert_eq!(result, json!(42));
}

#[tokio::test]
async fn api_handle_rejects_unknown_methods() {
    let api = ApiHandle::new("math", ApiDefinition::new());
    let err = api.invoke("missing", json!(null)).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::UnknownApiMethod { .. }));
}

#[tokio::test]
async fn sealed_api_rejects_insertions_but_still_invokes() {
    let methods = Api::new()
        .method("ping", |_| async { Ok(json!("pong")) })
        .build();
    let api = ApiHandle::new("net", methods);
    api.seal();
    assert!(api.is_sealed());

    let extra = Api::new().method("extra", |_| async { Ok(json!(null)) }).build();
    let (name, method) = extra.into_iter().next().unwrap();
    let err = api.insert(&name, method).unwrap_err();
    assert!(matches!(err, PluginSystemError::SealedApi { .. }));

    assert_eq!(api.invoke("ping", json!(null)).await.unwrap(), json!("pong"));
}

#[test]
fn method_names_are_sorted() {
    let methods = Api::new()
        .method("zeta", |_| async { Ok(json!(null)) })
        .method("alpha", |_| async { Ok(json!(null)) })
        .build();
    let api = ApiHandle::new("x", methods);
    assert_eq!(api.method_names(), vec!["alpha", "zeta"]);
}
