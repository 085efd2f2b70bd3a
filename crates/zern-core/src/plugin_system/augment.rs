use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::error_bus::{ErrorBus, ErrorReport};
use crate::kernel::constants::{KERNEL_NAMESPACE, MULTIPLE_AUGMENTS_KIND};
use crate::plugin_system::plugin::{ApiDefinition, ApiHandle, AugmentContext, Plugin};

/// Composes plugin API surfaces.
///
/// Two-pass composition: every plugin's own `setup` output becomes an
/// unsealed [`ApiHandle`] first; then, in resolved init order, each
/// plugin's declared augmentations are folded into their targets. A
/// contribution may close over the augmenting plugin's own surface via
/// the [`AugmentContext`] supplied at merge time, so no runtime cycle
/// exists in the data. Collisions resolve last-writer-wins in resolved
/// order, and every overwrite emits a `MultipleAugments` warning on the
/// error bus. All surfaces are sealed before publication.
pub struct AugmentationMerger;

impl AugmentationMerger {
    pub async fn merge(
        order: &[String],
        plugins: &HashMap<String, Arc<Plugin>>,
        setups: HashMap<String, ApiDefinition>,
        errors: &ErrorBus,
    ) -> HashMap<String, Arc<ApiHandle>> {
        let mut setups = setups;

        let mut apis: HashMap<String, Arc<ApiHandle>> = HashMap::new();
        for name in order {
            let methods = setups.remove(name).unwrap_or_default();
            apis.insert(name.clone(), Arc::new(ApiHandle::new(name, methods)));
        }

        for name in order {
            let Some(plugin) = plugins.get(name) else { continue };
            let Some(own_api) = apis.get(name).cloned() else { continue };

            for augmentation in plugin.augments() {
                let Some(target_api) = apis.get(&augmentation.target).cloned() else {
                    log::warn!(
                        "plugin '{}' augments unknown plugin '{}'; contribution dropped",
                        name,
                        augmentation.target
                    );
                    continue;
                };

                let ctx = AugmentContext {
                    augmenter: name.clone(),
                    target: augmentation.target.clone(),
                    augmenter_api: Arc::clone(&own_api),
                };
                for (method, callable) in (augmentation.build)(&ctx) {
                    match target_api.insert(&method, callable) {
                        Ok(true) => {
                            errors
                                .report(
                                    ErrorReport::new(
                                        KERNEL_NAMESPACE,
                                        MULTIPLE_AUGMENTS_KIND,
                                        format!(
                                            "method '{}' on plugin '{}' overwritten by augmenter '{}'",
                                            method, augmentation.target, name
                                        ),
                                    )
                                    .with_meta(json!({
                                        "target": augmentation.target,
                                        "method": method,
                                        "augmenter": name,
                                    })),
                                )
                                .await;
                        }
                        Ok(false) => {}
                        Err(err) => {
                            log::error!("augmentation of '{}' failed: {err}", augmentation.target);
                        }
                    }
                }
            }
        }

        for api in apis.values() {
            api.seal();
        }
        apis
    }
}
