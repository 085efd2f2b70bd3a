use std::collections::HashMap;
use std::sync::Arc;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::plugin::Plugin;

/// User ordering directives supplied at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOrder {
    /// Plugins this one must precede.
    pub before: Vec<String>,
    /// Plugins this one must follow.
    pub after: Vec<String>,
}

impl PluginOrder {
    pub fn before(names: &[&str]) -> Self {
        Self {
            before: names.iter().map(|n| n.to_string()).collect(),
            after: Vec::new(),
        }
    }

    pub fn after(names: &[&str]) -> Self {
        Self {
            before: Vec::new(),
            after: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn and_before(mut self, names: &[&str]) -> Self {
        self.before.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn and_after(mut self, names: &[&str]) -> Self {
        self.after.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

/// Insertion-ordered registry of plugin instances.
///
/// One primary instance per name; additional registrations of an existing
/// name are either rejected ([`register`](Self::register)) or retained as
/// version candidates for the auto resolution strategy
/// ([`register_candidate`](Self::register_candidate)). User ordering
/// directives are stored only when non-empty.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<Plugin>>,
    index: HashMap<String, usize>,
    candidates: HashMap<String, Vec<Arc<Plugin>>>,
    user_order: HashMap<String, PluginOrder>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Rejects duplicate names.
    pub fn register(
        &mut self,
        plugin: Plugin,
        order: Option<PluginOrder>,
    ) -> Result<(), PluginSystemError> {
        let name = plugin.name().to_string();
        if self.index.contains_key(&name) {
            return Err(PluginSystemError::DuplicatePlugin { name });
        }
        self.index.insert(name.clone(), self.plugins.len());
        self.plugins.push(Arc::new(plugin));
        if let Some(order) = order {
            if !order.is_empty() {
                self.user_order.insert(name, order);
            }
        }
        Ok(())
    }

    /// Register a plugin, keeping repeats of an existing name as version
    /// candidates instead of rejecting them. Used by the auto strategy.
    pub fn register_candidate(&mut self, plugin: Plugin, order: Option<PluginOrder>) {
        let name = plugin.name().to_string();
        if self.index.contains_key(&name) {
            self.candidates.entry(name.clone()).or_default().push(Arc::new(plugin));
            if let Some(order) = order {
                if !order.is_empty() {
                    self.user_order
                        .entry(name)
                        .and_modify(|existing| {
                            existing.before.extend(order.before.iter().cloned());
                            existing.after.extend(order.after.iter().cloned());
                        })
                        .or_insert(order);
                }
            }
        } else {
            // First registration under this name; cannot fail.
            let _ = self.register(plugin, order);
        }
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The primary instance registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.index.get(name).map(|i| Arc::clone(&self.plugins[*i]))
    }

    /// Plugins in insertion order.
    pub fn list(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    /// Plugin names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    /// Every instance registered under `name`: the primary first, then
    /// candidates in registration order.
    pub fn candidates_for(&self, name: &str) -> Vec<Arc<Plugin>> {
        let mut all = Vec::new();
        if let Some(primary) = self.get(name) {
            all.push(primary);
        }
        if let Some(extra) = self.candidates.get(name) {
            all.extend(extra.iter().cloned());
        }
        all
    }

    /// Whether any name has more than one registered instance.
    pub fn has_candidates(&self, name: &str) -> bool {
        self.candidates.get(name).is_some_and(|c| !c.is_empty())
    }

    pub fn user_order(&self, name: &str) -> Option<&PluginOrder> {
        self.user_order.get(name)
    }

    pub fn user_orders(&self) -> &HashMap<String, PluginOrder> {
        &self.user_order
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Drop everything. Test harnesses only.
    pub fn clear(&mut self) {
        self.plugins.clear();
        self.index.clear();
        self.candidates.clear();
        self.user_order.clear();
    }
}
