//! Rule registry: a process-wide, read-only map from rule name to
//! implementation, populated once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::rules::Rule;

/// Immutable name → rule map with constant-time lookup.
///
/// Built once by the host (usually from the built-in rule set plus any
/// custom rules) and shared by reference across all evaluations. A rule
/// referenced by configuration but missing here is rejected by
/// [`RuleConfig::validate`](crate::config::RuleConfig::validate) before
/// the process starts serving.
#[derive(Default)]
pub struct RuleRegistry {
    rules: HashMap<&'static str, Arc<dyn Rule>>,
}

impl RuleRegistry {
    pub fn builder() -> RuleRegistryBuilder {
        RuleRegistryBuilder {
            registry: Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.get(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered rule names in sorted order, for diagnostics.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.rules.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Builder-style population; the finished registry is immutable.
pub struct RuleRegistryBuilder {
    registry: RuleRegistry,
}

impl RuleRegistryBuilder {
    /// Register a rule under its own name. A second registration under the
    /// same name replaces the first; the last one wins.
    pub fn register(mut self, rule: impl Rule) -> Self {
        self.registry.rules.insert(rule.name(), Arc::new(rule));
        self
    }

    pub fn register_arc(mut self, rule: Arc<dyn Rule>) -> Self {
        self.registry.rules.insert(rule.name(), rule);
        self
    }

    pub fn build(self) -> RuleRegistry {
        self.registry
    }
}
