// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Execution sandbox for evaluated modules.
//!
//! Every top-level load gets its own [`ExecutionContext`]. A context owns:
//! - the globals injected through [`SandboxConfig`]
//! - a table of host-module snapshots, filled on first reference
//!
//! Nothing in a context is shared with other contexts, so concurrent loads
//! in one process cannot observe each other's state.

mod host;
mod meta;

pub use host::{HostModuleFactory, HostModules, ENV_MODULE, PATH_MODULE};
pub use meta::ImportMeta;

use crate::error::{LoaderError, Result};
use crate::value::{Namespace, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Named globals visible to every module evaluated in a context
#[derive(Debug, Clone, Default)]
pub struct SandboxConfig {
    globals: BTreeMap<String, Value>,
}

impl SandboxConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global binding
    pub fn with_global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    /// Build from JSON values, as read from configuration files
    pub fn from_json_globals<'a, I>(globals: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a serde_json::Value)>,
    {
        Self {
            globals: globals
                .into_iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
        }
    }

    /// Look up a global
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// All globals, ordered by name
    pub fn globals(&self) -> &BTreeMap<String, Value> {
        &self.globals
    }
}

/// A host module wrapped as a pre-evaluated unit.
///
/// Its bindings were snapshotted once when the context first referenced it.
/// It has no imports of its own and cannot be linked.
#[derive(Debug)]
pub struct SyntheticModule {
    name: String,
    namespace: Arc<Namespace>,
    context_id: Uuid,
}

impl SyntheticModule {
    /// Host module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frozen bindings
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Context that owns this snapshot
    pub fn context_id(&self) -> Uuid {
        self.context_id
    }

    /// Synthetic modules are already evaluated; asking one to link imports
    /// is a defect in the caller.
    ///
    /// The loader never links through a host module itself. This guard is
    /// for embedders walking a linked graph, and is what
    /// [`LinkedModule::requests`](crate::LinkedModule::requests) reports for
    /// a host module.
    pub fn link(&self) -> Result<()> {
        Err(LoaderError::HostModuleRelink(self.name.clone()))
    }
}

/// An isolated evaluation environment for one top-level load.
pub struct ExecutionContext {
    id: Uuid,
    config: SandboxConfig,
    host_modules: Arc<HostModules>,
    /// Host module name to snapshot, populated on first reference
    synthetic: RefCell<HashMap<String, Arc<SyntheticModule>>>,
}

impl ExecutionContext {
    pub(crate) fn new(config: SandboxConfig, host_modules: Arc<HostModules>) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!("Created execution context {}", id);
        Self {
            id,
            config,
            host_modules,
            synthetic: RefCell::new(HashMap::new()),
        }
    }

    /// Unique id of this context
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Sandbox configuration the context was created with
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Look up an injected global
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.config.global(name)
    }

    /// Get the context's snapshot of a host module, creating it on first use.
    ///
    /// Repeated calls return the same snapshot; the host factory runs at most
    /// once per context.
    pub fn host_module(&self, name: &str) -> Result<Arc<SyntheticModule>> {
        if let Some(module) = self.synthetic.borrow().get(name) {
            return Ok(Arc::clone(module));
        }

        let namespace = self
            .host_modules
            .instantiate(name, &self.config)
            .ok_or_else(|| LoaderError::HostModuleNotFound(name.to_string()))?;
        tracing::debug!("Wrapped host module '{}' in context {}", name, self.id);

        let module = Arc::new(SyntheticModule {
            name: name.to_string(),
            namespace: Arc::new(namespace),
            context_id: self.id,
        });
        self.synthetic
            .borrow_mut()
            .insert(name.to_string(), Arc::clone(&module));
        Ok(module)
    }

    /// Number of host modules wrapped so far
    pub fn wrapped_host_modules(&self) -> usize {
        self.synthetic.borrow().len()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("globals", &self.config.globals.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_registry(counter: Arc<AtomicUsize>) -> Arc<HostModules> {
        let mut modules = HostModules::new();
        modules.register("counter", move |_config: &SandboxConfig| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Namespace::from_iter([("calls".to_string(), Value::Number(n as f64 + 1.0))])
        });
        Arc::new(modules)
    }

    #[test]
    fn test_host_module_snapshot_is_reused() {
        let counter = Arc::new(AtomicUsize::new(0));
        let context = ExecutionContext::new(SandboxConfig::new(), counting_registry(counter.clone()));

        let first = context.host_module("counter").unwrap();
        let second = context.host_module("counter").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.namespace().get("calls"), Some(&Value::Number(1.0)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(context.wrapped_host_modules(), 1);
    }

    #[test]
    fn test_contexts_do_not_share_snapshots() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(counter.clone());
        let a = ExecutionContext::new(SandboxConfig::new(), Arc::clone(&registry));
        let b = ExecutionContext::new(SandboxConfig::new(), registry);

        let from_a = a.host_module("counter").unwrap();
        let from_b = b.host_module("counter").unwrap();

        assert_ne!(a.id(), b.id());
        assert!(!Arc::ptr_eq(&from_a, &from_b));
        assert_eq!(from_b.context_id(), b.id());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_synthetic_module_refuses_to_link() {
        let context = ExecutionContext::new(SandboxConfig::new(), Arc::new(HostModules::with_builtins()));
        let module = context.host_module(PATH_MODULE).unwrap();
        assert!(matches!(module.link(), Err(LoaderError::HostModuleRelink(name)) if name == PATH_MODULE));
    }

    #[test]
    fn test_unknown_host_module() {
        let context = ExecutionContext::new(SandboxConfig::new(), Arc::new(HostModules::new()));
        assert!(matches!(
            context.host_module("nope"),
            Err(LoaderError::HostModuleNotFound(_))
        ));
    }
}
