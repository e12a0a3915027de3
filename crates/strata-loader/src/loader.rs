// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The module loader: entry point for top-level loads.

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::import_map::{ImportMap, ParsedImportMap};
use crate::module_system::linker::{LinkSession, Linker};
use crate::module_system::{
    FsSourceLoader, LinkedModule, ModuleResolver, ResolveResult, SourceLoader,
};
use crate::sandbox::{ExecutionContext, HostModules, SandboxConfig};
use crate::value::Namespace;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Loads module graphs into fresh execution contexts.
///
/// A loader is cheap to clone and holds only immutable state: the parsed
/// import map, the host module registry and the source loader. Every call
/// to [`ModuleLoader::load`] gets its own context and its own module cache,
/// so concurrent loads never share evaluated modules.
///
/// Loads are not `Send`: each one runs its module builds as local tasks on
/// its own `LocalSet`, driven by the calling task. Await them on a
/// current-thread runtime or inside a `LocalSet`.
#[derive(Clone)]
pub struct ModuleLoader {
    resolver: ModuleResolver,
    sources: Arc<dyn SourceLoader>,
}

impl ModuleLoader {
    /// Create a loader reading from the file system with the built-in host
    /// modules
    pub fn new(import_map: &ImportMap, base_url: &Url) -> Self {
        Self::builder(base_url.clone()).import_map(import_map.clone()).build()
    }

    /// Start building a loader whose import map is relative to `base_url`
    pub fn builder(base_url: Url) -> ModuleLoaderBuilder {
        ModuleLoaderBuilder::new(base_url)
    }

    /// Build a loader from configuration for the project in `project_dir`
    pub fn from_config(config: &LoaderConfig, project_dir: &Path) -> Result<Self> {
        let base_url = config.base_url(project_dir)?;
        let import_map = config.import_map()?;
        Ok(Self::builder(base_url).import_map(import_map).build())
    }

    /// The parsed import map
    pub fn import_map(&self) -> &ParsedImportMap {
        self.resolver.import_map()
    }

    /// The resolver used for every import
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Resolve a specifier without loading anything
    pub fn resolve(&self, specifier: &str, referrer: &Url) -> Result<ResolveResult> {
        self.resolver.resolve(specifier, referrer)
    }

    /// Create a fresh execution context.
    ///
    /// Pass it to [`ModuleLoader::load_in_context`]; a context serves exactly
    /// one load.
    pub fn create_context(&self, config: SandboxConfig) -> ExecutionContext {
        ExecutionContext::new(config, Arc::clone(self.resolver.host_modules()))
    }

    /// Load `entry` as imported from `parent` in a new context and return
    /// its namespace
    pub async fn load(&self, entry: &str, parent: &Url, config: SandboxConfig) -> Result<Arc<Namespace>> {
        let context = self.create_context(config);
        self.load_in_context(entry, parent, context).await
    }

    /// Load `entry` into an existing, unused context
    pub async fn load_in_context(
        &self,
        entry: &str,
        parent: &Url,
        context: ExecutionContext,
    ) -> Result<Arc<Namespace>> {
        let module = self.load_module(entry, parent, context).await?;
        Ok(Arc::clone(module.namespace()))
    }

    /// Load `entry` and return the linked module itself
    pub async fn load_module(
        &self,
        entry: &str,
        parent: &Url,
        context: ExecutionContext,
    ) -> Result<LinkedModule> {
        let context_id = context.id();
        tracing::debug!("Loading '{}' from {} in context {}", entry, parent, context_id);

        let session = LinkSession::new(Linker::new(
            self.resolver.clone(),
            Arc::clone(&self.sources),
            context,
        ));
        let result = session.link_entry(entry, parent).await;

        match &result {
            Ok(_) => tracing::debug!(
                "Loaded '{}' ({} modules) in context {}",
                entry,
                session.linker().module_count(),
                context_id
            ),
            Err(err) => tracing::debug!("Failed to load '{}': {}", entry, err),
        }
        result
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ModuleLoader`]
pub struct ModuleLoaderBuilder {
    base_url: Url,
    import_map: ImportMap,
    host_modules: HostModules,
    sources: Option<Arc<dyn SourceLoader>>,
}

impl ModuleLoaderBuilder {
    fn new(base_url: Url) -> Self {
        Self {
            base_url,
            import_map: ImportMap::new(),
            host_modules: HostModules::with_builtins(),
            sources: None,
        }
    }

    /// Use an import map
    pub fn import_map(mut self, import_map: ImportMap) -> Self {
        self.import_map = import_map;
        self
    }

    /// Replace the host module registry
    pub fn host_modules(mut self, host_modules: HostModules) -> Self {
        self.host_modules = host_modules;
        self
    }

    /// Read module sources from somewhere other than the file system
    pub fn source_loader(mut self, sources: Arc<dyn SourceLoader>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Build the loader
    pub fn build(self) -> ModuleLoader {
        let import_map = self.import_map.parse(&self.base_url);
        tracing::debug!(
            "Import map has {} top-level entries and {} scopes",
            import_map.import_count(),
            import_map.scope_prefixes().count()
        );

        ModuleLoader {
            resolver: ModuleResolver::new(Arc::new(import_map), Arc::new(self.host_modules)),
            sources: self
                .sources
                .unwrap_or_else(|| Arc::new(FsSourceLoader::new())),
        }
    }
}
