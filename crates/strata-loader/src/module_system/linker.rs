// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Recursive module linking for a single top-level load.
//!
//! Linking a module:
//! 1. Host specifiers bypass the cache and the chain.
//! 2. Everything else is resolved to a URL and checked against the chain.
//! 3. A cached link is shared. Otherwise a build task is spawned and its
//!    handle published to the cache before the task first runs.
//! 4. The build reads, compiles, links all requests concurrently, then
//!    evaluates.
//!
//! Every build is its own task on the [`LinkSession`]'s `LocalSet`. A parent
//! only ever polls the join handles of its children, so polling never
//! descends more than one level into the graph however deep it is.
//!
//! A [`Linker`] lives exactly as long as one load. Its tasks run on the
//! current thread; nothing here is `Send`.

use super::cache::{ModuleCache, PendingModule};
use super::chain::{CycleGuard, ModuleChain};
use super::record::{CompiledModule, LinkedModule};
use super::resolver::{ModuleResolver, ResolveResult};
use super::source_loader::SourceLoader;
use crate::error::{LoaderError, ModuleLoadingError, Result};
use crate::sandbox::ExecutionContext;
use futures::future::{try_join_all, LocalBoxFuture};
use futures::FutureExt;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use tokio::task::LocalSet;
use tracing::{debug, trace};
use url::Url;

pub(crate) struct Linker {
    resolver: ModuleResolver,
    sources: Arc<dyn SourceLoader>,
    context: ExecutionContext,
    cache: ModuleCache,
    guard: CycleGuard,
}

impl Linker {
    pub(crate) fn new(
        resolver: ModuleResolver,
        sources: Arc<dyn SourceLoader>,
        context: ExecutionContext,
    ) -> Rc<Self> {
        Rc::new(Self {
            resolver,
            sources,
            context,
            cache: ModuleCache::new(),
            guard: CycleGuard::new(),
        })
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Number of distinct source modules seen so far
    pub(crate) fn module_count(&self) -> usize {
        self.cache.len()
    }

    /// Link `specifier` as imported by `referrer`.
    ///
    /// `chain` holds the modules on the path from the root of the load to
    /// `referrer`; it is empty for the entry module.
    pub(crate) fn link(
        self: &Rc<Self>,
        specifier: String,
        referrer: Url,
        chain: ModuleChain,
    ) -> LocalBoxFuture<'static, Result<LinkedModule>> {
        let linker = Rc::clone(self);
        async move {
            let url = match linker.resolver.resolve(&specifier, &referrer)? {
                ResolveResult::Host(name) => {
                    trace!("Linking host module '{}'", name);
                    return linker.context.host_module(&name).map(LinkedModule::Host);
                }
                ResolveResult::Module(url) => url,
            };

            linker.guard.check_chain(&chain, &url)?;

            let entry = match linker.cache.get(&url) {
                Some(entry) => {
                    trace!("Module cache hit for {}", url);
                    let pending = linker.cache.is_pending(&url);
                    linker
                        .guard
                        .wait_for(&chain, &url, pending, |u| linker.cache.is_pending(u))?;
                    entry
                }
                None => {
                    debug!("Loading module {}", url);
                    let entry = linker.spawn_build(specifier, url.clone(), chain.clone());
                    linker.cache.publish(url.clone(), entry.clone());
                    linker
                        .guard
                        .wait_for(&chain, &url, false, |u| linker.cache.is_pending(u))?;
                    entry
                }
            };

            entry.await
        }
        .boxed_local()
    }

    /// Start building `url` on the current `LocalSet`.
    ///
    /// The task does not run before the caller next yields, which leaves
    /// room to publish the returned entry first.
    fn spawn_build(
        self: &Rc<Self>,
        specifier: String,
        url: Url,
        chain: ModuleChain,
    ) -> PendingModule {
        let linker = Rc::clone(self);
        let task_url = url.clone();
        let handle = tokio::task::spawn_local(async move {
            let result = Linker::build(&linker, specifier, &task_url, chain).await;
            linker.cache.settle(&task_url);
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => Err(LoaderError::Cancelled(url.to_string())),
            }
        }
        .boxed_local()
        .shared()
    }

    async fn build(
        linker: &Rc<Self>,
        specifier: String,
        url: &Url,
        chain: ModuleChain,
    ) -> Result<LinkedModule> {
        let source_text = linker.sources.read(url).await.map_err(|err| {
            debug!("Failed to read {}: {}", url, err);
            ModuleLoadingError::file_read(chain.to_vec(), url.clone(), err)
        })?;

        let compiled = CompiledModule::compile(
            specifier,
            url.clone(),
            source_text,
            chain.is_empty(),
            &linker.resolver,
        )?;

        let child_chain = chain.extended(url.clone());
        let children = try_join_all(
            compiled
                .requests()
                .iter()
                .map(|request| linker.link(request.clone(), url.clone(), child_chain.clone())),
        )
        .await?;

        let dependencies: HashMap<String, LinkedModule> = compiled
            .requests()
            .iter()
            .cloned()
            .zip(children)
            .collect();

        let record = compiled.evaluate(&linker.context, &dependencies)?;
        trace!("Linked {}", url);
        Ok(LinkedModule::Source(Arc::new(record)))
    }

    /// Drop cached links and wait edges when a load ends.
    pub(crate) fn discard(&self) {
        self.cache.clear();
        self.guard.clear();
    }
}

/// One top-level load: the linker plus the `LocalSet` its build tasks run
/// on.
///
/// Dropping the session discards the linker's state and any build tasks
/// still in flight.
pub(crate) struct LinkSession {
    linker: Rc<Linker>,
    tasks: LocalSet,
}

impl LinkSession {
    pub(crate) fn new(linker: Rc<Linker>) -> Self {
        Self {
            linker,
            tasks: LocalSet::new(),
        }
    }

    pub(crate) fn linker(&self) -> &Rc<Linker> {
        &self.linker
    }

    /// Link the entry module of the load
    pub(crate) async fn link_entry(&self, specifier: &str, referrer: &Url) -> Result<LinkedModule> {
        self.tasks
            .run_until(self.linker.link(specifier.to_string(), referrer.clone(), ModuleChain::new()))
            .await
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        trace!("Ending link session with {} modules", self.linker.module_count());
        self.linker.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import_map::ImportMap;
    use crate::module_system::MemorySourceLoader;
    use crate::sandbox::{HostModules, SandboxConfig};

    fn url(path: &str) -> Url {
        Url::parse(&format!("file:///app/{}", path)).unwrap()
    }

    fn linker(sources: Arc<MemorySourceLoader>) -> Rc<Linker> {
        let hosts = Arc::new(HostModules::with_builtins());
        let resolver = ModuleResolver::new(
            Arc::new(ImportMap::new().parse(&url(""))),
            Arc::clone(&hosts),
        );
        Linker::new(
            resolver,
            sources,
            ExecutionContext::new(SandboxConfig::new(), hosts),
        )
    }

    #[tokio::test]
    async fn test_diamond_reads_shared_module_once() {
        let sources = Arc::new(
            MemorySourceLoader::new()
                .with_module(url("main.js"), "import './b.js'; import './c.js';")
                .with_module(url("b.js"), "import * as d from './d.js'; export { d };")
                .with_module(url("c.js"), "import * as d from './d.js'; export { d };")
                .with_module(url("d.js"), "export const value = 1;"),
        );
        let linker = linker(Arc::clone(&sources));
        let session = LinkSession::new(Rc::clone(&linker));

        let module = session.link_entry("./main.js", &url("")).await.unwrap();

        let record = module.as_source().unwrap();
        assert_eq!(record.requests(), &["./b.js".to_string(), "./c.js".to_string()]);
        assert_eq!(sources.read_count(&url("d.js")), 1);
        assert_eq!(linker.module_count(), 4);

        drop(session);
        assert_eq!(linker.module_count(), 0);
        assert_eq!(Rc::strong_count(&linker), 1);
    }

    #[tokio::test]
    async fn test_self_import_is_circular() {
        let sources = Arc::new(
            MemorySourceLoader::new().with_module(url("self.js"), "import './self.js';"),
        );
        let session = LinkSession::new(linker(sources));

        let err = session.link_entry("./self.js", &url("")).await.unwrap_err();

        let loading = err.as_module_loading().unwrap();
        assert!(err.is_circular_dependency());
        assert_eq!(loading.module_ids(), &[url("self.js")]);
        assert_eq!(loading.target_module(), &url("self.js"));
    }

    #[tokio::test]
    async fn test_host_modules_skip_cache() {
        let sources = Arc::new(
            MemorySourceLoader::new()
                .with_module(url("main.js"), "import { sep } from 'strata:path'; export { sep };"),
        );
        let linker = linker(Arc::clone(&sources));
        let session = LinkSession::new(Rc::clone(&linker));

        session.link_entry("./main.js", &url("")).await.unwrap();

        assert_eq!(linker.module_count(), 1);
        assert_eq!(linker.context().wrapped_host_modules(), 1);
        assert_eq!(sources.total_reads(), 1);
    }
}
