// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-load module cache.
//!
//! Entries are in-flight link operations, not finished modules. An entry is
//! published before its build task first runs, so every importer of the same
//! URL within the load shares one read, one compile and one evaluation.

use super::record::LinkedModule;
use crate::error::Result;
use futures::future::{LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use url::Url;

/// A shared, possibly unfinished, link of one module
pub(crate) type PendingModule = Shared<LocalBoxFuture<'static, Result<LinkedModule>>>;

/// Cache mapping module URLs to their link operation
#[derive(Default)]
pub(crate) struct ModuleCache {
    entries: RefCell<HashMap<Url, PendingModule>>,
    /// Modules whose build task has finished, successfully or not
    settled: RefCell<HashSet<Url>>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get the link operation for a URL
    pub(crate) fn get(&self, url: &Url) -> Option<PendingModule> {
        self.entries.borrow().get(url).cloned()
    }

    /// Publish a link operation.
    ///
    /// Callers check [`ModuleCache::get`] first; a URL is published at most
    /// once per load.
    pub(crate) fn publish(&self, url: Url, entry: PendingModule) {
        let previous = self.entries.borrow_mut().insert(url, entry);
        debug_assert!(previous.is_none(), "module published twice");
    }

    /// Mark the build of `url` as finished
    pub(crate) fn settle(&self, url: &Url) {
        self.settled.borrow_mut().insert(url.clone());
    }

    /// Whether a URL is cached with an unfinished link
    pub(crate) fn is_pending(&self, url: &Url) -> bool {
        self.entries.borrow().contains_key(url) && !self.settled.borrow().contains(url)
    }

    /// Get the number of cached modules
    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Drop every entry.
    ///
    /// In-flight futures are dropped outside the borrow since their captured
    /// state may refer back to the owner of this cache.
    pub(crate) fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        drop(entries);
        self.settled.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoaderError;
    use futures::FutureExt;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn failing(message: &str) -> PendingModule {
        let err = LoaderError::Config(message.to_string());
        async move { Err(err) }.boxed_local().shared()
    }

    #[tokio::test]
    async fn test_publish_and_share() {
        let cache = ModuleCache::new();
        let a = url("file:///a.js");

        assert!(cache.get(&a).is_none());
        cache.publish(a.clone(), failing("boom"));

        assert!(cache.is_pending(&a));
        let first = cache.get(&a).unwrap().await;
        assert!(cache.is_pending(&a));
        cache.settle(&a);
        assert!(!cache.is_pending(&a));
        let second = cache.get(&a).unwrap().await;

        assert_eq!(first.unwrap_err().to_string(), second.unwrap_err().to_string());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = ModuleCache::new();
        cache.publish(url("file:///a.js"), failing("a"));
        cache.publish(url("file:///b.js"), failing("b"));
        cache.settle(&url("file:///a.js"));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(!cache.is_pending(&url("file:///a.js")));

        // a republished URL starts out pending again
        cache.publish(url("file:///a.js"), failing("a"));
        assert!(cache.is_pending(&url("file:///a.js")));
    }
}
