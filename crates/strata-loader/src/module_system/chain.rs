// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Import chains and cycle detection.
//!
//! Two kinds of cycles are caught before they can hang a load:
//!
//! 1. A module that imports one of its own ancestors. The importing path
//!    (the [`ModuleChain`]) already contains the target.
//! 2. Two sibling branches that each end up waiting on a module the other
//!    one is still building. No single chain shows the loop, so every
//!    "module X is waiting for module Y" edge is recorded in a
//!    [`CycleGuard`] and checked before awaiting an in-flight entry.

use crate::error::{ModuleLoadingError, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use url::Url;

/// Ordered list of module URLs from the root of a load down to the module
/// currently being linked.
///
/// Each branch of the graph owns its own chain; extending one never affects
/// a sibling. Chains share their common prefix, so extending is O(1) however
/// deep the graph gets.
#[derive(Clone, Default)]
pub struct ModuleChain(Option<Rc<ChainNode>>);

struct ChainNode {
    url: Url,
    parent: Option<Rc<ChainNode>>,
    len: usize,
}

impl ModuleChain {
    /// An empty chain, for the entry module
    pub fn new() -> Self {
        Self::default()
    }

    /// This chain with `url` appended
    pub fn extended(&self, url: Url) -> Self {
        Self(Some(Rc::new(ChainNode {
            url,
            parent: self.0.clone(),
            len: self.len() + 1,
        })))
    }

    /// Whether `url` is an ancestor on this path
    pub fn contains(&self, url: &Url) -> bool {
        self.ancestors().any(|u| u == url)
    }

    /// The module currently importing, if any
    pub fn last(&self) -> Option<&Url> {
        self.0.as_deref().map(|node| &node.url)
    }

    /// URLs from leaf to root
    pub fn ancestors(&self) -> impl Iterator<Item = &Url> {
        std::iter::successors(self.0.as_deref(), |node| node.parent.as_deref())
            .map(|node| &node.url)
    }

    /// URLs from root to leaf
    pub fn to_vec(&self) -> Vec<Url> {
        let mut urls: Vec<Url> = self.ancestors().cloned().collect();
        urls.reverse();
        urls
    }

    /// Number of modules on the path
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |node| node.len)
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl PartialEq for ModuleChain {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.ancestors().eq(other.ancestors())
    }
}

impl Eq for ModuleChain {}

impl fmt::Debug for ModuleChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

// Unlinks iteratively; the default drop would recurse once per ancestor.
impl Drop for ChainNode {
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(node) = parent {
            parent = match Rc::try_unwrap(node) {
                Ok(mut node) => node.parent.take(),
                Err(_) => break,
            };
        }
    }
}

/// Wait-for graph over the modules of a single load.
#[derive(Debug, Default)]
pub(crate) struct CycleGuard {
    waits: RefCell<HashMap<Url, HashSet<Url>>>,
}

impl CycleGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail if `target` is already an ancestor on `chain`.
    pub(crate) fn check_chain(&self, chain: &ModuleChain, target: &Url) -> Result<()> {
        if chain.contains(target) {
            tracing::debug!("Import chain re-enters {}", target);
            return Err(circular(chain, target));
        }
        Ok(())
    }

    /// Record that the last module on `chain` waits on `target`.
    ///
    /// When `target` is still in flight, first make sure it is not itself
    /// (transitively) waiting on that module. `is_pending` reports whether a
    /// module's build has not finished yet; finished modules wait on nothing.
    pub(crate) fn wait_for(
        &self,
        chain: &ModuleChain,
        target: &Url,
        target_pending: bool,
        is_pending: impl Fn(&Url) -> bool,
    ) -> Result<()> {
        let Some(waiter) = chain.last() else {
            return Ok(());
        };

        if target_pending && self.reaches(target, waiter, &is_pending) {
            tracing::debug!("{} and {} wait on each other", waiter, target);
            return Err(circular(chain, target));
        }

        self.waits
            .borrow_mut()
            .entry(waiter.clone())
            .or_default()
            .insert(target.clone());
        Ok(())
    }

    /// Whether `from` waits, directly or transitively, on `to`.
    fn reaches(&self, from: &Url, to: &Url, is_pending: &impl Fn(&Url) -> bool) -> bool {
        let waits = self.waits.borrow();
        let mut stack = vec![from];
        let mut seen: HashSet<&Url> = HashSet::new();

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(next) = waits.get(current) {
                stack.extend(next.iter().filter(|url| is_pending(*url)));
            }
        }
        false
    }

    pub(crate) fn clear(&self) {
        self.waits.borrow_mut().clear();
    }
}

fn circular(chain: &ModuleChain, target: &Url) -> crate::LoaderError {
    ModuleLoadingError::circular_dependency(chain.to_vec(), target.clone()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(name: &str) -> Url {
        Url::parse(&format!("file:///app/{}.js", name)).unwrap()
    }

    fn chain(names: &[&str]) -> ModuleChain {
        names
            .iter()
            .fold(ModuleChain::new(), |chain, name| chain.extended(url(name)))
    }

    #[test]
    fn test_extended_does_not_touch_original() {
        let root = chain(&["a"]);
        let left = root.extended(url("b"));
        let right = root.extended(url("c"));

        assert_eq!(root.len(), 1);
        assert_eq!(left.to_vec(), vec![url("a"), url("b")]);
        assert_eq!(right.last(), Some(&url("c")));
    }

    #[test]
    fn test_deep_chain() {
        let deep = (0..10_000).fold(ModuleChain::new(), |chain, i| {
            chain.extended(url(&format!("m{}", i)))
        });

        assert_eq!(deep.len(), 10_000);
        assert_eq!(deep.last(), Some(&url("m9999")));
        assert!(deep.contains(&url("m0")));
        assert_eq!(deep.to_vec().first(), Some(&url("m0")));

        let branch = deep.extended(url("leaf"));
        drop(deep);
        assert_eq!(branch.len(), 10_001);
        drop(branch);
    }

    #[test]
    fn test_chain_reentry_is_circular() {
        let guard = CycleGuard::new();
        let err = guard.check_chain(&chain(&["a", "b", "c"]), &url("a")).unwrap_err();
        let loading = err.as_module_loading().unwrap();

        assert!(err.is_circular_dependency());
        assert_eq!(loading.module_ids(), &[url("a"), url("b"), url("c")]);
        assert_eq!(loading.target_module(), &url("a"));
        assert!(guard.check_chain(&chain(&["a", "b"]), &url("c")).is_ok());
    }

    #[test]
    fn test_mutual_wait_is_circular() {
        let guard = CycleGuard::new();
        let always = |_: &Url| true;

        // main -> b, main -> c, b -> c
        guard.wait_for(&chain(&["main"]), &url("b"), true, always).unwrap();
        guard.wait_for(&chain(&["main"]), &url("c"), true, always).unwrap();
        guard.wait_for(&chain(&["main", "b"]), &url("c"), true, always).unwrap();

        // c -> b would close the loop b -> c -> b
        let err = guard
            .wait_for(&chain(&["main", "c"]), &url("b"), true, always)
            .unwrap_err();
        assert_eq!(err.as_module_loading().unwrap().target_module(), &url("b"));
    }

    #[test]
    fn test_finished_modules_never_close_a_loop() {
        let guard = CycleGuard::new();
        guard.wait_for(&chain(&["b"]), &url("c"), true, |_| true).unwrap();

        // c waiting on b is fine once b has finished
        assert!(guard.wait_for(&chain(&["c"]), &url("b"), false, |_| true).is_ok());

        // or when the path b -> c only runs through finished modules
        let guard = CycleGuard::new();
        guard.wait_for(&chain(&["b"]), &url("c"), true, |_| true).unwrap();
        assert!(guard
            .wait_for(&chain(&["c"]), &url("b"), true, |u| *u != url("c"))
            .is_ok());
    }
}
