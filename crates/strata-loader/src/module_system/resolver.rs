// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier resolution: host modules, then the import map, then URL joining.

use crate::error::{LoaderError, Result};
use crate::import_map::{parse_url_like, ParsedImportMap};
use crate::sandbox::HostModules;
use std::sync::Arc;
use url::Url;

/// Result of module resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// Host module, by registered name
    Host(String),
    /// Source module identified by its absolute URL
    Module(Url),
}

impl ResolveResult {
    /// The resolved form as import code would see it: the host name or the URL
    pub fn as_str(&self) -> &str {
        match self {
            ResolveResult::Host(name) => name,
            ResolveResult::Module(url) => url.as_str(),
        }
    }
}

/// Module resolver combining host modules and an import map
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    import_map: Arc<ParsedImportMap>,
    host_modules: Arc<HostModules>,
}

impl ModuleResolver {
    /// Create a new module resolver
    pub fn new(import_map: Arc<ParsedImportMap>, host_modules: Arc<HostModules>) -> Self {
        Self {
            import_map,
            host_modules,
        }
    }

    /// The parsed import map in use
    pub fn import_map(&self) -> &ParsedImportMap {
        &self.import_map
    }

    /// Registered host modules
    pub fn host_modules(&self) -> &Arc<HostModules> {
        &self.host_modules
    }

    /// Check if a specifier names a host module
    pub fn is_host_module(&self, specifier: &str) -> bool {
        self.host_modules.contains(specifier)
    }

    /// Resolve a specifier from the importing module at `referrer`
    pub fn resolve(&self, specifier: &str, referrer: &Url) -> Result<ResolveResult> {
        if self.is_host_module(specifier) {
            return Ok(ResolveResult::Host(specifier.to_string()));
        }
        self.resolve_url(specifier, referrer).map(ResolveResult::Module)
    }

    /// Resolve a source-module specifier to its URL, ignoring host modules
    pub fn resolve_url(&self, specifier: &str, referrer: &Url) -> Result<Url> {
        if let Some(url) = self.import_map.resolve(specifier, referrer) {
            tracing::trace!("Import map resolved '{}' to {}", specifier, url);
            return Ok(url);
        }

        parse_url_like(specifier, referrer).ok_or_else(|| LoaderError::Resolution {
            specifier: specifier.to_string(),
            referrer: referrer.to_string(),
            reason: "bare specifier is not mapped by the import map".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import_map::ImportMap;
    use crate::sandbox::PATH_MODULE;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn resolver(map: ImportMap) -> ModuleResolver {
        ModuleResolver::new(
            Arc::new(map.parse(&url("file:///root/"))),
            Arc::new(HostModules::with_builtins()),
        )
    }

    #[test]
    fn test_host_module_bypasses_import_map() {
        let resolver = resolver(ImportMap::new().with_import(PATH_MODULE, "file:///shadow.js"));
        assert_eq!(
            resolver.resolve(PATH_MODULE, &url("file:///root/a.js")).unwrap(),
            ResolveResult::Host(PATH_MODULE.to_string())
        );
    }

    #[test]
    fn test_import_map_then_relative() {
        let resolver = resolver(ImportMap::new().with_import("pkg/", "./src/"));
        let referrer = url("file:///root/main.js");

        assert_eq!(
            resolver.resolve("pkg/a", &referrer).unwrap(),
            ResolveResult::Module(url("file:///root/src/a"))
        );
        assert_eq!(
            resolver.resolve("./lib/b.js", &referrer).unwrap(),
            ResolveResult::Module(url("file:///root/lib/b.js"))
        );
        assert_eq!(
            resolver.resolve("../up.js", &url("file:///root/lib/x.js")).unwrap(),
            ResolveResult::Module(url("file:///root/up.js"))
        );
        assert_eq!(
            resolver.resolve("https://cdn.test/m.js", &referrer).unwrap().as_str(),
            "https://cdn.test/m.js"
        );
    }

    #[test]
    fn test_unmapped_bare_specifier_fails() {
        let resolver = resolver(ImportMap::new());
        let err = resolver.resolve("lodash", &url("file:///root/main.js")).unwrap_err();
        match err {
            LoaderError::Resolution { specifier, referrer, .. } => {
                assert_eq!(specifier, "lodash");
                assert_eq!(referrer, "file:///root/main.js");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
