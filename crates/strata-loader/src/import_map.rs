// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Import maps: bare and prefixed specifier remapping with scopes.
//!
//! An [`ImportMap`] is the raw document. [`ImportMap::parse`] normalizes it
//! against a base URL into a [`ParsedImportMap`], which keeps every key list
//! pre-sorted so a lookup is one exact match plus a longest-first scan.
//!
//! Precedence when resolving a specifier:
//! 1. scopes whose prefix the referrer starts with, longest prefix first
//! 2. the top-level `imports`
//!
//! and within each specifier map an exact key beats the longest matching
//! `/`-terminated prefix key.

use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Insertion-ordered specifier (or prefix) to target URL table
pub type SpecifierMap = IndexMap<String, String>;

/// Scope prefix to nested specifier map
pub type ScopesMap = IndexMap<String, SpecifierMap>;

/// Import map document as written by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    /// Top-level mappings
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub imports: SpecifierMap,
    /// Mappings that only apply to referrers under a prefix
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub scopes: ScopesMap,
}

impl ImportMap {
    /// Create an empty import map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an import map from JSON text.
    ///
    /// Only the top-level shape is validated. Entries whose value is not a
    /// string are skipped, the same way unparsable targets are skipped by
    /// [`parse`](Self::parse).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(top) = value else {
            return Err(crate::LoaderError::ImportMap(
                "top-level value must be a JSON object".to_string(),
            ));
        };

        let mut map = ImportMap::new();
        if let Some(imports) = top.get("imports") {
            map.imports = specifier_map_from_json(imports, "imports")?;
        }
        if let Some(scopes) = top.get("scopes") {
            let serde_json::Value::Object(scopes) = scopes else {
                return Err(crate::LoaderError::ImportMap(
                    "\"scopes\" must be a JSON object".to_string(),
                ));
            };
            for (prefix, nested) in scopes {
                let nested = specifier_map_from_json(nested, prefix)?;
                map.scopes.insert(prefix.clone(), nested);
            }
        }
        Ok(map)
    }

    /// Read and parse an import map file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Add a top-level mapping
    pub fn with_import(mut self, specifier: impl Into<String>, target: impl Into<String>) -> Self {
        self.imports.insert(specifier.into(), target.into());
        self
    }

    /// Add a scoped mapping
    pub fn with_scoped_import(
        mut self,
        scope: impl Into<String>,
        specifier: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.scopes
            .entry(scope.into())
            .or_default()
            .insert(specifier.into(), target.into());
        self
    }

    /// Normalize every key and target against `base_url`.
    ///
    /// Entries that cannot be normalized are dropped (and logged); they are
    /// simply unreachable afterwards.
    pub fn parse(&self, base_url: &Url) -> ParsedImportMap {
        let imports = SpecifierIndex::build(&self.imports, base_url);

        let mut scopes: Vec<ScopeEntry> = Vec::with_capacity(self.scopes.len());
        for (prefix, nested) in &self.scopes {
            match base_url.join(prefix) {
                Ok(scope_url) => scopes.push(ScopeEntry {
                    prefix: scope_url.into(),
                    map: SpecifierIndex::build(nested, base_url),
                }),
                Err(err) => {
                    tracing::warn!("Ignoring import map scope '{}': {}", prefix, err);
                }
            }
        }
        scopes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        ParsedImportMap {
            base_url: base_url.clone(),
            imports,
            scopes,
        }
    }
}

fn specifier_map_from_json(value: &serde_json::Value, context: &str) -> Result<SpecifierMap> {
    let serde_json::Value::Object(entries) = value else {
        return Err(crate::LoaderError::ImportMap(format!(
            "\"{}\" must map specifiers to URLs",
            context
        )));
    };

    let mut map = SpecifierMap::new();
    for (key, target) in entries {
        match target {
            serde_json::Value::String(target) => {
                map.insert(key.clone(), target.clone());
            }
            other => {
                tracing::warn!("Ignoring import map entry '{}': target {} is not a string", key, other);
            }
        }
    }
    Ok(map)
}

/// An import map normalized against its base URL.
///
/// Immutable once built; one instance is shared by every load of a loader.
#[derive(Debug, Clone)]
pub struct ParsedImportMap {
    base_url: Url,
    imports: SpecifierIndex,
    /// Sorted by prefix length, longest first
    scopes: Vec<ScopeEntry>,
}

#[derive(Debug, Clone)]
struct ScopeEntry {
    prefix: String,
    map: SpecifierIndex,
}

/// Precompiled lookup structure for one specifier map
#[derive(Debug, Clone, Default)]
struct SpecifierIndex {
    exact: HashMap<String, Url>,
    /// `/`-terminated keys sorted by length, longest first
    prefixes: Vec<(String, Url)>,
}

impl SpecifierIndex {
    fn build(map: &SpecifierMap, base_url: &Url) -> Self {
        let mut index = SpecifierIndex::default();

        for (key, target) in map {
            let Some(key) = normalize_specifier_key(key, base_url) else {
                tracing::warn!("Ignoring empty import map specifier key");
                continue;
            };
            let Some(target_url) = parse_url_like(target, base_url) else {
                tracing::warn!("Ignoring import map entry '{}': invalid target '{}'", key, target);
                continue;
            };
            if key.ends_with('/') {
                if !target_url.as_str().ends_with('/') {
                    tracing::warn!(
                        "Ignoring import map entry '{}': prefix target '{}' must end with '/'",
                        key,
                        target
                    );
                    continue;
                }
                index.prefixes.push((key.clone(), target_url.clone()));
            }
            index.exact.insert(key, target_url);
        }

        index.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        index
    }

    fn resolve(&self, normalized: &str) -> Option<Url> {
        if let Some(url) = self.exact.get(normalized) {
            return Some(url.clone());
        }

        let (key, target) = self
            .prefixes
            .iter()
            .find(|(key, _)| normalized.starts_with(key.as_str()))?;

        let after_prefix = &normalized[key.len()..];
        let resolved = Url::parse(&format!("{}{}", target.as_str(), after_prefix)).ok()?;

        // "../" in the remainder must not escape the mapped directory
        if resolved.as_str().starts_with(target.as_str()) {
            Some(resolved)
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        self.exact.len()
    }
}

impl ParsedImportMap {
    /// A map with no entries; every lookup falls through to default resolution
    pub fn empty(base_url: Url) -> Self {
        Self {
            base_url,
            imports: SpecifierIndex::default(),
            scopes: Vec::new(),
        }
    }

    /// The URL the map was normalized against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Number of reachable top-level entries
    pub fn import_count(&self) -> usize {
        self.imports.len()
    }

    /// Normalized scope prefixes, longest first
    pub fn scope_prefixes(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(|s| s.prefix.as_str())
    }

    /// Resolve `specifier` as imported from `referrer`.
    ///
    /// Returns `None` when no entry applies; falling back to default
    /// resolution is the caller's job.
    pub fn resolve(&self, specifier: &str, referrer: &Url) -> Option<Url> {
        let as_url = parse_url_like(specifier, referrer);
        let normalized = as_url.as_ref().map(Url::as_str).unwrap_or(specifier);

        for scope in &self.scopes {
            if !referrer.as_str().starts_with(&scope.prefix) {
                continue;
            }
            if let Some(url) = scope.map.resolve(normalized) {
                return Some(url);
            }
        }

        self.imports.resolve(normalized)
    }
}

/// Whether a specifier is written as a path relative to its referrer
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with('/') || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Parse `/`, `./`, `../` specifiers against `base`, or an absolute URL.
/// Anything else is a bare specifier.
pub fn parse_url_like(specifier: &str, base: &Url) -> Option<Url> {
    if is_relative_specifier(specifier) {
        base.join(specifier).ok()
    } else {
        Url::parse(specifier).ok()
    }
}

fn normalize_specifier_key(key: &str, base_url: &Url) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    Some(match parse_url_like(key, base_url) {
        Some(url) => url.into(),
        None => key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_scope_beats_top_level() {
        let map = ImportMap::new()
            .with_import("x", "file:///global/x.js")
            .with_scoped_import("file:///app/admin/", "x", "file:///scoped/x.js")
            .parse(&url("file:///app/"));

        assert_eq!(
            map.resolve("x", &url("file:///app/admin/page.js")),
            Some(url("file:///scoped/x.js"))
        );
        assert_eq!(
            map.resolve("x", &url("file:///app/public/page.js")),
            Some(url("file:///global/x.js"))
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let map = ImportMap::new()
            .with_import("lib/", "file:///a/")
            .with_import("lib/sub/", "file:///b/")
            .parse(&url("file:///"));

        assert_eq!(
            map.resolve("lib/sub/mod", &url("file:///main.js")),
            Some(url("file:///b/mod"))
        );
        assert_eq!(
            map.resolve("lib/other", &url("file:///main.js")),
            Some(url("file:///a/other"))
        );
    }

    #[test]
    fn test_exact_beats_prefix() {
        let map = ImportMap::new()
            .with_import("react/", "file:///vendor/react/")
            .with_import("react/jsx-runtime", "file:///shims/jsx.js")
            .parse(&url("file:///"));

        assert_eq!(
            map.resolve("react/jsx-runtime", &url("file:///main.js")),
            Some(url("file:///shims/jsx.js"))
        );
    }

    #[test]
    fn test_longest_scope_consulted_first_then_falls_through() {
        let map = ImportMap::new()
            .with_scoped_import("/app/", "a", "/from-app/a.js")
            .with_scoped_import("/app/", "b", "/from-app/b.js")
            .with_scoped_import("/app/nested/", "a", "/from-nested/a.js")
            .with_import("c", "/global/c.js")
            .parse(&url("https://example.com/"));

        let referrer = url("https://example.com/app/nested/index.js");
        assert_eq!(
            map.resolve("a", &referrer),
            Some(url("https://example.com/from-nested/a.js"))
        );
        assert_eq!(
            map.resolve("b", &referrer),
            Some(url("https://example.com/from-app/b.js"))
        );
        assert_eq!(
            map.resolve("c", &referrer),
            Some(url("https://example.com/global/c.js"))
        );
    }

    #[test]
    fn test_no_match_returns_none() {
        let map = ImportMap::new()
            .with_import("known", "file:///known.js")
            .parse(&url("file:///"));

        assert_eq!(map.resolve("unknown", &url("file:///main.js")), None);
        assert_eq!(map.resolve("./local.js", &url("file:///main.js")), None);
    }

    #[test]
    fn test_invalid_targets_are_unreachable() {
        let map = ImportMap::new()
            .with_import("bad", "not a url")
            .with_import("dir/", "file:///no-trailing-slash")
            .parse(&url("file:///"));

        assert_eq!(map.import_count(), 0);
        assert_eq!(map.resolve("bad", &url("file:///main.js")), None);
        assert_eq!(map.resolve("dir/x", &url("file:///main.js")), None);
    }

    #[test]
    fn test_url_like_keys_are_normalized() {
        let map = ImportMap::new()
            .with_import("/app/helper.js", "/app/helper-v2.js")
            .parse(&url("https://example.com/"));

        assert_eq!(
            map.resolve("../app/helper.js", &url("https://example.com/pages/home.js")),
            Some(url("https://example.com/app/helper-v2.js"))
        );
    }

    #[test]
    fn test_prefix_cannot_escape_target() {
        let map = ImportMap::new()
            .with_import("pkg/", "file:///root/src/")
            .parse(&url("file:///"));

        assert_eq!(map.resolve("pkg/../secret.js", &url("file:///main.js")), None);
    }

    #[test]
    fn test_specifiers_are_opaque() {
        let map = ImportMap::new()
            .with_import("ünïcode", "file:///u.js")
            .with_import("pkg/", "file:///root/src/")
            .parse(&url("file:///"));

        assert_eq!(map.resolve("ünïcode", &url("file:///m.js")), Some(url("file:///u.js")));
        let encoded = map.resolve("pkg/a%20b.js", &url("file:///m.js")).unwrap();
        assert_eq!(encoded.as_str(), "file:///root/src/a%20b.js");
    }

    #[test]
    fn test_windows_file_urls_round_trip() {
        let map = ImportMap::new()
            .with_import("lib/", "./vendor/lib/")
            .parse(&url("file:///C:/project/"));

        assert_eq!(
            map.resolve("lib/x.js", &url("file:///C:/project/main.js")),
            Some(url("file:///C:/project/vendor/lib/x.js"))
        );
    }

    #[test]
    fn test_from_json_skips_non_string_targets() {
        let map = ImportMap::from_json_str(
            r#"{
                "imports": { "a": "./a.js", "b": 42 },
                "scopes": { "/admin/": { "a": "./admin-a.js" } }
            }"#,
        )
        .unwrap();

        assert_eq!(map.imports.len(), 1);
        assert_eq!(map.scopes["/admin/"]["a"], "./admin-a.js");
        assert!(ImportMap::from_json_str("[]").is_err());
        assert!(ImportMap::from_json_str(r#"{"imports": []}"#).is_err());
    }
}
