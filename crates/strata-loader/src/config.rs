// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. the user config file, `<config dir>/strata/config.json`
//! 3. `strata.json` in the project directory
//! 4. `STRATA_*` environment variables

use crate::error::{LoaderError, Result};
use crate::import_map::ImportMap;
use crate::sandbox::SandboxConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = "strata.json";

/// Configuration for a module loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Import map file
    pub import_map: Option<PathBuf>,

    /// Base URL for the import map and the entry module.
    /// Defaults to the project directory.
    pub base_url: Option<String>,

    /// Globals injected into every execution context
    pub globals: BTreeMap<String, serde_json::Value>,

    /// Default log filter
    pub log_level: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            import_map: None,
            base_url: None,
            globals: BTreeMap::new(),
            log_level: "warn".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration for the project in `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut config = LoaderConfig::default();

        if let Some(user_config_path) = user_config_path() {
            if user_config_path.exists() {
                config.merge_from_file(&user_config_path)?;
            }
        }

        let project_config = project_dir.join(PROJECT_CONFIG_FILE);
        if project_config.exists() {
            config.merge_from_file(&project_config)?;
        }

        config.load_from_env();

        Ok(config)
    }

    /// Merge the keys present in a JSON config file.
    ///
    /// A relative `importMap` path is taken relative to the file.
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let overlay: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| LoaderError::Config(format!("{}: {}", path.display(), e)))?;

        let serde_json::Value::Object(entries) = overlay else {
            return Err(LoaderError::Config(format!(
                "{}: expected a JSON object",
                path.display()
            )));
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        for (key, value) in entries {
            match (key.as_str(), value) {
                ("importMap", serde_json::Value::String(p)) => {
                    self.import_map = Some(dir.join(p));
                }
                ("baseUrl", serde_json::Value::String(url)) => self.base_url = Some(url),
                ("logLevel", serde_json::Value::String(level)) => self.log_level = level,
                ("globals", serde_json::Value::Object(globals)) => {
                    self.globals.extend(globals);
                }
                (key, value) => {
                    tracing::warn!("Ignoring config key '{}' in {}: {}", key, path.display(), value);
                }
            }
        }

        Ok(())
    }

    /// Load configuration from environment variables.
    fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            let Some(config_key) = key.strip_prefix("STRATA_") else {
                continue;
            };
            if let Some(name) = config_key.strip_prefix("GLOBAL_") {
                self.set(&format!("global.{}", name), &value);
            } else {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value);
            }
        }
    }

    /// Set a configuration value by its `kebab-case` key.
    ///
    /// `global.<name>` sets a global; its value is parsed as JSON, or taken
    /// as a plain string when it is not valid JSON.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "import-map" => self.import_map = Some(PathBuf::from(value)),
            "base-url" => self.base_url = Some(value.to_string()),
            "log-level" | "log" => self.log_level = value.to_string(),
            _ => {
                if let Some(name) = key.strip_prefix("global.") {
                    let json = serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
                    self.globals.insert(name.to_string(), json);
                } else {
                    tracing::debug!("Unknown config key '{}'", key);
                }
            }
        }
    }

    /// The base URL, falling back to `project_dir` as a directory URL
    pub fn base_url(&self, project_dir: &Path) -> Result<Url> {
        match &self.base_url {
            Some(url) => Url::parse(url)
                .map_err(|e| LoaderError::Config(format!("invalid base URL '{}': {}", url, e))),
            None => Url::from_directory_path(project_dir).map_err(|_| {
                LoaderError::Config(format!(
                    "project directory '{}' must be an absolute path",
                    project_dir.display()
                ))
            }),
        }
    }

    /// Read the configured import map, or an empty one
    pub fn import_map(&self) -> Result<ImportMap> {
        match &self.import_map {
            Some(path) => ImportMap::from_file(path),
            None => Ok(ImportMap::new()),
        }
    }

    /// Sandbox settings for new execution contexts
    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::from_json_globals(&self.globals)
    }
}

/// Get the user config path.
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("strata").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.log_level, "warn");
        assert!(config.import_map.is_none());
        assert!(config.globals.is_empty());
    }

    #[test]
    fn test_merge_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{
                "importMap": "maps/importmap.json",
                "baseUrl": "file:///srv/app/",
                "globals": { "answer": 42, "name": "strata" },
                "unknown": true
            }"#,
        )
        .unwrap();

        let mut config = LoaderConfig::default();
        config.merge_from_file(&path).unwrap();

        assert_eq!(config.import_map, Some(dir.path().join("maps/importmap.json")));
        assert_eq!(config.base_url.as_deref(), Some("file:///srv/app/"));
        assert_eq!(config.globals.get("answer"), Some(&json!(42)));
        assert_eq!(config.log_level, "warn");

        let sandbox = config.sandbox_config();
        assert_eq!(sandbox.global("name"), Some(&Value::string("strata")));
    }

    #[test]
    fn test_merge_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(&path, "[1, 2]").unwrap();

        let err = LoaderConfig::default().merge_from_file(&path).unwrap_err();
        assert!(matches!(err, LoaderError::Config(_)));
    }

    #[test]
    fn test_set() {
        let mut config = LoaderConfig::default();
        config.set("log-level", "debug");
        config.set("global.flag", "true");
        config.set("global.label", "not json");
        config.set("base-url", "https://example.test/");

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.globals.get("flag"), Some(&json!(true)));
        assert_eq!(config.globals.get("label"), Some(&json!("not json")));
        assert_eq!(
            config.base_url(Path::new("/unused")).unwrap().as_str(),
            "https://example.test/"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_base_url_defaults_to_project_dir() {
        let config = LoaderConfig::default();
        assert_eq!(
            config.base_url(Path::new("/srv/app")).unwrap().as_str(),
            "file:///srv/app/"
        );
        assert!(config.base_url(Path::new("relative")).is_err());
    }

    #[test]
    fn test_import_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importmap.json");
        std::fs::write(&path, r#"{ "imports": { "pkg/": "./src/" } }"#).unwrap();

        let config = LoaderConfig {
            import_map: Some(path),
            ..LoaderConfig::default()
        };
        let map = config.import_map().unwrap();
        assert_eq!(map.imports.get("pkg/").map(String::as_str), Some("./src/"));
    }
}
