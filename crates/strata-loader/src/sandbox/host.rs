// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host modules: bindings supplied by the embedder instead of source files.

use super::SandboxConfig;
use crate::value::{Namespace, NativeFunction, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the built-in path utilities module
pub const PATH_MODULE: &str = "strata:path";

/// Name of the built-in module exposing sandbox globals
pub const ENV_MODULE: &str = "strata:env";

/// Produces the bindings of a host module for one context
pub type HostModuleFactory = Arc<dyn Fn(&SandboxConfig) -> Namespace + Send + Sync>;

/// Registry of host modules available to a loader
#[derive(Clone, Default)]
pub struct HostModules {
    factories: HashMap<String, HostModuleFactory>,
}

impl HostModules {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry containing `strata:path` and `strata:env`
    pub fn with_builtins() -> Self {
        let mut modules = Self::new();
        modules.register(PATH_MODULE, |_config: &SandboxConfig| create_path_module());
        modules.register(ENV_MODULE, create_env_module);
        modules
    }

    /// Register (or replace) a host module
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SandboxConfig) -> Namespace + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Check if a specifier names a host module
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn instantiate(&self, name: &str, config: &SandboxConfig) -> Option<Namespace> {
        self.factories.get(name).map(|factory| factory(config))
    }
}

impl fmt::Debug for HostModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostModules")
            .field("names", &self.names())
            .finish()
    }
}

fn create_env_module(config: &SandboxConfig) -> Namespace {
    config
        .globals()
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn create_path_module() -> Namespace {
    let mut exports = Namespace::new();

    exports.insert("sep".to_string(), Value::string("/"));
    exports.insert("delimiter".to_string(), Value::string(":"));

    exports.insert(
        "join".to_string(),
        Value::Function(NativeFunction::new("join", |args| {
            let parts = string_args("join", args)?;
            Ok(Value::string(join(&parts)))
        })),
    );
    exports.insert(
        "dirname".to_string(),
        Value::Function(NativeFunction::new("dirname", |args| {
            let path = string_arg("dirname", args, 0)?;
            Ok(Value::string(dirname(path)))
        })),
    );
    exports.insert(
        "basename".to_string(),
        Value::Function(NativeFunction::new("basename", |args| {
            let path = string_arg("basename", args, 0)?;
            let ext = args.get(1).and_then(Value::as_str);
            Ok(Value::string(basename(path, ext)))
        })),
    );
    exports.insert(
        "extname".to_string(),
        Value::Function(NativeFunction::new("extname", |args| {
            let path = string_arg("extname", args, 0)?;
            Ok(Value::string(extname(path)))
        })),
    );
    exports.insert(
        "normalize".to_string(),
        Value::Function(NativeFunction::new("normalize", |args| {
            let path = string_arg("normalize", args, 0)?;
            Ok(Value::string(normalize(path)))
        })),
    );

    exports
}

fn string_arg<'a>(func: &str, args: &'a [Value], index: usize) -> Result<&'a str, String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.as_str()),
        other => Err(format!(
            "The \"path\" argument of {}() must be of type string. Received {}",
            func,
            other.map_or("undefined", Value::type_name)
        )),
    }
}

fn string_args<'a>(func: &str, args: &'a [Value]) -> Result<Vec<&'a str>, String> {
    (0..args.len()).map(|i| string_arg(func, args, i)).collect()
}

/// path.join(...paths)
fn join(paths: &[&str]) -> String {
    let joined = paths
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");
    normalize(&joined)
}

/// path.normalize(path)
fn normalize(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut components: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if !components.is_empty() && components.last() != Some(&"..") {
                    components.pop();
                } else if !is_absolute {
                    components.push("..");
                }
            }
            c => components.push(c),
        }
    }

    let result = components.join("/");
    if is_absolute {
        format!("/{}", result)
    } else if result.is_empty() {
        ".".to_string()
    } else {
        result
    }
}

/// path.dirname(path)
fn dirname(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.starts_with('/') { "/" } else { "." }.to_string();
    }
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// path.basename(path, ext?)
fn basename(path: &str, ext: Option<&str>) -> String {
    let trimmed = path.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or_default();

    match ext {
        Some(ext) if name.ends_with(ext) && name != ext => name[..name.len() - ext.len()].to_string(),
        _ => name.to_string(),
    }
}

/// path.extname(path)
fn extname(path: &str) -> String {
    let name = basename(path, None);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_string(),
        _ => String::new(),
    }
}
