// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records: compiled units and their evaluated results.

use super::evaluate;
use super::resolver::ModuleResolver;
use crate::error::Result;
use crate::sandbox::{ExecutionContext, ImportMeta, SyntheticModule};
use crate::source::{parse_module, ModuleAst};
use crate::value::Namespace;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// A source module compiled into a context, waiting for its dependencies.
#[derive(Debug)]
pub(crate) struct CompiledModule {
    specifier: String,
    url: Url,
    source_text: String,
    ast: ModuleAst,
    requests: Vec<String>,
    meta: ImportMeta,
}

impl CompiledModule {
    /// Parse `source_text` and prepare `import.meta` for the module at `url`
    pub(crate) fn compile(
        specifier: String,
        url: Url,
        source_text: String,
        is_main: bool,
        resolver: &ModuleResolver,
    ) -> Result<Self> {
        let ast = parse_module(&source_text, &url)?;
        let requests = ast.requested_modules();
        let meta = ImportMeta::new(url.clone(), is_main, resolver.clone());

        Ok(Self {
            specifier,
            url,
            source_text,
            ast,
            requests,
            meta,
        })
    }

    /// Specifiers this module imports, in order of first appearance
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    /// Bind imports from `dependencies` and run the module body.
    ///
    /// `dependencies` maps each of [`CompiledModule::requests`] to its linked
    /// module.
    pub(crate) fn evaluate(
        self,
        context: &ExecutionContext,
        dependencies: &HashMap<String, LinkedModule>,
    ) -> Result<ModuleRecord> {
        tracing::trace!("Evaluating {}", self.url);
        let namespace = evaluate::evaluate_module(
            &self.ast,
            &self.url,
            self.meta.to_value(),
            context,
            dependencies,
        )?;

        Ok(ModuleRecord {
            specifier: self.specifier,
            filename: self.meta.filename.clone(),
            url: self.url,
            source_text: self.source_text,
            requests: self.requests,
            context_id: context.id(),
            namespace: Arc::new(namespace),
        })
    }
}

/// An evaluated source module
#[derive(Debug)]
pub struct ModuleRecord {
    /// Specifier as first written by an importer
    specifier: String,
    /// Absolute path, for `file:` modules
    filename: Option<PathBuf>,
    url: Url,
    source_text: String,
    requests: Vec<String>,
    context_id: uuid::Uuid,
    namespace: Arc<Namespace>,
}

impl ModuleRecord {
    /// The specifier that first caused this module to load
    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    /// The module's URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Local path of the module, if it has one
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Source text as read
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Requested module specifiers
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    /// Context the module was evaluated in
    pub fn context_id(&self) -> uuid::Uuid {
        self.context_id
    }

    /// Exported bindings
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }
}

/// A module ready for importers: evaluated source or a host snapshot
#[derive(Debug, Clone)]
pub enum LinkedModule {
    /// Host module snapshot
    Host(Arc<SyntheticModule>),
    /// Evaluated source module
    Source(Arc<ModuleRecord>),
}

impl LinkedModule {
    /// Exported bindings
    pub fn namespace(&self) -> &Arc<Namespace> {
        match self {
            LinkedModule::Host(module) => module.namespace(),
            LinkedModule::Source(record) => record.namespace(),
        }
    }

    /// Import specifiers this module links against.
    ///
    /// Host modules are pre-evaluated and have nothing to link; asking one
    /// goes through [`SyntheticModule::link`] and fails with
    /// [`LoaderError::HostModuleRelink`](crate::LoaderError::HostModuleRelink).
    pub fn requests(&self) -> Result<&[String]> {
        match self {
            LinkedModule::Host(module) => module.link().map(|()| &[][..]),
            LinkedModule::Source(record) => Ok(record.requests()),
        }
    }

    /// The source record, if this is not a host module
    pub fn as_source(&self) -> Option<&Arc<ModuleRecord>> {
        match self {
            LinkedModule::Source(record) => Some(record),
            LinkedModule::Host(_) => None,
        }
    }
}
