// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module loading and linking

use crate::diagnostics;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving, linking or evaluating modules.
///
/// Every variant is cheap to clone: a single in-flight module build hands the
/// same outcome to every importer waiting on it.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// Structural failure in the import graph (cycle or unreadable module)
    #[error(transparent)]
    ModuleLoading(#[from] ModuleLoadingError),

    /// Specifier could not be mapped to a module URL
    #[error("Cannot resolve module '{specifier}' from '{referrer}': {reason}")]
    Resolution {
        /// Specifier as written by the importer
        specifier: String,
        /// URL of the importing module
        referrer: String,
        /// Reason for failure
        reason: String,
    },

    /// Host module name is not registered with the loader
    #[error("Cannot find host module '{0}'")]
    HostModuleNotFound(String),

    /// Module source text could not be parsed
    #[error("SyntaxError: {message} ({url}:{offset})")]
    Syntax {
        /// URL of the module being parsed
        url: String,
        /// Byte offset of the offending token
        offset: usize,
        /// Parser message
        message: String,
    },

    /// Import/export binding could not be satisfied
    #[error("SyntaxError: {message} (in {url})")]
    Link {
        /// URL of the importing module
        url: String,
        /// What went wrong
        message: String,
    },

    /// Module body failed while evaluating
    #[error("{message} (in {url})")]
    Evaluation {
        /// URL of the module being evaluated
        url: String,
        /// Error message, prefixed with its JavaScript-style kind
        message: String,
    },

    /// A pre-evaluated host module was asked to link imports.
    ///
    /// This is a defect in the caller, never a recoverable condition.
    #[error("Host module '{0}' is pre-evaluated and cannot link imports")]
    HostModuleRelink(String),

    /// A module build task was dropped before it produced a result
    #[error("Linking '{0}' was cancelled")]
    Cancelled(String),

    /// Import map document is malformed
    #[error("Invalid import map: {0}")]
    ImportMap(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error outside of module source reads
    #[error("File system error: {0}")]
    Io(Arc<io::Error>),
}

impl LoaderError {
    /// Create an evaluation error carrying a JavaScript-style `TypeError`
    pub fn type_error(url: &Url, msg: impl fmt::Display) -> Self {
        Self::Evaluation {
            url: url.to_string(),
            message: format!("TypeError: {msg}"),
        }
    }

    /// Create an evaluation error carrying a JavaScript-style `ReferenceError`
    pub fn reference_error(url: &Url, msg: impl fmt::Display) -> Self {
        Self::Evaluation {
            url: url.to_string(),
            message: format!("ReferenceError: {msg}"),
        }
    }

    /// Returns the module-loading error if this is one.
    pub fn as_module_loading(&self) -> Option<&ModuleLoadingError> {
        match self {
            Self::ModuleLoading(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true for a circular import chain.
    pub fn is_circular_dependency(&self) -> bool {
        self.as_module_loading()
            .is_some_and(|e| e.kind() == ModuleLoadingErrorKind::CircularDependency)
    }

    /// Returns true for an unreadable module source.
    pub fn is_file_read(&self) -> bool {
        self.as_module_loading()
            .is_some_and(|e| e.kind() == ModuleLoadingErrorKind::FileRead)
    }

    /// Full diagnostic text.
    ///
    /// `Display` stays a one-liner; this is where the chain visualization and
    /// any wrapped I/O message live.
    pub fn detail(&self) -> String {
        match self {
            Self::ModuleLoading(err) => err.detail(),
            other => other.to_string(),
        }
    }
}

impl From<io::Error> for LoaderError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for LoaderError {
    fn from(err: serde_json::Error) -> Self {
        Self::ImportMap(err.to_string())
    }
}

/// The two structural failure kinds of the import graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleLoadingErrorKind {
    /// A module (transitively) imports itself
    CircularDependency,
    /// A module's source text could not be read
    FileRead,
}

/// A failure in the import graph together with its provenance.
///
/// The chain, target and cause are informational only. They are not part of
/// `Debug` or `Display` output; use the accessors or [`detail`](Self::detail).
#[derive(Clone, Error)]
#[error("{}", summarize(.kind, .target_module))]
pub struct ModuleLoadingError {
    kind: ModuleLoadingErrorKind,
    module_ids: Vec<Url>,
    target_module: Url,
    #[source]
    original_error: Option<Arc<io::Error>>,
}

impl ModuleLoadingError {
    /// `target` was requested while already on the active import chain.
    pub fn circular_dependency(module_ids: Vec<Url>, target: Url) -> Self {
        Self {
            kind: ModuleLoadingErrorKind::CircularDependency,
            module_ids,
            target_module: target,
            original_error: None,
        }
    }

    /// Reading the source of `target` failed.
    pub fn file_read(module_ids: Vec<Url>, target: Url, cause: io::Error) -> Self {
        Self {
            kind: ModuleLoadingErrorKind::FileRead,
            module_ids,
            target_module: target,
            original_error: Some(Arc::new(cause)),
        }
    }

    /// Which failure this is
    pub fn kind(&self) -> ModuleLoadingErrorKind {
        self.kind
    }

    /// Import chain at the time of failure, root first
    pub fn module_ids(&self) -> &[Url] {
        &self.module_ids
    }

    /// The module that failed
    pub fn target_module(&self) -> &Url {
        &self.target_module
    }

    /// Underlying I/O error, for read failures
    pub fn original_error(&self) -> Option<&io::Error> {
        self.original_error.as_deref()
    }

    /// Rendered chain visualization
    pub fn detail(&self) -> String {
        match (self.kind, self.original_error()) {
            (ModuleLoadingErrorKind::FileRead, Some(cause)) => {
                diagnostics::render_file_read(&self.module_ids, &self.target_module, cause)
            }
            _ => diagnostics::render_circular(&self.module_ids, &self.target_module),
        }
    }
}

fn summarize(kind: &ModuleLoadingErrorKind, target: &Url) -> String {
    match kind {
        ModuleLoadingErrorKind::CircularDependency => {
            format!("Circular dependency detected: {target}")
        }
        ModuleLoadingErrorKind::FileRead => format!("Failed to read module: {target}"),
    }
}

impl fmt::Debug for ModuleLoadingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoadingError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_metadata_is_hidden_from_debug() {
        let err = ModuleLoadingError::circular_dependency(
            vec![url("file:///app/a.js"), url("file:///app/b.js")],
            url("file:///app/a.js"),
        );
        let debug = format!("{:?}", err);
        assert!(debug.contains("CircularDependency"));
        assert!(!debug.contains("b.js"));
        assert_eq!(err.module_ids().len(), 2);
    }

    #[test]
    fn test_display_is_short() {
        let err = ModuleLoadingError::file_read(
            vec![url("file:///app/main.js")],
            url("file:///app/missing.js"),
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.to_string(), "Failed to read module: file:///app/missing.js");
        assert!(!err.to_string().contains("main.js"));
        assert!(err.detail().contains("no such file"));
    }

    #[test]
    fn test_kind_predicates() {
        let err: LoaderError = ModuleLoadingError::circular_dependency(
            vec![url("file:///a")],
            url("file:///a"),
        )
        .into();
        assert!(err.is_circular_dependency());
        assert!(!err.is_file_read());
        assert!(LoaderError::HostModuleNotFound("x".into()).as_module_loading().is_none());
    }
}
