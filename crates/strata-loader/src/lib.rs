// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # strata-loader
//!
//! Dynamic module loading and linking for sandboxed module graphs.
//!
//! - Import maps with scopes and prefix mappings
//! - One read, compile and evaluation per module per load, even when many
//!   importers reach it at once
//! - Circular imports rejected with the full import chain
//! - Host modules (`strata:path`, `strata:env`, or your own) wrapped once per
//!   execution context
//! - `import.meta` with `url`, `filename`, `dirname` and `resolve()`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata_loader::{ImportMap, ModuleLoader, SandboxConfig};
//! use url::Url;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let base = Url::parse("file:///srv/app/")?;
//!     let map = ImportMap::new().with_import("pkg/", "./src/");
//!     let loader = ModuleLoader::new(&map, &base);
//!
//!     let namespace = loader.load("./main.js", &base, SandboxConfig::new()).await?;
//!     println!("{}", namespace.to_json());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod import_map;
pub mod loader;
pub mod module_system;
pub mod sandbox;
pub mod source;
pub mod value;

// Re-exports
pub use config::LoaderConfig;
pub use error::{LoaderError, ModuleLoadingError, ModuleLoadingErrorKind, Result};
pub use import_map::{ImportMap, ParsedImportMap};
pub use loader::{ModuleLoader, ModuleLoaderBuilder};
pub use module_system::{
    FsSourceLoader, LinkedModule, MemorySourceLoader, ModuleChain, ModuleRecord, ModuleResolver,
    ResolveResult, SourceLoader,
};
pub use sandbox::{ExecutionContext, HostModules, ImportMeta, SandboxConfig, SyntheticModule};
pub use value::{Namespace, NativeFunction, Value};

/// Version of strata-loader
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
