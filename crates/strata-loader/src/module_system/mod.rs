// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module system: resolution, per-load caching, linking and evaluation.

mod cache;
mod chain;
mod evaluate;
pub(crate) mod linker;
mod record;
mod resolver;
mod source_loader;

pub use chain::ModuleChain;
pub use record::{LinkedModule, ModuleRecord};
pub use resolver::{ModuleResolver, ResolveResult};
pub use source_loader::{FsSourceLoader, MemorySourceLoader, SourceLoader};
