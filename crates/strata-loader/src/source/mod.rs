// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module source language.
//!
//! User-authored modules are written in a subset of ECMAScript module syntax:
//! - `import` declarations (default, named, namespace, side-effect)
//! - `export` declarations, re-exports and `export *`
//! - `const` / `let` / `var` bindings
//! - literals, member access, calls, object/array literals and `+`
//! - `import.meta` and `import('literal')`

pub mod ast;
mod parser;
mod scanner;

pub use ast::{ExportSpecifier, Expression, ImportDeclaration, ImportSpecifier, ModuleAst, Statement};
pub use parser::{ParseError, Parser};
pub use scanner::{Scanner, Span, Token, TokenKind};

use crate::error::{LoaderError, Result};
use url::Url;

/// Parse module source text, attributing syntax errors to `url`.
pub fn parse_module(source: &str, url: &Url) -> Result<ModuleAst> {
    Parser::new(source)
        .parse_module()
        .map_err(|err| LoaderError::Syntax {
            url: url.to_string(),
            offset: err.offset,
            message: err.message,
        })
}
