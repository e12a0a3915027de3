// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Syntax tree of a module.

use crate::value::Value;

/// Import specifier types
#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifier {
    /// `import foo from 'module'`
    Default(String),
    /// `import { foo }` or `import { foo as bar }`: (imported, local)
    Named(String, String),
    /// `import * as foo from 'module'`
    Namespace(String),
}

/// Parsed import statement
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDeclaration {
    /// The module specifier (e.g., './foo.js', 'lodash')
    pub specifier: String,
    /// Import specifiers; empty for `import 'module'`
    pub imports: Vec<ImportSpecifier>,
}

/// `export { local as exported }`
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    /// Binding name in this module (or in the source module for re-exports)
    pub local: String,
    /// Name visible to importers
    pub exported: String,
}

/// A top-level statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `import ... from 'module'`
    Import(ImportDeclaration),
    /// `[export] const|let|var name = init`
    Variable {
        /// Binding name
        name: String,
        /// Initializer
        init: Expression,
        /// Whether the binding is exported under its own name
        exported: bool,
    },
    /// `export default expr`
    ExportDefault(Expression),
    /// `export { ... }` or `export { ... } from 'module'`
    ExportNamed {
        /// Exported bindings
        specifiers: Vec<ExportSpecifier>,
        /// Source module for re-exports
        from: Option<String>,
    },
    /// `export * from 'module'` or `export * as name from 'module'`
    ExportAll {
        /// Source module
        from: String,
        /// Namespace name for `export * as name`
        alias: Option<String>,
    },
    /// Expression evaluated for its effects
    Expression(Expression),
}

/// An expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Value),
    /// Variable reference
    Identifier(String),
    /// `import.meta`
    ImportMeta,
    /// `import('specifier')`
    DynamicImport(String),
    /// `object.property`
    Member {
        /// Base expression
        object: Box<Expression>,
        /// Property name
        property: String,
    },
    /// `callee(arguments)`
    Call {
        /// Function expression
        callee: Box<Expression>,
        /// Argument expressions
        arguments: Vec<Expression>,
    },
    /// `{ key: value, shorthand }`
    Object(Vec<(String, Expression)>),
    /// `[a, b]`
    Array(Vec<Expression>),
    /// `left + right`
    Add(Box<Expression>, Box<Expression>),
}

/// A parsed module body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleAst {
    /// Top-level statements in source order
    pub body: Vec<Statement>,
}

impl ModuleAst {
    /// Every module specifier this module requests, deduplicated, in order
    /// of first appearance. Dynamic `import('x')` counts.
    pub fn requested_modules(&self) -> Vec<String> {
        let mut requests: Vec<String> = Vec::new();
        let mut push = |specifier: &str| {
            if !requests.iter().any(|r| r == specifier) {
                requests.push(specifier.to_string());
            }
        };

        for statement in &self.body {
            match statement {
                Statement::Import(decl) => push(&decl.specifier),
                Statement::ExportNamed { from: Some(from), .. } => push(from),
                Statement::ExportAll { from, .. } => push(from),
                Statement::Variable { init, .. } => init.visit_dynamic_imports(&mut push),
                Statement::ExportDefault(expr) | Statement::Expression(expr) => {
                    expr.visit_dynamic_imports(&mut push)
                }
                Statement::ExportNamed { from: None, .. } => {}
            }
        }

        requests
    }
}

impl Expression {
    fn visit_dynamic_imports(&self, f: &mut impl FnMut(&str)) {
        match self {
            Expression::DynamicImport(specifier) => f(specifier),
            Expression::Member { object, .. } => object.visit_dynamic_imports(f),
            Expression::Call { callee, arguments } => {
                callee.visit_dynamic_imports(f);
                for arg in arguments {
                    arg.visit_dynamic_imports(f);
                }
            }
            Expression::Object(props) => {
                for (_, value) in props {
                    value.visit_dynamic_imports(f);
                }
            }
            Expression::Array(items) => {
                for item in items {
                    item.visit_dynamic_imports(f);
                }
            }
            Expression::Add(left, right) => {
                left.visit_dynamic_imports(f);
                right.visit_dynamic_imports(f);
            }
            Expression::Literal(_) | Expression::Identifier(_) | Expression::ImportMeta => {}
        }
    }
}
