// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Evaluation of a linked module body.
//!
//! Runs in two phases. Binding resolves every import and re-export against
//! the already-evaluated dependencies. Execution then runs top-level
//! statements in source order and collects local exports.

use super::record::LinkedModule;
use crate::error::{LoaderError, Result};
use crate::sandbox::ExecutionContext;
use crate::source::{ExportSpecifier, Expression, ImportSpecifier, ModuleAst, Statement};
use crate::value::{Namespace, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use url::Url;

/// Evaluate `ast` and return its namespace
pub(crate) fn evaluate_module(
    ast: &ModuleAst,
    url: &Url,
    meta: Value,
    context: &ExecutionContext,
    dependencies: &HashMap<String, LinkedModule>,
) -> Result<Namespace> {
    let mut evaluator = Evaluator {
        url,
        meta,
        context,
        dependencies,
        scope: HashMap::new(),
        exports: Namespace::new(),
    };
    evaluator.bind(ast)?;
    evaluator.execute(ast)?;
    evaluator.merge_star_exports(ast)?;
    Ok(evaluator.exports)
}

struct Evaluator<'a> {
    url: &'a Url,
    meta: Value,
    context: &'a ExecutionContext,
    dependencies: &'a HashMap<String, LinkedModule>,
    /// Module-level bindings (imports and declarations)
    scope: HashMap<String, Value>,
    exports: Namespace,
}

impl Evaluator<'_> {
    fn bind(&mut self, ast: &ModuleAst) -> Result<()> {
        for statement in &ast.body {
            match statement {
                Statement::Import(decl) => {
                    let namespace = self.dependency(&decl.specifier)?;
                    for import in &decl.imports {
                        let (local, value) = match import {
                            ImportSpecifier::Default(local) => {
                                (local, self.import_binding(&decl.specifier, &namespace, "default")?)
                            }
                            ImportSpecifier::Named(imported, local) => {
                                (local, self.import_binding(&decl.specifier, &namespace, imported)?)
                            }
                            ImportSpecifier::Namespace(local) => {
                                (local, Value::Namespace(Arc::clone(&namespace)))
                            }
                        };
                        self.declare(local, value)?;
                    }
                }
                Statement::ExportNamed {
                    specifiers,
                    from: Some(from),
                } => {
                    let namespace = self.dependency(from)?;
                    for ExportSpecifier { local, exported } in specifiers {
                        let value = self.import_binding(from, &namespace, local)?;
                        self.export(exported, value)?;
                    }
                }
                Statement::ExportAll {
                    from,
                    alias: Some(alias),
                } => {
                    let namespace = self.dependency(from)?;
                    self.export(alias, Value::Namespace(namespace))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn execute(&mut self, ast: &ModuleAst) -> Result<()> {
        let mut local_exports: Vec<&ExportSpecifier> = Vec::new();

        for statement in &ast.body {
            match statement {
                Statement::Variable {
                    name,
                    init,
                    exported,
                } => {
                    let value = self.eval(init)?;
                    if *exported {
                        self.export(name, value.clone())?;
                    }
                    self.declare(name, value)?;
                }
                Statement::ExportDefault(expr) => {
                    let value = self.eval(expr)?;
                    self.export("default", value)?;
                }
                Statement::ExportNamed {
                    specifiers,
                    from: None,
                } => local_exports.extend(specifiers),
                Statement::Expression(expr) => {
                    self.eval(expr)?;
                }
                Statement::Import(_) | Statement::ExportNamed { .. } | Statement::ExportAll { .. } => {}
            }
        }

        // `export { x }` may precede the declaration of `x`
        for ExportSpecifier { local, exported } in local_exports {
            let value = self
                .scope
                .get(local)
                .cloned()
                .ok_or_else(|| LoaderError::reference_error(self.url, format!("{} is not defined", local)))?;
            self.export(exported, value)?;
        }
        Ok(())
    }

    /// `export * from` never re-exports `default` and never shadows an
    /// explicit export. A name offered with different values by two star
    /// sources is ambiguous and left out.
    fn merge_star_exports(&mut self, ast: &ModuleAst) -> Result<()> {
        let mut candidates: BTreeMap<String, Value> = BTreeMap::new();
        let mut ambiguous: HashSet<String> = HashSet::new();

        for statement in &ast.body {
            let Statement::ExportAll { from, alias: None } = statement else {
                continue;
            };
            let namespace = self.dependency(from)?;
            for (name, value) in namespace.iter() {
                if name == "default" || self.exports.contains(name) {
                    continue;
                }
                match candidates.get(name) {
                    Some(existing) if existing != value => {
                        ambiguous.insert(name.to_string());
                    }
                    Some(_) => {}
                    None => {
                        candidates.insert(name.to_string(), value.clone());
                    }
                }
            }
        }

        for (name, value) in candidates {
            if ambiguous.contains(&name) {
                tracing::debug!("Ambiguous star export '{}' in {} left out", name, self.url);
                continue;
            }
            self.exports.insert(name, value);
        }
        Ok(())
    }

    fn dependency(&self, specifier: &str) -> Result<Arc<Namespace>> {
        self.dependencies
            .get(specifier)
            .map(|module| Arc::clone(module.namespace()))
            .ok_or_else(|| LoaderError::Link {
                url: self.url.to_string(),
                message: format!("Module '{}' was not linked", specifier),
            })
    }

    fn import_binding(&self, specifier: &str, namespace: &Namespace, name: &str) -> Result<Value> {
        namespace.get(name).cloned().ok_or_else(|| LoaderError::Link {
            url: self.url.to_string(),
            message: format!(
                "The requested module '{}' does not provide an export named '{}'",
                specifier, name
            ),
        })
    }

    fn declare(&mut self, name: &str, value: Value) -> Result<()> {
        if self.scope.contains_key(name) {
            return Err(LoaderError::Link {
                url: self.url.to_string(),
                message: format!("Identifier '{}' has already been declared", name),
            });
        }
        self.scope.insert(name.to_string(), value);
        Ok(())
    }

    fn export(&mut self, name: &str, value: Value) -> Result<()> {
        if self.exports.contains(name) {
            return Err(LoaderError::Link {
                url: self.url.to_string(),
                message: format!("Duplicate export of '{}'", name),
            });
        }
        self.exports.insert(name.to_string(), value);
        Ok(())
    }

    fn eval(&self, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Identifier(name) => self.lookup(name),
            Expression::ImportMeta => Ok(self.meta.clone()),
            Expression::DynamicImport(specifier) => {
                Ok(Value::Namespace(self.dependency(specifier)?))
            }
            Expression::Member { object, property } => {
                let base = self.eval(object)?;
                base.get_property(property).ok_or_else(|| {
                    LoaderError::type_error(
                        self.url,
                        format!(
                            "Cannot read properties of {} (reading '{}')",
                            base, property
                        ),
                    )
                })
            }
            Expression::Call { callee, arguments } => {
                let function = match self.eval(callee)? {
                    Value::Function(f) => f,
                    _ => {
                        return Err(LoaderError::type_error(
                            self.url,
                            format!("{} is not a function", describe(callee)),
                        ));
                    }
                };
                let args = arguments
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                function.call(&args).map_err(|message| LoaderError::Evaluation {
                    url: self.url.to_string(),
                    message: format!("Error: {}", message),
                })
            }
            Expression::Object(properties) => {
                let mut object = BTreeMap::new();
                for (key, value) in properties {
                    object.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Object(Arc::new(object)))
            }
            Expression::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(Arc::new(values)))
            }
            Expression::Add(left, right) => Ok(self.eval(left)?.add(&self.eval(right)?)),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.scope.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.context.global(name) {
            return Ok(value.clone());
        }
        match name {
            "undefined" => Ok(Value::Undefined),
            "globalThis" => Ok(Value::object(
                self.context
                    .config()
                    .globals()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            )),
            _ => Err(LoaderError::reference_error(
                self.url,
                format!("{} is not defined", name),
            )),
        }
    }
}

/// Source-like rendering of a callee for error messages
fn describe(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(name) => name.clone(),
        Expression::Member { object, property } => format!("{}.{}", describe(object), property),
        Expression::ImportMeta => "import.meta".to_string(),
        Expression::Literal(value) => value.to_string(),
        _ => "expression".to_string(),
    }
}
