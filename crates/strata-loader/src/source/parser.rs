// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Recursive-descent parser for module source text.

use super::ast::{
    ExportSpecifier, Expression, ImportDeclaration, ImportSpecifier, ModuleAst, Statement,
};
use super::scanner::{Scanner, Token, TokenKind};
use crate::value::Value;

/// A parse failure at a byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Byte offset of the offending token
    pub offset: usize,
    /// What was expected or found
    pub message: String,
}

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parser over a token stream.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self { scanner, current }
    }

    /// Parses a whole module.
    pub fn parse_module(&mut self) -> ParseResult<ModuleAst> {
        let mut body = Vec::new();
        while self.current.kind != TokenKind::Eof {
            if self.eat_punct(';') {
                continue;
            }
            body.push(self.parse_statement()?);
            self.eat_punct(';');
        }
        Ok(ModuleAst { body })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        if self.check_keyword("import") {
            return self.parse_import();
        }
        if self.check_keyword("export") {
            self.advance();
            return self.parse_export();
        }
        if self.check_declaration_keyword() {
            return self.parse_variable(false);
        }
        Ok(Statement::Expression(self.parse_expression()?))
    }

    fn parse_import(&mut self) -> ParseResult<Statement> {
        let start = self.advance().span.start;

        // import.meta / import('x') at statement start
        if self.check_punct('.') || self.check_punct('(') {
            let primary = self.parse_import_expression_tail(start)?;
            let expr = self.parse_postfix_from(primary)?;
            return Ok(Statement::Expression(self.parse_additive_from(expr)?));
        }

        // import 'module'
        if let TokenKind::String(_) = self.current.kind {
            let specifier = self.expect_string()?;
            return Ok(Statement::Import(ImportDeclaration {
                specifier,
                imports: Vec::new(),
            }));
        }

        let mut imports = Vec::new();

        if let TokenKind::Identifier(_) = self.current.kind {
            imports.push(ImportSpecifier::Default(self.expect_identifier()?));
            if !self.eat_punct(',') {
                return self.finish_import(imports);
            }
        }

        if self.eat_punct('*') {
            self.expect_keyword("as")?;
            imports.push(ImportSpecifier::Namespace(self.expect_identifier()?));
        } else if self.eat_punct('{') {
            while !self.check_punct('}') {
                let imported = self.expect_module_export_name()?;
                let local = if self.eat_keyword("as") {
                    self.expect_identifier()?
                } else {
                    imported.clone()
                };
                imports.push(ImportSpecifier::Named(imported, local));
                if !self.eat_punct(',') {
                    break;
                }
            }
            self.expect_punct('}')?;
        } else {
            return Err(self.unexpected("import clause"));
        }

        self.finish_import(imports)
    }

    fn finish_import(&mut self, imports: Vec<ImportSpecifier>) -> ParseResult<Statement> {
        self.expect_keyword("from")?;
        let specifier = self.expect_string()?;
        Ok(Statement::Import(ImportDeclaration { specifier, imports }))
    }

    fn parse_export(&mut self) -> ParseResult<Statement> {
        if self.eat_keyword("default") {
            return Ok(Statement::ExportDefault(self.parse_expression()?));
        }

        if self.check_declaration_keyword() {
            return self.parse_variable(true);
        }

        if self.eat_punct('*') {
            let alias = if self.eat_keyword("as") {
                Some(self.expect_module_export_name()?)
            } else {
                None
            };
            self.expect_keyword("from")?;
            let from = self.expect_string()?;
            return Ok(Statement::ExportAll { from, alias });
        }

        if self.eat_punct('{') {
            let mut specifiers = Vec::new();
            while !self.check_punct('}') {
                let local = self.expect_module_export_name()?;
                let exported = if self.eat_keyword("as") {
                    self.expect_module_export_name()?
                } else {
                    local.clone()
                };
                specifiers.push(ExportSpecifier { local, exported });
                if !self.eat_punct(',') {
                    break;
                }
            }
            self.expect_punct('}')?;

            let from = if self.eat_keyword("from") {
                Some(self.expect_string()?)
            } else {
                None
            };
            return Ok(Statement::ExportNamed { specifiers, from });
        }

        Err(self.unexpected("export declaration"))
    }

    fn parse_variable(&mut self, exported: bool) -> ParseResult<Statement> {
        self.advance(); // const / let / var
        let name = self.expect_identifier()?;
        self.expect_punct('=')?;
        let init = self.parse_expression()?;
        Ok(Statement::Variable {
            name,
            init,
            exported,
        })
    }

    /// Parses an expression.
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        let left = self.parse_postfix()?;
        self.parse_additive_from(left)
    }

    fn parse_additive_from(&mut self, mut left: Expression) -> ParseResult<Expression> {
        while self.eat_punct('+') {
            let right = self.parse_postfix()?;
            left = Expression::Add(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let primary = self.parse_primary()?;
        self.parse_postfix_from(primary)
    }

    fn parse_postfix_from(&mut self, mut expr: Expression) -> ParseResult<Expression> {
        loop {
            if self.eat_punct('.') {
                let property = self.expect_identifier()?;
                expr = Expression::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat_punct('(') {
                let arguments = self.parse_list(')')?;
                expr = Expression::Call {
                    callee: Box::new(expr),
                    arguments,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expression::Literal(Value::Number(n))),
            TokenKind::String(s) => Ok(Expression::Literal(Value::String(s))),
            TokenKind::Identifier(name) => match name.as_str() {
                "true" => Ok(Expression::Literal(Value::Boolean(true))),
                "false" => Ok(Expression::Literal(Value::Boolean(false))),
                "null" => Ok(Expression::Literal(Value::Null)),
                "undefined" => Ok(Expression::Literal(Value::Undefined)),
                "import" => self.parse_import_expression_tail(token.span.start),
                _ => Ok(Expression::Identifier(name)),
            },
            TokenKind::Punct('(') => {
                let expr = self.parse_expression()?;
                self.expect_punct(')')?;
                Ok(expr)
            }
            TokenKind::Punct('[') => Ok(Expression::Array(self.parse_list(']')?)),
            TokenKind::Punct('{') => self.parse_object(),
            TokenKind::Invalid(message) => Err(ParseError {
                offset: token.span.start,
                message,
            }),
            _ => Err(ParseError {
                offset: token.span.start,
                message: format!("Unexpected {}", describe(&token.kind)),
            }),
        }
    }

    /// After the `import` keyword in expression position.
    fn parse_import_expression_tail(&mut self, start: usize) -> ParseResult<Expression> {
        if self.eat_punct('.') {
            let property = self.expect_identifier()?;
            if property != "meta" {
                return Err(ParseError {
                    offset: start,
                    message: format!("The only valid meta property for import is 'import.meta', found 'import.{}'", property),
                });
            }
            return Ok(Expression::ImportMeta);
        }

        self.expect_punct('(')?;
        let specifier = match self.current.kind {
            TokenKind::String(_) => self.expect_string()?,
            _ => {
                return Err(ParseError {
                    offset: self.current.span.start,
                    message: "Dynamic import() requires a string literal specifier".to_string(),
                });
            }
        };
        self.eat_punct(',');
        self.expect_punct(')')?;
        Ok(Expression::DynamicImport(specifier))
    }

    fn parse_object(&mut self) -> ParseResult<Expression> {
        let mut props = Vec::new();
        while !self.check_punct('}') {
            let token = self.advance();
            let (key, shorthand_allowed) = match token.kind {
                TokenKind::Identifier(name) => (name, true),
                TokenKind::String(s) => (s, false),
                TokenKind::Number(n) => (Value::Number(n).to_string(), false),
                other => {
                    return Err(ParseError {
                        offset: token.span.start,
                        message: format!("Unexpected {} in object literal", describe(&other)),
                    });
                }
            };

            let value = if self.eat_punct(':') {
                self.parse_expression()?
            } else if shorthand_allowed {
                Expression::Identifier(key.clone())
            } else {
                return Err(self.unexpected("':'"));
            };
            props.push((key, value));

            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct('}')?;
        Ok(Expression::Object(props))
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed.
    fn parse_list(&mut self, close: char) -> ParseResult<Vec<Expression>> {
        let mut items = Vec::new();
        while !self.check_punct(close) {
            items.push(self.parse_expression()?);
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct(close)?;
        Ok(items)
    }

    // ==================== Token helpers ====================

    fn advance(&mut self) -> Token {
        let next = self.scanner.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn check_punct(&self, c: char) -> bool {
        self.current.kind == TokenKind::Punct(c)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.check_punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> ParseResult<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", c)))
        }
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(name) if name == keyword)
    }

    fn check_declaration_keyword(&self) -> bool {
        self.check_keyword("const") || self.check_keyword("let") || self.check_keyword("var")
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", keyword)))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    /// Identifier or string literal, as allowed in import/export lists
    fn expect_module_export_name(&mut self) -> ParseResult<String> {
        match &self.current.kind {
            TokenKind::Identifier(name) | TokenKind::String(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        if let TokenKind::String(s) = &self.current.kind {
            let s = s.clone();
            self.advance();
            Ok(s)
        } else {
            Err(self.unexpected("string literal"))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let message = match &self.current.kind {
            TokenKind::Invalid(message) => message.clone(),
            found => format!("Expected {}, found {}", expected, describe(found)),
        };
        ParseError {
            offset: self.current.span.start,
            message,
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Identifier(name) => format!("identifier '{}'", name),
        TokenKind::String(s) => format!("string \"{}\"", s),
        TokenKind::Number(n) => format!("number {}", Value::Number(*n)),
        TokenKind::Punct(c) => format!("token '{}'", c),
        TokenKind::Invalid(message) => message.clone(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ModuleAst {
        Parser::new(source).parse_module().unwrap()
    }

    #[test]
    fn test_parse_imports() {
        let ast = parse(
            r#"
            import foo from 'foo';
            import { bar, baz as qux } from 'bar';
            import * as all from 'all';
            import def, { named } from 'mixed';
            import 'side-effect';
        "#,
        );

        assert_eq!(ast.body.len(), 5);
        assert_eq!(
            ast.body[1],
            Statement::Import(ImportDeclaration {
                specifier: "bar".into(),
                imports: vec![
                    ImportSpecifier::Named("bar".into(), "bar".into()),
                    ImportSpecifier::Named("baz".into(), "qux".into()),
                ],
            })
        );
        assert_eq!(
            ast.body[3],
            Statement::Import(ImportDeclaration {
                specifier: "mixed".into(),
                imports: vec![
                    ImportSpecifier::Default("def".into()),
                    ImportSpecifier::Named("named".into(), "named".into()),
                ],
            })
        );
        assert_eq!(
            ast.requested_modules(),
            vec!["foo", "bar", "all", "mixed", "side-effect"]
        );
    }

    #[test]
    fn test_parse_exports() {
        let ast = parse(
            r#"
            export default { title: "home" }
            export const answer = 40 + 2
            export { answer as theAnswer };
            export * from './reexport.js';
            export * as ns from './namespace.js';
            export { x as y } from './named.js';
        "#,
        );

        assert_eq!(ast.body.len(), 6);
        assert!(matches!(ast.body[0], Statement::ExportDefault(Expression::Object(_))));
        assert!(matches!(ast.body[1], Statement::Variable { exported: true, .. }));
        assert_eq!(
            ast.body[4],
            Statement::ExportAll {
                from: "./namespace.js".into(),
                alias: Some("ns".into()),
            }
        );
        assert_eq!(
            ast.requested_modules(),
            vec!["./reexport.js", "./namespace.js", "./named.js"]
        );
    }

    #[test]
    fn test_dynamic_import_and_meta() {
        let ast = parse(
            r#"
            const lazy = import("./lazy.js")
            export const here = import.meta.url
            import.meta.resolve("./other.js")
            export const again = import('./lazy.js')
        "#,
        );

        assert_eq!(ast.requested_modules(), vec!["./lazy.js"]);
        assert!(matches!(
            &ast.body[1],
            Statement::Variable { init: Expression::Member { object, .. }, .. }
                if **object == Expression::ImportMeta
        ));
        assert!(matches!(ast.body[2], Statement::Expression(Expression::Call { .. })));
    }

    #[test]
    fn test_calls_and_members() {
        let ast = parse("export const p = path.join('a', dir.name, [1, 2,],)");
        let Statement::Variable { init, .. } = &ast.body[0] else {
            panic!("expected variable");
        };
        let Expression::Call { callee, arguments } = init else {
            panic!("expected call");
        };
        assert_eq!(arguments.len(), 3);
        assert!(matches!(**callee, Expression::Member { ref property, .. } if property == "join"));
    }

    #[test]
    fn test_syntax_errors_carry_offsets() {
        let err = Parser::new("import { a from 'x'").parse_module().unwrap_err();
        assert_eq!(err.offset, 11);
        assert!(err.message.contains("'}'"));

        let err = Parser::new("const x = import(name)").parse_module().unwrap_err();
        assert!(err.message.contains("string literal"));

        let err = Parser::new("export const s = 'open").parse_module().unwrap_err();
        assert!(err.message.contains("Unterminated"));
    }
}
