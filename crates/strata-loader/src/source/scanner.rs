// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scanner that produces tokens from module source text.

/// A byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A token produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The token kinds of the module language.
///
/// Keywords are scanned as identifiers; the parser treats `import`,
/// `export`, `from`, `as` and friends contextually.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword
    Identifier(String),
    /// String literal with escapes already processed
    String(String),
    /// Numeric literal
    Number(f64),
    /// One of `{ } ( ) [ ] ; , . : * = +`
    Punct(char),
    /// Malformed input, with a message
    Invalid(String),
    /// End of input
    Eof,
}

/// A scanner over module source text.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        if let Err(message) = self.skip_whitespace_and_comments() {
            let start = self.current_pos;
            return Token::new(TokenKind::Invalid(message), Span::new(start, start));
        }

        let start = self.current_pos;

        let Some((_pos, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match ch {
            '{' | '}' | '(' | ')' | '[' | ']' | ';' | ',' | ':' | '*' | '=' | '+' => {
                TokenKind::Punct(ch)
            }
            '.' => match self.peek() {
                Some(c) if c.is_ascii_digit() => self.scan_number(ch),
                _ => TokenKind::Punct('.'),
            },
            '"' | '\'' => self.scan_string(ch),
            '0'..='9' => self.scan_number(ch),
            _ if is_id_start(ch) => self.scan_identifier(ch),
            _ => TokenKind::Invalid(format!("Unexpected character '{}'", ch)),
        };

        Token::new(kind, Span::new(start, self.current_pos))
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), String> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' || ch == '\r' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        let mut closed = false;
                        while let Some((_, ch)) = self.advance() {
                            if ch == '*' && self.peek() == Some('/') {
                                self.advance();
                                closed = true;
                                break;
                            }
                        }
                        if !closed {
                            return Err("Unterminated comment".to_string());
                        }
                    }
                    _ => return Ok(()),
                },
                _ => return Ok(()),
            }
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            let Some((_, ch)) = self.advance() else {
                return TokenKind::Invalid("Unterminated string literal".to_string());
            };
            match ch {
                c if c == quote => return TokenKind::String(value),
                '\n' | '\r' => {
                    return TokenKind::Invalid("Unterminated string literal".to_string());
                }
                '\\' => match self.scan_escape() {
                    Ok(Some(c)) => value.push(c),
                    Ok(None) => {}
                    Err(message) => return TokenKind::Invalid(message),
                },
                c => value.push(c),
            }
        }
    }

    /// Returns `None` for a line continuation.
    fn scan_escape(&mut self) -> Result<Option<char>, String> {
        let Some((_, ch)) = self.advance() else {
            return Err("Unterminated string literal".to_string());
        };
        let c = match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'v' => '\u{000B}',
            '0' => '\0',
            '\n' => return Ok(None),
            'u' => return self.scan_unicode_escape().map(Some),
            other => other,
        };
        Ok(Some(c))
    }

    fn scan_unicode_escape(&mut self) -> Result<char, String> {
        let mut digits = String::new();
        if self.peek() == Some('{') {
            self.advance();
            while let Some((_, ch)) = self.advance() {
                if ch == '}' {
                    break;
                }
                digits.push(ch);
            }
        } else {
            for _ in 0..4 {
                match self.advance() {
                    Some((_, ch)) => digits.push(ch),
                    None => break,
                }
            }
        }

        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| format!("Invalid Unicode escape sequence '\\u{}'", digits))
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let start = self.current_pos - first.len_utf8();

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' || c == '_' {
                self.advance();
            } else if c == 'e' || c == 'E' {
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
            } else {
                break;
            }
        }

        let text: String = self.source[start..self.current_pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Invalid(format!("Invalid number literal '{}'", text)),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);
        while let Some(c) = self.peek() {
            if is_id_continue(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Identifier(name)
    }
}

fn is_id_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_id_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut out = Vec::new();
        loop {
            let token = scanner.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn test_import_statement_tokens() {
        assert_eq!(
            kinds("import { a as b } from './x.js';"),
            vec![
                TokenKind::Identifier("import".into()),
                TokenKind::Punct('{'),
                TokenKind::Identifier("a".into()),
                TokenKind::Identifier("as".into()),
                TokenKind::Identifier("b".into()),
                TokenKind::Punct('}'),
                TokenKind::Identifier("from".into()),
                TokenKind::String("./x.js".into()),
                TokenKind::Punct(';'),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("// line\n/* block\n */ 42"),
            vec![TokenKind::Number(42.0)]
        );
        assert!(matches!(kinds("/* open")[0], TokenKind::Invalid(_)));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb" 'A\u{1F600}'"#),
            vec![
                TokenKind::String("a\nb".into()),
                TokenKind::String("A\u{1F600}".into()),
            ]
        );
        assert!(matches!(kinds("'open")[0], TokenKind::Invalid(_)));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 1_000"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(1000.0),
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let mut scanner = Scanner::new("  ünï = 1");
        let token = scanner.next_token();
        assert_eq!(token.kind, TokenKind::Identifier("ünï".into()));
        assert_eq!(token.span, Span::new(2, 7));
    }
}
