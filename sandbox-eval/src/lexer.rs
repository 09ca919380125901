// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tokenizer feeding the recursive-descent parser (stage P, spec §4.2).
//!
//! Newlines are significant only at bracket depth zero, where they act as
//! statement separators inside `do … end` bodies; inside `(`, `[`, `{`,
//! `%{` or string interpolation they are plain whitespace. This mirrors
//! how the surface syntax lets an expression span multiple lines as long
//! as it is still "open".

use crate::error::{EvalError, EvalResult};

/// One segment of a (possibly interpolated) string literal, as produced by
/// the lexer. Interpolated segments carry the *raw* source text between
/// `#{` and `}` verbatim; the parser re-tokenizes and re-parses it once it
/// has a `Node` tree to attach the result to (see [`crate::parser`]).
#[derive(Debug, Clone, PartialEq)]
pub enum StrSegment {
    Literal(String),
    Interpolated(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(Vec<StrSegment>),
    Atom(String),
    /// A lowercase-leading identifier, e.g. `price`, `add_tax`, `do`-like
    /// keywords have already been split out as [`Token::Op`] lexemes below.
    Ident(String),
    /// An uppercase-leading identifier segment, e.g. `Calculator`, `String`.
    Alias(String),
    /// A sigil literal, e.g. `~s(hello)`, fully scanned including its body.
    Sigil {
        letter: char,
        content: String,
        modifiers: String,
    },
    /// Any fixed keyword, operator or punctuation lexeme. Keeping these as
    /// interned string lexemes rather than one variant per symbol keeps this
    /// enum small and lets the parser and the whitelist share string
    /// comparisons directly.
    Op(&'static str),
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub line: u32,
    pub token: Token,
}

const KEYWORDS: &[&str] = &[
    "do",
    "end",
    "def",
    "defp",
    "defmodule",
    "case",
    "cond",
    "with",
    "fn",
    "when",
    "alias",
    "import",
    "require",
    "use",
    "else",
    "true",
    "false",
    "nil",
    "and",
    "or",
    "not",
    "in",
];

/// Multi-character operator lexemes, longest first so the scanner can greedily
/// match without backtracking.
const OPERATORS: &[&str] = &[
    "<<>>", "===", "!==", "<<", ">>", "==", "!=", ">=", "<=", "&&", "||", "<>", "++", "|>", "=>",
    "::", "->", "<-", "%{", "(", ")", "[", "]", "{", "}", "+", "-", "*", "/", ">", "<", "|", ".",
    ":", "=", "&", "@", ",", "%", ";",
];

pub fn tokenize(source: &str) -> EvalResult<Vec<Spanned>> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    depth: i32,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            depth: 0,
        }
    }

    fn run(mut self) -> EvalResult<Vec<Spanned>> {
        let mut out = Vec::new();
        loop {
            self.skip_inline_whitespace_and_comments();
            let Some(c) = self.peek() else {
                out.push(Spanned {
                    line: self.line,
                    token: Token::Eof,
                });
                break;
            };

            if c == '\n' {
                self.advance();
                self.line += 1;
                if self.depth == 0 {
                    out.push(Spanned {
                        line: self.line - 1,
                        token: Token::Newline,
                    });
                }
                continue;
            }

            let line = self.line;
            let token = self.next_token()?;
            match &token {
                Token::Op("(") | Token::Op("[") | Token::Op("{") | Token::Op("%{") => {
                    self.depth += 1
                }
                Token::Op(")") | Token::Op("]") | Token::Op("}") => self.depth -= 1,
                _ => {}
            }
            out.push(Spanned { line, token });
        }
        Ok(out)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_inline_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('#') if self.peek_at(1) != Some('{') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> EvalResult<Token> {
        let c = self.peek().expect("checked by caller");

        if c == '"' {
            return self.lex_string();
        }
        if c == ':' && matches!(self.peek_at(1), Some(c2) if c2.is_alphabetic() || c2 == '_') {
            self.advance();
            let name = self.lex_word();
            return Ok(Token::Atom(name));
        }
        if c == ':' && self.peek_at(1) == Some('"') {
            self.advance();
            let Token::Str(segments) = self.lex_string()? else {
                unreachable!()
            };
            let literal = segments
                .into_iter()
                .map(|seg| match seg {
                    StrSegment::Literal(s) => s,
                    StrSegment::Interpolated(s) => s,
                })
                .collect();
            return Ok(Token::Atom(literal));
        }
        if c == '~' {
            return self.lex_sigil();
        }
        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c.is_alphabetic() || c == '_' {
            let word = self.lex_word();
            if let Some(lexeme) = keyword_lexeme(&word) {
                return Ok(Token::Op(lexeme));
            }
            let trailing = if matches!(self.peek(), Some('?') | Some('!')) {
                self.advance()
            } else {
                None
            };
            let mut word = word;
            if let Some(t) = trailing {
                word.push(t);
            }
            if word.chars().next().unwrap().is_uppercase() {
                return Ok(Token::Alias(word));
            }
            return Ok(Token::Ident(word));
        }

        for op in OPERATORS {
            if self.source_matches(op) {
                self.pos += op.chars().count();
                return Ok(Token::Op(op));
            }
        }

        Err(EvalError::Parse {
            line: self.line,
            message: format!("unexpected character '{c}'"),
        })
    }

    fn source_matches(&self, lexeme: &str) -> bool {
        lexeme
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn lex_word(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn lex_number(&mut self) -> EvalResult<Token> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    s.push(c);
                }
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) {
            s.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    if c != '_' {
                        s.push(c);
                    }
                    self.advance();
                } else {
                    break;
                }
            }
            let value = s.parse::<f64>().map_err(|_| EvalError::Parse {
                line: self.line,
                message: format!("invalid float literal '{s}'"),
            })?;
            return Ok(Token::Float(value));
        }
        let value = s.parse::<i64>().map_err(|_| EvalError::Parse {
            line: self.line,
            message: format!("invalid integer literal '{s}'"),
        })?;
        Ok(Token::Int(value))
    }

    /// Scans a double-quoted string, splitting `#{...}` interpolations out
    /// as raw source text rather than tokenizing them here (see
    /// [`StrSegment`]).
    fn lex_string(&mut self) -> EvalResult<Token> {
        self.advance(); // opening quote
        let mut segments = Vec::new();
        let mut literal = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(EvalError::Parse {
                        line: self.line,
                        message: "unterminated string literal".to_owned(),
                    })
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.advance().ok_or_else(|| EvalError::Parse {
                        line: self.line,
                        message: "unterminated escape sequence".to_owned(),
                    })?;
                    literal.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '"' => '"',
                        '\\' => '\\',
                        other => other,
                    });
                }
                Some('#') if self.peek_at(1) == Some('{') => {
                    if !literal.is_empty() {
                        segments.push(StrSegment::Literal(std::mem::take(&mut literal)));
                    }
                    self.advance();
                    self.advance();
                    let mut depth = 1;
                    let mut inner = String::new();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(EvalError::Parse {
                                    line: self.line,
                                    message: "unterminated string interpolation".to_owned(),
                                })
                            }
                            Some('{') => {
                                depth += 1;
                                inner.push('{');
                                self.advance();
                            }
                            Some('}') => {
                                depth -= 1;
                                self.advance();
                                if depth == 0 {
                                    break;
                                }
                                inner.push('}');
                            }
                            Some('\n') => {
                                inner.push('\n');
                                self.advance();
                                self.line += 1;
                            }
                            Some(c) => {
                                inner.push(c);
                                self.advance();
                            }
                        }
                    }
                    segments.push(StrSegment::Interpolated(inner));
                }
                Some('\n') => {
                    literal.push('\n');
                    self.advance();
                    self.line += 1;
                }
                Some(c) => {
                    literal.push(c);
                    self.advance();
                }
            }
        }
        if !literal.is_empty() || segments.is_empty() {
            segments.push(StrSegment::Literal(literal));
        }
        Ok(Token::Str(segments))
    }

    fn lex_sigil(&mut self) -> EvalResult<Token> {
        self.advance(); // '~'
        let letter = self.advance().ok_or_else(|| EvalError::Parse {
            line: self.line,
            message: "unterminated sigil".to_owned(),
        })?;
        let open = self.advance().ok_or_else(|| EvalError::Parse {
            line: self.line,
            message: "unterminated sigil".to_owned(),
        })?;
        let close = matching_delimiter(open);
        let mut content = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(EvalError::Parse {
                        line: self.line,
                        message: "unterminated sigil".to_owned(),
                    })
                }
                Some(c) if c == close => {
                    self.advance();
                    break;
                }
                Some('\n') => {
                    content.push('\n');
                    self.advance();
                    self.line += 1;
                }
                Some(c) => {
                    content.push(c);
                    self.advance();
                }
            }
        }
        let mut modifiers = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphabetic() {
                modifiers.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(Token::Sigil {
            letter,
            content,
            modifiers,
        })
    }
}

fn keyword_lexeme(word: &str) -> Option<&'static str> {
    KEYWORDS.iter().copied().find(|k| *k == word)
}

fn matching_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}
