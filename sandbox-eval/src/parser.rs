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

//! Stage P: a hand-written recursive-descent parser from tokens to
//! [`sandbox_ast::Node`].
//!
//! The parser accepts a slightly larger surface than the whitelist admits
//! (`alias`, `import`, `require`, `use`, nested `defmodule`/`def`, arbitrary
//! top-level expressions) on purpose: stage S needs a concrete node to
//! classify and reject by name, and rejecting them here instead would
//! collapse several distinct shape-validator error messages into one
//! generic parse error.

use crate::error::{EvalError, EvalResult};
use crate::lexer::{tokenize, Spanned, StrSegment, Token};
use sandbox_ast::{Clause, CondClause, ModuleRef, Node, NodeKind, StringPart, WithClause};

pub fn parse(source: &str) -> EvalResult<Node> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let node = parser.parse_defmodule()?;
    parser.skip_newlines();
    if !parser.at_eof() {
        return Err(parser.error("expected end of input after module"));
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn line(&self) -> u32 {
        self.current().line
    }

    fn at_eof(&self) -> bool {
        matches!(self.current().token, Token::Eof)
    }

    fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn advance(&mut self) -> Spanned {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while matches!(self.current().token, Token::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.current().token, Token::Newline | Token::Op(";")) {
            self.advance();
        }
    }

    fn check_op(&self, lexeme: &str) -> bool {
        matches!(&self.current().token, Token::Op(op) if *op == lexeme)
    }

    fn expect_op(&mut self, lexeme: &str) -> EvalResult<()> {
        if self.check_op(lexeme) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{lexeme}'")))
        }
    }

    fn expect_ident(&mut self) -> EvalResult<String> {
        match self.advance().token {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    // --- top level -----------------------------------------------------

    fn parse_defmodule(&mut self) -> EvalResult<Node> {
        self.skip_newlines();
        let line = self.line();
        self.expect_op("defmodule")?;
        let name = self.parse_alias_path()?;
        self.expect_op("do")?;
        let body = self.parse_block_until(&["end"])?;
        self.expect_op("end")?;
        Ok(Node::new(
            line,
            NodeKind::Defmodule {
                name,
                body: Box::new(body),
            },
        ))
    }

    fn parse_alias_path(&mut self) -> EvalResult<Vec<String>> {
        let mut parts = Vec::new();
        loop {
            match self.advance().token {
                Token::Alias(part) => parts.push(part),
                other => return Err(self.error(format!("expected module name, found {other:?}"))),
            }
            if self.check_op(".") {
                self.advance();
                continue;
            }
            break;
        }
        Ok(parts)
    }

    /// Parses statements until one of `terminators` is seen (without
    /// consuming it), wrapping more than one statement in a `Block`.
    fn parse_block_until(&mut self, terminators: &[&str]) -> EvalResult<Node> {
        let line = self.line();
        let mut statements = Vec::new();
        self.skip_separators();
        while !self.at_eof() && !terminators.iter().any(|t| self.check_op(t)) {
            statements.push(self.parse_statement()?);
            self.skip_separators();
        }
        if statements.len() == 1 {
            Ok(statements.into_iter().next().unwrap())
        } else {
            Ok(Node::new(line, NodeKind::Block(statements)))
        }
    }

    /// Like [`Self::parse_block_until`], but also stops (without consuming)
    /// as soon as the upcoming tokens look like the head of another
    /// `pattern [, pattern]* [when guard] ->` clause. `case`/`fn`/`with`
    /// `else` share no separator between one clause's body and the next
    /// clause's head other than this lookahead: nothing but the body's own
    /// grammar would otherwise tell a one-statement body from "this
    /// statement plus everything after it".
    fn parse_clause_body(&mut self, terminators: &[&str]) -> EvalResult<Node> {
        let line = self.line();
        let mut statements = Vec::new();
        self.skip_separators();
        while !self.at_eof()
            && !terminators.iter().any(|t| self.check_op(t))
            && !self.at_pattern_clause_head()
        {
            statements.push(self.parse_statement()?);
            self.skip_separators();
        }
        if statements.len() == 1 {
            Ok(statements.into_iter().next().unwrap())
        } else {
            Ok(Node::new(line, NodeKind::Block(statements)))
        }
    }

    /// Speculatively checks whether the upcoming tokens form a new
    /// `pattern [, pattern]* [when guard] ->` clause head, without
    /// consuming anything. `->` is never a valid continuation of a body
    /// expression in this grammar, so a true result unambiguously means
    /// "this is the next clause, not more of the current body".
    fn at_pattern_clause_head(&mut self) -> bool {
        let checkpoint = self.pos;
        let looks_like_head = (|| -> EvalResult<bool> {
            self.parse_pattern()?;
            while self.check_op(",") {
                self.advance();
                self.parse_pattern()?;
            }
            if self.check_op("when") {
                self.advance();
                self.parse_expr()?;
            }
            Ok(self.check_op("->"))
        })()
        .unwrap_or(false);
        self.pos = checkpoint;
        looks_like_head
    }

    /// As [`Self::at_pattern_clause_head`], for `cond`'s `expr -> body`
    /// clauses, whose heads are general expressions rather than patterns.
    fn at_expr_clause_head(&mut self) -> bool {
        let checkpoint = self.pos;
        let looks_like_head = (|| -> EvalResult<bool> {
            self.parse_expr()?;
            Ok(self.check_op("->"))
        })()
        .unwrap_or(false);
        self.pos = checkpoint;
        looks_like_head
    }

    /// As [`Self::parse_clause_body`], for `cond` clauses.
    fn parse_cond_clause_body(&mut self, terminators: &[&str]) -> EvalResult<Node> {
        let line = self.line();
        let mut statements = Vec::new();
        self.skip_separators();
        while !self.at_eof()
            && !terminators.iter().any(|t| self.check_op(t))
            && !self.at_expr_clause_head()
        {
            statements.push(self.parse_statement()?);
            self.skip_separators();
        }
        if statements.len() == 1 {
            Ok(statements.into_iter().next().unwrap())
        } else {
            Ok(Node::new(line, NodeKind::Block(statements)))
        }
    }

    // --- statements ------------------------------------------------------

    fn parse_statement(&mut self) -> EvalResult<Node> {
        let line = self.line();
        match &self.current().token {
            Token::Op("def") | Token::Op("defp") => self.parse_def(),
            Token::Op("defmodule") => self.parse_defmodule(),
            Token::Op("alias") => {
                self.advance();
                self.skip_to_line_end();
                Ok(Node::new(line, NodeKind::Alias))
            }
            Token::Op("import") => {
                self.advance();
                self.skip_to_line_end();
                Ok(Node::new(line, NodeKind::Import))
            }
            Token::Op("require") => {
                self.advance();
                self.skip_to_line_end();
                Ok(Node::new(line, NodeKind::Require))
            }
            Token::Op("use") => {
                self.advance();
                self.skip_to_line_end();
                Ok(Node::new(line, NodeKind::Use))
            }
            Token::Op("@") => self.parse_attribute(),
            _ => self.parse_expr(),
        }
    }

    fn skip_to_line_end(&mut self) {
        while !matches!(self.current().token, Token::Newline | Token::Eof | Token::Op(";")) {
            self.advance();
        }
    }

    fn parse_attribute(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("@")?;
        let name = self.expect_ident()?;
        let value = self.parse_expr()?;
        Ok(Node::new(
            line,
            NodeKind::Attribute {
                name,
                value: Box::new(value),
            },
        ))
    }

    fn parse_def(&mut self) -> EvalResult<Node> {
        let line = self.line();
        let private = self.check_op("defp");
        self.advance(); // def | defp
        let name = self.expect_ident()?;
        let mut params = Vec::new();
        if self.check_op("(") {
            self.advance();
            while !self.check_op(")") {
                params.push(self.parse_pattern()?);
                if self.check_op(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect_op(")")?;
        }
        let guard = if self.check_op("when") {
            self.advance();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_op("do")?;
        let body = self.parse_block_until(&["end"])?;
        self.expect_op("end")?;
        Ok(Node::new(
            line,
            NodeKind::Def {
                name,
                params,
                guard,
                body: Box::new(body),
                private,
            },
        ))
    }

    // --- expressions, precedence-climbing --------------------------------
    //
    // Lowest to highest: `=` match, `|>` pipe, `||`/`or`, `&&`/`and`,
    // equality, comparison, `<>`/`++`, additive, multiplicative, unary,
    // postfix call/capture, primary.

    fn parse_expr(&mut self) -> EvalResult<Node> {
        self.parse_match()
    }

    fn parse_match(&mut self) -> EvalResult<Node> {
        let line = self.line();
        let lhs = self.parse_pipe()?;
        if self.check_op("=") {
            self.advance();
            let rhs = self.parse_match()?;
            return Ok(Node::new(
                line,
                NodeKind::Match {
                    pattern: Box::new(lhs),
                    value: Box::new(rhs),
                },
            ));
        }
        Ok(lhs)
    }

    fn parse_pipe(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_or()?;
        while self.check_op("|>") {
            let line = self.line();
            self.advance();
            let rhs = self.parse_or()?;
            lhs = Node::new(
                line,
                NodeKind::Pipe {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn parse_binop_level(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> EvalResult<Node>,
    ) -> EvalResult<Node> {
        let mut lhs = next(self)?;
        loop {
            let matched = ops.iter().find(|op| self.check_op(op));
            let Some(op) = matched else { break };
            let line = self.line();
            let op = (*op).to_owned();
            self.advance();
            let rhs = next(self)?;
            lhs = Node::new(
                line,
                NodeKind::Op {
                    op,
                    args: vec![lhs, rhs],
                },
            );
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> EvalResult<Node> {
        self.parse_binop_level(&["||", "or"], Self::parse_and)
    }

    fn parse_and(&mut self) -> EvalResult<Node> {
        self.parse_binop_level(&["&&", "and"], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> EvalResult<Node> {
        self.parse_binop_level(&["===", "!==", "==", "!="], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> EvalResult<Node> {
        self.parse_binop_level(&[">=", "<=", ">", "<"], Self::parse_concat)
    }

    fn parse_concat(&mut self) -> EvalResult<Node> {
        self.parse_binop_level(&["<>", "++"], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> EvalResult<Node> {
        self.parse_binop_level(&["+", "-"], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> EvalResult<Node> {
        self.parse_binop_level(&["*", "/"], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> EvalResult<Node> {
        if self.check_op("not") || self.check_op("-") {
            let line = self.line();
            let op = match self.advance().token {
                Token::Op(op) => op.to_owned(),
                _ => unreachable!(),
            };
            let operand = self.parse_unary()?;
            return Ok(Node::new(
                line,
                NodeKind::Op {
                    op,
                    args: vec![operand],
                },
            ));
        }
        if self.check_op("&") {
            return self.parse_capture();
        }
        self.parse_postfix()
    }

    fn parse_capture(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("&")?;
        let (module, name) = self.parse_callable_path()?;
        self.expect_op("/")?;
        let arity = self.parse_int_literal()?;
        Ok(Node::new(
            line,
            NodeKind::Capture {
                module,
                name,
                arity: arity as u32,
            },
        ))
    }

    fn parse_int_literal(&mut self) -> EvalResult<i64> {
        match self.advance().token {
            Token::Int(n) => Ok(n),
            other => Err(self.error(format!("expected integer, found {other:?}"))),
        }
    }

    /// Parses `Mod.fun` or `fun` without consuming a following `(`/`/`; used
    /// by both call parsing and capture parsing.
    fn parse_callable_path(&mut self) -> EvalResult<(Option<ModuleRef>, String)> {
        if let Token::Alias(_) = &self.current().token {
            let parts = self.parse_alias_path()?;
            self.expect_op(".")?;
            let name = self.expect_ident()?;
            return Ok((Some(ModuleRef(parts.join("."))), name));
        }
        let name = self.expect_ident()?;
        Ok((None, name))
    }

    /// Calls and qualified calls are fully resolved inside [`Self::parse_primary`]
    /// (an identifier or alias path immediately followed by `(` becomes a
    /// `Call` there); this surface has no first-class invocable values, so
    /// there is no separate postfix-call production.
    fn parse_postfix(&mut self) -> EvalResult<Node> {
        self.parse_primary()
    }

    fn parse_arg_list(&mut self) -> EvalResult<Vec<Node>> {
        self.expect_op("(")?;
        let mut args = Vec::new();
        self.skip_newlines();
        while !self.check_op(")") {
            args.push(self.parse_expr()?);
            self.skip_newlines();
            if self.check_op(",") {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.skip_newlines();
        self.expect_op(")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> EvalResult<Node> {
        let line = self.line();
        match self.current().token.clone() {
            Token::Int(n) => {
                self.advance();
                Ok(Node::new(line, NodeKind::Int(n)))
            }
            Token::Float(n) => {
                self.advance();
                Ok(Node::new(line, NodeKind::Float(n)))
            }
            Token::Str(segments) => {
                self.advance();
                self.build_string_node(line, segments)
            }
            Token::Atom(a) => {
                self.advance();
                Ok(Node::new(line, NodeKind::Atom(a)))
            }
            Token::Op("true") => {
                self.advance();
                Ok(Node::new(line, NodeKind::Bool(true)))
            }
            Token::Op("false") => {
                self.advance();
                Ok(Node::new(line, NodeKind::Bool(false)))
            }
            Token::Op("nil") => {
                self.advance();
                Ok(Node::new(line, NodeKind::Nil))
            }
            Token::Sigil {
                letter,
                content,
                modifiers,
            } => {
                self.advance();
                Ok(Node::new(
                    line,
                    NodeKind::Sigil {
                        letter,
                        content,
                        modifiers,
                    },
                ))
            }
            Token::Op("(") => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect_op(")")?;
                Ok(inner)
            }
            Token::Op("[") => self.parse_list(),
            Token::Op("{") => self.parse_tuple(),
            Token::Op("%{") => self.parse_map(),
            Token::Op("<<") => self.parse_bitstring_literal(),
            Token::Op("fn") => self.parse_fn(),
            Token::Op("case") => self.parse_case(),
            Token::Op("cond") => self.parse_cond(),
            Token::Op("with") => self.parse_with(),
            Token::Op("&") => self.parse_capture(),
            Token::Alias(_) => {
                let parts = self.parse_alias_path()?;
                if self.check_op(".") {
                    self.advance();
                    let name = self.expect_ident()?;
                    let args = if self.check_op("(") {
                        self.parse_arg_list()?
                    } else {
                        Vec::new()
                    };
                    return Ok(Node::new(
                        line,
                        NodeKind::Call {
                            module: Some(ModuleRef(parts.join("."))),
                            name,
                            args,
                        },
                    ));
                }
                // A bare alias with no qualified call is not part of the
                // admitted surface; represent it as an identifier so stage V
                // can reject it uniformly as an unbound reference.
                Ok(Node::new(line, NodeKind::Ident(parts.join("."))))
            }
            Token::Ident(name) => {
                self.advance();
                if self.check_op("(") {
                    let args = self.parse_arg_list()?;
                    return Ok(Node::new(
                        line,
                        NodeKind::Call {
                            module: None,
                            name,
                            args,
                        },
                    ));
                }
                Ok(Node::new(line, NodeKind::Ident(name)))
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn build_string_node(&mut self, line: u32, segments: Vec<StrSegment>) -> EvalResult<Node> {
        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                StrSegment::Literal(s) => parts.push(StringPart::Literal(s)),
                StrSegment::Interpolated(raw) => {
                    let inner = parse_expr_fragment(&raw)?;
                    parts.push(StringPart::Interpolated(Box::new(inner)));
                }
            }
        }
        Ok(Node::new(line, NodeKind::Str(parts)))
    }

    fn parse_list(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("[")?;
        self.skip_newlines();
        let mut items = Vec::new();
        let mut tail = None;
        while !self.check_op("]") {
            let item = self.parse_expr()?;
            self.skip_newlines();
            if self.check_op("|") {
                self.advance();
                self.skip_newlines();
                tail = Some(Box::new(self.parse_expr()?));
                self.skip_newlines();
                break;
            }
            items.push(item);
            if self.check_op(",") {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.skip_newlines();
        self.expect_op("]")?;
        Ok(Node::new(line, NodeKind::ListCons { items, tail }))
    }

    fn parse_tuple(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("{")?;
        self.skip_newlines();
        let mut items = Vec::new();
        while !self.check_op("}") {
            items.push(self.parse_expr()?);
            self.skip_newlines();
            if self.check_op(",") {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.skip_newlines();
        self.expect_op("}")?;
        Ok(Node::new(line, NodeKind::Tuple(items)))
    }

    fn parse_map(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("%{")?;
        self.skip_newlines();

        // `%{base | k: v, ...}` map update.
        let checkpoint = self.pos;
        if let Ok(base) = self.try_parse_map_update_base() {
            let entries = self.parse_map_entries("}")?;
            self.expect_op("}")?;
            return Ok(Node::new(
                line,
                NodeKind::MapUpdate {
                    base: Box::new(base),
                    entries,
                },
            ));
        }
        self.pos = checkpoint;

        let entries = self.parse_map_entries("}")?;
        self.expect_op("}")?;
        Ok(Node::new(line, NodeKind::MapLiteral(entries)))
    }

    fn try_parse_map_update_base(&mut self) -> EvalResult<Node> {
        let base = self.parse_expr()?;
        self.skip_newlines();
        self.expect_op("|")?;
        self.skip_newlines();
        Ok(base)
    }

    fn parse_map_entries(&mut self, terminator: &str) -> EvalResult<Vec<(Node, Node)>> {
        let mut entries = Vec::new();
        while !self.check_op(terminator) {
            let key = self.parse_map_key()?;
            self.skip_newlines();
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.skip_newlines();
            if self.check_op(",") {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.skip_newlines();
        Ok(entries)
    }

    /// Accepts either `key: value` shorthand (desugared to the atom `key`)
    /// or `expr => value`.
    fn parse_map_key(&mut self) -> EvalResult<Node> {
        let line = self.line();
        if let Token::Ident(name) = &self.current().token {
            let name = name.clone();
            let save = self.pos;
            self.advance();
            if self.check_op(":") {
                self.advance();
                return Ok(Node::new(line, NodeKind::Atom(name)));
            }
            self.pos = save;
        }
        let key = self.parse_expr()?;
        self.expect_op("=>")?;
        Ok(key)
    }

    fn parse_bitstring_literal(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("<<")?;
        let mut bytes = Vec::new();
        self.skip_newlines();
        while !self.check_op(">>") {
            let n = self.parse_int_literal()?;
            bytes.push(n as u8);
            self.skip_newlines();
            if self.check_op(",") {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.expect_op(">>")?;
        Ok(Node::new(line, NodeKind::Bitstring(bytes)))
    }

    fn parse_fn(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("fn")?;
        self.skip_newlines();
        let mut clauses = Vec::new();
        while !self.check_op("end") {
            let mut patterns = Vec::new();
            if !self.check_op("->") {
                patterns.push(self.parse_pattern()?);
                while self.check_op(",") {
                    self.advance();
                    patterns.push(self.parse_pattern()?);
                }
            }
            let guard = if self.check_op("when") {
                self.advance();
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            self.expect_op("->")?;
            let body = self.parse_clause_body(&["end"])?;
            clauses.push(Clause {
                patterns,
                guard,
                body: Box::new(body),
            });
            self.skip_newlines();
        }
        self.expect_op("end")?;
        Ok(Node::new(line, NodeKind::Fn(clauses)))
    }

    fn parse_case(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("case")?;
        let subject = self.parse_expr()?;
        self.expect_op("do")?;
        self.skip_newlines();
        let mut clauses = Vec::new();
        while !self.check_op("end") {
            let pattern = self.parse_pattern()?;
            let guard = if self.check_op("when") {
                self.advance();
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            self.expect_op("->")?;
            let body = self.parse_clause_body(&["end"])?;
            clauses.push(Clause {
                patterns: vec![pattern],
                guard,
                body: Box::new(body),
            });
            self.skip_newlines();
        }
        self.expect_op("end")?;
        Ok(Node::new(
            line,
            NodeKind::Case {
                subject: Box::new(subject),
                clauses,
            },
        ))
    }

    fn parse_cond(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("cond")?;
        self.expect_op("do")?;
        self.skip_newlines();
        let mut clauses = Vec::new();
        while !self.check_op("end") {
            let condition = self.parse_expr()?;
            self.expect_op("->")?;
            let body = self.parse_cond_clause_body(&["end"])?;
            clauses.push(CondClause {
                condition: Box::new(condition),
                body: Box::new(body),
            });
            self.skip_newlines();
        }
        self.expect_op("end")?;
        Ok(Node::new(line, NodeKind::Cond(clauses)))
    }

    fn parse_with(&mut self) -> EvalResult<Node> {
        let line = self.line();
        self.expect_op("with")?;
        let mut clauses = Vec::new();
        loop {
            let pattern = self.parse_pattern()?;
            self.expect_op("<-")?;
            let expr = self.parse_expr()?;
            clauses.push(WithClause {
                pattern: Box::new(pattern),
                expr: Box::new(expr),
            });
            if self.check_op(",") {
                self.advance();
                continue;
            }
            break;
        }
        self.expect_op("do")?;
        let body = self.parse_block_until(&["else", "end"])?;
        let mut else_clauses = Vec::new();
        if self.check_op("else") {
            self.advance();
            self.skip_newlines();
            while !self.check_op("end") {
                let pattern = self.parse_pattern()?;
                self.expect_op("->")?;
                let clause_body = self.parse_clause_body(&["end", "else"])?;
                else_clauses.push(Clause {
                    patterns: vec![pattern],
                    guard: None,
                    body: Box::new(clause_body),
                });
                self.skip_newlines();
            }
        }
        self.expect_op("end")?;
        Ok(Node::new(
            line,
            NodeKind::With {
                clauses,
                body: Box::new(body),
                else_clauses,
            },
        ))
    }

    /// Patterns share the expression grammar in this surface (no separate
    /// pattern-only productions beyond what `parse_postfix`/`parse_primary`
    /// already accept for literals, identifiers, tuples, lists and maps).
    fn parse_pattern(&mut self) -> EvalResult<Node> {
        self.parse_pipe()
    }
}

/// Parses a string-interpolation fragment as a standalone expression; used
/// by [`Parser::build_string_node`] on the raw text captured between `#{`
/// and `}`.
fn parse_expr_fragment(source: &str) -> EvalResult<Node> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let node = parser.parse_expr()?;
    parser.skip_newlines();
    Ok(node)
}
