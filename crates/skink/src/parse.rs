use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    ast::{
        AssignOp, Ast, BinaryOp, LitValue, LocSpan, LogicalOp, Node, NodeId, NodeKind, PropertyKind, Span, UnaryOp,
        UpdateOp,
    },
    error::{CodeLoc, Exception},
    lex::{CommentHandler, Kw, Lexer, Punct, Token, TokenKind},
};

/// Language edition accepted by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EcmaVersion {
    V3,
    #[default]
    V5,
}

/// Parser configuration, mirroring the embedder-facing option set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOptions {
    pub ecma_version: EcmaVersion,
    /// Disables automatic semicolon insertion.
    pub strict_semicolons: bool,
    /// Rejects trailing commas in array and object literals when false.
    /// ES5 allows them, so the default is permissive.
    pub forbid_trailing_commas: bool,
    /// Treats non-strict reserved words as errors.
    pub forbid_reserved: bool,
    /// Records `loc` line/column pairs on every node.
    pub locations: bool,
    /// Marks nodes as carrying a `range` in the ESTree export.
    pub ranges: bool,
    /// Diagnostic file name attached to the AST.
    pub source_file: Option<String>,
}

impl ParseOptions {
    fn allow_trailing_commas(&self) -> bool {
        !self.forbid_trailing_commas && self.ecma_version == EcmaVersion::V5
    }
}

/// Maximum nesting depth for statements and expressions during parsing.
/// Recursive descent otherwise turns pathological nesting like
/// `((((…))))` into a host stack overflow.
const MAX_NESTING_DEPTH: u16 = 200;

/// Words reserved by ES3 beyond the keyword set.
const RESERVED_ES3: &[&str] = &[
    "abstract",
    "boolean",
    "byte",
    "char",
    "class",
    "const",
    "double",
    "enum",
    "export",
    "extends",
    "final",
    "float",
    "goto",
    "implements",
    "import",
    "int",
    "interface",
    "long",
    "native",
    "package",
    "private",
    "protected",
    "public",
    "short",
    "static",
    "super",
    "synchronized",
    "throws",
    "transient",
    "volatile",
];

/// Words reserved by ES5 (non-strict).
const RESERVED_ES5: &[&str] = &["class", "const", "enum", "export", "extends", "import", "super"];

/// Additional words reserved in strict mode.
const RESERVED_STRICT: &[&str] = &[
    "implements",
    "interface",
    "let",
    "package",
    "private",
    "protected",
    "public",
    "static",
    "yield",
];

#[derive(Clone, Copy, PartialEq)]
enum LabelKind {
    Loop,
    Switch,
    Other,
}

struct Label {
    name: Option<String>,
    kind: LabelKind,
    /// Start offset of the statement this label currently fronts; chained
    /// labels all point at the innermost statement so `a: b: for(;;)` makes
    /// both labels loop labels.
    statement_start: u32,
}

/// Parses `source` into the arena, returning the Program node.
///
/// When `extend` names an existing Program, the new top-level statements are
/// appended to its body instead (the `program` parser option); the Program's
/// strictness is inherited and the same node id is returned.
pub fn parse_program(
    ast: &mut Ast,
    source: &str,
    options: &ParseOptions,
    on_comment: Option<Box<CommentHandler<'_>>>,
    extend: Option<NodeId>,
) -> Result<NodeId, Exception> {
    let initial_strict = match extend.map(|p| ast.kind(p)) {
        Some(NodeKind::Program { strict, .. }) => *strict,
        Some(other) => panic!("extend target must be a Program, found {}", other.type_str()),
        None => false,
    };
    if let Some(file) = &options.source_file {
        ast.source_file = Some(file.clone());
    }
    let mut parser = Parser::new(ast, source, options, on_comment, initial_strict)?;
    parser.parse_top_level(extend)
}

/// Parses `source` as an eval body: a fresh Program node sharing the arena,
/// strict iff the calling context is strict or the body has a directive.
pub(crate) fn parse_eval(ast: &mut Ast, source: &str, strict: bool) -> Result<NodeId, Exception> {
    let options = ParseOptions::default();
    let mut parser = Parser::new(ast, source, &options, None, strict)?;
    parser.parse_top_level(None)
}

struct Parser<'a, 'src> {
    ast: &'a mut Ast,
    lexer: Lexer<'src>,
    options: &'a ParseOptions,
    cur: Token,
    prev_end: u32,
    prev_end_loc: CodeLoc,
    strict: bool,
    in_function: bool,
    labels: Vec<Label>,
    depth: u16,
}

impl<'a, 'src> Parser<'a, 'src> {
    fn new(
        ast: &'a mut Ast,
        source: &'src str,
        options: &'a ParseOptions,
        on_comment: Option<Box<CommentHandler<'src>>>,
        strict: bool,
    ) -> Result<Self, Exception> {
        let mut lexer = Lexer::new(source).with_comment_handler(on_comment, options.locations);
        lexer.strict = strict;
        let cur = lexer.next_token()?;
        Ok(Self {
            ast,
            lexer,
            options,
            cur,
            prev_end: 0,
            prev_end_loc: CodeLoc { line: 1, column: 0 },
            strict,
            in_function: false,
            labels: Vec::new(),
            depth: 0,
        })
    }

    // === token plumbing ===

    fn bump(&mut self) -> Result<Token, Exception> {
        self.prev_end = self.cur.end;
        self.prev_end_loc = self.cur.end_loc;
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.cur, next))
    }

    fn eat(&mut self, p: Punct) -> Result<bool, Exception> {
        if self.cur.is_punct(p) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, p: Punct) -> Result<(), Exception> {
        if !self.eat(p)? {
            return Err(self.unexpected());
        }
        Ok(())
    }

    fn unexpected(&self) -> Exception {
        Exception::syntax("unexpected token", self.cur.start_loc)
    }

    fn error_at(&self, message: impl Into<String>, loc: CodeLoc) -> Exception {
        Exception::syntax(message, loc)
    }

    fn error_here(&self, message: impl Into<String>) -> Exception {
        Exception::syntax(message, self.cur.start_loc)
    }

    fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
        self.lexer.strict = strict;
    }

    // === node construction ===

    fn start(&self) -> (u32, CodeLoc) {
        (self.cur.start, self.cur.start_loc)
    }

    fn finish(&mut self, kind: NodeKind, start: (u32, CodeLoc)) -> NodeId {
        let loc = self.options.locations.then_some(LocSpan {
            start: start.1,
            end: self.prev_end_loc,
        });
        self.ast.push(Node {
            kind,
            span: Some(Span {
                start: start.0,
                end: self.prev_end,
            }),
            loc,
        })
    }

    // === semicolons & ASI ===

    fn can_insert_semicolon(&self) -> bool {
        self.cur.kind == TokenKind::Eof || self.cur.is_punct(Punct::RBrace) || self.cur.newline_before
    }

    fn semicolon(&mut self) -> Result<(), Exception> {
        if self.eat(Punct::Semi)? {
            return Ok(());
        }
        if !self.options.strict_semicolons && self.can_insert_semicolon() {
            return Ok(());
        }
        Err(self.unexpected())
    }

    // === identifiers & reserved words ===

    fn check_reserved(&self, name: &str, loc: CodeLoc) -> Result<(), Exception> {
        let reserved: &[&str] = match self.options.ecma_version {
            EcmaVersion::V3 => RESERVED_ES3,
            EcmaVersion::V5 => RESERVED_ES5,
        };
        if self.options.forbid_reserved && reserved.contains(&name) {
            return Err(self.error_at(format!("the keyword {name} is reserved"), loc));
        }
        if self.strict && RESERVED_STRICT.contains(&name) {
            return Err(self.error_at(format!("the keyword {name} is reserved in strict mode"), loc));
        }
        Ok(())
    }

    /// Checks a name being bound (var, param, function name, catch param).
    fn check_binding(&self, name: &str, loc: CodeLoc) -> Result<(), Exception> {
        if self.strict && (name == "eval" || name == "arguments") {
            return Err(self.error_at(format!("binding {name} in strict mode"), loc));
        }
        Ok(())
    }

    fn parse_ident(&mut self, binding: bool) -> Result<NodeId, Exception> {
        let start = self.start();
        let token = self.bump()?;
        let name = match token.kind {
            TokenKind::Ident(name) => name,
            // A keyword with a unicode escape reaches us as Ident, so the
            // remaining keyword tokens are always invalid here.
            _ => return Err(self.error_at("unexpected token", start.1)),
        };
        self.check_reserved(&name, start.1)?;
        if binding {
            self.check_binding(&name, start.1)?;
        }
        Ok(self.finish(NodeKind::Identifier { name }, start))
    }

    /// Property names also admit keywords in ES5 (`a.default`).
    fn parse_property_ident(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        let token = self.bump()?;
        let name = match token.kind {
            TokenKind::Ident(name) => name,
            TokenKind::Keyword(_) if self.options.ecma_version == EcmaVersion::V5 => {
                // Recover the spelling from the raw keyword.
                kw_text(&token).to_string()
            }
            _ => return Err(self.error_at("unexpected token", start.1)),
        };
        Ok(self.finish(NodeKind::Identifier { name }, start))
    }

    // === top level ===

    fn parse_top_level(&mut self, extend: Option<NodeId>) -> Result<NodeId, Exception> {
        let start = (0, CodeLoc { line: 1, column: 0 });
        let mut body = Vec::new();
        let strict = self.parse_body_with_directives(&mut body, true)?;
        if self.cur.kind != TokenKind::Eof {
            return Err(self.unexpected());
        }
        if let Some(program) = extend {
            self.ast.extend_program(program, &body);
            return Ok(program);
        }
        Ok(self.finish(NodeKind::Program { body, strict }, start))
    }

    /// Parses statements up to `}`/EOF, handling the directive prologue.
    /// Returns whether the body is strict.
    fn parse_body_with_directives(&mut self, body: &mut Vec<NodeId>, top_level: bool) -> Result<bool, Exception> {
        let outer_strict = self.strict;
        let mut in_prologue = true;
        loop {
            let done = if top_level {
                self.cur.kind == TokenKind::Eof
            } else {
                self.cur.is_punct(Punct::RBrace)
            };
            if done {
                break;
            }
            if in_prologue {
                if let TokenKind::Str(text) = &self.cur.kind {
                    // "use strict" must be escape-free: 12 chars + 2 quotes.
                    if text == "use strict" && self.cur.end - self.cur.start == 14 {
                        self.set_strict(true);
                    }
                } else {
                    in_prologue = false;
                }
            }
            let stmt = self.parse_statement()?;
            if in_prologue {
                let is_directive = matches!(
                    self.ast.kind(stmt),
                    NodeKind::ExpressionStatement { expression }
                        if matches!(self.ast.kind(*expression), NodeKind::Literal { value: LitValue::Str(_) })
                );
                if !is_directive {
                    in_prologue = false;
                    // A statement merely starting with a string literal is
                    // not a directive; undo a premature strict switch.
                    if !outer_strict && !body.iter().any(|s| is_use_strict(self.ast, *s)) {
                        self.set_strict(false);
                    }
                }
            }
            body.push(stmt);
        }
        Ok(self.strict)
    }

    // === statements ===

    fn parse_statement(&mut self) -> Result<NodeId, Exception> {
        self.depth += 1;
        let result = self.parse_statement_inner();
        self.depth -= 1;
        result
    }

    fn parse_statement_inner(&mut self) -> Result<NodeId, Exception> {
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error_here("statement nesting is too deep"));
        }
        let start = self.start();
        if self.cur.is_punct(Punct::LBrace) {
            return self.parse_block();
        }
        if self.cur.is_punct(Punct::Semi) {
            self.bump()?;
            return Ok(self.finish(NodeKind::EmptyStatement, start));
        }
        let kw = match &self.cur.kind {
            TokenKind::Keyword(kw) => Some(*kw),
            _ => None,
        };
        let Some(kw) = kw else {
            return self.parse_expression_statement();
        };
        match kw {
            Kw::Var => {
                self.bump()?;
                let declarations = self.parse_var_declarations(false)?;
                self.semicolon()?;
                Ok(self.finish(NodeKind::VariableDeclaration { declarations }, start))
            }
            Kw::Function => self.parse_function(true),
            Kw::If => self.parse_if(),
            Kw::For => self.parse_for(),
            Kw::While => self.parse_while(),
            Kw::Do => self.parse_do_while(),
            Kw::Return => self.parse_return(),
            Kw::Break | Kw::Continue => self.parse_break_continue(),
            Kw::Throw => self.parse_throw(),
            Kw::Try => self.parse_try(),
            Kw::Switch => self.parse_switch(),
            Kw::With => self.parse_with(),
            Kw::Debugger => {
                self.bump()?;
                self.semicolon()?;
                Ok(self.finish(NodeKind::DebuggerStatement, start))
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Upgrades labels fronting the statement that starts here to `kind`.
    fn mark_enclosing_labels(&mut self, kind: LabelKind) {
        let here = self.cur.start;
        for label in &mut self.labels {
            if label.name.is_some() && label.statement_start == here {
                label.kind = kind;
            }
        }
    }

    fn parse_expression_statement(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        let was_ident = matches!(self.cur.kind, TokenKind::Ident(_));
        let expression = self.parse_expression(false)?;
        // `ident :` turns an expression statement into a labeled statement.
        if was_ident
            && self.cur.is_punct(Punct::Colon)
            && matches!(self.ast.kind(expression), NodeKind::Identifier { .. })
        {
            let name = self.ast.ident_name(expression).to_string();
            if self.labels.iter().any(|l| l.name.as_deref() == Some(&name)) {
                return Err(self.error_at(format!("label {name} already declared"), start.1));
            }
            self.bump()?;
            let statement_start = self.cur.start;
            // All enclosing labels now front the same inner statement.
            for label in &mut self.labels {
                if label.name.is_some() {
                    label.statement_start = statement_start;
                }
            }
            self.labels.push(Label {
                name: Some(name),
                kind: LabelKind::Other,
                statement_start,
            });
            let body = self.parse_statement();
            self.labels.pop();
            let body = body?;
            return Ok(self.finish(
                NodeKind::LabeledStatement {
                    label: expression,
                    body,
                },
                start,
            ));
        }
        self.semicolon()?;
        Ok(self.finish(NodeKind::ExpressionStatement { expression }, start))
    }

    fn parse_block(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.expect(Punct::LBrace)?;
        let mut body = Vec::new();
        while !self.cur.is_punct(Punct::RBrace) {
            if self.cur.kind == TokenKind::Eof {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.bump()?;
        Ok(self.finish(NodeKind::BlockStatement { body }, start))
    }

    fn parse_var_declarations(&mut self, no_in: bool) -> Result<Vec<NodeId>, Exception> {
        let mut declarations = Vec::new();
        loop {
            let start = self.start();
            let id = self.parse_ident(true)?;
            let init = if self.eat(Punct::Assign)? {
                Some(self.parse_assign(no_in)?)
            } else {
                None
            };
            declarations.push(self.finish(NodeKind::VariableDeclarator { id, init }, start));
            if !self.eat(Punct::Comma)? {
                return Ok(declarations);
            }
        }
    }

    fn parse_if(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.bump()?;
        self.expect(Punct::LParen)?;
        let test = self.parse_expression(false)?;
        self.expect(Punct::RParen)?;
        let consequent = self.parse_statement()?;
        let alternate = if self.cur.is_kw(Kw::Else) {
            self.bump()?;
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(self.finish(
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            },
            start,
        ))
    }

    fn parse_loop_body(&mut self) -> Result<NodeId, Exception> {
        self.labels.push(Label {
            name: None,
            kind: LabelKind::Loop,
            statement_start: 0,
        });
        let body = self.parse_statement();
        self.labels.pop();
        body
    }

    fn parse_while(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.mark_enclosing_labels(LabelKind::Loop);
        self.bump()?;
        self.expect(Punct::LParen)?;
        let test = self.parse_expression(false)?;
        self.expect(Punct::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(self.finish(NodeKind::WhileStatement { test, body }, start))
    }

    fn parse_do_while(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.mark_enclosing_labels(LabelKind::Loop);
        self.bump()?;
        let body = self.parse_loop_body()?;
        if !self.cur.is_kw(Kw::While) {
            return Err(self.unexpected());
        }
        self.bump()?;
        self.expect(Punct::LParen)?;
        let test = self.parse_expression(false)?;
        self.expect(Punct::RParen)?;
        // ES5 allows omitting the semicolon after do/while unconditionally.
        self.eat(Punct::Semi)?;
        Ok(self.finish(NodeKind::DoWhileStatement { body, test }, start))
    }

    fn parse_for(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.mark_enclosing_labels(LabelKind::Loop);
        self.bump()?;
        self.expect(Punct::LParen)?;

        if self.eat(Punct::Semi)? {
            return self.parse_for_rest(start, None);
        }
        if self.cur.is_kw(Kw::Var) {
            let var_start = self.start();
            self.bump()?;
            let declarations = self.parse_var_declarations(true)?;
            let decl = self.finish(
                NodeKind::VariableDeclaration {
                    declarations: declarations.clone(),
                },
                var_start,
            );
            if self.cur.is_kw(Kw::In) {
                if declarations.len() != 1 {
                    return Err(self.error_at("for-in loop variable must be a single declaration", var_start.1));
                }
                return self.parse_for_in(start, decl);
            }
            self.expect(Punct::Semi)?;
            return self.parse_for_rest(start, Some(decl));
        }
        // Parse the initializer with `in` forbidden, then re-dispatch.
        let init = self.parse_expression(true)?;
        if self.cur.is_kw(Kw::In) {
            self.check_lvalue(init, "for-in loop variable")?;
            return self.parse_for_in(start, init);
        }
        self.expect(Punct::Semi)?;
        self.parse_for_rest(start, Some(init))
    }

    fn parse_for_rest(&mut self, start: (u32, CodeLoc), init: Option<NodeId>) -> Result<NodeId, Exception> {
        let test = if self.cur.is_punct(Punct::Semi) {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.expect(Punct::Semi)?;
        let update = if self.cur.is_punct(Punct::RParen) {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.expect(Punct::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(self.finish(
            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            },
            start,
        ))
    }

    fn parse_for_in(&mut self, start: (u32, CodeLoc), left: NodeId) -> Result<NodeId, Exception> {
        self.bump()?;
        let right = self.parse_expression(false)?;
        self.expect(Punct::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(self.finish(NodeKind::ForInStatement { left, right, body }, start))
    }

    fn parse_return(&mut self) -> Result<NodeId, Exception> {
        if !self.in_function {
            return Err(self.error_here("'return' outside of function"));
        }
        let start = self.start();
        self.bump()?;
        let argument = if self.cur.is_punct(Punct::Semi)
            || self.cur.is_punct(Punct::RBrace)
            || self.cur.kind == TokenKind::Eof
            || self.cur.newline_before
        {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.semicolon()?;
        Ok(self.finish(NodeKind::ReturnStatement { argument }, start))
    }

    fn parse_break_continue(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        let is_break = self.cur.is_kw(Kw::Break);
        let verb = if is_break { "break" } else { "continue" };
        self.bump()?;
        let label = if matches!(self.cur.kind, TokenKind::Ident(_)) && !self.cur.newline_before {
            Some(self.parse_ident(false)?)
        } else {
            None
        };
        // Legality by label-stack inspection.
        let target = label.map(|l| self.ast.ident_name(l).to_string());
        let legal = self.labels.iter().any(|entry| match (&target, &entry.name) {
            (Some(want), Some(have)) => want == have && (is_break || entry.kind == LabelKind::Loop),
            (Some(_), None) => false,
            (None, _) => {
                entry.kind == LabelKind::Loop || (is_break && entry.kind == LabelKind::Switch)
            }
        });
        if !legal {
            return Err(self.error_at(format!("unsyntactic {verb}"), start.1));
        }
        self.semicolon()?;
        let kind = if is_break {
            NodeKind::BreakStatement { label }
        } else {
            NodeKind::ContinueStatement { label }
        };
        Ok(self.finish(kind, start))
    }

    fn parse_throw(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.bump()?;
        if self.cur.newline_before {
            return Err(self.error_here("illegal newline after throw"));
        }
        let argument = self.parse_expression(false)?;
        self.semicolon()?;
        Ok(self.finish(NodeKind::ThrowStatement { argument }, start))
    }

    fn parse_try(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.bump()?;
        let block = self.parse_block()?;
        let handler = if self.cur.is_kw(Kw::Catch) {
            let catch_start = self.start();
            self.bump()?;
            self.expect(Punct::LParen)?;
            let param = self.parse_ident(true)?;
            self.expect(Punct::RParen)?;
            let body = self.parse_block()?;
            Some(self.finish(NodeKind::CatchClause { param, body }, catch_start))
        } else {
            None
        };
        let finalizer = if self.cur.is_kw(Kw::Finally) {
            self.bump()?;
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_here("missing catch or finally clause"));
        }
        Ok(self.finish(
            NodeKind::TryStatement {
                block,
                handler,
                finalizer,
            },
            start,
        ))
    }

    fn parse_switch(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.mark_enclosing_labels(LabelKind::Switch);
        self.bump()?;
        self.expect(Punct::LParen)?;
        let discriminant = self.parse_expression(false)?;
        self.expect(Punct::RParen)?;
        self.expect(Punct::LBrace)?;
        self.labels.push(Label {
            name: None,
            kind: LabelKind::Switch,
            statement_start: 0,
        });
        let mut cases = Vec::new();
        let mut seen_default = false;
        let result = loop {
            if self.cur.is_punct(Punct::RBrace) {
                self.bump()?;
                break Ok(());
            }
            let case_start = self.start();
            let test = if self.cur.is_kw(Kw::Case) {
                self.bump()?;
                Some(self.parse_expression(false)?)
            } else if self.cur.is_kw(Kw::Default) {
                if seen_default {
                    break Err(self.error_here("multiple default clauses"));
                }
                seen_default = true;
                self.bump()?;
                None
            } else {
                break Err(self.unexpected());
            };
            if let Err(err) = self.expect_colon() {
                break Err(err);
            }
            let mut consequent = Vec::new();
            while !(self.cur.is_punct(Punct::RBrace)
                || self.cur.is_kw(Kw::Case)
                || self.cur.is_kw(Kw::Default))
            {
                if self.cur.kind == TokenKind::Eof {
                    break;
                }
                match self.parse_statement() {
                    Ok(stmt) => consequent.push(stmt),
                    Err(err) => return self.pop_label_and(Err(err)),
                }
            }
            cases.push(self.finish(NodeKind::SwitchCase { test, consequent }, case_start));
        };
        self.labels.pop();
        result?;
        Ok(self.finish(NodeKind::SwitchStatement { discriminant, cases }, start))
    }

    fn pop_label_and<T>(&mut self, r: Result<T, Exception>) -> Result<T, Exception> {
        self.labels.pop();
        r
    }

    fn expect_colon(&mut self) -> Result<(), Exception> {
        self.expect(Punct::Colon)
    }

    fn parse_with(&mut self) -> Result<NodeId, Exception> {
        if self.strict {
            return Err(self.error_here("'with' in strict mode"));
        }
        let start = self.start();
        self.bump()?;
        self.expect(Punct::LParen)?;
        let object = self.parse_expression(false)?;
        self.expect(Punct::RParen)?;
        let body = self.parse_statement()?;
        Ok(self.finish(NodeKind::WithStatement { object, body }, start))
    }

    // === functions ===

    fn parse_function(&mut self, is_declaration: bool) -> Result<NodeId, Exception> {
        let start = self.start();
        self.bump()?;
        let id = if matches!(self.cur.kind, TokenKind::Ident(_)) {
            Some(self.parse_ident(true)?)
        } else if is_declaration {
            return Err(self.unexpected());
        } else {
            None
        };
        self.expect(Punct::LParen)?;
        let mut params = Vec::new();
        if !self.cur.is_punct(Punct::RParen) {
            loop {
                params.push(self.parse_ident(true)?);
                if !self.eat(Punct::Comma)? {
                    break;
                }
            }
        }
        self.expect(Punct::RParen)?;

        // Body: a fresh label scope, in_function on, strict saved so that a
        // directive inside the body can't leak out.
        let outer_strict = self.strict;
        let outer_in_function = self.in_function;
        let outer_labels = std::mem::take(&mut self.labels);
        self.in_function = true;

        let body_start = self.start();
        let body_result = (|| {
            self.expect(Punct::LBrace)?;
            let mut body = Vec::new();
            let strict = self.parse_body_with_directives(&mut body, false)?;
            self.expect(Punct::RBrace)?;
            Ok((body, strict))
        })();

        self.in_function = outer_in_function;
        self.labels = outer_labels;
        let (body, strict) = match body_result {
            Ok(v) => v,
            Err(err) => {
                self.set_strict(outer_strict);
                return Err(err);
            }
        };
        self.set_strict(outer_strict);

        // Strict functions re-validate their header.
        if strict {
            let mut seen: AHashMap<&str, ()> = AHashMap::new();
            for &param in &params {
                let name = self.ast.ident_name(param);
                if name == "eval" || name == "arguments" {
                    return Err(self.error_at(format!("binding {name} in strict mode"), start.1));
                }
                if seen.insert(name, ()).is_some() {
                    return Err(self.error_at(format!("argument name {name} clashes in strict mode"), start.1));
                }
            }
            if let Some(id) = id {
                let name = self.ast.ident_name(id);
                if name == "eval" || name == "arguments" {
                    return Err(self.error_at(format!("binding {name} in strict mode"), start.1));
                }
            }
        }

        let body = self.finish(NodeKind::BlockStatement { body }, body_start);
        let kind = if is_declaration {
            NodeKind::FunctionDeclaration {
                id: id.expect("declaration requires a name"),
                params,
                body,
                strict,
            }
        } else {
            NodeKind::FunctionExpression {
                id,
                params,
                body,
                strict,
            }
        };
        Ok(self.finish(kind, start))
    }

    // === expressions ===

    fn parse_expression(&mut self, no_in: bool) -> Result<NodeId, Exception> {
        let start = self.start();
        let first = self.parse_assign(no_in)?;
        if !self.cur.is_punct(Punct::Comma) {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat(Punct::Comma)? {
            expressions.push(self.parse_assign(no_in)?);
        }
        Ok(self.finish(NodeKind::SequenceExpression { expressions }, start))
    }

    fn parse_assign(&mut self, no_in: bool) -> Result<NodeId, Exception> {
        self.depth += 1;
        let result = self.parse_assign_inner(no_in);
        self.depth -= 1;
        result
    }

    fn parse_assign_inner(&mut self, no_in: bool) -> Result<NodeId, Exception> {
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error_here("expression nesting is too deep"));
        }
        let start = self.start();
        let left = self.parse_conditional(no_in)?;
        let operator = match &self.cur.kind {
            TokenKind::Punct(p) => match p {
                Punct::Assign => AssignOp::Assign,
                Punct::PlusAssign => AssignOp::AddAssign,
                Punct::MinusAssign => AssignOp::SubAssign,
                Punct::StarAssign => AssignOp::MulAssign,
                Punct::SlashAssign => AssignOp::DivAssign,
                Punct::PercentAssign => AssignOp::ModAssign,
                Punct::ShlAssign => AssignOp::ShlAssign,
                Punct::ShrAssign => AssignOp::ShrAssign,
                Punct::UShrAssign => AssignOp::UShrAssign,
                Punct::AndAssign => AssignOp::BitAndAssign,
                Punct::OrAssign => AssignOp::BitOrAssign,
                Punct::XorAssign => AssignOp::BitXorAssign,
                _ => return Ok(left),
            },
            _ => return Ok(left),
        };
        self.check_lvalue(left, "assignment")?;
        self.bump()?;
        let right = self.parse_assign(no_in)?;
        Ok(self.finish(
            NodeKind::AssignmentExpression { operator, left, right },
            start,
        ))
    }

    fn check_lvalue(&self, node: NodeId, what: &str) -> Result<(), Exception> {
        match self.ast.kind(node) {
            NodeKind::Identifier { name } => {
                if self.strict && (name == "eval" || name == "arguments") {
                    return Err(self.error_here(format!("assigning to {name} in strict mode")));
                }
                Ok(())
            }
            NodeKind::MemberExpression { .. } => Ok(()),
            _ => Err(self.error_here(format!("invalid {what} target"))),
        }
    }

    fn parse_conditional(&mut self, no_in: bool) -> Result<NodeId, Exception> {
        let start = self.start();
        let test = self.parse_binary(0, no_in)?;
        if !self.eat(Punct::Question)? {
            return Ok(test);
        }
        let consequent = self.parse_assign(false)?;
        self.expect(Punct::Colon)?;
        let alternate = self.parse_assign(no_in)?;
        Ok(self.finish(
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            },
            start,
        ))
    }

    fn binary_prec(&self, no_in: bool) -> Option<(u8, Result<BinaryOp, LogicalOp>)> {
        let op = match &self.cur.kind {
            TokenKind::Punct(p) => match p {
                Punct::LogOr => return Some((1, Err(LogicalOp::Or))),
                Punct::LogAnd => return Some((2, Err(LogicalOp::And))),
                Punct::BitOr => (3, BinaryOp::BitOr),
                Punct::BitXor => (4, BinaryOp::BitXor),
                Punct::BitAnd => (5, BinaryOp::BitAnd),
                Punct::EqEq => (6, BinaryOp::EqEq),
                Punct::NotEq => (6, BinaryOp::NotEq),
                Punct::StrictEq => (6, BinaryOp::StrictEq),
                Punct::StrictNotEq => (6, BinaryOp::StrictNotEq),
                Punct::Lt => (7, BinaryOp::Lt),
                Punct::LtEq => (7, BinaryOp::LtEq),
                Punct::Gt => (7, BinaryOp::Gt),
                Punct::GtEq => (7, BinaryOp::GtEq),
                Punct::Shl => (8, BinaryOp::Shl),
                Punct::Shr => (8, BinaryOp::Shr),
                Punct::UShr => (8, BinaryOp::UShr),
                Punct::Plus => (9, BinaryOp::Add),
                Punct::Minus => (9, BinaryOp::Sub),
                Punct::Star => (10, BinaryOp::Mul),
                Punct::Slash => (10, BinaryOp::Div),
                Punct::Percent => (10, BinaryOp::Mod),
                _ => return None,
            },
            TokenKind::Keyword(Kw::In) if !no_in && !self.cur.escaped => (7, BinaryOp::In),
            TokenKind::Keyword(Kw::Instanceof) if !self.cur.escaped => (7, BinaryOp::Instanceof),
            _ => return None,
        };
        Some((op.0, Ok(op.1)))
    }

    fn parse_binary(&mut self, min_prec: u8, no_in: bool) -> Result<NodeId, Exception> {
        let start = self.start();
        let mut left = self.parse_unary()?;
        while let Some((prec, op)) = self.binary_prec(no_in) {
            if prec <= min_prec {
                break;
            }
            self.bump()?;
            let right = self.parse_binary(prec, no_in)?;
            left = match op {
                Ok(operator) => self.finish(NodeKind::BinaryExpression { operator, left, right }, start),
                Err(operator) => self.finish(NodeKind::LogicalExpression { operator, left, right }, start),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        let operator = match &self.cur.kind {
            TokenKind::Punct(Punct::Minus) => Some(UnaryOp::Minus),
            TokenKind::Punct(Punct::Plus) => Some(UnaryOp::Plus),
            TokenKind::Punct(Punct::Not) => Some(UnaryOp::Not),
            TokenKind::Punct(Punct::BitNot) => Some(UnaryOp::BitNot),
            TokenKind::Keyword(Kw::Typeof) if !self.cur.escaped => Some(UnaryOp::Typeof),
            TokenKind::Keyword(Kw::Void) if !self.cur.escaped => Some(UnaryOp::Void),
            TokenKind::Keyword(Kw::Delete) if !self.cur.escaped => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(operator) = operator {
            self.bump()?;
            let argument = self.parse_unary()?;
            if operator == UnaryOp::Delete
                && self.strict
                && matches!(self.ast.kind(argument), NodeKind::Identifier { .. })
            {
                return Err(self.error_at("deleting local variable in strict mode", start.1));
            }
            return Ok(self.finish(NodeKind::UnaryExpression { operator, argument }, start));
        }
        if self.cur.is_punct(Punct::Inc) || self.cur.is_punct(Punct::Dec) {
            let operator = if self.cur.is_punct(Punct::Inc) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.bump()?;
            let argument = self.parse_unary()?;
            self.check_lvalue(argument, "update")?;
            return Ok(self.finish(
                NodeKind::UpdateExpression {
                    operator,
                    argument,
                    prefix: true,
                },
                start,
            ));
        }
        let mut expr = self.parse_subscripts(true)?;
        // Postfix, barred across a newline by a restricted production.
        while (self.cur.is_punct(Punct::Inc) || self.cur.is_punct(Punct::Dec)) && !self.cur.newline_before {
            let operator = if self.cur.is_punct(Punct::Inc) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.check_lvalue(expr, "update")?;
            self.bump()?;
            expr = self.finish(
                NodeKind::UpdateExpression {
                    operator,
                    argument: expr,
                    prefix: false,
                },
                start,
            );
        }
        Ok(expr)
    }

    fn parse_subscripts(&mut self, allow_call: bool) -> Result<NodeId, Exception> {
        let start = self.start();
        let mut base = self.parse_primary()?;
        loop {
            if self.eat(Punct::Dot)? {
                let property = self.parse_property_ident()?;
                base = self.finish(
                    NodeKind::MemberExpression {
                        object: base,
                        property,
                        computed: false,
                    },
                    start,
                );
            } else if self.eat(Punct::LBracket)? {
                let property = self.parse_expression(false)?;
                self.expect(Punct::RBracket)?;
                base = self.finish(
                    NodeKind::MemberExpression {
                        object: base,
                        property,
                        computed: true,
                    },
                    start,
                );
            } else if allow_call && self.cur.is_punct(Punct::LParen) {
                let arguments = self.parse_arguments()?;
                base = self.finish(
                    NodeKind::CallExpression {
                        callee: base,
                        arguments,
                    },
                    start,
                );
            } else {
                return Ok(base);
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<NodeId>, Exception> {
        self.expect(Punct::LParen)?;
        let mut arguments = Vec::new();
        if !self.cur.is_punct(Punct::RParen) {
            loop {
                arguments.push(self.parse_assign(false)?);
                if !self.eat(Punct::Comma)? {
                    break;
                }
            }
        }
        self.expect(Punct::RParen)?;
        Ok(arguments)
    }

    fn parse_new(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.bump()?;
        let callee = self.parse_subscripts(false)?;
        let arguments = if self.cur.is_punct(Punct::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(self.finish(NodeKind::NewExpression { callee, arguments }, start))
    }

    fn parse_primary(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        match &self.cur.kind {
            TokenKind::Num(_) | TokenKind::Str(_) | TokenKind::Regex { .. } => {
                let token = self.bump()?;
                let value = match token.kind {
                    TokenKind::Num(n) => LitValue::Number(n),
                    TokenKind::Str(s) => LitValue::Str(s),
                    TokenKind::Regex { pattern, flags } => LitValue::Regex { pattern, flags },
                    _ => unreachable!(),
                };
                Ok(self.finish(NodeKind::Literal { value }, start))
            }
            TokenKind::Keyword(kw) if !self.cur.escaped => {
                let value = match kw {
                    Kw::Null => Some(LitValue::Null),
                    Kw::True => Some(LitValue::Bool(true)),
                    Kw::False => Some(LitValue::Bool(false)),
                    _ => None,
                };
                if let Some(value) = value {
                    self.bump()?;
                    return Ok(self.finish(NodeKind::Literal { value }, start));
                }
                match kw {
                    Kw::This => {
                        self.bump()?;
                        Ok(self.finish(NodeKind::ThisExpression, start))
                    }
                    Kw::Function => self.parse_function(false),
                    Kw::New => self.parse_new(),
                    _ => Err(self.unexpected()),
                }
            }
            TokenKind::Ident(_) => self.parse_ident(false),
            TokenKind::Punct(Punct::LParen) => {
                self.bump()?;
                let expr = self.parse_expression(false)?;
                self.expect(Punct::RParen)?;
                Ok(expr)
            }
            TokenKind::Punct(Punct::LBracket) => self.parse_array(),
            TokenKind::Punct(Punct::LBrace) => self.parse_object(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.bump()?;
        let mut elements = Vec::new();
        loop {
            if self.cur.is_punct(Punct::RBracket) {
                self.bump()?;
                break;
            }
            if self.eat(Punct::Comma)? {
                // A comma in element position is an elision, including one
                // that directly precedes the closing bracket: `[,]` and
                // `[1,,]` both end with a hole.
                elements.push(None);
                if self.cur.is_punct(Punct::RBracket) {
                    self.bump()?;
                    break;
                }
                continue;
            }
            elements.push(Some(self.parse_assign(false)?));
            if !self.cur.is_punct(Punct::RBracket) {
                self.expect(Punct::Comma)?;
                if self.cur.is_punct(Punct::RBracket) {
                    if !self.options.allow_trailing_commas() {
                        return Err(self.error_here("trailing comma is not permitted"));
                    }
                    self.bump()?;
                    break;
                }
            }
        }
        Ok(self.finish(NodeKind::ArrayExpression { elements }, start))
    }

    fn parse_object(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        self.bump()?;
        let mut properties = Vec::new();
        // name -> (has data, has getter, has setter), for duplicate checks.
        let mut seen: AHashMap<String, (bool, bool, bool)> = AHashMap::new();
        loop {
            if self.cur.is_punct(Punct::RBrace) {
                self.bump()?;
                break;
            }
            if !properties.is_empty() {
                self.expect(Punct::Comma)?;
                if self.cur.is_punct(Punct::RBrace) {
                    if !self.options.allow_trailing_commas() {
                        return Err(self.error_here("trailing comma is not permitted"));
                    }
                    self.bump()?;
                    break;
                }
            }
            let prop_start = self.start();
            let prop_loc = self.cur.start_loc;

            // `get name() {}` / `set name(v) {}`, unless get/set is itself a
            // plain key (`{get: 1}`).
            let accessor = match &self.cur.kind {
                TokenKind::Ident(word) if word == "get" => Some(true),
                TokenKind::Ident(word) if word == "set" => Some(false),
                _ => None,
            };
            let (key, value, kind) = if let Some(is_get) = accessor {
                self.bump()?;
                if self.cur.is_punct(Punct::Colon) {
                    let key = self.ast.push(Node {
                        kind: NodeKind::Identifier {
                            name: if is_get { "get" } else { "set" }.to_string(),
                        },
                        span: Some(Span {
                            start: prop_start.0,
                            end: self.prev_end,
                        }),
                        loc: None,
                    });
                    self.bump()?;
                    let value = self.parse_assign(false)?;
                    (key, value, PropertyKind::Init)
                } else {
                    let key = self.parse_property_key()?;
                    let value = self.parse_accessor_body(is_get)?;
                    (key, value, if is_get { PropertyKind::Get } else { PropertyKind::Set })
                }
            } else {
                let key = self.parse_property_key()?;
                self.expect(Punct::Colon)?;
                let value = self.parse_assign(false)?;
                (key, value, PropertyKind::Init)
            };

            let name = self.property_key_name(key);
            let entry = seen.entry(name.clone()).or_insert((false, false, false));
            match kind {
                PropertyKind::Init => {
                    if entry.1 || entry.2 {
                        return Err(self.error_at(format!("mixing data and accessor property {name}"), prop_loc));
                    }
                    if entry.0 && self.strict {
                        return Err(self.error_at(format!("duplicate data property {name} in strict mode"), prop_loc));
                    }
                    entry.0 = true;
                }
                PropertyKind::Get => {
                    if entry.0 {
                        return Err(self.error_at(format!("mixing data and accessor property {name}"), prop_loc));
                    }
                    if entry.1 {
                        return Err(self.error_at(format!("duplicate getter for {name}"), prop_loc));
                    }
                    entry.1 = true;
                }
                PropertyKind::Set => {
                    if entry.0 {
                        return Err(self.error_at(format!("mixing data and accessor property {name}"), prop_loc));
                    }
                    if entry.2 {
                        return Err(self.error_at(format!("duplicate setter for {name}"), prop_loc));
                    }
                    entry.2 = true;
                }
            }

            properties.push(self.finish(NodeKind::Property { key, value, kind }, prop_start));
        }
        Ok(self.finish(NodeKind::ObjectExpression { properties }, start))
    }

    fn parse_property_key(&mut self) -> Result<NodeId, Exception> {
        let start = self.start();
        match &self.cur.kind {
            TokenKind::Num(_) | TokenKind::Str(_) => {
                let token = self.bump()?;
                let value = match token.kind {
                    TokenKind::Num(n) => LitValue::Number(n),
                    TokenKind::Str(s) => LitValue::Str(s),
                    _ => unreachable!(),
                };
                Ok(self.finish(NodeKind::Literal { value }, start))
            }
            _ => self.parse_property_ident(),
        }
    }

    fn property_key_name(&self, key: NodeId) -> String {
        match self.ast.kind(key) {
            NodeKind::Identifier { name } => name.clone(),
            NodeKind::Literal { value: LitValue::Str(s) } => s.clone(),
            NodeKind::Literal { value: LitValue::Number(n) } => crate::value::format_number(*n),
            _ => unreachable!("property keys are idents or literals"),
        }
    }

    /// Parses `() { body }` for a getter or `(param) { body }` for a setter
    /// as an anonymous FunctionExpression.
    fn parse_accessor_body(&mut self, is_get: bool) -> Result<NodeId, Exception> {
        let start = self.start();
        self.expect(Punct::LParen)?;
        let mut params = Vec::new();
        if !self.cur.is_punct(Punct::RParen) {
            loop {
                params.push(self.parse_ident(true)?);
                if !self.eat(Punct::Comma)? {
                    break;
                }
            }
        }
        self.expect(Punct::RParen)?;
        if is_get && !params.is_empty() {
            return Err(self.error_at("getter must take no arguments", start.1));
        }
        if !is_get && params.len() != 1 {
            return Err(self.error_at("setter must take exactly one argument", start.1));
        }

        let outer_in_function = self.in_function;
        let outer_labels = std::mem::take(&mut self.labels);
        let outer_strict = self.strict;
        self.in_function = true;
        let body_start = self.start();
        let body_result = (|| {
            self.expect(Punct::LBrace)?;
            let mut body = Vec::new();
            let strict = self.parse_body_with_directives(&mut body, false)?;
            self.expect(Punct::RBrace)?;
            Ok((body, strict))
        })();
        self.in_function = outer_in_function;
        self.labels = outer_labels;
        self.set_strict(outer_strict);
        let (body, strict) = body_result?;

        let body = self.finish(NodeKind::BlockStatement { body }, body_start);
        Ok(self.finish(
            NodeKind::FunctionExpression {
                id: None,
                params,
                body,
                strict,
            },
            start,
        ))
    }
}

fn is_use_strict(ast: &Ast, stmt: NodeId) -> bool {
    matches!(
        ast.kind(stmt),
        NodeKind::ExpressionStatement { expression }
            if matches!(ast.kind(*expression), NodeKind::Literal { value: LitValue::Str(s) } if s == "use strict")
    )
}

fn kw_text(token: &Token) -> &'static str {
    match token.kind {
        TokenKind::Keyword(kw) => match kw {
            Kw::Break => "break",
            Kw::Case => "case",
            Kw::Catch => "catch",
            Kw::Continue => "continue",
            Kw::Debugger => "debugger",
            Kw::Default => "default",
            Kw::Delete => "delete",
            Kw::Do => "do",
            Kw::Else => "else",
            Kw::Finally => "finally",
            Kw::For => "for",
            Kw::Function => "function",
            Kw::If => "if",
            Kw::In => "in",
            Kw::Instanceof => "instanceof",
            Kw::New => "new",
            Kw::Return => "return",
            Kw::Switch => "switch",
            Kw::This => "this",
            Kw::Throw => "throw",
            Kw::Try => "try",
            Kw::Typeof => "typeof",
            Kw::Var => "var",
            Kw::Void => "void",
            Kw::While => "while",
            Kw::With => "with",
            Kw::Null => "null",
            Kw::True => "true",
            Kw::False => "false",
        },
        _ => unreachable!("kw_text requires a keyword token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<(Ast, NodeId), Exception> {
        let mut ast = Ast::new();
        let options = ParseOptions::default();
        let program = parse_program(&mut ast, src, &options, None, None)?;
        Ok((ast, program))
    }

    fn body_len(ast: &Ast, program: NodeId) -> usize {
        match ast.kind(program) {
            NodeKind::Program { body, .. } => body.len(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_program() {
        let (ast, program) = parse("").unwrap();
        assert_eq!(body_len(&ast, program), 0);
    }

    #[test]
    fn asi_inserts_at_newline_and_eof() {
        let (ast, program) = parse("a = 1\nb = 2").unwrap();
        assert_eq!(body_len(&ast, program), 2);
    }

    #[test]
    fn strict_semicolons_rejects_asi() {
        let mut ast = Ast::new();
        let options = ParseOptions {
            strict_semicolons: true,
            ..ParseOptions::default()
        };
        assert!(parse_program(&mut ast, "a = 1\nb = 2", &options, None, None).is_err());
    }

    #[test]
    fn for_in_from_no_in_initializer() {
        let (ast, program) = parse("for (var k in o) {}").unwrap();
        let NodeKind::Program { body, .. } = ast.kind(program) else {
            unreachable!()
        };
        assert!(matches!(ast.kind(body[0]), NodeKind::ForInStatement { .. }));
    }

    #[test]
    fn for_in_requires_single_declarator() {
        assert!(parse("for (var a, b in o) {}").is_err());
    }

    #[test]
    fn in_operator_allowed_outside_for_init() {
        let (ast, program) = parse("x = 'a' in o;").unwrap();
        assert_eq!(body_len(&ast, program), 1);
    }

    #[test]
    fn return_outside_function_is_an_error() {
        assert!(parse("return 1;").is_err());
    }

    #[test]
    fn unsyntactic_break_is_an_error() {
        assert!(parse("break;").is_err());
        assert!(parse("x: { break x; }").unwrap().0.len() > 0);
        assert!(parse("x: { continue x; }").is_err());
    }

    #[test]
    fn strict_directive_enables_octal_rejection() {
        assert!(parse("'use strict'; 010").is_err());
        let (ast, program) = parse("010").unwrap();
        let NodeKind::Program { body, .. } = ast.kind(program) else {
            unreachable!()
        };
        let NodeKind::ExpressionStatement { expression } = ast.kind(body[0]) else {
            unreachable!()
        };
        assert_eq!(
            ast.kind(*expression),
            &NodeKind::Literal {
                value: LitValue::Number(8.0)
            }
        );
    }

    #[test]
    fn strict_delete_of_variable_is_rejected() {
        assert!(parse("'use strict'; var x; delete x;").is_err());
        assert!(parse("var x; delete x;").is_ok());
    }

    #[test]
    fn strict_duplicate_params_rejected() {
        assert!(parse("function f(a, a) { 'use strict'; }").is_err());
        assert!(parse("function f(a, a) {}").is_ok());
    }

    #[test]
    fn duplicate_accessors_rejected() {
        assert!(parse("({ get x() {}, get x() {} })").is_err());
        assert!(parse("({ get x() {}, set x(v) {} })").is_ok());
        assert!(parse("({ x: 1, get x() {} })").is_err());
    }

    #[test]
    fn object_with_get_named_property() {
        assert!(parse("({ get: 1, set: 2 })").is_ok());
    }

    #[test]
    fn labeled_loops_accept_labeled_continue() {
        assert!(parse("outer: for (;;) { continue outer; }").is_ok());
        assert!(parse("outer: for (;;) { inner: for(;;) { break outer; } }").is_ok());
    }

    #[test]
    fn regexp_literal_parses() {
        let (ast, program) = parse("/ab+c/gi;").unwrap();
        let NodeKind::Program { body, .. } = ast.kind(program) else {
            unreachable!()
        };
        let NodeKind::ExpressionStatement { expression } = ast.kind(body[0]) else {
            unreachable!()
        };
        assert!(matches!(
            ast.kind(*expression),
            NodeKind::Literal {
                value: LitValue::Regex { .. }
            }
        ));
    }

    #[test]
    fn node_spans_cover_source_slices() {
        let src = "var a = 1; a + 2;";
        let (ast, program) = parse(src).unwrap();
        let NodeKind::Program { body, .. } = ast.kind(program) else {
            unreachable!()
        };
        let span = ast.node(body[1]).span.unwrap();
        assert_eq!(&src[span.start as usize..span.end as usize], "a + 2;");
    }

    #[test]
    fn new_without_parens() {
        let (ast, program) = parse("new Date;").unwrap();
        let NodeKind::Program { body, .. } = ast.kind(program) else {
            unreachable!()
        };
        let NodeKind::ExpressionStatement { expression } = ast.kind(body[0]) else {
            unreachable!()
        };
        assert!(matches!(ast.kind(*expression), NodeKind::NewExpression { arguments, .. } if arguments.is_empty()));
    }

    #[test]
    fn trailing_commas_are_es5_legal() {
        assert!(parse("[1, 2, ]").is_ok());
        assert!(parse("({a: 1, })").is_ok());
        let mut ast = Ast::new();
        let options = ParseOptions {
            forbid_trailing_commas: true,
            ..ParseOptions::default()
        };
        assert!(parse_program(&mut ast, "({a: 1, })", &options, None, None).is_err());
    }

    #[test]
    fn elisions_are_holes_not_trailing_commas() {
        let (ast, program) = parse("[1, , 3]").unwrap();
        let NodeKind::Program { body, .. } = ast.kind(program) else {
            unreachable!()
        };
        let NodeKind::ExpressionStatement { expression } = ast.kind(body[0]) else {
            unreachable!()
        };
        let NodeKind::ArrayExpression { elements } = ast.kind(*expression) else {
            unreachable!()
        };
        assert_eq!(elements.len(), 3);
        assert!(elements[1].is_none());
    }

    #[test]
    fn program_extension_appends_statements() {
        let mut ast = Ast::new();
        let options = ParseOptions::default();
        let program = parse_program(&mut ast, "var a = 1;", &options, None, None).unwrap();
        let same = parse_program(&mut ast, "a + 1;", &options, None, Some(program)).unwrap();
        assert_eq!(program, same);
        assert_eq!(body_len(&ast, program), 2);
    }

    #[test]
    fn missing_catch_and_finally_is_an_error() {
        assert!(parse("try { x(); }").is_err());
    }

    #[test]
    fn pathological_nesting_is_rejected() {
        let source = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        assert!(parse(&source).is_err());
        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn with_is_rejected_in_strict_mode() {
        assert!(parse("'use strict'; with (o) {}").is_err());
        assert!(parse("with (o) {}").is_ok());
    }
}
