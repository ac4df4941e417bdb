use serde::{Deserialize, Serialize};

use crate::error::{CodeLoc, Exception};

/// Comment callback: `(is_block, text, start, end, start_loc, end_loc)`.
///
/// Offsets are UTF-16 code units; locs are only provided when the
/// `locations` parse option is on.
pub type CommentHandler<'a> = dyn FnMut(bool, &str, u32, u32, Option<CodeLoc>, Option<CodeLoc>) + 'a;

/// Keywords of the ES5 subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kw {
    Break,
    Case,
    Catch,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    Finally,
    For,
    Function,
    If,
    In,
    Instanceof,
    New,
    Return,
    Switch,
    This,
    Throw,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
    Null,
    True,
    False,
}

impl Kw {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "break" => Self::Break,
            "case" => Self::Case,
            "catch" => Self::Catch,
            "continue" => Self::Continue,
            "debugger" => Self::Debugger,
            "default" => Self::Default,
            "delete" => Self::Delete,
            "do" => Self::Do,
            "else" => Self::Else,
            "finally" => Self::Finally,
            "for" => Self::For,
            "function" => Self::Function,
            "if" => Self::If,
            "in" => Self::In,
            "instanceof" => Self::Instanceof,
            "new" => Self::New,
            "return" => Self::Return,
            "switch" => Self::Switch,
            "this" => Self::This,
            "throw" => Self::Throw,
            "try" => Self::Try,
            "typeof" => Self::Typeof,
            "var" => Self::Var,
            "void" => Self::Void,
            "while" => Self::While,
            "with" => Self::With,
            "null" => Self::Null,
            "true" => Self::True,
            "false" => Self::False,
            _ => return None,
        })
    }

    /// Whether an expression may start right after this keyword, which is
    /// what decides regexp-vs-division for a following `/`.
    fn before_expr(self) -> bool {
        matches!(
            self,
            Self::Case
                | Self::Delete
                | Self::Do
                | Self::Else
                | Self::In
                | Self::Instanceof
                | Self::New
                | Self::Return
                | Self::Throw
                | Self::Typeof
                | Self::Void
        )
    }
}

/// Punctuators and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Colon,
    Question,
    Dot,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Inc,
    Dec,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Not,
    BitNot,
    LogAnd,
    LogOr,
}

impl Punct {
    fn before_expr(self) -> bool {
        // Everything except closers and postfix-capable tokens.
        !matches!(self, Self::RParen | Self::RBrace | Self::RBracket | Self::Inc | Self::Dec)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Punct(Punct),
    Keyword(Kw),
    Ident(String),
    Num(f64),
    Str(String),
    Regex { pattern: String, flags: String },
    Eof,
}

/// One lexed token with its span and the flags the parser needs for ASI and
/// strict-mode checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: u32,
    pub end: u32,
    pub start_loc: CodeLoc,
    pub end_loc: CodeLoc,
    /// A line terminator appeared between the previous token and this one.
    pub newline_before: bool,
    /// The word contained a `\u` escape, which bars keyword recognition.
    pub escaped: bool,
    /// Legacy octal literal or octal string escape; rejected when the
    /// enclosing code turns out to be strict.
    pub octal: bool,
}

impl Token {
    fn before_expr(&self) -> bool {
        match &self.kind {
            TokenKind::Punct(p) => p.before_expr(),
            TokenKind::Keyword(k) => k.before_expr(),
            TokenKind::Eof => true,
            _ => false,
        }
    }

    pub(crate) fn is_punct(&self, p: Punct) -> bool {
        self.kind == TokenKind::Punct(p)
    }

    pub(crate) fn is_kw(&self, k: Kw) -> bool {
        // An escaped word is never a keyword.
        !self.escaped && self.kind == TokenKind::Keyword(k)
    }
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_js_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{0B}' | '\u{0C}' | '\u{A0}' | '\u{FEFF}')
        || (c.is_whitespace() && !is_line_terminator(c))
}

fn is_id_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && unicode_id_start::is_id_start(c))
}

fn is_id_continue(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphanumeric() || (!c.is_ascii() && unicode_id_start::is_id_continue(c))
}

/// Hand-written ES5 tokenizer.
///
/// Positions are UTF-16 code-unit offsets, matching the indexing guest code
/// observes on strings. Regexp literals are distinguished from division by
/// the previous token's before-expression flag.
pub struct Lexer<'a> {
    chars: Vec<char>,
    /// Index into `chars`.
    i: usize,
    /// UTF-16 offset of `chars[i]`.
    offset: u32,
    line: u32,
    line_start: u32,
    /// Strict mode is pushed down by the parser; it changes octal handling.
    pub(crate) strict: bool,
    prev_before_expr: bool,
    on_comment: Option<Box<CommentHandler<'a>>>,
    track_loc: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            i: 0,
            offset: 0,
            line: 1,
            line_start: 0,
            strict: false,
            prev_before_expr: true,
            on_comment: None,
            track_loc: false,
        }
    }

    pub(crate) fn with_comment_handler(mut self, handler: Option<Box<CommentHandler<'a>>>, track_loc: bool) -> Self {
        self.on_comment = handler;
        self.track_loc = track_loc;
        self
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.i + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.i).copied()?;
        self.i += 1;
        self.offset += c.len_utf16() as u32;
        if is_line_terminator(c) {
            // CRLF counts as one line break.
            if c == '\r' && self.peek() == Some('\n') {
                self.i += 1;
                self.offset += 1;
            }
            self.line += 1;
            self.line_start = self.offset;
        }
        Some(c)
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc {
            line: self.line,
            column: self.offset - self.line_start,
        }
    }

    fn error(&self, message: impl Into<String>) -> Exception {
        Exception::syntax(message, self.loc())
    }

    fn error_at(&self, message: impl Into<String>, loc: CodeLoc) -> Exception {
        Exception::syntax(message, loc)
    }

    /// Skips whitespace and comments, returning whether a line terminator
    /// was crossed.
    fn skip_space(&mut self) -> Result<bool, Exception> {
        let mut newline = false;
        loop {
            match self.peek() {
                Some(c) if is_line_terminator(c) => {
                    newline = true;
                    self.bump();
                }
                Some(c) if is_js_whitespace(c) => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    self.skip_line_comment(2)?;
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    newline |= self.skip_block_comment()?;
                }
                // HTML-like comment forms, recognised only at line starts.
                Some('<')
                    if newline
                        && self.peek_at(1) == Some('!')
                        && self.peek_at(2) == Some('-')
                        && self.peek_at(3) == Some('-') =>
                {
                    self.skip_line_comment(4)?;
                }
                Some('-') if newline && self.peek_at(1) == Some('-') && self.peek_at(2) == Some('>') => {
                    self.skip_line_comment(3)?;
                }
                _ => return Ok(newline),
            }
        }
    }

    fn skip_line_comment(&mut self, prefix: usize) -> Result<(), Exception> {
        let start = self.offset;
        let start_loc = self.loc();
        for _ in 0..prefix {
            self.bump();
        }
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_line_terminator(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        let (sl, el) = if self.track_loc {
            (Some(start_loc), Some(self.loc()))
        } else {
            (None, None)
        };
        if let Some(handler) = self.on_comment.as_mut() {
            handler(false, &text, start, self.offset, sl, el);
        }
        Ok(())
    }

    fn skip_block_comment(&mut self) -> Result<bool, Exception> {
        let start = self.offset;
        let start_loc = self.loc();
        self.bump();
        self.bump();
        let mut text = String::new();
        let mut newline = false;
        loop {
            match self.peek() {
                None => return Err(self.error_at("unterminated comment", start_loc)),
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some(c) => {
                    newline |= is_line_terminator(c);
                    text.push(c);
                    self.bump();
                }
            }
        }
        let (sl, el) = if self.track_loc {
            (Some(start_loc), Some(self.loc()))
        } else {
            (None, None)
        };
        if let Some(handler) = self.on_comment.as_mut() {
            handler(true, &text, start, self.offset, sl, el);
        }
        Ok(newline)
    }

    /// Lexes the next token.
    pub fn next_token(&mut self) -> Result<Token, Exception> {
        let newline_before = self.skip_space()?;
        let start = self.offset;
        let start_loc = self.loc();

        let Some(c) = self.peek() else {
            return Ok(self.finish(TokenKind::Eof, start, start_loc, newline_before));
        };

        let token = if is_id_start(c) || c == '\\' {
            self.read_word(start, start_loc, newline_before)?
        } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            self.read_number(start, start_loc, newline_before)?
        } else if c == '"' || c == '\'' {
            self.read_string(c, start, start_loc, newline_before)?
        } else if c == '/' && self.prev_before_expr {
            self.read_regexp(start, start_loc, newline_before)?
        } else {
            self.read_punct(start, start_loc, newline_before)?
        };
        self.prev_before_expr = token.before_expr();
        Ok(token)
    }

    fn finish(&self, kind: TokenKind, start: u32, start_loc: CodeLoc, newline_before: bool) -> Token {
        Token {
            kind,
            start,
            end: self.offset,
            start_loc,
            end_loc: self.loc(),
            newline_before,
            escaped: false,
            octal: false,
        }
    }

    fn read_hex_digits(&mut self, count: usize) -> Result<u32, Exception> {
        let mut value = 0u32;
        for _ in 0..count {
            let d = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("bad character escape sequence"))?;
            value = value * 16 + d;
            self.bump();
        }
        Ok(value)
    }

    fn read_word(&mut self, start: u32, start_loc: CodeLoc, newline_before: bool) -> Result<Token, Exception> {
        let mut word = String::new();
        let mut escaped = false;
        let mut first = true;
        loop {
            match self.peek() {
                Some('\\') => {
                    if self.peek_at(1) != Some('u') {
                        return Err(self.error("expecting Unicode escape sequence \\uXXXX"));
                    }
                    self.bump();
                    self.bump();
                    let code = self.read_hex_digits(4)?;
                    let ch = char::from_u32(code).ok_or_else(|| self.error("invalid Unicode escape"))?;
                    let valid = if first { is_id_start(ch) } else { is_id_continue(ch) };
                    if !valid {
                        return Err(self.error("invalid Unicode escape in identifier"));
                    }
                    word.push(ch);
                    escaped = true;
                }
                Some(c) if (first && is_id_start(c)) || (!first && is_id_continue(c)) => {
                    word.push(c);
                    self.bump();
                }
                _ => break,
            }
            first = false;
        }
        let kind = match Kw::from_word(&word) {
            Some(kw) if !escaped => TokenKind::Keyword(kw),
            _ => TokenKind::Ident(word),
        };
        let mut token = self.finish(kind, start, start_loc, newline_before);
        token.escaped = escaped;
        Ok(token)
    }

    fn read_number(&mut self, start: u32, start_loc: CodeLoc, newline_before: bool) -> Result<Token, Exception> {
        let mut octal = false;
        let value = if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let mut raw = String::new();
            while let Some(d) = self.peek().filter(char::is_ascii_hexdigit) {
                raw.push(d);
                self.bump();
            }
            if raw.is_empty() {
                return Err(self.error_at("expected hexadecimal digits", start_loc));
            }
            u64::from_str_radix(&raw, 16).map_or(f64::INFINITY, |v| v as f64)
        } else if self.peek() == Some('0') && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
            // Legacy octal, or a decimal that merely starts with 0 when a
            // digit 8/9 appears in the run.
            let mut raw = String::new();
            while let Some(d) = self.peek().filter(char::is_ascii_digit) {
                raw.push(d);
                self.bump();
            }
            if raw.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
                if self.strict {
                    return Err(self.error_at("octal literals are not allowed in strict mode", start_loc));
                }
                octal = true;
                u64::from_str_radix(&raw, 8).map_or(f64::INFINITY, |v| v as f64)
            } else {
                if self.strict {
                    return Err(self.error_at("octal literals are not allowed in strict mode", start_loc));
                }
                raw.parse::<f64>().unwrap_or(f64::NAN)
            }
        } else {
            let mut raw = String::new();
            while let Some(d) = self.peek().filter(char::is_ascii_digit) {
                raw.push(d);
                self.bump();
            }
            if self.peek() == Some('.') {
                raw.push('.');
                self.bump();
                while let Some(d) = self.peek().filter(char::is_ascii_digit) {
                    raw.push(d);
                    self.bump();
                }
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                raw.push('e');
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    raw.push(self.peek().unwrap());
                    self.bump();
                }
                let mut any = false;
                while let Some(d) = self.peek().filter(char::is_ascii_digit) {
                    raw.push(d);
                    self.bump();
                    any = true;
                }
                if !any {
                    return Err(self.error("expected exponent digits"));
                }
            }
            raw.parse::<f64>().map_err(|_| self.error_at("invalid number", start_loc))?
        };
        if self.peek().is_some_and(is_id_start) {
            return Err(self.error("identifier directly after number"));
        }
        let mut token = self.finish(TokenKind::Num(value), start, start_loc, newline_before);
        token.octal = octal;
        Ok(token)
    }

    fn read_string(&mut self, quote: char, start: u32, start_loc: CodeLoc, newline_before: bool) -> Result<Token, Exception> {
        self.bump();
        let mut out = String::new();
        let mut octal = false;
        loop {
            match self.peek() {
                None => return Err(self.error_at("unterminated string constant", start_loc)),
                Some(c) if is_line_terminator(c) => {
                    return Err(self.error_at("unterminated string constant", start_loc));
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        None => return Err(self.error_at("unterminated string constant", start_loc)),
                        Some(c) if is_line_terminator(c) => {
                            // Escaped line continuations contribute nothing.
                            self.bump();
                        }
                        Some('n') => {
                            out.push('\n');
                            self.bump();
                        }
                        Some('r') => {
                            out.push('\r');
                            self.bump();
                        }
                        Some('t') => {
                            out.push('\t');
                            self.bump();
                        }
                        Some('b') => {
                            out.push('\u{8}');
                            self.bump();
                        }
                        Some('f') => {
                            out.push('\u{C}');
                            self.bump();
                        }
                        Some('v') => {
                            out.push('\u{B}');
                            self.bump();
                        }
                        Some('x') => {
                            self.bump();
                            let code = self.read_hex_digits(2)?;
                            out.push(char::from_u32(code).expect("two hex digits always form a char"));
                        }
                        Some('u') => {
                            self.bump();
                            let code = self.read_hex_digits(4)?;
                            match char::from_u32(code) {
                                Some(ch) => out.push(ch),
                                // Lone surrogates survive as replacement; the
                                // subset stores strings as UTF-8.
                                None => out.push('\u{FFFD}'),
                            }
                        }
                        Some(d) if d.is_ascii_digit() => {
                            let mut code = 0u32;
                            let mut digits = 0;
                            while digits < 3 {
                                let Some(d) = self.peek().and_then(|c| c.to_digit(8)) else {
                                    break;
                                };
                                let next = code * 8 + d;
                                if next > 0o377 {
                                    break;
                                }
                                code = next;
                                digits += 1;
                                self.bump();
                            }
                            let plain_nul = code == 0 && digits == 1 && !self.peek().is_some_and(|c| c.is_ascii_digit());
                            if self.strict && !plain_nul {
                                return Err(self.error("octal escape sequences are not allowed in strict mode"));
                            }
                            if !plain_nul {
                                octal = true;
                            }
                            out.push(char::from_u32(code).expect("octal escapes are below 0x100"));
                        }
                        Some(other) => {
                            out.push(other);
                            self.bump();
                        }
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
        let mut token = self.finish(TokenKind::Str(out), start, start_loc, newline_before);
        token.octal = octal;
        Ok(token)
    }

    fn read_regexp(&mut self, start: u32, start_loc: CodeLoc, newline_before: bool) -> Result<Token, Exception> {
        self.bump();
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.peek() {
                None => return Err(self.error_at("unterminated regular expression", start_loc)),
                Some(c) if is_line_terminator(c) => {
                    return Err(self.error_at("unterminated regular expression", start_loc));
                }
                Some('\\') => {
                    pattern.push('\\');
                    self.bump();
                    match self.peek() {
                        None => return Err(self.error_at("unterminated regular expression", start_loc)),
                        Some(c) if is_line_terminator(c) => {
                            return Err(self.error_at("unterminated regular expression", start_loc));
                        }
                        Some(c) => {
                            pattern.push(c);
                            self.bump();
                        }
                    }
                }
                Some('[') => {
                    in_class = true;
                    pattern.push('[');
                    self.bump();
                }
                Some(']') if in_class => {
                    in_class = false;
                    pattern.push(']');
                    self.bump();
                }
                Some('/') if !in_class => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    pattern.push(c);
                    self.bump();
                }
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.peek().filter(|&c| is_id_continue(c)) {
            if !matches!(c, 'g' | 'm' | 's' | 'i' | 'y') {
                return Err(self.error("invalid regular expression flag"));
            }
            flags.push(c);
            self.bump();
        }
        Ok(self.finish(TokenKind::Regex { pattern, flags }, start, start_loc, newline_before))
    }

    fn read_punct(&mut self, start: u32, start_loc: CodeLoc, newline_before: bool) -> Result<Token, Exception> {
        use Punct::{
            AndAssign, Assign, BitAnd, BitNot, BitOr, BitXor, Colon, Comma, Dec, Dot, EqEq, Gt, GtEq, Inc, LBrace,
            LBracket, LParen, LogAnd, LogOr, Lt, LtEq, Minus, MinusAssign, Not, NotEq, OrAssign, Percent,
            PercentAssign, Plus, PlusAssign, Question, RBrace, RBracket, RParen, Semi, Shl, ShlAssign, Shr, ShrAssign,
            Slash, SlashAssign, Star, StarAssign, StrictEq, StrictNotEq, UShr, UShrAssign, XorAssign,
        };
        let c = self.bump().expect("read_punct requires a pending char");
        let next = self.peek();
        let p = match c {
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            ';' => Semi,
            ',' => Comma,
            ':' => Colon,
            '?' => Question,
            '.' => Dot,
            '=' => {
                if next == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        StrictEq
                    } else {
                        EqEq
                    }
                } else {
                    Assign
                }
            }
            '!' => {
                if next == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        StrictNotEq
                    } else {
                        NotEq
                    }
                } else {
                    Not
                }
            }
            '<' => match next {
                Some('=') => {
                    self.bump();
                    LtEq
                }
                Some('<') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        ShlAssign
                    } else {
                        Shl
                    }
                }
                _ => Lt,
            },
            '>' => match next {
                Some('=') => {
                    self.bump();
                    GtEq
                }
                Some('>') => {
                    self.bump();
                    match self.peek() {
                        Some('>') => {
                            self.bump();
                            if self.peek() == Some('=') {
                                self.bump();
                                UShrAssign
                            } else {
                                UShr
                            }
                        }
                        Some('=') => {
                            self.bump();
                            ShrAssign
                        }
                        _ => Shr,
                    }
                }
                _ => Gt,
            },
            '+' => match next {
                Some('+') => {
                    self.bump();
                    Inc
                }
                Some('=') => {
                    self.bump();
                    PlusAssign
                }
                _ => Plus,
            },
            '-' => match next {
                Some('-') => {
                    self.bump();
                    Dec
                }
                Some('=') => {
                    self.bump();
                    MinusAssign
                }
                _ => Minus,
            },
            '*' => {
                if next == Some('=') {
                    self.bump();
                    StarAssign
                } else {
                    Star
                }
            }
            '/' => {
                if next == Some('=') {
                    self.bump();
                    SlashAssign
                } else {
                    Slash
                }
            }
            '%' => {
                if next == Some('=') {
                    self.bump();
                    PercentAssign
                } else {
                    Percent
                }
            }
            '&' => match next {
                Some('&') => {
                    self.bump();
                    LogAnd
                }
                Some('=') => {
                    self.bump();
                    AndAssign
                }
                _ => BitAnd,
            },
            '|' => match next {
                Some('|') => {
                    self.bump();
                    LogOr
                }
                Some('=') => {
                    self.bump();
                    OrAssign
                }
                _ => BitOr,
            },
            '^' => {
                if next == Some('=') {
                    self.bump();
                    XorAssign
                } else {
                    BitXor
                }
            }
            '~' => BitNot,
            other => return Err(self.error_at(format!("unexpected character {other:?}"), start_loc)),
        };
        Ok(self.finish(TokenKind::Punct(p), start, start_loc, newline_before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut kinds = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::Eof {
                return kinds;
            }
            kinds.push(token.kind);
        }
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex_all("1 2.5 0x10 1e3 .5"),
            vec![
                TokenKind::Num(1.0),
                TokenKind::Num(2.5),
                TokenKind::Num(16.0),
                TokenKind::Num(1000.0),
                TokenKind::Num(0.5),
            ]
        );
    }

    #[test]
    fn legacy_octal() {
        assert_eq!(lex_all("010"), vec![TokenKind::Num(8.0)]);
        assert_eq!(lex_all("089"), vec![TokenKind::Num(89.0)]);
        let mut lexer = Lexer::new("010");
        lexer.strict = true;
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn identifier_after_number_is_error() {
        let mut lexer = Lexer::new("3in");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_all(r#"'a\n\t\x41B'"#),
            vec![TokenKind::Str("a\n\tAB".to_string())]
        );
    }

    #[test]
    fn unterminated_string() {
        let mut lexer = Lexer::new("'abc");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.to_string(), "SyntaxError: unterminated string constant (1:0)");
    }

    #[test]
    fn unterminated_block_comment_reports_its_start() {
        let mut lexer = Lexer::new("1 /* comment");
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.loc().unwrap(), CodeLoc { line: 1, column: 2 });
    }

    #[test]
    fn regexp_vs_division() {
        // After a value, slash is division.
        assert_eq!(
            lex_all("a / b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct(Punct::Slash),
                TokenKind::Ident("b".into()),
            ]
        );
        // After `=`, slash starts a regexp.
        assert_eq!(
            lex_all("x = /ab[/]c/gi"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Punct(Punct::Assign),
                TokenKind::Regex {
                    pattern: "ab[/]c".into(),
                    flags: "gi".into()
                },
            ]
        );
    }

    #[test]
    fn escaped_word_is_not_a_keyword() {
        let mut lexer = Lexer::new(r"\u0076ar");
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::Ident("var".into()));
        assert!(token.escaped);
    }

    #[test]
    fn newline_before_flag() {
        let mut lexer = Lexer::new("a\nb");
        assert!(!lexer.next_token().unwrap().newline_before);
        assert!(lexer.next_token().unwrap().newline_before);
    }

    #[test]
    fn crlf_is_one_line_break() {
        let mut lexer = Lexer::new("a\r\nb");
        lexer.next_token().unwrap();
        let token = lexer.next_token().unwrap();
        assert_eq!(token.start_loc, CodeLoc { line: 2, column: 0 });
    }

    #[test]
    fn html_comments_need_a_line_start() {
        assert_eq!(lex_all("1\n<!-- note\n2"), vec![TokenKind::Num(1.0), TokenKind::Num(2.0)]);
        assert_eq!(lex_all("1\n--> note\n2"), vec![TokenKind::Num(1.0), TokenKind::Num(2.0)]);
    }
}
