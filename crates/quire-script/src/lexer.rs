//! Tokenizer.
//!
//! In statement mode the lexer produces indentation-based `Newline`, `Indent`
//! and `Dedent` tokens; inside brackets and in expression mode line breaks
//! are insignificant.

use crate::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Assign,
    PlusAssign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Expression,
    Statements,
}

const TAB_WIDTH: usize = 8;

pub(crate) fn tokenize(src: &str, mode: Mode) -> Result<Vec<Token>, ScriptError> {
    Lexer::new(src, mode).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    mode: Mode,
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(src: &str, mode: Mode) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            mode,
            depth: 0,
            indents: vec![0],
            at_line_start: mode == Mode::Statements,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn last_is_newline(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.tok),
            None | Some(Tok::Newline | Tok::Indent | Tok::Dedent)
        )
    }

    fn run(mut self) -> Result<Vec<Token>, ScriptError> {
        loop {
            if self.at_line_start {
                self.at_line_start = false;
                if !self.handle_indentation()? {
                    break;
                }
            }

            let Some(c) = self.peek() else { break };

            match c {
                '\n' => {
                    self.pos += 1;
                    if self.mode == Mode::Statements && self.depth == 0 {
                        if !self.last_is_newline() {
                            self.push(Tok::Newline);
                        }
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' => self.pos += 1,
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                '"' | '\'' => self.string(c)?,
                c if c.is_ascii_digit() => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.name(),
                _ => self.punct(c)?,
            }
        }

        if self.mode == Mode::Statements {
            if !self.last_is_newline() {
                self.push(Tok::Newline);
            }
            while self.indents.len() > 1 {
                self.indents.pop();
                self.push(Tok::Dedent);
            }
        }
        self.push(Tok::Eof);
        Ok(self.tokens)
    }

    /// Measure indentation of the next logical line and emit `Indent`/`Dedent`.
    ///
    /// Blank and comment-only lines are skipped. Returns `false` at end of input.
    fn handle_indentation(&mut self) -> Result<bool, ScriptError> {
        loop {
            let mut width = 0;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => width += 1,
                    '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                    '\r' => {}
                    _ => break,
                }
                self.pos += 1;
            }

            match self.peek() {
                None => return Ok(false),
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                Some('#') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                Some(_) => {
                    let current = self.indents.last().copied().unwrap_or(0);
                    if width > current {
                        self.indents.push(width);
                        self.push(Tok::Indent);
                    } else {
                        while width < self.indents.last().copied().unwrap_or(0) {
                            self.indents.pop();
                            self.push(Tok::Dedent);
                        }
                        if width != self.indents.last().copied().unwrap_or(0) {
                            return Err(ScriptError::syntax(
                                self.line,
                                "unindent does not match any outer indentation level",
                            ));
                        }
                    }
                    return Ok(true);
                }
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<(), ScriptError> {
        let start_line = self.line;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(ScriptError::syntax(start_line, "unterminated string literal"));
            };
            self.pos += 1;
            match c {
                c if c == quote => break,
                '\n' => {
                    return Err(ScriptError::syntax(start_line, "unterminated string literal"));
                }
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(ScriptError::syntax(start_line, "unterminated string literal"));
                    };
                    self.pos += 1;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' => out.push('\\'),
                        '\'' => out.push('\''),
                        '"' => out.push('"'),
                        '\n' => self.line += 1,
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
        self.push(Tok::Str(out));
        Ok(())
    }

    fn number(&mut self) -> Result<(), ScriptError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
        let is_float = self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|e| ScriptError::syntax(self.line, format!("invalid number {text}: {e}")))?;
            self.push(Tok::Float(value));
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|e| ScriptError::syntax(self.line, format!("invalid number {text}: {e}")))?;
            self.push(Tok::Int(value));
        }
        Ok(())
    }

    fn name(&mut self) {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.push(Tok::Name(name));
    }

    fn punct(&mut self, c: char) -> Result<(), ScriptError> {
        let next = self.peek_at(1);
        let (tok, width) = match (c, next) {
            ('=', Some('=')) => (Tok::Eq, 2),
            ('!', Some('=')) => (Tok::Ne, 2),
            ('<', Some('=')) => (Tok::Le, 2),
            ('>', Some('=')) => (Tok::Ge, 2),
            ('+', Some('=')) => (Tok::PlusAssign, 2),
            ('/', Some('/')) => (Tok::DoubleSlash, 2),
            ('=', _) => (Tok::Assign, 1),
            ('<', _) => (Tok::Lt, 1),
            ('>', _) => (Tok::Gt, 1),
            ('+', _) => (Tok::Plus, 1),
            ('-', _) => (Tok::Minus, 1),
            ('*', _) => (Tok::Star, 1),
            ('/', _) => (Tok::Slash, 1),
            ('%', _) => (Tok::Percent, 1),
            (',', _) => (Tok::Comma, 1),
            ('.', _) => (Tok::Dot, 1),
            (':', _) => (Tok::Colon, 1),
            ('(', _) => (Tok::LParen, 1),
            ('[', _) => (Tok::LBracket, 1),
            ('{', _) => (Tok::LBrace, 1),
            (')', _) => (Tok::RParen, 1),
            (']', _) => (Tok::RBracket, 1),
            ('}', _) => (Tok::RBrace, 1),
            (other, _) => {
                return Err(ScriptError::syntax(
                    self.line,
                    format!("unexpected character {other:?}"),
                ));
            }
        };

        match tok {
            Tok::LParen | Tok::LBracket | Tok::LBrace => self.depth += 1,
            Tok::RParen | Tok::RBracket | Tok::RBrace => {
                self.depth = self.depth.checked_sub(1).ok_or_else(|| {
                    ScriptError::syntax(self.line, format!("unmatched {c:?}"))
                })?;
            }
            _ => {}
        }

        self.pos += width;
        self.push(tok);
        Ok(())
    }
}
