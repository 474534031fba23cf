// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Token scanner.
//!
//! Scans source text into [`Token`]s in a single forward pass. Bracket depth
//! suppresses layout tokens (implicit line joining), a backslash before a line
//! end joins lines explicitly, and tabs advance indentation to the next
//! multiple of eight.

use memchr::memchr2;
use pyopt_core::{LineIndex, Span};
use thiserror::Error;

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokType {
    /// Identifier or keyword.
    Name,
    Number,
    /// String literal including prefix and quotes.
    String,
    /// Operator or delimiter.
    Op,
    /// End of a logical line.
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

/// A token borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokType,
    pub text: &'a str,
    pub span: Span,
    /// 1-indexed line of the token start.
    pub line: u32,
    /// 1-indexed column (in chars) of the token start.
    pub col: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated triple-quoted string literal")]
    UnterminatedTripleQuotedString,
    #[error("unmatched '{0}'")]
    UnmatchedBracket(char),
    #[error("closing '{close}' does not match opening '{open}'")]
    MismatchedBracket { open: char, close: char },
    #[error("'{0}' was never closed")]
    UnclosedBracket(char),
    #[error("unindent does not match any outer indentation level")]
    InconsistentDedent,
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    #[error("unexpected end of file after line continuation")]
    EofAfterContinuation,
    #[error("invalid number literal")]
    InvalidNumber,
}

/// A tokenizer failure with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct TokError {
    pub kind: TokErrorKind,
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

const OPS3: [&str; 5] = ["**=", "//=", ">>=", "<<=", "..."];
const OPS2: [&str; 19] = [
    "**", "//", ">>", "<<", "<=", ">=", "==", "!=", "->", ":=", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "@=",
];
const OPS1: &[u8] = b"+-*/%@&|^~<>()[]{},:;.=";

const STRING_PREFIXES: [&str; 8] = ["r", "u", "b", "f", "br", "rb", "fr", "rf"];

/// Tokenize `text`.
///
/// A leading byte-order mark is skipped; offsets still count its bytes.
/// The token stream always ends with `EndMarker`. A non-empty stream has a
/// `Newline` before any closing `Dedent`s, even when the text lacks a final
/// line break.
pub fn tokenize(text: &str) -> Result<Vec<Token<'_>>, TokError> {
    TokState::new(text).run()
}

pub(crate) struct TokState<'a> {
    text: &'a str,
    bytes: &'a [u8],
    index: LineIndex<'a>,
    pos: usize,
    indents: Vec<usize>,
    brackets: Vec<(char, usize)>,
    at_line_start: bool,
    tokens: Vec<Token<'a>>,
}

impl<'a> TokState<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        TokState {
            text,
            bytes: text.as_bytes(),
            index: LineIndex::new(text),
            pos: if text.starts_with('\u{feff}') { 3 } else { 0 },
            indents: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
            tokens: Vec::with_capacity(text.len() / 4 + 1),
        }
    }

    pub(crate) fn run(mut self) -> Result<Vec<Token<'a>>, TokError> {
        while self.pos < self.bytes.len() {
            if self.at_line_start && self.brackets.is_empty() && !self.indentation()? {
                continue;
            }
            self.next_token()?;
        }
        self.finish()
    }

    /// Measure indentation at the start of a line and emit layout tokens.
    ///
    /// Returns `false` when the line is blank or comment-only.
    fn indentation(&mut self) -> Result<bool, TokError> {
        let mut col = 0usize;
        let mut p = self.pos;
        while p < self.bytes.len() {
            match self.bytes[p] {
                b' ' => col += 1,
                b'\t' => col = (col / 8 + 1) * 8,
                b'\x0c' => col = 0,
                _ => break,
            }
            p += 1;
        }

        if p >= self.bytes.len() {
            self.pos = p;
            return Ok(false);
        }
        match self.bytes[p] {
            b'#' => {
                self.pos = self.comment_end(p);
                self.consume_line_end();
                return Ok(false);
            }
            b'\n' | b'\r' => {
                self.pos = p;
                self.consume_line_end();
                return Ok(false);
            }
            _ => {}
        }

        self.pos = p;
        self.at_line_start = false;
        let current = self.current_indent();
        if col > current {
            self.indents.push(col);
            self.push(TokType::Indent, p, p);
        } else if col < current {
            while col < self.current_indent() {
                self.indents.pop();
                self.push(TokType::Dedent, p, p);
            }
            if col != self.current_indent() {
                return Err(self.error(TokErrorKind::InconsistentDedent, p));
            }
        }
        Ok(true)
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    fn next_token(&mut self) -> Result<(), TokError> {
        while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\x0c')
        {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Ok(());
        }

        let start = self.pos;
        match self.bytes[start] {
            b'#' => {
                self.pos = self.comment_end(start);
                Ok(())
            }
            b'\n' | b'\r' => {
                self.consume_line_end();
                if self.brackets.is_empty() {
                    self.push(TokType::Newline, start, self.pos);
                    self.at_line_start = true;
                }
                Ok(())
            }
            b'\\' => {
                self.pos += 1;
                match self.bytes.get(self.pos) {
                    None => Err(self.error(TokErrorKind::EofAfterContinuation, start)),
                    Some(b'\n' | b'\r') => {
                        self.consume_line_end();
                        if self.pos >= self.bytes.len() {
                            return Err(self.error(TokErrorKind::EofAfterContinuation, start));
                        }
                        Ok(())
                    }
                    Some(_) => Err(self.error(TokErrorKind::UnexpectedCharacter('\\'), start)),
                }
            }
            b'0'..=b'9' => self.number(start),
            b'.' if self.bytes.get(start + 1).is_some_and(|b| b.is_ascii_digit()) => {
                self.number(start)
            }
            b'"' | b'\'' => self.string(start, start),
            _ => {
                let end = self.identifier_end(start);
                if end > start {
                    let word = &self.text[start..end];
                    let quote_follows = matches!(self.bytes.get(end), Some(b'"' | b'\''));
                    if quote_follows && is_string_prefix(word) {
                        return self.string(start, end);
                    }
                    self.pos = end;
                    self.push(TokType::Name, start, end);
                    Ok(())
                } else {
                    self.operator(start)
                }
            }
        }
    }

    fn identifier_end(&self, start: usize) -> usize {
        let mut end = start;
        for (i, ch) in self.text[start..].char_indices() {
            let ok = if i == 0 {
                ch == '_' || ch.is_alphabetic()
            } else {
                ch == '_' || ch.is_alphanumeric()
            };
            if !ok {
                break;
            }
            end = start + i + ch.len_utf8();
        }
        end
    }

    fn number(&mut self, start: usize) -> Result<(), TokError> {
        let bytes = self.bytes;
        let digit_or_sep = |p: usize| p < bytes.len() && (bytes[p].is_ascii_digit() || bytes[p] == b'_');
        let mut p = start;

        if bytes[p] == b'0'
            && matches!(
                bytes.get(p + 1),
                Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B')
            )
        {
            p += 2;
            let digits = p;
            while p < bytes.len() && (bytes[p].is_ascii_hexdigit() || bytes[p] == b'_') {
                p += 1;
            }
            if p == digits {
                return Err(self.error(TokErrorKind::InvalidNumber, start));
            }
        } else {
            while digit_or_sep(p) {
                p += 1;
            }
            if p < bytes.len() && bytes[p] == b'.' {
                p += 1;
                while digit_or_sep(p) {
                    p += 1;
                }
            }
            if p < bytes.len() && matches!(bytes[p], b'e' | b'E') {
                let mut q = p + 1;
                if q < bytes.len() && matches!(bytes[q], b'+' | b'-') {
                    q += 1;
                }
                if q < bytes.len() && bytes[q].is_ascii_digit() {
                    p = q;
                    while digit_or_sep(p) {
                        p += 1;
                    }
                }
            }
            if p < bytes.len() && matches!(bytes[p], b'j' | b'J') {
                p += 1;
            }
        }

        self.pos = p;
        self.push(TokType::Number, start, p);
        Ok(())
    }

    /// Scan a string literal whose prefix starts at `start` and whose opening
    /// quote is at `quote_pos`.
    fn string(&mut self, start: usize, quote_pos: usize) -> Result<(), TokError> {
        let bytes = self.bytes;
        let quote = bytes[quote_pos];
        let triple = bytes.get(quote_pos + 1) == Some(&quote) && bytes.get(quote_pos + 2) == Some(&quote);
        let unterminated = if triple {
            TokErrorKind::UnterminatedTripleQuotedString
        } else {
            TokErrorKind::UnterminatedString
        };

        let mut p = quote_pos + if triple { 3 } else { 1 };
        loop {
            if p >= bytes.len() {
                return Err(self.error(unterminated, start));
            }
            let c = bytes[p];
            if c == b'\\' {
                // The escaped character never terminates the literal, even in raw strings.
                if bytes.get(p + 1) == Some(&b'\r') && bytes.get(p + 2) == Some(&b'\n') {
                    p += 3;
                } else {
                    p += 2;
                }
                continue;
            }
            if triple {
                if c == quote && bytes.get(p + 1) == Some(&quote) && bytes.get(p + 2) == Some(&quote)
                {
                    p += 3;
                    break;
                }
            } else if c == quote {
                p += 1;
                break;
            } else if c == b'\n' || c == b'\r' {
                return Err(self.error(unterminated, start));
            }
            p += 1;
        }

        self.pos = p;
        self.push(TokType::String, start, p);
        Ok(())
    }

    fn operator(&mut self, start: usize) -> Result<(), TokError> {
        let rest = &self.text[start..];
        let len = if OPS3.iter().any(|op| rest.starts_with(op)) {
            3
        } else if OPS2.iter().any(|op| rest.starts_with(op)) {
            2
        } else if OPS1.contains(&self.bytes[start]) {
            1
        } else {
            let ch = rest.chars().next().unwrap_or('\0');
            return Err(self.error(TokErrorKind::UnexpectedCharacter(ch), start));
        };

        if len == 1 {
            let ch = char::from(self.bytes[start]);
            match ch {
                '(' | '[' | '{' => self.brackets.push((ch, start)),
                ')' | ']' | '}' => match self.brackets.pop() {
                    None => return Err(self.error(TokErrorKind::UnmatchedBracket(ch), start)),
                    Some((open, _)) if closer(open) != ch => {
                        return Err(self.error(
                            TokErrorKind::MismatchedBracket { open, close: ch },
                            start,
                        ))
                    }
                    Some(_) => {}
                },
                _ => {}
            }
        }

        self.pos = start + len;
        self.push(TokType::Op, start, start + len);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Token<'a>>, TokError> {
        if let Some(&(open, offset)) = self.brackets.last() {
            return Err(self.error(TokErrorKind::UnclosedBracket(open), offset));
        }
        let end = self.bytes.len();
        if self
            .tokens
            .last()
            .is_some_and(|tok| tok.kind != TokType::Newline)
        {
            self.push(TokType::Newline, end, end);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokType::Dedent, end, end);
        }
        self.push(TokType::EndMarker, end, end);
        Ok(self.tokens)
    }

    fn comment_end(&self, from: usize) -> usize {
        memchr2(b'\n', b'\r', &self.bytes[from..]).map_or(self.bytes.len(), |i| from + i)
    }

    fn consume_line_end(&mut self) {
        match self.bytes.get(self.pos) {
            Some(b'\r') => {
                self.pos += 1;
                if self.bytes.get(self.pos) == Some(&b'\n') {
                    self.pos += 1;
                }
            }
            Some(b'\n') => self.pos += 1,
            _ => {}
        }
    }

    fn push(&mut self, kind: TokType, start: usize, end: usize) {
        let (line, col) = self.index.position(start);
        self.tokens.push(Token {
            kind,
            text: &self.text[start..end],
            span: Span::new(start, end),
            line,
            col,
        });
    }

    fn error(&self, kind: TokErrorKind, offset: usize) -> TokError {
        let (line, column) = self.index.position(offset);
        TokError {
            kind,
            offset,
            line,
            column,
        }
    }
}

fn is_string_prefix(word: &str) -> bool {
    word.len() <= 2
        && STRING_PREFIXES
            .iter()
            .any(|prefix| prefix.eq_ignore_ascii_case(word))
}

fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}
