//! Byte cursor and lookahead token classifier
//!
//! The parser never rebuilds the input buffer; it moves a position index over
//! the immutable file buffer. Pushback is a rewind of that index.

use log::trace;

use crate::error::{PdfSlimError, SlimResult};

/// Maximum number of tokens the classifier looks at
const LOOKAHEAD_TOKENS: usize = 3;

/// Coarse token kinds reported by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<int> <int> obj`
    ObjectStart,
    /// `<<`
    DictOpen,
    /// `>>`
    DictClose,
    /// `/Name`
    Name,
    /// Signed integer
    Integer,
    /// Number with a decimal point
    Real,
    /// `<int> <int> R`
    Reference,
    /// `endobj`
    EndObject,
    /// `stream`
    StreamBegin,
    /// `[`
    ArrayOpen,
    /// `]`
    ArrayClose,
    /// `( ... )`
    LiteralString,
    /// `< hex >`
    HexString,
    /// `true` or `false`
    Boolean,
    /// `null`
    Null,
    /// `xref`
    Xref,
    /// `trailer`
    Trailer,
    /// `startxref`
    StartXref,
    /// `%%EOF`
    EndOfFile,
    Unknown,
}

/// PDF whitespace characters
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0c | 0x00)
}

/// PDF delimiter characters
pub fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Check for an optionally signed run of digits
pub fn is_integer(word: &[u8]) -> bool {
    let digits = match word.first() {
        Some(b'-') | Some(b'+') => &word[1..],
        _ => word,
    };
    !digits.is_empty() && digits.iter().all(u8::is_ascii_digit)
}

fn is_real(word: &[u8]) -> bool {
    let body = match word.first() {
        Some(b'-') | Some(b'+') => &word[1..],
        _ => word,
    };
    let dots = body.iter().filter(|&&b| b == b'.').count();
    dots == 1
        && body.iter().any(u8::is_ascii_digit)
        && body.iter().all(|&b| b == b'.' || b.is_ascii_digit())
}

/// Find the bounds of the next token starting at `from`
fn token_bounds(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut start = from;
    while start < data.len() && is_whitespace(data[start]) {
        start += 1;
    }
    if start >= data.len() {
        return None;
    }

    let end = match data[start] {
        b'<' | b'>' if data.get(start + 1) == Some(&data[start]) => start + 2,
        b'/' => {
            let mut end = start + 1;
            while end < data.len() && is_regular(data[end]) {
                end += 1;
            }
            end
        }
        b if is_delimiter(b) => start + 1,
        _ => {
            let mut end = start;
            while end < data.len() && is_regular(data[end]) {
                end += 1;
            }
            end
        }
    };
    Some((start, end))
}

/// Split up to `LOOKAHEAD_TOKENS` tokens off the front of `data`
fn lookahead(data: &[u8]) -> Vec<&[u8]> {
    let mut tokens = Vec::with_capacity(LOOKAHEAD_TOKENS);
    let mut pos = 0;
    while tokens.len() < LOOKAHEAD_TOKENS {
        match token_bounds(data, pos) {
            Some((start, end)) => {
                tokens.push(&data[start..end]);
                pos = end;
            }
            None => break,
        }
    }
    tokens
}

fn is_hex_string(data: &[u8]) -> bool {
    if data.first() != Some(&b'<') {
        return false;
    }
    for &b in &data[1..] {
        match b {
            b'>' => return true,
            b if b.is_ascii_hexdigit() || is_whitespace(b) => continue,
            _ => return false,
        }
    }
    false
}

/// Classify the token at the front of `data` without consuming it
pub fn classify(data: &[u8]) -> TokenKind {
    let tokens = lookahead(data);
    let Some(&first) = tokens.first() else {
        return TokenKind::Unknown;
    };

    if is_integer(first) {
        if tokens.len() == LOOKAHEAD_TOKENS && is_integer(tokens[1]) {
            match tokens[2] {
                b"R" => return TokenKind::Reference,
                b"obj" => return TokenKind::ObjectStart,
                _ => {}
            }
        }
        return TokenKind::Integer;
    }

    match first {
        b"<<" => TokenKind::DictOpen,
        b">>" => TokenKind::DictClose,
        b"[" => TokenKind::ArrayOpen,
        b"]" => TokenKind::ArrayClose,
        b"(" => TokenKind::LiteralString,
        b"endobj" => TokenKind::EndObject,
        b"stream" => TokenKind::StreamBegin,
        b"xref" => TokenKind::Xref,
        b"trailer" => TokenKind::Trailer,
        b"startxref" => TokenKind::StartXref,
        b"true" | b"false" => TokenKind::Boolean,
        b"null" => TokenKind::Null,
        b"<" if is_hex_string(&data[leading_whitespace(data)..]) => TokenKind::HexString,
        b"%" if data[leading_whitespace(data)..].starts_with(b"%%EOF") => TokenKind::EndOfFile,
        word if word.starts_with(b"/") => TokenKind::Name,
        word if is_real(word) => TokenKind::Real,
        _ => TokenKind::Unknown,
    }
}

fn leading_whitespace(data: &[u8]) -> usize {
    data.iter().take_while(|&&b| is_whitespace(b)).count()
}

/// Read cursor over an immutable PDF buffer
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a cursor at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a cursor at an arbitrary offset
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor back (or forward) to `pos`
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Unconsumed bytes
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn starts_with(&self, pattern: &[u8]) -> bool {
        self.remaining().starts_with(pattern)
    }

    pub fn skip_whitespace(&mut self) {
        while self.pos < self.data.len() && is_whitespace(self.data[self.pos]) {
            self.pos += 1;
        }
    }

    /// Skip whitespace and `%` comment lines, stopping at `%%EOF`
    pub fn skip_comment_lines(&mut self) {
        loop {
            self.skip_whitespace();
            if !self.starts_with(b"%") || self.starts_with(b"%%EOF") {
                return;
            }
            while self.pos < self.data.len() && !matches!(self.data[self.pos], b'\r' | b'\n') {
                self.pos += 1;
            }
        }
    }

    /// Consume one end-of-line marker (CRLF, LF or CR)
    pub fn skip_eol(&mut self) -> bool {
        if self.starts_with(b"\r\n") {
            self.pos += 2;
            true
        } else if self.starts_with(b"\n") || self.starts_with(b"\r") {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Classify the next token after skipping whitespace
    pub fn peek_kind(&mut self) -> TokenKind {
        self.skip_whitespace();
        let kind = classify(self.remaining());
        trace!("Classified {:?} at offset {}", kind, self.pos);
        kind
    }

    /// Read everything up to the next end-of-line, consuming the EOL
    pub fn read_line(&mut self) -> SlimResult<&'a [u8]> {
        let start = self.pos;
        let len = self.remaining()
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
            .ok_or(PdfSlimError::UnexpectedEof { expected: "end of line" })?;
        self.pos += len;
        self.skip_eol();
        Ok(&self.data[start..start + len])
    }

    /// Read a run of regular characters
    pub fn read_word(&mut self, expected: &'static str) -> SlimResult<&'a [u8]> {
        self.skip_whitespace();
        if self.at_end() {
            return Err(PdfSlimError::UnexpectedEof { expected });
        }
        let start = self.pos;
        while self.pos < self.data.len() && is_regular(self.data[self.pos]) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(PdfSlimError::structural(expected, start));
        }
        Ok(&self.data[start..self.pos])
    }

    /// Consume `keyword` or fail without moving
    pub fn expect_keyword(&mut self, keyword: &'static str) -> SlimResult<()> {
        self.skip_whitespace();
        let start = self.pos;
        match self.read_word(keyword) {
            Ok(word) if word == keyword.as_bytes() => Ok(()),
            Ok(_) | Err(PdfSlimError::Structural { .. }) => {
                self.pos = start;
                Err(PdfSlimError::structural(keyword, start))
            }
            Err(e) => Err(e),
        }
    }

    /// Consume a delimiter sequence such as `<<` or `[`
    pub fn expect_delimiter(&mut self, delimiter: &'static str) -> SlimResult<()> {
        self.skip_whitespace();
        if self.starts_with(delimiter.as_bytes()) {
            self.pos += delimiter.len();
            Ok(())
        } else if self.at_end() {
            Err(PdfSlimError::UnexpectedEof { expected: delimiter })
        } else {
            Err(PdfSlimError::structural(delimiter, self.pos))
        }
    }

    pub fn read_integer(&mut self) -> SlimResult<i64> {
        self.skip_whitespace();
        let start = self.pos;
        let word = self.read_word("integer")?;
        if !is_integer(word) {
            return Err(PdfSlimError::parse_int(String::from_utf8_lossy(word), start));
        }
        std::str::from_utf8(word)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| PdfSlimError::parse_int(String::from_utf8_lossy(word), start))
    }

    /// Read an integer that must fit in `T` (object numbers, generations)
    pub fn read_unsigned<T: TryFrom<i64>>(&mut self) -> SlimResult<T> {
        self.skip_whitespace();
        let start = self.pos;
        let value = self.read_integer()?;
        T::try_from(value).map_err(|_| PdfSlimError::parse_int(value.to_string(), start))
    }

    pub fn read_real(&mut self) -> SlimResult<f64> {
        self.skip_whitespace();
        let start = self.pos;
        let word = self.read_word("number")?;
        std::str::from_utf8(word)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| PdfSlimError::parse_int(String::from_utf8_lossy(word), start))
    }

    /// Read a `/Name` token, returning the name without its slash
    pub fn read_name(&mut self) -> SlimResult<String> {
        self.expect_delimiter("/")?;
        let start = self.pos;
        while self.pos < self.data.len() && is_regular(self.data[self.pos]) {
            self.pos += 1;
        }
        Ok(String::from_utf8_lossy(&self.data[start..self.pos]).into_owned())
    }

    /// Read a balanced `( ... )` string, returning the raw bytes between the
    /// outer parentheses with escapes left untouched
    pub fn read_literal_string(&mut self) -> SlimResult<Vec<u8>> {
        self.expect_delimiter("(")?;
        let start = self.pos;
        let mut depth = 1usize;
        while self.pos < self.data.len() {
            match self.data[self.pos] {
                b'\\' => self.pos += 1,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        let content = self.data[start..self.pos].to_vec();
                        self.pos += 1;
                        return Ok(content);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(PdfSlimError::UnexpectedEof { expected: ")" })
    }

    /// Read a `< hex >` string up to the first `>`; bytes after it stay
    /// unconsumed
    pub fn read_hex_string(&mut self) -> SlimResult<String> {
        self.expect_delimiter("<")?;
        let start = self.pos;
        while self.pos < self.data.len() {
            match self.data[self.pos] {
                b'>' => {
                    let content = String::from_utf8_lossy(&self.data[start..self.pos]).into_owned();
                    self.pos += 1;
                    return Ok(content);
                }
                b if b.is_ascii_hexdigit() || is_whitespace(b) => self.pos += 1,
                _ => return Err(PdfSlimError::structural(">", self.pos)),
            }
        }
        Err(PdfSlimError::UnexpectedEof { expected: ">" })
    }

    /// Locate `needle` at or after `from`
    pub fn find(&self, needle: &[u8], from: usize) -> Option<usize> {
        if from >= self.data.len() || needle.is_empty() {
            return None;
        }
        self.data[from..]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|idx| from + idx)
    }
}

/// Find byte sequence in reverse
pub fn find_sequence_backwards(data: &[u8], sequence: &[u8]) -> Option<usize> {
    if sequence.is_empty() || sequence.len() > data.len() {
        return None;
    }
    (0..=data.len() - sequence.len())
        .rev()
        .find(|&i| &data[i..i + sequence.len()] == sequence)
}
