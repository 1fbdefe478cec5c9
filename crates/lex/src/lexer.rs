use codepage::CodePage;

use crate::token::{Token, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorCode {
    UnfinishedStringLiteral,
    /// Carries the configured code-point limit.
    StringLiteralTooLong(u32),
    IllegalByte,
    IllegalByteOutsideStringLiterals,
    FoundCStyleEscapedQuote,
    InvalidCodePage(u32),
    UnsupportedCodePage(u32),
}

/// A lexical error with the offending span. After returning one of these
/// the lexer is positioned past the offending construct, so callers that
/// choose to demote the error (e.g. `/w` for code page pragmas) can keep
/// pulling tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexError {
    pub code: LexErrorCode,
    pub token: Token,
}

#[derive(Debug, Clone, Copy)]
pub struct LexerOptions {
    pub code_page: CodePage,
    pub max_string_literal_codepoints: usize,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            code_page: CodePage::Windows1252,
            max_string_literal_codepoints: 8192,
        }
    }
}

pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line_number: usize,
    at_line_start: bool,
    code_page: CodePage,
    max_string_literal_codepoints: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(bytes: &'a [u8], options: LexerOptions) -> Self {
        Self {
            bytes,
            pos: 0,
            line_number: 1,
            at_line_start: true,
            code_page: options.code_page,
            max_string_literal_codepoints: options.max_string_literal_codepoints,
        }
    }

    /// The code page in effect at the current position. `#pragma
    /// code_page` changes it at line granularity.
    pub fn current_code_page(&self) -> CodePage {
        self.code_page
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn make_token(&self, id: TokenId, start: usize, line_number: usize) -> Token {
        Token {
            id,
            start,
            end: self.pos,
            line_number,
        }
    }

    fn error(&self, code: LexErrorCode, start: usize, line_number: usize) -> LexError {
        let end = self.pos.max(start + 1).min(self.bytes.len()).max(start);
        LexError {
            code,
            token: Token {
                id: TokenId::Identifier,
                start,
                end,
                line_number,
            },
        }
    }

    /// Next token; `Eof` at the end of input (callers stop there, further
    /// calls keep returning `Eof`).
    pub fn next(&mut self) -> Result<Token, LexError> {
        loop {
            self.skip_whitespace();
            if self.at_line_start && self.peek() == Some(b'#') {
                self.handle_hash_line()?;
                continue;
            }
            break;
        }
        self.at_line_start = false;

        let start = self.pos;
        let line_number = self.line_number;
        let Some(c) = self.peek() else {
            return Ok(self.make_token(TokenId::Eof, start, line_number));
        };

        let single = match c {
            b'{' => Some(TokenId::OpenBrace),
            b'}' => Some(TokenId::CloseBrace),
            b',' => Some(TokenId::Comma),
            b'(' => Some(TokenId::OpenParen),
            b')' => Some(TokenId::CloseParen),
            b'+' => Some(TokenId::Plus),
            b'-' => Some(TokenId::Minus),
            b'|' => Some(TokenId::Pipe),
            b'&' => Some(TokenId::Amp),
            b'~' => Some(TokenId::Tilde),
            _ => None,
        };
        if let Some(id) = single {
            self.pos += 1;
            return Ok(self.make_token(id, start, line_number));
        }

        if c == b'"' {
            return self.scan_string(false, start, line_number);
        }
        if (c == b'L' || c == b'l') && self.peek_at(1) == Some(b'"') {
            self.pos += 1;
            return self.scan_string(true, start, line_number);
        }
        if c.is_ascii_digit() {
            return Ok(self.scan_number(start, line_number));
        }
        if let Some(code) = illegal_byte_code(c, false) {
            self.pos += 1;
            return Err(self.error(code, start, line_number));
        }
        self.scan_identifier(start, line_number)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b'\n' => {
                    self.line_number += 1;
                    self.at_line_start = true;
                    self.pos += 1;
                }
                // A lone \r is ignored for display and never counts as a
                // newline.
                b' ' | b'\t' | b'\r' | 0x0B | 0x0C => self.pos += 1,
                _ => break,
            }
        }
    }

    /// Handle a `#`-line. `#pragma code_page(N)` switches the active code
    /// page; any other surviving directive artifact is skipped.
    fn handle_hash_line(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let line_number = self.line_number;
        let line_end = self.bytes[self.pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| self.pos + i)
            .unwrap_or(self.bytes.len());
        let line = &self.bytes[self.pos..line_end];
        let new_code_page = parse_code_page_pragma(line);
        self.pos = line_end;
        // The newline itself is consumed by the next skip_whitespace call,
        // keeping the line count in one place.
        match new_code_page {
            None => Ok(()),
            Some(id) => match CodePage::from_identifier(id) {
                Ok(code_page) => {
                    self.code_page = code_page;
                    Ok(())
                }
                Err(codepage::CodePageError::Unsupported) => {
                    Err(self.error(LexErrorCode::UnsupportedCodePage(id), start, line_number))
                }
                Err(codepage::CodePageError::Invalid) => {
                    Err(self.error(LexErrorCode::InvalidCodePage(id), start, line_number))
                }
            },
        }
    }

    fn scan_number(&mut self, start: usize, line_number: usize) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.make_token(TokenId::Number, start, line_number)
    }

    fn scan_identifier(&mut self, start: usize, line_number: usize) -> Result<Token, LexError> {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' | 0x0B | 0x0C => break,
                b'{' | b'}' | b'(' | b')' | b',' | b'"' => break,
                _ => {
                    if illegal_byte_code(c, false).is_some() {
                        break;
                    }
                    self.pos += 1;
                }
            }
        }
        let slice = &self.bytes[start..self.pos];
        let id = if crate::keywords::eq_ignore_case(slice, "begin") {
            TokenId::Begin
        } else if crate::keywords::eq_ignore_case(slice, "end") {
            TokenId::End
        } else {
            TokenId::Identifier
        };
        Ok(self.make_token(id, start, line_number))
    }

    fn scan_string(
        &mut self,
        wide: bool,
        start: usize,
        line_number: usize,
    ) -> Result<Token, LexError> {
        // Opening quote.
        self.pos += 1;
        let mut codepoints = 0usize;
        loop {
            let Some((c, len)) = self.code_page.decode_next(&self.bytes[self.pos..]) else {
                return Err(self.error(
                    LexErrorCode::UnfinishedStringLiteral,
                    start,
                    line_number,
                ));
            };
            match c {
                '\n' => {
                    // A bare newline terminates the literal at the lexical
                    // layer.
                    return Err(self.error(
                        LexErrorCode::UnfinishedStringLiteral,
                        start,
                        line_number,
                    ));
                }
                '\0' => {
                    self.pos += len;
                    return Err(self.error(LexErrorCode::IllegalByte, start, line_number));
                }
                '"' => {
                    self.pos += len;
                    if self.peek() == Some(b'"') {
                        // "" is the escaped quote.
                        self.pos += 1;
                        codepoints += 1;
                        continue;
                    }
                    break;
                }
                '\\' => {
                    self.pos += len;
                    codepoints += 1;
                    match self.peek() {
                        Some(b'"') => {
                            self.pos += 1;
                            return Err(self.error(
                                LexErrorCode::FoundCStyleEscapedQuote,
                                start,
                                line_number,
                            ));
                        }
                        Some(b'\\') => {
                            self.pos += 1;
                            codepoints += 1;
                        }
                        _ => {}
                    }
                }
                _ => {
                    self.pos += len;
                    codepoints += 1;
                }
            }
        }
        if codepoints > self.max_string_literal_codepoints {
            return Err(self.error(
                LexErrorCode::StringLiteralTooLong(self.max_string_literal_codepoints as u32),
                start,
                line_number,
            ));
        }
        let id = if wide {
            TokenId::QuotedWideString
        } else {
            TokenId::QuotedAsciiString
        };
        Ok(self.make_token(id, start, line_number))
    }
}

/// Classify a byte outside string literals. 0x00 is illegal everywhere;
/// the other low control bytes (and DEL) only outside string literals.
fn illegal_byte_code(byte: u8, inside_string_literal: bool) -> Option<LexErrorCode> {
    match byte {
        0x00 => Some(LexErrorCode::IllegalByte),
        0x01..=0x08 | 0x0E..=0x1F | 0x7F if !inside_string_literal => {
            Some(LexErrorCode::IllegalByteOutsideStringLiterals)
        }
        _ => None,
    }
}

/// Match `#pragma code_page(N)` (case-insensitive, whitespace-tolerant).
/// Returns the code page identifier, or `None` if the line is not a
/// code_page pragma.
fn parse_code_page_pragma(line: &[u8]) -> Option<u32> {
    let mut rest = line.strip_prefix(b"#")?;
    rest = skip_ws(rest);
    rest = strip_prefix_ignore_case(rest, "pragma")?;
    rest = skip_ws(rest);
    rest = strip_prefix_ignore_case(rest, "code_page")?;
    rest = skip_ws(rest);
    rest = rest.strip_prefix(b"(")?;
    rest = skip_ws(rest);
    let mut value = 0u32;
    let mut any = false;
    while let Some((&c, tail)) = rest.split_first() {
        if !c.is_ascii_digit() {
            break;
        }
        any = true;
        value = value.saturating_mul(10).saturating_add((c - b'0') as u32);
        rest = tail;
    }
    if !any {
        // `#pragma code_page(DEFAULT)` and friends: report as invalid id 0.
        return Some(0);
    }
    Some(value)
}

fn skip_ws(mut bytes: &[u8]) -> &[u8] {
    while let Some((&c, tail)) = bytes.split_first() {
        if c == b' ' || c == b'\t' {
            bytes = tail;
        } else {
            break;
        }
    }
    bytes
}

fn strip_prefix_ignore_case<'b>(bytes: &'b [u8], lower: &str) -> Option<&'b [u8]> {
    if bytes.len() < lower.len() {
        return None;
    }
    let (head, tail) = bytes.split_at(lower.len());
    crate::keywords::eq_ignore_case(head, lower).then_some(tail)
}
