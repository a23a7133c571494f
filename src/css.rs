//! Low-level CSS scanning.
//!
//! Byte-offset helpers shared by the scoping stage and the built-in stages.
//! They only understand the lexical layer (comments, strings, identifiers,
//! bracket nesting); rule structure lives in `scoping`.

use crate::error::{
    CssSyntaxError, ERR_UNCLOSED_BRACKET, ERR_UNCLOSED_COMMENT, ERR_UNCLOSED_PAREN,
    ERR_UNCLOSED_STRING,
};

/// A lexical error at a byte offset, before file context is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanError {
    pub code: &'static str,
    pub message: &'static str,
    pub offset: usize,
}

impl ScanError {
    pub fn new(code: &'static str, message: &'static str, offset: usize) -> Self {
        ScanError {
            code,
            message,
            offset,
        }
    }

    pub fn into_syntax(self, file: &str, source: &str) -> CssSyntaxError {
        CssSyntaxError::at(self.code, self.message, file, source, self.offset)
    }
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;

pub fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'-' || b >= 0x80 || b == b'\\'
}

pub fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

pub fn starts_comment(bytes: &[u8], pos: usize) -> bool {
    bytes.get(pos) == Some(&b'/') && bytes.get(pos + 1) == Some(&b'*')
}

/// `pos` is at `/*`; returns the offset just past `*/`.
pub fn skip_comment(src: &str, pos: usize) -> ScanResult<usize> {
    match src[pos + 2..].find("*/") {
        Some(i) => Ok(pos + 2 + i + 2),
        None => Err(ScanError::new(
            ERR_UNCLOSED_COMMENT,
            "Unclosed comment",
            pos,
        )),
    }
}

/// `pos` is at a quote; returns the offset just past the closing quote.
/// An unescaped newline ends the string as an error.
pub fn skip_string(src: &str, pos: usize) -> ScanResult<usize> {
    let bytes = src.as_bytes();
    let quote = bytes[pos];
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => break,
            b if b == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(ScanError::new(ERR_UNCLOSED_STRING, "Unclosed string", pos))
}

/// End offset of an identifier starting at `pos` (escapes included).
pub fn read_ident(src: &str, pos: usize) -> usize {
    let bytes = src.as_bytes();
    let mut i = pos;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i = (i + 2).min(bytes.len());
        } else if is_ident_char(bytes[i]) {
            i += 1;
        } else {
            break;
        }
    }
    i
}

/// Offset just past the char starting at `pos`, clamped to the input.
pub fn next_char_end(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    pos + text[pos..].chars().next().map(char::len_utf8).unwrap_or(1)
}

/// Scan forward from `pos` to the first byte in `stops` that sits outside
/// parentheses, brackets, strings and comments.
///
/// Returns the offset of the stop byte, or `src.len()` when the input ends
/// first.
pub fn scan_until(src: &str, pos: usize, stops: &[u8]) -> ScanResult<usize> {
    let bytes = src.as_bytes();
    let mut parens: Vec<(u8, usize)> = Vec::new();
    let mut i = pos;
    while i < bytes.len() {
        let b = bytes[i];
        if starts_comment(bytes, i) {
            i = skip_comment(src, i)?;
            continue;
        }
        if parens.is_empty() && stops.contains(&b) {
            return Ok(i);
        }
        match b {
            b'"' | b'\'' => {
                i = skip_string(src, i)?;
                continue;
            }
            b'\\' => {
                i += 2;
                continue;
            }
            b'(' | b'[' => parens.push((b, i)),
            b')' | b']' => {
                if let Some(&(open, _)) = parens.last() {
                    if (open == b'(' && b == b')') || (open == b'[' && b == b']') {
                        parens.pop();
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    match parens.last() {
        Some(&(b'(', at)) => Err(ScanError::new(
            ERR_UNCLOSED_PAREN,
            "Unclosed parenthesis",
            at,
        )),
        Some(&(_, at)) => Err(ScanError::new(
            ERR_UNCLOSED_BRACKET,
            "Unclosed bracket",
            at,
        )),
        None => Ok(bytes.len()),
    }
}

/// Offset of the `)` matching the `(` at `open`.
pub fn matching_paren(src: &str, open: usize) -> ScanResult<usize> {
    let end = scan_until(src, open + 1, b")")?;
    if end >= src.len() {
        return Err(ScanError::new(
            ERR_UNCLOSED_PAREN,
            "Unclosed parenthesis",
            open,
        ));
    }
    Ok(end)
}

/// Split on top-level occurrences of `sep`, keeping each piece's start offset.
pub fn split_top_level(src: &str, sep: u8) -> ScanResult<Vec<(usize, &str)>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let end = scan_until(src, start, &[sep])?;
        pieces.push((start, &src[start..end]));
        if end >= src.len() {
            return Ok(pieces);
        }
        start = end + 1;
    }
}
