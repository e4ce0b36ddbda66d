//! Stage 0: Reader
//!
//! The reader turns the input bytes into code points on demand. It:
//! - detects the encoding from the byte order mark or the null-byte pattern
//!   of the first characters (UTF-8, UTF-16 and UTF-32 in both byte orders)
//! - rejects non-printable code points
//! - enforces the configured code point limit
//! - tracks index, line and column for marks
//!
//! Decoding stops at the first bad position. The problem is recorded and the
//! reader reports end of input from there on, so the scanner can hand out the
//! tokens before it and raise the error when it actually reaches it.

use std::io::Read;

use crate::chars::{is_break, is_printable};
use crate::error::{MarkedError, ReaderError};
use crate::mark::{render_snippet, Mark};
use crate::settings::LoadSettings;

/// Character encodings recognised in a YAML stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Utf32Le => "UTF-32LE",
            Encoding::Utf32Be => "UTF-32BE",
        }
    }

    /// Detect the encoding of `bytes`, returning it with the length of the
    /// byte order mark to skip.
    pub fn detect(bytes: &[u8]) -> (Encoding, usize) {
        match bytes {
            [0x00, 0x00, 0xFE, 0xFF, ..] => (Encoding::Utf32Be, 4),
            [0x00, 0x00, 0x00, _, ..] => (Encoding::Utf32Be, 0),
            [0xFF, 0xFE, 0x00, 0x00, ..] => (Encoding::Utf32Le, 4),
            [_, 0x00, 0x00, 0x00, ..] => (Encoding::Utf32Le, 0),
            [0xFE, 0xFF, ..] => (Encoding::Utf16Be, 2),
            [0x00, _, ..] => (Encoding::Utf16Be, 0),
            [0xFF, 0xFE, ..] => (Encoding::Utf16Le, 2),
            [_, 0x00, ..] => (Encoding::Utf16Le, 0),
            [0xEF, 0xBB, 0xBF, ..] => (Encoding::Utf8, 3),
            _ => (Encoding::Utf8, 0),
        }
    }
}

/// Lazily decoding reader over an in-memory byte stream.
pub struct StreamReader {
    name: String,
    bytes: Vec<u8>,
    encoding: Encoding,
    byte_pos: usize,
    buffer: Vec<char>,
    pointer: usize,
    line: usize,
    column: usize,
    eof: bool,
    error: Option<ReaderError>,
    code_point_limit: usize,
}

impl StreamReader {
    /// Create a reader over raw bytes in any supported encoding.
    pub fn new(bytes: Vec<u8>, settings: &LoadSettings) -> Self {
        let (encoding, bom) = Encoding::detect(&bytes);
        Self {
            name: settings.label.clone(),
            bytes,
            encoding,
            byte_pos: bom,
            buffer: Vec::new(),
            pointer: 0,
            line: 0,
            column: 0,
            eof: false,
            error: None,
            code_point_limit: settings.code_point_limit,
        }
    }

    pub fn from_str(input: &str, settings: &LoadSettings) -> Self {
        Self::new(input.as_bytes().to_vec(), settings)
    }

    /// Read `source` to the end and create a reader over its bytes.
    pub fn from_reader<R: Read>(mut source: R, settings: &LoadSettings) -> Result<Self, ReaderError> {
        let mut bytes = Vec::new();
        source
            .read_to_end(&mut bytes)
            .map_err(|e| ReaderError::Io {
                name: settings.label.clone(),
                message: e.to_string(),
            })?;
        Ok(Self::new(bytes, settings))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The decoding problem that ended the input, if any.
    pub fn error(&self) -> Option<&ReaderError> {
        self.error.as_ref()
    }

    pub fn mark(&self) -> Mark {
        Mark::new(self.pointer, self.line, self.column)
    }

    pub fn index(&self) -> usize {
        self.pointer
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// The current character, or `'\0'` at the end of the input.
    pub fn peek(&mut self) -> char {
        self.peek_at(0)
    }

    /// The character `offset` positions ahead, or `'\0'` past the end.
    pub fn peek_at(&mut self, offset: usize) -> char {
        if self.ensure(offset) {
            self.buffer[self.pointer + offset]
        } else {
            '\0'
        }
    }

    /// The next `length` characters, shorter at the end of the input.
    pub fn prefix(&mut self, length: usize) -> String {
        self.ensure(length.saturating_sub(1));
        let end = (self.pointer + length).min(self.buffer.len());
        self.buffer[self.pointer..end].iter().collect()
    }

    /// Advance by `length` characters, keeping line and column in step.
    pub fn forward(&mut self, length: usize) {
        for _ in 0..length {
            if !self.ensure(0) {
                return;
            }
            let ch = self.buffer[self.pointer];
            self.pointer += 1;
            // CR LF is a single break: count it on the LF.
            if ch == '\n' || (ch == '\r' && self.peek() != '\n') {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    /// Whether the current line so far consists of blanks including a tab.
    pub fn line_prefix_has_tab(&self) -> bool {
        let mut tab = false;
        for &c in self.buffer[..self.pointer].iter().rev() {
            match c {
                '\t' => tab = true,
                ' ' => {}
                c if is_break(c) => break,
                _ => return false,
            }
        }
        tab
    }

    /// Whether only blanks precede the pointer on the current line.
    pub fn line_prefix_is_blank(&self) -> bool {
        self.buffer[..self.pointer]
            .iter()
            .rev()
            .take_while(|&&c| !is_break(c))
            .all(|&c| c == ' ' || c == '\t')
    }

    /// Render the source around `mark` for diagnostics.
    pub fn snippet(&self, mark: Mark) -> Option<String> {
        render_snippet(&self.buffer, mark, 4, 75)
    }

    /// Build a positioned error with snippets rendered from this input.
    pub fn marked_error(
        &self,
        context: Option<(&str, Mark)>,
        problem: impl Into<String>,
        problem_mark: Mark,
    ) -> MarkedError {
        MarkedError {
            label: self.name.clone(),
            context: context.map(|(c, _)| c.to_string()),
            context_mark: context.map(|(_, m)| m),
            context_snippet: context.and_then(|(_, m)| self.snippet(m)),
            problem: problem.into(),
            problem_mark: Some(problem_mark),
            problem_snippet: self.snippet(problem_mark),
        }
    }

    /// Decode until `offset` characters past the pointer are available.
    fn ensure(&mut self, offset: usize) -> bool {
        while self.buffer.len() <= self.pointer + offset {
            if self.eof {
                return false;
            }
            match self.decode_next() {
                Some(ch) => self.buffer.push(ch),
                None => self.eof = true,
            }
        }
        true
    }

    fn decode_next(&mut self) -> Option<char> {
        if self.byte_pos >= self.bytes.len() {
            return None;
        }
        if self.buffer.len() >= self.code_point_limit {
            self.error = Some(ReaderError::CodePointLimit {
                limit: self.code_point_limit,
            });
            return None;
        }
        let decoded = match self.encoding {
            Encoding::Utf8 => self.decode_utf8(),
            Encoding::Utf16Le | Encoding::Utf16Be => self.decode_utf16(),
            Encoding::Utf32Le | Encoding::Utf32Be => self.decode_utf32(),
        };
        let Some((ch, width)) = decoded else {
            self.error = Some(ReaderError::InvalidEncoding {
                name: self.name.clone(),
                encoding: self.encoding.name(),
                offset: self.byte_pos,
            });
            return None;
        };
        if !is_printable(ch as u32) {
            self.error = Some(ReaderError::NonPrintable {
                name: self.name.clone(),
                index: self.buffer.len(),
                code_point: ch as u32,
            });
            return None;
        }
        self.byte_pos += width;
        Some(ch)
    }

    fn decode_utf8(&self) -> Option<(char, usize)> {
        let rest = &self.bytes[self.byte_pos..];
        let width = match rest[0] {
            0x00..=0x7F => 1,
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return None,
        };
        let s = std::str::from_utf8(rest.get(..width)?).ok()?;
        s.chars().next().map(|ch| (ch, width))
    }

    fn read_u16(&self, pos: usize) -> Option<u32> {
        let b = self.bytes.get(pos..pos + 2)?;
        let unit = match self.encoding {
            Encoding::Utf16Le => u16::from_le_bytes([b[0], b[1]]),
            _ => u16::from_be_bytes([b[0], b[1]]),
        };
        Some(u32::from(unit))
    }

    fn decode_utf16(&self) -> Option<(char, usize)> {
        let high = self.read_u16(self.byte_pos)?;
        match high {
            0xD800..=0xDBFF => {
                let low = self.read_u16(self.byte_pos + 2)?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return None;
                }
                let cp = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                char::from_u32(cp).map(|ch| (ch, 4))
            }
            0xDC00..=0xDFFF => None,
            _ => char::from_u32(high).map(|ch| (ch, 2)),
        }
    }

    fn decode_utf32(&self) -> Option<(char, usize)> {
        let b = self.bytes.get(self.byte_pos..self.byte_pos + 4)?;
        let cp = match self.encoding {
            Encoding::Utf32Le => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            _ => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        };
        char::from_u32(cp).map(|ch| (ch, 4))
    }
}
