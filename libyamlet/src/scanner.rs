//! Stage 1: Scanner
//!
//! The scanner converts the character stream into tokens. It performs:
//! - Indentation tracking with a stack of open block levels, emitting
//!   explicit block start/end tokens when the indentation changes
//! - Simple key detection: a scalar (or flow collection, anchor, ...) that
//!   turns out to be a mapping key gets its `Key` token inserted
//!   retroactively once the `:` is seen
//! - Scalar scanning in all five styles, including escapes and folding
//! - Directive, tag, anchor and alias scanning
//!
//! Tokens are produced on demand. A token is only handed out once no pending
//! simple key could still insert a `Key` in front of it.

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use crate::chars::{
    escape_code_length, escape_replacement, is_anchor_char, is_blank, is_blank_or_break_or_nul,
    is_break, is_break_or_nul, is_flow_indicator, is_uri_char, is_word_char,
};
use crate::error::{Result, YamlError};
use crate::mark::Mark;
use crate::reader::StreamReader;
use crate::settings::LoadSettings;
use crate::token::{CommentKind, Directive, ScalarStyle, Token, TokenData, TokenKind};

/// A simple key may not span more code points than this.
const MAX_SIMPLE_KEY_LENGTH: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockKind {
    Sequence,
    Mapping,
}

/// An open block collection.
#[derive(Clone, Copy, Debug)]
struct IndentLevel {
    column: usize,
    kind: BlockKind,
}

/// A token that may still become a mapping key.
#[derive(Clone, Copy, Debug)]
struct SimpleKey {
    token_number: usize,
    /// In block context at the current indentation the key is mandatory.
    required: bool,
    mark: Mark,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Chomping {
    Strip,
    Clip,
    Keep,
}

/// Pull-based tokenizer over a [`StreamReader`].
pub struct Scanner {
    reader: StreamReader,
    parse_comments: bool,
    /// StreamEnd has been queued.
    done: bool,
    failed: Option<YamlError>,
    flow_level: usize,
    tokens: VecDeque<Token>,
    tokens_taken: usize,
    indents: Vec<IndentLevel>,
    allow_simple_key: bool,
    /// One candidate per flow level.
    possible_simple_keys: BTreeMap<usize, SimpleKey>,
}

impl Scanner {
    pub fn new(reader: StreamReader, settings: &LoadSettings) -> Self {
        let mark = reader.mark();
        let mut tokens = VecDeque::new();
        tokens.push_back(Token::new(TokenData::StreamStart, mark, mark));
        Self {
            reader,
            parse_comments: settings.parse_comments,
            done: false,
            failed: None,
            flow_level: 0,
            tokens,
            tokens_taken: 0,
            indents: Vec::new(),
            allow_simple_key: true,
            possible_simple_keys: BTreeMap::new(),
        }
    }

    pub fn from_str(input: &str, settings: &LoadSettings) -> Self {
        Self::new(StreamReader::from_str(input, settings), settings)
    }

    pub fn reader(&self) -> &StreamReader {
        &self.reader
    }

    /// Whether the next token is one of `kinds`.
    pub fn check_token(&mut self, kinds: &[TokenKind]) -> Result<bool> {
        self.fill(0)?;
        Ok(self
            .tokens
            .front()
            .map_or(false, |t| kinds.contains(&t.kind())))
    }

    /// The next token without consuming it; `None` after StreamEnd.
    pub fn peek_token(&mut self) -> Result<Option<&Token>> {
        self.peek_token_at(0)
    }

    /// The token `n` positions ahead without consuming anything.
    pub fn peek_token_at(&mut self, n: usize) -> Result<Option<&Token>> {
        self.fill(n)?;
        Ok(self.tokens.get(n))
    }

    /// Consume and return the next token; `None` after StreamEnd.
    pub fn get_token(&mut self) -> Result<Option<Token>> {
        self.fill(0)?;
        let token = self.tokens.pop_front();
        if let Some(token) = &token {
            self.tokens_taken += 1;
            trace!(kind = ?token.kind(), line = token.start_mark.line, column = token.start_mark.column, "token");
        }
        Ok(token)
    }

    /// Fetch until `lookahead + 1` tokens are final. A failure poisons the
    /// scanner: every later call returns the same error.
    fn fill(&mut self, lookahead: usize) -> Result<()> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        let result = self.fill_tokens(lookahead);
        if let Err(err) = &result {
            self.failed = Some(err.clone());
        }
        result
    }

    fn fill_tokens(&mut self, lookahead: usize) -> Result<()> {
        while self.need_more_tokens(lookahead)? {
            self.fetch_more_tokens()?;
        }
        Ok(())
    }

    fn need_more_tokens(&mut self, lookahead: usize) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        if self.tokens.len() <= lookahead {
            return Ok(true);
        }
        // A pending simple key may still insert a token in the window.
        self.stale_possible_simple_keys()?;
        Ok(self
            .next_possible_simple_key()
            .map_or(false, |n| n <= self.tokens_taken + lookahead))
    }

    fn error(&self, context: Option<(&str, Mark)>, problem: impl Into<String>, mark: Mark) -> YamlError {
        YamlError::Scan(self.reader.marked_error(context, problem, mark))
    }

    fn indent(&self) -> isize {
        self.indents.last().map_or(-1, |l| l.column as isize)
    }

    fn push(&mut self, data: TokenData, start_mark: Mark, end_mark: Mark) {
        self.tokens.push_back(Token::new(data, start_mark, end_mark));
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn fetch_more_tokens(&mut self) -> Result<()> {
        self.scan_to_next_token();
        self.stale_possible_simple_keys()?;

        let ch = self.reader.peek();
        if self.flow_level == 0 && self.reader.line_prefix_has_tab() && !is_break_or_nul(ch) {
            return Err(self.error(
                None,
                "found a tab character where an indentation space is expected",
                self.reader.mark(),
            ));
        }

        let column = self.reader.column();
        if self.unwind_indent(column as isize) && column > 0 && (column as isize) > self.indent() {
            return Err(self.error(
                None,
                "found a dedent that does not match any outer indentation level",
                self.reader.mark(),
            ));
        }

        match ch {
            '\0' => self.fetch_stream_end(),
            '%' if self.check_directive() => self.fetch_directive(),
            '-' if self.check_document_indicator("---") => {
                self.fetch_document_indicator(TokenData::DocumentStart)
            }
            '.' if self.check_document_indicator("...") => {
                self.fetch_document_indicator(TokenData::DocumentEnd)
            }
            '[' => self.fetch_flow_collection_start(TokenData::FlowSequenceStart),
            '{' => self.fetch_flow_collection_start(TokenData::FlowMappingStart),
            ']' => self.fetch_flow_collection_end(TokenData::FlowSequenceEnd),
            '}' => self.fetch_flow_collection_end(TokenData::FlowMappingEnd),
            ',' => self.fetch_flow_entry(),
            '-' if self.check_block_entry() => self.fetch_block_entry(),
            '?' if self.check_key() => self.fetch_key(),
            ':' if self.check_value() => self.fetch_value(),
            '*' => self.fetch_anchor(true),
            '&' => self.fetch_anchor(false),
            '!' => self.fetch_tag(),
            '|' if self.flow_level == 0 => self.fetch_block_scalar(ScalarStyle::Literal),
            '>' if self.flow_level == 0 => self.fetch_block_scalar(ScalarStyle::Folded),
            '\'' => self.fetch_flow_scalar(ScalarStyle::SingleQuoted),
            '"' => self.fetch_flow_scalar(ScalarStyle::DoubleQuoted),
            _ if self.check_plain() => self.fetch_plain(),
            _ => Err(self.error(
                Some(("while scanning for the next token", self.reader.mark())),
                format!("found character {} that cannot start any token", describe(ch)),
                self.reader.mark(),
            )),
        }
    }

    // ========================================================================
    // Simple keys
    // ========================================================================

    fn next_possible_simple_key(&self) -> Option<usize> {
        self.possible_simple_keys
            .values()
            .map(|key| key.token_number)
            .min()
    }

    /// Drop candidates that can no longer be keys: a simple key is limited
    /// to one line and `MAX_SIMPLE_KEY_LENGTH` code points.
    fn stale_possible_simple_keys(&mut self) -> Result<()> {
        let line = self.reader.line();
        let index = self.reader.index();
        let mut stale = Vec::new();
        for (&level, key) in &self.possible_simple_keys {
            if key.mark.line != line || index - key.mark.index > MAX_SIMPLE_KEY_LENGTH {
                if key.required {
                    return Err(self.error(
                        Some(("while scanning a simple key", key.mark)),
                        "could not find expected ':'",
                        self.reader.mark(),
                    ));
                }
                stale.push(level);
            }
        }
        for level in stale {
            self.possible_simple_keys.remove(&level);
        }
        Ok(())
    }

    fn save_possible_simple_key(&mut self) -> Result<()> {
        let required = self.flow_level == 0 && self.indent() == self.reader.column() as isize;
        if self.allow_simple_key {
            self.remove_possible_simple_key()?;
            let key = SimpleKey {
                token_number: self.tokens_taken + self.tokens.len(),
                required,
                mark: self.reader.mark(),
            };
            self.possible_simple_keys.insert(self.flow_level, key);
        }
        Ok(())
    }

    fn remove_possible_simple_key(&mut self) -> Result<()> {
        if let Some(key) = self.possible_simple_keys.remove(&self.flow_level) {
            if key.required {
                return Err(self.error(
                    Some(("while scanning a simple key", key.mark)),
                    "could not find expected ':'",
                    self.reader.mark(),
                ));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Indentation
    // ========================================================================

    /// Close every block level deeper than `column`. Returns whether any
    /// level was closed.
    fn unwind_indent(&mut self, column: isize) -> bool {
        if self.flow_level > 0 {
            return false;
        }
        let mut closed = false;
        while let Some(level) = self.indents.last().copied() {
            if level.column as isize <= column {
                break;
            }
            self.indents.pop();
            let mark = self.reader.mark();
            let data = match level.kind {
                BlockKind::Sequence => TokenData::BlockSequenceEnd,
                BlockKind::Mapping => TokenData::BlockMappingEnd,
            };
            self.push(data, mark, mark);
            closed = true;
        }
        closed
    }

    fn add_indent(&mut self, column: usize, kind: BlockKind) -> bool {
        if self.indent() < column as isize {
            self.indents.push(IndentLevel { column, kind });
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Fetchers
    // ========================================================================

    fn fetch_stream_end(&mut self) -> Result<()> {
        if let Some(err) = self.reader.error() {
            return Err(YamlError::Reader(err.clone()));
        }
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        self.possible_simple_keys.clear();
        let mark = self.reader.mark();
        self.push(TokenData::StreamEnd, mark, mark);
        self.done = true;
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_directive()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_document_indicator(&mut self, data: TokenData) -> Result<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        let start_mark = self.reader.mark();
        self.reader.forward(3);
        let end_mark = self.reader.mark();
        self.push(data, start_mark, end_mark);
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, data: TokenData) -> Result<()> {
        self.save_possible_simple_key()?;
        self.flow_level += 1;
        self.allow_simple_key = true;
        self.fetch_indicator(data);
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, data: TokenData) -> Result<()> {
        self.remove_possible_simple_key()?;
        self.flow_level = self.flow_level.saturating_sub(1);
        self.allow_simple_key = false;
        self.fetch_indicator(data);
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<()> {
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        self.fetch_indicator(TokenData::FlowEntry);
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<()> {
        let mark = self.reader.mark();
        if self.flow_level > 0 {
            return Err(self.error(None, "sequence entries are not allowed in a flow collection", mark));
        }
        if !self.allow_simple_key {
            return Err(self.error(None, "sequence entries are not allowed here", mark));
        }
        if self.add_indent(self.reader.column(), BlockKind::Sequence) {
            self.push(TokenData::BlockSequenceStart, mark, mark);
        }
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        self.fetch_indicator(TokenData::BlockEntry);
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<()> {
        if self.flow_level == 0 {
            let mark = self.reader.mark();
            if !self.allow_simple_key {
                return Err(self.error(None, "mapping keys are not allowed here", mark));
            }
            if self.add_indent(self.reader.column(), BlockKind::Mapping) {
                self.push(TokenData::BlockMappingStart, mark, mark);
            }
        }
        self.allow_simple_key = self.flow_level == 0;
        self.remove_possible_simple_key()?;
        self.fetch_indicator(TokenData::Key);
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<()> {
        if let Some(key) = self.possible_simple_keys.remove(&self.flow_level) {
            // The candidate is confirmed: put KEY (and possibly
            // BLOCK-MAPPING-START) in front of it.
            let at = key.token_number - self.tokens_taken;
            self.tokens.insert(at, Token::new(TokenData::Key, key.mark, key.mark));
            if self.flow_level == 0 && self.add_indent(key.mark.column, BlockKind::Mapping) {
                self.tokens.insert(
                    at,
                    Token::new(TokenData::BlockMappingStart, key.mark, key.mark),
                );
            }
            self.allow_simple_key = false;
        } else {
            if self.flow_level == 0 {
                let mark = self.reader.mark();
                if !self.allow_simple_key {
                    return Err(self.error(None, "mapping values are not allowed here", mark));
                }
                if self.add_indent(self.reader.column(), BlockKind::Mapping) {
                    self.push(TokenData::BlockMappingStart, mark, mark);
                }
            }
            self.allow_simple_key = self.flow_level == 0;
            self.remove_possible_simple_key()?;
        }
        self.fetch_indicator(TokenData::Value);
        Ok(())
    }

    /// Queue a one-character indicator token.
    fn fetch_indicator(&mut self, data: TokenData) {
        let start_mark = self.reader.mark();
        self.reader.forward(1);
        let end_mark = self.reader.mark();
        self.push(data, start_mark, end_mark);
    }

    fn fetch_anchor(&mut self, alias: bool) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_anchor(alias)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, style: ScalarStyle) -> Result<()> {
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        let token = self.scan_block_scalar(style)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, style: ScalarStyle) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_flow_scalar(style)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain(&mut self) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_plain()?;
        self.tokens.push_back(token);
        Ok(())
    }

    /// A token that stops at undecodable input is incomplete: report the
    /// reader error instead of handing it out.
    fn check_truncated(&mut self) -> Result<()> {
        if self.reader.peek() == '\0' {
            if let Some(err) = self.reader.error() {
                return Err(YamlError::Reader(err.clone()));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Checkers
    // ========================================================================

    fn check_directive(&mut self) -> bool {
        self.reader.column() == 0
    }

    fn check_document_indicator(&mut self, indicator: &str) -> bool {
        self.reader.column() == 0
            && self.reader.prefix(3) == indicator
            && is_blank_or_break_or_nul(self.reader.peek_at(3))
    }

    fn check_block_entry(&mut self) -> bool {
        is_blank_or_break_or_nul(self.reader.peek_at(1))
    }

    fn check_key(&mut self) -> bool {
        is_blank_or_break_or_nul(self.reader.peek_at(1))
    }

    fn check_value(&mut self) -> bool {
        self.flow_level > 0 || is_blank_or_break_or_nul(self.reader.peek_at(1))
    }

    /// A plain scalar may not start with an indicator, except `-`, `?` and
    /// `:` directly followed by a non-space character (`?` and `:` only in
    /// block context).
    fn check_plain(&mut self) -> bool {
        let ch = self.reader.peek();
        let is_indicator = matches!(
            ch,
            '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>'
                | '\'' | '"' | '%' | '@' | '`'
        );
        if !is_indicator && !is_blank_or_break_or_nul(ch) {
            return true;
        }
        !is_blank_or_break_or_nul(self.reader.peek_at(1))
            && (ch == '-' || (self.flow_level == 0 && (ch == '?' || ch == ':')))
    }

    fn at_document_boundary(&mut self) -> bool {
        self.check_document_indicator("---") || self.check_document_indicator("...")
    }

    // ========================================================================
    // Whitespace, comments and line breaks
    // ========================================================================

    fn scan_to_next_token(&mut self) {
        loop {
            while is_blank(self.reader.peek()) {
                self.reader.forward(1);
            }
            if self.reader.peek() == '#' {
                self.scan_comment();
            }
            if self.scan_line_break() {
                if self.flow_level == 0 {
                    self.allow_simple_key = true;
                }
            } else {
                break;
            }
        }
    }

    /// Consume a comment up to the line break, queueing it as a token when
    /// comments are requested.
    fn scan_comment(&mut self) {
        let kind = if self.reader.line_prefix_is_blank() {
            CommentKind::Block
        } else {
            CommentKind::InLine
        };
        let start_mark = self.reader.mark();
        self.reader.forward(1);
        let mut value = String::new();
        while !is_break_or_nul(self.reader.peek()) {
            value.push(self.reader.peek());
            self.reader.forward(1);
        }
        if self.parse_comments {
            let end_mark = self.reader.mark();
            self.push(TokenData::Comment { kind, value }, start_mark, end_mark);
        }
    }

    /// Consume one line break (CR, LF or CR LF). Breaks are normalised to
    /// `\n` by callers.
    fn scan_line_break(&mut self) -> bool {
        match self.reader.peek() {
            '\r' => {
                let width = if self.reader.peek_at(1) == '\n' { 2 } else { 1 };
                self.reader.forward(width);
                true
            }
            '\n' => {
                self.reader.forward(1);
                true
            }
            _ => false,
        }
    }

    fn skip_blanks(&mut self) {
        while is_blank(self.reader.peek()) {
            self.reader.forward(1);
        }
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn scan_directive(&mut self) -> Result<Token> {
        let start_mark = self.reader.mark();
        self.reader.forward(1);
        let name = self.scan_directive_name(start_mark)?;
        let directive = match name.as_str() {
            "YAML" => {
                let (major, minor) = self.scan_yaml_directive_value(start_mark)?;
                Directive::Version { major, minor }
            }
            "TAG" => {
                let (handle, prefix) = self.scan_tag_directive_value(start_mark)?;
                Directive::Tag { handle, prefix }
            }
            _ => {
                let params = self.scan_reserved_directive_params();
                Directive::Reserved { name, params }
            }
        };
        let end_mark = self.reader.mark();
        self.scan_directive_ignored_line(start_mark)?;
        Ok(Token::new(TokenData::Directive(directive), start_mark, end_mark))
    }

    fn scan_directive_name(&mut self, start_mark: Mark) -> Result<String> {
        let mut length = 0;
        while is_word_char(self.reader.peek_at(length)) {
            length += 1;
        }
        if length == 0 {
            let ch = self.reader.peek();
            return Err(self.error(
                Some(("while scanning a directive", start_mark)),
                format!("expected alphabetic or numeric character, but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        let name = self.reader.prefix(length);
        self.reader.forward(length);
        let ch = self.reader.peek();
        if !is_blank_or_break_or_nul(ch) {
            return Err(self.error(
                Some(("while scanning a directive", start_mark)),
                format!("expected alphabetic or numeric character, but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        Ok(name)
    }

    fn scan_yaml_directive_value(&mut self, start_mark: Mark) -> Result<(u32, u32)> {
        self.skip_blanks();
        let major = self.scan_yaml_directive_number(start_mark)?;
        if self.reader.peek() != '.' {
            let ch = self.reader.peek();
            return Err(self.error(
                Some(("while scanning a directive", start_mark)),
                format!("expected a digit or '.', but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        self.reader.forward(1);
        let minor = self.scan_yaml_directive_number(start_mark)?;
        let ch = self.reader.peek();
        if !is_blank_or_break_or_nul(ch) {
            return Err(self.error(
                Some(("while scanning a directive", start_mark)),
                format!("expected a digit or ' ', but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        Ok((major, minor))
    }

    fn scan_yaml_directive_number(&mut self, start_mark: Mark) -> Result<u32> {
        let ch = self.reader.peek();
        if !ch.is_ascii_digit() {
            return Err(self.error(
                Some(("while scanning a directive", start_mark)),
                format!("expected a digit, but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        let mut length = 0;
        while self.reader.peek_at(length).is_ascii_digit() {
            length += 1;
        }
        let mark = self.reader.mark();
        let number = self.reader.prefix(length).parse::<u32>().map_err(|_| {
            self.error(
                Some(("while scanning a directive", start_mark)),
                "found a version number that is too large",
                mark,
            )
        })?;
        self.reader.forward(length);
        Ok(number)
    }

    fn scan_tag_directive_value(&mut self, start_mark: Mark) -> Result<(String, String)> {
        self.skip_blanks();
        let handle = self.scan_tag_handle("directive", start_mark)?;
        if !is_blank(self.reader.peek()) {
            let ch = self.reader.peek();
            return Err(self.error(
                Some(("while scanning a directive", start_mark)),
                format!("expected ' ', but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        self.skip_blanks();
        let prefix = self.scan_tag_uri("directive", start_mark)?;
        let ch = self.reader.peek();
        if !is_blank_or_break_or_nul(ch) {
            return Err(self.error(
                Some(("while scanning a directive", start_mark)),
                format!("expected ' ', but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        Ok((handle, prefix))
    }

    fn scan_reserved_directive_params(&mut self) -> Vec<String> {
        let mut params = Vec::new();
        loop {
            self.skip_blanks();
            let ch = self.reader.peek();
            if is_break_or_nul(ch) || ch == '#' {
                return params;
            }
            let mut param = String::new();
            while !is_blank_or_break_or_nul(self.reader.peek()) {
                param.push(self.reader.peek());
                self.reader.forward(1);
            }
            params.push(param);
        }
    }

    fn scan_directive_ignored_line(&mut self, start_mark: Mark) -> Result<()> {
        self.skip_blanks();
        if self.reader.peek() == '#' {
            self.scan_comment();
        }
        if !self.scan_line_break() && self.reader.peek() != '\0' {
            let ch = self.reader.peek();
            return Err(self.error(
                Some(("while scanning a directive", start_mark)),
                format!("expected a comment or a line break, but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Anchors, aliases and tags
    // ========================================================================

    fn scan_anchor(&mut self, alias: bool) -> Result<Token> {
        let start_mark = self.reader.mark();
        self.reader.forward(1);
        let mut length = 0;
        while is_anchor_char(self.reader.peek_at(length)) {
            length += 1;
        }
        if length == 0 {
            let context = if alias {
                "while scanning an alias"
            } else {
                "while scanning an anchor"
            };
            let ch = self.reader.peek();
            return Err(self.error(
                Some((context, start_mark)),
                format!("expected alphabetic or numeric character, but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        let name = self.reader.prefix(length);
        self.reader.forward(length);
        self.check_truncated()?;
        let end_mark = self.reader.mark();
        let data = if alias {
            TokenData::Alias(name)
        } else {
            TokenData::Anchor(name)
        };
        Ok(Token::new(data, start_mark, end_mark))
    }

    fn ends_tag(&self, ch: char) -> bool {
        is_blank_or_break_or_nul(ch) || (self.flow_level > 0 && is_flow_indicator(ch))
    }

    fn scan_tag(&mut self) -> Result<Token> {
        let start_mark = self.reader.mark();
        let next = self.reader.peek_at(1);
        let (handle, suffix) = if next == '<' {
            // Verbatim: !<tag:yaml.org,2002:str>
            self.reader.forward(2);
            let suffix = self.scan_tag_uri("tag", start_mark)?;
            if self.reader.peek() != '>' {
                let ch = self.reader.peek();
                return Err(self.error(
                    Some(("while scanning a tag", start_mark)),
                    format!("expected '>', but found {}", describe(ch)),
                    self.reader.mark(),
                ));
            }
            self.reader.forward(1);
            (None, suffix)
        } else if self.ends_tag(next) {
            // The non-specific tag.
            self.reader.forward(1);
            (None, "!".to_string())
        } else {
            let mut length = 1;
            let mut use_handle = false;
            loop {
                let ch = self.reader.peek_at(length);
                if self.ends_tag(ch) {
                    break;
                }
                if ch == '!' {
                    use_handle = true;
                    break;
                }
                length += 1;
            }
            let handle = if use_handle {
                self.scan_tag_handle("tag", start_mark)?
            } else {
                self.reader.forward(1);
                "!".to_string()
            };
            let suffix = self.scan_tag_uri("tag", start_mark)?;
            (Some(handle), suffix)
        };
        let ch = self.reader.peek();
        if !self.ends_tag(ch) {
            return Err(self.error(
                Some(("while scanning a tag", start_mark)),
                format!("expected ' ', but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        let end_mark = self.reader.mark();
        Ok(Token::new(TokenData::Tag { handle, suffix }, start_mark, end_mark))
    }

    fn scan_tag_handle(&mut self, name: &str, start_mark: Mark) -> Result<String> {
        let context = format!("while scanning a {}", name);
        let ch = self.reader.peek();
        if ch != '!' {
            return Err(self.error(
                Some((&context, start_mark)),
                format!("expected '!', but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        let mut length = 1;
        let mut ch = self.reader.peek_at(1);
        if ch != ' ' {
            while is_word_char(ch) {
                length += 1;
                ch = self.reader.peek_at(length);
            }
            if ch != '!' {
                self.reader.forward(length);
                return Err(self.error(
                    Some((&context, start_mark)),
                    format!("expected '!', but found {}", describe(ch)),
                    self.reader.mark(),
                ));
            }
            length += 1;
        }
        let handle = self.reader.prefix(length);
        self.reader.forward(length);
        Ok(handle)
    }

    fn scan_tag_uri(&mut self, name: &str, start_mark: Mark) -> Result<String> {
        let in_flow = self.flow_level > 0;
        let mut uri = String::new();
        let mut length = 0;
        loop {
            let ch = self.reader.peek_at(length);
            if !is_uri_char(ch, in_flow) {
                break;
            }
            if ch == '%' {
                uri.push_str(&self.reader.prefix(length));
                self.reader.forward(length);
                length = 0;
                uri.push_str(&self.scan_uri_escapes(name, start_mark)?);
            } else {
                length += 1;
            }
        }
        if length > 0 {
            uri.push_str(&self.reader.prefix(length));
            self.reader.forward(length);
        }
        if uri.is_empty() {
            let ch = self.reader.peek();
            return Err(self.error(
                Some((&format!("while parsing a {}", name), start_mark)),
                format!("expected URI, but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        Ok(uri)
    }

    fn scan_uri_escapes(&mut self, name: &str, start_mark: Mark) -> Result<String> {
        let context = format!("while scanning a {}", name);
        let mark = self.reader.mark();
        let mut bytes = Vec::new();
        while self.reader.peek() == '%' {
            self.reader.forward(1);
            let mut byte = 0u32;
            for k in 0..2 {
                let ch = self.reader.peek_at(k);
                match ch.to_digit(16) {
                    Some(digit) => byte = byte * 16 + digit,
                    None => {
                        return Err(self.error(
                            Some((&context, start_mark)),
                            format!(
                                "expected URI escape sequence of 2 hexadecimal numbers, but found {}",
                                describe(ch)
                            ),
                            self.reader.mark(),
                        ))
                    }
                }
            }
            bytes.push(byte as u8);
            self.reader.forward(2);
        }
        String::from_utf8(bytes).map_err(|e| {
            self.error(
                Some((&context, start_mark)),
                format!("expected URI in UTF-8: {}", e),
                mark,
            )
        })
    }

    // ========================================================================
    // Block scalars
    // ========================================================================

    fn scan_block_scalar(&mut self, style: ScalarStyle) -> Result<Token> {
        let folded = style == ScalarStyle::Folded;
        let start_mark = self.reader.mark();
        self.reader.forward(1);
        let (chomping, increment) = self.scan_block_scalar_indicators(start_mark)?;
        self.scan_block_scalar_ignored_line(start_mark)?;

        let min_indent = (self.indent() + 1).max(1) as usize;
        let (mut breaks, mut end_mark, indent) = match increment {
            None => {
                let (breaks, max_indent, end_mark) = self.scan_block_scalar_indentation();
                (breaks, end_mark, min_indent.max(max_indent))
            }
            Some(increment) => {
                let indent = min_indent + increment - 1;
                let (breaks, end_mark) = self.scan_block_scalar_breaks(indent);
                (breaks, end_mark, indent)
            }
        };

        let mut chunks = String::new();
        let mut line_break = false;
        while self.reader.column() == indent && self.reader.peek() != '\0' {
            chunks.push_str(&breaks);
            let leading_non_space = !is_blank(self.reader.peek());
            let mut length = 0;
            while !is_break_or_nul(self.reader.peek_at(length)) {
                length += 1;
            }
            chunks.push_str(&self.reader.prefix(length));
            self.reader.forward(length);
            line_break = self.scan_line_break();
            let (more_breaks, mark) = self.scan_block_scalar_breaks(indent);
            breaks = more_breaks;
            end_mark = mark;
            if self.reader.column() != indent || self.reader.peek() == '\0' {
                break;
            }
            // A single break between two lines that start with non-space
            // folds into a space; anything else is kept.
            if folded && line_break && leading_non_space && !is_blank(self.reader.peek()) {
                if breaks.is_empty() {
                    chunks.push(' ');
                }
            } else if line_break {
                chunks.push('\n');
            }
        }

        self.check_truncated()?;
        if chomping != Chomping::Strip && line_break {
            chunks.push('\n');
        }
        if chomping == Chomping::Keep {
            chunks.push_str(&breaks);
        }
        let data = TokenData::Scalar {
            value: chunks,
            plain: false,
            style,
        };
        Ok(Token::new(data, start_mark, end_mark))
    }

    fn scan_block_scalar_indicators(&mut self, start_mark: Mark) -> Result<(Chomping, Option<usize>)> {
        let mut chomping = Chomping::Clip;
        let mut increment = None;
        let ch = self.reader.peek();
        if ch == '+' || ch == '-' {
            chomping = if ch == '+' { Chomping::Keep } else { Chomping::Strip };
            self.reader.forward(1);
            if self.reader.peek().is_ascii_digit() {
                increment = Some(self.scan_indentation_indicator(start_mark)?);
            }
        } else if ch.is_ascii_digit() {
            increment = Some(self.scan_indentation_indicator(start_mark)?);
            let ch = self.reader.peek();
            if ch == '+' || ch == '-' {
                chomping = if ch == '+' { Chomping::Keep } else { Chomping::Strip };
                self.reader.forward(1);
            }
        }
        let ch = self.reader.peek();
        if !is_blank_or_break_or_nul(ch) {
            return Err(self.error(
                Some(("while scanning a block scalar", start_mark)),
                format!("expected chomping or indentation indicators, but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        Ok((chomping, increment))
    }

    fn scan_indentation_indicator(&mut self, start_mark: Mark) -> Result<usize> {
        let digit = self.reader.peek().to_digit(10).unwrap_or(0) as usize;
        if digit == 0 {
            return Err(self.error(
                Some(("while scanning a block scalar", start_mark)),
                "expected indentation indicator in the range 1-9, but found 0",
                self.reader.mark(),
            ));
        }
        self.reader.forward(1);
        Ok(digit)
    }

    fn scan_block_scalar_ignored_line(&mut self, start_mark: Mark) -> Result<()> {
        self.skip_blanks();
        if self.reader.peek() == '#' {
            self.scan_comment();
        }
        if !self.scan_line_break() && self.reader.peek() != '\0' {
            let ch = self.reader.peek();
            return Err(self.error(
                Some(("while scanning a block scalar", start_mark)),
                format!("expected a comment or a line break, but found {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        Ok(())
    }

    /// Detect the content indentation from the first non-empty line,
    /// collecting the leading empty lines.
    fn scan_block_scalar_indentation(&mut self) -> (String, usize, Mark) {
        let mut breaks = String::new();
        let mut max_indent = 0;
        let mut end_mark = self.reader.mark();
        loop {
            let ch = self.reader.peek();
            if ch == ' ' {
                self.reader.forward(1);
                max_indent = max_indent.max(self.reader.column());
            } else if is_break(ch) {
                self.scan_line_break();
                breaks.push('\n');
                end_mark = self.reader.mark();
            } else {
                break;
            }
        }
        (breaks, max_indent, end_mark)
    }

    fn scan_block_scalar_breaks(&mut self, indent: usize) -> (String, Mark) {
        let mut breaks = String::new();
        let mut end_mark = self.reader.mark();
        while self.reader.column() < indent && self.reader.peek() == ' ' {
            self.reader.forward(1);
        }
        while is_break(self.reader.peek()) {
            self.scan_line_break();
            breaks.push('\n');
            end_mark = self.reader.mark();
            while self.reader.column() < indent && self.reader.peek() == ' ' {
                self.reader.forward(1);
            }
        }
        (breaks, end_mark)
    }

    // ========================================================================
    // Flow scalars
    // ========================================================================

    fn scan_flow_scalar(&mut self, style: ScalarStyle) -> Result<Token> {
        let double = style == ScalarStyle::DoubleQuoted;
        let start_mark = self.reader.mark();
        let quote = self.reader.peek();
        self.reader.forward(1);
        let mut chunks = String::new();
        self.scan_flow_scalar_non_spaces(double, start_mark, &mut chunks)?;
        while self.reader.peek() != quote {
            self.scan_flow_scalar_spaces(start_mark, &mut chunks)?;
            self.scan_flow_scalar_non_spaces(double, start_mark, &mut chunks)?;
        }
        self.reader.forward(1);
        let end_mark = self.reader.mark();
        let data = TokenData::Scalar {
            value: chunks,
            plain: false,
            style,
        };
        Ok(Token::new(data, start_mark, end_mark))
    }

    fn scan_flow_scalar_non_spaces(&mut self, double: bool, start_mark: Mark, chunks: &mut String) -> Result<()> {
        loop {
            let mut length = 0;
            loop {
                let ch = self.reader.peek_at(length);
                if ch == '\'' || ch == '"' || ch == '\\' || is_blank_or_break_or_nul(ch) {
                    break;
                }
                length += 1;
            }
            if length > 0 {
                chunks.push_str(&self.reader.prefix(length));
                self.reader.forward(length);
            }
            let ch = self.reader.peek();
            if !double && ch == '\'' && self.reader.peek_at(1) == '\'' {
                chunks.push('\'');
                self.reader.forward(2);
            } else if (double && ch == '\'') || (!double && (ch == '"' || ch == '\\')) {
                chunks.push(ch);
                self.reader.forward(1);
            } else if double && ch == '\\' {
                self.reader.forward(1);
                self.scan_escape(start_mark, chunks)?;
            } else {
                return Ok(());
            }
        }
    }

    fn scan_escape(&mut self, start_mark: Mark, chunks: &mut String) -> Result<()> {
        let ch = self.reader.peek();
        if let Some(replacement) = escape_replacement(ch) {
            chunks.push(replacement);
            self.reader.forward(1);
        } else if let Some(length) = escape_code_length(ch) {
            self.reader.forward(1);
            let mut code = 0u32;
            for k in 0..length {
                let digit = self.reader.peek_at(k);
                match digit.to_digit(16) {
                    Some(value) => code = code * 16 + value,
                    None => {
                        return Err(self.error(
                            Some(("while scanning a double-quoted scalar", start_mark)),
                            format!(
                                "expected escape sequence of {} hexadecimal numbers, but found {}",
                                length,
                                describe(digit)
                            ),
                            self.reader.mark(),
                        ))
                    }
                }
            }
            match char::from_u32(code) {
                Some(decoded) => chunks.push(decoded),
                None => {
                    return Err(self.error(
                        Some(("while scanning a double-quoted scalar", start_mark)),
                        format!("found invalid Unicode character escape code {:X}", code),
                        self.reader.mark(),
                    ))
                }
            }
            self.reader.forward(length);
        } else if is_break(ch) {
            // Escaped line break: the break and the next line's leading
            // blanks vanish.
            self.scan_line_break();
            self.scan_flow_scalar_breaks(start_mark, chunks)?;
        } else {
            return Err(self.error(
                Some(("while scanning a double-quoted scalar", start_mark)),
                format!("found unknown escape character {}", describe(ch)),
                self.reader.mark(),
            ));
        }
        Ok(())
    }

    fn scan_flow_scalar_spaces(&mut self, start_mark: Mark, chunks: &mut String) -> Result<()> {
        let mut length = 0;
        while is_blank(self.reader.peek_at(length)) {
            length += 1;
        }
        let whitespaces = self.reader.prefix(length);
        self.reader.forward(length);
        let ch = self.reader.peek();
        if ch == '\0' {
            if let Some(err) = self.reader.error() {
                return Err(YamlError::Reader(err.clone()));
            }
            return Err(self.error(
                Some(("while scanning a quoted scalar", start_mark)),
                "found unexpected end of stream",
                self.reader.mark(),
            ));
        }
        if is_break(ch) {
            self.scan_line_break();
            let mut breaks = String::new();
            self.scan_flow_scalar_breaks(start_mark, &mut breaks)?;
            if breaks.is_empty() {
                chunks.push(' ');
            } else {
                chunks.push_str(&breaks);
            }
        } else {
            chunks.push_str(&whitespaces);
        }
        Ok(())
    }

    fn scan_flow_scalar_breaks(&mut self, start_mark: Mark, chunks: &mut String) -> Result<()> {
        loop {
            if self.at_document_boundary() {
                return Err(self.error(
                    Some(("while scanning a quoted scalar", start_mark)),
                    "found unexpected document separator",
                    self.reader.mark(),
                ));
            }
            self.skip_blanks();
            if self.scan_line_break() {
                chunks.push('\n');
            } else {
                return Ok(());
            }
        }
    }

    // ========================================================================
    // Plain scalars
    // ========================================================================

    fn scan_plain(&mut self) -> Result<Token> {
        let mut chunks = String::new();
        let start_mark = self.reader.mark();
        let mut end_mark = start_mark;
        let indent = self.indent() + 1;
        let mut spaces = String::new();
        loop {
            if self.reader.peek() == '#' {
                break;
            }
            let mut length = 0;
            loop {
                let ch = self.reader.peek_at(length);
                if is_blank_or_break_or_nul(ch) {
                    break;
                }
                if ch == ':' {
                    let next = self.reader.peek_at(length + 1);
                    if is_blank_or_break_or_nul(next) || (self.flow_level > 0 && is_flow_indicator(next)) {
                        break;
                    }
                }
                if self.flow_level > 0 && is_flow_indicator(ch) {
                    break;
                }
                length += 1;
            }
            if length == 0 {
                break;
            }
            self.allow_simple_key = false;
            chunks.push_str(&spaces);
            chunks.push_str(&self.reader.prefix(length));
            self.reader.forward(length);
            end_mark = self.reader.mark();
            spaces = self.scan_plain_spaces();
            if spaces.is_empty()
                || self.reader.peek() == '#'
                || (self.flow_level == 0 && (self.reader.column() as isize) < indent)
            {
                break;
            }
        }
        let data = TokenData::Scalar {
            value: chunks,
            plain: true,
            style: ScalarStyle::Plain,
        };
        self.check_truncated()?;
        Ok(Token::new(data, start_mark, end_mark))
    }

    /// Consume the whitespace after a plain scalar chunk, returning what it
    /// folds into. Empty means the scalar ends here.
    fn scan_plain_spaces(&mut self) -> String {
        let mut length = 0;
        while is_blank(self.reader.peek_at(length)) {
            length += 1;
        }
        let whitespaces = self.reader.prefix(length);
        self.reader.forward(length);
        if !self.scan_line_break() {
            return whitespaces;
        }
        self.allow_simple_key = true;
        if self.at_document_boundary() {
            return String::new();
        }
        let mut breaks = String::new();
        loop {
            let ch = self.reader.peek();
            if ch == ' ' || (ch == '\t' && self.flow_level > 0) {
                self.reader.forward(1);
            } else if is_break(ch) {
                self.scan_line_break();
                breaks.push('\n');
                if self.at_document_boundary() {
                    return String::new();
                }
            } else {
                break;
            }
        }
        if breaks.is_empty() {
            " ".to_string()
        } else {
            breaks
        }
    }
}

impl Iterator for Scanner {
    type Item = Result<Token>;

    /// Yields every token up to StreamEnd, or the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed.is_some() {
            return None;
        }
        self.get_token().transpose()
    }
}

/// Describe a character for an error message.
fn describe(ch: char) -> String {
    match ch {
        '\0' => "end of stream".to_string(),
        '\t' => "'\\t' (TAB)".to_string(),
        '\n' | '\r' => "line break".to_string(),
        ch => format!("'{}'", ch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReaderError;
    use TokenKind::*;
    use crate::token::Directive;

    fn scanner(input: &str) -> Scanner {
        Scanner::from_str(input, &LoadSettings::default())
    }

    fn tokens(input: &str) -> Vec<Token> {
        scanner(input).collect::<Result<Vec<_>>>().unwrap()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokens(input).iter().map(Token::kind).collect()
    }

    fn scalars(input: &str) -> Vec<String> {
        tokens(input)
            .into_iter()
            .filter_map(|t| match t.data {
                TokenData::Scalar { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }

    fn scan_error(input: &str) -> YamlError {
        scanner(input)
            .collect::<Result<Vec<_>>>()
            .expect_err("expected a scan error")
    }

    #[test]
    fn test_simple_mapping() {
        assert_eq!(
            kinds("a: 1"),
            vec![StreamStart, BlockMappingStart, Key, Scalar, Value, Scalar, BlockMappingEnd, StreamEnd]
        );
        assert_eq!(scalars("a: 1"), vec!["a", "1"]);
    }

    #[test]
    fn test_nested_block_collections() {
        assert_eq!(
            kinds("a:\n  - x\n  - y\nb: z\n"),
            vec![
                StreamStart,
                BlockMappingStart,
                Key,
                Scalar,
                Value,
                BlockSequenceStart,
                BlockEntry,
                Scalar,
                BlockEntry,
                Scalar,
                BlockSequenceEnd,
                Key,
                Scalar,
                Value,
                Scalar,
                BlockMappingEnd,
                StreamEnd,
            ]
        );
    }

    #[test]
    fn test_indentless_sequence() {
        assert_eq!(
            kinds("a:\n- x\n"),
            vec![StreamStart, BlockMappingStart, Key, Scalar, Value, BlockEntry, Scalar, BlockMappingEnd, StreamEnd]
        );
    }

    #[test]
    fn test_flow_collections() {
        assert_eq!(
            kinds("{a: [1, 2]}"),
            vec![
                StreamStart,
                FlowMappingStart,
                Key,
                Scalar,
                Value,
                FlowSequenceStart,
                Scalar,
                FlowEntry,
                Scalar,
                FlowSequenceEnd,
                FlowMappingEnd,
                StreamEnd,
            ]
        );
    }

    #[test]
    fn test_plain_with_colon_inside_flow() {
        assert_eq!(scalars("[http://x.y, a:b]"), vec!["http://x.y", "a:b"]);
    }

    #[test]
    fn test_explicit_key() {
        assert_eq!(
            kinds("? a\n: b\n"),
            vec![StreamStart, BlockMappingStart, Key, Scalar, Value, Scalar, BlockMappingEnd, StreamEnd]
        );
    }

    #[test]
    fn test_document_markers() {
        assert_eq!(
            kinds("--- a\n...\n---\nb\n"),
            vec![StreamStart, DocumentStart, Scalar, DocumentEnd, DocumentStart, Scalar, StreamEnd]
        );
    }

    #[test]
    fn test_literal_chomping() {
        assert_eq!(scalars("|-\n  a\n\n"), vec!["a"]);
        assert_eq!(scalars("|\n  a\n\n"), vec!["a\n"]);
        assert_eq!(scalars("|+\n  a\n\n"), vec!["a\n\n"]);
    }

    #[test]
    fn test_literal_keeps_inner_breaks_and_indentation() {
        assert_eq!(scalars("|\n  a\n    b\n\n  c\n"), vec!["a\n  b\n\nc\n"]);
    }

    #[test]
    fn test_folded() {
        assert_eq!(scalars(">\n  line1\n  line2\n"), vec!["line1 line2\n"]);
        assert_eq!(scalars(">\n  a\n\n  b\n"), vec!["a\nb\n"]);
        assert_eq!(scalars(">\n  a\n    more\n  b\n"), vec!["a\n  more\nb\n"]);
    }

    #[test]
    fn test_block_scalar_indentation_indicator() {
        assert_eq!(scalars("|2\n   a\n  b\n"), vec![" a\nb\n"]);
        assert_eq!(scalars("key: |1-\n  x\n"), vec!["key", " x"]);
    }

    #[test]
    fn test_block_scalar_in_mapping_ends_at_dedent() {
        assert_eq!(scalars("a: |\n  text\nb: c\n"), vec!["a", "text\n", "b", "c"]);
    }

    #[test]
    fn test_bad_block_scalar_headers() {
        let err = scan_error("|0\n a\n");
        assert!(err.to_string().contains("expected indentation indicator in the range 1-9"));
        let err = scan_error("|x\n a\n");
        assert!(err.to_string().contains("expected chomping or indentation indicators"));
    }

    #[test]
    fn test_double_quoted_escapes() {
        assert_eq!(
            scalars(r#""tab\there \x41\u00e9\U0001F600 \"q\" \\""#),
            vec!["tab\there Aé😀 \"q\" \\"]
        );
    }

    #[test]
    fn test_double_quoted_line_continuation_and_folding() {
        assert_eq!(scalars("\"a\\\n   b\""), vec!["ab"]);
        assert_eq!(scalars("\"one\n  two\n\n  three\""), vec!["one two\nthree"]);
    }

    #[test]
    fn test_single_quoted() {
        assert_eq!(scalars("'it''s \\n'"), vec!["it's \\n"]);
    }

    #[test]
    fn test_invalid_escape() {
        let err = scan_error(r#""\q""#);
        assert!(matches!(err, YamlError::Scan(_)));
        assert!(err.to_string().contains("found unknown escape character 'q'"));
        let err = scan_error(r#""\u12G4""#);
        assert!(err.to_string().contains("expected escape sequence of 4 hexadecimal numbers"));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = scan_error("'abc");
        assert!(err.to_string().contains("found unexpected end of stream"));
    }

    #[test]
    fn test_document_separator_inside_quotes() {
        let err = scan_error("'a\n--- b'");
        assert!(err.to_string().contains("found unexpected document separator"));
    }

    #[test]
    fn test_plain_multiline_folds() {
        assert_eq!(scalars("a\n  b\n\n  c"), vec!["a b\nc"]);
    }

    #[test]
    fn test_plain_comment_needs_space() {
        assert_eq!(scalars("a#b # c"), vec!["a#b"]);
    }

    #[test]
    fn test_multiline_plain_is_not_a_simple_key() {
        let err = scan_error("a\n b: 1");
        assert!(matches!(err, YamlError::Scan(_)));
        assert!(err.to_string().contains("mapping values are not allowed here"));
    }

    #[test]
    fn test_required_simple_key_without_colon() {
        let err = scan_error("a: 1\nb\n");
        assert!(err.to_string().contains("could not find expected ':'"));
        assert!(err.to_string().contains("while scanning a simple key"));
    }

    #[test]
    fn test_simple_key_length_limit() {
        let long_key = "k".repeat(MAX_SIMPLE_KEY_LENGTH + 10);
        let err = scan_error(&format!("{}: v", long_key));
        assert!(err.to_string().contains("mapping values are not allowed here"));
        // In flow context the candidate is dropped without an error.
        assert_eq!(
            kinds(&format!("[{}: v]", long_key)),
            vec![StreamStart, FlowSequenceStart, Scalar, Value, Scalar, FlowSequenceEnd, StreamEnd]
        );
        let short_key = "k".repeat(100);
        assert_eq!(kinds(&format!("[{}: v]", short_key))[2], Key);
    }

    #[test]
    fn test_tab_indentation_is_rejected() {
        let err = scan_error("a:\n\tb: 1\n");
        assert!(err.to_string().contains("found a tab character"));
        // Tabs as separators are fine.
        assert_eq!(scalars("a:\tb"), vec!["a", "b"]);
        assert_eq!(scalars("[a,\n\tb]"), vec!["a", "b"]);
    }

    #[test]
    fn test_inconsistent_dedent() {
        let err = scan_error("a:\n    b: 1\n  c: 2\n");
        assert!(err.to_string().contains("does not match any outer indentation level"));
    }

    #[test]
    fn test_block_entry_in_flow_is_rejected() {
        let err = scan_error("[a, - b]");
        assert!(err.to_string().contains("not allowed in a flow collection"));
    }

    #[test]
    fn test_anchor_alias_tag() {
        let toks = tokens("- &a !!str x\n- *a\n- !<tag:x> y\n- ! z\n- !local w");
        let datas: Vec<_> = toks
            .into_iter()
            .map(|t| t.data)
            .filter(|d| matches!(d, TokenData::Anchor(_) | TokenData::Alias(_) | TokenData::Tag { .. }))
            .collect();
        assert_eq!(
            datas,
            vec![
                TokenData::Anchor("a".to_string()),
                TokenData::Tag {
                    handle: Some("!!".to_string()),
                    suffix: "str".to_string()
                },
                TokenData::Alias("a".to_string()),
                TokenData::Tag {
                    handle: None,
                    suffix: "tag:x".to_string()
                },
                TokenData::Tag {
                    handle: None,
                    suffix: "!".to_string()
                },
                TokenData::Tag {
                    handle: Some("!".to_string()),
                    suffix: "local".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_tag_uri_escapes() {
        let toks = tokens("!e!a%20b x");
        assert_eq!(
            toks[1].data,
            TokenData::Tag {
                handle: Some("!e!".to_string()),
                suffix: "a b".to_string()
            }
        );
    }

    #[test]
    fn test_directives() {
        let toks = tokens("%YAML 1.2\n%TAG !e! tag:example.com,2000:\n%FOO bar baz\n--- x");
        let directives: Vec<_> = toks
            .into_iter()
            .filter_map(|t| match t.data {
                TokenData::Directive(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(
            directives,
            vec![
                Directive::Version { major: 1, minor: 2 },
                Directive::Tag {
                    handle: "!e!".to_string(),
                    prefix: "tag:example.com,2000:".to_string()
                },
                Directive::Reserved {
                    name: "FOO".to_string(),
                    params: vec!["bar".to_string(), "baz".to_string()]
                },
            ]
        );
    }

    #[test]
    fn test_bad_directive() {
        let err = scan_error("%YAML 1\n---");
        assert!(err.to_string().contains("expected a digit or '.'"));
        let err = scan_error("%YAML 1.2 x\n---");
        assert!(err.to_string().contains("expected a comment or a line break"));
    }

    #[test]
    fn test_comments_are_skipped_by_default() {
        assert!(!kinds("# top\na: 1 # tail\n").contains(&Comment));
    }

    #[test]
    fn test_comment_tokens() {
        let settings = LoadSettings::default().with_parse_comments(true);
        let toks: Vec<Token> = Scanner::from_str("# top\na: 1 # tail\n", &settings)
            .collect::<Result<_>>()
            .unwrap();
        let comments: Vec<_> = toks
            .into_iter()
            .filter_map(|t| match t.data {
                TokenData::Comment { kind, value } => Some((kind, value)),
                _ => None,
            })
            .collect();
        assert_eq!(
            comments,
            vec![
                (CommentKind::Block, " top".to_string()),
                (CommentKind::InLine, " tail".to_string()),
            ]
        );
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut s = scanner("a: 1");
        assert_eq!(s.peek_token().unwrap().map(Token::kind), Some(StreamStart));
        assert_eq!(s.peek_token_at(2).unwrap().map(Token::kind), Some(Key));
        assert!(s.check_token(&[StreamStart]).unwrap());
        assert_eq!(s.get_token().unwrap().map(|t| t.kind()), Some(StreamStart));
        assert!(s.check_token(&[BlockMappingStart]).unwrap());
    }

    #[test]
    fn test_end_of_stream() {
        let mut s = scanner("");
        assert_eq!(s.get_token().unwrap().map(|t| t.kind()), Some(StreamStart));
        assert_eq!(s.get_token().unwrap().map(|t| t.kind()), Some(StreamEnd));
        assert!(s.get_token().unwrap().is_none());
    }

    #[test]
    fn test_marks() {
        let toks = tokens("a: bc");
        let scalar = &toks[5];
        assert_eq!(scalar.start_mark, Mark::new(3, 0, 3));
        assert_eq!(scalar.end_mark, Mark::new(5, 0, 5));
    }

    #[test]
    fn test_reader_error_surfaces_lazily() {
        let reader = StreamReader::new(b"- a\n- b\x07".to_vec(), &LoadSettings::default());
        let mut s = Scanner::new(reader, &LoadSettings::default());
        let mut seen = Vec::new();
        let err = loop {
            match s.get_token() {
                Ok(Some(token)) => seen.push(token.kind()),
                Ok(None) => panic!("expected a reader error"),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, YamlError::Reader(_)));
        assert!(seen.contains(&BlockEntry));
        assert!(seen.contains(&Scalar));
    }

    #[test]
    fn test_token_cut_by_bad_bytes_is_not_yielded() {
        for input in [&b"a: abc\xFFdef\n"[..], b"- &anc\xFF x\n", b"k: |\n  text\xFF\n"] {
            let reader = StreamReader::new(input.to_vec(), &LoadSettings::default());
            let mut s = Scanner::new(reader, &LoadSettings::default());
            let mut values = Vec::new();
            let err = loop {
                match s.get_token() {
                    Ok(Some(token)) => match token.data {
                        TokenData::Scalar { value, .. } | TokenData::Anchor(value) => values.push(value),
                        _ => {}
                    },
                    Ok(None) => panic!("expected a reader error"),
                    Err(err) => break err,
                }
            };
            assert!(matches!(err, YamlError::Reader(ReaderError::InvalidEncoding { .. })));
            assert!(values.iter().all(|v| v == "a" || v == "k"), "{:?}", values);
        }
    }

    #[test]
    fn test_errors_are_sticky() {
        let mut s = scanner("\"\\q\"");
        let first = loop {
            if let Err(err) = s.get_token() {
                break err;
            }
        };
        assert_eq!(s.get_token().unwrap_err(), first);
        assert!(s.next().is_none());
    }

    #[test]
    fn test_error_message_has_snippet() {
        let err = scan_error("key: \"\\q\"");
        let text = err.to_string();
        assert!(text.contains("line 1, column 8"), "{}", text);
        assert!(text.contains("    key: \"\\q\"\n           ^"), "{}", text);
    }
}
