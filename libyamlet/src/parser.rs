//! Stage 2: Parser
//!
//! The parser reduces the token stream to events following the YAML
//! grammar:
//!
//! ```text
//! stream   ::= STREAM-START implicit_document? explicit_document* STREAM-END
//! document ::= DIRECTIVE* DOCUMENT-START block_node? DOCUMENT-END*
//! node     ::= ALIAS | properties? (SCALAR | sequence | mapping)
//! ```
//!
//! Instead of recursing, the parser keeps an explicit stack of production
//! states. Every call to [`Parser::get_event`] runs exactly one production
//! step, so events are handed out as soon as they are known.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::error::{Result, YamlError};
use crate::event::{Event, EventData, EventKind, FlowStyle, ImplicitTuple, SpecVersion};
use crate::mark::Mark;
use crate::scanner::Scanner;
use crate::settings::LoadSettings;
use crate::token::{Directive, ScalarStyle, Token, TokenData, TokenKind};

/// Tag handles every document knows without a `%TAG` directive.
const DEFAULT_TAG_HANDLES: [(&str, &str); 2] = [("!", "!"), ("!!", "tag:yaml.org,2002:")];

/// A production waiting to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    StreamStart,
    ImplicitDocumentStart,
    DocumentStart,
    DocumentContent,
    DocumentEnd,
    BlockNode,
    BlockSequenceFirstEntry,
    BlockSequenceEntry,
    IndentlessSequenceEntry,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingValue,
    FlowSequenceFirstEntry,
    FlowSequenceEntry,
    FlowSequenceEntryMappingKey,
    FlowSequenceEntryMappingValue,
    FlowSequenceEntryMappingEnd,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingValue,
    FlowMappingEmptyValue,
    End,
}

/// Pull-based event producer over a [`Scanner`].
pub struct Parser {
    scanner: Scanner,
    current: Option<Event>,
    failed: Option<YamlError>,
    state: State,
    states: Vec<State>,
    /// Start marks of the open collections, for error context.
    marks: Vec<Mark>,
    tag_handles: HashMap<String, String>,
}

impl Parser {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            current: None,
            failed: None,
            state: State::StreamStart,
            states: Vec::new(),
            marks: Vec::new(),
            tag_handles: HashMap::new(),
        }
    }

    pub fn from_str(input: &str, settings: &LoadSettings) -> Self {
        Self::new(Scanner::from_str(input, settings))
    }

    /// Whether the next event is one of `kinds`.
    pub fn check_event(&mut self, kinds: &[EventKind]) -> Result<bool> {
        self.fill()?;
        Ok(self
            .current
            .as_ref()
            .map_or(false, |e| kinds.contains(&e.kind())))
    }

    /// The next event without consuming it; `None` after StreamEnd.
    pub fn peek_event(&mut self) -> Result<Option<&Event>> {
        self.fill()?;
        Ok(self.current.as_ref())
    }

    /// Consume and return the next event; `None` after StreamEnd.
    pub fn get_event(&mut self) -> Result<Option<Event>> {
        self.fill()?;
        Ok(self.current.take())
    }

    /// Whether another event follows.
    pub fn has_next(&mut self) -> Result<bool> {
        self.fill()?;
        Ok(self.current.is_some())
    }

    /// Source diagnostics for errors raised by consumers of the events.
    pub(crate) fn marked_error(
        &self,
        context: Option<(&str, Mark)>,
        problem: impl Into<String>,
        mark: Mark,
    ) -> crate::error::MarkedError {
        self.scanner.reader().marked_error(context, problem, mark)
    }

    fn fill(&mut self) -> Result<()> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if self.current.is_none() {
            match self.produce() {
                Ok(event) => self.current = event,
                Err(err) => {
                    self.failed = Some(err.clone());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Run one production step.
    fn produce(&mut self) -> Result<Option<Event>> {
        let state = std::mem::replace(&mut self.state, State::End);
        let event = match state {
            State::End => return Ok(None),
            State::StreamStart => self.parse_stream_start()?,
            State::ImplicitDocumentStart => self.parse_implicit_document_start()?,
            State::DocumentStart => self.parse_document_start()?,
            State::DocumentContent => self.parse_document_content()?,
            State::DocumentEnd => self.parse_document_end()?,
            State::BlockNode => self.parse_node(true, false)?,
            State::BlockSequenceFirstEntry => self.parse_block_sequence_first_entry()?,
            State::BlockSequenceEntry => self.parse_block_sequence_entry()?,
            State::IndentlessSequenceEntry => self.parse_indentless_sequence_entry()?,
            State::BlockMappingFirstKey => self.parse_block_mapping_first_key()?,
            State::BlockMappingKey => self.parse_block_mapping_key()?,
            State::BlockMappingValue => self.parse_block_mapping_value()?,
            State::FlowSequenceFirstEntry => self.parse_flow_sequence_first_entry()?,
            State::FlowSequenceEntry => self.parse_flow_sequence_entry(false)?,
            State::FlowSequenceEntryMappingKey => self.parse_flow_sequence_entry_mapping_key()?,
            State::FlowSequenceEntryMappingValue => self.parse_flow_sequence_entry_mapping_value()?,
            State::FlowSequenceEntryMappingEnd => self.parse_flow_sequence_entry_mapping_end()?,
            State::FlowMappingFirstKey => self.parse_flow_mapping_first_key()?,
            State::FlowMappingKey => self.parse_flow_mapping_key(false)?,
            State::FlowMappingValue => self.parse_flow_mapping_value()?,
            State::FlowMappingEmptyValue => self.parse_flow_mapping_empty_value()?,
        };
        trace!(event = %event, line = event.start_mark.line, "event");
        Ok(Some(event))
    }

    // ========================================================================
    // Token access
    // ========================================================================

    fn error(&self, context: Option<(&str, Mark)>, problem: impl Into<String>, mark: Mark) -> YamlError {
        YamlError::Parse(self.marked_error(context, problem, mark))
    }

    /// Kind and marks of the next non-comment token.
    fn peek_token(&mut self) -> Result<(TokenKind, Mark, Mark)> {
        loop {
            let peeked = self
                .scanner
                .peek_token()?
                .map(|t| (t.kind(), t.start_mark, t.end_mark));
            match peeked {
                Some((TokenKind::Comment, _, _)) => {
                    self.scanner.get_token()?;
                }
                Some(info) => return Ok(info),
                None => {
                    let mark = self.scanner.reader().mark();
                    return Err(self.error(None, "unexpected end of the token stream", mark));
                }
            }
        }
    }

    fn check_token(&mut self, kinds: &[TokenKind]) -> Result<bool> {
        let (kind, _, _) = self.peek_token()?;
        Ok(kinds.contains(&kind))
    }

    fn take_token(&mut self) -> Result<Token> {
        let (_, mark, _) = self.peek_token()?;
        match self.scanner.get_token()? {
            Some(token) => Ok(token),
            None => Err(self.error(None, "unexpected end of the token stream", mark)),
        }
    }

    fn pop_state(&mut self) -> State {
        self.states.pop().unwrap_or(State::End)
    }

    fn collection_mark(&self) -> Mark {
        self.marks.last().copied().unwrap_or_default()
    }

    fn empty_scalar(&self, mark: Mark) -> Event {
        let data = EventData::Scalar {
            anchor: None,
            tag: None,
            implicit: ImplicitTuple::new(true, false),
            value: String::new(),
            style: ScalarStyle::Plain,
        };
        Event::new(data, mark, mark)
    }

    // ========================================================================
    // Stream and documents
    // ========================================================================

    fn parse_stream_start(&mut self) -> Result<Event> {
        let token = self.take_token()?;
        self.state = State::ImplicitDocumentStart;
        Ok(Event::new(EventData::StreamStart, token.start_mark, token.end_mark))
    }

    fn parse_implicit_document_start(&mut self) -> Result<Event> {
        if self.check_token(&[TokenKind::Directive, TokenKind::DocumentStart, TokenKind::StreamEnd])? {
            return self.parse_document_start();
        }
        self.reset_tag_handles();
        let (_, mark, _) = self.peek_token()?;
        debug!(explicit = false, line = mark.line, "document start");
        self.states.push(State::DocumentEnd);
        self.state = State::BlockNode;
        let data = EventData::DocumentStart {
            explicit: false,
            version: None,
            tags: Vec::new(),
        };
        Ok(Event::new(data, mark, mark))
    }

    fn parse_document_start(&mut self) -> Result<Event> {
        // Extra `...` markers are allowed between documents.
        while self.check_token(&[TokenKind::DocumentEnd])? {
            self.take_token()?;
        }

        if self.check_token(&[TokenKind::StreamEnd])? {
            let token = self.take_token()?;
            self.state = State::End;
            return Ok(Event::new(EventData::StreamEnd, token.start_mark, token.end_mark));
        }

        let (_, start_mark, _) = self.peek_token()?;
        let (version, tags) = self.process_directives()?;
        let (kind, mark, _) = self.peek_token()?;
        if kind != TokenKind::DocumentStart {
            return Err(self.error(
                None,
                format!("expected '<document start>', but found '{}'", kind),
                mark,
            ));
        }
        let token = self.take_token()?;
        debug!(explicit = true, line = start_mark.line, "document start");
        self.states.push(State::DocumentEnd);
        self.state = State::DocumentContent;
        let data = EventData::DocumentStart {
            explicit: true,
            version,
            tags,
        };
        Ok(Event::new(data, start_mark, token.end_mark))
    }

    fn parse_document_end(&mut self) -> Result<Event> {
        let (_, start_mark, mut end_mark) = self.peek_token()?;
        let explicit = self.check_token(&[TokenKind::DocumentEnd])?;
        if explicit {
            end_mark = self.take_token()?.end_mark;
        }
        debug!(explicit, line = start_mark.line, "document end");
        // After `...` the next document may omit `---`.
        self.state = if explicit {
            State::ImplicitDocumentStart
        } else {
            State::DocumentStart
        };
        Ok(Event::new(EventData::DocumentEnd { explicit }, start_mark, end_mark))
    }

    fn parse_document_content(&mut self) -> Result<Event> {
        if self.check_token(&[
            TokenKind::Directive,
            TokenKind::DocumentStart,
            TokenKind::DocumentEnd,
            TokenKind::StreamEnd,
        ])? {
            let (_, mark, _) = self.peek_token()?;
            self.state = self.pop_state();
            return Ok(self.empty_scalar(mark));
        }
        self.parse_node(true, false)
    }

    fn reset_tag_handles(&mut self) {
        self.tag_handles.clear();
        for (handle, prefix) in DEFAULT_TAG_HANDLES {
            self.tag_handles.insert(handle.to_string(), prefix.to_string());
        }
    }

    fn process_directives(&mut self) -> Result<(Option<SpecVersion>, Vec<(String, String)>)> {
        let mut version = None;
        let mut tags = Vec::new();
        self.tag_handles.clear();
        while self.check_token(&[TokenKind::Directive])? {
            let token = self.take_token()?;
            let TokenData::Directive(directive) = token.data else {
                continue;
            };
            match directive {
                Directive::Version { major, minor } => {
                    if version.is_some() {
                        return Err(self.error(None, "found duplicate YAML directive", token.start_mark));
                    }
                    if major != 1 || minor > 2 {
                        return Err(self.error(
                            None,
                            format!(
                                "found incompatible YAML document (version 1.* is required), got {}.{}",
                                major, minor
                            ),
                            token.start_mark,
                        ));
                    }
                    version = Some(SpecVersion { major, minor });
                }
                Directive::Tag { handle, prefix } => {
                    if self.tag_handles.contains_key(&handle) {
                        return Err(self.error(
                            None,
                            format!("found duplicate tag handle {}", handle),
                            token.start_mark,
                        ));
                    }
                    self.tag_handles.insert(handle.clone(), prefix.clone());
                    tags.push((handle, prefix));
                }
                Directive::Reserved { name, .. } => {
                    warn!(directive = %name, line = token.start_mark.line, "ignoring reserved directive");
                }
            }
        }
        for (handle, prefix) in DEFAULT_TAG_HANDLES {
            self.tag_handles
                .entry(handle.to_string())
                .or_insert_with(|| prefix.to_string());
        }
        Ok((version, tags))
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn parse_node(&mut self, block: bool, indentless_sequence: bool) -> Result<Event> {
        if self.check_token(&[TokenKind::Alias])? {
            let token = self.take_token()?;
            self.state = self.pop_state();
            let anchor = match token.data {
                TokenData::Alias(name) => name,
                _ => String::new(),
            };
            return Ok(Event::new(EventData::Alias { anchor }, token.start_mark, token.end_mark));
        }

        let (_, mut start_mark, _) = self.peek_token()?;
        let mut end_mark = start_mark;
        let mut anchor = None;
        let mut written_tag = None;
        let mut tag_mark = start_mark;

        if self.check_token(&[TokenKind::Anchor])? {
            let token = self.take_token()?;
            start_mark = token.start_mark;
            end_mark = token.end_mark;
            anchor = anchor_name(token.data);
            if self.check_token(&[TokenKind::Tag])? {
                let token = self.take_token()?;
                tag_mark = token.start_mark;
                end_mark = token.end_mark;
                written_tag = tag_parts(token.data);
            }
        } else if self.check_token(&[TokenKind::Tag])? {
            let token = self.take_token()?;
            start_mark = token.start_mark;
            tag_mark = token.start_mark;
            end_mark = token.end_mark;
            written_tag = tag_parts(token.data);
            if self.check_token(&[TokenKind::Anchor])? {
                let token = self.take_token()?;
                end_mark = token.end_mark;
                anchor = anchor_name(token.data);
            }
        }

        let tag = match written_tag {
            Some((Some(handle), suffix)) => match self.tag_handles.get(&handle) {
                Some(prefix) => Some(format!("{}{}", prefix, suffix)),
                None => {
                    return Err(self.error(
                        Some(("while parsing a node", start_mark)),
                        format!("found undefined tag handle {}", handle),
                        tag_mark,
                    ))
                }
            },
            Some((None, suffix)) => Some(suffix),
            None => None,
        };

        let implicit = tag.as_deref().map_or(true, |t| t == "!");
        let (kind, next_start, next_end) = self.peek_token()?;

        if indentless_sequence && kind == TokenKind::BlockEntry {
            self.state = State::IndentlessSequenceEntry;
            let data = EventData::SequenceStart {
                anchor,
                tag,
                implicit,
                flow_style: FlowStyle::Block,
            };
            return Ok(Event::new(data, start_mark, next_end));
        }

        let start_mark = if anchor.is_none() && tag.is_none() {
            next_start
        } else {
            start_mark
        };

        match kind {
            TokenKind::Scalar => {
                let token = self.take_token()?;
                self.state = self.pop_state();
                let TokenData::Scalar { value, plain, style } = token.data else {
                    return Err(self.error(None, "expected a scalar token", token.start_mark));
                };
                let implicit = ImplicitTuple::new(plain && tag.is_none(), !plain && tag.is_none());
                let data = EventData::Scalar {
                    anchor,
                    tag,
                    implicit,
                    value,
                    style,
                };
                Ok(Event::new(data, start_mark, token.end_mark))
            }
            TokenKind::FlowSequenceStart => {
                self.state = State::FlowSequenceFirstEntry;
                let data = EventData::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: FlowStyle::Flow,
                };
                Ok(Event::new(data, start_mark, next_end))
            }
            TokenKind::FlowMappingStart => {
                self.state = State::FlowMappingFirstKey;
                let data = EventData::MappingStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: FlowStyle::Flow,
                };
                Ok(Event::new(data, start_mark, next_end))
            }
            TokenKind::BlockSequenceStart if block => {
                self.state = State::BlockSequenceFirstEntry;
                let data = EventData::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: FlowStyle::Block,
                };
                Ok(Event::new(data, start_mark, next_start))
            }
            TokenKind::BlockMappingStart if block => {
                self.state = State::BlockMappingFirstKey;
                let data = EventData::MappingStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: FlowStyle::Block,
                };
                Ok(Event::new(data, start_mark, next_start))
            }
            _ if anchor.is_some() || tag.is_some() => {
                // Properties without content: an empty scalar.
                self.state = self.pop_state();
                let data = EventData::Scalar {
                    anchor,
                    implicit: ImplicitTuple::new(tag.is_none(), false),
                    tag,
                    value: String::new(),
                    style: ScalarStyle::Plain,
                };
                Ok(Event::new(data, start_mark, end_mark))
            }
            _ => {
                let context = if block {
                    "while parsing a block node"
                } else {
                    "while parsing a flow node"
                };
                Err(self.error(
                    Some((context, start_mark)),
                    format!("expected the node content, but found '{}'", kind),
                    next_start,
                ))
            }
        }
    }

    // ========================================================================
    // Block collections
    // ========================================================================

    fn parse_block_sequence_first_entry(&mut self) -> Result<Event> {
        let token = self.take_token()?;
        self.marks.push(token.start_mark);
        self.parse_block_sequence_entry()
    }

    fn parse_block_sequence_entry(&mut self) -> Result<Event> {
        if self.check_token(&[TokenKind::BlockEntry])? {
            let token = self.take_token()?;
            if !self.check_token(&[TokenKind::BlockEntry, TokenKind::BlockSequenceEnd])? {
                self.states.push(State::BlockSequenceEntry);
                return self.parse_node(true, false);
            }
            self.state = State::BlockSequenceEntry;
            return Ok(self.empty_scalar(token.end_mark));
        }
        let (kind, mark, _) = self.peek_token()?;
        if kind != TokenKind::BlockSequenceEnd {
            return Err(self.error(
                Some(("while parsing a block collection", self.collection_mark())),
                format!("expected <block end>, but found '{}'", kind),
                mark,
            ));
        }
        let token = self.take_token()?;
        self.state = self.pop_state();
        self.marks.pop();
        Ok(Event::new(EventData::SequenceEnd, token.start_mark, token.end_mark))
    }

    fn parse_indentless_sequence_entry(&mut self) -> Result<Event> {
        if self.check_token(&[TokenKind::BlockEntry])? {
            let token = self.take_token()?;
            if !self.check_token(&[
                TokenKind::BlockEntry,
                TokenKind::Key,
                TokenKind::Value,
                TokenKind::BlockMappingEnd,
            ])? {
                self.states.push(State::IndentlessSequenceEntry);
                return self.parse_node(true, false);
            }
            self.state = State::IndentlessSequenceEntry;
            return Ok(self.empty_scalar(token.end_mark));
        }
        let (_, mark, _) = self.peek_token()?;
        self.state = self.pop_state();
        Ok(Event::new(EventData::SequenceEnd, mark, mark))
    }

    fn parse_block_mapping_first_key(&mut self) -> Result<Event> {
        let token = self.take_token()?;
        self.marks.push(token.start_mark);
        self.parse_block_mapping_key()
    }

    fn parse_block_mapping_key(&mut self) -> Result<Event> {
        if self.check_token(&[TokenKind::Key])? {
            let token = self.take_token()?;
            if !self.check_token(&[TokenKind::Key, TokenKind::Value, TokenKind::BlockMappingEnd])? {
                self.states.push(State::BlockMappingValue);
                return self.parse_node(true, true);
            }
            self.state = State::BlockMappingValue;
            return Ok(self.empty_scalar(token.end_mark));
        }
        let (kind, mark, _) = self.peek_token()?;
        if kind == TokenKind::Value {
            // `: value` without a key.
            self.state = State::BlockMappingValue;
            return Ok(self.empty_scalar(mark));
        }
        if kind != TokenKind::BlockMappingEnd {
            return Err(self.error(
                Some(("while parsing a block mapping", self.collection_mark())),
                format!("expected <block end>, but found '{}'", kind),
                mark,
            ));
        }
        let token = self.take_token()?;
        self.state = self.pop_state();
        self.marks.pop();
        Ok(Event::new(EventData::MappingEnd, token.start_mark, token.end_mark))
    }

    fn parse_block_mapping_value(&mut self) -> Result<Event> {
        if self.check_token(&[TokenKind::Value])? {
            let token = self.take_token()?;
            if !self.check_token(&[TokenKind::Key, TokenKind::Value, TokenKind::BlockMappingEnd])? {
                self.states.push(State::BlockMappingKey);
                return self.parse_node(true, true);
            }
            self.state = State::BlockMappingKey;
            return Ok(self.empty_scalar(token.end_mark));
        }
        let (_, mark, _) = self.peek_token()?;
        self.state = State::BlockMappingKey;
        Ok(self.empty_scalar(mark))
    }

    // ========================================================================
    // Flow collections
    // ========================================================================

    fn parse_flow_sequence_first_entry(&mut self) -> Result<Event> {
        let token = self.take_token()?;
        self.marks.push(token.start_mark);
        self.parse_flow_sequence_entry(true)
    }

    fn parse_flow_sequence_entry(&mut self, first: bool) -> Result<Event> {
        if !self.check_token(&[TokenKind::FlowSequenceEnd])? {
            if !first {
                let (kind, mark, _) = self.peek_token()?;
                if kind != TokenKind::FlowEntry {
                    return Err(self.error(
                        Some(("while parsing a flow sequence", self.collection_mark())),
                        format!("expected ',' or ']', but got '{}'", kind),
                        mark,
                    ));
                }
                self.take_token()?;
            }
            let (kind, mark, end_mark) = self.peek_token()?;
            if kind == TokenKind::Key || kind == TokenKind::Value {
                // A single pair inside a sequence: `[a: b]`, `[: b]`.
                self.state = State::FlowSequenceEntryMappingKey;
                let data = EventData::MappingStart {
                    anchor: None,
                    tag: None,
                    implicit: true,
                    flow_style: FlowStyle::Flow,
                };
                return Ok(Event::new(data, mark, end_mark));
            }
            if kind != TokenKind::FlowSequenceEnd {
                self.states.push(State::FlowSequenceEntry);
                return self.parse_node(false, false);
            }
        }
        let token = self.take_token()?;
        self.state = self.pop_state();
        self.marks.pop();
        Ok(Event::new(EventData::SequenceEnd, token.start_mark, token.end_mark))
    }

    fn parse_flow_sequence_entry_mapping_key(&mut self) -> Result<Event> {
        let (_, mut mark, _) = self.peek_token()?;
        if self.check_token(&[TokenKind::Key])? {
            mark = self.take_token()?.end_mark;
        }
        if !self.check_token(&[TokenKind::Value, TokenKind::FlowEntry, TokenKind::FlowSequenceEnd])? {
            self.states.push(State::FlowSequenceEntryMappingValue);
            return self.parse_node(false, false);
        }
        self.state = State::FlowSequenceEntryMappingValue;
        Ok(self.empty_scalar(mark))
    }

    fn parse_flow_sequence_entry_mapping_value(&mut self) -> Result<Event> {
        if self.check_token(&[TokenKind::Value])? {
            let token = self.take_token()?;
            if !self.check_token(&[TokenKind::FlowEntry, TokenKind::FlowSequenceEnd])? {
                self.states.push(State::FlowSequenceEntryMappingEnd);
                return self.parse_node(false, false);
            }
            self.state = State::FlowSequenceEntryMappingEnd;
            return Ok(self.empty_scalar(token.end_mark));
        }
        let (_, mark, _) = self.peek_token()?;
        self.state = State::FlowSequenceEntryMappingEnd;
        Ok(self.empty_scalar(mark))
    }

    fn parse_flow_sequence_entry_mapping_end(&mut self) -> Result<Event> {
        let (_, mark, _) = self.peek_token()?;
        self.state = State::FlowSequenceEntry;
        Ok(Event::new(EventData::MappingEnd, mark, mark))
    }

    fn parse_flow_mapping_first_key(&mut self) -> Result<Event> {
        let token = self.take_token()?;
        self.marks.push(token.start_mark);
        self.parse_flow_mapping_key(true)
    }

    fn parse_flow_mapping_key(&mut self, first: bool) -> Result<Event> {
        if !self.check_token(&[TokenKind::FlowMappingEnd])? {
            if !first {
                let (kind, mark, _) = self.peek_token()?;
                if kind != TokenKind::FlowEntry {
                    return Err(self.error(
                        Some(("while parsing a flow mapping", self.collection_mark())),
                        format!("expected ',' or '}}', but got '{}'", kind),
                        mark,
                    ));
                }
                self.take_token()?;
            }
            let (kind, mark, _) = self.peek_token()?;
            if kind == TokenKind::Key {
                let token = self.take_token()?;
                if !self.check_token(&[TokenKind::Value, TokenKind::FlowEntry, TokenKind::FlowMappingEnd])? {
                    self.states.push(State::FlowMappingValue);
                    return self.parse_node(false, false);
                }
                self.state = State::FlowMappingValue;
                return Ok(self.empty_scalar(token.end_mark));
            }
            if kind == TokenKind::Value {
                // `{: value}`
                self.state = State::FlowMappingValue;
                return Ok(self.empty_scalar(mark));
            }
            if kind != TokenKind::FlowMappingEnd {
                self.states.push(State::FlowMappingEmptyValue);
                return self.parse_node(false, false);
            }
        }
        let token = self.take_token()?;
        self.state = self.pop_state();
        self.marks.pop();
        Ok(Event::new(EventData::MappingEnd, token.start_mark, token.end_mark))
    }

    fn parse_flow_mapping_value(&mut self) -> Result<Event> {
        if self.check_token(&[TokenKind::Value])? {
            let token = self.take_token()?;
            if !self.check_token(&[TokenKind::FlowEntry, TokenKind::FlowMappingEnd])? {
                self.states.push(State::FlowMappingKey);
                return self.parse_node(false, false);
            }
            self.state = State::FlowMappingKey;
            return Ok(self.empty_scalar(token.end_mark));
        }
        let (_, mark, _) = self.peek_token()?;
        self.state = State::FlowMappingKey;
        Ok(self.empty_scalar(mark))
    }

    fn parse_flow_mapping_empty_value(&mut self) -> Result<Event> {
        let (_, mark, _) = self.peek_token()?;
        self.state = State::FlowMappingKey;
        Ok(self.empty_scalar(mark))
    }
}

impl Iterator for Parser {
    type Item = Result<Event>;

    /// Yields every event up to StreamEnd, or the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed.is_some() {
            return None;
        }
        self.get_event().transpose()
    }
}

fn anchor_name(data: TokenData) -> Option<String> {
    match data {
        TokenData::Anchor(name) => Some(name),
        _ => None,
    }
}

fn tag_parts(data: TokenData) -> Option<(Option<String>, String)> {
    match data {
        TokenData::Tag { handle, suffix } => Some((handle, suffix)),
        _ => None,
    }
}
