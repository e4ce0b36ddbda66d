//! Token types produced by the scanner.

use std::fmt;

use crate::mark::Mark;

/// Presentation style of a scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl ScalarStyle {
    /// The indicator character of this style in event notation.
    pub fn indicator(self) -> char {
        match self {
            ScalarStyle::Plain => ':',
            ScalarStyle::SingleQuoted => '\'',
            ScalarStyle::DoubleQuoted => '"',
            ScalarStyle::Literal => '|',
            ScalarStyle::Folded => '>',
        }
    }
}

/// Where a comment sits relative to the content of its line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommentKind {
    /// The comment follows content on the same line.
    InLine,
    /// The comment is alone on its line.
    Block,
}

/// Payload of a directive token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// `%YAML major.minor`
    Version { major: u32, minor: u32 },
    /// `%TAG handle prefix`
    Tag { handle: String, prefix: String },
    /// Any other directive; kept so the parser can warn about it.
    Reserved { name: String, params: Vec<String> },
}

/// Discriminant of a token, used for lookahead checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    StreamStart,
    StreamEnd,
    Directive,
    DocumentStart,
    DocumentEnd,
    BlockSequenceStart,
    BlockMappingStart,
    BlockSequenceEnd,
    BlockMappingEnd,
    BlockEntry,
    Key,
    Value,
    FlowSequenceStart,
    FlowSequenceEnd,
    FlowMappingStart,
    FlowMappingEnd,
    FlowEntry,
    Alias,
    Anchor,
    Tag,
    Scalar,
    Comment,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::StreamStart => "<stream start>",
            TokenKind::StreamEnd => "<stream end>",
            TokenKind::Directive => "<directive>",
            TokenKind::DocumentStart => "<document start>",
            TokenKind::DocumentEnd => "<document end>",
            TokenKind::BlockSequenceStart => "<block sequence start>",
            TokenKind::BlockMappingStart => "<block mapping start>",
            TokenKind::BlockSequenceEnd | TokenKind::BlockMappingEnd => "<block end>",
            TokenKind::BlockEntry => "-",
            TokenKind::Key => "?",
            TokenKind::Value => ":",
            TokenKind::FlowSequenceStart => "[",
            TokenKind::FlowSequenceEnd => "]",
            TokenKind::FlowMappingStart => "{",
            TokenKind::FlowMappingEnd => "}",
            TokenKind::FlowEntry => ",",
            TokenKind::Alias => "<alias>",
            TokenKind::Anchor => "<anchor>",
            TokenKind::Tag => "<tag>",
            TokenKind::Scalar => "<scalar>",
            TokenKind::Comment => "<comment>",
        };
        f.write_str(name)
    }
}

/// Token content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenData {
    StreamStart,
    StreamEnd,
    Directive(Directive),
    DocumentStart,
    DocumentEnd,
    BlockSequenceStart,
    BlockMappingStart,
    BlockSequenceEnd,
    BlockMappingEnd,
    BlockEntry,
    Key,
    Value,
    FlowSequenceStart,
    FlowSequenceEnd,
    FlowMappingStart,
    FlowMappingEnd,
    FlowEntry,
    Alias(String),
    Anchor(String),
    /// A tag as written: `handle` is `None` for verbatim tags.
    Tag {
        handle: Option<String>,
        suffix: String,
    },
    Scalar {
        value: String,
        plain: bool,
        style: ScalarStyle,
    },
    Comment {
        kind: CommentKind,
        value: String,
    },
}

impl TokenData {
    pub fn kind(&self) -> TokenKind {
        match self {
            TokenData::StreamStart => TokenKind::StreamStart,
            TokenData::StreamEnd => TokenKind::StreamEnd,
            TokenData::Directive(_) => TokenKind::Directive,
            TokenData::DocumentStart => TokenKind::DocumentStart,
            TokenData::DocumentEnd => TokenKind::DocumentEnd,
            TokenData::BlockSequenceStart => TokenKind::BlockSequenceStart,
            TokenData::BlockMappingStart => TokenKind::BlockMappingStart,
            TokenData::BlockSequenceEnd => TokenKind::BlockSequenceEnd,
            TokenData::BlockMappingEnd => TokenKind::BlockMappingEnd,
            TokenData::BlockEntry => TokenKind::BlockEntry,
            TokenData::Key => TokenKind::Key,
            TokenData::Value => TokenKind::Value,
            TokenData::FlowSequenceStart => TokenKind::FlowSequenceStart,
            TokenData::FlowSequenceEnd => TokenKind::FlowSequenceEnd,
            TokenData::FlowMappingStart => TokenKind::FlowMappingStart,
            TokenData::FlowMappingEnd => TokenKind::FlowMappingEnd,
            TokenData::FlowEntry => TokenKind::FlowEntry,
            TokenData::Alias(_) => TokenKind::Alias,
            TokenData::Anchor(_) => TokenKind::Anchor,
            TokenData::Tag { .. } => TokenKind::Tag,
            TokenData::Scalar { .. } => TokenKind::Scalar,
            TokenData::Comment { .. } => TokenKind::Comment,
        }
    }
}

/// A single token with its source range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub data: TokenData,
    pub start_mark: Mark,
    pub end_mark: Mark,
}

impl Token {
    pub fn new(data: TokenData, start_mark: Mark, end_mark: Mark) -> Self {
        Self {
            data,
            start_mark,
            end_mark,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.data.kind()
    }
}
