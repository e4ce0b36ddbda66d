//! Error types for YAML loading.

use std::fmt;

use thiserror::Error;

use crate::mark::Mark;

/// Result type for YAML loading operations.
pub type Result<T> = std::result::Result<T, YamlError>;

/// Error type for every stage of the pipeline.
///
/// All variants are fatal to the stream they come from: once a stage has
/// returned one, it keeps returning the same error on every later pull.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum YamlError {
    /// The byte stream could not be turned into code points.
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// The character stream violates the lexical rules.
    #[error("{0}")]
    Scan(MarkedError),

    /// The token stream cannot be reduced under the grammar.
    #[error("{0}")]
    Parse(MarkedError),

    /// The event stream cannot be turned into a node graph.
    #[error("{0}")]
    Compose(MarkedError),
}

impl YamlError {
    /// The positioned error behind this one, if any.
    pub fn marked(&self) -> Option<&MarkedError> {
        match self {
            YamlError::Reader(_) => None,
            YamlError::Scan(e) | YamlError::Parse(e) | YamlError::Compose(e) => Some(e),
        }
    }

    /// Where the problem was found.
    pub fn problem_mark(&self) -> Option<Mark> {
        self.marked().and_then(|e| e.problem_mark)
    }
}

/// Errors raised while decoding the input into code points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// A byte sequence that is not valid in the detected encoding.
    #[error("invalid {encoding} byte sequence in \"{name}\", byte offset {offset}")]
    InvalidEncoding {
        name: String,
        encoding: &'static str,
        offset: usize,
    },

    /// A code point outside the printable set.
    #[error(
        "unacceptable code point 0x{code_point:X}: special characters are not allowed\nin \"{name}\", position {index}"
    )]
    NonPrintable {
        name: String,
        index: usize,
        code_point: u32,
    },

    /// The document is longer than the configured limit.
    #[error("the incoming YAML document exceeds the limit: {limit} code points")]
    CodePointLimit { limit: usize },

    /// The underlying reader failed.
    #[error("failed to read \"{name}\": {message}")]
    Io { name: String, message: String },
}

/// A problem with a position and a rendered excerpt of the source.
///
/// The optional context describes the construct being processed when the
/// problem was found ("while scanning a simple key"), the problem says what
/// went wrong ("could not find expected ':'").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedError {
    pub label: String,
    pub context: Option<String>,
    pub context_mark: Option<Mark>,
    pub context_snippet: Option<String>,
    pub problem: String,
    pub problem_mark: Option<Mark>,
    pub problem_snippet: Option<String>,
}

impl MarkedError {
    fn write_mark(
        &self,
        f: &mut fmt::Formatter<'_>,
        mark: Mark,
        snippet: Option<&String>,
    ) -> fmt::Result {
        write!(
            f,
            "\n in \"{}\", line {}, column {}:",
            self.label,
            mark.line + 1,
            mark.column + 1
        )?;
        if let Some(snippet) = snippet {
            write!(f, "\n{}", snippet)?;
        }
        Ok(())
    }
}

impl fmt::Display for MarkedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}", context)?;
            // Skip the context position when it would repeat the problem's.
            if let Some(mark) = self.context_mark {
                if self.problem_mark.map_or(true, |p| p.line != mark.line || p.column != mark.column) {
                    self.write_mark(f, mark, self.context_snippet.as_ref())?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "{}", self.problem)?;
        if let Some(mark) = self.problem_mark {
            self.write_mark(f, mark, self.problem_snippet.as_ref())?;
        }
        Ok(())
    }
}
