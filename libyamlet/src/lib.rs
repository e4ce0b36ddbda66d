//! YAML 1.2 loading pipeline.
//!
//! libyamlet reads a YAML stream into a graph of nodes without binding it to
//! any host data structure. Every stage is pull-based: the consumer asks for
//! the next item and each stage asks its upstream for just enough input.
//!
//! # Loading Pipeline
//!
//! 1. **Reader**: Detects the encoding, decodes code points on demand and
//!    tracks source positions.
//!
//! 2. **Scanner**: Converts characters into tokens, tracking indentation and
//!    resolving simple keys.
//!
//! 3. **Parser**: Reduces tokens to events with an explicit state stack,
//!    expanding tag handles and filling in empty nodes.
//!
//! 4. **Composer**: Builds one node arena per document, resolving anchors,
//!    aliases and implicit tags.
//!
//! Each stage is also an [`Iterator`] over `Result` items, so
//! `Parser::from_str(input, &settings).collect::<Result<Vec<_>>>()` yields
//! the whole event stream.

mod chars;
mod composer;
mod error;
mod event;
mod mark;
mod node;
mod parser;
mod reader;
mod resolver;
mod scanner;
mod settings;
mod token;

use std::io::Read;

pub use composer::Composer;
pub use error::{MarkedError, ReaderError, Result, YamlError};
pub use event::{Event, EventData, EventKind, FlowStyle, ImplicitTuple, SpecVersion};
pub use mark::Mark;
pub use node::{tags, Document, Node, NodeId, NodeKind};
pub use parser::Parser;
pub use reader::{Encoding, StreamReader};
pub use resolver::{CoreScalarResolver, JsonScalarResolver, ScalarResolver};
pub use scanner::Scanner;
pub use settings::{LoadSettings, DEFAULT_LABEL};
pub use token::{CommentKind, Directive, ScalarStyle, Token, TokenData, TokenKind};

/// Compose the single document of a YAML string.
///
/// # Example
///
/// ```
/// use libyamlet::compose;
///
/// let doc = compose("answer: 42").unwrap();
/// let answer = doc.get_value(doc.root(), "answer").unwrap();
/// assert_eq!(doc[answer].as_str(), Some("42"));
/// assert_eq!(doc[answer].tag, libyamlet::tags::INT);
/// ```
pub fn compose(input: &str) -> Result<Document> {
    compose_with_filename(input, None)
}

/// Compose the single document of a YAML string with a filename for error
/// messages.
pub fn compose_with_filename(input: &str, filename: Option<&str>) -> Result<Document> {
    let settings = LoadSettings::new(filename);
    Composer::from_str(input, &settings).get_single_node()
}

/// Compose every document of a YAML string, one per pull.
pub fn compose_all(input: &str) -> Composer {
    Composer::from_str(input, &LoadSettings::default())
}

/// Compose the documents of a byte stream in any supported encoding.
pub fn compose_bytes(bytes: Vec<u8>, settings: &LoadSettings) -> Composer {
    let reader = StreamReader::new(bytes, settings);
    Composer::new(Parser::new(Scanner::new(reader, settings)), settings)
}

/// Read `source` to the end and compose its documents.
pub fn compose_reader<R: Read>(source: R, settings: &LoadSettings) -> Result<Composer> {
    let reader = StreamReader::from_reader(source, settings)?;
    Ok(Composer::new(Parser::new(Scanner::new(reader, settings)), settings))
}

/// The event stream of a YAML string.
pub fn parse(input: &str) -> Parser {
    Parser::from_str(input, &LoadSettings::default())
}

/// The token stream of a YAML string.
pub fn scan(input: &str) -> Scanner {
    Scanner::from_str(input, &LoadSettings::default())
}
