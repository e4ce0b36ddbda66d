//! Parse events and their test-suite notation.

use std::fmt;

use crate::mark::Mark;
use crate::token::ScalarStyle;

/// Whether a collection was written in flow (`[]`, `{}`) or block style.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowStyle {
    Flow,
    Block,
}

/// Tag omission flags of a scalar.
///
/// `plain` is set when the tag may be omitted because plain-scalar
/// resolution would find it, `non_plain` when it may be omitted for the
/// other styles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImplicitTuple {
    pub plain: bool,
    pub non_plain: bool,
}

impl ImplicitTuple {
    pub fn new(plain: bool, non_plain: bool) -> Self {
        Self { plain, non_plain }
    }
}

/// `%YAML major.minor`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecVersion {
    pub major: u32,
    pub minor: u32,
}

/// Discriminant of an event, used for lookahead checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    StreamStart,
    StreamEnd,
    DocumentStart,
    DocumentEnd,
    Alias,
    Scalar,
    SequenceStart,
    SequenceEnd,
    MappingStart,
    MappingEnd,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventData {
    StreamStart,
    StreamEnd,
    DocumentStart {
        explicit: bool,
        version: Option<SpecVersion>,
        /// `%TAG` handles declared for this document, in source order.
        tags: Vec<(String, String)>,
    },
    DocumentEnd {
        explicit: bool,
    },
    Alias {
        anchor: String,
    },
    Scalar {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: ImplicitTuple,
        value: String,
        style: ScalarStyle,
    },
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        flow_style: FlowStyle,
    },
    SequenceEnd,
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        flow_style: FlowStyle,
    },
    MappingEnd,
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::StreamStart => EventKind::StreamStart,
            EventData::StreamEnd => EventKind::StreamEnd,
            EventData::DocumentStart { .. } => EventKind::DocumentStart,
            EventData::DocumentEnd { .. } => EventKind::DocumentEnd,
            EventData::Alias { .. } => EventKind::Alias,
            EventData::Scalar { .. } => EventKind::Scalar,
            EventData::SequenceStart { .. } => EventKind::SequenceStart,
            EventData::SequenceEnd => EventKind::SequenceEnd,
            EventData::MappingStart { .. } => EventKind::MappingStart,
            EventData::MappingEnd => EventKind::MappingEnd,
        }
    }
}

/// A parse event with its source range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub data: EventData,
    pub start_mark: Mark,
    pub end_mark: Mark,
}

impl Event {
    pub fn new(data: EventData, start_mark: Mark, end_mark: Mark) -> Self {
        Self {
            data,
            start_mark,
            end_mark,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }
}

fn write_properties(f: &mut fmt::Formatter<'_>, anchor: &Option<String>, tag: &Option<String>) -> fmt::Result {
    if let Some(anchor) = anchor {
        write!(f, " &{}", anchor)?;
    }
    if let Some(tag) = tag {
        write!(f, " <{}>", tag)?;
    }
    Ok(())
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\0' => f.write_str("\\0")?,
            '\x08' => f.write_str("\\b")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    Ok(())
}

/// One line of yaml-test-suite event notation.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            EventData::StreamStart => f.write_str("+STR"),
            EventData::StreamEnd => f.write_str("-STR"),
            EventData::DocumentStart { explicit, .. } => {
                f.write_str(if *explicit { "+DOC ---" } else { "+DOC" })
            }
            EventData::DocumentEnd { explicit } => {
                f.write_str(if *explicit { "-DOC ..." } else { "-DOC" })
            }
            EventData::Alias { anchor } => write!(f, "=ALI *{}", anchor),
            EventData::Scalar {
                anchor,
                tag,
                value,
                style,
                ..
            } => {
                f.write_str("=VAL")?;
                write_properties(f, anchor, tag)?;
                write!(f, " {}", style.indicator())?;
                write_escaped(f, value)
            }
            EventData::SequenceStart {
                anchor,
                tag,
                flow_style,
                ..
            } => {
                f.write_str("+SEQ")?;
                if *flow_style == FlowStyle::Flow {
                    f.write_str(" []")?;
                }
                write_properties(f, anchor, tag)
            }
            EventData::SequenceEnd => f.write_str("-SEQ"),
            EventData::MappingStart {
                anchor,
                tag,
                flow_style,
                ..
            } => {
                f.write_str("+MAP")?;
                if *flow_style == FlowStyle::Flow {
                    f.write_str(" {}")?;
                }
                write_properties(f, anchor, tag)
            }
            EventData::MappingEnd => f.write_str("-MAP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: EventData) -> Event {
        Event::new(data, Mark::default(), Mark::default())
    }

    #[test]
    fn test_stream_and_document_notation() {
        assert_eq!(event(EventData::StreamStart).to_string(), "+STR");
        assert_eq!(
            event(EventData::DocumentStart {
                explicit: true,
                version: None,
                tags: vec![]
            })
            .to_string(),
            "+DOC ---"
        );
        assert_eq!(event(EventData::DocumentEnd { explicit: false }).to_string(), "-DOC");
    }

    #[test]
    fn test_scalar_notation_escapes() {
        let scalar = event(EventData::Scalar {
            anchor: Some("a".to_string()),
            tag: Some("tag:yaml.org,2002:str".to_string()),
            implicit: ImplicitTuple::new(false, false),
            value: "x\ny\\z\t".to_string(),
            style: ScalarStyle::DoubleQuoted,
        });
        assert_eq!(scalar.to_string(), "=VAL &a <tag:yaml.org,2002:str> \"x\\ny\\\\z\\t");
    }

    #[test]
    fn test_collection_notation() {
        let seq = event(EventData::SequenceStart {
            anchor: None,
            tag: None,
            implicit: true,
            flow_style: FlowStyle::Flow,
        });
        assert_eq!(seq.to_string(), "+SEQ []");
        let map = event(EventData::MappingStart {
            anchor: Some("m".to_string()),
            tag: None,
            implicit: true,
            flow_style: FlowStyle::Block,
        });
        assert_eq!(map.to_string(), "+MAP &m");
        assert_eq!(event(EventData::Alias { anchor: "m".to_string() }).to_string(), "=ALI *m");
    }
}
