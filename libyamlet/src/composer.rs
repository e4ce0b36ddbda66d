//! Stage 3: Composer
//!
//! The composer turns the events of each document into a node graph. It
//! walks the events with a stack of open collections, keeps an anchor table per document
//! and resolves aliases to the `NodeId` of their anchor. A collection is
//! registered under its anchor before its children are composed, so a child
//! may refer back to it and form a cycle.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{Result, YamlError};
use crate::event::{Event, EventData, EventKind};
use crate::mark::Mark;
use crate::node::{tags, Document, Node, NodeId, NodeKind};
use crate::parser::Parser;
use crate::resolver::{CoreScalarResolver, ScalarResolver};
use crate::settings::LoadSettings;

/// Pull-based document producer over a [`Parser`].
pub struct Composer<R: ScalarResolver = CoreScalarResolver> {
    parser: Parser,
    resolver: R,
    max_aliases_for_collections: usize,
    allow_recursive_keys: bool,
    failed: Option<YamlError>,
    last_mark: Mark,
    // Per-document state.
    nodes: Vec<Node>,
    anchors: HashMap<String, NodeId>,
    /// Collections whose children are still being composed.
    open: HashSet<NodeId>,
    collection_aliases: usize,
}

impl Composer<CoreScalarResolver> {
    pub fn new(parser: Parser, settings: &LoadSettings) -> Self {
        Self::with_resolver(parser, CoreScalarResolver, settings)
    }

    pub fn from_str(input: &str, settings: &LoadSettings) -> Self {
        Self::new(Parser::from_str(input, settings), settings)
    }
}

impl<R: ScalarResolver> Composer<R> {
    pub fn with_resolver(parser: Parser, resolver: R, settings: &LoadSettings) -> Self {
        Self {
            parser,
            resolver,
            max_aliases_for_collections: settings.max_aliases_for_collections,
            allow_recursive_keys: settings.allow_recursive_keys,
            failed: None,
            last_mark: Mark::default(),
            nodes: Vec::new(),
            anchors: HashMap::new(),
            open: HashSet::new(),
            collection_aliases: 0,
        }
    }

    /// Whether another document is available.
    pub fn has_node(&mut self) -> Result<bool> {
        self.guarded(|c| c.check_document())
    }

    /// Compose the next document; `None` at the end of the stream.
    pub fn get_node(&mut self) -> Result<Option<Document>> {
        self.guarded(|c| {
            if !c.check_document()? {
                c.skip_event(EventKind::StreamEnd)?;
                return Ok(None);
            }
            c.compose_document().map(Some)
        })
    }

    /// Compose the only document of the stream. A stream with no document
    /// or with more than one is an error.
    pub fn get_single_node(&mut self) -> Result<Document> {
        self.guarded(|c| {
            let document = if c.check_document()? {
                Some(c.compose_document()?)
            } else {
                None
            };
            let next = c.parser.peek_event()?.map(|e| (e.kind(), e.start_mark));
            if let Some((kind, mark)) = next {
                if kind != EventKind::StreamEnd {
                    return Err(YamlError::Parse(c.parser.marked_error(
                        Some(("expected a single document in the stream", c.last_mark)),
                        "but found another document",
                        mark,
                    )));
                }
            }
            c.skip_event(EventKind::StreamEnd)?;
            document.ok_or_else(|| {
                YamlError::Parse(c.parser.marked_error(
                    None,
                    "expected a single document in the stream, but found none",
                    c.last_mark,
                ))
            })
        })
    }

    /// Run `step`; a failure poisons the composer.
    fn guarded<T>(&mut self, step: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        let result = step(self);
        if let Err(err) = &result {
            self.failed = Some(err.clone());
        }
        result
    }

    fn error(&self, context: Option<(&str, Mark)>, problem: impl Into<String>, mark: Mark) -> YamlError {
        YamlError::Compose(self.parser.marked_error(context, problem, mark))
    }

    /// Skip StreamStart and report whether a document follows.
    fn check_document(&mut self) -> Result<bool> {
        if self.parser.check_event(&[EventKind::StreamStart])? {
            self.next_event()?;
        }
        Ok(self.parser.has_next()? && !self.parser.check_event(&[EventKind::StreamEnd])?)
    }

    fn next_event(&mut self) -> Result<Event> {
        match self.parser.get_event()? {
            Some(event) => {
                self.last_mark = event.end_mark;
                Ok(event)
            }
            None => Err(self.error(None, "unexpected end of the event stream", self.last_mark)),
        }
    }

    /// Consume an event of the given kind, if it is next.
    fn skip_event(&mut self, kind: EventKind) -> Result<()> {
        if self.parser.check_event(&[kind])? {
            self.next_event()?;
        }
        Ok(())
    }

    fn expect_event(&mut self, kind: EventKind, context: &str) -> Result<Event> {
        let event = self.next_event()?;
        if event.kind() != kind {
            return Err(self.error(
                Some((context, event.start_mark)),
                format!("expected {:?}, but found {:?}", kind, event.kind()),
                event.start_mark,
            ));
        }
        Ok(event)
    }

    fn compose_document(&mut self) -> Result<Document> {
        let start = self.expect_event(EventKind::DocumentStart, "while composing a document")?;
        self.anchors.clear();
        self.open.clear();
        self.collection_aliases = 0;

        let root = self.compose_node()?;
        self.expect_event(EventKind::DocumentEnd, "while composing a document")?;

        debug!(line = start.start_mark.line, nodes = self.nodes.len(), "document composed");
        Ok(Document::new(std::mem::take(&mut self.nodes), root))
    }

    /// Compose one node and everything under it. Open collections live on
    /// an explicit stack, so nesting depth costs heap and not native stack.
    fn compose_node(&mut self) -> Result<NodeId> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let closing = match stack.last() {
                Some(frame) => self.parser.check_event(&[frame.end_kind()])?,
                None => false,
            };
            let finished = if closing { stack.pop() } else { None };
            let id = match finished {
                Some(frame) => {
                    let end = self.next_event()?;
                    self.close(frame, end.end_mark)
                }
                None => match self.begin_node()? {
                    Begun::Complete(id) => id,
                    Begun::Open(frame) => {
                        stack.push(frame);
                        continue;
                    }
                },
            };

            match stack.last_mut() {
                None => return Ok(id),
                Some(Frame::Sequence { items, .. }) => items.push(id),
                Some(Frame::Mapping {
                    start_mark,
                    pairs,
                    key,
                    ..
                }) => match key.take() {
                    Some(k) => pairs.push((k, id)),
                    None => {
                        if self.nodes[id.0].recursive && !self.allow_recursive_keys {
                            return Err(self.error(
                                Some(("while composing a mapping", *start_mark)),
                                "Recursive key for mapping is detected but it is not configured to be allowed.",
                                self.nodes[id.0].start_mark,
                            ));
                        }
                        *key = Some(id);
                    }
                },
            }
        }
    }

    /// Consume the event that starts a node. Scalars and aliases are
    /// complete at once; collections stay open until their end event.
    fn begin_node(&mut self) -> Result<Begun> {
        let event = self.next_event()?;
        let (start_mark, end_mark) = (event.start_mark, event.end_mark);
        match event.data {
            EventData::Alias { anchor } => self.compose_alias(&anchor, start_mark).map(Begun::Complete),
            EventData::Scalar {
                anchor,
                tag,
                implicit,
                value,
                style,
            } => {
                let tag = match tag.as_deref() {
                    None => self.resolver.resolve(&value, implicit.plain),
                    Some("!") => tags::STR.to_string(),
                    Some(tag) => tag.to_string(),
                };
                let id = self.push(Node {
                    tag,
                    kind: NodeKind::Scalar { value, style },
                    start_mark,
                    end_mark,
                    recursive: false,
                });
                self.register_anchor(anchor, id);
                Ok(Begun::Complete(id))
            }
            EventData::SequenceStart {
                anchor,
                tag,
                flow_style,
                ..
            } => {
                let id = self.open_collection(
                    anchor,
                    collection_tag(tag, tags::SEQ),
                    NodeKind::Sequence {
                        items: Vec::new(),
                        flow_style,
                    },
                    start_mark,
                );
                Ok(Begun::Open(Frame::Sequence { id, items: Vec::new() }))
            }
            EventData::MappingStart {
                anchor,
                tag,
                flow_style,
                ..
            } => {
                let id = self.open_collection(
                    anchor,
                    collection_tag(tag, tags::MAP),
                    NodeKind::Mapping {
                        pairs: Vec::new(),
                        flow_style,
                    },
                    start_mark,
                );
                Ok(Begun::Open(Frame::Mapping {
                    id,
                    start_mark,
                    pairs: Vec::new(),
                    key: None,
                }))
            }
            other => Err(self.error(
                Some(("while composing a node", start_mark)),
                format!("expected a node, but found {:?}", other.kind()),
                start_mark,
            )),
        }
    }

    fn compose_alias(&mut self, anchor: &str, mark: Mark) -> Result<NodeId> {
        let Some(&id) = self.anchors.get(anchor) else {
            return Err(self.error(None, format!("found undefined alias {}", anchor), mark));
        };
        if !self.nodes[id.0].is_scalar() {
            self.collection_aliases += 1;
            if self.collection_aliases > self.max_aliases_for_collections {
                return Err(self.error(
                    None,
                    format!(
                        "Number of aliases for non-scalar nodes exceeds the specified max={}",
                        self.max_aliases_for_collections
                    ),
                    mark,
                ));
            }
        }
        if self.open.contains(&id) {
            self.nodes[id.0].recursive = true;
        }
        Ok(id)
    }

    /// Push a collection node and register its anchor before any child is
    /// composed, so children may alias it.
    fn open_collection(&mut self, anchor: Option<String>, tag: String, kind: NodeKind, start_mark: Mark) -> NodeId {
        let id = self.push(Node {
            tag,
            kind,
            start_mark,
            end_mark: start_mark,
            recursive: false,
        });
        self.register_anchor(anchor, id);
        self.open.insert(id);
        id
    }

    /// Move the children gathered in `frame` into its node.
    fn close(&mut self, frame: Frame, end_mark: Mark) -> NodeId {
        let id = frame.id();
        self.open.remove(&id);
        let node = &mut self.nodes[id.0];
        node.end_mark = end_mark;
        match (frame, &mut node.kind) {
            (Frame::Sequence { items: children, .. }, NodeKind::Sequence { items, .. }) => *items = children,
            (Frame::Mapping { pairs: entries, .. }, NodeKind::Mapping { pairs, .. }) => *pairs = entries,
            _ => {}
        }
        id
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn register_anchor(&mut self, anchor: Option<String>, id: NodeId) {
        let Some(anchor) = anchor else {
            return;
        };
        if let Some(previous) = self.anchors.insert(anchor.clone(), id) {
            debug!(anchor = %anchor, previous = previous.index(), current = id.index(), "anchor redefined");
        }
    }
}

/// A collection whose children are still being composed.
enum Frame {
    Sequence {
        id: NodeId,
        items: Vec<NodeId>,
    },
    Mapping {
        id: NodeId,
        start_mark: Mark,
        pairs: Vec<(NodeId, NodeId)>,
        /// A composed key still waiting for its value.
        key: Option<NodeId>,
    },
}

impl Frame {
    fn id(&self) -> NodeId {
        match self {
            Frame::Sequence { id, .. } | Frame::Mapping { id, .. } => *id,
        }
    }

    fn end_kind(&self) -> EventKind {
        match self {
            Frame::Sequence { .. } => EventKind::SequenceEnd,
            Frame::Mapping { .. } => EventKind::MappingEnd,
        }
    }
}

enum Begun {
    Complete(NodeId),
    Open(Frame),
}

/// Collections without a specific tag get the standard one.
fn collection_tag(tag: Option<String>, default: &str) -> String {
    match tag {
        Some(tag) if tag != "!" => tag,
        _ => default.to_string(),
    }
}

impl<R: ScalarResolver> Iterator for Composer<R> {
    type Item = Result<Document>;

    /// Yields every document, or the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed.is_some() {
            return None;
        }
        self.get_node().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::JsonScalarResolver;

    fn compose(input: &str) -> Result<Document> {
        Composer::from_str(input, &LoadSettings::default()).get_single_node()
    }

    fn compose_with(input: &str, settings: LoadSettings) -> Result<Document> {
        Composer::from_str(input, &settings).get_single_node()
    }

    #[test]
    fn test_alias_is_the_same_node() {
        let doc = compose("a: &x 1\nb: *x\n").unwrap();
        let a = doc.get_value(doc.root(), "a").unwrap();
        let b = doc.get_value(doc.root(), "b").unwrap();
        assert_eq!(a, b);
        assert_eq!(doc[a].as_str(), Some("1"));
    }

    #[test]
    fn test_undefined_alias() {
        let err = compose("*missing").unwrap_err();
        assert!(matches!(err, YamlError::Compose(_)));
        assert!(err.to_string().contains("found undefined alias missing"));
    }

    #[test]
    fn test_self_referencing_sequence() {
        let doc = compose("&a [*a]").unwrap();
        let root = doc.root();
        assert_eq!(doc[root].items(), Some(&[root][..]));
        assert!(doc[root].recursive);
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_recursive_key() {
        let err = compose("&a {*a : 1}").unwrap_err();
        assert!(matches!(err, YamlError::Compose(_)));
        assert!(err.to_string().contains("Recursive key for mapping is detected"));

        let doc = compose_with("&a {*a : 1}", LoadSettings::default().with_allow_recursive_keys(true)).unwrap();
        let root = doc.root();
        assert_eq!(doc[root].pairs().unwrap()[0].0, root);
    }

    #[test]
    fn test_collection_alias_limit() {
        let input = "a: &x [1]\nb: [*x, *x, *x]\n";
        let settings = LoadSettings::default().with_max_aliases_for_collections(2);
        let err = compose_with(input, settings).unwrap_err();
        assert!(err
            .to_string()
            .contains("Number of aliases for non-scalar nodes exceeds the specified max=2"));
        assert!(compose_with(input, LoadSettings::default().with_max_aliases_for_collections(3)).is_ok());
        // Scalar aliases are free.
        let scalars = "a: &s v\nb: [*s, *s, *s, *s]\n";
        assert!(compose_with(scalars, LoadSettings::default().with_max_aliases_for_collections(0)).is_ok());
    }

    #[test]
    fn test_duplicate_anchor_last_wins() {
        let doc = compose("- &a first\n- &a second\n- *a\n").unwrap();
        let items = doc.root_node().items().unwrap();
        assert_eq!(items[2], items[1]);
        assert_eq!(doc[items[2]].as_str(), Some("second"));
    }

    #[test]
    fn test_anchors_do_not_cross_documents() {
        let mut composer = Composer::from_str("--- &a 1\n--- *a\n", &LoadSettings::default());
        assert!(composer.get_node().unwrap().is_some());
        let err = composer.get_node().unwrap_err();
        assert!(matches!(err, YamlError::Compose(_)));
        assert_eq!(composer.get_node().unwrap_err(), err);
    }

    #[test]
    fn test_documents_one_by_one() {
        let mut composer = Composer::from_str("--- a\n--- [b]\n", &LoadSettings::default());
        assert!(composer.has_node().unwrap());
        let first = composer.get_node().unwrap().unwrap();
        assert_eq!(first.root_node().as_str(), Some("a"));
        let second = composer.get_node().unwrap().unwrap();
        assert_eq!(second.root_node().tag, tags::SEQ);
        assert!(!composer.has_node().unwrap());
        assert!(composer.get_node().unwrap().is_none());
    }

    #[test]
    fn test_single_node_errors() {
        let err = compose("--- a\n--- b\n").unwrap_err();
        assert!(matches!(err, YamlError::Parse(_)));
        assert!(err.to_string().contains("expected a single document in the stream"));
        let err = compose("").unwrap_err();
        assert!(matches!(err, YamlError::Parse(_)));
        assert!(err.to_string().contains("but found none"));
    }

    #[test]
    fn test_tag_resolution() {
        let doc = compose("- 1\n- '1'\n- !!str 2\n- ! 3\n- !custom x\n- ~\n- [a]\n- {a: b}\n- !!map {}\n").unwrap();
        let resolved: Vec<&str> = doc
            .root_node()
            .items()
            .unwrap()
            .iter()
            .map(|id| doc[*id].tag.as_str())
            .collect();
        assert_eq!(
            resolved,
            vec![tags::INT, tags::STR, tags::STR, tags::STR, "!custom", tags::NULL, tags::SEQ, tags::MAP, tags::MAP]
        );
    }

    #[test]
    fn test_json_resolver() {
        let parser = Parser::from_str("[True, true, null, ~]", &LoadSettings::default());
        let mut composer = Composer::with_resolver(parser, JsonScalarResolver, &LoadSettings::default());
        let doc = composer.get_single_node().unwrap();
        let resolved: Vec<&str> = doc
            .root_node()
            .items()
            .unwrap()
            .iter()
            .map(|id| doc[*id].tag.as_str())
            .collect();
        assert_eq!(resolved, vec![tags::STR, tags::BOOL, tags::NULL, tags::STR]);
    }

    #[test]
    fn test_duplicate_keys_are_kept() {
        let doc = compose("a: 1\na: 2\n").unwrap();
        assert_eq!(doc.root_node().pairs().unwrap().len(), 2);
        assert_eq!(doc[doc.get_value(doc.root(), "a").unwrap()].as_str(), Some("1"));
    }

    #[test]
    fn test_empty_document_is_null() {
        let doc = compose("---\n").unwrap();
        assert_eq!(doc.root_node().as_str(), Some(""));
        assert_eq!(doc.root_node().tag, tags::NULL);
    }

    #[test]
    fn test_node_marks() {
        let doc = compose("key: [a, b]\n").unwrap();
        let seq = doc.get_value(doc.root(), "key").unwrap();
        assert_eq!(doc[seq].start_mark, Mark::new(5, 0, 5));
        assert_eq!(doc[seq].end_mark, Mark::new(11, 0, 11));
    }

    #[test]
    fn test_deep_nesting_does_not_exhaust_the_stack() {
        let depth = 10_000;
        let input = "[".repeat(depth) + &"]".repeat(depth);
        let doc = compose(&input).unwrap();
        assert_eq!(doc.len(), depth);
        let mut id = doc.root();
        let mut levels = 1;
        while let Some([child]) = doc[id].items() {
            id = *child;
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert_eq!(doc[id].items(), Some(&[][..]));

        let mapping = "{a: ".repeat(depth) + "x" + &"}".repeat(depth);
        let doc = compose(&mapping).unwrap();
        assert_eq!(doc.len(), 2 * depth + 1);
    }

    #[test]
    fn test_block_nesting() {
        let doc = compose("a:\n  - b:\n      - c\n  - d\n").unwrap();
        let a = doc.get_value(doc.root(), "a").unwrap();
        let items = doc[a].items().unwrap();
        assert_eq!(items.len(), 2);
        let b = doc.get_value(items[0], "b").unwrap();
        assert_eq!(doc[doc[b].items().unwrap()[0]].as_str(), Some("c"));
        assert_eq!(doc[items[1]].as_str(), Some("d"));
    }

    #[test]
    fn test_iterator() {
        let docs: Vec<Document> = Composer::from_str("1\n---\n2\n---\n3\n", &LoadSettings::default())
            .collect::<Result<_>>()
            .unwrap();
        let values: Vec<_> = docs.iter().map(|d| d.root_node().as_str().unwrap().to_string()).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
    }
}
