//! Event payloads and the handler registry (`spec.md` §4.3, §6).
//!
//! This parser is push-based rather than pull-based: the event surface is a
//! `Handlers` struct of `Option<Box<dyn FnMut(...)>>` slots, one per event
//! name, each independently and idempotently settable.

use crate::dom::{DocTypeData, NodeId};
use crate::errors::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEvent {
    pub leading_space: String,
    pub name: String,
    pub equals: String,
    pub value: String,
    pub quote: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTagEnd {
    Close,
    SelfClose,
}

impl StartTagEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            StartTagEnd::Close => ">",
            StartTagEnd::SelfClose => "/>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub depth: usize,
    pub leading_space: String,
    pub text: String,
    pub trailing_space: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanEvent {
    pub depth: usize,
    pub content: String,
    pub terminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctypeEvent {
    pub depth: usize,
    pub doctype: DocTypeData,
    pub terminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndTagEvent {
    pub depth: usize,
    pub tag: String,
    pub inner_whitespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTagEndEvent {
    pub depth: usize,
    pub inner_whitespace: String,
    pub end: StartTagEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTagStartEvent {
    pub depth: usize,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericEvent {
    pub depth: usize,
    pub serialized: String,
}

/// Final tally handed to the `completion` event and returned from a
/// finished parse (`spec.md` §4.3 "Parse results").
#[derive(Debug, Clone)]
pub struct ParseResults {
    pub dom_root: NodeId,
    pub characters: usize,
    pub errors: usize,
    pub implicitly_closed_tags: usize,
    pub lines: usize,
    pub stopped: bool,
    pub unclosed_tags: usize,
    pub total_time: std::time::Duration,
}

type Handler<T> = Box<dyn FnMut(T) + Send>;

/// Idempotent-per-name event registry: assigning twice to the same slot
/// simply replaces the previous handler (`spec.md` §4.3 control operations).
#[derive(Default)]
pub struct Handlers {
    pub attribute: Option<Handler<AttributeEvent>>,
    pub cdata: Option<Handler<SpanEvent>>,
    pub comment: Option<Handler<SpanEvent>>,
    pub completion: Option<Handler<ParseResults>>,
    pub declaration: Option<Handler<SpanEvent>>,
    pub doctype: Option<Handler<DoctypeEvent>>,
    /// Returns `true` to abort the parse and request a restart under a new
    /// encoding (`spec.md` §4.3 "Encoding callback").
    pub encoding: Option<Box<dyn FnMut(&str, &str, bool) -> bool + Send>>,
    pub end_tag: Option<Handler<EndTagEvent>>,
    pub error: Option<Handler<ParseError>>,
    pub generic: Option<Handler<GenericEvent>>,
    pub processing: Option<Handler<SpanEvent>>,
    pub request_data: Option<Box<dyn FnMut() + Send>>,
    pub start_tag_end: Option<Handler<StartTagEndEvent>>,
    pub start_tag_start: Option<Handler<StartTagStartEvent>>,
    pub text: Option<Handler<TextEvent>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    fn fire_generic(&mut self, depth: usize, serialized: impl FnOnce() -> String) {
        if let Some(h) = &mut self.generic {
            h(GenericEvent {
                depth,
                serialized: serialized(),
            });
        }
    }

    pub fn emit_attribute(&mut self, ev: AttributeEvent) {
        if let Some(h) = &mut self.attribute {
            h(ev);
        }
    }

    pub fn emit_text(&mut self, ev: TextEvent) {
        let serialized = format!("{}{}{}", ev.leading_space, ev.text, ev.trailing_space);
        let depth = ev.depth;
        if let Some(h) = &mut self.text {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_cdata(&mut self, ev: SpanEvent) {
        let serialized = format!(
            "<![CDATA[{}{}",
            ev.content,
            if ev.terminated { "]]>" } else { "" }
        );
        let depth = ev.depth;
        if let Some(h) = &mut self.cdata {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_comment(&mut self, ev: SpanEvent) {
        let serialized = format!("<!--{}{}", ev.content, if ev.terminated { "-->" } else { "" });
        let depth = ev.depth;
        if let Some(h) = &mut self.comment {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_declaration(&mut self, ev: SpanEvent) {
        let serialized = format!("<!{}{}", ev.content, if ev.terminated { ">" } else { "" });
        let depth = ev.depth;
        if let Some(h) = &mut self.declaration {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_processing(&mut self, ev: SpanEvent) {
        let serialized = format!("<?{}{}", ev.content, if ev.terminated { ">" } else { "" });
        let depth = ev.depth;
        if let Some(h) = &mut self.processing {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_doctype(&mut self, ev: DoctypeEvent) {
        let serialized = format!("<!{}{}", ev.doctype.content, if ev.terminated { ">" } else { "" });
        let depth = ev.depth;
        if let Some(h) = &mut self.doctype {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_start_tag_start(&mut self, ev: StartTagStartEvent) {
        let serialized = format!("<{}", ev.tag);
        let depth = ev.depth;
        if let Some(h) = &mut self.start_tag_start {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_start_tag_end(&mut self, ev: StartTagEndEvent) {
        let serialized = format!("{}{}", ev.inner_whitespace, ev.end.as_str());
        let depth = ev.depth;
        if let Some(h) = &mut self.start_tag_end {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_end_tag(&mut self, ev: EndTagEvent) {
        let serialized = format!("</{}{}>", ev.tag, ev.inner_whitespace);
        let depth = ev.depth;
        if let Some(h) = &mut self.end_tag {
            h(ev);
        } else {
            self.fire_generic(depth, || serialized);
        }
    }

    pub fn emit_error(&mut self, err: ParseError) {
        if let Some(h) = &mut self.error {
            h(err);
        }
    }

    pub fn emit_request_data(&mut self) {
        if let Some(h) = &mut self.request_data {
            h();
        }
    }

    pub fn emit_completion(&mut self, results: ParseResults) {
        if let Some(h) = &mut self.completion {
            h(results);
        }
    }

    /// Returns `Some(true)` if the document should abort for a restart.
    pub fn emit_encoding(&mut self, name: &str, normalized: &str, explicit: bool) -> bool {
        if let Some(h) = &mut self.encoding {
            h(name, normalized, explicit)
        } else {
            false
        }
    }
}
