//! DOM model (`spec.md` §3, §4.4).
//!
//! Nodes live in a flat arena (`Dom`) addressed by `NodeId`; parents are
//! non-owning back-references and children are owning index lists. This
//! gives the "open-stack ownership" shape called for in `spec.md` §9
//! ("indices into an arena or parent-id pointers... cycles are impossible
//! because the tree is constructed strictly downward") without reaching for
//! `Rc<RefCell<_>>`.

use std::fmt;

pub type NodeId = usize;
pub const ROOT: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureState {
    Unclosed,
    SelfClosed,
    VoidClosed,
    ExplicitlyClosed,
    ImplicitlyClosed,
}

#[derive(Debug, Clone, Default)]
pub struct Quote {
    pub open: String,
    pub close: String,
}

impl Quote {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn double() -> Self {
        Self {
            open: "\"".into(),
            close: "\"".into(),
        }
    }

    pub fn single() -> Self {
        Self {
            open: "'".into(),
            close: "'".into(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.open.is_empty() && self.close.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub leading_space: String,
    pub name: String,
    pub equals: String,
    pub value: String,
    pub quote: Quote,
}

impl Attribute {
    pub fn serialize(&self) -> String {
        format!(
            "{}{}{}{}{}{}",
            self.leading_space, self.name, self.equals, self.quote.open, self.value, self.quote.close
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctypeKind {
    Html,
    Xhtml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctypeVariety {
    Frameset,
    Strict,
    Transitional,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTypeData {
    pub content: String,
    pub doctype_kind: DoctypeKind,
    pub variety: DoctypeVariety,
    pub version: String,
}

#[derive(Debug, Clone, Default)]
pub struct TextData {
    pub content: String,
    /// Whether the source run contained an `&` that could start an entity.
    pub possible_entities: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RawSpan {
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ElementData {
    /// Tag name as written in source.
    pub tag: String,
    /// Lowercase alias (equal to `tag` in XML mode, per invariant 4).
    pub tag_lc: String,
    pub attributes: Vec<Attribute>,
    /// Whitespace between the last attribute and the start-tag terminator.
    pub inner_whitespace: String,
    /// Literal bytes that closed the start tag: `">"`, `"/>"`, or, for a
    /// malformed tag, whatever text actually appeared there.
    pub terminator: String,
    pub closure_state: ClosureState,
    pub end_tag_text: Option<String>,
    pub end_tag_line: Option<usize>,
    pub end_tag_column: Option<usize>,
    /// Exact offending character if the start tag ended abnormally.
    pub bad_terminator: Option<char>,
    /// True if this element was inserted by the parser (table/section
    /// normalization) rather than read from source.
    pub synthetic: bool,
}

impl ElementData {
    /// Mirrors `valuesByName[name]`: derived from `attributes` on demand
    /// rather than stored redundantly, so invariant 5 holds by construction
    /// instead of by careful bookkeeping in two places.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    Text(TextData),
    CData(RawSpan),
    Comment(RawSpan),
    Declaration(RawSpan),
    DocType(DocTypeData),
    ProcessingInstruction(RawSpan),
    UnmatchedClosingTag(RawSpan),
    Element(ElementData),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub line: usize,
    pub column: usize,
    pub terminated: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    fn new(line: usize, column: usize, parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            line,
            column,
            terminated: true,
            parent,
            children: Vec::new(),
            kind,
        }
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// A document tree. Node 0 is always the synthetic `Root`.
pub struct Dom {
    nodes: Vec<Node>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(1, 0, None, NodeKind::Root)],
        }
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Inserts `kind` as a new last child of `parent`, returning its id.
    pub fn push_child(&mut self, parent: NodeId, line: usize, column: usize, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(line, column, Some(parent), kind));
        self.nodes[parent].children.push(id);
        id
    }

    /// Depth: number of non-synthetic ancestors minus one (invariant 6).
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0usize;
        let mut cur = self.nodes[id].parent;
        while let Some(p) = cur {
            if p != ROOT {
                let is_synthetic = matches!(&self.nodes[p].kind, NodeKind::Element(e) if e.synthetic);
                if !is_synthetic {
                    depth += 1;
                }
            }
            cur = self.nodes[p].parent;
        }
        depth
    }

    /// Synthetic depth: counts all ancestors, synthetic or not.
    pub fn synthetic_depth(&self, id: NodeId) -> usize {
        let mut depth = 0usize;
        let mut cur = self.nodes[id].parent;
        while let Some(p) = cur {
            depth += 1;
            cur = self.nodes[p].parent;
        }
        depth
    }

    /// Serializes the subtree rooted at `id` byte-for-byte as it appeared
    /// in source (invariant 1), skipping synthetic elements unless
    /// `instantiate_synthetic` has already converted them to real ones.
    pub fn serialize(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(id, &mut out);
        out
    }

    fn serialize_into(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Root => {
                for &child in &node.children {
                    self.serialize_into(child, out);
                }
            }
            NodeKind::Text(t) => out.push_str(&t.content),
            NodeKind::CData(r) => {
                out.push_str("<![CDATA[");
                out.push_str(&r.content);
                if node.terminated {
                    out.push_str("]]>");
                }
            }
            NodeKind::Comment(r) => {
                out.push_str("<!--");
                out.push_str(&r.content);
                if node.terminated {
                    out.push_str("-->");
                }
            }
            NodeKind::Declaration(r) => {
                out.push_str("<!");
                out.push_str(&r.content);
                if node.terminated {
                    out.push('>');
                }
            }
            NodeKind::DocType(d) => {
                out.push_str("<!");
                out.push_str(&d.content);
                if node.terminated {
                    out.push('>');
                }
            }
            NodeKind::ProcessingInstruction(r) => {
                out.push_str("<?");
                out.push_str(&r.content);
                if node.terminated {
                    out.push('>');
                }
            }
            NodeKind::UnmatchedClosingTag(r) => out.push_str(&r.content),
            NodeKind::Element(e) => {
                if e.synthetic {
                    for &child in &node.children {
                        self.serialize_into(child, out);
                    }
                    return;
                }
                out.push('<');
                out.push_str(&e.tag);
                for attr in &e.attributes {
                    out.push_str(&attr.serialize());
                }
                out.push_str(&e.inner_whitespace);
                if let Some(bad) = e.bad_terminator {
                    out.push(bad);
                } else {
                    out.push_str(&e.terminator);
                }
                for &child in &node.children {
                    self.serialize_into(child, out);
                }
                if let Some(end) = &e.end_tag_text {
                    out.push_str(end);
                }
            }
        }
    }

    /// Structured dump mirroring `element.toJSON()` (`spec.md` §6).
    pub fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        let node = &self.nodes[id];
        let (tag, synthetic, bad_terminator, closure_state, values, end_tag_text) = match &node.kind {
            NodeKind::Element(e) => (
                e.tag.clone(),
                Some(e.synthetic),
                e.bad_terminator,
                Some(e.closure_state),
                e.attributes
                    .iter()
                    .map(|a| (a.name.clone(), a.value.clone()))
                    .collect(),
                e.end_tag_text.clone(),
            ),
            NodeKind::Root => ("/".to_string(), None, None, None, Vec::new(), None),
            _ => (node_kind_label(&node.kind).to_string(), None, None, None, Vec::new(), None),
        };
        let parent_tag = node.parent.map(|p| match &self.nodes[p].kind {
            NodeKind::Element(e) => e.tag.clone(),
            NodeKind::Root => "/".to_string(),
            other => node_kind_label(other).to_string(),
        });
        NodeSnapshot {
            tag,
            line: node.line,
            column: node.column,
            synthetic,
            bad_terminator,
            depth: self.depth(id),
            synthetic_depth: if id == ROOT { None } else { Some(self.synthetic_depth(id)) },
            closure_state,
            values,
            parent_tag,
            children: node.children.iter().map(|&c| self.snapshot(c)).collect(),
            end_tag_text,
        }
    }

    /// `"tag"`, `"#id"`, `".class"`, `"tag.class"`, or `"*"`.
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_matches(root, selector, &mut out);
        out
    }

    pub fn query_selector(&self, root: NodeId, selector: &str) -> Option<NodeId> {
        self.query_selector_all(root, selector).into_iter().next()
    }

    fn collect_matches(&self, id: NodeId, selector: &str, out: &mut Vec<NodeId>) {
        let node = &self.nodes[id];
        if id != ROOT && self.matches(node, selector) {
            out.push(id);
        }
        for &child in &node.children {
            self.collect_matches(child, selector, out);
        }
    }

    fn matches(&self, node: &Node, selector: &str) -> bool {
        let Some(e) = node.as_element() else { return false };
        if selector == "*" {
            return true;
        }
        if let Some(id) = selector.strip_prefix('#') {
            return e.value_of("id") == Some(id);
        }
        if let Some(class) = selector.strip_prefix('.') {
            return has_class(e, class);
        }
        if let Some((tag, class)) = selector.split_once('.') {
            return e.tag_lc.eq_ignore_ascii_case(tag) && has_class(e, class);
        }
        e.tag_lc.eq_ignore_ascii_case(selector)
    }
}

fn has_class(e: &ElementData, class: &str) -> bool {
    e.value_of("class")
        .map(|v| v.split_whitespace().any(|tok| tok == class))
        .unwrap_or(false)
}

fn node_kind_label(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Root => "#root",
        NodeKind::Text(_) => "#text",
        NodeKind::CData(_) => "#cdata",
        NodeKind::Comment(_) => "#comment",
        NodeKind::Declaration(_) => "#declaration",
        NodeKind::DocType(_) => "#doctype",
        NodeKind::ProcessingInstruction(_) => "#processing-instruction",
        NodeKind::UnmatchedClosingTag(_) => "#unmatched-closing-tag",
        NodeKind::Element(_) => "#element",
    }
}

#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub tag: String,
    pub line: usize,
    pub column: usize,
    pub synthetic: Option<bool>,
    pub bad_terminator: Option<char>,
    pub depth: usize,
    pub synthetic_depth: Option<usize>,
    pub closure_state: Option<ClosureState>,
    pub values: Vec<(String, String)>,
    pub parent_tag: Option<String>,
    pub children: Vec<NodeSnapshot>,
    pub end_tag_text: Option<String>,
}

impl fmt::Display for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize(ROOT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_text(dom: &mut Dom, parent: NodeId, s: &str) -> NodeId {
        dom.push_child(
            parent,
            1,
            0,
            NodeKind::Text(TextData {
                content: s.to_string(),
                possible_entities: s.contains('&'),
            }),
        )
    }

    #[test]
    fn root_serializes_children_in_order() {
        let mut dom = Dom::new();
        push_text(&mut dom, ROOT, "a");
        push_text(&mut dom, ROOT, "b");
        assert_eq!(dom.serialize(ROOT), "ab");
    }

    #[test]
    fn element_roundtrips_attributes_and_terminator() {
        let mut dom = Dom::new();
        let el = dom.push_child(
            ROOT,
            1,
            0,
            NodeKind::Element(ElementData {
                tag: "img".into(),
                tag_lc: "img".into(),
                attributes: vec![Attribute {
                    leading_space: " ".into(),
                    name: "src".into(),
                    equals: "=".into(),
                    value: "/foo.jpg".into(),
                    quote: Quote::double(),
                }],
                inner_whitespace: String::new(),
                terminator: "/>".into(),
                closure_state: ClosureState::SelfClosed,
                end_tag_text: None,
                end_tag_line: None,
                end_tag_column: None,
                bad_terminator: None,
                synthetic: false,
            }),
        );
        assert_eq!(dom.serialize(el), "<img src=\"/foo.jpg\"/>");
    }

    #[test]
    fn synthetic_element_is_transparent_to_serialize() {
        let mut dom = Dom::new();
        let synth = dom.push_child(
            ROOT,
            1,
            0,
            NodeKind::Element(ElementData {
                tag: "tbody".into(),
                tag_lc: "tbody".into(),
                attributes: vec![],
                inner_whitespace: String::new(),
                terminator: ">".into(),
                closure_state: ClosureState::ImplicitlyClosed,
                end_tag_text: None,
                end_tag_line: None,
                end_tag_column: None,
                bad_terminator: None,
                synthetic: true,
            }),
        );
        push_text(&mut dom, synth, "row");
        assert_eq!(dom.serialize(ROOT), "row");
    }

    #[test]
    fn query_selector_matches_tag_class_and_id() {
        let mut dom = Dom::new();
        dom.push_child(
            ROOT,
            1,
            0,
            NodeKind::Element(ElementData {
                tag: "div".into(),
                tag_lc: "div".into(),
                attributes: vec![
                    Attribute {
                        leading_space: " ".into(),
                        name: "id".into(),
                        equals: "=".into(),
                        value: "main".into(),
                        quote: Quote::double(),
                    },
                    Attribute {
                        leading_space: " ".into(),
                        name: "class".into(),
                        equals: "=".into(),
                        value: "a b".into(),
                        quote: Quote::double(),
                    },
                ],
                inner_whitespace: String::new(),
                terminator: ">".into(),
                closure_state: ClosureState::ExplicitlyClosed,
                end_tag_text: Some("</div>".into()),
                end_tag_line: None,
                end_tag_column: None,
                bad_terminator: None,
                synthetic: false,
            }),
        );
        assert!(dom.query_selector(ROOT, "div").is_some());
        assert!(dom.query_selector(ROOT, "#main").is_some());
        assert!(dom.query_selector(ROOT, ".a").is_some());
        assert!(dom.query_selector(ROOT, "div.b").is_some());
        assert!(dom.query_selector(ROOT, "span").is_none());
        assert!(dom.query_selector(ROOT, "#other").is_none());
    }
}
