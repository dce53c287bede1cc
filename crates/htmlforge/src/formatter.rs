//! Pretty-printing formatter (`spec.md` §4.5). Mutates a [`Dom`] in place
//! with a single recursive pass, rewriting attributes and text as each node
//! is visited rather than building a second tree.

use rustc_hash::FxHashSet;

use crate::char_tables;
use crate::dom::{ClosureState, Dom, NodeId, NodeKind, Quote, ROOT};
use crate::element_policy;
use entities::{self, EscapeOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueQuoting {
    LeaveAsIs,
    AlwaysQuote,
    UnquoteIntegers,
    UnquoteSimpleValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueQuoteStyle {
    PreferDouble,
    PreferSingle,
    Double,
    Single,
}

#[derive(Debug, Clone)]
pub struct HtmlFormatOptions {
    pub indent: usize,
    pub continuation_indent: usize,
    pub align_attributes: bool,
    pub children_not_indented: FxHashSet<&'static str>,
    pub inline: FxHashSet<&'static str>,
    pub keep_whitespace_inside: FxHashSet<&'static str>,
    pub new_line_before: FxHashSet<&'static str>,
    pub remove_new_line_before: FxHashSet<&'static str>,
    pub dont_break_if_inline: FxHashSet<&'static str>,
    pub end_document_with_newline: bool,
    pub trim_document: bool,
    pub instantiate_synthetic_nodes: bool,
    pub max_blank_lines: usize,
    pub normalize_attribute_spacing: bool,
    pub space_around_attribute_equals: bool,
    pub value_quoting: ValueQuoting,
    pub value_quote_style: ValueQuoteStyle,
    pub use_tab_characters: bool,
    pub tab_size: usize,
    pub escape: EscapeOptions,
}

impl Default for HtmlFormatOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            continuation_indent: 4,
            align_attributes: false,
            children_not_indented: element_policy::default_children_not_indented(),
            inline: element_policy::default_inline_tags(),
            keep_whitespace_inside: ["pre", "textarea"].into_iter().collect(),
            new_line_before: FxHashSet::default(),
            remove_new_line_before: ["br"].into_iter().collect(),
            dont_break_if_inline: FxHashSet::default(),
            end_document_with_newline: true,
            trim_document: true,
            instantiate_synthetic_nodes: false,
            max_blank_lines: 1,
            normalize_attribute_spacing: true,
            space_around_attribute_equals: false,
            value_quoting: ValueQuoting::LeaveAsIs,
            value_quote_style: ValueQuoteStyle::PreferDouble,
            use_tab_characters: false,
            tab_size: 8,
            escape: EscapeOptions::default(),
        }
    }
}

fn is_simple_value(v: &str) -> bool {
    !v.is_empty() && v.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

fn is_integer_value(v: &str) -> bool {
    !v.is_empty() && v.chars().all(|c| c.is_ascii_digit())
}

pub fn format(dom: &mut Dom, opts: &HtmlFormatOptions) {
    if opts.instantiate_synthetic_nodes {
        instantiate_synthetic(dom, ROOT);
    } else {
        flatten_synthetic(dom, ROOT);
    }

    if opts.indent > 0 {
        preprocess_whitespace(dom, ROOT, opts, false);
    }

    if opts.indent >= 2 {
        format_children(dom, ROOT, opts, 0);
    } else if opts.indent == 1 {
        compact_children(dom, ROOT, opts);
    } else {
        format_attributes_tree(dom, ROOT, opts);
    }

    if opts.trim_document {
        trim_root(dom);
    }
    if opts.end_document_with_newline {
        append_trailing_newline(dom);
    }
    if opts.use_tab_characters {
        tabify(dom, ROOT, opts.tab_size);
    }
}

/// Removes the `synthetic` bit from every wrapper, promoting it to a real,
/// explicitly-closed element so it survives serialization.
fn instantiate_synthetic(dom: &mut Dom, id: NodeId) {
    let children = dom.get(id).children.clone();
    for child in children {
        if let Some(e) = dom.get_mut(child).as_element_mut() {
            if e.synthetic {
                e.synthetic = false;
                e.closure_state = ClosureState::ExplicitlyClosed;
                e.end_tag_text = Some(format!("</{}>", e.tag));
            }
        }
        instantiate_synthetic(dom, child);
    }
}

/// Leaves synthetic markers as-is (the default); `serialize` already
/// elides them per invariant 2. Present mainly as the symmetric
/// counterpart to `instantiate_synthetic` for documentation purposes.
fn flatten_synthetic(dom: &mut Dom, id: NodeId) {
    for child in dom.get(id).children.clone() {
        flatten_synthetic(dom, child);
    }
}

fn trim_root(dom: &mut Dom) {
    let children = &mut dom.get_mut(ROOT).children;
    if children.is_empty() {
        return;
    }
    // Trimming is content-level (collapse leading/trailing whitespace-only
    // text nodes); structural children are left alone.
    while let Some(&first) = children.first() {
        let remove = matches!(&dom_node_kind(dom, first), NodeKind::Text(t) if t.content.trim().is_empty());
        if remove {
            dom.get_mut(ROOT).children.remove(0);
        } else {
            break;
        }
    }
}

fn dom_node_kind(dom: &Dom, id: NodeId) -> NodeKind {
    dom.get(id).kind.clone()
}

fn append_trailing_newline(dom: &mut Dom) {
    let root = dom.get(ROOT);
    let needs = match root.children.last() {
        Some(&last) => !matches!(&dom.get(last).kind, NodeKind::Text(t) if t.content.ends_with('\n')),
        None => true,
    };
    if needs {
        dom.push_child(
            ROOT,
            0,
            0,
            NodeKind::Text(crate::dom::TextData {
                content: "\n".to_string(),
                possible_entities: false,
            }),
        );
    }
}

/// Whitespace preprocessing (`spec.md` §4.5 step 2): compact runs of
/// horizontal whitespace to one space, clamp blank-line runs to
/// `max_blank_lines + 1`, trim block-boundary text, inside elements that
/// are not `keep_whitespace_inside` or raw-text.
fn preprocess_whitespace(dom: &mut Dom, id: NodeId, opts: &HtmlFormatOptions, verbatim: bool) {
    let is_verbatim = verbatim
        || dom
            .get(id)
            .as_element()
            .map(|e| opts.keep_whitespace_inside.contains(e.tag_lc.as_str()) || element_policy::raw_text_element(&e.tag_lc).is_some())
            .unwrap_or(false);

    let children = dom.get(id).children.clone();
    for &child in &children {
        if !is_verbatim {
            if let NodeKind::Text(t) = &dom.get(child).kind {
                let collapsed = collapse_whitespace(&t.content, opts.max_blank_lines);
                if let NodeKind::Text(t) = &mut dom.get_mut(child).kind {
                    t.content = collapsed;
                }
            }
        }
        preprocess_whitespace(dom, child, opts, is_verbatim);
    }
}

/// Flushes one maximal run of HTML whitespace: a run containing at least
/// one newline collapses to `min(newlines seen, max_blank_lines + 1)`
/// newlines and nothing else; a run of pure horizontal whitespace
/// collapses to a single space.
fn flush_whitespace_run(out: &mut String, newlines: usize, max_blank_lines: usize) {
    if newlines > 0 {
        for _ in 0..newlines.min(max_blank_lines + 1) {
            out.push('\n');
        }
    } else {
        out.push(' ');
    }
}

fn collapse_whitespace(s: &str, max_blank_lines: usize) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut in_run = false;
    let mut newlines = 0usize;
    while let Some(c) = chars.next() {
        let is_nl = c == '\n' || c == '\r';
        if is_nl && c == '\r' && chars.peek() == Some(&'\n') {
            chars.next();
        }
        if is_nl || char_tables::is_html_whitespace(c) {
            in_run = true;
            if is_nl {
                newlines += 1;
            }
            continue;
        }
        if in_run {
            flush_whitespace_run(&mut out, newlines, max_blank_lines);
            in_run = false;
            newlines = 0;
        }
        out.push(c);
    }
    if in_run {
        flush_whitespace_run(&mut out, newlines, max_blank_lines);
    }
    out
}

fn indent_str(opts: &HtmlFormatOptions, depth: usize) -> String {
    " ".repeat(opts.indent * depth)
}

fn is_inline_subtree(dom: &Dom, id: NodeId, opts: &HtmlFormatOptions) -> bool {
    match &dom.get(id).kind {
        NodeKind::Text(_) => true,
        NodeKind::Element(e) => opts.inline.contains(e.tag_lc.as_str()),
        _ => false,
    }
}

/// Recursive per-`spec.md` §4.5 step 3: format attributes, decide on
/// indentation text nodes between children, recurse into element
/// children, re-encode entities in text.
fn format_children(dom: &mut Dom, id: NodeId, opts: &HtmlFormatOptions, depth: usize) {
    let tag_lc = dom.get(id).as_element().map(|e| e.tag_lc.clone());
    let is_raw = tag_lc.as_deref().map(element_policy::raw_text_element).unwrap_or(None);
    let not_indented = tag_lc.as_deref().map(|t| opts.children_not_indented.contains(t)).unwrap_or(false);
    let child_depth = if not_indented { depth } else { depth + 1 };

    if let Some(e) = dom.get_mut(id).as_element_mut() {
        format_attributes(e, opts, depth);
    }

    if is_raw.is_some() {
        // Raw-text content is never reformatted or re-indented.
        return;
    }

    let children: Vec<NodeId> = dom.get(id).children.clone();
    let all_inline = children.iter().all(|&c| is_inline_subtree(dom, c, opts));
    let breaks = !(all_inline
        && tag_lc.as_deref().map(|t| opts.dont_break_if_inline.contains(t)).unwrap_or(false));

    let mut rebuilt: Vec<NodeId> = Vec::new();
    for &child in &children {
        let child_tag_lc = dom.get(child).as_element().map(|e| e.tag_lc.clone());
        let is_inline_child = child_tag_lc.as_deref().map(|t| opts.inline.contains(t)).unwrap_or(matches!(&dom.get(child).kind, NodeKind::Text(_)));

        if breaks && !is_inline_child {
            let remove_nl = child_tag_lc.as_deref().map(|t| opts.remove_new_line_before.contains(t)).unwrap_or(false);
            let blank_before = child_tag_lc.as_deref().map(|t| opts.new_line_before.contains(t)).unwrap_or(false);
            if !remove_nl {
                let mut prefix = String::new();
                if blank_before && !rebuilt.is_empty() {
                    prefix.push('\n');
                }
                prefix.push('\n');
                prefix.push_str(&indent_str(opts, child_depth));
                let ws = dom.push_child(
                    id,
                    0,
                    0,
                    NodeKind::Text(crate::dom::TextData {
                        content: prefix,
                        possible_entities: false,
                    }),
                );
                rebuilt.push(ws);
            }
        }

        if let NodeKind::Text(t) = &dom.get(child).kind {
            if is_raw.is_none() {
                let reencoded = entities::reencode(&t.content, &opts.escape);
                if let NodeKind::Text(t) = &mut dom.get_mut(child).kind {
                    t.content = reencoded;
                }
            }
        } else {
            format_children(dom, child, opts, child_depth);
        }
        rebuilt.push(child);
    }

    if breaks && !children.is_empty() {
        let explicitly_closed = matches!(
            dom.get(id).as_element().map(|e| e.closure_state),
            Some(ClosureState::ExplicitlyClosed) | Some(ClosureState::ImplicitlyClosed)
        );
        if explicitly_closed {
            let mut tail = String::from("\n");
            tail.push_str(&indent_str(opts, depth));
            let ws = dom.push_child(
                id,
                0,
                0,
                NodeKind::Text(crate::dom::TextData {
                    content: tail,
                    possible_entities: false,
                }),
            );
            rebuilt.push(ws);
        }
    }

    dom.get_mut(id).children = rebuilt;
}

fn compact_children(dom: &mut Dom, id: NodeId, opts: &HtmlFormatOptions) {
    if let Some(e) = dom.get_mut(id).as_element_mut() {
        format_attributes(e, opts, 0);
    }
    let children: Vec<NodeId> = dom.get(id).children.clone();
    for child in children {
        match &dom.get(child).kind {
            NodeKind::Text(_) => {
                if let NodeKind::Text(t) = &mut dom.get_mut(child).kind {
                    t.content = collapse_whitespace(&t.content, 0).replace('\n', "");
                }
            }
            _ => compact_children(dom, child, opts),
        }
    }
}

/// Applies attribute formatting across the whole tree without touching
/// whitespace or child order. Value quoting is an attribute policy, not an
/// indentation policy, so it must run even when `indent == 0` disables
/// both of the indentation passes above.
fn format_attributes_tree(dom: &mut Dom, id: NodeId, opts: &HtmlFormatOptions) {
    if let Some(e) = dom.get_mut(id).as_element_mut() {
        format_attributes(e, opts, 0);
    }
    let children: Vec<NodeId> = dom.get(id).children.clone();
    for child in children {
        format_attributes_tree(dom, child, opts);
    }
}

/// Attribute formatting (`spec.md` §4.5 "Attribute formatting rules").
fn format_attributes(e: &mut crate::dom::ElementData, opts: &HtmlFormatOptions, depth: usize) {
    for attr in &mut e.attributes {
        let strip = match opts.value_quoting {
            ValueQuoting::LeaveAsIs => false,
            ValueQuoting::AlwaysQuote => false,
            ValueQuoting::UnquoteIntegers => is_integer_value(&attr.value),
            ValueQuoting::UnquoteSimpleValues => is_simple_value(&attr.value),
        };

        attr.value = entities::reencode(&attr.value, &opts.escape);

        if strip {
            attr.quote = Quote::none();
        } else if opts.value_quoting == ValueQuoting::AlwaysQuote || !attr.quote.is_none() {
            let prefer_single = matches!(opts.value_quote_style, ValueQuoteStyle::Single)
                || (matches!(opts.value_quote_style, ValueQuoteStyle::PreferSingle) && attr.value.contains('"') && !attr.value.contains('\''));
            if prefer_single {
                attr.value = attr.value.replace('\'', "&apos;");
                attr.quote = Quote::single();
            } else {
                attr.value = attr.value.replace('"', "&quot;");
                attr.quote = Quote::double();
            }
        }

        if opts.normalize_attribute_spacing {
            if attr.leading_space.contains('\n') {
                let column = if opts.align_attributes {
                    depth * opts.indent + 1 + e.tag.chars().count() + 1
                } else {
                    opts.continuation_indent + depth * opts.indent
                };
                attr.leading_space = format!("\n{}", " ".repeat(column));
            } else {
                attr.leading_space = " ".to_string();
            }
            let eq = if opts.space_around_attribute_equals { " = " } else { "=" };
            attr.equals = if attr.value.is_empty() && attr.quote.is_none() {
                String::new()
            } else {
                eq.to_string()
            };
        }
    }
}

/// Converts leading spaces on each line to tabs of `tab_size` width plus
/// residual spaces (`spec.md` §4.5 step 6), applied to every text node
/// that carries indentation.
fn tabify(dom: &mut Dom, id: NodeId, tab_size: usize) {
    let children: Vec<NodeId> = dom.get(id).children.clone();
    for child in children {
        if let NodeKind::Text(t) = &dom.get(child).kind {
            let tabified = tabify_str(&t.content, tab_size);
            if let NodeKind::Text(t) = &mut dom.get_mut(child).kind {
                t.content = tabified;
            }
        }
        tabify(dom, child, tab_size);
    }
}

fn tabify_str(s: &str, tab_size: usize) -> String {
    if tab_size == 0 {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    for line in s.split_inclusive('\n') {
        let stripped = line.trim_end_matches('\n');
        let leading = stripped.chars().take_while(|c| *c == ' ').count();
        if leading >= tab_size {
            let tabs = leading / tab_size;
            let spaces = leading % tab_size;
            out.push_str(&"\t".repeat(tabs));
            out.push_str(&" ".repeat(spaces));
            out.push_str(&stripped[leading..]);
        } else {
            out.push_str(stripped);
        }
        if line.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{ParserOptions, Tokenizer};
    use crate::events::Handlers;

    fn parse(input: &str) -> Dom {
        let tok = Tokenizer::new(ParserOptions::default(), Handlers::new());
        let (tok, _) = tok.parse(input);
        tok.into_dom()
    }

    #[test]
    fn blank_lines_collapse_to_max_blank_lines() {
        let mut dom = parse("<span>A</span> \n \n   \n \n <span>B</span>");
        let mut opts = HtmlFormatOptions {
            indent: 2,
            max_blank_lines: 1,
            end_document_with_newline: false,
            trim_document: false,
            ..HtmlFormatOptions::default()
        };
        opts.inline.insert("span");
        format(&mut dom, &opts);
        assert_eq!(dom.serialize(ROOT), "<span>A</span>\n\n<span>B</span>");
    }

    #[test]
    fn unquote_integers_strips_quotes_from_numeric_values() {
        let mut dom = parse("<img src=\"/foo.jpg\" width=\"32\" height=\"32\" alt=\"can't\"/>");
        let opts = HtmlFormatOptions {
            indent: 0,
            value_quoting: ValueQuoting::UnquoteIntegers,
            end_document_with_newline: false,
            trim_document: false,
            ..HtmlFormatOptions::default()
        };
        format(&mut dom, &opts);
        let out = dom.serialize(ROOT);
        assert!(out.contains(" width=32 height=32 "));
        assert!(out.contains("src=\"/foo.jpg\""));
    }
}
