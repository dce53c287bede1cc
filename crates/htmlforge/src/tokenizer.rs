//! Character-driven state machine (`spec.md` §4.3, §5).
//!
//! A single `step` advances one state transition and is called in a loop
//! until the document (or the currently available chunk) is exhausted.
//! This tokenizer scans `char`s rather than raw bytes, because
//! `htmlforge`'s round-trip and entity-escaping guarantees are defined in
//! terms of Unicode scalar values, not bytes.
//!
//! Pausing and resuming (chunked mode, cooperative yielding) requires no
//! explicit "paused-at" token as described in `spec.md` §9: `pos`, `line`,
//! `column`, and `state` already live on `Tokenizer`, so suspending is
//! just returning from `run`, and resuming is just calling it again. A
//! `\r` stranded at the end of one chunk is handled correctly by the next
//! chunk's leading `\n` because the EOL-merge flag (`pending_cr`) is a
//! field, not a local. The high-surrogate/low-surrogate chunk-boundary
//! case from `spec.md` §4.3 does not arise here: callers feed `&str`
//! chunks, and Rust's UTF-8 validation already guarantees every chunk
//! boundary falls on a whole scalar value.

use std::time::{Duration, Instant};

use crate::dom::{
    Attribute, ClosureState, Dom, ElementData, NodeId, NodeKind, Quote, RawSpan, TextData, ROOT,
};
use crate::doctype;
use crate::element_policy::{self, RawTextKind};
use crate::errors::ParseError;
use crate::events::{
    AttributeEvent, DoctypeEvent, EndTagEvent, Handlers, ParseResults, SpanEvent,
    StartTagEnd, StartTagEndEvent, StartTagStartEvent, TextEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Preserve,
    Lf,
    Cr,
    CrLf,
}

impl Eol {
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "n" | "lf" | "\n" => Some(Eol::Lf),
            "r" | "cr" | "\r" => Some(Eol::Cr),
            "rn" | "crlf" | "\r\n" => Some(Eol::CrLf),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Eol::Preserve => unreachable!("Preserve never normalizes"),
            Eol::Lf => "\n",
            Eol::Cr => "\r",
            Eol::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub eol: Eol,
    pub empty_end_tag: bool,
    pub fix_bad_chars: bool,
    pub fast: bool,
    pub tab_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            eol: Eol::Preserve,
            empty_end_tag: true,
            fix_bad_chars: false,
            fast: false,
            tab_size: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OutsideMarkup,
    AtMarkupStart,
    AtStartTagStart,
    AtAttributeStart,
    AtAttributeAssignment,
    AtAttributeValue,
    AtEndTagStart,
    InEndTag,
    AtDeclarationStart,
    AtCommentStart,
    AtProcessingStart,
    InScriptElement,
    InStyleElement,
    InTextAreaElement,
    Done,
}

enum Step {
    Continue,
    NeedMoreData,
    Done,
}

/// Normalizes EOLs in freshly-scanned text per `options.eol`; a no-op when
/// `eol == Preserve`, which is what the round-trip invariant requires.
fn normalize_eol(s: &str, eol: Eol) -> String {
    if eol == Eol::Preserve {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push_str(eol.as_str());
        } else if c == '\n' {
            out.push_str(eol.as_str());
        } else {
            out.push(c);
        }
    }
    out
}

pub struct Tokenizer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    pending_cr: bool,
    state: State,
    is_final: bool,
    dom: Dom,
    open_stack: Vec<NodeId>,
    xml_mode: bool,
    svg_math_depth: u32,
    current_tag_lc: String,
    pending_attrs: Vec<Attribute>,
    errors: usize,
    implicitly_closed_tags: usize,
    stopped: bool,
    encoding_sniffed: bool,
    handlers: Handlers,
    options: ParserOptions,
    start_time: Instant,
    yield_time: Option<Duration>,
    last_yield_check: Instant,
}

impl Tokenizer {
    pub fn new(options: ParserOptions, handlers: Handlers) -> Self {
        let mut dom = Dom::new();
        let root = dom.get_mut(ROOT);
        root.line = 1;
        root.column = 0;
        Self {
            source: Vec::new(),
            pos: 0,
            line: 1,
            column: 0,
            pending_cr: false,
            state: State::OutsideMarkup,
            is_final: false,
            dom,
            open_stack: vec![ROOT],
            xml_mode: false,
            svg_math_depth: 0,
            current_tag_lc: String::new(),
            pending_attrs: Vec::new(),
            errors: 0,
            implicitly_closed_tags: 0,
            stopped: false,
            encoding_sniffed: false,
            handlers,
            options,
            start_time: Instant::now(),
            yield_time: None,
            last_yield_check: Instant::now(),
        }
    }

    pub fn stop(&mut self) {
        tracing::debug!(line = self.line, column = self.column, "parser stopped");
        self.stopped = true;
    }

    /// Abandons the current parse and clears all internal state, keeping
    /// registered handlers and options (`spec.md` §4.3 "reset()").
    pub fn reset(&mut self) {
        tracing::trace!("parser reset");
        self.source.clear();
        self.pos = 0;
        self.line = 1;
        self.column = 0;
        self.pending_cr = false;
        self.state = State::OutsideMarkup;
        self.is_final = false;
        self.dom = Dom::new();
        self.open_stack = vec![ROOT];
        self.xml_mode = false;
        self.svg_math_depth = 0;
        self.current_tag_lc.clear();
        self.pending_attrs.clear();
        self.errors = 0;
        self.implicitly_closed_tags = 0;
        self.stopped = false;
        self.encoding_sniffed = false;
        self.start_time = std::time::Instant::now();
        self.yield_time = None;
        self.last_yield_check = Instant::now();
    }

    pub fn feed(&mut self, chunk: &str) {
        self.source.extend(chunk.chars());
    }

    /// Runs to completion on the whole string (`spec.md` §4.3 mode 1).
    pub fn parse(mut self, input: &str) -> (Self, ParseResults) {
        let _span = tracing::debug_span!("parse", chars = input.chars().count()).entered();
        self.feed(input);
        self.is_final = true;
        self.run();
        let results = self.finish_results();
        tracing::debug!(errors = results.errors, unclosed = results.unclosed_tags, "parse complete");
        self.handlers.emit_completion(results.clone());
        (self, results)
    }

    /// Pushes one chunk; returns `Some(results)` once the document (or a
    /// caller-issued stop) completes, `None` if more data is needed
    /// (`spec.md` §4.3 mode 3).
    pub fn push_chunk(&mut self, chunk: &str, is_final: bool) -> Option<ParseResults> {
        tracing::trace!(chars = chunk.chars().count(), is_final, "chunk pushed");
        self.feed(chunk);
        self.is_final = is_final;
        if self.run() {
            let results = self.finish_results();
            tracing::debug!(errors = results.errors, "chunked parse complete");
            self.handlers.emit_completion(results.clone());
            Some(results)
        } else {
            self.handlers.emit_request_data();
            None
        }
    }

    /// Like `parse`, but checks elapsed time at safe points (between state
    /// transitions) and invokes `on_yield` whenever `yield_time` has
    /// elapsed, then keeps going (`spec.md` §4.3 mode 2, §5 "cooperative").
    /// There is no real coroutine here -- Rust's tokenizer state already
    /// lives on `self`, so "suspending" is just returning control to
    /// `on_yield` and continuing the same loop.
    pub fn parse_cooperative(
        mut self,
        input: &str,
        yield_time: Duration,
        mut on_yield: impl FnMut(),
    ) -> (Self, ParseResults) {
        self.feed(input);
        self.is_final = true;
        self.yield_time = Some(yield_time);
        self.last_yield_check = Instant::now();
        loop {
            if self.run_until_yield_or_done() {
                break;
            }
            on_yield();
            self.last_yield_check = Instant::now();
        }
        let results = self.finish_results();
        self.handlers.emit_completion(results.clone());
        (self, results)
    }

    fn finish_results(&self) -> ParseResults {
        ParseResults {
            dom_root: ROOT,
            characters: self.pos,
            errors: self.errors,
            implicitly_closed_tags: self.implicitly_closed_tags,
            lines: self.line,
            stopped: self.stopped,
            unclosed_tags: self.open_stack.len().saturating_sub(1),
            total_time: self.start_time.elapsed(),
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn into_dom(self) -> Dom {
        self.dom
    }

    /// Runs until input is exhausted (returns false, needs more data) or
    /// the document is fully parsed / stopped (returns true).
    fn run(&mut self) -> bool {
        self.sniff_encoding_by_pattern();
        loop {
            if self.stopped {
                return true;
            }
            match self.step() {
                Step::Continue => continue,
                Step::NeedMoreData => return false,
                Step::Done => return true,
            }
        }
    }

    /// Same as `run`, but returns early (without being "done") once
    /// `yield_time` has elapsed since the last check.
    fn run_until_yield_or_done(&mut self) -> bool {
        self.sniff_encoding_by_pattern();
        loop {
            if self.stopped {
                return true;
            }
            if let Some(budget) = self.yield_time {
                if self.state == State::OutsideMarkup && self.last_yield_check.elapsed() >= budget {
                    return false;
                }
            }
            match self.step() {
                Step::Continue => continue,
                Step::NeedMoreData => return true,
                Step::Done => return true,
            }
        }
    }

    fn depth(&self) -> usize {
        self.open_stack.len().saturating_sub(1)
    }

    fn top(&self) -> NodeId {
        *self.open_stack.last().unwrap()
    }

    // -- cursor helpers --------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' && self.pending_cr {
            self.pending_cr = false;
        } else if c == '\n' || c == '\r' {
            self.line += 1;
            self.column = 0;
            self.pending_cr = c == '\r';
        } else {
            self.column += 1;
            self.pending_cr = false;
        }
        Some(c)
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        let message = message.into();
        tracing::debug!(line = self.line, column = self.column, %message, "parse error");
        let pending_source: String = self.source[self.pos..].iter().collect();
        self.handlers.emit_error(ParseError {
            message,
            line: self.line,
            column: self.column,
            pending_source,
        });
    }

    /// Encoding sniffing by pattern (`spec.md` §4.3 "Encoding sniffing by
    /// pattern"): detects the telltale repeating-NUL shape of UTF-16 text
    /// that was mistakenly decoded as an 8-bit encoding, and reports it
    /// through the `encoding` event with `explicit=false`. Runs at most
    /// once per parse, at the very first byte available.
    fn sniff_encoding_by_pattern(&mut self) {
        if self.encoding_sniffed {
            return;
        }
        if self.source.len() < 4 {
            // Not enough data yet to judge; try again once more arrives,
            // unless no more ever will.
            if self.is_final {
                self.encoding_sniffed = true;
            }
            return;
        }
        self.encoding_sniffed = true;
        let sample: Vec<char> = self.source.iter().take(8).copied().collect();
        let evens_nul = sample.iter().step_by(2).all(|&c| c == '\0');
        let odds_nul = sample.iter().skip(1).step_by(2).all(|&c| c == '\0');
        let name = if odds_nul && !evens_nul {
            Some("UTF-16LE")
        } else if evens_nul && !odds_nul {
            Some("UTF-16BE")
        } else {
            None
        };
        if let Some(name) = name {
            tracing::trace!(name, "encoding sniffed from byte pattern");
            if self.handlers.emit_encoding(name, &normalize_encoding_name(name), false) {
                self.stopped = true;
                self.state = State::Done;
            }
        }
    }

    /// Watches `<meta charset=...>` and `<meta http-equiv="Content-Type"
    /// content="...; charset=...">` for a declared document encoding
    /// (`spec.md` §4.3 "Encoding callback"). Only fires once a complete
    /// start tag for `<meta>` has been parsed.
    fn check_meta_charset(&mut self, tag_lc: &str) {
        if tag_lc != "meta" {
            return;
        }
        let el = self.top();
        let Some(e) = self.dom.get(el).as_element() else { return };
        if let Some(charset) = e.value_of("charset") {
            let name = charset.to_string();
            self.report_encoding(&name, true);
            return;
        }
        let is_content_type = e
            .value_of("http-equiv")
            .map(|v| v.eq_ignore_ascii_case("content-type"))
            .unwrap_or(false);
        if is_content_type {
            if let Some(content) = e.value_of("content") {
                if let Some(name) = extract_charset_from_content(content) {
                    self.report_encoding(&name, true);
                }
            }
        }
    }

    fn report_encoding(&mut self, name: &str, explicit: bool) {
        let normalized = normalize_encoding_name(name);
        tracing::debug!(name, normalized, explicit, "document encoding reported");
        if self.handlers.emit_encoding(name, &normalized, explicit) {
            tracing::debug!("encoding callback requested an abort");
            self.stopped = true;
            self.state = State::Done;
        }
    }

    // -- DOM operations (`spec.md` §4.4) ---------------------------------

    fn pre_push(&mut self, tag_lc: &str) {
        if self.xml_mode {
            return;
        }
        loop {
            let top = self.top();
            let Some(top_tag_lc) = self.dom.get(top).as_element().map(|e| e.tag_lc.clone()) else {
                break;
            };
            if element_policy::implicitly_closes(tag_lc, &top_tag_lc) {
                if let Some(e) = self.dom.get_mut(top).as_element_mut() {
                    e.closure_state = ClosureState::ImplicitlyClosed;
                }
                self.open_stack.pop();
                self.implicitly_closed_tags += 1;
            } else {
                break;
            }
        }
    }

    fn push_element(&mut self, tag: String, tag_lc: String, line: usize, column: usize) -> NodeId {
        self.pre_push(&tag_lc);
        let id = self.dom.push_child(
            self.top(),
            line,
            column,
            NodeKind::Element(ElementData {
                tag,
                tag_lc: tag_lc.clone(),
                attributes: Vec::new(),
                inner_whitespace: String::new(),
                terminator: String::new(),
                closure_state: ClosureState::Unclosed,
                end_tag_text: None,
                end_tag_line: None,
                end_tag_column: None,
                bad_terminator: None,
                synthetic: false,
            }),
        );
        self.open_stack.push(id);
        if tag_lc == "math" || tag_lc == "svg" {
            self.svg_math_depth += 1;
        }
        id
    }

    /// `pop(tag_lc, end_tag_text)` from `spec.md` §4.4. `tag_lc = None`
    /// closes the current top without a tag name (void element);
    /// `bad_terminator` records a self-close marker for malformed tags.
    fn pop(&mut self, tag_lc: Option<&str>, end_tag_text: Option<String>, end_line: usize, end_col: usize) -> bool {
        let Some(tag_lc) = tag_lc else {
            let top = self.top();
            let closure_state = if end_tag_text.is_some() {
                ClosureState::ExplicitlyClosed
            } else {
                ClosureState::VoidClosed
            };
            if let Some(e) = self.dom.get_mut(top).as_element_mut() {
                e.closure_state = closure_state;
                e.end_tag_text = end_tag_text;
                e.end_tag_line = Some(end_line);
                e.end_tag_column = Some(end_col);
            }
            if self.open_stack.len() > 1 {
                self.open_stack.pop();
            }
            return true;
        };

        let top = self.top();
        let top_tag_lc = self.dom.get(top).as_element().map(|e| e.tag_lc.clone());
        if top_tag_lc.as_deref() == Some(tag_lc) {
            self.close_exact(top, end_tag_text, end_line, end_col);
            return true;
        }

        // Search the stack top-down; stop at a marker element if the
        // closing tag is in the formatting set (adoption-agency
        // approximation, `spec.md` §4.4 / §9 open question).
        let is_formatting = element_policy::is_formatting_element(tag_lc);
        let mut found_index = None;
        for (i, &id) in self.open_stack.iter().enumerate().skip(1).rev() {
            let Some(e) = self.dom.get(id).as_element() else { continue };
            if is_formatting && element_policy::is_marker_element(&e.tag_lc) {
                break;
            }
            if e.tag_lc == tag_lc {
                found_index = Some(i);
                break;
            }
        }

        match found_index {
            Some(idx) => {
                while self.open_stack.len() - 1 > idx {
                    let node = self.open_stack.pop().unwrap();
                    if let Some(e) = self.dom.get_mut(node).as_element_mut() {
                        e.closure_state = ClosureState::ImplicitlyClosed;
                    }
                    self.implicitly_closed_tags += 1;
                }
                let node = self.top();
                self.close_exact(node, end_tag_text, end_line, end_col);
                true
            }
            None => {
                let id = self.dom.push_child(
                    self.top(),
                    end_line,
                    end_col,
                    NodeKind::UnmatchedClosingTag(RawSpan {
                        content: end_tag_text.unwrap_or_default(),
                    }),
                );
                let _ = id;
                false
            }
        }
    }

    fn close_exact(&mut self, node: NodeId, end_tag_text: Option<String>, end_line: usize, end_col: usize) {
        let is_table = self.dom.get(node).as_element().map(|e| e.tag_lc.as_str()) == Some("table");
        if let Some(e) = self.dom.get_mut(node).as_element_mut() {
            e.closure_state = ClosureState::ExplicitlyClosed;
            e.end_tag_text = end_tag_text;
            e.end_tag_line = Some(end_line);
            e.end_tag_column = Some(end_col);
        }
        self.open_stack.pop();
        if tag_lc_eq(&self.dom, node, "math") || tag_lc_eq(&self.dom, node, "svg") {
            self.svg_math_depth = self.svg_math_depth.saturating_sub(1);
        }
        if is_table {
            self.normalize_table(node);
        }
    }

    /// Table-row/section normalization on explicit `</table>` (`spec.md`
    /// §4.4). Synthetic wrapper elements are marked `synthetic: true` so
    /// serialization elides them per invariant 2.
    fn normalize_table(&mut self, table: NodeId) {
        let children: Vec<NodeId> = self.dom.get(table).children.clone();
        let mut regrouped: Vec<NodeId> = Vec::new();
        let mut loose_rows: Vec<NodeId> = Vec::new();

        let flush_loose_rows = |dom: &mut Dom, loose_rows: &mut Vec<NodeId>, regrouped: &mut Vec<NodeId>| {
            if loose_rows.is_empty() {
                return;
            }
            let has_th = loose_rows.iter().any(|&r| {
                dom.get(r)
                    .children
                    .iter()
                    .any(|&c| tag_lc_eq(dom, c, "th"))
            });
            let section_tag = if has_th { "thead" } else { "tbody" };
            let section = synthesize_element(dom, table, section_tag);
            for row in loose_rows.drain(..) {
                reparent(dom, row, section);
            }
            regrouped.push(section);
        };

        for child in children {
            let tag_lc = self.dom.get(child).as_element().map(|e| e.tag_lc.clone());
            match tag_lc.as_deref() {
                Some("tr") => loose_rows.push(child),
                Some("thead") | Some("tbody") | Some("tfoot") => {
                    flush_loose_rows(&mut self.dom, &mut loose_rows, &mut regrouped);
                    self.normalize_section(child);
                    regrouped.push(child);
                }
                _ => {
                    flush_loose_rows(&mut self.dom, &mut loose_rows, &mut regrouped);
                    regrouped.push(child);
                }
            }
        }
        flush_loose_rows(&mut self.dom, &mut loose_rows, &mut regrouped);
        self.dom.get_mut(table).children = regrouped;
    }

    /// Wraps any direct `<th>`/`<td>` not already under a `<tr>` (`spec.md`
    /// §4.4 step 2).
    fn normalize_section(&mut self, section: NodeId) {
        let children: Vec<NodeId> = self.dom.get(section).children.clone();
        let mut regrouped: Vec<NodeId> = Vec::new();
        let mut loose_cells: Vec<NodeId> = Vec::new();

        for child in children {
            let tag_lc = self.dom.get(child).as_element().map(|e| e.tag_lc.clone());
            match tag_lc.as_deref() {
                Some("td") | Some("th") => loose_cells.push(child),
                _ => {
                    if !loose_cells.is_empty() {
                        let row = synthesize_element(&mut self.dom, section, "tr");
                        for cell in loose_cells.drain(..) {
                            reparent(&mut self.dom, cell, row);
                        }
                        regrouped.push(row);
                    }
                    regrouped.push(child);
                }
            }
        }
        if !loose_cells.is_empty() {
            let row = synthesize_element(&mut self.dom, section, "tr");
            for cell in loose_cells.drain(..) {
                reparent(&mut self.dom, cell, row);
            }
            regrouped.push(row);
        }
        self.dom.get_mut(section).children = regrouped;
    }

    // -- state machine ----------------------------------------------------

    fn step(&mut self) -> Step {
        match self.state {
            State::OutsideMarkup => self.step_outside_markup(),
            State::AtMarkupStart => self.step_at_markup_start(),
            State::AtStartTagStart => self.step_at_start_tag_start(),
            State::AtAttributeStart => self.step_at_attribute_start(),
            State::AtAttributeAssignment => self.step_at_attribute_assignment(),
            State::AtAttributeValue => self.step_at_attribute_value(),
            State::AtEndTagStart => self.step_at_end_tag_start(),
            State::InEndTag => self.step_in_end_tag(),
            State::AtDeclarationStart => self.step_at_declaration_start(),
            State::AtCommentStart => self.step_at_comment_start(),
            State::AtProcessingStart => self.step_at_processing_start(),
            State::InScriptElement => self.step_raw_text(RawTextKind::Script),
            State::InStyleElement => self.step_raw_text(RawTextKind::Style),
            State::InTextAreaElement => self.step_raw_text(RawTextKind::Textarea),
            State::Done => Step::Done,
        }
    }

    fn step_outside_markup(&mut self) -> Step {
        let start_line = self.line;
        let start_col = self.column;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    if !self.is_final {
                        if text.is_empty() {
                            return Step::NeedMoreData;
                        }
                        self.emit_text(text, start_line, start_col);
                        return Step::NeedMoreData;
                    }
                    if !text.is_empty() {
                        self.emit_text(text, start_line, start_col);
                    }
                    self.state = State::Done;
                    return Step::Done;
                }
                Some('<') => {
                    match self.peek_at(1) {
                        Some(c) if crate::char_tables::is_markup_start(c) => {
                            if !text.is_empty() {
                                self.emit_text(text, start_line, start_col);
                            }
                            self.bump();
                            self.state = State::AtMarkupStart;
                            return Step::Continue;
                        }
                        None if !self.is_final => {
                            // Could still turn out to be markup once more
                            // input arrives; wait rather than guess.
                            if !text.is_empty() {
                                self.emit_text(text, start_line, start_col);
                            }
                            return Step::NeedMoreData;
                        }
                        _ => {
                            text.push(self.bump().unwrap());
                        }
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    fn emit_text(&mut self, raw: String, line: usize, column: usize) {
        let normalized = normalize_eol(&raw, self.options.eol);
        let leading_len = normalized.chars().take_while(|c| crate::char_tables::is_any_whitespace(*c)).count();
        let trailing_len = normalized
            .chars()
            .rev()
            .take_while(|c| crate::char_tables::is_any_whitespace(*c))
            .count();
        let chars: Vec<char> = normalized.chars().collect();
        let body_end = chars.len().saturating_sub(trailing_len).max(leading_len);
        let leading: String = chars[..leading_len].iter().collect();
        let body: String = chars[leading_len..body_end].iter().collect();
        let trailing: String = chars[body_end..].iter().collect();
        let possible_entities = body.contains('&');

        self.dom.push_child(
            self.top(),
            line,
            column,
            NodeKind::Text(TextData {
                content: normalized,
                possible_entities,
            }),
        );
        self.handlers.emit_text(TextEvent {
            depth: self.depth(),
            leading_space: leading,
            text: body,
            trailing_space: trailing,
        });
    }

    fn step_at_markup_start(&mut self) -> Step {
        match self.peek() {
            Some('/') => {
                self.bump();
                self.state = State::AtEndTagStart;
            }
            Some('!') => {
                self.bump();
                self.state = State::AtDeclarationStart;
            }
            Some('?') => {
                self.bump();
                self.state = State::AtProcessingStart;
            }
            _ => {
                self.state = State::AtStartTagStart;
            }
        }
        Step::Continue
    }

    fn step_at_start_tag_start(&mut self) -> Step {
        let line = self.line;
        let col = self.column.saturating_sub(1);
        let mut tag = String::new();
        while let Some(c) = self.peek() {
            if crate::char_tables::is_pcen_char(c, self.options.fast) {
                tag.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if tag.is_empty() {
            // `<` followed by something that isn't actually a tag name;
            // degrade gracefully to literal text rather than losing input.
            self.error("expected a tag name after '<'");
            self.dom.push_child(
                self.top(),
                line,
                col,
                NodeKind::Text(TextData {
                    content: "<".to_string(),
                    possible_entities: false,
                }),
            );
            self.state = State::OutsideMarkup;
            return Step::Continue;
        }
        let tag_lc = if self.xml_mode { tag.clone() } else { tag.to_ascii_lowercase() };
        self.handlers.emit_start_tag_start(StartTagStartEvent {
            depth: self.depth(),
            tag: tag.clone(),
        });
        self.current_tag_lc = tag_lc.clone();
        self.pending_attrs.clear();
        let id = self.push_element(tag, tag_lc, line, col);
        let _ = id;
        self.state = State::AtAttributeStart;
        Step::Continue
    }

    fn step_at_attribute_start(&mut self) -> Step {
        let mut leading_space = String::new();
        while let Some(c) = self.peek() {
            if crate::char_tables::is_any_whitespace(c) {
                leading_space.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match self.peek() {
            None => {
                if !self.is_final {
                    return Step::NeedMoreData;
                }
                self.finish_start_tag_abruptly();
                Step::Continue
            }
            Some('/') => {
                if self.peek_at(1) == Some('>') {
                    self.bump();
                    self.bump();
                    self.finish_start_tag(true, "/>".to_string(), leading_space);
                } else {
                    self.bump();
                    self.pending_attrs.push(Attribute {
                        leading_space,
                        name: "/".to_string(),
                        equals: String::new(),
                        value: String::new(),
                        quote: Quote::none(),
                    });
                }
                Step::Continue
            }
            Some('>') => {
                self.bump();
                self.finish_start_tag(false, ">".to_string(), leading_space);
                Step::Continue
            }
            Some(_) => {
                let mut name = String::new();
                while let Some(c) = self.peek() {
                    if c == '=' || c == '/' || c == '>' || crate::char_tables::is_any_whitespace(c) {
                        break;
                    }
                    if !crate::char_tables::is_attribute_name_char(c, self.options.fast) {
                        break;
                    }
                    name.push(c);
                    self.bump();
                }
                if name.is_empty() {
                    // Unrecognized char where an attribute name was
                    // expected; consume it so we make forward progress.
                    let bad = self.bump();
                    self.error("unexpected character in attribute list");
                    if bad.is_none() {
                        self.finish_start_tag_abruptly();
                    }
                    return Step::Continue;
                }
                self.pending_attrs.push(Attribute {
                    leading_space,
                    name,
                    equals: String::new(),
                    value: String::new(),
                    quote: Quote::none(),
                });
                self.state = State::AtAttributeAssignment;
                Step::Continue
            }
        }
    }

    fn step_at_attribute_assignment(&mut self) -> Step {
        let mut ws_before = String::new();
        while let Some(c) = self.peek() {
            if crate::char_tables::is_any_whitespace(c) {
                ws_before.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match self.peek() {
            None if !self.is_final => Step::NeedMoreData,
            Some('=') => {
                self.bump();
                let mut ws_after = String::new();
                while let Some(c) = self.peek() {
                    if crate::char_tables::is_any_whitespace(c) {
                        ws_after.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                if let Some(last) = self.pending_attrs.last_mut() {
                    last.equals = format!("{ws_before}={ws_after}");
                }
                self.state = State::AtAttributeValue;
                Step::Continue
            }
            _ => {
                // Valueless attribute: re-dispatch without consuming.
                if !ws_before.is_empty() {
                    if let Some(last) = self.pending_attrs.last_mut() {
                        last.leading_space.push_str(&ws_before);
                    }
                }
                self.state = State::AtAttributeStart;
                Step::Continue
            }
        }
    }

    fn step_at_attribute_value(&mut self) -> Step {
        match self.peek() {
            None => {
                if !self.is_final {
                    return Step::NeedMoreData;
                }
                self.finish_start_tag_abruptly();
                Step::Continue
            }
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let mut value = String::new();
                loop {
                    match self.peek() {
                        None => {
                            if !self.is_final {
                                return Step::NeedMoreData;
                            }
                            self.error("unterminated attribute value");
                            if let Some(last) = self.pending_attrs.last_mut() {
                                last.value = value;
                                last.quote = Quote { open: q.to_string(), close: String::new() };
                            }
                            self.finish_start_tag_abruptly();
                            return Step::Continue;
                        }
                        Some(c) if c == q => {
                            self.bump();
                            break;
                        }
                        Some(c) => {
                            value.push(c);
                            self.bump();
                        }
                    }
                }
                if let Some(last) = self.pending_attrs.last_mut() {
                    last.value = value;
                    last.quote = if q == '"' { Quote::double() } else { Quote::single() };
                }
                self.state = State::AtAttributeStart;
                Step::Continue
            }
            Some(_) => {
                let mut value = String::new();
                loop {
                    match self.peek() {
                        Some(c) if crate::char_tables::is_any_whitespace(c) || c == '>' => break,
                        // A trailing `/` in an unquoted value is pushed
                        // back so `<br/>` self-closes rather than becoming
                        // part of the value (`spec.md` §4.3).
                        Some('/') if self.peek_at(1) == Some('>') => break,
                        Some(c) => {
                            value.push(c);
                            self.bump();
                        }
                        None => {
                            if !self.is_final {
                                return Step::NeedMoreData;
                            }
                            break;
                        }
                    }
                }
                if let Some(last) = self.pending_attrs.last_mut() {
                    last.value = value;
                    last.quote = Quote::none();
                }
                self.state = State::AtAttributeStart;
                Step::Continue
            }
        }
    }

    fn finish_start_tag_abruptly(&mut self) {
        // EOF mid start-tag at true end of input: attach what we have and
        // stop, per the "all errors are recoverable" mandate.
        self.error("unexpected end of input inside a tag");
        let el = self.top();
        if let Some(e) = self.dom.get_mut(el).as_element_mut() {
            e.attributes = std::mem::take(&mut self.pending_attrs);
        }
        self.state = State::Done;
    }

    fn finish_start_tag(&mut self, self_close_slash: bool, terminator: String, inner_whitespace: String) {
        let tag_lc = self.current_tag_lc.clone();
        let el = self.top();
        if let Some(e) = self.dom.get_mut(el).as_element_mut() {
            for attr in &self.pending_attrs {
                self.handlers.emit_attribute(AttributeEvent {
                    leading_space: attr.leading_space.clone(),
                    name: attr.name.clone(),
                    equals: attr.equals.clone(),
                    value: attr.value.clone(),
                    quote: format!("{}{}", attr.quote.open, attr.quote.close),
                });
            }
            e.attributes = std::mem::take(&mut self.pending_attrs);
            e.inner_whitespace = inner_whitespace.clone();
            e.terminator = terminator;
        }

        let is_void = element_policy::is_void_element(&tag_lc);
        let end = if self_close_slash { StartTagEnd::SelfClose } else { StartTagEnd::Close };
        self.handlers.emit_start_tag_end(StartTagEndEvent {
            depth: self.depth(),
            inner_whitespace,
            end,
        });

        self.check_meta_charset(&tag_lc);
        if self.stopped {
            return;
        }

        if self_close_slash {
            if let Some(e) = self.dom.get_mut(el).as_element_mut() {
                e.closure_state = ClosureState::SelfClosed;
            }
            self.open_stack.pop();
            if tag_lc == "math" || tag_lc == "svg" {
                self.svg_math_depth = self.svg_math_depth.saturating_sub(1);
            }
            self.state = State::OutsideMarkup;
        } else if is_void && !self.xml_mode {
            self.pop(None, None, self.line, self.column);
            self.state = State::OutsideMarkup;
        } else if !self.xml_mode {
            match element_policy::raw_text_element(&tag_lc) {
                Some(RawTextKind::Script) => self.state = State::InScriptElement,
                Some(RawTextKind::Style) => self.state = State::InStyleElement,
                Some(RawTextKind::Textarea) => self.state = State::InTextAreaElement,
                None => self.state = State::OutsideMarkup,
            }
        } else {
            self.state = State::OutsideMarkup;
        }
    }

    fn step_at_end_tag_start(&mut self) -> Step {
        if self.peek() == Some('>') {
            if self.options.empty_end_tag {
                self.bump();
                self.pop(None, Some("</>".to_string()), self.line, self.column);
            } else {
                self.bump();
                self.dom.push_child(
                    self.top(),
                    self.line,
                    self.column,
                    NodeKind::Text(TextData {
                        content: "</>".to_string(),
                        possible_entities: false,
                    }),
                );
            }
            self.state = State::OutsideMarkup;
            return Step::Continue;
        }
        self.state = State::InEndTag;
        Step::Continue
    }

    fn step_in_end_tag(&mut self) -> Step {
        let line = self.line;
        let col = self.column.saturating_sub(2);
        let mut tag = String::new();
        while let Some(c) = self.peek() {
            if crate::char_tables::is_pcen_char(c, self.options.fast) {
                tag.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let mut inner_whitespace = String::new();
        while let Some(c) = self.peek() {
            if crate::char_tables::is_any_whitespace(c) {
                inner_whitespace.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match self.peek() {
            Some('>') => {
                self.bump();
                let tag_lc = if self.xml_mode { tag.clone() } else { tag.to_ascii_lowercase() };
                let end_text = format!("</{tag}{inner_whitespace}>");
                if !self.pop(Some(&tag_lc), Some(end_text.clone()), line, col) {
                    self.error(format!("unmatched end tag </{tag}>"));
                }
                self.handlers.emit_end_tag(EndTagEvent {
                    depth: self.depth(),
                    tag,
                    inner_whitespace,
                });
                self.state = State::OutsideMarkup;
                Step::Continue
            }
            None if !self.is_final => Step::NeedMoreData,
            _ => {
                let bad = self.peek();
                self.error("malformed end tag");
                if let Some(c) = bad {
                    self.bump();
                    let tag_lc = if self.xml_mode { tag.clone() } else { tag.to_ascii_lowercase() };
                    let end_text = format!("</{tag}{inner_whitespace}{c}");
                    self.pop(Some(&tag_lc), Some(end_text), line, col);
                }
                self.state = State::OutsideMarkup;
                Step::Continue
            }
        }
    }

    fn step_at_declaration_start(&mut self) -> Step {
        // CDATA is recognized only in XML mode or inside <math>/<svg>.
        let looks_like_cdata = self.matches_ahead("[CDATA[");
        if looks_like_cdata && (self.xml_mode || self.svg_math_depth > 0) {
            for _ in 0.."[CDATA[".len() {
                self.bump();
            }
            return self.consume_until("]]>", |content, terminated, line, col, parser| {
                let id = parser.dom.push_child(
                    parser.top(),
                    line,
                    col,
                    NodeKind::CData(RawSpan { content: content.clone() }),
                );
                parser.dom.get_mut(id).terminated = terminated;
                parser.handlers.emit_cdata(SpanEvent {
                    depth: parser.depth(),
                    content,
                    terminated,
                });
            });
        }
        if self.matches_ahead("--") {
            self.bump();
            self.bump();
            self.state = State::AtCommentStart;
            return Step::Continue;
        }
        if self.matches_ahead_ci("doctype") {
            let line = self.line;
            let col = self.column.saturating_sub(2);
            return self.consume_until(">", |content, terminated, _line, _col, parser| {
                let doctype = doctype::parse_doctype(&content);
                if doctype.doctype_kind == crate::dom::DoctypeKind::Xhtml {
                    parser.xml_mode = true;
                }
                let id = parser.dom.push_child(parser.top(), line, col, NodeKind::DocType(doctype.clone()));
                parser.dom.get_mut(id).terminated = terminated;
                parser.handlers.emit_doctype(DoctypeEvent {
                    depth: parser.depth(),
                    doctype,
                    terminated,
                });
            });
        }
        let line = self.line;
        let col = self.column.saturating_sub(2);
        self.consume_until(">", |content, terminated, _line, _col, parser| {
            let id = parser.dom.push_child(parser.top(), line, col, NodeKind::Declaration(RawSpan { content: content.clone() }));
            parser.dom.get_mut(id).terminated = terminated;
            parser.handlers.emit_declaration(SpanEvent {
                depth: parser.depth(),
                content,
                terminated,
            });
        })
    }

    fn step_at_comment_start(&mut self) -> Step {
        self.consume_until("-->", |content, terminated, line, col, parser| {
            let id = parser.dom.push_child(parser.top(), line, col, NodeKind::Comment(RawSpan { content: content.clone() }));
            parser.dom.get_mut(id).terminated = terminated;
            parser.handlers.emit_comment(SpanEvent {
                depth: parser.depth(),
                content,
                terminated,
            });
        })
    }

    fn step_at_processing_start(&mut self) -> Step {
        let line = self.line;
        let col = self.column.saturating_sub(2);
        self.consume_until(">", move |content, terminated, _line, _col, parser| {
            if parser.dom.is_empty() && content.to_ascii_lowercase().starts_with("xml ") {
                parser.xml_mode = true;
            }
            let id = parser.dom.push_child(parser.top(), line, col, NodeKind::ProcessingInstruction(RawSpan { content: content.clone() }));
            parser.dom.get_mut(id).terminated = terminated;
            parser.handlers.emit_processing(SpanEvent {
                depth: parser.depth(),
                content,
                terminated,
            });
        })
    }

    fn step_raw_text(&mut self, kind: RawTextKind) -> Step {
        let close_tag = match kind {
            RawTextKind::Script => "script",
            RawTextKind::Style => "style",
            RawTextKind::Textarea => "textarea",
        };
        let start_line = self.line;
        let start_col = self.column;
        let mut text = String::new();
        loop {
            if let Some(end_len) = self.matches_closing_tag(close_tag) {
                if !text.is_empty() {
                    self.emit_text(std::mem::take(&mut text), start_line, start_col);
                }
                let tag_start_line = self.line;
                let tag_start_col = self.column;
                let mut raw = String::new();
                for _ in 0..end_len {
                    raw.push(self.bump().unwrap());
                }
                let mut inner_ws = String::new();
                while let Some(c) = self.peek() {
                    if crate::char_tables::is_any_whitespace(c) {
                        inner_ws.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                if self.peek() == Some('>') {
                    self.bump();
                    self.pop(
                        Some(close_tag),
                        Some(format!("{raw}{inner_ws}>")),
                        tag_start_line,
                        tag_start_col,
                    );
                    self.handlers.emit_end_tag(EndTagEvent {
                        depth: self.depth(),
                        tag: close_tag.to_string(),
                        inner_whitespace: inner_ws,
                    });
                    self.state = State::OutsideMarkup;
                } else {
                    // Didn't actually terminate; treat as literal text.
                    text.push_str(&raw);
                    text.push_str(&inner_ws);
                }
                return Step::Continue;
            }
            match self.bump() {
                Some(c) => text.push(c),
                None => {
                    if !self.is_final {
                        if !text.is_empty() {
                            self.emit_text(std::mem::take(&mut text), start_line, start_col);
                        }
                        return Step::NeedMoreData;
                    }
                    self.error(format!("unterminated <{close_tag}>"));
                    if !text.is_empty() {
                        self.emit_text(text, start_line, start_col);
                    }
                    self.pop(None, None, self.line, self.column);
                    self.state = State::Done;
                    return Step::Done;
                }
            }
        }
    }

    fn matches_closing_tag(&self, tag: &str) -> Option<usize> {
        if self.peek() != Some('<') || self.peek_at(1) != Some('/') {
            return None;
        }
        let mut i = 2;
        for expect in tag.chars() {
            let c = self.peek_at(i)?;
            if !c.eq_ignore_ascii_case(&expect) {
                return None;
            }
            i += 1;
        }
        Some(i)
    }

    fn matches_ahead(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn matches_ahead_ci(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i).map(|p| p.eq_ignore_ascii_case(&c)).unwrap_or(false))
    }

    /// Consumes characters up to and including `terminator`, calling `emit`
    /// with the gathered content and whether the terminator was actually
    /// found (false at EOF, per the "all errors are recoverable" contract
    /// for unterminated comments/declarations/CDATA/processing
    /// instructions).
    fn consume_until(
        &mut self,
        terminator: &str,
        emit: impl FnOnce(String, bool, usize, usize, &mut Self),
    ) -> Step {
        let line = self.line;
        let col = self.column.checked_sub(2).unwrap_or(0);
        let mut content = String::new();
        loop {
            if self.matches_ahead(terminator) {
                for _ in 0..terminator.chars().count() {
                    self.bump();
                }
                emit(content, true, line, col, self);
                self.state = State::OutsideMarkup;
                return Step::Continue;
            }
            match self.bump() {
                Some(c) => content.push(c),
                None => {
                    if !self.is_final {
                        return Step::NeedMoreData;
                    }
                    self.error("unterminated construct");
                    emit(content, false, line, col, self);
                    self.state = State::Done;
                    return Step::Done;
                }
            }
        }
    }
}

/// Lowercases and strips everything but letters/digits, per `spec.md` §4.3's
/// "normalized name (lowercased, stripped of non-alphanumerics)" rule.
fn normalize_encoding_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Pulls a `charset=...` token out of a `<meta http-equiv="Content-Type"
/// content="...">` value, optionally quoted.
fn extract_charset_from_content(content: &str) -> Option<String> {
    let lower = content.to_ascii_lowercase();
    let pos = lower.find("charset")?;
    let rest = &content[pos + "charset".len()..];
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=')?;
    let rest = rest.trim_start();
    let rest = rest.trim_start_matches(['"', '\'']);
    let end = rest
        .find(|c: char| c == ';' || c == '"' || c == '\'' || c.is_whitespace())
        .unwrap_or(rest.len());
    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn tag_lc_eq(dom: &Dom, id: NodeId, tag: &str) -> bool {
    dom.get(id).as_element().map(|e| e.tag_lc == tag).unwrap_or(false)
}

fn synthesize_element(dom: &mut Dom, parent: NodeId, tag: &str) -> NodeId {
    dom.push_child(
        parent,
        dom.get(parent).line,
        dom.get(parent).column,
        NodeKind::Element(ElementData {
            tag: tag.to_string(),
            tag_lc: tag.to_string(),
            attributes: Vec::new(),
            inner_whitespace: String::new(),
            terminator: ">".to_string(),
            closure_state: ClosureState::ImplicitlyClosed,
            end_tag_text: None,
            end_tag_line: None,
            end_tag_column: None,
            bad_terminator: None,
            synthetic: true,
        }),
    )
}

fn reparent(dom: &mut Dom, node: NodeId, new_parent: NodeId) {
    dom.get_mut(node).parent = Some(new_parent);
    dom.get_mut(new_parent).children.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_to_string(input: &str) -> (String, ParseResults) {
        let tok = Tokenizer::new(ParserOptions::default(), Handlers::new());
        let (tok, results) = tok.parse(input);
        (tok.dom().serialize(ROOT), results)
    }

    #[test]
    fn roundtrips_simple_document() {
        let input = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Sample</title></head>\n<body>Sample<img src=\"/foo.jpg\" width=\"32\" height=\"32\" alt=\"can't\"/></body>\n</html>\n";
        let (out, results) = parse_to_string(input);
        assert_eq!(out, input);
        assert_eq!(results.errors, 0);
    }

    #[test]
    fn unterminated_style_still_roundtrips() {
        let input = "<style>body { color: red; }\nHello";
        let (out, results) = parse_to_string(input);
        assert_eq!(out, input);
        assert!(results.errors >= 1);
    }

    #[test]
    fn misnested_tags_use_adoption_agency_approximation() {
        let input = "<b>1<p>2</b>3</p>";
        let (out, _) = parse_to_string(input);
        assert_eq!(out, input);
    }

    #[test]
    fn li_implicitly_closes_previous_li() {
        let input = "<ul><li>a<li>b</ul>";
        let (out, results) = parse_to_string(input);
        assert_eq!(out, input);
        assert_eq!(results.implicitly_closed_tags, 1);
    }

    #[test]
    fn table_without_sections_gets_synthetic_tbody() {
        let tok = Tokenizer::new(ParserOptions::default(), Handlers::new());
        let (tok, _) = tok.parse("<table><tr><td>a</td></tr></table>");
        let dom = tok.into_dom();
        assert_eq!(dom.serialize(ROOT), "<table><tr><td>a</td></tr></table>");
        let table = dom.get(ROOT).children[0];
        let sections = &dom.get(table).children;
        assert_eq!(sections.len(), 1);
        assert!(dom.get(sections[0]).as_element().unwrap().synthetic);
    }

    #[test]
    fn eol_normalization_rewrites_mixed_line_endings() {
        let mut options = ParserOptions::default();
        options.eol = Eol::CrLf;
        let tok = Tokenizer::new(options, Handlers::new());
        let (tok, _) = tok.parse("a\nb\rc\r\nd");
        assert_eq!(tok.dom().serialize(ROOT), "a\r\nb\r\nc\r\nd");
    }

    #[test]
    fn chunked_feed_reconstructs_crlf_at_boundary() {
        let mut tok = Tokenizer::new(ParserOptions::default(), Handlers::new());
        let input = "@\u{1F600}\r\n\r";
        for (i, c) in input.chars().enumerate() {
            let is_last = i == input.chars().count() - 1;
            let piece = c.to_string();
            if let Some(results) = tok.push_chunk(&piece, is_last) {
                assert_eq!(results.stopped, false);
            }
        }
        assert_eq!(tok.dom().serialize(ROOT), input);
    }

    #[test]
    fn unmatched_end_tag_is_preserved_and_reported() {
        let input = "<p>hi</div>";
        let (out, results) = parse_to_string(input);
        assert_eq!(out, input);
        assert!(results.errors >= 1);
    }

    #[test]
    fn unterminated_comment_roundtrips_without_synthesizing_a_closer() {
        let input = "<p>hi</p><!-- oops, no closer";
        let (out, results) = parse_to_string(input);
        assert_eq!(out, input);
        assert!(results.errors >= 1);
    }

    #[test]
    fn unterminated_doctype_roundtrips_without_synthesizing_a_closer() {
        let input = "<!DOCTYPE html";
        let (out, results) = parse_to_string(input);
        assert_eq!(out, input);
        assert!(results.errors >= 1);
    }

    #[test]
    fn meta_charset_invokes_the_encoding_callback() {
        use std::sync::{Arc, Mutex};

        let seen: Arc<Mutex<Vec<(String, String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let mut handlers = Handlers::new();
        handlers.encoding = Some(Box::new(move |name, normalized, explicit| {
            seen_cb.lock().unwrap().push((name.to_string(), normalized.to_string(), explicit));
            false
        }));
        let tok = Tokenizer::new(ParserOptions::default(), handlers);
        let _ = tok.parse("<head><meta charset=\"UTF-8\"></head>");
        assert_eq!(seen.lock().unwrap().as_slice(), &[("UTF-8".to_string(), "utf8".to_string(), true)]);
    }

    #[test]
    fn encoding_callback_returning_true_aborts_the_parse() {
        let mut handlers = Handlers::new();
        handlers.encoding = Some(Box::new(|_name, _normalized, _explicit| true));
        let tok = Tokenizer::new(ParserOptions::default(), handlers);
        let (_, results) = tok.parse("<head><meta charset=\"shift-jis\"><title>x</title></head>");
        assert!(results.stopped);
    }

    #[test]
    fn completion_event_fires_with_final_results() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let fired = Arc::new(AtomicBool::new(false));
        let fired_cb = fired.clone();
        let mut handlers = Handlers::new();
        handlers.completion = Some(Box::new(move |results| {
            fired_cb.store(true, Ordering::SeqCst);
            assert_eq!(results.errors, 0);
        }));
        let tok = Tokenizer::new(ParserOptions::default(), handlers);
        let _ = tok.parse("<p>hi</p>");
        assert!(fired.load(Ordering::SeqCst));
    }
}
