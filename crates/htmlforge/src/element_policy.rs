//! Element policy tables (`spec.md` §2, §4.4, §4.5): void elements, the
//! formatting/marker sets used by the pragmatic adoption-agency
//! approximation, the open-implies-close map, raw-text elements, and the
//! formatter's default inline set.

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use std::sync::LazyLock;

pub fn is_void_element(tag_lc: &str) -> bool {
    matches!(
        tag_lc,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose text content is raw (never interpreted as markup).
pub fn raw_text_element(tag_lc: &str) -> Option<RawTextKind> {
    match tag_lc {
        "script" => Some(RawTextKind::Script),
        "style" => Some(RawTextKind::Style),
        "textarea" => Some(RawTextKind::Textarea),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTextKind {
    Script,
    Style,
    Textarea,
}

/// HTML5 "formatting" element category, subject to the adoption-agency
/// approximation in `spec.md` §4.4.
pub fn is_formatting_element(tag_lc: &str) -> bool {
    matches!(
        tag_lc,
        "a" | "b"
            | "big"
            | "code"
            | "em"
            | "font"
            | "i"
            | "nobr"
            | "s"
            | "small"
            | "strike"
            | "strong"
            | "tt"
            | "u"
    )
}

/// Elements that block the formatting-element search (`spec.md` GLOSSARY
/// "Marker element").
pub fn is_marker_element(tag_lc: &str) -> bool {
    matches!(
        tag_lc,
        "applet" | "object" | "marquee" | "template" | "td" | "th" | "caption"
    )
}

static OPEN_IMPLIES_CLOSE: LazyLock<FxHashMap<&'static str, FxHashSet<&'static str>>> =
    LazyLock::new(|| {
        let mut map: FxHashMap<&'static str, FxHashSet<&'static str>> = FxHashMap::default();
        let mut set = |closer: &'static str, closed: &[&'static str]| {
            map.insert(closer, closed.iter().copied().collect());
        };
        set("li", &["li"]);
        set("dt", &["dt", "dd"]);
        set("dd", &["dt", "dd"]);
        set(
            "option",
            &["option"],
        );
        set("optgroup", &["option", "optgroup"]);
        set(
            "p",
            &[
                "p", "address", "article", "aside", "blockquote", "details", "div", "dl",
                "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4",
                "h5", "h6", "header", "hr", "main", "menu", "nav", "ol", "pre", "section",
                "table", "ul",
            ],
        );
        set("tr", &["tr", "td", "th"]);
        set("td", &["td", "th"]);
        set("th", &["td", "th"]);
        set("thead", &["tr", "td", "th"]);
        set("tbody", &["tr", "td", "th", "thead", "tbody"]);
        set("tfoot", &["tr", "td", "th", "thead", "tbody"]);
        set("colgroup", &["colgroup"]);
        set("caption", &["caption"]);
        set(
            "select",
            &["option", "optgroup"],
        );
        set("rp", &["rp", "rt"]);
        set("rt", &["rp", "rt"]);
        map
    });

/// Tags closed by `prePush` when opening `new_tag_lc` while they are the
/// current top of the open-stack (`spec.md` §4.4).
pub fn implicitly_closes(new_tag_lc: &str, currently_open_tag_lc: &str) -> bool {
    OPEN_IMPLIES_CLOSE
        .get(new_tag_lc)
        .is_some_and(|closed| closed.contains(currently_open_tag_lc))
}

/// Default inline tag set used by the formatter's `inline` option.
pub fn default_inline_tags() -> FxHashSet<&'static str> {
    [
        "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "data", "dfn", "em", "i", "kbd",
        "mark", "q", "rp", "rt", "ruby", "s", "samp", "small", "span", "strong", "sub", "sup",
        "time", "u", "var", "wbr", "img", "input", "button", "label", "select", "textarea",
    ]
    .into_iter()
    .collect()
}

/// Default "children not indented" tag set used by the formatter.
pub fn default_children_not_indented() -> FxHashSet<&'static str> {
    ["html", "body"].into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("img"));
        assert!(!is_void_element("div"));
    }

    #[test]
    fn open_implies_close_li() {
        assert!(implicitly_closes("li", "li"));
        assert!(!implicitly_closes("li", "p"));
    }

    #[test]
    fn open_implies_close_p_closes_block_elements() {
        assert!(implicitly_closes("p", "p"));
        assert!(implicitly_closes("p", "div"));
        assert!(implicitly_closes("p", "ul"));
        assert!(!implicitly_closes("p", "span"));
    }

    #[test]
    fn formatting_and_marker_sets() {
        assert!(is_formatting_element("b"));
        assert!(!is_formatting_element("div"));
        assert!(is_marker_element("td"));
        assert!(is_marker_element("object"));
        assert!(!is_marker_element("b"));
    }
}
