//! Integration tests for the round-trip and scenario properties in
//! `spec.md` §8.

use htmlforge::events::Handlers;
use htmlforge::{dom::ROOT, parse, ParserOptions};
use quickcheck_macros::quickcheck;

fn roundtrip(input: &str) -> bool {
    let (dom, _) = parse(ParserOptions::default(), Handlers::new(), input);
    dom.serialize(ROOT) == input
}

#[quickcheck]
fn arbitrary_text_roundtrips(s: String) -> bool {
    // Restrict to inputs without '<' so quickcheck exercises the common
    // plain-text path without also having to generate well-formed markup.
    if s.contains('<') || s.contains('\0') {
        return true;
    }
    roundtrip(&s)
}

#[test]
fn doctype_and_basic_document_roundtrip() {
    let input = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Sample</title></head>\n<body>Sample<img src=\"/foo.jpg\" width=\"32\" height=\"32\" alt=\"can't\"/></body>\n</html>\n";
    let (dom, results) = parse(ParserOptions::default(), Handlers::new(), input);
    assert_eq!(dom.serialize(ROOT), input);
    assert_eq!(results.errors, 0);
}

#[test]
fn unterminated_style_tag_still_roundtrips_with_an_error() {
    let input = "<style>\nbody { color: red }\nand some normal content after it";
    let (dom, results) = parse(ParserOptions::default(), Handlers::new(), input);
    assert_eq!(dom.serialize(ROOT), input);
    assert!(results.errors >= 1);
}

#[test]
fn deeply_misnested_tags_still_roundtrip() {
    assert!(roundtrip("<b>1<p>2</b>3</p>"));
}

#[test]
fn self_closing_and_void_elements_roundtrip() {
    assert!(roundtrip("<br><hr/><img src=\"a.png\">"));
}

#[test]
fn comments_and_declarations_roundtrip() {
    assert!(roundtrip("<!-- a comment --><!DOCTYPE html><p>hi</p>"));
}

#[test]
fn unmatched_closing_tag_is_preserved_verbatim() {
    let input = "<p>hello</div><p>world</p>";
    let (dom, results) = parse(ParserOptions::default(), Handlers::new(), input);
    assert_eq!(dom.serialize(ROOT), input);
    assert!(results.errors >= 1);
}
