//! A forgiving, lossless HTML/XHTML tokenizer, DOM, and pretty-printer.
//!
//! `htmlforge` ingests arbitrary, often malformed, HTML text and produces
//! a stream of syntactic events plus a document tree that reproduces the
//! original bytes exactly when serialized. A separate [`formatter`] pass
//! can reformat that tree under configurable style rules.
//!
//! ```
//! use htmlforge::{parse, ParserOptions};
//! use htmlforge::events::Handlers;
//!
//! let (dom, results) = parse(ParserOptions::default(), Handlers::new(), "<p>hi</p>");
//! assert_eq!(dom.serialize(htmlforge::dom::ROOT), "<p>hi</p>");
//! assert_eq!(results.errors, 0);
//! ```

pub mod char_tables;
pub mod dom;
pub mod doctype;
pub mod element_policy;
pub mod errors;
pub mod events;
pub mod formatter;
pub mod tokenizer;

pub use dom::Dom;
pub use errors::{HtmlError, ParseError, UnsupportedOperation};
pub use events::{Handlers, ParseResults};
pub use formatter::{format, HtmlFormatOptions};
pub use tokenizer::{Eol, ParserOptions, Tokenizer};

/// Whole-string synchronous parse (`spec.md` §4.3 mode 1): the common
/// case for documents small enough not to need chunking or yielding.
pub fn parse(options: ParserOptions, handlers: Handlers, input: &str) -> (Dom, ParseResults) {
    let tokenizer = Tokenizer::new(options, handlers);
    let (tokenizer, results) = tokenizer.parse(input);
    (tokenizer.into_dom(), results)
}
