//! Error types (`spec.md` §7): a value the caller is expected to handle
//! (`HtmlError`) versus a panic-on-misuse condition for calling-code bugs
//! rather than bad input (`UnsupportedOperation`).

use std::fmt;

/// Returned from fallible parser operations. Never constructed from
/// malformed markup itself -- malformed markup is the entire reason this
/// parser exists, and is reported through the `error` event instead (see
/// [`ParseError`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlError {
    /// The document declared an encoding mid-stream after non-ASCII bytes
    /// had already been interpreted under a different one.
    UnsupportedEncodingSwitch { from: String, to: String },
    /// The caller resumed a parser that had not reached a
    /// completed/stopped/reset state (`spec.md` §5: "a parser instance is
    /// not reentrant").
    ParserBusy,
    /// The input bytes were not valid UTF-8 once decoded under the
    /// negotiated encoding.
    Utf8(std::str::Utf8Error),
}

impl fmt::Display for HtmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HtmlError::UnsupportedEncodingSwitch { from, to } => {
                write!(f, "cannot switch encoding from {from} to {to} mid-document")
            }
            HtmlError::ParserBusy => {
                write!(f, "parser is mid-parse; finish, stop, or reset it first")
            }
            HtmlError::Utf8(e) => write!(f, "invalid UTF-8 in input: {e}"),
        }
    }
}

impl std::error::Error for HtmlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HtmlError::Utf8(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::str::Utf8Error> for HtmlError {
    fn from(e: std::str::Utf8Error) -> Self {
        HtmlError::Utf8(e)
    }
}

/// A recoverable parse diagnostic delivered through the `error` event
/// (`spec.md` §5, §7). Unlike [`HtmlError`] this does not stop the parse;
/// the tokenizer has already decided how it is recovering and is only
/// informing the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// Source bytes still queued for the current chunk, for callers that
    /// want to log context around the error.
    pub pending_source: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

/// Panics raised directly rather than returned: calling code asked the
/// parser to do something that is always a programming mistake (resolving
/// a bookmark that was never set, registering the same event twice under
/// different handlers, etc). A `panic!` macro invocation through this type
/// keeps call sites readable without introducing a second error enum that
/// callers would have to match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedOperation(pub String);

impl fmt::Display for UnsupportedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported operation: {}", self.0)
    }
}

impl std::error::Error for UnsupportedOperation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_human_readable() {
        let e = HtmlError::ParserBusy;
        assert_eq!(e.to_string(), "parser is mid-parse; finish, stop, or reset it first");

        let e = ParseError {
            message: "unterminated comment".into(),
            line: 3,
            column: 7,
            pending_source: String::new(),
        };
        assert_eq!(e.to_string(), "unterminated comment at 3:7");
    }
}
