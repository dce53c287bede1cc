//! DOCTYPE content parsing (`spec.md` §3, §4.3 "AT_DECLARATION_START").
//!
//! `content` is everything between `<!` and the terminating `>`, already
//! captured by the tokenizer; this module only classifies it into
//! `{type, variety, version}` and decides whether the document enters XML
//! mode.

use crate::dom::{DocTypeData, DoctypeKind, DoctypeVariety};

/// Parses DOCTYPE `content` (without the leading `<!` or trailing `>`).
/// `content` is expected to start with `doctype` (checked by the caller);
/// this function only inspects what follows.
pub fn parse_doctype(content: &str) -> DocTypeData {
    let body = content
        .get(content.char_indices().nth(7).map(|(i, _)| i).unwrap_or(content.len())..)
        .unwrap_or("")
        .trim_start();

    let public_identifier = extract_quoted_after(body, "PUBLIC");
    let system_identifier = extract_quoted_after(body, "SYSTEM");
    let haystack = public_identifier.as_deref().unwrap_or("");

    let doctype_kind = if haystack.to_ascii_uppercase().contains("XHTML") {
        DoctypeKind::Xhtml
    } else {
        DoctypeKind::Html
    };

    let variety = if haystack.to_ascii_uppercase().contains("FRAMESET") {
        DoctypeVariety::Frameset
    } else if haystack.to_ascii_uppercase().contains("TRANSITIONAL") {
        DoctypeVariety::Transitional
    } else if haystack.to_ascii_uppercase().contains("STRICT") {
        DoctypeVariety::Strict
    } else {
        DoctypeVariety::Unknown
    };

    let version = extract_version(haystack).unwrap_or_else(|| {
        if public_identifier.is_none() && system_identifier.is_none() {
            "5".to_string()
        } else {
            String::new()
        }
    });

    DocTypeData {
        content: content.to_string(),
        doctype_kind,
        variety,
        version,
    }
}

fn extract_quoted_after<'a>(body: &'a str, keyword: &str) -> Option<&'a str> {
    let upper = body.to_ascii_uppercase();
    let pos = upper.find(keyword)?;
    let rest = &body[pos + keyword.len()..];
    let start = rest.find(['"', '\''])?;
    let quote = rest.as_bytes()[start] as char;
    let after_quote = &rest[start + 1..];
    let end = after_quote.find(quote)?;
    Some(&after_quote[..end])
}

/// Pulls a dotted version number like `4.01` or `1.0` out of a public
/// identifier such as `-//W3C//DTD HTML 4.01 Transitional//EN`.
fn extract_version(identifier: &str) -> Option<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            let mut saw_dot = false;
            let mut j = i;
            while j < chars.len() && (chars[j].is_ascii_digit() || (chars[j] == '.' && !saw_dot)) {
                if chars[j] == '.' {
                    saw_dot = true;
                }
                j += 1;
            }
            if j > start {
                return Some(chars[start..j].iter().collect());
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_html5_doctype() {
        let d = parse_doctype("doctype html");
        assert_eq!(d.doctype_kind, DoctypeKind::Html);
        assert_eq!(d.version, "5");
        assert_eq!(d.variety, DoctypeVariety::Unknown);
    }

    #[test]
    fn xhtml_strict_public_identifier() {
        let d = parse_doctype(
            "doctype html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\"",
        );
        assert_eq!(d.doctype_kind, DoctypeKind::Xhtml);
        assert_eq!(d.variety, DoctypeVariety::Strict);
        assert_eq!(d.version, "1.0");
    }

    #[test]
    fn html401_transitional() {
        let d = parse_doctype(
            "doctype HTML PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\" \"http://www.w3.org/TR/html4/loose.dtd\"",
        );
        assert_eq!(d.doctype_kind, DoctypeKind::Html);
        assert_eq!(d.variety, DoctypeVariety::Transitional);
        assert_eq!(d.version, "4.01");
    }
}
