//! Named-entity tables and the HTML entity escape/unescape/re-encode codec.
//!
//! The lookup tables are built once, from a flat static list, into
//! prefix-bucketed maps sorted by suffix length (longest first) so that
//! ambiguous prefixes (`amp` vs. `apos`, `lt` vs. `ltdot`) resolve to the
//! longest matching name, mirroring how real HTML entity tables are packed.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// U+FFFD REPLACEMENT CHARACTER
const UNICODE_REPLACEMENT_CHAR: &[u8] = b"\xEF\xBF\xBD";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HtmlContext {
    Attribute,
    BodyText,
    ForeignText,
    Script,
    Style,
}

/// `(name, decoded)` for every named reference this crate knows about.
///
/// This is a curated subset of the WHATWG named-character-reference table,
/// not the full ~2,200-entry dataset: enough common names, case variants,
/// and the non-BMP / multi-codepoint entries exercised by this crate's
/// tests and by consumers of the codec.
static NAMED_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("AMP", "&"),
    ("lt", "<"),
    ("LT", "<"),
    ("gt", ">"),
    ("GT", ">"),
    ("quot", "\""),
    ("QUOT", "\""),
    ("apos", "'"),
    ("nbsp", "\u{A0}"),
    ("copy", "\u{A9}"),
    ("COPY", "\u{A9}"),
    ("reg", "\u{AE}"),
    ("REG", "\u{AE}"),
    ("trade", "\u{2122}"),
    ("TRADE", "\u{2122}"),
    ("hellip", "\u{2026}"),
    ("mdash", "\u{2014}"),
    ("ndash", "\u{2013}"),
    ("euro", "\u{20AC}"),
    ("laquo", "\u{AB}"),
    ("raquo", "\u{BB}"),
    ("deg", "\u{B0}"),
    ("plusmn", "\u{B1}"),
    ("times", "\u{D7}"),
    ("divide", "\u{F7}"),
    ("frac12", "\u{BD}"),
    ("frac14", "\u{BC}"),
    ("frac34", "\u{BE}"),
    ("sup1", "\u{B9}"),
    ("sup2", "\u{B2}"),
    ("sup3", "\u{B3}"),
    ("middot", "\u{B7}"),
    ("iexcl", "\u{A1}"),
    ("iquest", "\u{BF}"),
    ("cent", "\u{A2}"),
    ("pound", "\u{A3}"),
    ("yen", "\u{A5}"),
    ("curren", "\u{A4}"),
    ("sect", "\u{A7}"),
    ("para", "\u{B6}"),
    ("AElig", "\u{C6}"),
    ("aelig", "\u{E6}"),
    ("Aacute", "\u{C1}"),
    ("aacute", "\u{E1}"),
    ("Eacute", "\u{C9}"),
    ("eacute", "\u{E9}"),
    ("Oacute", "\u{D3}"),
    ("oacute", "\u{F3}"),
    ("Uacute", "\u{DA}"),
    ("uacute", "\u{FA}"),
    ("Uuml", "\u{DC}"),
    ("uuml", "\u{FC}"),
    ("Ouml", "\u{D6}"),
    ("ouml", "\u{F6}"),
    ("Auml", "\u{C4}"),
    ("auml", "\u{E4}"),
    ("szlig", "\u{DF}"),
    ("Ccedil", "\u{C7}"),
    ("ccedil", "\u{E7}"),
    ("Ntilde", "\u{D1}"),
    ("ntilde", "\u{F1}"),
    ("circ", "\u{2C6}"),
    ("tilde", "\u{2DC}"),
    ("larr", "\u{2190}"),
    ("uarr", "\u{2191}"),
    ("rarr", "\u{2192}"),
    ("darr", "\u{2193}"),
    ("harr", "\u{2194}"),
    ("spades", "\u{2660}"),
    ("clubs", "\u{2663}"),
    ("hearts", "\u{2665}"),
    ("diams", "\u{2666}"),
    ("bull", "\u{2022}"),
    ("dagger", "\u{2020}"),
    ("Dagger", "\u{2021}"),
    ("permil", "\u{2030}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201C}"),
    ("rdquo", "\u{201D}"),
    ("sbquo", "\u{201A}"),
    ("bdquo", "\u{201E}"),
    ("lsaquo", "\u{2039}"),
    ("rsaquo", "\u{203A}"),
    ("ensp", "\u{2002}"),
    ("emsp", "\u{2003}"),
    ("thinsp", "\u{2009}"),
    ("zwnj", "\u{200C}"),
    ("zwj", "\u{200D}"),
    ("lrm", "\u{200E}"),
    ("rlm", "\u{200F}"),
    ("shy", "\u{AD}"),
    ("minus", "\u{2212}"),
    ("infin", "\u{221E}"),
    ("ne", "\u{2260}"),
    ("le", "\u{2264}"),
    ("ge", "\u{2265}"),
    ("sum", "\u{2211}"),
    ("prod", "\u{220F}"),
    ("radic", "\u{221A}"),
    // Non-BMP named reference (requires a UTF-16 surrogate pair in engines
    // that represent text as UTF-16; decodes to a single Unicode scalar
    // value here because Rust strings are always valid UTF-8).
    ("efr", "\u{1D522}"),
    // Two-codepoint named reference: base character plus a variation
    // selector. `unescape`/`escape` both treat the decoded value as an
    // indivisible two-character run.
    ("gesl", "\u{22DB}\u{FE00}"),
];

lazy_static! {
    /// `name[..2] -> [(rest-of-name, decoded)]`, longest `rest-of-name` first.
    static ref ENTITIES: HashMap<[u8; 2], Vec<(&'static [u8], &'static str)>> = {
        let mut map: HashMap<[u8; 2], Vec<(&'static [u8], &'static str)>> = HashMap::new();
        for &(name, decoded) in NAMED_ENTITIES {
            let bytes = name.as_bytes();
            if bytes.len() < 2 {
                continue;
            }
            let prefix = [bytes[0], bytes[1]];
            map.entry(prefix).or_default().push((&bytes[2..], decoded));
        }
        for entries in map.values_mut() {
            entries.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        }
        map
    };

    /// decoded single codepoint -> preferred entity name (lower-case preferred,
    /// shortest name preferred).
    static ref REVERSE_SINGLE: HashMap<char, &'static str> = {
        let mut map: HashMap<char, &'static str> = HashMap::new();
        for &(name, decoded) in NAMED_ENTITIES {
            let mut chars = decoded.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                continue;
            };
            map.entry(c)
                .and_modify(|existing| {
                    if is_preferred_name(name, existing) {
                        *existing = name;
                    }
                })
                .or_insert(name);
        }
        map
    };

    /// decoded two-codepoint sequence -> entity name.
    static ref REVERSE_PAIR: HashMap<(char, char), &'static str> = {
        let mut map = HashMap::new();
        for &(name, decoded) in NAMED_ENTITIES {
            let mut chars = decoded.chars();
            if let (Some(a), Some(b), None) = (chars.next(), chars.next(), chars.next()) {
                map.entry((a, b)).or_insert(name);
            }
        }
        map
    };
}

/// Prefers shorter names, and among equal lengths prefers the one that is
/// already lower-case.
fn is_preferred_name(candidate: &str, existing: &str) -> bool {
    match candidate.len().cmp(&existing.len()) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => {
            let candidate_lower = candidate.chars().all(|c| !c.is_ascii_uppercase());
            let existing_lower = existing.chars().all(|c| !c.is_ascii_uppercase());
            candidate_lower && !existing_lower
        }
    }
}

pub fn decode(ctx: &HtmlContext, input: &[u8]) -> Box<[u8]> {
    let mut decoded: Vec<u8> = Vec::new();
    let end = input.len();
    let mut at = 0;
    let mut was_at = 0;

    while at + 3 < end {
        let next_character_reference_at = if let Some(pos) = memchr::memchr(b'&', &input[at..]) {
            at + pos
        } else {
            break;
        };

        if let Some((character_reference, token_len)) =
            decode_html_ref(ctx, input, next_character_reference_at)
        {
            if *ctx == HtmlContext::Attribute {
                let is_ambiguous_entity_terminator =
                    input[next_character_reference_at + token_len - 1] != b';';

                // Ambiguous entities are not terminated by a semicolon _and_ have trailing
                // characters that are alphanumeric or "=".
                if is_ambiguous_entity_terminator
                    && (end > next_character_reference_at + token_len
                        && (input[next_character_reference_at + token_len].is_ascii_alphanumeric()
                            || input[next_character_reference_at + token_len] == b'='))
                {
                    at += 1;
                    continue;
                }
            }

            at = next_character_reference_at;
            decoded.extend_from_slice(&input[was_at..at]);
            decoded.extend_from_slice(character_reference.as_bytes());
            at += token_len;
            was_at = at;
            continue;
        }

        at += 1;
    }

    if was_at < end {
        decoded.extend_from_slice(&input[was_at..]);
    }

    decoded.into_boxed_slice()
}

/// Decodes a single reference to an HTML entity starting at `offset`.
///
/// Returns the decoded text and the byte length of the matched reference
/// (including the leading `&` and, if present, the trailing `;`).
pub fn decode_html_ref(ctx: &HtmlContext, input: &[u8], offset: usize) -> Option<(String, usize)> {
    if input.len() < offset + 2 {
        return None;
    }

    if input[offset] != b'&' {
        return None;
    }

    if input[offset + 1] == b'#' {
        return decode_html5_numeric_character_reference(input, offset);
    }

    if input.len() < offset + 3 {
        return None;
    }

    let prefix = [input[offset + 1], input[offset + 2]];
    let candidates = ENTITIES.get(&prefix)?;
    let _ = ctx;
    candidates
        .iter()
        .find_map(|(suffix, decoded)| -> Option<(String, usize)> {
            let len = suffix.len();
            if offset + 3 + len > input.len() {
                return None;
            }
            let candidate = &input[offset + 3..offset + 3 + len];
            if candidate != *suffix {
                return None;
            }
            // The trailing `;` is optional for named references (a legacy
            // HTML quirk); consume it when present.
            let base_len = 3 + len;
            let has_semicolon = input.get(offset + base_len) == Some(&b';');
            let total_len = if has_semicolon { base_len + 1 } else { base_len };
            Some(((*decoded).to_string(), total_len))
        })
}

fn decode_html5_numeric_character_reference(input: &[u8], offset: usize) -> Option<(String, usize)> {
    static HEX_DIGITS: [u8; 256] = {
        let mut table = [255u8; 256];
        let mut i = 0;
        while i < 10 {
            table[b'0' as usize + i] = i as u8;
            i += 1;
        }
        let mut i = 0;
        while i < 6 {
            table[b'a' as usize + i] = 10 + i as u8;
            table[b'A' as usize + i] = 10 + i as u8;
            i += 1;
        }
        table
    };

    static CP1252_REPLACEMENTS: [u32; 32] = [
        0x20AC, 0x81, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160,
        0x2039, 0x0152, 0x8D, 0x017D, 0x8F, 0x90, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013,
        0x2014, 0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0x9D, 0x017E, 0x0178,
    ];

    let end = input.len();
    let mut at = offset;

    if end < offset + 3 || input[at] != b'&' || input[at + 1] != b'#' {
        return None;
    }

    at += 2;

    #[derive(PartialEq)]
    enum Base {
        Decimal,
        Hexadecimal,
    }

    let base = if at < end && b'X' == (input[at] & 0xDF) {
        at += 1;
        Base::Hexadecimal
    } else {
        Base::Decimal
    };

    let zeros_at = at;
    while at < end && b'0' == input[at] {
        at += 1;
    }
    let zero_count = at - zeros_at;

    let digits_at = at;
    if base == Base::Hexadecimal {
        while at < end && HEX_DIGITS[input[at] as usize] <= 0xF {
            at += 1;
        }
    } else {
        while at < end && HEX_DIGITS[input[at] as usize] <= 0x9 {
            at += 1;
        }
    }
    let digit_count = at - digits_at;
    let after_digits = at;

    let has_trailing_semicolon = (after_digits < end) && b';' == input[after_digits];
    let end_of_span = if has_trailing_semicolon {
        after_digits + 1
    } else {
        after_digits
    };
    let matched_byte_length = end_of_span - offset;

    if zero_count == 0 && digit_count == 0 {
        return None;
    }

    let replacement = || {
        Some((
            String::from_utf8(UNICODE_REPLACEMENT_CHAR.to_vec()).unwrap(),
            matched_byte_length,
        ))
    };

    if digit_count == 0 {
        return replacement();
    }

    if digit_count > if base == Base::Hexadecimal { 6 } else { 7 } {
        return replacement();
    }

    let mut code_point = 0u32;
    at = digits_at;
    if base == Base::Hexadecimal {
        for _ in 0..digit_count {
            code_point = (code_point << 4) + HEX_DIGITS[input[at] as usize] as u32;
            at += 1;
        }
    } else {
        for _ in 0..digit_count {
            code_point = code_point * 10 + HEX_DIGITS[input[at] as usize] as u32;
            at += 1;
        }
    }

    if (0x80..=0x9F).contains(&code_point) {
        code_point = CP1252_REPLACEMENTS[(code_point - 0x80) as usize];
    }

    if !is_valid_entity(code_point) {
        return replacement();
    }

    Some((
        char::from_u32(code_point)
            .map(String::from)
            .unwrap_or_else(|| "\u{FFFD}".to_string()),
        matched_byte_length,
    ))
}

/// A numeric character reference's codepoint is valid per `spec.md` §4.2:
/// in range, not a carriage return, not a C1 control, not a surrogate half.
pub fn is_valid_entity(cp: u32) -> bool {
    cp > 0 && cp <= 0x10FFFF && cp != 0x0D && !(0x80..=0x9F).contains(&cp) && !(0xD800..=0xDFFF).contains(&cp)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityStyle {
    Decimal,
    Hex,
    NumericShortest,
    NamedOrDecimal,
    NamedOrHex,
    NamedOrShortest,
    Shortest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReencodePolicy {
    DontChange,
    RepairOnly,
    LooseMinimal,
    Minimal,
    NamedEntities,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    SevenBit,
    EightBit,
    Unicode,
}

impl Target {
    pub fn cap(self) -> u32 {
        match self {
            Target::SevenBit => 0x7E,
            Target::EightBit => 0xFF,
            Target::Unicode => 0x10FFFF,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EscapeOptions {
    pub entity_style: EntityStyle,
    pub reencode: ReencodePolicy,
    pub target: Target,
    pub undo_unneeded_entities: bool,
}

impl Default for EscapeOptions {
    fn default() -> Self {
        Self {
            entity_style: EntityStyle::NamedOrShortest,
            reencode: ReencodePolicy::Minimal,
            target: Target::Unicode,
            undo_unneeded_entities: false,
        }
    }
}

fn is_markup_start_char(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | ':' | '/' | '!' | '?')
}

/// Codepoints that must be escaped regardless of `reencode` policy: C0
/// controls other than HTML whitespace, and the C1 control block.
fn requires_mandatory_escape(c: char) -> bool {
    let cp = c as u32;
    if cp < 0x20 {
        !matches!(c, '\t' | '\n' | '\x0C' | '\r' | ' ')
    } else {
        (0x7F..=0x9F).contains(&cp)
    }
}

fn numeric_form(c: char, style: EntityStyle) -> String {
    let cp = c as u32;
    match style {
        EntityStyle::Hex | EntityStyle::NamedOrHex => format!("&#x{:X};", cp),
        EntityStyle::NumericShortest | EntityStyle::Shortest => {
            let dec = format!("&#{};", cp);
            let hex = format!("&#x{:X};", cp);
            if hex.len() < dec.len() {
                hex
            } else {
                dec
            }
        }
        _ => format!("&#{};", cp),
    }
}

fn named_form_allowed(style: EntityStyle) -> bool {
    matches!(
        style,
        EntityStyle::NamedOrDecimal | EntityStyle::NamedOrHex | EntityStyle::NamedOrShortest
    )
}

/// Escapes `text` to entities under the given policy (`spec.md` §4.2).
pub fn escape_to_entities(text: &str, opts: &EscapeOptions) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let cap = opts.target.cap();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if named_form_allowed(opts.entity_style) && i + 1 < chars.len() {
            if let Some(name) = REVERSE_PAIR.get(&(c, chars[i + 1])) {
                out.push('&');
                out.push_str(name);
                out.push(';');
                i += 2;
                continue;
            }
        }

        let must_escape = requires_mandatory_escape(c);
        let over_cap = (c as u32) > cap;
        let policy_wants_escape = match opts.reencode {
            ReencodePolicy::DontChange | ReencodePolicy::RepairOnly => false,
            ReencodePolicy::LooseMinimal => {
                (c == '<' && chars.get(i + 1).copied().map(is_markup_start_char).unwrap_or(true))
                    || (c == '&'
                        && chars
                            .get(i + 1)
                            .map(|n| n.is_ascii_lowercase() || n.is_ascii_digit() || *n == '#')
                            .unwrap_or(false))
            }
            ReencodePolicy::Minimal => matches!(c, '<' | '>' | '&'),
            ReencodePolicy::NamedEntities => {
                matches!(c, '<' | '>' | '&') || REVERSE_SINGLE.contains_key(&c)
            }
        };

        if must_escape || over_cap || policy_wants_escape {
            if named_form_allowed(opts.entity_style) {
                if let Some(name) = REVERSE_SINGLE.get(&c) {
                    out.push('&');
                    out.push_str(name);
                    out.push(';');
                    i += 1;
                    continue;
                }
            }
            out.push_str(&numeric_form(c, opts.entity_style));
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}

/// Unescapes entities in `text`. Unknown or malformed entities become
/// `U+FFFD`. Ambiguous entities (no trailing `;`, followed by an
/// alphanumeric or `=`) are left as literal text when `for_attribute_value`.
pub fn unescape_entities(text: &str, for_attribute_value: bool) -> String {
    let ctx = if for_attribute_value {
        HtmlContext::Attribute
    } else {
        HtmlContext::BodyText
    };
    let decoded = decode(&ctx, text.as_bytes());
    String::from_utf8(decoded.into_vec()).unwrap_or_else(|_| text.to_string())
}

/// Splits `text` into alternating plain/entity runs, validates each entity,
/// optionally repairs a missing trailing `;`, and optionally unescapes
/// entities that can be represented literally under `opts.target`.
pub fn reencode(text: &str, opts: &EscapeOptions) -> String {
    if matches!(opts.reencode, ReencodePolicy::DontChange) {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut was_at = 0usize;
    let mut at = 0usize;

    while at < bytes.len() {
        if bytes[at] != b'&' {
            at += 1;
            continue;
        }

        let Some((decoded, len)) = decode_html_ref(&HtmlContext::BodyText, bytes, at) else {
            at += 1;
            continue;
        };

        out.push_str(&text[was_at..at]);

        let is_valid = decoded.chars().all(|c| c != '\u{FFFD}');
        let ends_with_semicolon = bytes.get(at + len - 1) == Some(&b';');

        if !is_valid {
            out.push_str(&text[at..at + len]);
        } else if opts.undo_unneeded_entities
            && decoded.chars().all(|c| (c as u32) <= opts.target.cap() && !requires_mandatory_escape(c))
            && !matches!(decoded.as_str(), "<" | ">" | "&")
        {
            out.push_str(&decoded);
        } else if !ends_with_semicolon && !matches!(opts.reencode, ReencodePolicy::RepairOnly) {
            out.push_str(&text[at..at + len]);
            out.push(';');
        } else {
            out.push_str(&text[at..at + len]);
        }

        at += len;
        was_at = at;
    }

    out.push_str(&text[was_at..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_out_of_range_numeric_hex_entity() {
        let decoded = decode(&HtmlContext::BodyText, b"&#xFFFFFF;");
        assert_eq!(String::from_utf8(decoded.to_vec()).unwrap(), "\u{FFFD}");
    }

    #[test]
    fn decode_ref_out_of_range_numeric_hex_entity() {
        let (decoded, token_len) =
            decode_html_ref(&HtmlContext::BodyText, b"&#xFFFFFF;", 0).unwrap();
        assert_eq!(decoded, "\u{FFFD}");
        assert_eq!(token_len, 10);
    }

    #[test]
    fn test_named_entities() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&amp;", 0),
            Some(("&".to_string(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&lt;", 0),
            Some(("<".to_string(), 4))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&nbsp", 0),
            Some(("\u{A0}".to_string(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&nbsp;", 0),
            Some(("\u{A0}".to_string(), 6))
        );
    }

    #[test]
    fn test_numeric_decimal_entities() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#65;", 0),
            Some(("A".to_string(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#8364;", 0),
            Some(("\u{20AC}".to_string(), 7))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#65", 0),
            Some(("A".to_string(), 4))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#0065;", 0),
            Some(("A".to_string(), 7))
        );
    }

    #[test]
    fn test_numeric_hex_entities() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x41;", 0),
            Some(("A".to_string(), 6))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#X41;", 0),
            Some(("A".to_string(), 6))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x20AC;", 0),
            Some(("\u{20AC}".to_string(), 8))
        );
    }

    #[test]
    fn test_cp1252_replacements() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#128;", 0),
            Some(("\u{20AC}".to_string(), 6))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#130;", 0),
            Some(("\u{201A}".to_string(), 6))
        );
    }

    #[test]
    fn test_invalid_entities() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#xD800;", 0),
            Some(("\u{FFFD}".to_string(), 8))
        );
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&#;", 0), None);
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#0;", 0),
            Some(("\u{FFFD}".to_string(), 4))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x1234567;", 0),
            Some(("\u{FFFD}".to_string(), 11))
        );
    }

    #[test]
    fn test_entity_with_offset() {
        let input = b"text&amp;more";
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, input, 4),
            Some(("&".to_string(), 5))
        );
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, input, 10), None);
    }

    #[test]
    fn test_non_entity_input() {
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"text", 0), None);
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&", 0), None);
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&;", 0), None);
    }

    #[test]
    fn ambiguous_attribute_entity_is_preserved_literally() {
        // No trailing `;`, but also no trailing alphanumeric/`=`: unambiguous, substituted.
        let decoded = decode(&HtmlContext::Attribute, b"a&amp b");
        assert_eq!(String::from_utf8(decoded.to_vec()).unwrap(), "a& b");

        // No trailing `;`, followed by `=`: ambiguous, left as literal text.
        let decoded = decode(&HtmlContext::Attribute, b"a&amp=b");
        assert_eq!(String::from_utf8(decoded.to_vec()).unwrap(), "a&amp=b");
    }

    #[test]
    fn unescape_unknown_entity_is_replacement_char() {
        assert_eq!(unescape_entities("&notanentity;", false), "\u{FFFD}");
    }

    #[test]
    fn escape_minimal_covers_angle_brackets_and_amp() {
        let opts = EscapeOptions {
            reencode: ReencodePolicy::Minimal,
            entity_style: EntityStyle::Decimal,
            ..Default::default()
        };
        assert_eq!(escape_to_entities("a < b & c > d", &opts), "a &#60; b &#38; c &#62; d");
    }

    #[test]
    fn escape_loose_minimal_only_escapes_when_followed_by_markup_start() {
        let opts = EscapeOptions {
            reencode: ReencodePolicy::LooseMinimal,
            entity_style: EntityStyle::Decimal,
            ..Default::default()
        };
        assert_eq!(escape_to_entities("3 < 4", &opts), "3 < 4");
        assert_eq!(escape_to_entities("<b>", &opts), "&#60;b>");
    }

    #[test]
    fn escape_named_or_decimal_handles_non_bmp_and_pair_entities() {
        let opts = EscapeOptions {
            reencode: ReencodePolicy::NamedEntities,
            entity_style: EntityStyle::NamedOrDecimal,
            target: Target::EightBit,
            ..Default::default()
        };
        let text = "\u{1D522}, \u{22DB}\u{FE00}";
        let escaped = escape_to_entities(text, &opts);
        assert!(escaped.contains("&efr;"), "{escaped}");
        assert!(escaped.contains("&gesl;"), "{escaped}");
    }

    #[test]
    fn roundtrip_through_escape_and_unescape() {
        let opts = EscapeOptions {
            reencode: ReencodePolicy::Minimal,
            entity_style: EntityStyle::NamedOrShortest,
            ..Default::default()
        };
        for text in ["plain text", "a < b & c > d \"quoted\"", "caf\u{E9}"] {
            let escaped = escape_to_entities(text, &opts);
            assert_eq!(unescape_entities(&escaped, false), text);
        }
    }

    #[test]
    fn entity_validity_excludes_surrogates_and_cr() {
        assert!(is_valid_entity('A' as u32));
        assert!(!is_valid_entity(0x0D));
        assert!(!is_valid_entity(0xD800));
        assert!(!is_valid_entity(0x85)); // C1 control, CP1252-mapped before validity check in decode
        assert!(!is_valid_entity(0));
        assert!(!is_valid_entity(0x110000));
    }
}
