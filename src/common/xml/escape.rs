use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

// Static initialization: automaton is built only once, thread-safe
static XML_ESCAPER: Lazy<Option<AhoCorasick>> =
    Lazy::new(|| AhoCorasick::builder().build(["&", "<", ">", "\"", "'"]).ok());

const XML_REPLACEMENTS: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

/// Escape XML special characters.
///
/// # Examples
///
/// ```
/// use odstab::common::xml::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<tag>\"hello\"</tag>"), "&lt;tag&gt;&quot;hello&quot;&lt;/tag&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    match XML_ESCAPER.as_ref() {
        Some(escaper) => escaper.replace_all(s, &XML_REPLACEMENTS),
        None => escape_slow(s),
    }
}

fn escape_slow(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolve the body of a general entity reference (`amp` for `&amp;`,
/// `#65` / `#x41` for character references).
///
/// Only the five predefined entities and character references are known;
/// anything else returns `None` and contributes no text. Internal DTD
/// entities are never expanded.
///
/// ```
/// use odstab::common::xml::resolve_entity;
/// assert_eq!(resolve_entity(b"lt"), Some('<'));
/// assert_eq!(resolve_entity(b"#x41"), Some('A'));
/// assert_eq!(resolve_entity(b"lol9"), None);
/// ```
pub fn resolve_entity(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', b'x' | b'X', hex @ ..] => {
            let hex = std::str::from_utf8(hex).ok()?;
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        },
        [b'#', dec @ ..] => {
            let dec = std::str::from_utf8(dec).ok()?;
            dec.parse::<u32>().ok().and_then(char::from_u32)
        },
        _ => None,
    }
}
