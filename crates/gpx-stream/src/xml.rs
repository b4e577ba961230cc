//! XML text helpers shared by the writer and the options layer

use std::borrow::Cow;

/// Escape a value for use in XML character data or a quoted attribute.
///
/// Characters that XML 1.0 cannot carry at all (most C0 controls, U+FFFE,
/// U+FFFF) are dropped. A string with nothing to escape is returned borrowed.
#[must_use]
pub fn escape(value: &str) -> Cow<'_, str> {
    if value.chars().all(is_xml_char) {
        return quick_xml::escape::escape(value);
    }

    let filtered: String = value.chars().filter(|&c| is_xml_char(c)).collect();
    Cow::Owned(quick_xml::escape::escape(&filtered).into_owned())
}

/// Turn an arbitrary key into something usable as an XML element name.
///
/// Characters outside `[A-Za-z0-9_.-]` become `_`, and a leading character
/// that cannot start a name gets a `_` prefix.
#[must_use]
pub fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => name.insert(0, '_'),
    }
    name
}

/// Whether `name` is a valid namespace prefix (an ASCII NCName).
#[must_use]
pub fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[inline]
const fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
