use std::borrow::Cow;

/// Returns true for characters that may not appear in an XML 1.0 document.
///
/// Tab, newline and carriage return are the only C0 controls XML allows.
/// DEL and the C1 block are legal XML but never meaningful in listing text.
fn is_forbidden(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => false,
        '\u{0}'..='\u{1f}' | '\u{7f}'..='\u{9f}' => true,
        '\u{fffe}' | '\u{ffff}' => true,
        _ => false,
    }
}

/// Strip control characters that would make the generated feed invalid XML.
///
/// Returns `Cow::Borrowed` when the input is already clean (the common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_forbidden) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_forbidden(c)).collect())
}

/// Normalize text pulled out of an HTML element.
///
/// Source markup is indented arbitrarily, so runs of whitespace (including
/// the ideographic space U+3000 common on Japanese sites) collapse to a
/// single ASCII space and the ends are trimmed. Control characters are
/// dropped first.
pub fn normalize_text(s: &str) -> String {
    let cleaned = strip_control_chars(s);
    let mut out = String::with_capacity(cleaned.len());
    for word in cleaned.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
