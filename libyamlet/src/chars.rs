//! Character classes used by the reader and the scanner.
//!
//! The reader returns `'\0'` past the end of the input. A real NUL never
//! reaches the scanner because it is not printable, so `'\0'` doubles as the
//! end-of-stream sentinel in every class below.

/// Line breaks. YAML 1.2 only knows LF and CR; NEL, LS and PS are content.
#[inline]
pub fn is_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

#[inline]
pub fn is_break_or_nul(c: char) -> bool {
    is_break(c) || c == '\0'
}

#[inline]
pub fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Space, tab, line break or end of stream: whatever may follow an
/// indicator for it to count as one.
#[inline]
pub fn is_blank_or_break_or_nul(c: char) -> bool {
    is_blank(c) || is_break_or_nul(c)
}

#[inline]
pub fn is_flow_indicator(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

/// Characters allowed in anchor and alias names.
#[inline]
pub fn is_anchor_char(c: char) -> bool {
    !is_blank_or_break_or_nul(c) && !is_flow_indicator(c) && c != '\u{FEFF}'
}

#[inline]
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Characters allowed in tag URIs. Flow indicators end a tag inside flow
/// collections.
pub fn is_uri_char(c: char, in_flow: bool) -> bool {
    if c.is_ascii_alphanumeric() {
        return true;
    }
    match c {
        '-' | ';' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | '_' | '.' | '!' | '~'
        | '*' | '\'' | '(' | ')' | '%' | '#' => true,
        ',' | '[' | ']' => !in_flow,
        _ => false,
    }
}

/// Whether a code point may appear in a YAML stream.
pub fn is_printable(cp: u32) -> bool {
    matches!(cp, 0x9 | 0xA | 0xD | 0x85)
        || (0x20..=0x7E).contains(&cp)
        || (0xA0..=0xD7FF).contains(&cp)
        || (0xE000..=0xFFFD).contains(&cp)
        || (0x10000..=0x10FFFF).contains(&cp)
}

/// Replacement for a single-character escape in a double-quoted scalar.
pub fn escape_replacement(c: char) -> Option<char> {
    let replacement = match c {
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        't' | '\t' => '\t',
        'n' => '\n',
        'v' => '\x0B',
        'f' => '\x0C',
        'r' => '\r',
        'e' => '\x1B',
        ' ' => ' ',
        '"' => '"',
        '/' => '/',
        '\\' => '\\',
        'N' => '\u{85}',
        '_' => '\u{A0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        _ => return None,
    };
    Some(replacement)
}

/// Number of hex digits following a code point escape.
pub fn escape_code_length(c: char) -> Option<usize> {
    match c {
        'x' => Some(2),
        'u' => Some(4),
        'U' => Some(8),
        _ => None,
    }
}
