//! Value helpers around the icalendar crate (RFC 5545 §3.3.11).
//!
//! icalendar escapes TEXT values and folds lines on output but passes a bare
//! CR through, which would end the content line early.

/// Turn CRLF and lone CR into LF so the TEXT escaper sees a single newline.
pub fn normalize_newlines(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\r' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'\n') {
            chars.next();
        }
        out.push('\n');
    }

    out
}

/// Reverse TEXT escaping on a value read back from a document.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

/// URI values are not TEXT and must not be backslash-escaped, but a raw line
/// break would end the content line.
pub fn sanitize_uri(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("line1\r\nline2\rline3\nline4"), "line1\nline2\nline3\nline4");
        assert_eq!(normalize_newlines("Meeting: Q4"), "Meeting: Q4");
    }

    #[test]
    fn test_unescape_reserved_characters() {
        assert_eq!(unescape_text("a\\,b\\;c\\\\d"), "a,b;c\\d");
        assert_eq!(unescape_text("line1\\nline2\\Nline3"), "line1\nline2\nline3");
        assert_eq!(unescape_text("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_sanitize_uri_keeps_reserved_characters() {
        assert_eq!(
            sanitize_uri("https://example.com/?a=1,2;b\n"),
            "https://example.com/?a=1,2;b"
        );
    }
}
