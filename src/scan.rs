//! Byte-scanning helpers shared by the request and response parsers.
//!
//! The parsers work on explicit-length byte slices; nothing here assumes
//! NUL-terminated or UTF-8 input.

/// Locate the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Locate `needle` ignoring ASCII case.
pub(crate) fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Marker error: a header was present but its value never reached a CRLF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unterminated;

/// Extract a header value: the bytes between `<name>` (matched
/// case-insensitively, including its trailing `: ` separator) and the next
/// CRLF.
///
/// `Ok(None)` when the header is absent.
pub(crate) fn header_value<'a>(
    raw: &'a [u8],
    name: &[u8],
) -> Result<Option<&'a [u8]>, Unterminated> {
    let Some(start) = find_ignore_case(raw, name) else {
        return Ok(None);
    };
    let value = &raw[start + name.len()..];
    let Some(end) = find(value, b"\r\n") else {
        return Err(Unterminated);
    };
    Ok(Some(&value[..end]))
}

/// Parse a decimal integer out of a header value slice, tolerating
/// surrounding ASCII whitespace.
pub(crate) fn parse_decimal(value: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(value).ok()?;
    text.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_locates_first_occurrence() {
        assert_eq!(find(b"abcabc", b"bc"), Some(1));
        assert_eq!(find(b"abc", b"xyz"), None);
        assert_eq!(find(b"ab", b"abc"), None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let raw = b"GET / HTTP/1.0\r\norigin: http://a\r\n\r\n";
        assert_eq!(
            header_value(raw, b"Origin: "),
            Ok(Some(b"http://a".as_slice()))
        );
    }

    #[test]
    fn unterminated_header_is_an_error() {
        let raw = b"GET / HTTP/1.0\r\nOrigin: http://a";
        assert_eq!(header_value(raw, b"Origin: "), Err(Unterminated));
    }

    #[test]
    fn decimal_parsing_trims_whitespace() {
        assert_eq!(parse_decimal(b" 42 "), Some(42));
        assert_eq!(parse_decimal(b"x"), None);
    }
}
