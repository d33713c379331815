//! HTTP request methods recognised by the parser.

use std::fmt;

/// Request methods recognised by literal prefix match on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Request-line prefixes, including the trailing space.
    const PREFIXES: [(&'static [u8], Method); 6] = [
        (b"GET ", Method::Get),
        (b"POST ", Method::Post),
        (b"PUT ", Method::Put),
        (b"PATCH ", Method::Patch),
        (b"DELETE ", Method::Delete),
        (b"OPTIONS ", Method::Options),
    ];

    /// Match a method prefix at the start of `raw`.
    ///
    /// Returns the method and the prefix length consumed. `None` marks the
    /// buffer as a headerless continuation rather than an error.
    #[must_use]
    pub fn from_prefix(raw: &[u8]) -> Option<(Method, usize)> {
        Self::PREFIXES
            .iter()
            .find(|(prefix, _)| raw.starts_with(prefix))
            .map(|(prefix, method)| (*method, prefix.len()))
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(b"GET /x HTTP/1.0", Some((Method::Get, 4)))]
    #[case(b"POST /x HTTP/1.0", Some((Method::Post, 5)))]
    #[case(b"PUT /x HTTP/1.0", Some((Method::Put, 4)))]
    #[case(b"PATCH /x HTTP/1.0", Some((Method::Patch, 6)))]
    #[case(b"DELETE /x HTTP/1.0", Some((Method::Delete, 7)))]
    #[case(b"OPTIONS /x HTTP/1.0", Some((Method::Options, 8)))]
    #[case(b"HEAD /x HTTP/1.0", None)]
    #[case(b"get /x HTTP/1.0", None)]
    #[case(b"", None)]
    fn prefix_match(#[case] raw: &[u8], #[case] expected: Option<(Method, usize)>) {
        assert_eq!(Method::from_prefix(raw), expected);
    }
}
