//! Client-mode response parsing.

use bytes::Bytes;
use log::trace;

use super::{
    ParseError,
    request::{header_of_interest, utf8_field},
};
use crate::scan;

/// `Content-Range: bytes <start>-<end>/<total>` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

/// A structured view of one headered response fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Numeric HTTP status code.
    pub status: u16,
    /// Body length promised by `Content-Length:`; defaults to the received
    /// length when the header is absent.
    pub declared_len: usize,
    /// Partial-content range, when the server sent one.
    pub content_range: Option<ContentRange>,
    /// Body bytes present in this fragment.
    pub body: Bytes,
}

impl ParsedResponse {
    /// Whether the fragment already carries the whole declared body.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.body.len() >= self.declared_len }
}

/// Classification of one inbound fragment in client mode.
///
/// Continuations borrow the receive buffer, as on the request side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundResponse<'a> {
    /// A status line was recognised.
    Response(ParsedResponse),
    /// No `HTTP` token: raw continuation data for an in-progress reassembly.
    Continuation(&'a [u8]),
}

/// Parse one received buffer into a response or a continuation fragment.
///
/// # Errors
///
/// Returns a [`ParseError`] when the status code or a recognised header is
/// malformed.
pub fn parse_response(raw: &[u8]) -> Result<InboundResponse<'_>, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let Some(token) = scan::find(raw, b"HTTP") else {
        trace!("no HTTP token, treating {} bytes as continuation", raw.len());
        return Ok(InboundResponse::Continuation(raw));
    };

    // status code: first digit run after the space(s) following the token
    let after_token = &raw[token..];
    let space = scan::find(after_token, b" ").ok_or(ParseError::MissingHttpToken)?;
    let code_start = after_token[space..]
        .iter()
        .position(|byte| *byte != b' ')
        .map(|offset| space + offset)
        .ok_or(ParseError::InvalidNumber { field: "status" })?;
    let code_bytes = &after_token[code_start..];
    let code_end = scan::find(code_bytes, b" ").ok_or(ParseError::InvalidNumber {
        field: "status",
    })?;
    let status: u16 = utf8_field(&code_bytes[..code_end], "status")?
        .parse()
        .map_err(|_| ParseError::InvalidNumber { field: "status" })?;

    let content_range = parse_content_range(raw)?;

    let body_start =
        scan::find(raw, b"\r\n\r\n").ok_or(ParseError::MissingBodyBoundary)? + 4;
    let body = Bytes::copy_from_slice(&raw[body_start..]);

    let declared_len = match header_of_interest(raw, b"Content-Length: ")? {
        Some(value) => scan::parse_decimal(value).ok_or(ParseError::InvalidNumber {
            field: "content-length",
        })?,
        None => {
            trace!("no Content-Length header, using received length");
            body.len()
        }
    };

    Ok(InboundResponse::Response(ParsedResponse {
        status,
        declared_len,
        content_range,
        body,
    }))
}

fn parse_content_range(raw: &[u8]) -> Result<Option<ContentRange>, ParseError> {
    let Some(value) = header_of_interest(raw, b"Content-Range: ")? else {
        return Ok(None);
    };
    let err = ParseError::InvalidNumber {
        field: "content-range",
    };

    let bytes_prefix = scan::find(value, b"bytes ").ok_or(err.clone())?;
    let spans = &value[bytes_prefix + b"bytes ".len()..];
    let dash = scan::find(spans, b"-").ok_or(err.clone())?;
    let slash = scan::find(spans, b"/").ok_or(err.clone())?;
    if slash <= dash {
        return Err(err);
    }

    let start = scan::parse_decimal(&spans[..dash]).ok_or(err.clone())?;
    let end = scan::parse_decimal(&spans[dash + 1..slash]).ok_or(err.clone())?;
    let total = scan::parse_decimal(&spans[slash + 1..]).ok_or(err)?;
    Ok(Some(ContentRange { start, end, total }))
}
