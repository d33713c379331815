//! Server-mode request parsing.

use bytes::Bytes;
use log::trace;

use super::ParseError;
use crate::{
    method::Method,
    scan::{self, Unterminated},
};

/// A structured view of one headered request fragment.
///
/// `body` holds whatever part of the declared content arrived in this
/// fragment; `declared_len` may exceed `body.len()` when the client spreads
/// the body across several transport deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    /// Request method.
    pub method: Method,
    /// Request target, up to the `" HTTP"` marker.
    pub url: String,
    /// `Origin:` header value, when present.
    pub origin: Option<String>,
    /// `Access-Control-Request-Headers:` value, when present.
    pub acrh: Option<String>,
    /// Body length promised by `Content-Length:`; defaults to the received
    /// length when the header is absent.
    pub declared_len: usize,
    /// Body bytes present in this fragment.
    pub body: Bytes,
}

impl ParsedRequest {
    /// Whether the fragment already carries the whole declared body.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.body.len() >= self.declared_len }
}

/// Classification of one inbound fragment.
///
/// Continuations borrow the receive buffer; the reassembly table copies them
/// into its pre-reserved message buffer, so no intermediate allocation is
/// made per fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// A request line with headers was recognised.
    Request(ParsedRequest),
    /// No method prefix matched: raw continuation data for an in-progress
    /// reassembly.
    Continuation(&'a [u8]),
}

/// Parse one received buffer into a request or a continuation fragment.
///
/// # Errors
///
/// Returns a [`ParseError`] when a required token is missing from a headered
/// request. Continuations cannot fail beyond the empty-input check.
pub fn parse_request(raw: &[u8]) -> Result<Inbound<'_>, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let Some((method, consumed)) = Method::from_prefix(raw) else {
        trace!("no method prefix, treating {} bytes as continuation", raw.len());
        return Ok(Inbound::Continuation(raw));
    };

    let after_method = &raw[consumed..];
    let url_end = scan::find(after_method, b" HTTP").ok_or(ParseError::MissingHttpToken)?;
    let url = utf8_field(&after_method[..url_end], "url")?;

    let acrh = header_of_interest(raw, b"Access-Control-Request-Headers: ")?
        .map(|value| utf8_field(value, "access-control-request-headers"))
        .transpose()?;
    let origin = header_of_interest(raw, b"Origin: ")?
        .map(|value| utf8_field(value, "origin"))
        .transpose()?;

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

    Ok(Inbound::Request(ParsedRequest {
        method,
        url,
        origin,
        acrh,
        declared_len,
        body,
    }))
}

pub(super) fn header_of_interest<'a>(
    raw: &'a [u8],
    name: &'static [u8],
) -> Result<Option<&'a [u8]>, ParseError> {
    scan::header_value(raw, name).map_err(|Unterminated| ParseError::UnterminatedHeader {
        // header literals include the ": " separator; trim it for reporting
        header: header_label(name),
    })
}

fn header_label(name: &'static [u8]) -> &'static str {
    match name {
        b"Access-Control-Request-Headers: " => "Access-Control-Request-Headers",
        b"Origin: " => "Origin",
        b"Content-Length: " => "Content-Length",
        b"Content-Range: " => "Content-Range",
        _ => "header",
    }
}

pub(super) fn utf8_field(value: &[u8], field: &'static str) -> Result<String, ParseError> {
    std::str::from_utf8(value)
        .map(str::to_owned)
        .map_err(|_| ParseError::InvalidUtf8 { field })
}
