//! Tests for client-mode status-line and range parsing.

use crate::parser::{ContentRange, InboundResponse, ParseError, parse_response};

fn expect_response(raw: &[u8]) -> crate::parser::ParsedResponse {
    match parse_response(raw).expect("parse succeeds") {
        InboundResponse::Response(response) => response,
        InboundResponse::Continuation(_) => panic!("expected a headered response"),
    }
}

#[test]
fn status_and_body_are_extracted() {
    let response = expect_response(
        b"HTTP/1.0 200 OK\r\nContent-Type: text/html\r\nContent-Length: 5\r\n\r\nhello",
    );
    assert_eq!(response.status, 200);
    assert_eq!(response.declared_len, 5);
    assert_eq!(response.body.as_ref(), b"hello");
    assert!(response.is_complete());
}

#[test]
fn repeated_spaces_before_the_code_are_skipped() {
    let response = expect_response(b"HTTP/1.0   404 Not Found\r\n\r\n");
    assert_eq!(response.status, 404);
}

#[test]
fn content_range_triple_is_parsed() {
    let response = expect_response(
        b"HTTP/1.0 206 Partial Content\r\nContent-Range: bytes 0-99/1024\r\n\
          Content-Length: 100\r\n\r\n",
    );
    assert_eq!(
        response.content_range,
        Some(ContentRange {
            start: 0,
            end: 99,
            total: 1024
        })
    );
    assert_eq!(response.declared_len, 100);
}

#[test]
fn missing_http_token_becomes_continuation() {
    let raw = b"tail of a long body";
    match parse_response(raw).expect("continuations always parse") {
        InboundResponse::Continuation(body) => assert_eq!(body, raw.as_slice()),
        InboundResponse::Response(_) => panic!("expected a continuation"),
    }
}

#[test]
fn malformed_range_is_rejected() {
    assert_eq!(
        parse_response(b"HTTP/1.0 206 P\r\nContent-Range: bytes 0x99/10\r\n\r\n"),
        Err(ParseError::InvalidNumber {
            field: "content-range"
        })
    );
}

#[test]
fn declared_length_defaults_to_received() {
    let response = expect_response(b"HTTP/1.0 200 OK\r\n\r\nbody");
    assert_eq!(response.declared_len, 4);
}

#[test]
fn empty_input_is_rejected() {
    assert_eq!(parse_response(b""), Err(ParseError::Empty));
}
