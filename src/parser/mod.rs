//! Inbound HTTP message parsing.
//!
//! Two symmetric parsers share one error type: [`parse_request`] for server
//! mode and [`parse_response`] for client mode (firmware acting as an HTTP
//! client, e.g. upgrade checks). Both classify a buffer with no recognisable
//! start marker as a headerless continuation fragment instead of failing, so
//! the reassembly tables can route it to an in-progress message.

pub mod request;
pub mod response;

use thiserror::Error;

pub use request::{Inbound, ParsedRequest, parse_request};
pub use response::{ContentRange, InboundResponse, ParsedResponse, parse_response};

/// Errors raised when a required token is missing or malformed.
///
/// A failed parse carries no partial result; the caller reports the error and
/// drops the fragment.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input buffer was empty.
    #[error("cannot parse empty message")]
    Empty,
    /// A headered request line did not contain the `" HTTP"` marker.
    #[error("cannot find HTTP token")]
    MissingHttpToken,
    /// The blank line separating headers from the body was missing.
    #[error("cannot find content start")]
    MissingBodyBoundary,
    /// A recognised header was present but its value never reached a CRLF.
    #[error("cannot find terminator for {header} value")]
    UnterminatedHeader {
        /// Header name as it appears on the wire.
        header: &'static str,
    },
    /// A numeric field did not parse as a decimal integer.
    #[error("invalid numeric value for {field}")]
    InvalidNumber {
        /// Field the value belonged to.
        field: &'static str,
    },
    /// A textual field (url, origin, request headers list) was not UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field the bytes belonged to.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests;
