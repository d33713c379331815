//! Response composition: status line, headers and the JSON error envelope.
//!
//! Headers are formatted fresh per response into a buffer pre-sized from the
//! sum of the literal and dynamic field lengths, so composition never
//! reallocates. Body and header travel to the gate as two separate
//! submissions; the caller decides that, this module only produces the text.

use std::fmt::Write as _;

use crate::parser::ContentRange;

/// Reason phrase for the status codes the firmware emits.
///
/// Unknown codes map to an empty phrase, as the original table did.
#[must_use]
pub const fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// MIME type derived from a file name extension.
///
/// Used by the static-file path; unknown extensions fall back to
/// `application/octet-stream`.
#[must_use]
pub fn mime_type(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("txt") => "text/plain",
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Format the JSON error envelope for a failed request.
///
/// Shape preserved from the original wire format: `message` carries the
/// static reason phrase, `reason` the caller-supplied detail, both always
/// present.
#[must_use]
pub fn json_error_body(status: u16, message: &str) -> String {
    format!(
        "{{\"error\":{{\"code\": {status},\"message\": \"{reason}\",\"reason\": \"{message}\"}}}}",
        reason = reason_phrase(status),
    )
}

/// Outbound response header, built fresh per response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Status code.
    pub status: u16,
    /// `Content-Type:` value.
    pub content_type: &'static str,
    /// `Content-Length:` value.
    pub content_length: usize,
    /// Optional `Content-Range:` triple for partial content.
    pub content_range: Option<ContentRange>,
    /// `Access-Control-Allow-Origin:` value; `*` when absent.
    pub origin: Option<String>,
    /// When present, emits the preflight `Access-Control-Allow-Methods` /
    /// `-Headers` pair with this requested-headers list.
    pub acrh: Option<String>,
}

impl ResponseHeader {
    /// Minimal header for a plain response.
    #[must_use]
    pub const fn new(status: u16, content_type: &'static str, content_length: usize) -> Self {
        Self {
            status,
            content_type,
            content_length,
            content_range: None,
            origin: None,
            acrh: None,
        }
    }

    /// Render the header text, terminated by the blank line.
    #[must_use]
    pub fn format(&self, server_name: &str) -> String {
        let mut text = String::with_capacity(self.formatted_len(server_name));
        let reason = reason_phrase(self.status);
        let _ = write!(
            text,
            "HTTP/1.0 {} {reason}\r\nServer: {server_name}\r\n",
            self.status
        );
        let _ = write!(text, "Content-Type: {}\r\n", self.content_type);
        let _ = write!(text, "Content-Length: {}\r\n", self.content_length);
        if let Some(range) = self.content_range {
            let _ = write!(
                text,
                "Content-Range: bytes {}-{}/{}\r\n",
                range.start, range.end, range.total
            );
        }
        let origin = self.origin.as_deref().unwrap_or("*");
        let _ = write!(text, "Access-Control-Allow-Origin: {origin}\r\n");
        if let Some(acrh) = &self.acrh {
            text.push_str("Access-Control-Allow-Methods: GET,POST,PUT,DELETE,OPTIONS\r\n");
            let _ = write!(text, "Access-Control-Allow-Headers: Content-Type,{acrh}\r\n");
        }
        text.push_str("Pragma: no-cache\r\n\r\n");
        debug_assert!(text.len() <= text.capacity());
        text
    }

    // Exact upper bound on the rendered length: literals plus the dynamic
    // fields at their widest decimal widths.
    fn formatted_len(&self, server_name: &str) -> usize {
        let mut len = 62 + server_name.len() + reason_phrase(self.status).len();
        len += 16 + self.content_type.len();
        len += 18 + 20;
        if self.content_range.is_some() {
            len += 26 + 3 * 20;
        }
        len += 31 + self.origin.as_deref().unwrap_or("*").len();
        if let Some(acrh) = &self.acrh {
            len += 59;
            len += 45 + acrh.len();
        }
        len + 20
    }
}
