//! Public API for the `espress` library.
//!
//! This crate provides the HTTP request/response pipeline of a small embedded
//! web server: fragment parsing, bounded reassembly, a single-flight send
//! gate with a watchdog, chunked splitting of oversized messages, and
//! response composition. The transport and storage are collaborator traits;
//! the pipeline itself never owns a socket or a filesystem.

pub mod composer;
pub mod config;
pub mod gate;
pub mod mem;
pub mod method;
pub mod parser;
pub mod pipeline;
pub mod reassembly;
pub mod runtime;
pub mod splitter;
pub mod storage;
pub mod transport;

mod scan;
#[cfg(test)]
mod test_support;

pub use composer::{ResponseHeader, json_error_body, mime_type, reason_phrase};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use gate::{GateError, PendingSend, SendGate};
pub use method::Method;
pub use parser::{
    ContentRange,
    Inbound,
    InboundResponse,
    ParseError,
    ParsedRequest,
    ParsedResponse,
    parse_request,
    parse_response,
};
pub use pipeline::{Handler, Pipeline, RespondError, Responder, ServerStatus};
pub use reassembly::{ReassemblyError, ReassemblyTable};
pub use runtime::Runtime;
pub use splitter::{ContentSource, Serviced, SplitError, SplitSend, Splitter};
pub use storage::{Storage, StorageError};
pub use transport::{ConnectionId, Transport, TransportError, TransportEvent};
