//! Transport collaborator seam.
//!
//! The pipeline never owns a socket. It initiates sends through [`Transport`]
//! and learns about completions, received fragments and disconnects through
//! [`TransportEvent`]s fed to the runtime. The send call is an initiation
//! only: the buffer stays owned by the send gate until the matching
//! [`TransportEvent::Sent`] (or the watchdog) releases it.

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Opaque identity of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw connection identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Error reported by a transport when a send cannot be initiated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transport send failed with code {code}")]
pub struct TransportError {
    /// Transport-specific status code.
    pub code: i32,
}

/// Asynchronous send seam to the underlying network stack.
pub trait Transport {
    /// Initiate an asynchronous send of `payload` on `connection`.
    ///
    /// Completion is signalled later via [`TransportEvent::Sent`]; the caller
    /// keeps the buffer alive until then.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the send cannot be started. The gate
    /// logs the error and lets the watchdog recover its state, because no
    /// synchronous cleanup is safe mid-send.
    fn send(&mut self, connection: ConnectionId, payload: &[u8]) -> Result<(), TransportError>;

    /// Whether the connection is still usable.
    ///
    /// Checked before each split-send continuation so transfers to a
    /// vanished peer are abandoned silently.
    fn is_connected(&self, connection: ConnectionId) -> bool;
}

/// Events delivered by the transport's callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One discrete byte delivery from the receive callback.
    Received {
        /// Connection the bytes arrived on.
        connection: ConnectionId,
        /// The fragment payload.
        bytes: Bytes,
    },
    /// A previously initiated send completed.
    Sent {
        /// Connection whose send finished.
        connection: ConnectionId,
    },
    /// The connection went away.
    Disconnected {
        /// Connection that closed.
        connection: ConnectionId,
    },
}
