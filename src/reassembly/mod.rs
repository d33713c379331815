//! Bounded per-connection reassembly of multi-fragment messages.
//!
//! When a headered message declares more content than its first fragment
//! carries, the raw bytes received so far are parked in a [`ReassemblyTable`]
//! keyed by connection. Later headerless fragments are appended until the
//! declared total is reached, at which point the table hands the completed
//! buffer back to the caller. The same type serves both directions: one
//! table for inbound requests (server mode) and one for inbound responses
//! (client mode).
//!
//! Capacity is a small fixed bound; an arrival beyond it is a reported
//! failure rather than an eviction. That is the resource policy of the
//! constrained target, not a leak.

use bytes::Bytes;
use log::{error, trace};
use thiserror::Error;

use crate::transport::ConnectionId;

/// Errors reported by [`ReassemblyTable`] operations.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The table is at capacity; the new message was dropped.
    #[error("reassembly table full ({capacity} entries)")]
    TableFull {
        /// Fixed table capacity.
        capacity: usize,
    },
    /// A continuation arrived for a connection with no in-progress message.
    #[error("no pending message for connection {connection}")]
    UnknownConnection {
        /// Connection the fragment arrived on.
        connection: ConnectionId,
    },
    /// A continuation would overshoot the declared total; the entry is
    /// discarded.
    #[error("fragment overflows declared length for connection {connection}")]
    Overflow {
        /// Connection the fragment arrived on.
        connection: ConnectionId,
    },
}

#[derive(Debug)]
struct Partial {
    connection: ConnectionId,
    buffer: Vec<u8>,
    expected: usize,
    received: usize,
}

/// Bounded table of in-progress multi-fragment messages.
#[derive(Debug)]
pub struct ReassemblyTable {
    entries: Vec<Partial>,
    capacity: usize,
}

impl ReassemblyTable {
    /// Create a table holding at most `capacity` concurrent messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Park the first fragment of a message whose body is still incomplete.
    ///
    /// `fragment` is the raw bytes received so far (headers included),
    /// `declared_total` the body length promised by the header and `received`
    /// the body bytes already inside `fragment`. The internal buffer is
    /// reserved up front for the full expected message so later appends never
    /// reallocate.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::TableFull`] when the bounded table has no
    /// free slot; the fragment is dropped.
    pub fn save(
        &mut self,
        connection: ConnectionId,
        fragment: &[u8],
        declared_total: usize,
        received: usize,
    ) -> Result<(), ReassemblyError> {
        if self.entries.len() >= self.capacity {
            error!("cannot save pending message: table full on {connection}");
            return Err(ReassemblyError::TableFull {
                capacity: self.capacity,
            });
        }
        let expected_total = fragment.len() + declared_total.saturating_sub(received);
        let mut buffer = Vec::with_capacity(expected_total);
        buffer.extend_from_slice(fragment);
        trace!(
            "pending message on {connection}: {received}/{declared_total} body bytes received"
        );
        self.entries.push(Partial {
            connection,
            buffer,
            expected: declared_total,
            received,
        });
        Ok(())
    }

    /// Append a continuation fragment to the in-progress message for
    /// `connection`.
    ///
    /// Returns the completed raw message once the received body length
    /// reaches the declared total.
    ///
    /// # Errors
    ///
    /// [`ReassemblyError::UnknownConnection`] when no message is pending on
    /// the connection (the fragment is dropped), or
    /// [`ReassemblyError::Overflow`] when the fragment would exceed the
    /// declared total (the entry is discarded).
    pub fn append(
        &mut self,
        connection: ConnectionId,
        fragment: &[u8],
    ) -> Result<Option<Bytes>, ReassemblyError> {
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.connection == connection)
        else {
            error!("cannot find pending message on {connection}");
            return Err(ReassemblyError::UnknownConnection { connection });
        };

        let entry = &mut self.entries[index];
        if entry.received + fragment.len() > entry.expected {
            self.entries.swap_remove(index);
            error!("fragment overflows pending message on {connection}");
            return Err(ReassemblyError::Overflow { connection });
        }
        entry.buffer.extend_from_slice(fragment);
        entry.received += fragment.len();
        trace!(
            "appended {} bytes on {connection}: {}/{}",
            fragment.len(),
            entry.received,
            entry.expected
        );

        if entry.received == entry.expected {
            let entry = self.entries.swap_remove(index);
            return Ok(Some(Bytes::from(entry.buffer)));
        }
        Ok(None)
    }

    /// Discard any in-progress message for `connection`.
    ///
    /// Called on disconnect; a vanished peer never completes its message.
    pub fn remove(&mut self, connection: ConnectionId) {
        self.entries.retain(|entry| entry.connection != connection);
    }

    /// Number of in-progress messages.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether the table holds no in-progress messages.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
