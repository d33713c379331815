//! Splitting of oversized payloads into send-sized chunks.
//!
//! Any outbound payload larger than the configured maximum chunk size is
//! broken into a chain of chunks driven by a bounded FIFO queue. Each parked
//! [`SplitSend`] records how far the transfer has progressed; servicing one
//! entry emits exactly one chunk through the send gate and, if content
//! remains, re-parks the transfer with an advanced offset. The next chunk is
//! therefore triggered by the previous chunk's send completion, keeping one
//! chunk buffer alive at a time.
//!
//! Content is a tagged source: an owned in-memory buffer, or a file name
//! whose chunks are read from storage at their offset when due. The
//! file-backed path is what makes arbitrarily large files servable from a
//! small heap.

use std::collections::VecDeque;

use bytes::Bytes;
use log::{error, trace};
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    gate::{GateError, SendGate},
    storage::{Storage, StorageError},
    transport::{ConnectionId, Transport},
};

/// Errors reported by splitter operations.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// The split-send queue was full; the transfer was dropped.
    #[error("pending split send queue full ({capacity} entries)")]
    QueueFull {
        /// Fixed queue depth.
        capacity: usize,
    },
    /// A file-backed chunk read failed; the transfer was aborted.
    #[error("storage read failed during transfer to {connection}: {source}")]
    Storage {
        /// Connection the transfer belonged to.
        connection: ConnectionId,
        /// Underlying storage error.
        source: StorageError,
    },
    /// The chunk could not be parked in the send gate's queue.
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Where the remaining content of a transfer lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// Owned buffer; chunks are zero-copy slices.
    InMemory(Bytes),
    /// File name; chunks are read from storage at their offset.
    FileBacked(String),
}

/// One in-progress oversized transfer parked in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSend {
    connection: ConnectionId,
    source: ContentSource,
    total: usize,
    transferred: usize,
    order: u32,
}

/// Outcome of servicing the split queue once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serviced {
    /// The queue was empty.
    Idle,
    /// One chunk was emitted through the gate.
    Chunk {
        /// Connection the chunk went to.
        connection: ConnectionId,
    },
    /// The connection was gone; the transfer was dropped without sending.
    Abandoned {
        /// Connection that went away.
        connection: ConnectionId,
    },
}

/// Bounded FIFO of oversized transfers.
#[derive(Debug)]
pub struct Splitter {
    queue: VecDeque<SplitSend>,
    capacity: usize,
}

impl Splitter {
    /// Create a splitter holding at most `capacity` parked transfers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Send an in-memory payload, splitting when it exceeds `max_chunk`.
    ///
    /// Chunks of a logical transfer are tagged `start_order`,
    /// `start_order + 1`, … for the diagnostic log; the queue's FIFO order
    /// already guarantees delivery order.
    ///
    /// # Errors
    ///
    /// Returns a [`SplitError`] when the split queue or the gate queue is
    /// full; the payload is dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn send<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        gate: &mut SendGate,
        connection: ConnectionId,
        payload: Bytes,
        max_chunk: usize,
        start_order: u32,
        now: Instant,
    ) -> Result<(), SplitError> {
        let total = payload.len();
        if total <= max_chunk {
            trace!("sending {total} bytes on {connection} unsplit");
            gate.submit(transport, connection, start_order, payload, now)?;
            return Ok(());
        }

        let chunk = payload.slice(..max_chunk);
        self.park(SplitSend {
            connection,
            source: ContentSource::InMemory(payload),
            total,
            transferred: max_chunk,
            order: start_order + 1,
        })?;
        trace!("split {total} bytes on {connection}, first chunk {max_chunk}");
        gate.submit(transport, connection, start_order, chunk, now)?;
        Ok(())
    }

    /// Send a file of `total` bytes, reading each chunk from storage when it
    /// is due rather than holding the file in memory.
    ///
    /// # Errors
    ///
    /// Returns a [`SplitError`] when the first read fails or a queue is full.
    #[allow(clippy::too_many_arguments)]
    pub fn send_file<T: Transport + ?Sized, S: Storage + ?Sized>(
        &mut self,
        transport: &mut T,
        gate: &mut SendGate,
        storage: &S,
        connection: ConnectionId,
        name: &str,
        total: usize,
        max_chunk: usize,
        start_order: u32,
        now: Instant,
    ) -> Result<(), SplitError> {
        let first_len = total.min(max_chunk);
        let chunk = storage
            .read(name, 0, first_len)
            .map_err(|source| SplitError::Storage { connection, source })?;
        if total > max_chunk {
            self.park(SplitSend {
                connection,
                source: ContentSource::FileBacked(name.to_owned()),
                total,
                transferred: max_chunk,
                order: start_order + 1,
            })?;
            trace!("split file {name} ({total} bytes) on {connection}");
        } else {
            trace!("sending file {name} ({total} bytes) on {connection} unsplit");
        }
        gate.submit(transport, connection, start_order, chunk, now)?;
        Ok(())
    }

    /// Service at most one parked transfer: emit its next chunk, or drop it
    /// when its connection is gone.
    ///
    /// Exactly one chunk per call; the next is triggered by the chunk's own
    /// send completion.
    ///
    /// # Errors
    ///
    /// Returns a [`SplitError`] when a chunk read fails or a queue is full;
    /// the transfer is aborted.
    pub fn service_one<T: Transport + ?Sized, S: Storage + ?Sized>(
        &mut self,
        transport: &mut T,
        gate: &mut SendGate,
        storage: &S,
        max_chunk: usize,
        now: Instant,
    ) -> Result<Serviced, SplitError> {
        let Some(entry) = self.queue.pop_front() else {
            return Ok(Serviced::Idle);
        };
        let SplitSend {
            connection,
            source,
            total,
            transferred,
            order,
        } = entry;

        if !transport.is_connected(connection) {
            trace!("{connection} gone, abandoning transfer at {transferred}/{total}");
            // no send happens, so the next check must be requested explicitly
            gate.request_check();
            return Ok(Serviced::Abandoned { connection });
        }

        let remaining = total - transferred;
        let len = remaining.min(max_chunk);
        let chunk = match &source {
            ContentSource::InMemory(bytes) => bytes.slice(transferred..transferred + len),
            ContentSource::FileBacked(name) => storage
                .read(name, transferred, len)
                .map_err(|source| SplitError::Storage { connection, source })?,
        };

        if remaining > max_chunk {
            self.park(SplitSend {
                connection,
                source,
                total,
                transferred: transferred + len,
                order: order + 1,
            })?;
        }
        trace!("chunk {order} on {connection}: {len} bytes, {remaining} remained");
        gate.submit(transport, connection, order, chunk, now)?;
        Ok(Serviced::Chunk { connection })
    }

    /// Number of parked transfers.
    #[must_use]
    pub fn len(&self) -> usize { self.queue.len() }

    /// Whether no transfers are parked.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.queue.is_empty() }

    /// Drop all parked transfers without sending (server shutdown).
    pub fn drain(&mut self) {
        if !self.queue.is_empty() {
            trace!("clearing {} pending split sends", self.queue.len());
        }
        self.queue.clear();
    }

    fn park(&mut self, entry: SplitSend) -> Result<(), SplitError> {
        if self.queue.len() >= self.capacity {
            error!("pending split send queue is full, dropping transfer");
            return Err(SplitError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.queue.push_back(entry);
        Ok(())
    }
}
