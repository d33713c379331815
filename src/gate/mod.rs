//! Single-flight send gate with watchdog recovery.
//!
//! The underlying transport allows exactly one outstanding send; initiating a
//! second before the completion callback corrupts its send buffer. The gate
//! models that discipline explicitly: a busy flag owns the in-flight buffer,
//! later submissions park in a bounded FIFO queue, and a watchdog deadline
//! force-clears the flag if the completion signal never arrives. Completion
//! never services the queue synchronously; it raises a deferred check flag so
//! the event loop unwinds the stack first.

use std::collections::VecDeque;

use bytes::Bytes;
use log::{error, trace, warn};
use thiserror::Error;
use tokio::time::{Duration, Instant};

use crate::transport::{ConnectionId, Transport};

/// Errors reported by [`SendGate::submit`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The pending-send queue was full; the buffer was dropped.
    #[error("pending send queue full ({capacity} entries)")]
    QueueFull {
        /// Fixed queue depth.
        capacity: usize,
    },
}

/// A send parked while the gate is busy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    /// Destination connection.
    pub connection: ConnectionId,
    /// Sequence tag within a logical transfer, for the diagnostic log.
    pub order: u32,
    /// The owned message buffer.
    pub payload: Bytes,
}

/// Single-flight discipline over the transport's asynchronous send.
#[derive(Debug)]
pub struct SendGate {
    busy: bool,
    in_flight: Option<Bytes>,
    deadline: Option<Instant>,
    watchdog_timeout: Duration,
    pending: VecDeque<PendingSend>,
    capacity: usize,
    check_due: bool,
}

impl SendGate {
    /// Create a gate with a bounded pending queue and watchdog timeout.
    #[must_use]
    pub fn new(capacity: usize, watchdog_timeout: Duration) -> Self {
        Self {
            busy: false,
            in_flight: None,
            deadline: None,
            watchdog_timeout,
            pending: VecDeque::with_capacity(capacity),
            capacity,
            check_due: false,
        }
    }

    /// Submit a buffer for sending.
    ///
    /// Gate free: mark busy, arm the watchdog and hand the bytes to the
    /// transport; a transport error is logged and left to the watchdog, since
    /// no synchronous cleanup is safe. Gate busy: park the buffer in the
    /// pending queue.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::QueueFull`] when the gate is busy and the queue
    /// has no room; the buffer is dropped, nothing retries.
    pub fn submit<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        connection: ConnectionId,
        order: u32,
        payload: Bytes,
        now: Instant,
    ) -> Result<(), GateError> {
        if self.busy {
            trace!("previous send not completed yet, queueing {} bytes", payload.len());
            if self.pending.len() >= self.capacity {
                error!("pending send queue is full, dropping send on {connection}");
                return Err(GateError::QueueFull {
                    capacity: self.capacity,
                });
            }
            self.pending.push_back(PendingSend {
                connection,
                order,
                payload,
            });
            return Ok(());
        }

        self.busy = true;
        self.deadline = Some(now + self.watchdog_timeout);
        trace!(
            "sending {} bytes on {connection} (order {order})",
            payload.len()
        );
        if let Err(err) = transport.send(connection, &payload) {
            // the watchdog will reset the gate; completion may never come
            error!("error sending on {connection}: {err}");
        }
        self.in_flight = Some(payload);
        Ok(())
    }

    /// Handle the transport's send-completion callback.
    ///
    /// Disarms the watchdog, releases the in-flight buffer and flags a
    /// deferred pending check. The queue is deliberately not serviced here.
    pub fn complete(&mut self, connection: ConnectionId) {
        trace!("send completed on {connection}");
        self.deadline = None;
        self.in_flight = None;
        self.busy = false;
        self.check_due = true;
    }

    /// Force-clear a stuck gate if the watchdog deadline has passed.
    ///
    /// Returns `true` when the gate was reset; a pending check is flagged so
    /// parked work proceeds.
    pub fn expire_watchdog(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        warn!("send completion never arrived, clearing busy flag");
        self.deadline = None;
        self.in_flight = None;
        self.busy = false;
        self.check_due = true;
        true
    }

    /// Deadline the runtime should sleep until, when a send is in flight.
    #[must_use]
    pub const fn watchdog_deadline(&self) -> Option<Instant> { self.deadline }

    /// Whether a send is currently in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool { self.busy }

    /// Take the deferred pending-check flag, clearing it.
    pub fn take_check_due(&mut self) -> bool { std::mem::take(&mut self.check_due) }

    /// Raise the deferred pending-check flag.
    ///
    /// Used by continuations that consumed their queue slot without engaging
    /// the transport (e.g. a transfer abandoned on disconnect).
    pub fn request_check(&mut self) { self.check_due = true; }

    /// Pop the oldest parked send, if any.
    pub fn pop_pending(&mut self) -> Option<PendingSend> { self.pending.pop_front() }

    /// Number of parked sends.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.pending.len() }

    /// Drop all parked sends without sending them (server shutdown).
    pub fn drain_pending(&mut self) {
        if !self.pending.is_empty() {
            trace!("clearing {} pending sends", self.pending.len());
        }
        self.pending.clear();
    }
}
