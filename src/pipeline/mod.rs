//! The HTTP pipeline: receive, dispatch, respond, and the pending-check
//! discipline.
//!
//! One [`Pipeline`] owns every stateful component — send gate, splitter and
//! the two reassembly tables — and wires them to the transport's callbacks.
//! Handlers reach the outbound side only through a [`Responder`], which keeps
//! buffer ownership moving in one direction: parser to reassembly table to
//! handler to gate to transport.
//!
//! Send completions never service the queues synchronously. The gate raises
//! a deferred-check flag and [`Pipeline::service_pending_if_due`] drains it
//! from the event loop, one parked plain send (priority) or one split-send
//! continuation per check.

use bytes::Bytes;
use log::{error, trace};
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    composer::{ResponseHeader, json_error_body, mime_type},
    config::Config,
    gate::{GateError, SendGate},
    parser::{
        Inbound,
        InboundResponse,
        ParseError,
        ParsedRequest,
        ParsedResponse,
        parse_request,
        parse_response,
    },
    reassembly::{ReassemblyError, ReassemblyTable},
    splitter::{Serviced, SplitError, Splitter},
    storage::{Storage, StorageError},
    transport::{ConnectionId, Transport},
};

/// Whether the owning server accepts and emits traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Normal operation.
    Up,
    /// Shutting down: queued work is drained without sending.
    Down,
}

/// Errors surfaced while emitting a response.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RespondError {
    /// The send gate's pending queue rejected the buffer.
    #[error(transparent)]
    Gate(#[from] GateError),
    /// The splitter rejected or aborted the transfer.
    #[error(transparent)]
    Split(#[from] SplitError),
    /// The storage collaborator failed before the transfer started.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors surfaced by the client-mode receive path.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientReceiveError {
    /// The fragment did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The reassembly table rejected the fragment.
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
}

/// Route dispatcher collaborator.
///
/// The pipeline calls [`Handler::handle`] with each complete request; the
/// handler answers through the [`Responder`]. A returned error becomes a 500
/// with the JSON error envelope.
pub trait Handler {
    /// Handle one complete request.
    ///
    /// # Errors
    ///
    /// Returns a [`RespondError`] when emitting the response failed; the
    /// pipeline converts it into a best-effort 500.
    fn handle(
        &mut self,
        responder: &mut Responder<'_>,
        request: &ParsedRequest,
    ) -> Result<(), RespondError>;
}

/// Outbound surface handed to handlers for one request.
pub struct Responder<'a> {
    transport: &'a mut dyn Transport,
    storage: &'a dyn Storage,
    gate: &'a mut SendGate,
    splitter: &'a mut Splitter,
    config: &'a Config,
    connection: ConnectionId,
    now: Instant,
}

impl Responder<'_> {
    /// Connection this responder answers on.
    #[must_use]
    pub fn connection(&self) -> ConnectionId { self.connection }

    /// Send a response with the given status, content type and message.
    ///
    /// Statuses of 400 and above replace the message with the JSON error
    /// envelope. The message is copied into an owned buffer because the send
    /// queues may outlive the caller's frame. Header and body go out as two
    /// submissions so large bodies are never duplicated into the header
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`RespondError`] when a queue rejected part of the response.
    pub fn respond(
        &mut self,
        status: u16,
        content_type: &'static str,
        message: &str,
    ) -> Result<(), RespondError> {
        let body = if status >= 400 {
            Bytes::from(json_error_body(status, message))
        } else {
            Bytes::copy_from_slice(message.as_bytes())
        };
        trace!(
            "response on {}: status {status}, {} body bytes",
            self.connection,
            body.len()
        );

        let header = ResponseHeader::new(status, content_type, body.len());
        let header_bytes = Bytes::from(header.format(self.config.server_name()));
        self.gate
            .submit(self.transport, self.connection, 0, header_bytes, self.now)?;
        if body.is_empty() {
            return Ok(());
        }
        self.splitter.send(
            self.transport,
            self.gate,
            self.connection,
            body,
            self.config.max_chunk_size(),
            1,
            self.now,
        )?;
        Ok(())
    }

    /// Serve a file from storage, chunk by chunk.
    ///
    /// The request's `Origin` is echoed in the header when present. Chunks
    /// are read at their offset when due, so only one chunk buffer is live.
    ///
    /// An unreadable file is answered in-band with a 500 envelope rather
    /// than propagated, so the connection always gets a response.
    ///
    /// # Errors
    ///
    /// Returns a [`RespondError`] when a queue rejected part of the transfer.
    pub fn respond_file(
        &mut self,
        request: &ParsedRequest,
        filename: &str,
    ) -> Result<(), RespondError> {
        let total = match self.storage.size(filename) {
            Ok(total) => total,
            Err(err) => {
                error!("cannot size {filename}: {err}");
                return self.respond(500, "application/json", "Error reading file");
            }
        };

        let header = ResponseHeader {
            origin: request.origin.clone(),
            ..ResponseHeader::new(200, mime_type(filename), total)
        };
        let header_bytes = Bytes::from(header.format(self.config.server_name()));
        self.gate
            .submit(self.transport, self.connection, 0, header_bytes, self.now)?;
        if total == 0 {
            return Ok(());
        }
        self.splitter.send_file(
            self.transport,
            self.gate,
            self.storage,
            self.connection,
            filename,
            total,
            self.config.max_chunk_size(),
            1,
            self.now,
        )?;
        Ok(())
    }

    /// Answer a CORS preflight with an empty 200 echoing the request's
    /// origin and requested headers.
    ///
    /// # Errors
    ///
    /// Returns a [`RespondError`] when the gate queue rejected the header.
    pub fn preflight(&mut self, request: &ParsedRequest) -> Result<(), RespondError> {
        let header = ResponseHeader {
            origin: request.origin.clone(),
            acrh: request.acrh.clone(),
            ..ResponseHeader::new(200, "application/json", 0)
        };
        let header_bytes = Bytes::from(header.format(self.config.server_name()));
        self.gate
            .submit(self.transport, self.connection, 0, header_bytes, self.now)?;
        Ok(())
    }
}

/// The assembled HTTP pipeline.
#[derive(Debug)]
pub struct Pipeline<H> {
    config: Config,
    gate: SendGate,
    splitter: Splitter,
    requests: ReassemblyTable,
    responses: ReassemblyTable,
    handler: H,
    status: ServerStatus,
}

impl<H: Handler> Pipeline<H> {
    /// Build a pipeline from a validated configuration and a route handler.
    #[must_use]
    pub fn new(config: Config, handler: H) -> Self {
        let gate = SendGate::new(config.pending_send_capacity(), config.watchdog_timeout());
        let splitter = Splitter::new(config.split_send_capacity());
        let requests = ReassemblyTable::new(config.reassembly_capacity());
        let responses = ReassemblyTable::new(config.reassembly_capacity());
        Self {
            config,
            gate,
            splitter,
            requests,
            responses,
            handler,
            status: ServerStatus::Up,
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &Config { &self.config }

    /// Mutable configuration access, e.g. to retune the chunk size.
    pub fn config_mut(&mut self) -> &mut Config { &mut self.config }

    /// Current server status.
    #[must_use]
    pub const fn status(&self) -> ServerStatus { self.status }

    /// Mark the server down and clear all queued outbound work.
    pub fn shutdown(&mut self) {
        self.status = ServerStatus::Down;
        self.gate.drain_pending();
        self.splitter.drain();
    }

    /// Handle one received fragment in server mode.
    ///
    /// Headered requests with their whole body dispatch immediately; ones
    /// declaring more content are parked for reassembly; headerless
    /// continuations extend a parked request and dispatch on completion.
    /// Malformed input earns a 400 envelope.
    pub fn on_receive(
        &mut self,
        transport: &mut dyn Transport,
        storage: &dyn Storage,
        connection: ConnectionId,
        bytes: &[u8],
        now: Instant,
    ) {
        match parse_request(bytes) {
            Ok(Inbound::Request(request)) => {
                if request.is_complete() {
                    self.dispatch(transport, storage, connection, &request, now);
                } else if let Err(err) = self.requests.save(
                    connection,
                    bytes,
                    request.declared_len,
                    request.body.len(),
                ) {
                    error!("cannot park request on {connection}: {err}");
                }
            }
            Ok(Inbound::Continuation(body)) => {
                match self.requests.append(connection, body) {
                    Ok(Some(full)) => self.dispatch_raw(transport, storage, connection, &full, now),
                    Ok(None) => {}
                    // already reported; the fragment is dropped
                    Err(_) => {}
                }
            }
            Err(err) => {
                error!("cannot parse request on {connection}: {err}");
                self.best_effort_error(transport, connection, 400, &err.to_string(), now);
            }
        }
    }

    /// Handle one received fragment in client mode (this node issued the
    /// request, e.g. an upgrade check).
    ///
    /// Returns the complete parsed response once all declared content has
    /// arrived.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientReceiveError`] when the fragment is malformed or
    /// the reassembly table rejects it.
    pub fn on_client_receive(
        &mut self,
        connection: ConnectionId,
        bytes: &[u8],
    ) -> Result<Option<ParsedResponse>, ClientReceiveError> {
        match parse_response(bytes)? {
            InboundResponse::Response(response) => {
                if response.is_complete() {
                    return Ok(Some(response));
                }
                self.responses
                    .save(connection, bytes, response.declared_len, response.body.len())?;
                Ok(None)
            }
            InboundResponse::Continuation(body) => {
                let Some(full) = self.responses.append(connection, body)? else {
                    return Ok(None);
                };
                match parse_response(&full)? {
                    InboundResponse::Response(response) => Ok(Some(response)),
                    InboundResponse::Continuation(_) => {
                        error!("reassembled message on {connection} lost its header");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Handle the transport's send-completion callback.
    ///
    /// Releases the gate and flags the deferred pending check; call
    /// [`Pipeline::service_pending_if_due`] afterwards from the event loop.
    pub fn on_sent(&mut self, connection: ConnectionId) { self.gate.complete(connection); }

    /// Drop per-connection reassembly state after a disconnect.
    pub fn on_disconnect(&mut self, connection: ConnectionId) {
        self.requests.remove(connection);
        self.responses.remove(connection);
    }

    /// Force-clear the gate if the watchdog deadline has passed.
    ///
    /// Returns `true` when the gate was reset.
    pub fn tick(&mut self, now: Instant) -> bool { self.gate.expire_watchdog(now) }

    /// Deadline the event loop should wake at for the watchdog, if a send is
    /// in flight.
    #[must_use]
    pub const fn watchdog_deadline(&self) -> Option<Instant> { self.gate.watchdog_deadline() }

    /// Drain deferred pending checks raised since the last call.
    ///
    /// Each check services one parked plain send first, else one split-queue
    /// continuation. A down server instead clears both queues.
    pub fn service_pending_if_due(
        &mut self,
        transport: &mut dyn Transport,
        storage: &dyn Storage,
        now: Instant,
    ) {
        while self.gate.take_check_due() {
            self.service_pending(transport, storage, now);
        }
    }

    fn service_pending(
        &mut self,
        transport: &mut dyn Transport,
        storage: &dyn Storage,
        now: Instant,
    ) {
        if self.status == ServerStatus::Down {
            trace!("server down, clearing pending send and split queues");
            self.gate.drain_pending();
            self.splitter.drain();
            return;
        }

        // Plain pending sends go first: a split transfer's opening chunk
        // lands in this queue whenever the header occupied the gate, so
        // draining it before the split queue keeps chunks in payload order.
        if let Some(pending) = self.gate.pop_pending() {
            trace!(
                "pending send found on {}: {} bytes",
                pending.connection,
                pending.payload.len()
            );
            if let Err(err) = self.gate.submit(
                transport,
                pending.connection,
                pending.order,
                pending.payload,
                now,
            ) {
                error!("cannot resubmit pending send: {err}");
            }
            return;
        }

        match self.splitter.service_one(
            transport,
            &mut self.gate,
            storage,
            self.config.max_chunk_size(),
            now,
        ) {
            Ok(Serviced::Idle | Serviced::Chunk { .. } | Serviced::Abandoned { .. }) => {}
            Err(err) => {
                error!("split-send continuation failed: {err}");
                if let SplitError::Storage { connection, .. } = err {
                    self.best_effort_error(transport, connection, 500, "Error reading file", now);
                }
            }
        }
    }

    fn dispatch_raw(
        &mut self,
        transport: &mut dyn Transport,
        storage: &dyn Storage,
        connection: ConnectionId,
        raw: &[u8],
        now: Instant,
    ) {
        match parse_request(raw) {
            Ok(Inbound::Request(request)) => {
                self.dispatch(transport, storage, connection, &request, now);
            }
            Ok(Inbound::Continuation(_)) => {
                error!("reassembled message on {connection} lost its header");
            }
            Err(err) => {
                error!("cannot parse reassembled request on {connection}: {err}");
                self.best_effort_error(transport, connection, 400, &err.to_string(), now);
            }
        }
    }

    fn dispatch(
        &mut self,
        transport: &mut dyn Transport,
        storage: &dyn Storage,
        connection: ConnectionId,
        request: &ParsedRequest,
        now: Instant,
    ) {
        trace!(
            "dispatching {} {} on {connection}",
            request.method, request.url
        );
        let mut responder = Responder {
            transport: &mut *transport,
            storage,
            gate: &mut self.gate,
            splitter: &mut self.splitter,
            config: &self.config,
            connection,
            now,
        };
        if let Err(err) = self.handler.handle(&mut responder, request) {
            error!("handler failed on {connection}: {err}");
            self.best_effort_error(transport, connection, 500, &err.to_string(), now);
        }
    }

    fn best_effort_error(
        &mut self,
        transport: &mut dyn Transport,
        connection: ConnectionId,
        status: u16,
        message: &str,
        now: Instant,
    ) {
        let storage = NoStorage;
        let mut responder = Responder {
            transport,
            storage: &storage,
            gate: &mut self.gate,
            splitter: &mut self.splitter,
            config: &self.config,
            connection,
            now,
        };
        if let Err(err) = responder.respond(status, "application/json", message) {
            error!("cannot emit {status} on {connection}: {err}");
        }
    }
}

/// Storage stub for error paths that can never touch a file.
struct NoStorage;

impl Storage for NoStorage {
    fn size(&self, name: &str) -> Result<usize, StorageError> {
        Err(StorageError::NotFound {
            name: name.to_owned(),
        })
    }

    fn read(&self, name: &str, _offset: usize, _len: usize) -> Result<Bytes, StorageError> {
        Err(StorageError::NotFound {
            name: name.to_owned(),
        })
    }
}
