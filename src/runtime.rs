//! Event loop driving a [`Pipeline`] from a stream of transport events.
//!
//! The loop multiplexes three sources: the cancellation token (shutdown wins,
//! the select is biased), the transport event channel, and the send gate's
//! watchdog deadline. After every event the deferred pending checks are
//! drained, so queue servicing always happens from loop context rather than
//! inside a completion.

use log::{debug, info};
use tokio::{
    select,
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;

use crate::{
    pipeline::{Handler, Pipeline},
    storage::Storage,
    transport::{Transport, TransportEvent},
};

/// A pipeline bound to its transport, storage and event channel.
#[derive(Debug)]
pub struct Runtime<H, T, S> {
    pipeline: Pipeline<H>,
    transport: T,
    storage: S,
    events: mpsc::Receiver<TransportEvent>,
    shutdown: CancellationToken,
}

impl<H, T, S> Runtime<H, T, S>
where
    H: Handler,
    T: Transport,
    S: Storage,
{
    /// Bind a pipeline to its collaborators.
    #[must_use]
    pub fn new(
        pipeline: Pipeline<H>,
        transport: T,
        storage: S,
        events: mpsc::Receiver<TransportEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            transport,
            storage,
            events,
            shutdown,
        }
    }

    /// The pipeline's current state.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline<H> { &self.pipeline }

    /// The bound transport.
    #[must_use]
    pub fn transport(&self) -> &T { &self.transport }

    /// Run until cancelled or the event channel closes.
    ///
    /// Both exits mark the server down and clear queued outbound work.
    pub async fn run(&mut self) {
        info!("http pipeline running");
        loop {
            let deadline = self.pipeline.watchdog_deadline();
            select! {
                biased;
                () = self.shutdown.cancelled() => {
                    debug!("shutdown requested");
                    break;
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("event channel closed");
                        break;
                    };
                    self.handle(event);
                }
                () = watchdog_wait(deadline) => {
                    let now = Instant::now();
                    if self.pipeline.tick(now) {
                        self.pipeline
                            .service_pending_if_due(&mut self.transport, &self.storage, now);
                    }
                }
            }
        }
        self.pipeline.shutdown();
        info!("http pipeline stopped");
    }

    fn handle(&mut self, event: TransportEvent) {
        let now = Instant::now();
        match event {
            TransportEvent::Received { connection, bytes } => {
                self.pipeline
                    .on_receive(&mut self.transport, &self.storage, connection, &bytes, now);
            }
            TransportEvent::Sent { connection } => self.pipeline.on_sent(connection),
            TransportEvent::Disconnected { connection } => self.pipeline.on_disconnect(connection),
        }
        self.pipeline
            .service_pending_if_due(&mut self.transport, &self.storage, now);
    }
}

async fn watchdog_wait(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::Runtime;
    use crate::{
        config::Config,
        pipeline::{Handler, Pipeline, RespondError, Responder},
        parser::ParsedRequest,
        test_support::{MockStorage, MockTransport},
        transport::{ConnectionId, TransportEvent},
    };

    const CONN: ConnectionId = ConnectionId::new(3);

    struct Echo;

    impl Handler for Echo {
        fn handle(
            &mut self,
            responder: &mut Responder<'_>,
            request: &ParsedRequest,
        ) -> Result<(), RespondError> {
            let body = String::from_utf8_lossy(&request.body).into_owned();
            responder.respond(200, "text/plain", &body)
        }
    }

    fn runtime(
        events: mpsc::Receiver<TransportEvent>,
        shutdown: CancellationToken,
    ) -> Runtime<Echo, MockTransport, MockStorage> {
        Runtime::new(
            Pipeline::new(Config::default(), Echo),
            MockTransport::default(),
            MockStorage::default(),
            events,
            shutdown,
        )
    }

    #[tokio::test]
    async fn events_flow_through_to_the_transport() {
        let (tx, rx) = mpsc::channel(16);
        let mut runtime = runtime(rx, CancellationToken::new());

        tx.send(TransportEvent::Received {
            connection: CONN,
            bytes: Bytes::from_static(b"POST /echo HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi"),
        })
        .await
        .unwrap();
        tx.send(TransportEvent::Sent { connection: CONN })
            .await
            .unwrap();
        tx.send(TransportEvent::Sent { connection: CONN })
            .await
            .unwrap();
        drop(tx);
        runtime.run().await;

        let payloads = runtime.transport().payloads_for(CONN);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1], b"hi");
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_recovers_a_lost_completion() {
        let (tx, rx) = mpsc::channel(16);
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut runtime = runtime(rx, task_token);
            runtime.run().await;
            runtime
        });

        tx.send(TransportEvent::Received {
            connection: CONN,
            bytes: Bytes::from_static(b"POST /echo HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi"),
        })
        .await
        .unwrap();
        // no Sent event ever arrives; paused time jumps to the watchdog
        tokio::time::sleep(Duration::from_secs(3)).await;
        token.cancel();

        let runtime = handle.await.unwrap();
        let payloads = runtime.transport().payloads_for(CONN);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1], b"hi");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_clears_queued_work() {
        let (tx, rx) = mpsc::channel(16);
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut runtime = runtime(rx, task_token);
            runtime.run().await;
            runtime
        });

        tx.send(TransportEvent::Received {
            connection: CONN,
            bytes: Bytes::from_static(b"POST /echo HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi"),
        })
        .await
        .unwrap();
        // paused time: the loop has consumed the event once this sleep runs,
        // and the 2 s watchdog has not fired yet
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        let runtime = handle.await.unwrap();
        // the header went out before cancellation; the body was dropped
        assert_eq!(runtime.transport().payloads_for(CONN).len(), 1);
    }
}
