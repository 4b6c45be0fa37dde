//! Session I/O task.
//!
//! One task owns the connection for the session's lifetime. It is the only
//! writer, the only reader and the only mutator of the topic table; callers
//! reach it through an ordered request queue. Inbound telegrams are routed by
//! MID to a topic publisher or to the shared command-response publisher.
//!
//! Responses are tagged with the number of commands written so far. A command
//! written as number `n` only accepts responses tagged `n` or later; anything
//! older answers a command that already gave up.

use std::sync::Arc;

use bytes::Bytes;
use op_core::{DeliveryQueue, Publisher, RegistryError, TopicKey, TopicRegistry, Writer};
use op_protocol::Telegram;
use op_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, trace, warn};

use crate::error::ClientError;
use crate::metrics::{self, SessionMetricsGuard};

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, communication not started.
    Connected,
    /// The controller accepted MID 0001.
    CommunicationStarted,
    /// Torn down; every stream has ended.
    Closed,
}

/// Work for the I/O task.
pub(crate) enum Request {
    /// Write one telegram. A command write replies with its sequence
    /// number; other writes reply with the current one.
    Send {
        telegram: Bytes,
        command: bool,
        done: oneshot::Sender<Result<u64, ClientError>>,
    },
    /// Route `keys` to `publisher`.
    Register {
        keys: Vec<TopicKey>,
        publisher: Publisher<Telegram>,
        done: oneshot::Sender<Result<(), RegistryError>>,
    },
    /// Remove the routes for `keys`.
    Deregister {
        keys: Vec<TopicKey>,
        done: oneshot::Sender<Vec<Writer<Telegram>>>,
    },
}

enum Event {
    Shutdown,
    Request(Option<Request>),
    Received(Result<Option<Bytes>, TransportError>),
}

pub(crate) struct Session {
    id: ConnectionId,
    conn: Box<dyn Connection>,
    requests: mpsc::Receiver<Request>,
    shutdown: watch::Receiver<bool>,
    state: Arc<watch::Sender<SessionState>>,
    responses: DeliveryQueue<(u64, Bytes)>,
    topics: TopicRegistry<Telegram>,
    /// Commands written so far.
    commands: u64,
    strict_framing: bool,
}

impl Session {
    pub(crate) fn new(
        conn: Box<dyn Connection>,
        requests: mpsc::Receiver<Request>,
        shutdown: watch::Receiver<bool>,
        state: Arc<watch::Sender<SessionState>>,
        responses: DeliveryQueue<(u64, Bytes)>,
        strict_framing: bool,
    ) -> Self {
        Self {
            id: conn.id().clone(),
            conn,
            requests,
            shutdown,
            state,
            responses,
            topics: TopicRegistry::new(),
            commands: 0,
            strict_framing,
        }
    }

    /// Run until shutdown, peer close or a fatal error, then tear down.
    pub(crate) async fn run(mut self) {
        let _metrics_guard = SessionMetricsGuard::new();
        debug!(connection = %self.id, "Session task started");

        loop {
            let event = tokio::select! {
                biased;

                _ = self.shutdown.wait_for(|shutdown| *shutdown) => Event::Shutdown,
                request = self.requests.recv() => Event::Request(request),
                received = self.conn.recv() => Event::Received(received),
            };

            match event {
                Event::Shutdown | Event::Request(None) => {
                    debug!(connection = %self.id, "Shutdown requested");
                    break;
                }
                Event::Request(Some(request)) => {
                    if !self.handle_request(request).await {
                        break;
                    }
                }
                Event::Received(Ok(Some(raw))) => {
                    if !self.dispatch(raw) {
                        break;
                    }
                }
                Event::Received(Ok(None)) => {
                    info!(connection = %self.id, "Controller closed the connection");
                    break;
                }
                Event::Received(Err(e)) => {
                    error!(connection = %self.id, error = %e, "Receive failed");
                    break;
                }
            }
        }

        self.teardown().await;
    }

    /// Returns `false` if the session must end.
    async fn handle_request(&mut self, request: Request) -> bool {
        match request {
            Request::Send {
                telegram,
                command,
                done,
            } => {
                trace!(
                    connection = %self.id,
                    telegram = %String::from_utf8_lossy(&telegram),
                    "Sending"
                );
                match self.conn.send(telegram).await {
                    Ok(()) => {
                        metrics::record_sent();
                        if command {
                            self.commands += 1;
                        }
                        let _ = done.send(Ok(self.commands));
                        true
                    }
                    Err(e) => {
                        error!(connection = %self.id, error = %e, "Send failed");
                        let _ = done.send(Err(ClientError::Closed));
                        false
                    }
                }
            }
            Request::Register {
                keys,
                publisher,
                done,
            } => {
                let _ = done.send(self.topics.register(&keys, publisher));
                true
            }
            Request::Deregister { keys, done } => {
                let _ = done.send(self.topics.deregister(&keys));
                true
            }
        }
    }

    /// Route one inbound telegram. Returns `false` if the session must end.
    fn dispatch(&mut self, raw: Bytes) -> bool {
        let Some(key) = TopicKey::of_telegram(&raw) else {
            if self.strict_framing {
                error!(connection = %self.id, len = raw.len(), "Telegram shorter than header");
                return false;
            }
            warn!(connection = %self.id, len = raw.len(), "Dropping telegram shorter than header");
            metrics::record_dropped("short", 1);
            return true;
        };

        trace!(
            connection = %self.id,
            telegram = %String::from_utf8_lossy(&raw),
            "Received"
        );

        let Some(route) = self.topics.route(&key) else {
            metrics::record_received("response");
            if !self.responses.push((self.commands, raw)) {
                metrics::record_dropped("closed", 1);
            }
            return true;
        };

        match Telegram::decode(raw) {
            Ok(telegram) => {
                metrics::record_received("topic");
                if !route.push(telegram) {
                    metrics::record_dropped("closed", 1);
                }
            }
            Err(e) => {
                warn!(connection = %self.id, topic = %key, error = %e, "Dropping undecodable push");
                metrics::record_dropped("header", 1);
            }
        }
        true
    }

    async fn teardown(mut self) {
        // Topic streams end after their queued pushes; a waiting command
        // gives up at once.
        self.topics.close_all();
        self.responses.close();

        // Pending requests are answered by dropping their reply channel.
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            if let Request::Register { publisher, .. } = request {
                publisher.close();
            }
        }

        if let Err(e) = self.conn.close().await {
            debug!(connection = %self.id, error = %e, "Close failed");
        }
        self.state.send_replace(SessionState::Closed);
        info!(connection = %self.id, "Session closed");
    }
}
