//! Session handle.
//!
//! A [`Client`] drives one controller connection. Commands are serialized by
//! a single in-flight slot; pushes of subscribed topics arrive on per-topic
//! [`Reader`]s in wire order.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use op_core::{DeliveryQueue, Publisher, Reader, Topic, TopicKey};
use op_protocol::{mid, NegativeAck, Telegram};
use op_transport::{Connection, ConnectionId, Dialer, TcpDialer};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::metrics;
use crate::session::{Request, Session, SessionState};

/// Handle to an Open Protocol session.
///
/// Dropping the handle shuts the session down.
pub struct Client {
    id: ConnectionId,
    requests: mpsc::Sender<Request>,
    /// The command slot: whoever holds it owns the next response.
    responses: Mutex<Reader<(u64, Bytes)>>,
    shutdown: watch::Sender<bool>,
    state: Arc<watch::Sender<SessionState>>,
    command_timeout: Duration,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Start a session on an open connection.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn with_connection(conn: Box<dyn Connection>, config: &SessionConfig) -> Self {
        let id = conn.id().clone();
        let (requests, pending) = mpsc::channel(config.request_queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (state, _) = watch::channel(SessionState::Connected);
        let state = Arc::new(state);

        let responses = Publisher::new();
        let reader = responses.reader();
        let session = Session::new(
            conn,
            pending,
            shutdown_rx,
            Arc::clone(&state),
            DeliveryQueue::spawn(responses),
            config.strict_framing,
        );
        tokio::spawn(session.run());
        info!(connection = %id, "Session started");

        Self {
            id,
            requests,
            responses: Mutex::new(reader),
            shutdown,
            state,
            command_timeout: config.command_timeout(),
        }
    }

    /// Dial with `dialer` and start a session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the connection cannot be opened.
    pub async fn connect(dialer: &dyn Dialer, config: &SessionConfig) -> Result<Self, ClientError> {
        let conn = dialer.connect().await?;
        debug!(transport = dialer.name(), "Dialed controller");
        Ok(Self::with_connection(conn, config))
    }

    /// Connect over TCP to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the host does not resolve or the
    /// connection cannot be opened before the connect deadline.
    pub async fn connect_tcp(
        host: impl Into<String>,
        port: u16,
        config: &SessionConfig,
    ) -> Result<Self, ClientError> {
        let dialer = TcpDialer::new(config.tcp_dialer(host, port));
        Self::connect(&dialer, config).await
    }

    /// Connection identifier.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session is torn down.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        // The sender lives as long as `self`.
        let _ = state.wait_for(|state| *state == SessionState::Closed).await;
    }

    /// Shut the session down and wait for teardown. Every topic stream ends
    /// and commands in flight fail with [`ClientError::Closed`].
    pub async fn close(&self) {
        self.shutdown.send_replace(true);
        self.closed().await;
    }

    /// Send MID 0001 and wait for MID 0002.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] if the controller refuses, or any
    /// error of the command path.
    pub async fn start_communication(&self) -> Result<(), ClientError> {
        self.exec(request(mid::COMMUNICATION_START, b"")?, mid::COMMUNICATION_START_ACK)
            .await?;
        self.state.send_if_modified(|state| {
            let started = *state == SessionState::Connected;
            if started {
                *state = SessionState::CommunicationStarted;
            }
            started
        });
        info!(connection = %self.id, "Communication started");
        Ok(())
    }

    /// Send MID 0003 and wait for the acknowledge.
    ///
    /// # Errors
    ///
    /// Returns any error of the command path.
    pub async fn stop_communication(&self) -> Result<(), ClientError> {
        self.exec(request(mid::COMMUNICATION_STOP, b"")?, mid::COMMAND_ACCEPTED)
            .await?;
        self.state.send_if_modified(|state| {
            let stopped = *state == SessionState::CommunicationStarted;
            if stopped {
                *state = SessionState::Connected;
            }
            stopped
        });
        info!(connection = %self.id, "Communication stopped");
        Ok(())
    }

    /// Send MID 9999 and wait for the echo.
    ///
    /// # Errors
    ///
    /// Returns any error of the command path.
    pub async fn keep_alive(&self) -> Result<(), ClientError> {
        self.exec(request(mid::KEEP_ALIVE, b"")?, mid::KEEP_ALIVE).await?;
        Ok(())
    }

    /// Subscribe to `topic`.
    ///
    /// The topic is routed before the subscribe telegram is written, so no
    /// push is lost. Pushes of every MID of the topic arrive on the returned
    /// reader in wire order; it ends when the session closes or the topic is
    /// unsubscribed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadySubscribed`] if the topic has a stream in
    /// this session, [`ClientError::Rejected`] if the controller refuses, or
    /// any error of the command path. On error no stream is left behind.
    pub async fn subscribe(&self, topic: Topic) -> Result<Reader<Telegram>, ClientError> {
        let telegram = request(topic.subscribe_mid(), b"")?;
        let keys = topic.keys();
        let publisher = Publisher::new();
        let reader = publisher.reader();

        let (done, registered) = oneshot::channel();
        let register = Request::Register {
            keys: keys.clone(),
            publisher: publisher.clone(),
            done,
        };
        if self.requests.send(register).await.is_err() {
            publisher.close();
            return Err(ClientError::Closed);
        }
        match registered.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection = %self.id, topic = %topic, error = %e, "Topic already routed");
                publisher.close();
                return Err(ClientError::AlreadySubscribed(topic));
            }
            Err(_) => {
                publisher.close();
                return Err(ClientError::Closed);
            }
        }

        if let Err(e) = self.exec(telegram, mid::COMMAND_ACCEPTED).await {
            warn!(connection = %self.id, topic = %topic, error = %e, "Subscribe failed");
            self.drop_routes(keys).await;
            publisher.close();
            return Err(e);
        }

        info!(connection = %self.id, topic = %topic, "Subscribed");
        Ok(reader)
    }

    /// Acknowledge the last push of `topic`. No response is awaited.
    ///
    /// PowerMACS results are acknowledged without requesting bolt data; see
    /// [`Client::powermacs_result_acknowledge`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the session is closed.
    pub async fn acknowledge(&self, topic: Topic) -> Result<(), ClientError> {
        let data: &[u8] = match topic {
            Topic::PowerMacsResult => b"0",
            _ => b"",
        };
        self.write(request(topic.ack_mid(), data)?, false).await?;
        Ok(())
    }

    /// Unsubscribe from `topic` and end its stream.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] if the controller refuses, in which
    /// case the stream stays open, or any error of the command path.
    pub async fn unsubscribe(&self, topic: Topic) -> Result<(), ClientError> {
        self.exec(request(topic.unsubscribe_mid(), b"")?, mid::COMMAND_ACCEPTED)
            .await?;
        self.drop_routes(topic.keys()).await;
        info!(connection = %self.id, topic = %topic, "Unsubscribed");
        Ok(())
    }

    /// Subscribe to MID 0106/0107 PowerMACS results.
    ///
    /// # Errors
    ///
    /// See [`Client::subscribe`].
    pub async fn powermacs_result_subscribe(&self) -> Result<Reader<Telegram>, ClientError> {
        self.subscribe(Topic::PowerMacsResult).await
    }

    /// Acknowledge a PowerMACS result with MID 0108, optionally asking for the
    /// MID 0107 bolt data.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the session is closed.
    pub async fn powermacs_result_acknowledge(&self, with_bolt_data: bool) -> Result<(), ClientError> {
        let data: &[u8] = if with_bolt_data { b"1" } else { b"0" };
        self.write(request(Topic::PowerMacsResult.ack_mid(), data)?, false)
            .await?;
        Ok(())
    }

    /// Unsubscribe from PowerMACS results.
    ///
    /// # Errors
    ///
    /// See [`Client::unsubscribe`].
    pub async fn powermacs_result_unsubscribe(&self) -> Result<(), ClientError> {
        self.unsubscribe(Topic::PowerMacsResult).await
    }

    /// Run one command: hold the slot, write, wait for the response and
    /// check its MID.
    ///
    /// Responses tagged before this command's write belong to commands that
    /// timed out; they are skipped.
    async fn exec(&self, telegram: Telegram, expected: u16) -> Result<Telegram, ClientError> {
        let responses = self.responses.lock().await;

        let command = telegram.mid();
        let started = Instant::now();
        let sequence = self.write(telegram, true).await?;
        let deadline = Instant::now() + self.command_timeout;

        let mut stale = 0;
        let raw = loop {
            match tokio::time::timeout_at(deadline, responses.recv()).await {
                Ok(Some((tag, _))) if tag < sequence => stale += 1,
                Ok(Some((_, raw))) => break raw,
                Ok(None) => return Err(ClientError::Closed),
                Err(_) => {
                    warn!(connection = %self.id, mid = command, "No response before deadline");
                    metrics::record_timeout();
                    return Err(ClientError::Timeout(self.command_timeout));
                }
            }
        };
        drop(responses);
        metrics::record_command_latency(started.elapsed());
        if stale > 0 {
            warn!(connection = %self.id, dropped = stale, "Discarded stale responses");
            metrics::record_dropped("stale", stale);
        }

        check_response(Telegram::decode(raw)?, expected)
    }

    /// Hand one telegram to the I/O task and wait until it is written.
    /// Returns the session's command count after the write.
    async fn write(&self, telegram: Telegram, command: bool) -> Result<u64, ClientError> {
        let (done, written) = oneshot::channel();
        self.requests
            .send(Request::Send {
                telegram: telegram.into_bytes(),
                command,
                done,
            })
            .await
            .map_err(|_| ClientError::Closed)?;
        written.await.map_err(|_| ClientError::Closed)?
    }

    /// Remove the routes for `keys` and end their streams.
    async fn drop_routes(&self, keys: Vec<TopicKey>) {
        let (done, removed) = oneshot::channel();
        if self
            .requests
            .send(Request::Deregister { keys, done })
            .await
            .is_err()
        {
            return;
        }
        // A closed session has already ended every stream.
        for writer in removed.await.unwrap_or_default() {
            writer.close();
        }
    }
}

macro_rules! topic_operations {
    ($($topic:ident => $subscribe:ident, $acknowledge:ident, $unsubscribe:ident;)*) => {
        impl Client {
            $(
                #[doc = concat!("Subscribe to [`Topic::", stringify!($topic), "`].")]
                ///
                /// # Errors
                ///
                /// See [`Client::subscribe`].
                pub async fn $subscribe(&self) -> Result<Reader<Telegram>, ClientError> {
                    self.subscribe(Topic::$topic).await
                }

                #[doc = concat!("Acknowledge a [`Topic::", stringify!($topic), "`] push.")]
                ///
                /// # Errors
                ///
                /// See [`Client::acknowledge`].
                pub async fn $acknowledge(&self) -> Result<(), ClientError> {
                    self.acknowledge(Topic::$topic).await
                }

                #[doc = concat!("Unsubscribe from [`Topic::", stringify!($topic), "`].")]
                ///
                /// # Errors
                ///
                /// See [`Client::unsubscribe`].
                pub async fn $unsubscribe(&self) -> Result<(), ClientError> {
                    self.unsubscribe(Topic::$topic).await
                }
            )*
        }
    };
}

topic_operations! {
    JobInfo => job_info_subscribe, job_info_acknowledge, job_info_unsubscribe;
    VehicleId => vehicle_id_subscribe, vehicle_id_acknowledge, vehicle_id_unsubscribe;
    LastTighteningResult => last_tightening_result_subscribe,
        last_tightening_result_acknowledge, last_tightening_result_unsubscribe;
    MultiSpindleResult => multi_spindle_result_subscribe,
        multi_spindle_result_acknowledge, multi_spindle_result_unsubscribe;
}

fn request(mid: u16, data: &[u8]) -> Result<Telegram, ClientError> {
    Ok(Telegram::new(mid, 1, data)?)
}

/// Accept `expected`, surface MID 0004 as a rejection, refuse anything else.
fn check_response(response: Telegram, expected: u16) -> Result<Telegram, ClientError> {
    match response.mid() {
        actual if actual == expected => Ok(response),
        mid::COMMAND_ERROR => {
            let nak = response.payload::<NegativeAck>()?;
            warn!(mid = nak.mid_number, error_code = nak.error_code.code(), "Command rejected");
            metrics::record_negative_ack();
            Err(ClientError::Rejected(nak))
        }
        actual => Err(ClientError::UnexpectedMid { expected, actual }),
    }
}
