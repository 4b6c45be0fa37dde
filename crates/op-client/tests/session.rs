//! Session behaviour against a scripted controller.

use std::time::Duration;

use bytes::Bytes;
use op_client::{Client, ClientError, ErrorCode, SessionConfig, SessionState, Telegram, Topic};
use op_protocol::mid;
use op_transport::{Connection, StreamConnection};
use tokio::io::{duplex, DuplexStream};
use tokio::net::TcpListener;

fn telegram(mid: u16, data: &str) -> Bytes {
    Telegram::new(mid, 1, data).unwrap().into_bytes()
}

/// The controller end of a session.
struct Controller {
    conn: StreamConnection<DuplexStream>,
}

impl Controller {
    /// Read the next telegram and check its MID.
    async fn expect(&mut self, mid: u16) -> Telegram {
        let raw = self
            .conn
            .recv()
            .await
            .unwrap()
            .expect("client closed the connection");
        let telegram = Telegram::decode(raw).unwrap();
        assert_eq!(telegram.mid(), mid);
        telegram
    }

    async fn send(&mut self, mid: u16, data: &str) {
        self.conn.send(telegram(mid, data)).await.unwrap();
    }

    /// Answer a request with MID 0005.
    async fn accept(&mut self, request: u16) {
        self.expect(request).await;
        self.send(mid::COMMAND_ACCEPTED, &format!("{request:04}")).await;
    }

    /// Answer a request with MID 0004.
    async fn reject(&mut self, request: u16, code: u8) {
        self.expect(request).await;
        self.send(mid::COMMAND_ERROR, &format!("{request:04}{code:02}"))
            .await;
    }

    async fn echo_keep_alive(&mut self) {
        self.expect(mid::KEEP_ALIVE).await;
        self.send(mid::KEEP_ALIVE, "").await;
    }
}

fn session(config: SessionConfig) -> (Client, Controller) {
    let (near, far) = duplex(64 * 1024);
    let client = Client::with_connection(Box::new(StreamConnection::new(near)), &config);
    let controller = Controller {
        conn: StreamConnection::new(far),
    };
    (client, controller)
}

#[tokio::test]
async fn test_start_and_stop_communication() {
    let (client, mut controller) = session(SessionConfig::default());
    assert_eq!(client.state(), SessionState::Connected);

    let script = async {
        let start = controller.expect(mid::COMMUNICATION_START).await;
        assert_eq!(start.as_bytes().as_ref(), b"00200001001000000000");
        controller.send(mid::COMMUNICATION_START_ACK, "").await;
    };
    let (started, ()) = tokio::join!(client.start_communication(), script);
    started.unwrap();
    assert_eq!(client.state(), SessionState::CommunicationStarted);

    let (stopped, ()) = tokio::join!(
        client.stop_communication(),
        controller.accept(mid::COMMUNICATION_STOP)
    );
    stopped.unwrap();
    assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_negative_ack_is_rejection() {
    let (client, mut controller) = session(SessionConfig::default());

    let (result, ()) = tokio::join!(
        client.start_communication(),
        controller.reject(mid::COMMUNICATION_START, 96)
    );
    let err = result.unwrap_err();
    let nak = err.negative_ack().unwrap();
    assert_eq!(nak.mid_number, mid::COMMUNICATION_START);
    assert_eq!(nak.error_code, ErrorCode::ClientAlreadyConnected);
    assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_unexpected_response_mid() {
    let (client, mut controller) = session(SessionConfig::default());

    let (result, ()) = tokio::join!(
        client.start_communication(),
        controller.accept(mid::COMMUNICATION_START)
    );
    assert!(matches!(
        result,
        Err(ClientError::UnexpectedMid {
            expected: 2,
            actual: 5
        })
    ));
}

#[tokio::test]
async fn test_pushes_arrive_in_order() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.last_tightening_result_subscribe(),
        controller.accept(mid::LAST_TIGHTENING_SUBSCRIBE)
    );
    let results = results.unwrap();

    for id in 1..=5 {
        controller.send(mid::LAST_TIGHTENING, &format!("{id:010}")).await;
    }
    for id in 1..=5 {
        let push = results.recv().await.unwrap();
        assert_eq!(push.mid(), mid::LAST_TIGHTENING);
        assert_eq!(push.data(), format!("{id:010}").as_bytes());
    }

    client.last_tightening_result_acknowledge().await.unwrap();
    let ack = controller.expect(mid::LAST_TIGHTENING_ACK).await;
    assert!(ack.data().is_empty());
}

#[tokio::test]
async fn test_push_during_command() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.subscribe(Topic::VehicleId),
        controller.accept(mid::VIN_SUBSCRIBE)
    );
    let results = results.unwrap();

    let script = async {
        controller.expect(mid::KEEP_ALIVE).await;
        controller.send(mid::VIN, "WDB1234567").await;
        controller.send(mid::KEEP_ALIVE, "").await;
    };
    let (alive, ()) = tokio::join!(client.keep_alive(), script);
    alive.unwrap();

    let push = results.recv().await.unwrap();
    assert_eq!(push.data(), b"WDB1234567");
}

#[tokio::test]
async fn test_acknowledge_during_command() {
    let (client, mut controller) = session(SessionConfig::default());

    let script = async {
        controller.expect(mid::KEEP_ALIVE).await;
        client.last_tightening_result_acknowledge().await.unwrap();
        controller.expect(mid::LAST_TIGHTENING_ACK).await;
        controller.send(mid::KEEP_ALIVE, "").await;
    };
    let (alive, ()) = tokio::join!(client.keep_alive(), script);
    alive.unwrap();

    let (alive, ()) = tokio::join!(client.keep_alive(), controller.echo_keep_alive());
    alive.unwrap();
}

#[tokio::test]
async fn test_close_delivers_queued_pushes() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.last_tightening_result_subscribe(),
        controller.accept(mid::LAST_TIGHTENING_SUBSCRIBE)
    );
    let results = results.unwrap();

    for id in 1..=4 {
        controller.send(mid::LAST_TIGHTENING, &format!("{id:010}")).await;
    }
    // The echo is read after the pushes, so all four are queued.
    let (alive, ()) = tokio::join!(client.keep_alive(), controller.echo_keep_alive());
    alive.unwrap();

    client.close().await;

    let mut received = Vec::new();
    while let Some(push) = results.recv().await {
        received.push(push.data().to_vec());
    }
    let expected: Vec<_> = (1..=4).map(|id| format!("{id:010}").into_bytes()).collect();
    assert_eq!(received, expected);
    assert!(results.recv().await.is_none());
}

#[tokio::test]
async fn test_close_ends_streams() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.subscribe(Topic::JobInfo),
        controller.accept(mid::JOB_INFO_SUBSCRIBE)
    );
    let results = results.unwrap();
    controller.send(mid::JOB_INFO, "01").await;

    client.close().await;
    assert_eq!(client.state(), SessionState::Closed);

    // Pushes accepted before the close may still be read; then the stream ends.
    while results.recv().await.is_some() {}
    assert!(results.recv().await.is_none());

    assert!(controller.conn.recv().await.unwrap().is_none());
    assert!(client.keep_alive().await.unwrap_err().is_closed());
    client.close().await;
}

#[tokio::test]
async fn test_close_unblocks_command() {
    let (client, mut controller) = session(SessionConfig::default());

    let script = async {
        controller.expect(mid::KEEP_ALIVE).await;
        client.close().await;
    };
    let (result, ()) = tokio::join!(client.keep_alive(), script);
    assert!(matches!(result, Err(ClientError::Closed)));
}

#[tokio::test]
async fn test_peer_close() {
    let (client, controller) = session(SessionConfig::default());

    drop(controller);
    client.closed().await;
    assert_eq!(client.state(), SessionState::Closed);
    assert!(matches!(
        client.start_communication().await,
        Err(ClientError::Closed)
    ));
}

#[tokio::test]
async fn test_failed_subscribe_releases_topic() {
    let (client, mut controller) = session(SessionConfig::default());

    let (result, ()) = tokio::join!(
        client.subscribe(Topic::LastTighteningResult),
        controller.reject(mid::LAST_TIGHTENING_SUBSCRIBE, 9)
    );
    let err = result.unwrap_err();
    assert_eq!(
        err.negative_ack().unwrap().error_code,
        ErrorCode::LastTighteningResultSubscriptionAlreadyExists
    );

    let (results, ()) = tokio::join!(
        client.subscribe(Topic::LastTighteningResult),
        controller.accept(mid::LAST_TIGHTENING_SUBSCRIBE)
    );
    let results = results.unwrap();
    controller.send(mid::LAST_TIGHTENING, "after").await;
    assert_eq!(results.recv().await.unwrap().data(), b"after");
}

#[tokio::test]
async fn test_failed_powermacs_subscribe_releases_both_mids() {
    let (client, mut controller) = session(SessionConfig::default());

    let (result, ()) = tokio::join!(
        client.powermacs_result_subscribe(),
        controller.reject(mid::POWERMACS_SUBSCRIBE, 79)
    );
    assert_eq!(
        result.unwrap_err().negative_ack().unwrap().error_code,
        ErrorCode::CommandFailed
    );

    let (results, ()) = tokio::join!(
        client.powermacs_result_subscribe(),
        controller.accept(mid::POWERMACS_SUBSCRIBE)
    );
    let results = results.unwrap();

    controller.send(mid::POWERMACS_STATION, "station").await;
    controller.send(mid::POWERMACS_BOLT, "bolt").await;
    assert_eq!(results.recv().await.unwrap().data(), b"station");
    assert_eq!(results.recv().await.unwrap().data(), b"bolt");
}

#[tokio::test]
async fn test_already_subscribed() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.subscribe(Topic::MultiSpindleResult),
        controller.accept(mid::MULTI_SPINDLE_SUBSCRIBE)
    );
    let results = results.unwrap();

    let err = client
        .multi_spindle_result_subscribe()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::AlreadySubscribed(Topic::MultiSpindleResult)
    ));

    // Nothing was written for the refused subscription.
    let (alive, ()) = tokio::join!(client.keep_alive(), controller.echo_keep_alive());
    alive.unwrap();

    // The first stream is untouched.
    controller.send(mid::MULTI_SPINDLE, "spindles").await;
    assert_eq!(results.recv().await.unwrap().data(), b"spindles");
}

#[tokio::test]
async fn test_unsubscribe_ends_stream() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.job_info_subscribe(),
        controller.accept(mid::JOB_INFO_SUBSCRIBE)
    );
    let results = results.unwrap();

    let (result, ()) = tokio::join!(
        client.job_info_unsubscribe(),
        controller.accept(mid::JOB_INFO_UNSUBSCRIBE)
    );
    result.unwrap();
    assert!(results.recv().await.is_none());

    let (again, ()) = tokio::join!(
        client.job_info_subscribe(),
        controller.accept(mid::JOB_INFO_SUBSCRIBE)
    );
    again.unwrap();
}

#[tokio::test]
async fn test_rejected_unsubscribe_keeps_stream() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.vehicle_id_subscribe(),
        controller.accept(mid::VIN_SUBSCRIBE)
    );
    let results = results.unwrap();

    let (result, ()) = tokio::join!(
        client.vehicle_id_unsubscribe(),
        controller.reject(mid::VIN_UNSUBSCRIBE, 72)
    );
    assert_eq!(
        result.unwrap_err().negative_ack().unwrap().error_code,
        ErrorCode::SubscriptionDoesNotExists
    );

    controller.send(mid::VIN, "still here").await;
    assert_eq!(results.recv().await.unwrap().data(), b"still here");
}

#[tokio::test]
async fn test_powermacs_station_and_bolt_share_stream() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.powermacs_result_subscribe(),
        controller.accept(mid::POWERMACS_SUBSCRIBE)
    );
    let results = results.unwrap();

    controller.send(mid::POWERMACS_STATION, "station").await;
    controller.send(mid::POWERMACS_BOLT, "bolt").await;
    assert_eq!(results.recv().await.unwrap().mid(), mid::POWERMACS_STATION);
    assert_eq!(results.recv().await.unwrap().mid(), mid::POWERMACS_BOLT);

    client.powermacs_result_acknowledge(true).await.unwrap();
    assert_eq!(controller.expect(mid::POWERMACS_ACK).await.data(), b"1");

    client.acknowledge(Topic::PowerMacsResult).await.unwrap();
    assert_eq!(controller.expect(mid::POWERMACS_ACK).await.data(), b"0");
}

#[tokio::test]
async fn test_commands_are_serialized() {
    let (client, mut controller) = session(SessionConfig::default());

    let script = async {
        controller.expect(mid::KEEP_ALIVE).await;
        let early = tokio::time::timeout(Duration::from_millis(100), controller.conn.recv()).await;
        assert!(early.is_err(), "second command written before the first was answered");
        controller.send(mid::KEEP_ALIVE, "").await;
        controller.echo_keep_alive().await;
    };
    let (first, second, ()) = tokio::join!(client.keep_alive(), client.keep_alive(), script);
    first.unwrap();
    second.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_timeout_releases_slot() {
    let config = SessionConfig {
        command_timeout_ms: 1_000,
        ..SessionConfig::default()
    };
    let (client, mut controller) = session(config);

    let (result, _) = tokio::join!(client.keep_alive(), controller.expect(mid::KEEP_ALIVE));
    assert!(matches!(result, Err(ClientError::Timeout(d)) if d == Duration::from_secs(1)));

    // A late answer must not be taken as the next command's response.
    controller.send(mid::KEEP_ALIVE, "").await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let script = async {
        controller.expect(mid::COMMUNICATION_START).await;
        controller.send(mid::COMMUNICATION_START_ACK, "").await;
    };
    let (started, ()) = tokio::join!(client.start_communication(), script);
    started.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_late_answers_after_two_timeouts_are_skipped() {
    let config = SessionConfig {
        command_timeout_ms: 1_000,
        ..SessionConfig::default()
    };
    let (client, mut controller) = session(config);

    for _ in 0..2 {
        let (result, _) = tokio::join!(client.keep_alive(), controller.expect(mid::KEEP_ALIVE));
        assert!(matches!(result, Err(ClientError::Timeout(_))));
    }

    controller.send(mid::KEEP_ALIVE, "").await;
    controller.send(mid::KEEP_ALIVE, "").await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let script = async {
        controller.expect(mid::COMMUNICATION_START).await;
        controller.send(mid::COMMUNICATION_START_ACK, "").await;
    };
    let (started, ()) = tokio::join!(client.start_communication(), script);
    started.unwrap();

    let (alive, ()) = tokio::join!(client.keep_alive(), controller.echo_keep_alive());
    alive.unwrap();
}

#[tokio::test]
async fn test_short_telegram_closes_session() {
    let (client, mut controller) = session(SessionConfig::default());

    let (results, ()) = tokio::join!(
        client.subscribe(Topic::LastTighteningResult),
        controller.accept(mid::LAST_TIGHTENING_SUBSCRIBE)
    );
    let results = results.unwrap();

    controller.conn.send(Bytes::from_static(b"0015")).await.unwrap();
    client.closed().await;
    assert!(results.recv().await.is_none());
    assert!(matches!(client.keep_alive().await, Err(ClientError::Closed)));
}

#[tokio::test]
async fn test_short_telegram_skipped_when_lenient() {
    let config = SessionConfig {
        strict_framing: false,
        ..SessionConfig::default()
    };
    let (client, mut controller) = session(config);

    controller.conn.send(Bytes::from_static(b"0015")).await.unwrap();
    let (alive, ()) = tokio::join!(client.keep_alive(), controller.echo_keep_alive());
    alive.unwrap();
    assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_connect_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let controller = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut conn = StreamConnection::new(socket);
        let start = conn.recv().await.unwrap().unwrap();
        assert_eq!(&start[..], b"00200001001000000000");
        conn.send(telegram(mid::COMMUNICATION_START_ACK, "")).await.unwrap();
        conn.recv().await.unwrap()
    });

    let client = Client::connect_tcp("127.0.0.1", port, &SessionConfig::default())
        .await
        .unwrap();
    client.start_communication().await.unwrap();
    client.close().await;

    assert!(controller.await.unwrap().is_none());
}
