//! # opmon
//!
//! Monitors a tightening controller and prints every subscribed result as a
//! JSON line.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! opmon
//!
//! # Point at a controller
//! OP_HOST=10.0.0.7 OP_PORT=4545 opmon
//!
//! # More logging
//! RUST_LOG=opmon=debug,op_client=trace opmon
//! ```

use anyhow::{Context, Result};
use futures_util::stream::{self, BoxStream, StreamExt};
use op_client::config::Config;
use op_client::{metrics, Client, ClientError, SessionState, Telegram, Topic};
use op_protocol::{decode_push, mid};
use op_transport::TcpDialer;
use tokio::time::Interval;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opmon=info,op_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    info!("Connecting to controller at {}:{}", config.host, config.port);
    let dialer = TcpDialer::new(config.dialer_config());
    let client = Client::connect(&dialer, &config.session)
        .await
        .with_context(|| format!("Failed to connect to {}", dialer.target()))?;
    client
        .start_communication()
        .await
        .context("Controller refused communication start")?;

    let mut subscriptions: Vec<BoxStream<'static, (Topic, Telegram)>> = Vec::new();
    for topic in &config.subscriptions {
        let topic = *topic;
        let reader = client
            .subscribe(topic)
            .await
            .with_context(|| format!("Failed to subscribe to {topic}"))?;
        subscriptions.push(reader.into_stream().map(move |push| (topic, push)).boxed());
    }
    let mut pushes = stream::select_all(subscriptions);

    let mut keep_alive = if config.keep_alive.enabled {
        let mut interval = tokio::time::interval(config.keep_alive.interval());
        interval.tick().await;
        Some(interval)
    } else {
        None
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            () = client.closed() => {
                warn!("Controller session ended");
                break;
            }
            Some((topic, push)) = pushes.next() => {
                print_push(topic, &push);
                if let Err(e) = acknowledge(&client, topic, &push, config.powermacs_bolt_data).await {
                    warn!(topic = %topic, error = %e, "Acknowledge failed");
                }
            }
            () = next_tick(&mut keep_alive) => {
                if let Err(e) = client.keep_alive().await {
                    warn!(error = %e, "Keep-alive failed");
                }
            }
        }
    }

    if client.state() != SessionState::Closed {
        for topic in &config.subscriptions {
            if let Err(e) = client.unsubscribe(*topic).await {
                warn!(topic = %topic, error = %e, "Unsubscribe failed");
            }
        }
        if let Err(e) = client.stop_communication().await {
            warn!(error = %e, "Communication stop failed");
        }
    }
    client.close().await;

    Ok(())
}

/// Wait for the next keep-alive tick; never completes when disabled.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn print_push(topic: Topic, push: &Telegram) {
    let payload = match decode_push(push) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(topic = %topic, mid = push.mid(), error = %e, "Undecodable push");
            return;
        }
    };
    let line = serde_json::json!({ "topic": topic, "payload": payload });
    println!("{line}");
}

async fn acknowledge(
    client: &Client,
    topic: Topic,
    push: &Telegram,
    bolt_data: bool,
) -> Result<(), ClientError> {
    match topic {
        Topic::PowerMacsResult => {
            let with_bolt_data = bolt_data && push.mid() == mid::POWERMACS_STATION;
            client.powermacs_result_acknowledge(with_bolt_data).await
        }
        topic => client.acknowledge(topic).await,
    }
}
