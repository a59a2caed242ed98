//! Failure-path tests: every error surfaces as a bounded, synthetic
//! response — callers never hang and never see raw transport errors.

use super::{http_client, start_client, start_scripted_service, start_server, TestConfig};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[tokio::test]
async fn no_tunnel_client_yields_tunnel_not_ready() {
    let config = TestConfig::default();
    let _server = start_server(&config, Duration::from_secs(30)).await;

    let started = std::time::Instant::now();
    let response = http_client()
        .get(format!("http://{}/anything", config.http_addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    assert_eq!(response.text().await.unwrap(), "tunnel not ready");
    // Fast-fail: no waiter, no frame, no timeout involved.
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn unreachable_local_service_yields_504_with_empty_body() {
    let config = TestConfig::default();
    // No local service bound at all; the client's connect is refused.
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    let response = http_client()
        .get(format!("http://{}/down", config.http_addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 504);
    assert_eq!(response.text().await.unwrap(), "");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn slow_local_service_hits_the_request_deadline() {
    let config = TestConfig::default();
    let _service = start_scripted_service(config.local_service_addr).await;
    let _server = start_server(&config, Duration::from_millis(400)).await;
    let mut client = start_client(&config).await;

    let response = http_client()
        .get(format!("http://{}/delay/5000", config.http_addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 504);
    assert_eq!(response.text().await.unwrap(), "upstream timed out");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn tunnel_loss_mid_request_fails_bounded() {
    let config = TestConfig::default();
    let _service = start_scripted_service(config.local_service_addr).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    let http = http_client();
    let url = format!("http://{}/delay/10000", config.http_addr);
    let pending = tokio::spawn(async move { http.get(&url).send().await.unwrap() });

    // Let the request reach the client, then kill the tunnel under it.
    tokio::time::sleep(Duration::from_millis(400)).await;
    client.shutdown().await.unwrap();

    let started = std::time::Instant::now();
    let response = pending.await.unwrap();
    assert_eq!(response.status(), 502);
    assert_eq!(response.text().await.unwrap(), "tunnel connection lost");
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "waiter was not released on connection loss"
    );
}

#[tokio::test]
async fn second_control_connection_is_rejected() {
    let config = TestConfig::default();
    let _service = start_scripted_service(config.local_service_addr).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    // The slot is taken; a second dialer gets dropped immediately.
    let mut second = TcpStream::connect(config.server_addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_secs(2), second.read(&mut buf))
        .await
        .expect("server kept the second connection open");
    assert!(
        matches!(read, Ok(0) | Err(_)),
        "second connection should be closed, got {read:?}"
    );

    // The original tunnel is unaffected.
    let response = http_client()
        .get(format!("http://{}/still-up", config.http_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn slot_frees_after_the_active_client_disconnects() {
    let config = TestConfig::default();
    let _service = start_scripted_service(config.local_service_addr).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;

    let mut first = start_client(&config).await;
    first.shutdown().await.unwrap();

    // The reject policy only covers a *live* connection; once the reader
    // observes the loss, a new client may attach (start_client retries
    // until the slot is free).
    let mut second = start_client(&config).await;

    let response = http_client()
        .get(format!("http://{}/reattached", config.http_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "/reattached");

    second.shutdown().await.unwrap();
}
