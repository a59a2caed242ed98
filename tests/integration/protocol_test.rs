//! Protocol-level tests driving a hand-rolled tunnel client over the raw
//! control connection, to exercise correlation handling precisely.

use super::{http_client, start_server, FakeTunnelCodec, TestConfig};
use backhaul_protocol::{Headers, ResponseFrame};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_util::codec::Framed;

async fn attach_fake_client(config: &TestConfig) -> Framed<TcpStream, FakeTunnelCodec> {
    let mut attempts = 0;
    let stream = loop {
        match TcpStream::connect(config.server_addr).await {
            Ok(stream) => break stream,
            Err(_) if attempts < 50 => {
                attempts += 1;
                sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("control listener never came up: {e}"),
        }
    };
    // Give the server's accept loop a moment to claim the slot.
    sleep(Duration::from_millis(200)).await;
    Framed::new(stream, FakeTunnelCodec::default())
}

fn reply(id: &str, status: u16, body: &str) -> ResponseFrame {
    ResponseFrame {
        id: id.to_string(),
        status,
        headers: Headers::new(),
        body: Bytes::from(body.to_string()),
    }
}

#[tokio::test]
async fn unknown_response_id_is_dropped_not_fatal() {
    let config = TestConfig::default();
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut control = attach_fake_client(&config).await;

    // A response nobody asked for must be ignored without disturbing the
    // connection or later requests.
    control.send(reply("ghost", 200, "boo")).await.unwrap();

    let http = http_client();
    let http_addr = config.http_addr;
    let request_task =
        tokio::spawn(async move { http.get(format!("http://{http_addr}/ping")).send().await });

    let frame = control.next().await.unwrap().unwrap();
    assert_eq!(frame.method, "GET");
    assert_eq!(frame.path, "/ping");

    control.send(reply(&frame.id, 200, "pong")).await.unwrap();

    let response = request_task.await.unwrap().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn responses_resolve_by_id_not_arrival_order() {
    let config = TestConfig::default();
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut control = attach_fake_client(&config).await;

    let http = http_client();
    let http_addr = config.http_addr;

    let first = {
        let http = http.clone();
        tokio::spawn(async move { http.get(format!("http://{http_addr}/a")).send().await })
    };
    let second =
        tokio::spawn(async move { http.get(format!("http://{http_addr}/b")).send().await });

    let frame_one = control.next().await.unwrap().unwrap();
    let frame_two = control.next().await.unwrap().unwrap();

    // Answer in reverse arrival order; each body names the path it
    // belongs to.
    control
        .send(reply(&frame_two.id, 200, &frame_two.path))
        .await
        .unwrap();
    control
        .send(reply(&frame_one.id, 200, &frame_one.path))
        .await
        .unwrap();

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.text().await.unwrap(), "/a");
    let second = second.await.unwrap().unwrap();
    assert_eq!(second.text().await.unwrap(), "/b");
}

#[tokio::test]
async fn request_frames_carry_fresh_ids() {
    let config = TestConfig::default();
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut control = attach_fake_client(&config).await;

    let http = http_client();
    let http_addr = config.http_addr;
    let mut tasks = vec![];
    for i in 0..8 {
        let http = http.clone();
        tasks.push(tokio::spawn(async move {
            http.get(format!("http://{http_addr}/n/{i}")).send().await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for _ in 0..8 {
        let frame = control.next().await.unwrap().unwrap();
        assert!(ids.insert(frame.id.clone()), "correlation id reused");
        control.send(reply(&frame.id, 200, "done")).await.unwrap();
    }

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().status(), 200);
    }
}
