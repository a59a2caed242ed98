//! End-to-end tunnel tests: a public request travels server → client →
//! local service and the response comes back unchanged.

use super::{http_client, start_canned_service, start_client, start_server, TestConfig};
use std::time::Duration;

const JSON_RESPONSE: &[u8] = b"HTTP/1.1 201 Created\r\n\
    Content-Type: application/json\r\n\
    Content-Length: 11\r\n\
    \r\n\
    {\"ok\":true}";

const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
    Content-Length: 2\r\n\
    \r\n\
    ok";

#[tokio::test]
async fn relays_a_request_end_to_end() {
    let config = TestConfig::default();
    let (_service, captured) = start_canned_service(config.local_service_addr, JSON_RESPONSE).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    let response = http_client()
        .get(format!("http://{}/users?x=1", config.http_addr))
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(response.text().await.unwrap(), "{\"ok\":true}");

    // The local service must have seen method, path with query string, and
    // the passed-through header.
    let seen = String::from_utf8_lossy(&captured.lock().await).into_owned();
    assert!(
        seen.starts_with("GET /users?x=1 HTTP/1.1\r\n"),
        "unexpected request line in: {seen}"
    );
    assert!(seen.to_ascii_lowercase().contains("accept: application/json"));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn relays_a_request_body() {
    let config = TestConfig::default();
    let (_service, captured) = start_canned_service(config.local_service_addr, OK_RESPONSE).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    let response = http_client()
        .post(format!("http://{}/items", config.http_addr))
        .body("hello tunnel")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");

    let seen = String::from_utf8_lossy(&captured.lock().await).into_owned();
    assert!(seen.starts_with("POST /items HTTP/1.1\r\n"));
    assert!(seen.ends_with("hello tunnel"), "body missing in: {seen}");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn sequential_requests_reuse_the_tunnel() {
    let config = TestConfig::default();
    let _service = super::start_scripted_service(config.local_service_addr).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    let http = http_client();
    for i in 0..5 {
        let response = http
            .get(format!("http://{}/seq?i={i}", config.http_addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), format!("/seq?i={i}"));
    }

    client.shutdown().await.unwrap();
}
