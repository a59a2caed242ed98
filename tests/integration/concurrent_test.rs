//! Concurrency tests: many requests multiplexed over the one control
//! connection, with responses completing in scrambled order.

use super::{http_client, start_client, start_scripted_service, start_server, TestConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn concurrent_requests_all_succeed() {
    let config = TestConfig::default();
    let _service = start_scripted_service(config.local_service_addr).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    let success_count = Arc::new(AtomicUsize::new(0));
    let http = http_client();
    let mut handles = vec![];

    for i in 0..50 {
        let http = http.clone();
        let http_addr = config.http_addr;
        let counter = success_count.clone();

        handles.push(tokio::spawn(async move {
            let url = format!("http://{http_addr}/req?i={i}");
            match http.get(&url).send().await {
                Ok(resp) if resp.status() == 200 => {
                    if let Ok(text) = resp.text().await {
                        if text == format!("/req?i={i}") {
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                _ => {}
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    assert_eq!(
        success_count.load(Ordering::Relaxed),
        50,
        "All 50 requests should succeed"
    );

    client.shutdown().await.unwrap();
}

/// Later requests finish first (earlier ones stall longer in the local
/// service), so responses traverse the tunnel out of dispatch order. Each
/// caller must still receive exactly its own response.
#[tokio::test]
async fn scrambled_completion_order_routes_by_correlation_id() {
    let config = TestConfig::default();
    let _service = start_scripted_service(config.local_service_addr).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    let http = http_client();
    let mut handles = vec![];

    for i in 0..24u64 {
        let delay_ms = (24 - i) * 15;
        let path = format!("/delay/{delay_ms}?i={i}");
        let url = format!("http://{}{path}", config.http_addr);
        let http = http.clone();

        handles.push(tokio::spawn(async move {
            let response = http.get(&url).send().await.unwrap();
            assert_eq!(response.status(), 200);
            // The scripted service echoes the path, so a cross-routed
            // response would carry another request's marker.
            assert_eq!(response.text().await.unwrap(), path);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    client.shutdown().await.unwrap();
}

/// A request stuck in a slow local handler must not stall intake of the
/// requests queued behind it on the control connection.
#[tokio::test]
async fn slow_request_does_not_block_fast_ones() {
    let config = TestConfig::default();
    let _service = start_scripted_service(config.local_service_addr).await;
    let _server = start_server(&config, Duration::from_secs(30)).await;
    let mut client = start_client(&config).await;

    let http = http_client();

    let slow_url = format!("http://{}/delay/2000", config.http_addr);
    let slow_http = http.clone();
    let slow = tokio::spawn(async move { slow_http.get(&slow_url).send().await.unwrap() });

    // Give the slow request a head start on the wire.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = std::time::Instant::now();
    let fast = http
        .get(format!("http://{}/fast", config.http_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(fast.status(), 200);
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "fast request was stuck behind the slow one"
    );

    let slow = slow.await.unwrap();
    assert_eq!(slow.status(), 200);

    client.shutdown().await.unwrap();
}
