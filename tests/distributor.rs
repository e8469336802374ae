//! End-to-end behavior of the front end with in-process workers.

use proxy_cluster::pool::supervisor;
use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn matching_rule_is_proxied() {
    let backend = common::start_mock_backend("pong").await;
    let config = common::config(2, &[("/api", "svc1")], &[("svc1", backend.to_string())]);
    let proxy = common::start_proxy(&config, supervisor::start(&config).unwrap()).await;

    let response = reqwest::get(proxy.url("/api/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn unmatched_path_is_404() {
    let backend = common::start_mock_backend("pong").await;
    let config = common::config(1, &[("/api", "svc1")], &[("svc1", backend.to_string())]);
    let proxy = common::start_proxy(&config, supervisor::start(&config).unwrap()).await;

    let response = reqwest::get(proxy.url("/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.text().await.unwrap().contains("Rule not found"));
}

#[tokio::test]
async fn undefined_upstream_is_500() {
    let config = common::config(1, &[("/x", "missing")], &[]);
    let proxy = common::start_proxy(&config, supervisor::start(&config).unwrap()).await;

    let response = reqwest::get(proxy.url("/x")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().await.unwrap().contains("Upstream not found"));
}

#[tokio::test]
async fn unreachable_upstream_is_500() {
    let dead = common::unreachable_addr().await;
    let config = common::config(1, &[("/", "down")], &[("down", dead.to_string())]);
    let proxy = common::start_proxy(&config, supervisor::start(&config).unwrap()).await;

    let response = reqwest::get(proxy.url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().await.unwrap().contains("Proxy request failed"));
}

#[tokio::test]
async fn root_rule_only_matches_root() {
    let backend = common::start_mock_backend("home").await;
    let config = common::config(1, &[("/", "site")], &[("site", backend.to_string())]);
    let proxy = common::start_proxy(&config, supervisor::start(&config).unwrap()).await;

    let root = reqwest::get(proxy.url("/")).await.unwrap();
    assert_eq!(root.status(), StatusCode::OK);
    assert_eq!(root.text().await.unwrap(), "home");

    let deeper = reqwest::get(proxy.url("/about")).await.unwrap();
    assert_eq!(deeper.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn method_headers_body_and_status_pass_through() {
    let backend = common::start_echo_backend().await;
    let upstreams = [("echo", format!("http://{}", backend))];
    let config = common::config(1, &[("/echo", "echo")], &upstreams);
    let proxy = common::start_proxy(&config, supervisor::start(&config).unwrap()).await;

    let response = reqwest::Client::new()
        .patch(proxy.url("/echo/items?id=7"))
        .header("x-test", "abc")
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-echo-method"], "PATCH");
    assert_eq!(response.headers()["x-echo-header"], "abc");
    assert_eq!(response.text().await.unwrap(), "/echo/items?id=7|hello");
}

#[tokio::test]
async fn binary_bodies_pass_through_unchanged() {
    let backend = common::start_raw_echo_backend().await;
    let config = common::config(1, &[("/raw", "raw")], &[("raw", backend.to_string())]);
    let proxy = common::start_proxy(&config, supervisor::start(&config).unwrap()).await;

    let payload: Vec<u8> = vec![0x1f, 0x8b, 0x08, 0x00, 0xff, 0xfe, 0x80, 0x41];
    let response = reqwest::Client::new()
        .post(proxy.url("/raw"))
        .body(payload.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-encoding"], "gzip");
    assert_eq!(response.bytes().await.unwrap().to_vec(), payload);
}

#[tokio::test]
async fn concurrent_requests_on_one_worker_get_their_own_replies() {
    let backend = common::start_delay_backend().await;
    let config = common::config(1, &[("/delay", "slow")], &[("slow", backend.to_string())]);
    let proxy = common::start_proxy(&config, supervisor::start(&config).unwrap()).await;

    let client = reqwest::Client::new();
    // The slower request is sent first, so its reply comes back second.
    let delays = [300u64, 10, 150, 50, 200, 0];
    let requests = delays.iter().map(|ms| {
        let client = client.clone();
        let url = proxy.url(&format!("/delay/{}", ms));
        async move {
            let response = client.get(url).send().await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            response.text().await.unwrap()
        }
    });

    let bodies: Vec<String> = spawn_all(requests).await;
    for (ms, body) in delays.iter().zip(bodies) {
        assert_eq!(body, ms.to_string());
    }
}

/// Spawn every future and collect the outputs in order.
async fn spawn_all<F>(futures: impl IntoIterator<Item = F>) -> Vec<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handles: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
    let mut outputs = Vec::with_capacity(handles.len());
    for handle in handles {
        outputs.push(handle.await.unwrap());
    }
    outputs
}

#[tokio::test]
async fn dead_pool_answers_500() {
    let config = common::config(1, &[], &[]);
    let pool = proxy_cluster::WorkerPool::new(
        Vec::new(),
        proxy_cluster::pool::selector::from_strategy(config.server.balance),
    );
    let proxy = common::start_proxy(&config, pool).await;

    let response = reqwest::get(proxy.url("/anything")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "No workers available");
}
