//! Workers running as real child processes of the front end.

use std::time::Duration;

use proxy_cluster::config::Isolation;
use proxy_cluster::pool::supervisor::{self, WorkerCommand};
use reqwest::StatusCode;

mod common;

fn worker_command() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_proxy-cluster")).arg("worker")
}

#[tokio::test]
async fn process_workers_proxy_requests() {
    let backend = common::start_mock_backend("pong").await;
    let mut config = common::config(2, &[("/api", "svc1")], &[("svc1", backend.to_string())]);
    config.server.isolation = Isolation::Process;

    let pool = supervisor::start_with(&config, &worker_command()).unwrap();
    assert_eq!(pool.size(), 2);
    assert!(pool.workers().iter().all(|w| w.pid().is_some()));
    let proxy = common::start_proxy(&config, pool).await;

    let client = reqwest::Client::new();
    for _ in 0..6 {
        let response = client.get(proxy.url("/api/ping")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "pong");
    }

    let missing = client.get(proxy.url("/unknown")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn crashed_worker_leaves_the_pool() {
    // `true` ignores its input and exits at once, like a worker that crashed
    // during startup.
    let mut config = common::config(1, &[], &[]);
    config.server.isolation = Isolation::Process;

    let pool = supervisor::start_with(&config, &WorkerCommand::new("true")).unwrap();

    let mut waited = Duration::ZERO;
    while pool.size() > 0 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }
    assert_eq!(pool.size(), 0);
    assert_eq!(pool.capacity(), 1);

    let proxy = common::start_proxy(&config, pool).await;
    let response = reqwest::get(proxy.url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "No workers available");
}
