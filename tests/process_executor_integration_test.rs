// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! End-to-end tests that drive real subprocesses through the router.
//! Shell one-liners stand in for the crawler; `$1` is the generated config path.

#![cfg(unix)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use crawl_orchestrator::app::{create_router, AppState};
use crawl_orchestrator::models::settings::{
    CrawlerCommand, ExecutorSettings, DEFAULT_MAX_CAPTURE_BYTES,
};
use crawl_orchestrator::services::credentials::Secrets;
use crawl_orchestrator::services::executor::ProcessExecutor;
use crawl_orchestrator::services::translator::TranslatorLimits;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

const API_KEY: &str = "process-test-key-0123456789";
const DATASTORE_API_KEY: &str = "c3VwZXItc2VjcmV0LWRhdGFzdG9yZS1rZXk=";
const DATASTORE_HOST: &str = "https://datastore.internal.test:9243";

fn shell_router(script: &str, kill_grace: Duration) -> Router {
    shell_router_with_program("sh", script, kill_grace)
}

fn shell_router_with_program(program: &str, script: &str, kill_grace: Duration) -> Router {
    let settings = ExecutorSettings {
        command: CrawlerCommand {
            program: program.to_string(),
            args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            working_dir: None,
        },
        kill_grace,
        max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
    };
    let secrets = Secrets {
        datastore_host: DATASTORE_HOST.to_string(),
        datastore_api_key: DATASTORE_API_KEY.to_string(),
        expected_api_key: API_KEY.to_string(),
    };
    let state = AppState::new(
        secrets,
        Arc::new(ProcessExecutor::new(settings)),
        TranslatorLimits { ceiling_secs: 600 },
    );
    create_router(state)
}

async fn post_crawl(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/crawl")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn request_for(index: &str) -> Value {
    json!({
        "domains": [{"url": "https://example.com"}],
        "output_index": index
    })
}

#[tokio::test]
async fn test_stub_crawler_summary_is_reported() {
    let app = shell_router(
        "echo 'pages_visited=5, documents_indexed=5, duration_seconds=2.1'",
        Duration::from_secs(1),
    );
    let (status, body) = post_crawl(app, request_for("test-1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "success",
            "return_code": 0,
            "output_index": "test-1",
            "domains_crawled": ["https://example.com"],
            "stats": {
                "pages_visited": "5",
                "documents_indexed": "5",
                "duration_seconds": "2.1"
            }
        })
    );
}

#[tokio::test]
async fn test_crawler_reads_generated_config() {
    let script = r#"
        grep -q '^output_sink: elasticsearch' "$1" || exit 11
        grep -q '^output_index: cfg-idx' "$1" || exit 12
        grep -q 'max_duration_seconds: 30' "$1" || exit 13
        grep -q 'api_key:' "$1" || exit 14
        echo 'Pages visited: 1'
    "#;
    let app = shell_router(script, Duration::from_secs(1));
    let body = json!({
        "domains": [{"url": "https://example.com", "seed_urls": ["https://example.com/start"]}],
        "output_index": "cfg-idx",
        "max_duration_seconds": 30
    });
    let (status, body) = post_crawl(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success", "unexpected body: {}", body);
    assert_eq!(body["stats"]["pages_visited"], "1");
}

#[tokio::test]
async fn test_nonzero_exit_is_error() {
    let app = shell_router("echo 'crawler blew up' >&2; exit 3", Duration::from_secs(1));
    let (status, body) = post_crawl(app, request_for("exit-idx")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["return_code"], 3);
    assert_eq!(body["output_index"], "exit-idx");
    assert_eq!(body["error_category"], "crawler_failure");
}

#[tokio::test]
async fn test_overrunning_crawl_is_terminated() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());
    let app = shell_router(&script, Duration::from_secs(1));

    let started = Instant::now();
    let mut body = request_for("slow-idx");
    body["max_duration_seconds"] = json!(1);
    let (status, body) = post_crawl(app, body).await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "timeout");
    assert_eq!(body["output_index"], "slow-idx");
    assert_eq!(body["error_category"], "timeout");
    assert!(
        elapsed <= Duration::from_secs(3),
        "took {:?} to give up",
        elapsed
    );

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert_process_gone(pid.trim());
}

#[tokio::test]
async fn test_crawl_ignoring_sigterm_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!(
        "trap '' TERM; echo $$ > '{}'; while true; do sleep 1; done",
        pid_file.display()
    );
    let app = shell_router(&script, Duration::from_secs(1));

    let started = Instant::now();
    let mut body = request_for("stubborn-idx");
    body["max_duration_seconds"] = json!(1);
    let (status, body) = post_crawl(app, body).await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "timeout");
    assert!(
        elapsed <= Duration::from_secs(3),
        "took {:?} to give up",
        elapsed
    );

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert_process_gone(pid.trim());
}

/// Wait briefly for `pid` to exit. Killed orphans may linger as zombies until
/// init reaps them, so a zombie counts as gone.
#[cfg(target_os = "linux")]
fn assert_process_gone(pid: &str) {
    let alive = || {
        std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .ok()
            .and_then(|stat| {
                let state = stat.rsplit_once(')')?.1.split_whitespace().next()?.to_string();
                Some(state != "Z" && state != "X")
            })
            .unwrap_or(false)
    };

    let started = Instant::now();
    while alive() && started.elapsed() < Duration::from_secs(2) {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(!alive(), "crawler process {} still exists", pid);
}

#[cfg(not(target_os = "linux"))]
fn assert_process_gone(_pid: &str) {}

#[tokio::test]
async fn test_abandoned_crawl_kills_whole_process_group() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!(
        "sleep 30 & echo $! > '{}'; wait",
        pid_file.display()
    );
    let app = shell_router(&script, Duration::from_secs(1));

    let mut body = request_for("abandoned-idx");
    body["max_duration_seconds"] = json!(60);
    // The caller gives up long before the crawl budget runs out
    let outcome = tokio::time::timeout(Duration::from_secs(1), post_crawl(app, body)).await;
    assert!(outcome.is_err(), "crawl should still have been running");

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert_process_gone(pid.trim());
}

#[tokio::test]
async fn test_config_dump_does_not_leak_credentials() {
    // Worst case: the crawler echoes its whole config, credentials included
    let app = shell_router("cat \"$1\" >&2; cat \"$1\"; exit 1", Duration::from_secs(1));
    let (status, body) = post_crawl(app, request_for("dump-idx")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");

    let text = body.to_string();
    assert!(!text.contains(DATASTORE_API_KEY), "leaked key: {}", text);
    assert!(!text.contains(DATASTORE_HOST), "leaked host: {}", text);
    assert!(!text.contains("datastore.internal.test"), "leaked host: {}", text);
    assert!(!text.contains(API_KEY), "leaked caller key: {}", text);
}

#[tokio::test]
async fn test_secret_env_vars_not_inherited() {
    std::env::set_var("DATASTORE_API_KEY", DATASTORE_API_KEY);
    let app = shell_router(
        "[ -z \"$DATASTORE_API_KEY\" ] || exit 7; [ -z \"$EXPECTED_API_KEY\" ] || exit 8",
        Duration::from_secs(1),
    );
    let (status, body) = post_crawl(app, request_for("env-idx")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["return_code"], 0, "unexpected body: {}", body);
}

#[tokio::test]
async fn test_concurrent_crawls_stay_isolated() {
    let script = r#"
        idx=$(sed -n 's/^output_index: //p' "$1")
        sleep 0.2
        echo "Pages visited: ${idx#concurrent-}"
    "#;
    let app = shell_router(script, Duration::from_secs(1));

    let crawls = (1..=6).map(|n| {
        let app = app.clone();
        async move {
            let (status, body) = post_crawl(app, request_for(&format!("concurrent-{}", n))).await;
            (n, status, body)
        }
    });

    for (n, status, body) in futures::future::join_all(crawls).await {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["output_index"], format!("concurrent-{}", n));
        assert_eq!(body["stats"]["pages_visited"], n.to_string());
    }
}

#[tokio::test]
async fn test_missing_crawler_executable_is_500() {
    let app = shell_router_with_program(
        "/nonexistent/bin/crawler",
        "true",
        Duration::from_secs(1),
    );
    let (status, body) = post_crawl(app, request_for("missing-idx")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(!body.to_string().contains("/nonexistent"));
}
