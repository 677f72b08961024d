// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

mod helpers;

use helpers::http_request;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use supervisor_rest::api::{self, ApiListener};
use supervisor_rest::memory::{Call, InMemorySupervisor};
use supervisor_rest::state::ProcessState;
use supervisor_rest::{ApiOptions, ControlApi};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningServer {
    stop: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl RunningServer {
    fn spawn(listener: ApiListener, supervisor: Arc<InMemorySupervisor>) -> Self {
        let control = Arc::new(ControlApi::new(supervisor, ApiOptions::default()));
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(api::serve(listener, control, async move {
            let _ = stopped.await;
        }));
        Self { stop, task }
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server should stop")
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

async fn tcp_server(supervisor: Arc<InMemorySupervisor>) -> (SocketAddr, RunningServer) {
    let listener = ApiListener::bind_tcp("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, RunningServer::spawn(listener, supervisor))
}

async fn tcp(addr: SocketAddr, method: &str, path: &str, body: &str) -> (u16, String) {
    http_request(TcpStream::connect(addr).await.unwrap(), method, path, body).await
}

#[tokio::test]
async fn test_tcp_round_trip() {
    let supervisor =
        Arc::new(InMemorySupervisor::new().with_program("web", ProcessState::Stopped));
    let (addr, server) = tcp_server(supervisor.clone()).await;

    let (status, body) = tcp(addr, "POST", "/program/start/web", "").await;
    assert_eq!(status, 200);
    assert_eq!(body, "{\"success\":true}\n");

    let (status, body) = tcp(addr, "GET", "/program/list", "").await;
    assert_eq!(status, 200);
    assert!(body.contains("\"statename\":\"RUNNING\""), "{body}");

    let (status, body) = tcp(addr, "PUT", "/program/startPrograms", "{\"x\":1}").await;
    assert_eq!(status, 400);
    assert_eq!(body, "not a valid request");

    let (status, _) = tcp(addr, "GET", "/nope", "").await;
    assert_eq!(status, 404);

    let (status, _) = tcp(addr, "GET", "/supervisor/reload", "").await;
    assert_eq!(status, 405);

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_requests() {
    let supervisor = Arc::new(InMemorySupervisor::new());
    let (addr, server) = tcp_server(supervisor.clone()).await;

    let requests: Vec<_> = (0..8)
        .map(|i| {
            let path = format!("/program/stop/p{i}");
            tokio::spawn(async move { tcp(addr, "POST", &path, "").await })
        })
        .collect();
    for request in requests {
        let (status, body) = request.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, "{\"success\":false}\n");
    }
    assert_eq!(supervisor.calls().await.len(), 8);

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_endpoint_answers_before_server_stops() {
    let supervisor = Arc::new(InMemorySupervisor::new());
    let (addr, server) = tcp_server(supervisor.clone()).await;

    let (status, body) = tcp(addr, "PUT", "/supervisor/shutdown", "").await;
    assert_eq!(status, 200);
    assert_eq!(body, "Shutdown...");
    assert_eq!(supervisor.calls().await, vec![Call::Shutdown]);

    server.shutdown().await;
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_unix_socket_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("api.sock");
    let supervisor = Arc::new(InMemorySupervisor::new());
    let server = RunningServer::spawn(ApiListener::bind_unix(&path).unwrap(), supervisor);

    let stream = UnixStream::connect(&path).await.unwrap();
    let (status, body) = http_request(stream, "GET", "/program/list", "").await;
    assert_eq!(status, 200);
    assert_eq!(body, "[]\n");

    server.shutdown().await;
    assert!(!path.exists(), "socket file should be removed on shutdown");
}
