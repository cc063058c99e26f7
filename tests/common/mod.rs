//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds a temporary video root, a config pointing at it and a
//! full [`AppContext`]. Requests go through the real router via `oneshot`.
//! [`LiveServer`] runs the server on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use seekgate::config::Config;
use seekgate::server::{self, create_router, AppContext};
use seekgate::streaming::StreamEngine;

pub const CLIP: &str = "clip.mp4";
pub const CLIP_SIZE: u64 = 100_000;
pub const EMPTY: &str = "empty.mp4";
/// File placed beside the video root, never servable.
pub const OUTSIDE: &str = "outside.txt";
pub const API_KEY: &str = "test-api-key";
pub const SECRET: &str = "test-signing-secret";
/// Bitrate every test resource is assumed to play at (bytes per second).
pub const BITRATE: u64 = 1_000;

/// Deterministic clip contents, so served slices can be checked byte for byte.
pub fn clip_bytes() -> Vec<u8> {
    (0..CLIP_SIZE).map(|i| (i % 251) as u8).collect()
}

/// Config serving `root` with known keys and a fixed bitrate.
pub fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.video_root = root.to_path_buf();
    config.throttle.fallback_bytes_per_second = BITRATE as f64;
    config.auth.api_keys = vec![API_KEY.to_string()];
    config.auth.signing_secret = Some(SECRET.to_string());
    config
}

/// Lay out `<dir>/videos/{clip,empty}` plus a file next to (not under) the
/// video root. Returns the video root.
fn populate(dir: &TempDir) -> PathBuf {
    let root = dir.path().join("videos");
    std::fs::create_dir(&root).expect("failed to create video root");
    std::fs::write(root.join(CLIP), clip_bytes()).expect("failed to write clip");
    std::fs::write(root.join(EMPTY), b"").expect("failed to write empty file");
    std::fs::write(dir.path().join(OUTSIDE), b"not a video").expect("failed to write outside file");
    root
}

pub struct TestHarness {
    pub dir: TempDir,
    pub ctx: AppContext,
    pub shutdown: CancellationToken,
}

impl TestHarness {
    /// Harness with the default test configuration.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Harness whose configuration is adjusted by `adjust` before the engine
    /// is built.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = populate(&dir);

        let mut config = test_config(&root);
        adjust(&mut config);

        let shutdown = CancellationToken::new();
        let engine = Arc::new(StreamEngine::from_config(&config, shutdown.clone()));
        let ctx = AppContext {
            config: Arc::new(config),
            engine,
        };

        Self { dir, ctx, shutdown }
    }

    /// Router with a fixed peer address standing in for the TCP connection.
    pub fn router(&self) -> Router {
        create_router(self.ctx.clone(), None)
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
    }

    /// Issue a GET for `uri` with the given extra headers.
    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// GET `/video/{name}` authenticated with the API key.
    pub async fn get_video(&self, name: &str, range: Option<&str>) -> Response<Body> {
        let auth = format!("Bearer {API_KEY}");
        let mut headers = vec![("authorization", auth.as_str())];
        if let Some(range) = range {
            headers.push(("range", range));
        }
        self.get(&format!("/video/{name}"), &headers).await
    }

    /// Session offset recorded for the API-key client.
    pub fn api_key_offset(&self) -> u64 {
        let client = seekgate_common::ClientId::from_credential(API_KEY);
        self.ctx.engine.sessions().last_offset(&client)
    }
}

/// Collect a response body.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Parse a JSON error body.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// The server running on a random local port.
pub struct LiveServer {
    pub dir: TempDir,
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl LiveServer {
    pub async fn start(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = populate(&dir);

        let mut config = test_config(&root);
        adjust(&mut config);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server::serve(listener, config, async move {
            stopped.await.ok();
        }));

        Self {
            dir,
            addr,
            stop: Some(stop),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger graceful shutdown without waiting for it.
    pub fn signal_shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
    }

    /// Trigger graceful shutdown and wait for the server to exit.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.signal_shutdown();
        self.handle.await.expect("server task panicked")
    }
}
