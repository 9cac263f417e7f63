//! Common test utilities for in-process API testing.
//!
//! The fixture builds the real router on top of a temp output directory and a
//! fake engine script, so streams can be started without ffmpeg.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use hlsproxy_core::{Config, OriginConfig, ProcessPool, TranscodeOrchestrator, TranscoderConfig};
use hlsproxy_server::{create_router, AppState};

/// Engine stand-in: writes one segment next to every variant playlist it is
/// asked to produce, then idles like a live transcode.
pub const FAKE_ENGINE: &str = r#"
for arg in "$@"; do
  case "$arg" in
    *.m3u8)
      dir=$(dirname "$arg")
      mkdir -p "$dir"
      : > "$dir/000.ts"
      printf '#EXTM3U\n' > "$arg"
      ;;
  esac
done
exec sleep 30
"#;

/// Test fixture with an in-process router.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Pool shared with the orchestrator
    pub pool: ProcessPool,
    pub orchestrator: Arc<TranscodeOrchestrator>,
    /// Temporary directory holding the engine script and output
    pub temp_dir: TempDir,
    pub output_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Value,
    pub text: String,
}

/// Knobs for the fixture.
#[derive(Debug, Default)]
pub struct TestConfig {
    pub origin: Option<String>,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_dir = temp_dir.path().join("output");
        let engine = temp_dir.path().join("engine.sh");
        std::fs::write(&engine, FAKE_ENGINE).expect("Failed to write engine script");

        let config = Config {
            transcoder: TranscoderConfig {
                ffmpeg_bin: format!("sh {}", engine.display()),
                output_dir: output_dir.clone(),
                readiness_poll_interval_ms: 20,
                readiness_timeout_secs: 10,
                ..Default::default()
            },
            origin: test_config.origin.map(|url| OriginConfig { url }),
            ..Default::default()
        };

        let pool = ProcessPool::new();
        let orchestrator = Arc::new(TranscodeOrchestrator::new(
            config.transcoder.clone(),
            pool.clone(),
        ));
        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));

        Self {
            router: create_router(state),
            pool,
            orchestrator,
            temp_dir,
            output_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Request::delete(path).body(Body::empty()).unwrap())
            .await
    }

    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        TestResponse {
            status,
            content_type,
            body,
            text,
        }
    }

    /// Terminates every engine and waits for the pool to drain.
    pub async fn drain(&self) {
        self.pool.terminate_all();
        tokio::time::timeout(Duration::from_secs(15), self.pool.wait())
            .await
            .expect("pool did not drain");
    }
}
