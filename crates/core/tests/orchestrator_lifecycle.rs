//! Orchestrator lifecycle integration tests.
//!
//! These tests run the orchestrator against a fake engine: a shell script that
//! creates one segment next to every `*.m3u8` output it is given and then sleeps
//! like a live transcode would.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use hlsproxy_core::{
    JobRequest, OrchestratorError, ProcessError, ProcessPool, ProcessState, ReadinessError,
    TranscodeOrchestrator, TranscoderConfig,
};

const FAKE_ENGINE: &str = r#"
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

const SILENT_ENGINE: &str = "exec sleep 30\n";

/// Test helper owning a temp directory, a pool and engine scripts.
struct TestHarness {
    pool: ProcessPool,
    _temp_dir: TempDir,
    root: PathBuf,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self {
            pool: ProcessPool::new(),
            _temp_dir: temp_dir,
            root,
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    /// Writes an engine script and returns an `ffmpeg_bin` value running it.
    fn engine(&self, name: &str, body: &str) -> String {
        let path = self.root.join(name);
        std::fs::write(&path, body).expect("Failed to write engine script");
        format!("sh {}", path.display())
    }

    fn orchestrator(&self, ffmpeg_bin: String) -> TranscodeOrchestrator {
        self.orchestrator_with(ffmpeg_bin, |_| {})
    }

    fn orchestrator_with(
        &self,
        ffmpeg_bin: String,
        customize: impl FnOnce(&mut TranscoderConfig),
    ) -> TranscodeOrchestrator {
        let mut config = TranscoderConfig {
            ffmpeg_bin,
            output_dir: self.output_dir(),
            readiness_poll_interval_ms: 20,
            readiness_timeout_secs: 10,
            ..Default::default()
        };
        customize(&mut config);
        TranscodeOrchestrator::new(config, self.pool.clone())
    }

    fn fake_orchestrator(&self) -> TranscodeOrchestrator {
        self.orchestrator(self.engine("engine.sh", FAKE_ENGINE))
    }

    async fn drain(&self) {
        self.pool.terminate_all();
        tokio::time::timeout(Duration::from_secs(15), self.pool.wait())
            .await
            .expect("pool did not drain");
    }
}

fn playlist_uris(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect()
}

fn abc123_request() -> JobRequest {
    JobRequest::new("rtmp://src/live")
        .with_id("abc123")
        .with_variants(["240p", "audio"])
        .with_audio(true)
        .with_codecs("h264", "AAC")
}

#[tokio::test]
async fn test_start_job_end_to_end() {
    let harness = TestHarness::new();
    let orchestrator = harness.fake_orchestrator();

    let started = orchestrator.start(abc123_request()).await.unwrap();

    assert_eq!(started.id, "abc123");
    assert_eq!(started.variants, vec!["240p", "audio"]);
    assert!(started.warnings.is_empty());
    assert_eq!(
        playlist_uris(&started.master_playlist),
        vec![
            "http://localhost:8001/hlsproxy/abc123/240p/240p.m3u8",
            "http://localhost:8001/hlsproxy/abc123/audio/audio.m3u8",
        ]
    );
    assert_eq!(
        started.playlist_url,
        "http://localhost:8001/hlsproxy/abc123/playlist.m3u8"
    );

    let job_dir = harness.output_dir().join("abc123");
    assert!(job_dir.join("240p").is_dir());
    assert!(job_dir.join("audio").is_dir());
    assert!(job_dir.join("240p/000.ts").is_file());

    let on_disk = std::fs::read_to_string(job_dir.join("playlist.m3u8")).unwrap();
    assert_eq!(
        playlist_uris(&on_disk),
        vec!["240p/240p.m3u8", "audio/audio.m3u8"]
    );

    // Exactly one process for the job.
    assert_eq!(harness.pool.len(), 1);
    assert!(harness.pool.contains("abc123"));

    let status = orchestrator.status("abc123").unwrap();
    assert_eq!(status.variants, vec!["240p", "audio"]);
    assert_eq!(status.process.state, ProcessState::Running);
    assert_eq!(orchestrator.list().len(), 1);

    assert_eq!(
        orchestrator.stop("abc123").await.unwrap(),
        ProcessState::Terminated
    );
    harness.drain().await;
    assert!(orchestrator.status("abc123").is_none());
    assert!(orchestrator.list().is_empty());
}

#[tokio::test]
async fn test_master_order_follows_selection() {
    let harness = TestHarness::new();
    let orchestrator = harness.fake_orchestrator();

    let started = orchestrator
        .start(JobRequest::new("rtmp://src/live").with_variants(["audio", "240p"]))
        .await
        .unwrap();

    let uris = playlist_uris(&started.master_playlist);
    assert_eq!(uris.len(), 2);
    assert!(uris[0].ends_with("/audio/audio.m3u8"));
    assert!(uris[1].ends_with("/240p/240p.m3u8"));
    assert!(uuid_like(&started.id));

    harness.drain().await;
}

fn uuid_like(id: &str) -> bool {
    id.len() == 36 && id.chars().filter(|c| *c == '-').count() == 4
}

#[tokio::test]
async fn test_duplicate_job_rejected() {
    let harness = TestHarness::new();
    let orchestrator = harness.fake_orchestrator();

    orchestrator.start(abc123_request()).await.unwrap();
    let second = orchestrator.start(abc123_request()).await;

    assert!(
        matches!(second, Err(OrchestratorError::JobAlreadyRunning(ref id)) if id == "abc123")
    );
    assert_eq!(harness.pool.len(), 1);

    harness.drain().await;
}

#[tokio::test]
async fn test_readiness_timeout_stops_process() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator_with(harness.engine("silent.sh", SILENT_ENGINE), |c| {
        c.readiness_timeout_secs = 1;
    });

    let result = orchestrator
        .start(JobRequest::new("rtmp://src/live").with_id("slow"))
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Readiness(ReadinessError::Timeout { .. }))
    ));

    tokio::time::timeout(Duration::from_secs(15), harness.pool.wait())
        .await
        .unwrap();
    assert!(!harness.pool.contains("slow"));
    assert!(orchestrator.status("slow").is_none());
}

#[tokio::test]
async fn test_leftover_segments_do_not_count_as_ready() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator_with(harness.engine("silent.sh", SILENT_ENGINE), |c| {
        c.readiness_timeout_secs = 1;
    });

    // Media from an earlier run of the same job ID.
    let job_dir = harness.output_dir().join("rerun");
    std::fs::create_dir_all(job_dir.join("240p")).unwrap();
    std::fs::create_dir_all(job_dir.join("1080p")).unwrap();
    std::fs::write(job_dir.join("240p/007.ts"), b"old").unwrap();
    std::fs::write(job_dir.join("240p/240p.m3u8"), "#EXTM3U\n").unwrap();
    std::fs::write(job_dir.join("1080p/003.ts"), b"old").unwrap();

    let result = orchestrator
        .start(JobRequest::new("rtmp://src/live").with_id("rerun"))
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Readiness(ReadinessError::Timeout { .. }))
    ));
    assert!(!job_dir.join("240p/007.ts").exists());
    assert!(!job_dir.join("240p/240p.m3u8").exists());
    assert!(!job_dir.join("1080p/003.ts").exists());
    assert!(job_dir.join("playlist.m3u8").is_file());

    harness.drain().await;
}

#[tokio::test]
async fn test_restart_same_id_replaces_old_segments() {
    let harness = TestHarness::new();
    let orchestrator = harness.fake_orchestrator();

    let job_dir = harness.output_dir().join("abc123");
    std::fs::create_dir_all(job_dir.join("240p")).unwrap();
    std::fs::write(job_dir.join("240p/041.ts"), b"old").unwrap();

    let started = orchestrator.start(abc123_request()).await.unwrap();

    assert!(started.warnings.is_empty());
    assert!(!job_dir.join("240p/041.ts").exists());
    assert!(job_dir.join("240p/000.ts").is_file());

    harness.drain().await;
}

#[tokio::test]
async fn test_stop_during_readiness_wait_cancels_start() {
    let harness = TestHarness::new();
    let orchestrator = Arc::new(harness.orchestrator(harness.engine("silent.sh", SILENT_ENGINE)));

    let starter = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .start(JobRequest::new("rtmp://src/live").with_id("pending"))
                .await
        })
    };

    let start = std::time::Instant::now();
    while !harness.pool.contains("pending") {
        assert!(start.elapsed() < Duration::from_secs(5), "job never registered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(
        orchestrator.stop("pending").await.unwrap(),
        ProcessState::Terminated
    );

    let result = tokio::time::timeout(Duration::from_secs(5), starter)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        Err(OrchestratorError::Readiness(ReadinessError::Cancelled))
    ));
}

#[tokio::test]
async fn test_spawn_failure_is_surfaced() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator("/nonexistent/ffmpeg".to_string());

    let result = orchestrator.start(abc123_request()).await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Process(ProcessError::SpawnFailed { .. }))
    ));
    assert!(harness.pool.is_empty());
}

#[tokio::test]
async fn test_invalid_requests_create_nothing() {
    let harness = TestHarness::new();
    let orchestrator = harness.fake_orchestrator();

    let result = orchestrator
        .start(JobRequest::new("rtmp://src/live").with_id("../escape"))
        .await;
    assert!(matches!(result, Err(OrchestratorError::InvalidJobId { .. })));

    let result = orchestrator
        .start(JobRequest::new("rtmp://src/\"live").with_id("quoted"))
        .await;
    assert!(matches!(result, Err(OrchestratorError::InvalidSource { .. })));

    assert!(harness.pool.is_empty());
    assert!(!harness.output_dir().exists());
}

#[tokio::test]
async fn test_stop_unknown_job() {
    let harness = TestHarness::new();
    let orchestrator = harness.fake_orchestrator();

    let result = orchestrator.stop("nope").await;
    assert!(matches!(result, Err(OrchestratorError::JobNotFound(ref id)) if id == "nope"));
}

#[tokio::test]
async fn test_shutdown_stops_all_and_removes_output() {
    let harness = TestHarness::new();
    let orchestrator = harness.fake_orchestrator();

    orchestrator
        .start(JobRequest::new("rtmp://src/a").with_id("a"))
        .await
        .unwrap();
    orchestrator
        .start(JobRequest::new("rtmp://src/b").with_id("b"))
        .await
        .unwrap();
    assert_eq!(harness.pool.len(), 2);
    assert!(harness.output_dir().exists());

    tokio::time::timeout(Duration::from_secs(15), orchestrator.shutdown())
        .await
        .expect("shutdown did not finish");

    assert!(harness.pool.is_empty());
    assert!(!harness.output_dir().exists());
}

#[tokio::test]
async fn test_master_write_failure_is_a_warning() {
    let harness = TestHarness::new();
    let orchestrator = harness.fake_orchestrator();

    // A directory where the master file should go makes the write fail.
    let master = harness.output_dir().join("warned/playlist.m3u8");
    std::fs::create_dir_all(&master).unwrap();

    let started = orchestrator
        .start(JobRequest::new("rtmp://src/live").with_id("warned"))
        .await
        .unwrap();

    assert_eq!(started.warnings.len(), 1);
    assert!(started.warnings[0].contains("playlist.m3u8"));
    assert!(!started.master_playlist.is_empty());

    harness.drain().await;
}
