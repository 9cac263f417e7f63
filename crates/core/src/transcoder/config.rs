//! Transcoder configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the transcode orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Engine binary. Inserted verbatim at the start of the command template,
    /// so it may carry wrapper arguments.
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,

    /// Root directory holding one subdirectory per job.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name of the master manifest inside each job directory.
    #[serde(default = "default_master_filename")]
    pub master_filename: String,

    /// Externally reachable base URL used for absolute variant URIs.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Path segment under which the output directory is served.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Variants used when a request selects none.
    #[serde(default = "default_variants")]
    pub default_variants: Vec<String>,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Engine `-loglevel` argument.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Target segment duration (`-hls_time`).
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: u32,

    /// Number of segments kept in each variant manifest (`-hls_list_size`).
    #[serde(default = "default_playlist_size")]
    pub playlist_size: u32,

    /// How often the job directory is scanned for the first segment (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub readiness_poll_interval_ms: u64,

    /// Give up waiting for the first segment after this many seconds (0 = never).
    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout_secs: u64,

    /// Delete `output_dir` after all processes have stopped on shutdown.
    #[serde(default = "default_true")]
    pub remove_output_on_shutdown: bool,
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_master_filename() -> String {
    "playlist.m3u8".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_route_prefix() -> String {
    "hlsproxy".to_string()
}

fn default_variants() -> Vec<String> {
    vec!["240p".to_string(), "360p".to_string()]
}

fn default_video_codec() -> String {
    "h264".to_string()
}

fn default_audio_codec() -> String {
    "AAC".to_string()
}

fn default_log_level() -> String {
    "repeat+level+verbose".to_string()
}

fn default_segment_duration() -> u32 {
    2
}

fn default_playlist_size() -> u32 {
    10
}

fn default_poll_interval() -> u64 {
    1000 // 1 second
}

fn default_readiness_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: default_ffmpeg_bin(),
            output_dir: default_output_dir(),
            master_filename: default_master_filename(),
            public_url: default_public_url(),
            route_prefix: default_route_prefix(),
            default_variants: default_variants(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            log_level: default_log_level(),
            segment_duration_secs: default_segment_duration(),
            playlist_size: default_playlist_size(),
            readiness_poll_interval_ms: default_poll_interval(),
            readiness_timeout_secs: default_readiness_timeout(),
            remove_output_on_shutdown: true,
        }
    }
}

impl TranscoderConfig {
    /// Directory holding everything produced for `job_id`.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.output_dir.join(job_id)
    }

    /// Absolute URL of a file inside a job directory.
    pub fn public_path(&self, job_id: &str, relative: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.public_url.trim_end_matches('/'),
            self.route_prefix.trim_matches('/'),
            job_id,
            relative
        )
    }
}
