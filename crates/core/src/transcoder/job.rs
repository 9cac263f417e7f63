//! Job requests and their normalized form.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::TranscoderConfig;
use super::error::OrchestratorError;
use crate::variant::{AudioCodec, Variant, VariantCatalog, VideoCodec, AUDIO_VARIANT};

const MAX_JOB_ID_LEN: usize = 128;

/// A request to start transcoding a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    /// Source locator (URL or file path) handed to the engine as input.
    pub source: String,
    /// Caller-chosen job ID. A UUID is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Selected variant names. Empty means the configured defaults.
    #[serde(default)]
    pub variants: Vec<String>,
    /// Add the audio-only variant.
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub video_codec: Option<String>,
    #[serde(default)]
    pub audio_codec: Option<String>,
}

impl JobRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audio(mut self, audio: bool) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_codecs(mut self, video: impl Into<String>, audio: impl Into<String>) -> Self {
        self.video_codec = Some(video.into());
        self.audio_codec = Some(audio.into());
        self
    }
}

/// A validated job, ready to be turned into an engine invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub source: String,
    /// `<output_dir>/<id>`.
    pub output_dir: PathBuf,
    /// Resolved profiles in selection order, without duplicates.
    pub variants: Vec<&'static Variant>,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub audio: bool,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Validates and normalizes a request against the transcoder configuration.
    pub fn from_request(
        request: JobRequest,
        config: &TranscoderConfig,
    ) -> Result<Self, OrchestratorError> {
        let id = match request.id {
            Some(id) if !id.is_empty() => {
                validate_job_id(&id)?;
                id
            }
            _ => uuid::Uuid::new_v4().to_string(),
        };

        validate_source(&request.source)?;

        let mut names = if request.variants.is_empty() {
            config.default_variants.clone()
        } else {
            request.variants
        };
        if request.audio && !names.iter().any(|n| n == AUDIO_VARIANT) {
            names.push(AUDIO_VARIANT.to_string());
        }

        let video_codec = request
            .video_codec
            .as_deref()
            .map(VideoCodec::parse_or_default)
            .unwrap_or_else(|| VideoCodec::parse_or_default(&config.video_codec));
        let audio_codec = request
            .audio_codec
            .as_deref()
            .map(AudioCodec::parse_or_default)
            .unwrap_or_else(|| AudioCodec::parse_or_default(&config.audio_codec));

        Ok(Self {
            output_dir: config.job_dir(&id),
            id,
            source: request.source,
            variants: resolve_variants(&names),
            video_codec,
            audio_codec,
            audio: request.audio,
            created_at: Utc::now(),
        })
    }

    /// Directory the engine writes one variant into.
    pub fn variant_dir(&self, variant: &Variant) -> PathBuf {
        self.output_dir.join(variant.name)
    }

    /// Variant names in selection order.
    pub fn variant_names(&self) -> Vec<&'static str> {
        self.variants.iter().map(|v| v.name).collect()
    }
}

/// Path of a variant manifest relative to the job directory.
pub fn variant_playlist(variant: &Variant) -> String {
    format!("{0}/{0}.m3u8", variant.name)
}

/// Resolves names through the catalog and drops repeated profiles, keeping the first.
fn resolve_variants(names: &[String]) -> Vec<&'static Variant> {
    let mut resolved: Vec<&'static Variant> = Vec::with_capacity(names.len());
    for name in names {
        let variant = VariantCatalog::resolve(name.trim());
        if !resolved.iter().any(|v| v.name == variant.name) {
            resolved.push(variant);
        }
    }
    resolved
}

/// A job ID must be usable as a single directory name.
pub fn validate_job_id(id: &str) -> Result<(), OrchestratorError> {
    if id.is_empty() {
        return Err(OrchestratorError::invalid_id(id, "must not be empty"));
    }
    if id.len() > MAX_JOB_ID_LEN {
        return Err(OrchestratorError::invalid_id(
            id,
            format!("must be at most {} characters", MAX_JOB_ID_LEN),
        ));
    }
    if id == "." || id == ".." {
        return Err(OrchestratorError::invalid_id(id, "must not be . or .."));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(OrchestratorError::invalid_id(
            id,
            format!("invalid character {:?}", c),
        ));
    }
    Ok(())
}

/// The source is quoted inside the engine command, so it must not break out of the quotes.
pub fn validate_source(source: &str) -> Result<(), OrchestratorError> {
    if source.trim().is_empty() {
        return Err(OrchestratorError::invalid_source("source must not be empty"));
    }
    if source.contains(['"', '\\']) {
        return Err(OrchestratorError::invalid_source(
            "source must not contain quotes or backslashes",
        ));
    }
    if source.chars().any(char::is_control) {
        return Err(OrchestratorError::invalid_source(
            "source must not contain control characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TranscoderConfig {
        TranscoderConfig {
            output_dir: PathBuf::from("/srv/hls"),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_selection_uses_defaults() {
        let job = Job::from_request(JobRequest::new("rtmp://src/live"), &config()).unwrap();
        assert_eq!(job.variant_names(), vec!["240p", "360p"]);
        assert_eq!(job.video_codec, VideoCodec::H264);
        assert_eq!(job.audio_codec, AudioCodec::Aac);
    }

    #[test]
    fn test_audio_flag_appends_audio_once() {
        let job = Job::from_request(
            JobRequest::new("rtmp://src/live")
                .with_variants(["720p"])
                .with_audio(true),
            &config(),
        )
        .unwrap();
        assert_eq!(job.variant_names(), vec!["720p", "audio"]);

        let job = Job::from_request(
            JobRequest::new("rtmp://src/live")
                .with_variants(["audio", "240p"])
                .with_audio(true),
            &config(),
        )
        .unwrap();
        assert_eq!(job.variant_names(), vec!["audio", "240p"]);
    }

    #[test]
    fn test_duplicates_and_unknown_names_collapse() {
        let job = Job::from_request(
            JobRequest::new("rtmp://src/live").with_variants(["240p", "bogus", "720p", "240p"]),
            &config(),
        )
        .unwrap();
        assert_eq!(job.variant_names(), vec!["240p", "720p"]);
    }

    #[test]
    fn test_generated_id_is_uuid() {
        let job = Job::from_request(JobRequest::new("file.mp4"), &config()).unwrap();
        assert!(uuid::Uuid::parse_str(&job.id).is_ok());
        assert_eq!(job.output_dir, PathBuf::from("/srv/hls").join(&job.id));
    }

    #[test]
    fn test_explicit_id_and_codecs() {
        let job = Job::from_request(
            JobRequest::new("rtmp://src/live")
                .with_id("abc123")
                .with_codecs("H265", "aac"),
            &config(),
        )
        .unwrap();
        assert_eq!(job.id, "abc123");
        assert_eq!(job.output_dir, PathBuf::from("/srv/hls/abc123"));
        assert_eq!(job.video_codec, VideoCodec::H265);
    }

    #[test]
    fn test_invalid_job_ids() {
        for id in ["..", ".", "a/b", "a b", "x\"y", &"a".repeat(200)] {
            assert!(
                matches!(validate_job_id(id), Err(OrchestratorError::InvalidJobId { .. })),
                "{id} should be rejected"
            );
        }
        assert!(validate_job_id("stream-01_v1.2").is_ok());
    }

    #[test]
    fn test_invalid_sources() {
        for source in ["", "   ", "rtmp://a\"b", "a\\b", "rtmp://x\ny"] {
            assert!(
                matches!(validate_source(source), Err(OrchestratorError::InvalidSource { .. })),
                "{source:?} should be rejected"
            );
        }
        assert!(validate_source("rtmp://host/live stream?key=1&x=$HOME").is_ok());
    }

    #[test]
    fn test_variant_playlist_path() {
        assert_eq!(
            variant_playlist(VariantCatalog::resolve("240p")),
            "240p/240p.m3u8"
        );
    }
}
