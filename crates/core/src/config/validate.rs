use url::Url;

use super::{types::Config, ConfigError};
use crate::transcoder::{validate_job_id, TranscoderConfig};
use crate::variant::{AudioCodec, VariantCatalog, VideoCodec};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Transcoder paths and names can be embedded in engine commands and URLs
/// - Default variants and codecs are known
/// - Origin URL (when set) is http(s)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    validate_transcoder(&config.transcoder)?;

    if let Some(origin) = &config.origin {
        if !is_http_url(&origin.url) {
            return Err(invalid("origin.url must start with http:// or https://"));
        }
    }

    Ok(())
}

fn validate_transcoder(t: &TranscoderConfig) -> Result<(), ConfigError> {
    if t.ffmpeg_bin.trim().is_empty() {
        return Err(invalid("transcoder.ffmpeg_bin cannot be empty"));
    }

    let output_dir = t.output_dir.to_string_lossy();
    if output_dir.is_empty() {
        return Err(invalid("transcoder.output_dir cannot be empty"));
    }
    if output_dir.contains(['"', '\\']) {
        return Err(invalid(
            "transcoder.output_dir cannot contain quotes or backslashes",
        ));
    }

    if validate_job_id(&t.master_filename).is_err() || !t.master_filename.ends_with(".m3u8") {
        return Err(invalid(
            "transcoder.master_filename must be a plain file name ending in .m3u8",
        ));
    }

    let prefix = t.route_prefix.trim_matches('/');
    if prefix.is_empty() || prefix.split('/').any(|seg| validate_job_id(seg).is_err()) {
        return Err(invalid(format!(
            "transcoder.route_prefix '{}' is not a valid path",
            t.route_prefix
        )));
    }

    if !is_http_url(&t.public_url) {
        return Err(invalid(
            "transcoder.public_url must start with http:// or https://",
        ));
    }

    if t.default_variants.is_empty() {
        return Err(invalid("transcoder.default_variants cannot be empty"));
    }
    if let Some(unknown) = t
        .default_variants
        .iter()
        .find(|name| !VariantCatalog::is_known(name))
    {
        return Err(invalid(format!(
            "transcoder.default_variants contains unknown variant '{}'",
            unknown
        )));
    }

    if VideoCodec::from_name(&t.video_codec).is_none() {
        return Err(invalid(format!(
            "transcoder.video_codec '{}' is not supported",
            t.video_codec
        )));
    }
    if AudioCodec::from_name(&t.audio_codec).is_none() {
        return Err(invalid(format!(
            "transcoder.audio_codec '{}' is not supported",
            t.audio_codec
        )));
    }

    if t.log_level.trim().is_empty() || t.log_level.contains(char::is_whitespace) {
        return Err(invalid("transcoder.log_level must be a single word"));
    }
    if t.segment_duration_secs == 0 {
        return Err(invalid("transcoder.segment_duration_secs cannot be 0"));
    }
    if t.readiness_poll_interval_ms == 0 {
        return Err(invalid("transcoder.readiness_poll_interval_ms cannot be 0"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn is_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}
