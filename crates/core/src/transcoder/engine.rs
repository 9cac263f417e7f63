//! Engine invocation for a job.
//!
//! One engine process produces every selected variant. The command is returned as a
//! template whose source and output locations are `${VAR}` placeholders, resolved
//! through the process environment overrides when the process is spawned.

use super::config::TranscoderConfig;
use super::job::Job;
use crate::process::Environment;
use crate::variant::{Variant, VariantKind};

/// Placeholder for the job's source locator.
pub const SOURCE_VAR: &str = "HLSPROXY_SOURCE";

/// Placeholder for the job's output directory.
pub const OUTPUT_VAR: &str = "HLSPROXY_OUTPUT";

/// Bitrate of the audio track in the audio-only variant.
const AUDIO_BITRATE: &str = "128k";

/// A command template plus the overrides that resolve its placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub template: String,
    pub env: Environment,
}

/// Builds the engine invocation for `job`. Identical jobs yield identical templates.
pub fn build_command(job: &Job, config: &TranscoderConfig) -> EngineCommand {
    let mut args: Vec<String> = vec![
        config.ffmpeg_bin.clone(),
        "-i".to_string(),
        format!("\"${{{SOURCE_VAR}}}\""),
        "-loglevel".to_string(),
        config.log_level.clone(),
    ];

    for variant in &job.variants {
        match variant.kind {
            VariantKind::Video => push_video_output(&mut args, job, variant),
            VariantKind::Audio => push_audio_output(&mut args, job),
        }
        push_hls_output(&mut args, config, variant);
    }

    let env = Environment::from([
        (SOURCE_VAR.to_string(), job.source.clone()),
        (
            OUTPUT_VAR.to_string(),
            job.output_dir.to_string_lossy().into_owned(),
        ),
    ]);

    EngineCommand {
        template: args.join(" "),
        env,
    }
}

fn push_video_output(args: &mut Vec<String>, job: &Job, variant: &Variant) {
    if let Some(resolution) = variant.resolution {
        args.push("-s".to_string());
        args.push(resolution.to_string());
    }

    args.push("-c:v".to_string());
    args.push(job.video_codec.encoder().to_string());

    if job.video_codec == crate::variant::VideoCodec::H264 {
        args.extend(["-profile:v", "baseline", "-level", "3.0"].map(String::from));
    }

    let kbps = variant.bitrate_kbps();
    args.push("-b:v".to_string());
    args.push(format!("{}k", kbps));
    args.push("-maxrate".to_string());
    args.push(format!("{}k", kbps));
    args.push("-bufsize".to_string());
    args.push(format!("{}k", kbps * 2));

    args.push("-c:a".to_string());
    args.push(job.audio_codec.encoder().to_string());
}

fn push_audio_output(args: &mut Vec<String>, job: &Job) {
    args.extend(["-map", "0:a", "-vn", "-c:a"].map(String::from));
    args.push(job.audio_codec.encoder().to_string());
    args.push("-b:a".to_string());
    args.push(AUDIO_BITRATE.to_string());
}

fn push_hls_output(args: &mut Vec<String>, config: &TranscoderConfig, variant: &Variant) {
    args.extend(["-f", "hls", "-start_number", "0"].map(String::from));
    args.push("-hls_time".to_string());
    args.push(config.segment_duration_secs.to_string());
    args.push("-hls_list_size".to_string());
    args.push(config.playlist_size.to_string());
    args.push("-hls_flags".to_string());
    args.push("delete_segments+split_by_time".to_string());
    args.push("-hls_segment_filename".to_string());
    args.push(format!("\"${{{OUTPUT_VAR}}}/{}/%03d.ts\"", variant.name));
    args.push(format!("\"${{{OUTPUT_VAR}}}/{0}/{0}.m3u8\"", variant.name));
}
