//! Master manifest generation.

use std::collections::HashMap;

use m3u8_rs::{MasterPlaylist, QuotedOrUnquoted, Resolution, VariantStream};

use super::job::{variant_playlist, Job};

const HLS_VERSION: usize = 3;

/// Builds the master playlist for `job`, one stream entry per variant in selection order.
///
/// `uri_for` maps the variant's relative manifest path (`<v>/<v>.m3u8`) to the URI
/// written into the playlist.
pub fn master_playlist(job: &Job, uri_for: impl Fn(&str) -> String) -> MasterPlaylist {
    let variants = job
        .variants
        .iter()
        .map(|variant| {
            let mut attributes = HashMap::new();
            attributes.insert(
                "PROGRAM-ID".to_string(),
                QuotedOrUnquoted::Unquoted(variant.program_id.to_string()),
            );

            VariantStream {
                uri: uri_for(&variant_playlist(variant)),
                bandwidth: variant.bandwidth,
                codecs: Some(
                    variant
                        .codec_tag(job.video_codec, job.audio_codec)
                        .to_string(),
                ),
                resolution: variant.resolution.map(|r| Resolution {
                    width: u64::from(r.width),
                    height: u64::from(r.height),
                }),
                other_attributes: Some(attributes),
                ..Default::default()
            }
        })
        .collect();

    MasterPlaylist {
        version: Some(HLS_VERSION),
        variants,
        ..Default::default()
    }
}

/// Serializes a playlist to its `#EXTM3U` text form.
pub fn render(playlist: &MasterPlaylist) -> std::io::Result<String> {
    let mut buf = Vec::new();
    playlist.write_to(&mut buf)?;
    String::from_utf8(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
