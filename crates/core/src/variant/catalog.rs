//! The fixed table of output profiles.

use serde::Serialize;

use super::codec::{AudioCodec, VideoCodec};

/// Name of the profile unknown variant names resolve to.
pub const DEFAULT_VARIANT: &str = "720p";

/// Name of the audio-only profile.
pub const AUDIO_VARIANT: &str = "audio";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A named output profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub name: &'static str,
    pub label: &'static str,
    pub resolution: Option<Resolution>,
    /// Advertised bandwidth in bits per second.
    pub bandwidth: u64,
    pub kind: VariantKind,
    pub program_id: u32,
}

impl Variant {
    pub fn is_audio(&self) -> bool {
        self.kind == VariantKind::Audio
    }

    /// Target bitrate in kbit/s.
    pub fn bitrate_kbps(&self) -> u64 {
        self.bandwidth / 1000
    }

    /// The `CODECS` tag for this profile under the given codec selection.
    pub fn codec_tag(&self, video: VideoCodec, audio: AudioCodec) -> &'static str {
        match self.kind {
            VariantKind::Video => video.tag(),
            VariantKind::Audio => audio.tag(),
        }
    }
}

const fn video(
    name: &'static str,
    label: &'static str,
    width: u32,
    height: u32,
    bandwidth: u64,
    program_id: u32,
) -> Variant {
    Variant {
        name,
        label,
        resolution: Some(Resolution { width, height }),
        bandwidth,
        kind: VariantKind::Video,
        program_id,
    }
}

static VARIANTS: [Variant; 8] = [
    video("240p", "240p", 426, 240, 500_000, 1),
    video("360p", "360p", 640, 360, 1_200_000, 2),
    video("480p", "480p", 854, 480, 3_000_000, 3),
    video("720p", "720p", 1280, 720, 5_000_000, 4),
    video("1080p", "1080p", 1920, 1080, 7_000_000, 5),
    video("1440p", "2K", 2560, 1440, 10_000_000, 6),
    video("2160p", "4K", 3840, 2160, 15_000_000, 7),
    Variant {
        name: AUDIO_VARIANT,
        label: "audio",
        resolution: None,
        bandwidth: 192_000,
        kind: VariantKind::Audio,
        program_id: 8,
    },
];

/// Lookup over the static profile table.
pub struct VariantCatalog;

impl VariantCatalog {
    /// All profiles ordered by program ID.
    pub fn all() -> &'static [Variant] {
        &VARIANTS
    }

    /// Exact lookup by name.
    pub fn get(name: &str) -> Option<&'static Variant> {
        VARIANTS.iter().find(|v| v.name == name)
    }

    pub fn is_known(name: &str) -> bool {
        Self::get(name).is_some()
    }

    /// Looks up a profile, falling back to [`DEFAULT_VARIANT`] for unknown names.
    pub fn resolve(name: &str) -> &'static Variant {
        Self::get(name).unwrap_or_else(Self::default_variant)
    }

    pub fn default_variant() -> &'static Variant {
        // Index of "720p" in the table above.
        &VARIANTS[3]
    }
}
