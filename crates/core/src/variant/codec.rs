//! Codec selections and their manifest tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Video codec used for every video variant of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
}

impl VideoCodec {
    /// Parses a codec name case-insensitively. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" => Some(Self::H264),
            "h265" | "hevc" => Some(Self::H265),
            _ => None,
        }
    }

    /// Parses a codec name, falling back to H.264.
    pub fn parse_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }

    /// RFC 6381 codec tag written into `CODECS`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::H264 => "avc1.4d40",
            Self::H265 => "hev1.1.6.L93.B0",
        }
    }

    /// Encoder name passed to the engine.
    pub fn encoder(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::H264 => "H264",
            Self::H265 => "H265",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Audio codec used for the audio track of every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Aac,
}

impl AudioCodec {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Parses a codec name, falling back to AAC.
    pub fn parse_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Aac => "mp4a.40.5",
        }
    }

    pub fn encoder(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Aac => "AAC",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
