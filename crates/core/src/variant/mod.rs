//! Output profiles and codec selections.

mod catalog;
mod codec;

pub use catalog::{
    Resolution, Variant, VariantCatalog, VariantKind, AUDIO_VARIANT, DEFAULT_VARIANT,
};
pub use codec::{AudioCodec, VideoCodec};
