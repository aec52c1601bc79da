use super::size::{SizeBucket, MB};
use crate::models::{CompressionConfig, TargetFormat};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Every profile caps the long edge here. Larger inputs are tamed by
/// resampling rather than by pushing quality down.
pub const MAX_DIMENSION: u32 = 1200;

/// Intent behind a compression run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Admin panel uploads: always WebP, 70-80% quality.
    Admin,
    /// Keeps the source format, looser size targets for large files.
    General,
    /// Product photography where fidelity matters more than bytes.
    HighQuality,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Admin, Profile::General, Profile::HighQuality];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Admin => "admin",
            Profile::General => "general",
            Profile::HighQuality => "high-quality",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Profile::ALL
            .into_iter()
            .find(|profile| profile.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown profile '{}' (expected admin, general or high-quality)",
                    s
                ))
            })
    }
}

const fn mb_tenths(tenths: u64) -> u64 {
    MB * tenths / 10
}

const fn webp(max_output_bytes: u64, quality: f32) -> CompressionConfig {
    CompressionConfig::preset(max_output_bytes, MAX_DIMENSION, quality, TargetFormat::Webp)
}

const fn preserve(max_output_bytes: u64, quality: f32) -> CompressionConfig {
    CompressionConfig::preset(
        max_output_bytes,
        MAX_DIMENSION,
        quality,
        TargetFormat::Preserve,
    )
}

/// Pick the encoder settings for a size bucket under a profile.
///
/// Bigger originals get a looser byte target and only a modest quality
/// step-down; the dimension cap does the heavy lifting.
pub fn select_config(bucket: SizeBucket, profile: Profile) -> CompressionConfig {
    use SizeBucket::*;

    match profile {
        Profile::Admin => match bucket {
            Tiny | Small => webp(mb_tenths(6), 0.80),
            Medium => webp(mb_tenths(8), 0.75),
            Large | Huge => webp(mb_tenths(10), 0.70),
        },
        Profile::General => match bucket {
            Tiny => preserve(mb_tenths(4), 0.80),
            Small => preserve(mb_tenths(6), 0.80),
            Medium => preserve(mb_tenths(8), 0.80),
            Large => preserve(mb_tenths(10), 0.75),
            Huge => preserve(mb_tenths(12), 0.70),
        },
        Profile::HighQuality => match bucket {
            Tiny | Small => webp(mb_tenths(8), 0.80),
            Medium => webp(mb_tenths(12), 0.80),
            Large | Huge => webp(mb_tenths(15), 0.75),
        },
    }
}
