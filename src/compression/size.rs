use crate::{Error, Result};
use serde::Serialize;

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;

/// Coarse classification of an original file size. Variants are declared in
/// ascending order so the derived `Ord` follows the byte thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeBucket {
    /// Up to 0.5MB inclusive.
    Tiny,
    /// Up to 1MB inclusive.
    Small,
    /// Up to 2MB inclusive.
    Medium,
    /// Up to 3MB inclusive.
    Large,
    /// Anything above 3MB.
    Huge,
}

impl SizeBucket {
    pub const ALL: [SizeBucket; 5] = [
        SizeBucket::Tiny,
        SizeBucket::Small,
        SizeBucket::Medium,
        SizeBucket::Large,
        SizeBucket::Huge,
    ];

    /// Inclusive upper bound in bytes, `None` for the open-ended bucket.
    pub fn upper_bound(&self) -> Option<u64> {
        match self {
            SizeBucket::Tiny => Some(MB / 2),
            SizeBucket::Small => Some(MB),
            SizeBucket::Medium => Some(2 * MB),
            SizeBucket::Large => Some(3 * MB),
            SizeBucket::Huge => None,
        }
    }
}

/// Map a byte size to its bucket. Total over `u64`.
pub fn classify(byte_size: u64) -> SizeBucket {
    SizeBucket::ALL
        .into_iter()
        .find(|bucket| bucket.upper_bound().is_none_or(|bound| byte_size <= bound))
        .unwrap_or(SizeBucket::Huge)
}

/// Sizes arriving as signed integers (JSON, database columns) must be
/// non-negative.
impl TryFrom<i64> for SizeBucket {
    type Error = Error;

    fn try_from(byte_size: i64) -> Result<Self> {
        u64::try_from(byte_size).map(classify).map_err(|_| {
            Error::InvalidArgument(format!("byte size must be non-negative, got {}", byte_size))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_smallest_bucket() {
        assert_eq!(classify(0), SizeBucket::Tiny);
    }

    #[test]
    fn test_boundaries_are_inclusive_upper_bounds() {
        assert_eq!(classify(MB / 2), SizeBucket::Tiny);
        assert_eq!(classify(MB / 2 + 1), SizeBucket::Small);
        assert_eq!(classify(MB), SizeBucket::Small);
        assert_eq!(classify(MB + 1), SizeBucket::Medium);
        assert_eq!(classify(2 * MB), SizeBucket::Medium);
        assert_eq!(classify(2 * MB + 1), SizeBucket::Large);
        assert_eq!(classify(3 * MB), SizeBucket::Large);
        assert_eq!(classify(3 * MB + 1), SizeBucket::Huge);
        assert_eq!(classify(u64::MAX), SizeBucket::Huge);
    }

    #[test]
    fn test_buckets_are_ordered_and_contiguous() {
        let bounds: Vec<u64> = SizeBucket::ALL
            .iter()
            .filter_map(|bucket| bucket.upper_bound())
            .collect();
        assert!(bounds.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(SizeBucket::ALL.windows(2).all(|pair| pair[0] < pair[1]));

        // Every bound and the byte after it land in adjacent buckets.
        for (i, bound) in bounds.iter().enumerate() {
            assert_eq!(classify(*bound), SizeBucket::ALL[i]);
            assert_eq!(classify(bound + 1), SizeBucket::ALL[i + 1]);
        }
    }

    #[test]
    fn test_classification_is_monotonic() {
        let mut previous = classify(0);
        for size in (0..4 * MB).step_by(4093) {
            let bucket = classify(size);
            assert!(bucket >= previous);
            previous = bucket;
        }
    }

    #[test]
    fn test_signed_sizes() {
        assert_eq!(SizeBucket::try_from(0i64).unwrap(), SizeBucket::Tiny);
        assert_eq!(
            SizeBucket::try_from(3_670_016i64).unwrap(),
            SizeBucket::Huge
        );
        assert!(matches!(
            SizeBucket::try_from(-1i64),
            Err(Error::InvalidArgument(_))
        ));
    }
}
