use super::codec::{EncodeRequest, ImageCodec};
use crate::models::{CompressionConfig, CompressionDegraded, ImageAsset, MediaType};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Quality drop applied by the single over-budget retry.
const SECOND_PASS_STEP: f32 = 0.10;
/// The retry never encodes below this quality.
const QUALITY_FLOOR: f32 = 0.50;

const RENAMEABLE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Result of one compression attempt. `asset` is the original, untouched,
/// whenever `degraded` is set.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub asset: ImageAsset,
    pub degraded: Option<CompressionDegraded>,
}

/// Applies a [`CompressionConfig`] to an asset, falling back to the original
/// bytes on any failure.
///
/// At most two encodes happen per image: if the first result is over
/// `max_output_bytes`, one more pass runs at a lower quality and the smaller
/// of the two wins. The output may still be over budget after that.
#[derive(Clone)]
pub struct Compressor {
    codec: Arc<dyn ImageCodec>,
}

impl Compressor {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    pub async fn compress(&self, asset: &ImageAsset, config: &CompressionConfig) -> CompressionOutcome {
        match self.try_compress(asset, config).await {
            Ok(output) => CompressionOutcome {
                asset: output,
                degraded: None,
            },
            Err(e) => {
                warn!(
                    "Compression of '{}' failed, keeping original ({} bytes): {}",
                    asset.file_name,
                    asset.byte_size(),
                    e
                );
                CompressionOutcome {
                    asset: asset.clone(),
                    degraded: Some(CompressionDegraded {
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }

    async fn try_compress(&self, asset: &ImageAsset, config: &CompressionConfig) -> Result<ImageAsset> {
        let target = config.target_format().resolve(asset.media_type);
        let request = EncodeRequest {
            source: asset.media_type,
            target,
            max_dimension: config.max_dimension(),
            quality: config.quality(),
        };
        debug!(
            "Compressing '{}' ({} bytes): {:?}, budget {} bytes",
            asset.file_name,
            asset.byte_size(),
            request,
            config.max_output_bytes()
        );

        let bytes = tokio::task::spawn_blocking({
            let codec = Arc::clone(&self.codec);
            let input = asset.bytes.clone();
            let max_output_bytes = config.max_output_bytes();
            move || Self::encode_sync(codec.as_ref(), &input, request, max_output_bytes)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Compression task join error: {}", e)))??;

        Ok(ImageAsset::new(
            rename_for_format(&asset.file_name, asset.media_type, target),
            target,
            bytes,
        ))
    }

    fn encode_sync(
        codec: &dyn ImageCodec,
        input: &[u8],
        request: EncodeRequest,
        max_output_bytes: u64,
    ) -> Result<Vec<u8>> {
        let first = codec.transcode(input, &request)?;
        if first.len() as u64 <= max_output_bytes {
            return Ok(first);
        }

        // PNG is lossless; a lower quality would encode the same bytes.
        if request.target == MediaType::Png {
            return Ok(first);
        }

        let retry_quality = (request.quality - SECOND_PASS_STEP).max(QUALITY_FLOOR);
        if retry_quality >= request.quality {
            return Ok(first);
        }

        debug!(
            "Output of {} bytes over budget of {}, retrying at quality {:.2}",
            first.len(),
            max_output_bytes,
            retry_quality
        );
        let retry = EncodeRequest {
            quality: retry_quality,
            ..request
        };
        match codec.transcode(input, &retry) {
            Ok(second) if second.len() < first.len() => Ok(second),
            Ok(_) => Ok(first),
            Err(e) => {
                debug!("Second pass failed, keeping first pass: {}", e);
                Ok(first)
            }
        }
    }
}

/// Swap a `.jpg`/`.jpeg`/`.png` extension for the target's when the format
/// changes. Names without one of those extensions get the new one appended.
pub fn rename_for_format(file_name: &str, source: MediaType, target: MediaType) -> String {
    if source == target {
        return file_name.to_string();
    }

    let stem = match file_name.rsplit_once('.') {
        Some((stem, ext))
            if RENAMEABLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => file_name,
    };
    format!("{}.{}", stem, target.extension())
}
