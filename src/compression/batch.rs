use super::compressor::Compressor;
use super::policy::{select_config, Profile};
use super::report::report_outcome;
use super::size::classify;
use crate::models::{CompressionConfig, CompressionResult, ImageAsset};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

/// Fans a batch of images out over the compressor with bounded parallelism.
///
/// Results come back in input order and every input yields a result: items
/// whose compression fails pass through unchanged with `degraded` set.
#[derive(Clone)]
pub struct BatchRunner {
    compressor: Compressor,
    permits: Arc<Semaphore>,
}

impl BatchRunner {
    /// `max_parallel` is clamped to at least one.
    pub fn new(compressor: Compressor, max_parallel: usize) -> Self {
        Self {
            compressor,
            permits: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    pub async fn compress_all<F>(&self, assets: &[ImageAsset], select: F) -> Vec<CompressionResult>
    where
        F: Fn(&ImageAsset) -> CompressionConfig,
    {
        let select = &select;
        let jobs = assets.iter().enumerate().map(|(index, asset)| async move {
            let config = select(asset);
            // The semaphore is never closed, so acquire only fails if that changes.
            let _permit = self.permits.acquire().await.ok();
            let outcome = self.compressor.compress(asset, &config).await;
            let result = report_outcome(asset, outcome);
            info!(
                "[{}/{}] {} -> {} ({:.1}% saved{})",
                index + 1,
                assets.len(),
                asset.file_name,
                result.output.file_name,
                result.savings_percent,
                if result.is_degraded() { ", degraded" } else { "" }
            );
            result
        });

        join_all(jobs).await
    }

    /// Compress with the size-adaptive configuration for `profile`.
    pub async fn compress_with_profile(
        &self,
        assets: &[ImageAsset],
        profile: Profile,
    ) -> Vec<CompressionResult> {
        self.compress_all(assets, |asset| {
            select_config(classify(asset.byte_size()), profile)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::mock::MockCodec;
    use crate::models::{MediaType, TargetFormat};
    use std::time::Duration;

    fn asset(name: &str, bytes: &[u8]) -> ImageAsset {
        ImageAsset::new(name, MediaType::Jpeg, bytes.to_vec())
    }

    fn runner(codec: MockCodec, max_parallel: usize) -> BatchRunner {
        BatchRunner::new(Compressor::new(Arc::new(codec)), max_parallel)
    }

    #[tokio::test]
    async fn test_results_follow_input_order_when_completion_is_reversed() {
        let codec = MockCodec::new()
            .with_delay_for(b"first!".to_vec(), Duration::from_millis(150))
            .with_delay_for(b"second".to_vec(), Duration::from_millis(75));
        let assets = vec![
            asset("1.jpg", b"first!"),
            asset("2.jpg", b"second"),
            asset("3.jpg", b"third!"),
        ];

        let results = runner(codec, 3)
            .compress_all(&assets, |_| CompressionConfig::default())
            .await;

        let outputs: Vec<Vec<u8>> = results.iter().map(|r| r.output.bytes.clone()).collect();
        assert_eq!(outputs, vec![b"fir".to_vec(), b"sec".to_vec(), b"thi".to_vec()]);
        let names: Vec<&str> = results.iter().map(|r| r.output.file_name.as_str()).collect();
        assert_eq!(names, vec!["1.webp", "2.webp", "3.webp"]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_item() {
        let codec = MockCodec::new().with_failing_input(b"corrupt".to_vec());
        let assets = vec![
            asset("a.jpg", b"aaaaaaaa"),
            asset("b.jpg", b"corrupt"),
            asset("c.jpg", b"cccccccc"),
        ];

        let results = runner(codec, 2)
            .compress_all(&assets, |_| CompressionConfig::default())
            .await;

        assert_eq!(results.len(), 3);
        assert!(!results[0].is_degraded());
        assert!(results[1].is_degraded());
        assert_eq!(results[1].output, assets[1]);
        assert!(!results[2].is_degraded());
    }

    #[tokio::test]
    async fn test_selector_sees_each_asset() {
        let codec = MockCodec::new();
        let assets = vec![asset("a.jpg", b"aaaa"), asset("b.jpg", b"bbbb")];

        let results = runner(codec.clone(), 1)
            .compress_all(&assets, |asset| {
                let target = if asset.file_name == "a.jpg" {
                    TargetFormat::Preserve
                } else {
                    TargetFormat::Webp
                };
                CompressionConfig::new(1024, 1200, 0.8, target).unwrap()
            })
            .await;

        assert_eq!(results[0].output.file_name, "a.jpg");
        assert_eq!(results[1].output.file_name, "b.webp");
        assert_eq!(codec.get_call_count(), 2);
    }

    #[tokio::test]
    async fn test_profile_selects_by_size() {
        let codec = MockCodec::new();
        let assets = vec![asset("small.jpg", &[1; 64])];

        runner(codec.clone(), 4)
            .compress_with_profile(&assets, Profile::Admin)
            .await;

        let requests = codec.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, MediaType::Webp);
        assert!((requests[0].quality - 0.80).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let results = runner(MockCodec::new(), 0)
            .compress_all(&[], |_| CompressionConfig::default())
            .await;
        assert!(results.is_empty());
    }
}
