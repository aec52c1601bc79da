use super::compressor::CompressionOutcome;
use crate::models::{CompressionResult, ImageAsset};
use serde::Serialize;

/// Percentage reduction from `original` to `output`; negative when the
/// output grew, 0 for an empty original.
pub fn savings_percent(original: u64, output: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - output as f64) / original as f64 * 100.0
}

/// Compare an original asset with what compression produced.
pub fn report(original: &ImageAsset, output: &ImageAsset) -> CompressionResult {
    CompressionResult {
        output: output.clone(),
        original_byte_size: original.byte_size(),
        output_byte_size: output.byte_size(),
        original_format: original.media_type,
        output_format: output.media_type,
        savings_percent: savings_percent(original.byte_size(), output.byte_size()),
        did_convert_format: original.media_type != output.media_type,
        degraded: None,
    }
}

/// [`report`] for a full outcome, carrying the degraded flag through.
pub fn report_outcome(original: &ImageAsset, outcome: CompressionOutcome) -> CompressionResult {
    CompressionResult {
        degraded: outcome.degraded,
        ..report(original, &outcome.asset)
    }
}

/// Totals across a batch, as shown after an admin upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub files: usize,
    pub total_original_bytes: u64,
    pub total_output_bytes: u64,
    pub savings_percent: f64,
    pub converted: usize,
    pub degraded: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[CompressionResult]) -> Self {
        let total_original_bytes = results.iter().map(|r| r.original_byte_size).sum();
        let total_output_bytes = results.iter().map(|r| r.output_byte_size).sum();

        Self {
            files: results.len(),
            total_original_bytes,
            total_output_bytes,
            savings_percent: savings_percent(total_original_bytes, total_output_bytes),
            converted: results.iter().filter(|r| r.did_convert_format).count(),
            degraded: results.iter().filter(|r| r.is_degraded()).count(),
        }
    }
}

/// Human-readable size using 1024-based units ("1.5 MB", "0 Bytes").
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
