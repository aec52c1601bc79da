//! Size-adaptive image compression
//!
//! Classifies each upload by byte size, picks encoder settings for the
//! requested profile, resizes and re-encodes (usually to WebP), and reports
//! what was saved. A failed compression never blocks an upload: the original
//! bytes pass through with a degraded flag instead.

pub mod batch;
pub mod codec;
pub mod compressor;
pub mod mock;
pub mod policy;
pub mod report;
pub mod size;

pub use batch::BatchRunner;
pub use codec::{EncodeRequest, ImageCodec, NativeCodec};
pub use compressor::{rename_for_format, CompressionOutcome, Compressor};
pub use mock::MockCodec;
pub use policy::{select_config, Profile, MAX_DIMENSION};
pub use report::{format_file_size, report, report_outcome, savings_percent, BatchSummary};
pub use size::{classify, SizeBucket};
