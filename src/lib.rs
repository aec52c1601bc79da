//! Image pipeline for the shopfront admin panel
//!
//! Uploaded product photos are classified by size, compressed with a
//! size-adaptive encoder profile, uploaded to object storage and attached to
//! catalog records. Compression never fails a batch: an image that cannot be
//! encoded is passed through unchanged and flagged as degraded.
//! Product copy can optionally be rewritten by a chat model before publishing.

pub mod ai;
pub mod app;
pub mod catalog;
pub mod compression;
pub mod error;
pub mod models;
pub mod storage;

pub use error::{Error, Result};
