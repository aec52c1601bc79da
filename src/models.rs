//! Data models and structures
//!
//! Defines the image assets and compression value objects that flow through
//! the pipeline, the catalog records kept by the backend, and runtime
//! configuration.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image encodings the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    /// Accepts the MIME types the admin panel allows for upload.
    ///
    /// WebP is only ever produced by the pipeline, so it is rejected here.
    pub fn parse_upload(mime: &str) -> Result<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Ok(MediaType::Jpeg),
            "image/png" => Ok(MediaType::Png),
            other => Err(Error::UnsupportedMediaType(format!(
                "'{}' is not an accepted image type (use JPEG or PNG)",
                other
            ))),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "jpg",
            MediaType::Png => "png",
            MediaType::Webp => "webp",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Output encoding requested by a compression config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Webp,
    Jpeg,
    Preserve,
}

impl TargetFormat {
    pub fn resolve(&self, source: MediaType) -> MediaType {
        match self {
            TargetFormat::Webp => MediaType::Webp,
            TargetFormat::Jpeg => MediaType::Jpeg,
            TargetFormat::Preserve => source,
        }
    }
}

/// An in-memory image file owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAsset {
    pub file_name: String,
    pub media_type: MediaType,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ImageAsset {
    pub fn new(file_name: impl Into<String>, media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type,
            bytes,
        }
    }

    /// Build an asset from a user-supplied file, rejecting unsupported MIME types.
    pub fn from_upload(file_name: impl Into<String>, mime: &str, bytes: Vec<u8>) -> Result<Self> {
        let media_type = MediaType::parse_upload(mime)?;
        Ok(Self::new(file_name, media_type, bytes))
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Concrete encoder settings for one image. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressionConfig {
    max_output_bytes: u64,
    max_dimension: u32,
    quality: f32,
    target_format: TargetFormat,
}

impl CompressionConfig {
    pub fn new(
        max_output_bytes: u64,
        max_dimension: u32,
        quality: f32,
        target_format: TargetFormat,
    ) -> Result<Self> {
        if max_dimension == 0 {
            return Err(Error::InvalidArgument(
                "max_dimension must be greater than zero".to_string(),
            ));
        }
        if !(quality > 0.0 && quality <= 1.0) {
            return Err(Error::InvalidArgument(format!(
                "quality must be in (0, 1], got {}",
                quality
            )));
        }
        Ok(Self::preset(
            max_output_bytes,
            max_dimension,
            quality,
            target_format,
        ))
    }

    /// Unchecked constructor for the policy tables, whose values are fixed.
    pub(crate) const fn preset(
        max_output_bytes: u64,
        max_dimension: u32,
        quality: f32,
        target_format: TargetFormat,
    ) -> Self {
        Self {
            max_output_bytes,
            max_dimension,
            quality,
            target_format,
        }
    }

    pub fn max_output_bytes(&self) -> u64 {
        self.max_output_bytes
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn target_format(&self) -> TargetFormat {
        self.target_format
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self::preset(1_048_576, 1200, 0.75, TargetFormat::Webp)
    }
}

/// Non-fatal signal that compression fell back to the original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionDegraded {
    pub reason: String,
}

impl fmt::Display for CompressionDegraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compression degraded: {}", self.reason)
    }
}

/// Before/after statistics for one compressed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionResult {
    pub output: ImageAsset,
    pub original_byte_size: u64,
    pub output_byte_size: u64,
    pub original_format: MediaType,
    pub output_format: MediaType,
    /// Negative when the output grew.
    pub savings_percent: f64,
    pub did_convert_format: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<CompressionDegraded>,
}

impl CompressionResult {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

// Catalog records

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub price: f64,
    pub category: String,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Primary image first, then additional images in order.
    pub fn image_references(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.image.as_str())
            .chain(self.images.iter().map(String::as_str))
            .filter(|reference| !reference.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub image: String,
    pub images: Vec<String>,
    pub price: f64,
    pub category: String,
    pub featured: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Lowercase, hyphen-separated form of a category name ("Photo Frames" -> "photo-frames").
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub const DEFAULT_PER_PAGE: u32 = 10;

/// Filter and 1-based pagination for product listings. Results are newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: None,
            featured: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl ProductQuery {
    pub fn in_category(mut self, slug: impl Into<String>) -> Self {
        self.category = Some(slug.into());
        self
    }

    pub fn featured_only(mut self) -> Self {
        self.featured = Some(true);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.category
            .as_ref()
            .is_none_or(|category| &product.category == category)
            && self.featured.is_none_or(|featured| product.featured == featured)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    /// Matching rows across all pages, when the backend reports it.
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> Option<u64> {
        if self.per_page == 0 {
            return Some(0);
        }
        self.total
            .map(|total| total.div_ceil(u64::from(self.per_page)))
    }

    /// Whether another page may follow. Without a known total, only a short
    /// page proves the listing is exhausted.
    pub fn has_next(&self) -> bool {
        match self.total_pages() {
            Some(pages) => u64::from(self.page) < pages,
            None => !self.items.is_empty() && self.items.len() as u64 >= u64::from(self.per_page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    pub expires_at: Option<DateTime<Utc>>,
}

// Configuration

const DEFAULT_CONCURRENCY: usize = 4;
const DRY_RUN_BACKEND_URL: &str = "http://localhost:54321";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub backend_anon_key: Option<String>,
    pub storage_access_key_id: Option<String>,
    pub storage_secret_access_key: Option<String>,
    pub storage_endpoint: String,
    pub storage_region: String,
    pub storage_bucket: String,
    pub storage_public_url: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub compression_concurrency: usize,
    /// Copy enhancement is unavailable when unset.
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Backend credentials are
    /// only required when the run talks to real services.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let dry_run = var("DRY_RUN")
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let require = |key: &str| -> Result<Option<String>> {
            match var(key) {
                Some(value) => Ok(Some(value)),
                None if dry_run => Ok(None),
                None => Err(Error::InvalidArgument(format!("{} not set", key))),
            }
        };

        let backend_url = require("BACKEND_URL")?
            .unwrap_or_else(|| DRY_RUN_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let backend_anon_key = require("BACKEND_ANON_KEY")?;
        let storage_access_key_id = require("STORAGE_ACCESS_KEY_ID")?;
        let storage_secret_access_key = require("STORAGE_SECRET_ACCESS_KEY")?;

        let storage_bucket = var("STORAGE_BUCKET").unwrap_or_else(|| "product-images".to_string());
        let storage_endpoint =
            var("STORAGE_ENDPOINT").unwrap_or_else(|| format!("{}/storage/v1/s3", backend_url));
        let storage_public_url = var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|| {
                format!(
                    "{}/storage/v1/object/public/{}",
                    backend_url, storage_bucket
                )
            })
            .trim_end_matches('/')
            .to_string();

        let compression_concurrency = match var("COMPRESSION_CONCURRENCY") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "COMPRESSION_CONCURRENCY must be a positive integer, got '{}'",
                        raw
                    ))
                })?,
            None => DEFAULT_CONCURRENCY,
        };

        Ok(Self {
            backend_url,
            backend_anon_key,
            storage_access_key_id,
            storage_secret_access_key,
            storage_endpoint,
            storage_region: var("STORAGE_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            storage_bucket,
            storage_public_url,
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
            compression_concurrency,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            dry_run,
        })
    }
}
