//! Object storage for product images
//!
//! Uploads finished image bytes to an S3-compatible bucket and resolves the
//! public URLs recorded on products back to object keys for deletion.

pub mod client;
pub mod mock;

pub use client::S3ObjectStore;
pub use mock::MockObjectStore;

use crate::models::MediaType;
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Folder inside the bucket holding every product image.
pub const PRODUCT_PREFIX: &str = "products/";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key` and return its public URL.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<String>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    fn public_url(&self, key: &str) -> String;
}

/// Fresh object key for a product image of the given type.
pub fn product_image_key(media_type: MediaType) -> String {
    format!("{}{}.{}", PRODUCT_PREFIX, Uuid::new_v4(), media_type.extension())
}

/// Resolve an image reference to its object key. Accepts a full public URL,
/// a `products/...` path, or a bare file name.
pub fn object_key(reference: &str) -> String {
    let reference = reference.trim();
    if reference.contains("://") {
        let path = reference.split(['?', '#']).next().unwrap_or(reference);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        format!("{}{}", PRODUCT_PREFIX, file_name)
    } else if reference.starts_with(PRODUCT_PREFIX) {
        reference.to_string()
    } else {
        format!("{}{}", PRODUCT_PREFIX, reference.trim_start_matches('/'))
    }
}
