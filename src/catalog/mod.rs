//! Product catalog and admin authentication
//!
//! The storefront's records and sign-in live in a managed backend exposing a
//! REST interface. These traits are the seams the app is built against; the
//! REST client talks to the real backend and the mocks keep everything in
//! memory.

pub mod client;
pub mod mock;

pub use client::BackendClient;
pub use mock::{MockAuth, MockCatalog};

use crate::models::{Category, NewProduct, Page, Product, ProductQuery, ProductUpdate, Session};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_product(&self, product: NewProduct) -> Result<Product>;
    async fn update_product(&self, id: &str, update: ProductUpdate) -> Result<Product>;
    /// Removes the record only; releasing its images is the caller's job.
    async fn delete_product(&self, id: &str) -> Result<()>;
    async fn get_product(&self, id: &str) -> Result<Product>;
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>>;
    /// Newest products sharing `category`, excluding `id`.
    async fn related_products(&self, id: &str, category: &str, limit: usize)
        -> Result<Vec<Product>>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn create_category(&self, name: &str) -> Result<Category>;
    async fn delete_category(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session>;
    async fn current_session(&self) -> Option<Session>;
    async fn sign_out(&self) -> Result<()>;
}
