//! Admin-side orchestration: compress uploads, store them, and keep product
//! records and stored images in step.

use crate::ai::{MockCopyEnhancer, OpenAiCopyClient, ProductCopy, ProductCopyEnhancer};
use crate::catalog::{AuthProvider, BackendClient, CatalogStore, MockAuth, MockCatalog};
use crate::compression::{BatchRunner, BatchSummary, Compressor, ImageCodec, NativeCodec, Profile};
use crate::models::{
    CompressionResult, Config, ImageAsset, NewProduct, Product, ProductQuery, ProductUpdate,
    Session,
};
use crate::storage::{
    object_key, product_image_key, MockObjectStore, ObjectStore, S3ObjectStore, PRODUCT_PREFIX,
};
use crate::{Error, Result};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

const CLEANUP_PAGE_SIZE: u32 = 100;

/// Coordinates compression, object storage and the catalog for admin flows.
pub struct App {
    batch: BatchRunner,
    storage: Box<dyn ObjectStore>,
    catalog: Box<dyn CatalogStore>,
    auth: Box<dyn AuthProvider>,
    enhancer: Option<Box<dyn ProductCopyEnhancer>>,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub codec: Arc<dyn ImageCodec>,
    pub storage: Box<dyn ObjectStore>,
    pub catalog: Box<dyn CatalogStore>,
    pub auth: Box<dyn AuthProvider>,
    pub enhancer: Option<Box<dyn ProductCopyEnhancer>>,
}

/// Product fields entered in the admin form; images are supplied separately.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub kind: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub featured: bool,
}

#[derive(Debug, Clone)]
pub struct PublishedProduct {
    pub product: Product,
    pub results: Vec<CompressionResult>,
    pub summary: BatchSummary,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices, max_parallel: usize) -> Self {
        Self {
            batch: BatchRunner::new(Compressor::new(services.codec), max_parallel),
            storage: services.storage,
            catalog: services.catalog,
            auth: services.auth,
            enhancer: services.enhancer,
        }
    }

    /// Construct an app from configuration. Dry runs keep every collaborator
    /// in memory.
    pub async fn new(config: &Config) -> Result<Self> {
        let codec: Arc<dyn ImageCodec> = Arc::new(NativeCodec::new());

        let services = if config.dry_run {
            info!("DRY_RUN enabled: storage, catalog and auth are in-memory");
            AppServices {
                codec,
                storage: Box::new(
                    MockObjectStore::new().with_base_url(config.storage_public_url.clone()),
                ),
                catalog: Box::new(MockCatalog::new()),
                auth: Box::new(MockAuth::new(
                    config.admin_email.as_deref().unwrap_or("admin@localhost"),
                    config.admin_password.as_deref().unwrap_or(""),
                )),
                enhancer: Some(Box::new(MockCopyEnhancer::new())),
            }
        } else {
            let backend = Arc::new(BackendClient::from_config(config)?);
            AppServices {
                codec,
                storage: Box::new(S3ObjectStore::from_config(config).await?),
                catalog: Box::new(SharedBackend(Arc::clone(&backend))),
                auth: Box::new(SharedBackend(backend)),
                enhancer: match config.openai_api_key {
                    Some(_) => Some(Box::new(OpenAiCopyClient::from_config(config)?)
                        as Box<dyn ProductCopyEnhancer>),
                    None => {
                        info!("OPENAI_API_KEY not set, copy enhancement disabled");
                        None
                    }
                },
            }
        };

        info!(
            "Compression concurrency: {}",
            config.compression_concurrency
        );
        Ok(Self::with_services(services, config.compression_concurrency))
    }

    pub fn catalog(&self) -> &dyn CatalogStore {
        self.catalog.as_ref()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.auth.authenticate(email, password).await
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.auth.sign_out().await
    }

    async fn require_session(&self) -> Result<Session> {
        self.auth
            .current_session()
            .await
            .ok_or_else(|| Error::Auth("sign in required".to_string()))
    }

    /// Rewrite a title/description pair with the configured model.
    pub async fn enhance_copy(&self, copy: &ProductCopy) -> Result<ProductCopy> {
        copy.validate()?;
        let enhancer = self.enhancer.as_ref().ok_or_else(|| {
            Error::AiProvider("copy enhancement is not configured".to_string())
        })?;
        enhancer.enhance(copy).await
    }

    /// [`App::enhance_copy`] applied to a draft; other fields are untouched.
    pub async fn enhance_draft(&self, draft: ProductDraft) -> Result<ProductDraft> {
        let enhanced = self
            .enhance_copy(&ProductCopy::new(draft.name.as_str(), draft.description.as_str()))
            .await?;
        Ok(ProductDraft {
            name: enhanced.title,
            description: enhanced.description,
            ..draft
        })
    }

    /// Compress a batch and log the overall savings.
    pub async fn compress_images(
        &self,
        assets: &[ImageAsset],
        profile: Profile,
    ) -> (Vec<CompressionResult>, BatchSummary) {
        let results = self.batch.compress_with_profile(assets, profile).await;
        let summary = BatchSummary::from_results(&results);
        info!(
            "Compressed {} image(s) with {} profile: {:.1}% saved ({} -> {} bytes, {} degraded)",
            summary.files,
            profile,
            summary.savings_percent,
            summary.total_original_bytes,
            summary.total_output_bytes,
            summary.degraded
        );
        (results, summary)
    }

    /// Upload compressed outputs concurrently; URLs come back in input order.
    /// If any upload fails, the ones that succeeded are removed again.
    pub async fn upload_images(&self, results: &[CompressionResult]) -> Result<Vec<String>> {
        let uploads = results.iter().map(|result| async move {
            let key = product_image_key(result.output.media_type);
            let url = self
                .storage
                .upload(&key, &result.output.bytes, result.output.media_type.mime())
                .await?;
            Ok::<_, Error>((key, url))
        });
        let outcomes = join_all(uploads).await;

        if outcomes.iter().all(|outcome| outcome.is_ok()) {
            return outcomes
                .into_iter()
                .map(|outcome| outcome.map(|(_, url)| url))
                .collect();
        }

        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok((key, _)) => {
                    if let Err(e) = self.storage.delete(&key).await {
                        warn!("Failed to roll back upload {}: {}", key, e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        Err(first_error
            .unwrap_or_else(|| Error::Invariant("upload failed without an error".to_string())))
    }

    /// Compress with the admin profile, upload, and create the product. The
    /// first image becomes the primary image, the rest stay in order as
    /// additional images. If an upload or the record creation fails, the
    /// stored images are removed again.
    pub async fn publish_product(
        &self,
        draft: ProductDraft,
        assets: Vec<ImageAsset>,
    ) -> Result<PublishedProduct> {
        self.require_session().await?;
        if assets.is_empty() {
            return Err(Error::InvalidArgument(
                "a product needs at least one image".to_string(),
            ));
        }

        let (results, summary) = self.compress_images(&assets, Profile::Admin).await;
        let urls = self.upload_images(&results).await?;
        let (image, images) = urls
            .split_first()
            .ok_or_else(|| Error::Invariant("no URL for primary image".to_string()))?;

        let created = self
            .catalog
            .create_product(NewProduct {
                name: draft.name,
                kind: draft.kind,
                description: draft.description,
                image: image.clone(),
                images: images.to_vec(),
                price: draft.price,
                category: draft.category,
                featured: draft.featured,
            })
            .await;
        let product = match created {
            Ok(product) => product,
            Err(e) => {
                warn!("Product record not created, removing {} upload(s)", urls.len());
                for url in &urls {
                    self.release_image(url).await;
                }
                return Err(e);
            }
        };
        info!("Created product {} ({})", product.id, product.name);

        Ok(PublishedProduct {
            product,
            results,
            summary,
        })
    }

    /// Add images to an existing product. A product without a primary image
    /// takes the first new one as primary.
    pub async fn append_product_images(
        &self,
        id: &str,
        assets: Vec<ImageAsset>,
    ) -> Result<Product> {
        self.require_session().await?;
        let product = self.catalog.get_product(id).await?;

        let (results, _) = self.compress_images(&assets, Profile::Admin).await;
        let mut urls = self.upload_images(&results).await?.into_iter();

        let mut update = ProductUpdate::default();
        if product.image.is_empty() {
            update.image = urls.next();
        }
        let mut images = product.images;
        images.extend(urls);
        update.images = Some(images);

        self.catalog.update_product(id, update).await
    }

    /// Detach one image from a product and delete the stored object.
    pub async fn remove_product_image(&self, id: &str, reference: &str) -> Result<Product> {
        self.require_session().await?;
        let product = self.catalog.get_product(id).await?;

        let mut update = ProductUpdate::default();
        if product.image == reference {
            let mut rest = product.images.clone().into_iter();
            update.image = Some(rest.next().unwrap_or_default());
            update.images = Some(rest.collect());
        } else if product.images.iter().any(|image| image == reference) {
            update.images = Some(
                product
                    .images
                    .iter()
                    .filter(|image| *image != reference)
                    .cloned()
                    .collect(),
            );
        } else {
            return Err(Error::NotFound(format!(
                "image {} on product {}",
                reference, id
            )));
        }

        let updated = self.catalog.update_product(id, update).await?;
        self.release_image(reference).await;
        Ok(updated)
    }

    /// Delete the record, then release its stored images. Image deletion is
    /// best-effort; returns how many were released.
    pub async fn delete_product(&self, id: &str) -> Result<usize> {
        self.require_session().await?;
        let product = self.catalog.get_product(id).await?;
        self.catalog.delete_product(id).await?;
        info!("Deleted product {} ({})", product.id, product.name);

        let mut released = 0;
        for reference in product.image_references() {
            if self.release_image(reference).await {
                released += 1;
            }
        }
        Ok(released)
    }

    async fn release_image(&self, reference: &str) -> bool {
        let key = object_key(reference);
        match self.storage.delete(&key).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete stored image {}: {}", key, e);
                false
            }
        }
    }

    /// Delete stored product images that no product references. Returns the
    /// deleted keys.
    pub async fn cleanup_orphaned_images(&self) -> Result<Vec<String>> {
        self.require_session().await?;

        let referenced = self.referenced_keys().await?;
        let stored = self.storage.list(PRODUCT_PREFIX).await?;

        let mut deleted = Vec::new();
        for key in stored.into_iter().filter(|key| !referenced.contains(key)) {
            match self.storage.delete(&key).await {
                Ok(()) => deleted.push(key),
                Err(e) => warn!("Failed to delete orphaned image {}: {}", key, e),
            }
        }
        info!("Cleaned up {} orphaned image(s)", deleted.len());
        Ok(deleted)
    }

    async fn referenced_keys(&self) -> Result<HashSet<String>> {
        let mut keys = HashSet::new();
        let mut query = ProductQuery {
            per_page: CLEANUP_PAGE_SIZE,
            ..ProductQuery::default()
        };

        loop {
            let page = self.catalog.list_products(&query).await?;
            for product in &page.items {
                keys.extend(product.image_references().map(object_key));
            }
            if !page.has_next() {
                break;
            }
            query.page += 1;
        }
        Ok(keys)
    }
}

/// Lets one backend client serve as both catalog and auth provider.
struct SharedBackend(Arc<BackendClient>);

#[async_trait::async_trait]
impl CatalogStore for SharedBackend {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        self.0.create_product(product).await
    }

    async fn update_product(&self, id: &str, update: ProductUpdate) -> Result<Product> {
        self.0.update_product(id, update).await
    }

    async fn delete_product(&self, id: &str) -> Result<()> {
        self.0.delete_product(id).await
    }

    async fn get_product(&self, id: &str) -> Result<Product> {
        self.0.get_product(id).await
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<crate::models::Page<Product>> {
        self.0.list_products(query).await
    }

    async fn related_products(
        &self,
        id: &str,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Product>> {
        self.0.related_products(id, category, limit).await
    }

    async fn list_categories(&self) -> Result<Vec<crate::models::Category>> {
        self.0.list_categories().await
    }

    async fn create_category(&self, name: &str) -> Result<crate::models::Category> {
        self.0.create_category(name).await
    }

    async fn delete_category(&self, id: &str) -> Result<()> {
        self.0.delete_category(id).await
    }
}

#[async_trait::async_trait]
impl AuthProvider for SharedBackend {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        self.0.authenticate(email, password).await
    }

    async fn current_session(&self) -> Option<Session> {
        self.0.current_session().await
    }

    async fn sign_out(&self) -> Result<()> {
        self.0.sign_out().await
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppServices, ProductDraft};
    use crate::ai::{MockCopyEnhancer, ProductCopy};
    use crate::catalog::{CatalogStore, MockAuth, MockCatalog};
    use crate::compression::MockCodec;
    use crate::models::{ImageAsset, MediaType, NewProduct};
    use crate::storage::{MockObjectStore, ObjectStore};
    use crate::Error;
    use std::sync::Arc;

    const ADMIN: &str = "admin@shop.test";
    const PASSWORD: &str = "secret";

    struct Harness {
        app: App,
        codec: MockCodec,
        storage: MockObjectStore,
        catalog: MockCatalog,
    }

    fn harness_with(codec: MockCodec, storage: MockObjectStore, signed_in: bool) -> Harness {
        harness_from(codec, storage, MockCatalog::new(), signed_in)
    }

    fn harness_from(
        codec: MockCodec,
        storage: MockObjectStore,
        catalog: MockCatalog,
        signed_in: bool,
    ) -> Harness {
        let auth = MockAuth::new(ADMIN, PASSWORD);
        let auth = if signed_in { auth.signed_in() } else { auth };

        let app = App::with_services(
            AppServices {
                codec: Arc::new(codec.clone()),
                storage: Box::new(storage.clone()),
                catalog: Box::new(catalog.clone()),
                auth: Box::new(auth),
                enhancer: Some(Box::new(
                    MockCopyEnhancer::new()
                        .with_response(ProductCopy::new("Oak Photo Frame", "Solid oak.")),
                )),
            },
            4,
        );
        Harness {
            app,
            codec,
            storage,
            catalog,
        }
    }

    fn harness() -> Harness {
        harness_with(MockCodec::new(), MockObjectStore::new(), true)
    }

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Oak Photo Frame".to_string(),
            kind: "frame".to_string(),
            description: "Hand finished oak".to_string(),
            price: 32.0,
            category: "photo-frames".to_string(),
            featured: true,
        }
    }

    fn asset(name: &str, bytes: &[u8]) -> ImageAsset {
        ImageAsset::new(name, MediaType::Jpeg, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_publish_product_records_urls_in_order() {
        let h = harness();
        let assets = vec![
            asset("front.jpg", b"front-image"),
            asset("back.jpg", b"back-image!"),
            asset("side.jpg", b"side-image!"),
        ];

        let published = h.app.publish_product(draft(), assets).await.unwrap();

        let product = &published.product;
        assert!(product.image.ends_with(".webp"));
        assert_eq!(product.images.len(), 2);

        // Stored bytes line up with the input order.
        let files = h.storage.get_files();
        let stored = |url: &str| files.get(&crate::storage::object_key(url)).cloned().unwrap();
        assert_eq!(stored(&product.image), b"front".to_vec());
        assert_eq!(stored(&product.images[0]), b"back-".to_vec());
        assert_eq!(stored(&product.images[1]), b"side-".to_vec());

        assert_eq!(published.summary.files, 3);
        assert_eq!(h.codec.get_call_count(), 3);
        assert_eq!(h.catalog.get_products().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_requires_session() {
        let h = harness_with(MockCodec::new(), MockObjectStore::new(), false);
        let err = h
            .app
            .publish_product(draft(), vec![asset("a.jpg", b"aaaa")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(h.codec.get_call_count(), 0);

        h.app.sign_in(ADMIN, PASSWORD).await.unwrap();
        assert!(h
            .app
            .publish_product(draft(), vec![asset("a.jpg", b"aaaa")])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_publish_without_images_is_rejected() {
        let h = harness();
        let err = h.app.publish_product(draft(), vec![]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_storage_failure_blocks_record_creation() {
        let h = harness_with(
            MockCodec::new(),
            MockObjectStore::new().with_upload_failure_after(1),
            true,
        );
        let assets = vec![asset("a.jpg", b"aaaa"), asset("b.jpg", b"bbbb")];

        let err = h.app.publish_product(draft(), assets).await.unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert!(h.catalog.get_products().is_empty());
        // The upload that did succeed was rolled back.
        assert!(h.storage.get_files().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_failure_removes_uploaded_images() {
        let h = harness_from(
            MockCodec::new(),
            MockObjectStore::new(),
            MockCatalog::new().with_failure(true),
            true,
        );
        let assets = vec![asset("a.jpg", b"aaaa"), asset("b.jpg", b"bbbb")];

        let err = h.app.publish_product(draft(), assets).await.unwrap_err();

        assert!(matches!(err, Error::Catalog(_)));
        assert_eq!(h.storage.get_upload_count(), 2);
        assert!(h.storage.get_files().is_empty());
    }

    #[tokio::test]
    async fn test_enhance_draft_rewrites_copy_only() {
        let h = harness();
        let enhanced = h.app.enhance_draft(draft()).await.unwrap();

        assert_eq!(enhanced.name, "Oak Photo Frame");
        assert_eq!(enhanced.description, "Solid oak.");
        assert_eq!(enhanced.price, draft().price);
        assert_eq!(enhanced.category, draft().category);
    }

    #[tokio::test]
    async fn test_enhance_without_enhancer_or_text() {
        let h = harness();
        let err = h
            .app
            .enhance_copy(&ProductCopy::new("", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let app = App::with_services(
            AppServices {
                codec: Arc::new(MockCodec::new()),
                storage: Box::new(MockObjectStore::new()),
                catalog: Box::new(MockCatalog::new()),
                auth: Box::new(MockAuth::new(ADMIN, PASSWORD)),
                enhancer: None,
            },
            1,
        );
        let err = app
            .enhance_copy(&ProductCopy::new("Frame", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }

    #[tokio::test]
    async fn test_degraded_image_is_still_published() {
        let h = harness_with(
            MockCodec::new().with_failing_input(b"corrupt".to_vec()),
            MockObjectStore::new(),
            true,
        );
        let assets = vec![asset("ok.jpg", b"good-bytes"), asset("bad.jpg", b"corrupt")];

        let published = h.app.publish_product(draft(), assets).await.unwrap();

        assert_eq!(published.summary.degraded, 1);
        assert!(published.product.images[0].ends_with(".jpg"));
        let key = crate::storage::object_key(&published.product.images[0]);
        assert_eq!(h.storage.get_files().get(&key).unwrap(), b"corrupt");
    }

    #[tokio::test]
    async fn test_delete_product_releases_images() {
        let h = harness();
        let published = h
            .app
            .publish_product(
                draft(),
                vec![asset("a.jpg", b"aaaa"), asset("b.jpg", b"bbbb")],
            )
            .await
            .unwrap();
        assert_eq!(h.storage.get_files().len(), 2);

        let released = h.app.delete_product(&published.product.id).await.unwrap();

        assert_eq!(released, 2);
        assert!(h.storage.get_files().is_empty());
        assert!(h.catalog.get_products().is_empty());
    }

    #[tokio::test]
    async fn test_delete_product_tolerates_image_delete_failure() {
        let storage = MockObjectStore::new();
        let h = harness_with(MockCodec::new(), storage, true);
        let product = h
            .catalog
            .create_product(NewProduct {
                name: "Watch".to_string(),
                kind: "watch".to_string(),
                description: String::new(),
                image: "products/missing.webp".to_string(),
                images: vec![],
                price: 1.0,
                category: "watches".to_string(),
                featured: false,
            })
            .await
            .unwrap();

        let released = h.app.delete_product(&product.id).await.unwrap();

        assert_eq!(released, 0);
        assert!(h.catalog.get_products().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_remove_images() {
        let h = harness();
        let published = h
            .app
            .publish_product(draft(), vec![asset("a.jpg", b"aaaa")])
            .await
            .unwrap();
        let id = published.product.id.clone();

        let updated = h
            .app
            .append_product_images(&id, vec![asset("b.jpg", b"bbbb")])
            .await
            .unwrap();
        assert_eq!(updated.image, published.product.image);
        assert_eq!(updated.images.len(), 1);

        let primary = updated.image.clone();
        let second = updated.images[0].clone();
        let updated = h.app.remove_product_image(&id, &primary).await.unwrap();
        assert_eq!(updated.image, second);
        assert!(updated.images.is_empty());
        assert_eq!(h.storage.get_files().len(), 1);

        let err = h
            .app
            .remove_product_image(&id, "products/unknown.webp")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cleanup_orphaned_images() {
        let storage = MockObjectStore::new()
            .with_file("products/orphan.webp".to_string(), b"x".to_vec())
            .with_file("banners/hero.webp".to_string(), b"x".to_vec());
        let h = harness_with(MockCodec::new(), storage, true);
        let published = h
            .app
            .publish_product(draft(), vec![asset("a.jpg", b"aaaa")])
            .await
            .unwrap();

        let deleted = h.app.cleanup_orphaned_images().await.unwrap();

        assert_eq!(deleted, vec!["products/orphan.webp".to_string()]);
        let files = h.storage.get_files();
        assert!(files.contains_key(&crate::storage::object_key(&published.product.image)));
        assert!(files.contains_key("banners/hero.webp"));
        assert_eq!(h.storage.list("products/").await.unwrap().len(), 1);
    }
}
