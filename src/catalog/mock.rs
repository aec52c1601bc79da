use super::{AuthProvider, CatalogStore};
use crate::models::{slugify, Category, NewProduct, Page, Product, ProductQuery, ProductUpdate, Session};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory catalog. Products are kept in insertion order, which doubles as
/// creation order for "newest first" listings.
#[derive(Clone)]
pub struct MockCatalog {
    products: Arc<Mutex<Vec<Product>>>,
    categories: Arc<Mutex<Vec<Category>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            products: Arc::new(Mutex::new(Vec::new())),
            categories: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_product(self, product: Product) -> Self {
        self.products.lock().unwrap().push(product);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_products(&self) -> Vec<Product> {
        self.products.lock().unwrap().clone()
    }

    fn fail_if_configured(&self, operation: &str) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Catalog(format!("Mock {} failure", operation)));
        }
        Ok(())
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for MockCatalog {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        self.fail_if_configured("create product")?;

        let now = Utc::now();
        let created = Product {
            id: Uuid::new_v4().to_string(),
            name: product.name,
            kind: product.kind,
            description: product.description,
            image: product.image,
            images: product.images,
            price: product.price,
            category: product.category,
            featured: product.featured,
            created_at: now,
            updated_at: now,
        };
        self.products.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_product(&self, id: &str, update: ProductUpdate) -> Result<Product> {
        self.fail_if_configured("update product")?;

        let mut products = self.products.lock().unwrap();
        let product = products
            .iter_mut()
            .find(|product| product.id == id)
            .ok_or_else(|| Error::NotFound(format!("product {}", id)))?;

        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(kind) = update.kind {
            product.kind = kind;
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(image) = update.image {
            product.image = image;
        }
        if let Some(images) = update.images {
            product.images = images;
        }
        if let Some(price) = update.price {
            product.price = price;
        }
        if let Some(category) = update.category {
            product.category = category;
        }
        if let Some(featured) = update.featured {
            product.featured = featured;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: &str) -> Result<()> {
        self.fail_if_configured("delete product")?;

        let mut products = self.products.lock().unwrap();
        let before = products.len();
        products.retain(|product| product.id != id);
        if products.len() == before {
            return Err(Error::NotFound(format!("product {}", id)));
        }
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Product> {
        self.fail_if_configured("get product")?;

        self.products
            .lock()
            .unwrap()
            .iter()
            .find(|product| product.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("product {}", id)))
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>> {
        self.fail_if_configured("list products")?;

        let products = self.products.lock().unwrap();
        let matching: Vec<&Product> = products
            .iter()
            .rev()
            .filter(|product| query.matches(product))
            .collect();

        let items = matching
            .iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .map(|product| (*product).clone())
            .collect();

        Ok(Page {
            items,
            page: query.page.max(1),
            per_page: query.per_page,
            total: Some(matching.len() as u64),
        })
    }

    async fn related_products(
        &self,
        id: &str,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Product>> {
        self.fail_if_configured("related products")?;

        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|product| product.category == category && product.id != id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.fail_if_configured("list categories")?;

        let mut categories = self.categories.lock().unwrap().clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        self.fail_if_configured("create category")?;

        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "category name must not be empty".to_string(),
            ));
        }

        let slug = slugify(name);
        let mut categories = self.categories.lock().unwrap();
        if categories
            .iter()
            .any(|category| category.name == name || category.slug == slug)
        {
            return Err(Error::Catalog(format!("category '{}' already exists", name)));
        }

        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            slug,
            created_at: Utc::now(),
        };
        categories.push(category.clone());
        Ok(category)
    }

    async fn delete_category(&self, id: &str) -> Result<()> {
        self.fail_if_configured("delete category")?;

        let mut categories = self.categories.lock().unwrap();
        let before = categories.len();
        categories.retain(|category| category.id != id);
        if categories.len() == before {
            return Err(Error::NotFound(format!("category {}", id)));
        }
        Ok(())
    }
}

/// Accepts exactly one email/password pair.
#[derive(Clone)]
pub struct MockAuth {
    email: String,
    password: String,
    session: Arc<Mutex<Option<Session>>>,
}

impl MockAuth {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Start already signed in.
    pub fn signed_in(self) -> Self {
        *self.session.lock().unwrap() = Some(Self::session_for(&self.email));
        self
    }

    fn session_for(email: &str) -> Session {
        Session {
            access_token: format!("mock-token-{}", Uuid::new_v4()),
            user_id: "mock-admin".to_string(),
            email: email.to_string(),
            expires_at: None,
        }
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        if email != self.email || password != self.password {
            return Err(Error::Auth("Invalid login credentials".to_string()));
        }
        let session = Self::session_for(email);
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn current_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    async fn sign_out(&self) -> Result<()> {
        *self.session.lock().unwrap() = None;
        Ok(())
    }
}
