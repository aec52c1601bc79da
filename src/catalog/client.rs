use super::{AuthProvider, CatalogStore};
use crate::models::{
    slugify, Category, Config, NewProduct, Page, Product, ProductQuery, ProductUpdate, Session,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

/// REST client for the managed backend: table endpoints under `/rest/v1`,
/// password sign-in under `/auth/v1`.
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
    session: Mutex<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: String, anon_key: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            session: Mutex::new(None),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let anon_key = config
            .backend_anon_key
            .clone()
            .ok_or_else(|| Error::Catalog("BACKEND_ANON_KEY not set".to_string()))?;
        Self::new(config.backend_url.clone(), anon_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn bearer(&self) -> String {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|session| session.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer()))
    }

    async fn check(response: Response, context: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await?;
        tracing::error!("Backend error during {} (status {}): {}", context, status, error_text);
        Err(Error::Catalog(format!(
            "{} failed (status {}): {}",
            context, status, error_text
        )))
    }

    async fn first_row<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        let rows: Vec<T> = response.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(what.to_string()))
    }
}

/// Total row count from a `Content-Range: 0-9/42` header.
fn parse_total(content_range: Option<&str>) -> Option<u64> {
    content_range?.rsplit('/').next()?.parse().ok()
}

#[async_trait]
impl CatalogStore for BackendClient {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let response = self
            .authorized(self.client.post(self.table_url("products")))
            .header("Prefer", "return=representation")
            .json(&[product])
            .send()
            .await?;
        let response = Self::check(response, "create product").await?;
        Self::first_row(response, "created product").await
    }

    async fn update_product(&self, id: &str, update: ProductUpdate) -> Result<Product> {
        let response = self
            .authorized(self.client.patch(self.table_url("products")))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&update)
            .send()
            .await?;
        let response = Self::check(response, "update product").await?;
        Self::first_row(response, &format!("product {}", id)).await
    }

    async fn delete_product(&self, id: &str) -> Result<()> {
        let response = self
            .authorized(self.client.delete(self.table_url("products")))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        Self::check(response, "delete product").await?;
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Product> {
        let response = self
            .authorized(self.client.get(self.table_url("products")))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))])
            .send()
            .await?;
        let response = Self::check(response, "get product").await?;
        Self::first_row(response, &format!("product {}", id)).await
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(category) = &query.category {
            params.push(("category", format!("eq.{}", category)));
        }
        if let Some(featured) = query.featured {
            params.push(("featured", format!("eq.{}", featured)));
        }

        let from = query.offset();
        let to = from + u64::from(query.per_page.max(1)) - 1;
        let response = self
            .authorized(self.client.get(self.table_url("products")))
            .query(&params)
            .header("Range-Unit", "items")
            .header("Range", format!("{}-{}", from, to))
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::check(response, "list products").await?;

        let total = parse_total(
            response
                .headers()
                .get("content-range")
                .and_then(|value| value.to_str().ok()),
        );
        let items: Vec<Product> = response.json().await?;

        Ok(Page {
            items,
            page: query.page.max(1),
            per_page: query.per_page,
            total,
        })
    }

    async fn related_products(
        &self,
        id: &str,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Product>> {
        let response = self
            .authorized(self.client.get(self.table_url("products")))
            .query(&[
                ("select", "*".to_string()),
                ("category", format!("eq.{}", category)),
                ("id", format!("neq.{}", id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        let response = Self::check(response, "related products").await?;
        Ok(response.json().await?)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let response = self
            .authorized(self.client.get(self.table_url("categories")))
            .query(&[("select", "*"), ("order", "name.asc")])
            .send()
            .await?;
        let response = Self::check(response, "list categories").await?;
        Ok(response.json().await?)
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "category name must not be empty".to_string(),
            ));
        }

        let response = self
            .authorized(self.client.post(self.table_url("categories")))
            .header("Prefer", "return=representation")
            .json(&[json!({ "name": name, "slug": slugify(name) })])
            .send()
            .await?;
        let response = Self::check(response, "create category").await?;
        Self::first_row(response, "created category").await
    }

    async fn delete_category(&self, id: &str) -> Result<()> {
        let response = self
            .authorized(self.client.delete(self.table_url("categories")))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        Self::check(response, "delete category").await?;
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for BackendClient {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::warn!("Sign-in rejected for {} (status {})", email, status);
            return Err(Error::Auth(format!(
                "sign-in failed (status {}): {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response.json().await?;
        let session = Session {
            access_token: token.access_token,
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            expires_at: token
                .expires_in
                .map(|seconds| Utc::now() + ChronoDuration::seconds(seconds)),
        };
        *self.session.lock().unwrap() = Some(session.clone());
        tracing::info!("Signed in as {}", session.email);
        Ok(session)
    }

    async fn current_session(&self) -> Option<Session> {
        let mut guard = self.session.lock().unwrap();
        let expired = guard
            .as_ref()
            .and_then(|session| session.expires_at)
            .is_some_and(|expires_at| expires_at <= Utc::now());
        if expired {
            *guard = None;
        }
        guard.clone()
    }

    async fn sign_out(&self) -> Result<()> {
        let token = self.session.lock().unwrap().take();
        let Some(session) = token else {
            return Ok(());
        };

        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "sign-out failed (status {})",
                response.status()
            )));
        }
        Ok(())
    }
}
