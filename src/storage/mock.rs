use super::ObjectStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockObjectStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    base_url: String,
    upload_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
    upload_failures_after: Arc<Mutex<Option<usize>>>,
    failing_deletes: Arc<Mutex<HashSet<String>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(BTreeMap::new())),
            base_url: "https://mock-storage.example.com/product-images".to_string(),
            upload_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
            upload_failures_after: Arc::new(Mutex::new(None)),
            failing_deletes: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_file(self, key: String, content: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(key, content);
        self
    }

    /// Let `successes` uploads through, then fail every later one.
    pub fn with_upload_failure_after(self, successes: usize) -> Self {
        *self.upload_failures_after.lock().unwrap() = Some(successes);
        self
    }

    pub fn with_failing_delete(self, key: String) -> Self {
        self.failing_deletes.lock().unwrap().insert(key);
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    pub fn get_files(&self) -> BTreeMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn upload(&self, key: &str, data: &[u8], _content_type: &str) -> Result<String> {
        let mut count = self.upload_count.lock().unwrap();
        if let Some(limit) = *self.upload_failures_after.lock().unwrap() {
            if *count >= limit {
                return Err(Error::Storage(format!("Mock upload failure for {}", key)));
            }
        }
        *count += 1;

        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        *self.delete_count.lock().unwrap() += 1;

        if self.failing_deletes.lock().unwrap().contains(key) {
            return Err(Error::Storage(format!("Mock delete failure for {}", key)));
        }
        match self.files.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::Storage(format!("File not found: {}", key))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_upload_list_delete() {
        let store = MockObjectStore::new();

        let url = store
            .upload("products/a.webp", b"img", "image/webp")
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://mock-storage.example.com/product-images/products/a.webp"
        );
        assert_eq!(store.get_upload_count(), 1);

        store
            .upload("other/b.webp", b"img", "image/webp")
            .await
            .unwrap();
        assert_eq!(
            store.list("products/").await.unwrap(),
            vec!["products/a.webp".to_string()]
        );

        store.delete("products/a.webp").await.unwrap();
        assert!(store.list("products/").await.unwrap().is_empty());
        assert_eq!(store.get_delete_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_upload_failure_after_limit() {
        let store = MockObjectStore::new().with_upload_failure_after(1);

        assert!(store.upload("products/1", b"a", "image/webp").await.is_ok());
        let err = store
            .upload("products/2", b"b", "image/webp")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(store.get_files().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_delete_missing_file() {
        let store = MockObjectStore::new();
        let result = store.delete("products/missing.webp").await;
        assert!(result.unwrap_err().to_string().contains("File not found"));
    }

    #[tokio::test]
    async fn test_mock_failing_delete() {
        let store = MockObjectStore::new()
            .with_file("products/a.webp".to_string(), b"a".to_vec())
            .with_failing_delete("products/a.webp".to_string());
        assert!(store.delete("products/a.webp").await.is_err());
        assert_eq!(store.get_files().len(), 1);
    }
}
