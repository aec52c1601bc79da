use super::{ProductCopy, ProductCopyEnhancer};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockCopyEnhancer {
    responses: Arc<Mutex<Vec<ProductCopy>>>,
    call_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockCopyEnhancer {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_response(self, response: ProductCopy) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl Default for MockCopyEnhancer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductCopyEnhancer for MockCopyEnhancer {
    async fn enhance(&self, copy: &ProductCopy) -> Result<ProductCopy> {
        copy.validate()?;

        let mut count = self.call_count.lock().unwrap();
        *count += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(Error::AiProvider("Mock enhancement failure".to_string()));
        }

        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Echo the input, filling whichever side was left blank.
            let title = copy.title.trim();
            let description = copy.description.trim();
            Ok(ProductCopy::new(
                if title.is_empty() { description } else { title },
                if description.is_empty() { title } else { description },
            ))
        } else {
            let index = (*count - 1) % responses.len();
            Ok(responses[index].clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_cycles_configured_responses() {
        let mock = MockCopyEnhancer::new()
            .with_response(ProductCopy::new("A", "a"))
            .with_response(ProductCopy::new("B", "b"));
        let input = ProductCopy::new("x", "y");

        assert_eq!(mock.enhance(&input).await.unwrap().title, "A");
        assert_eq!(mock.enhance(&input).await.unwrap().title, "B");
        assert_eq!(mock.enhance(&input).await.unwrap().title, "A");
        assert_eq!(mock.get_call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_default_fills_blank_side() {
        let copy = MockCopyEnhancer::new()
            .enhance(&ProductCopy::new("Oak frame", ""))
            .await
            .unwrap();
        assert_eq!(copy, ProductCopy::new("Oak frame", "Oak frame"));
    }

    #[tokio::test]
    async fn test_mock_failure_and_validation() {
        let failing = MockCopyEnhancer::new().with_failure(true);
        assert!(matches!(
            failing.enhance(&ProductCopy::new("x", "")).await,
            Err(Error::AiProvider(_))
        ));

        let mock = MockCopyEnhancer::new();
        assert!(matches!(
            mock.enhance(&ProductCopy::new("", "")).await,
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(mock.get_call_count(), 0);
    }
}
