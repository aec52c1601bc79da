//! Product copy enhancement
//!
//! Rewrites an admin's draft title and description into short storefront
//! copy through a chat-completion model. The model is asked for a JSON
//! object; anything else is treated as a provider failure.

pub mod client;
pub mod mock;

pub use client::OpenAiCopyClient;
pub use mock::MockCopyEnhancer;

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Title and description as shown on a product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCopy {
    #[serde(rename = "enhancedTitle")]
    pub title: String,
    #[serde(rename = "enhancedDescription")]
    pub description: String,
}

impl ProductCopy {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// At least one of the two fields must carry text.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() && self.description.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "a title or description is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
pub trait ProductCopyEnhancer: Send + Sync {
    async fn enhance(&self, copy: &ProductCopy) -> Result<ProductCopy>;
}

fn or_placeholder(text: &str) -> &str {
    let text = text.trim();
    if text.is_empty() {
        "(none)"
    } else {
        text
    }
}

pub(crate) fn render_prompt(copy: &ProductCopy) -> String {
    format!(
        "Rewrite this product listing for an online shop.\n\n\
         Title: \"{}\"\n\
         Description: \"{}\"\n\n\
         Write a search-friendly title of at most 10 words and a description of \
         2 to 3 lines that leads with what the buyer gets. Keep the tone clear \
         and professional.\n\n\
         Reply with JSON only, in this shape:\n\
         {{\"enhancedTitle\": \"...\", \"enhancedDescription\": \"...\"}}",
        or_placeholder(&copy.title),
        or_placeholder(&copy.description)
    )
}

/// Pull the JSON object out of a model reply, tolerating surrounding prose
/// or code fences.
pub(crate) fn parse_reply(reply: &str) -> Result<ProductCopy> {
    let object = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(Error::AiProvider(format!(
                "no JSON object in model reply: {}",
                reply
            )))
        }
    };

    let copy: ProductCopy = serde_json::from_str(object).map_err(|e| {
        tracing::error!("Failed to parse enhanced copy: {}\nReply: {}", e, reply);
        Error::AiProvider(format!("unparseable model reply: {}", e))
    })?;

    if copy.title.trim().is_empty() || copy.description.trim().is_empty() {
        return Err(Error::AiProvider(
            "model reply is missing the title or description".to_string(),
        ));
    }
    Ok(ProductCopy::new(copy.title.trim(), copy.description.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_needs_some_text() {
        assert!(ProductCopy::new("Oak frame", "").validate().is_ok());
        assert!(ProductCopy::new("", "Solid oak").validate().is_ok());
        assert!(matches!(
            ProductCopy::new("  ", "").validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_prompt_marks_missing_fields() {
        let prompt = render_prompt(&ProductCopy::new("Oak frame", ""));
        assert!(prompt.contains("Title: \"Oak frame\""));
        assert!(prompt.contains("Description: \"(none)\""));
        assert!(prompt.contains("\"enhancedTitle\""));
    }

    #[test]
    fn test_parse_reply_inside_code_fence() {
        let reply = "Sure!\n```json\n{\"enhancedTitle\": \" Oak Photo Frame \", \
                     \"enhancedDescription\": \"Solid oak, hand finished.\"}\n```";
        let copy = parse_reply(reply).unwrap();
        assert_eq!(copy, ProductCopy::new("Oak Photo Frame", "Solid oak, hand finished."));
    }

    #[test]
    fn test_parse_reply_rejects_prose_and_partial_objects() {
        assert!(matches!(
            parse_reply("I cannot help with that."),
            Err(Error::AiProvider(_))
        ));
        assert!(matches!(
            parse_reply("{\"enhancedTitle\": \"Only a title\", \"enhancedDescription\": \"\"}"),
            Err(Error::AiProvider(_))
        ));
        assert!(matches!(
            parse_reply("{\"title\": \"wrong keys\"}"),
            Err(Error::AiProvider(_))
        ));
    }
}
